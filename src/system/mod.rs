//! OS-facing collaborators
//!
//! Everything here talks to the engine over channels only; the engine
//! never calls into platform APIs directly.

pub mod display_list;
pub mod screen_lock;
pub mod script_launcher;
