//! Action machines
//!
//! Small state machines driven by the engine's notice dispatch. Each one
//! issues requests through the connection and waits for the mirrors'
//! change notices to confirm progress; none of them polls.

pub mod fix_inputs;
pub mod pause_on_lock;
pub mod preset_switch;
pub mod run_script;
