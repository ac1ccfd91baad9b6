//! Screen lock edges
//!
//! The engine only consumes lock/unlock edges over a channel. Platform
//! hooks (the macOS distributed-notification listener, a Windows session
//! watcher) live outside this crate and feed the sender half.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    Locked,
    Unlocked,
}
