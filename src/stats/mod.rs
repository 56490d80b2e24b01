//! Activity statistics for the companion engine.
//!
//! Counts what the engine has seen and done so a user can check how much
//! camera data was processed and how many exchanges took place. Nothing
//! here stores frames, images or message text.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
