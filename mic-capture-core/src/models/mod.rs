pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod format;
pub mod metadata;
pub mod state;
