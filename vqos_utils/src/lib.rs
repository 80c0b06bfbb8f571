//! Small helpers shared by the vqos daemons: external command execution
//! and a file-change watcher.

mod commands;
pub mod file_watcher;

pub use commands::run_output;
