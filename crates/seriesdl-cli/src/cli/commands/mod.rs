//! CLI command handlers. Each command is in its own file.

mod context;
mod continue_series;
mod history;
mod watch;

pub use context::App;
pub use continue_series::run_continue;
pub use history::run_history;
pub use watch::run_watch;
