pub mod config;
pub mod logging;

pub mod catalog;
pub mod checksum;
pub mod fetch;
pub mod history;
pub mod library;
pub mod pool;
pub mod scheduler;
pub mod seen;
pub mod session;
