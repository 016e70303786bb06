pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod logging;
pub mod ssh;
pub mod test_utils;
