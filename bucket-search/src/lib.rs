pub mod auth;
pub mod cli;
pub mod cloudsearch;
pub mod gcs;
pub mod load_config;

pub use cli::{run, Cli, Commands};
