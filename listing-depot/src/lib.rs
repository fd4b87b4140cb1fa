pub mod cli;
pub mod load_config;
pub mod upstream;

pub use cli::{run, Cli, Commands};
