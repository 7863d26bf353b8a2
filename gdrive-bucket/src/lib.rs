pub mod cli;
pub mod credentials;
pub mod drive;
pub mod http;
pub mod load_config;
pub mod storage;

pub use cli::{run, Cli};
