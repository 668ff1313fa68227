pub mod config;
pub mod resolver;
pub mod version;
