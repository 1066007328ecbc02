pub mod app;
pub mod backend;
pub mod cli;
pub mod compose;
pub mod config;
pub mod interaction;
pub mod session;
pub mod store;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
