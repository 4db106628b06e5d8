// smartql library - answer questions directly or from the database

pub mod cli;
mod config;
mod core;
mod error;
mod output;
mod server;

pub use config::{LlmSettings, Settings, StorageSettings};
pub use crate::core::*;
pub use error::Error;
pub use server::Server;
