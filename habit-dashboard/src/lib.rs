//! habit-dashboard: the habit tracker from the command line
//!
//! Signs in against the hosted backend, keeps the access token in a local
//! session file, and runs one dashboard command per invocation.

pub mod commands;
pub mod config;
pub mod render;

pub use commands::{Command, Dashboard};
pub use config::Config;
