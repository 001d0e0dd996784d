//! Receive mail over SMTP and either print it or forward it through Gmail.

pub mod config;
pub mod controller;
pub mod error;
pub mod gmail;
pub mod handler;
pub mod listener;
pub mod logging;
pub mod message;
pub mod smtp;
pub mod traits;

pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
