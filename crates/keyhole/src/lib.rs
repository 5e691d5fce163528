//! Keyhole - selective forwarding gateway for LLM-style HTTP APIs
//!
//! Requests whose path starts with the configured prefix are relayed to a
//! single upstream origin with a bearer credential injected. Everything else
//! receives a static `200 OK`.

pub mod cli;
pub mod config;
pub mod error;
pub mod proxy;

pub use error::{KeyholeError, Result};
