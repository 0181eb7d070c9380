//! Core domain + application logic for the multi-tenant lead-qualification
//! bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the storage
//! backends live behind ports (traits) implemented in adapter crates.

pub mod brain;
pub mod config;
pub mod deeplink;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod identity;
pub mod intent;
pub mod lead;
pub mod logging;
pub mod memory;
pub mod messaging;
pub mod nudge;
pub mod ports;
pub mod recovery;
pub mod scoring;
pub mod service;
pub mod store;
pub mod texts;
pub mod throttle;
pub mod utils;

pub use errors::{Error, Result};
