//! # Alumni Network Common Library
//!
//! Shared code for the alumni directory service and its maintenance tools:
//! - Configuration loading and root folder resolution
//! - Database initialization and models
//! - Event types and the broadcast event bus
//! - Signed session tokens for the built-in auth provider

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod token;

pub use error::{Error, Result};
