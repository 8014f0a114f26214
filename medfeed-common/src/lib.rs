//! # MedFeed Common Library
//!
//! Shared code for the MedFeed client crates including:
//! - Backend API request/response types
//! - Feed event types and the EventBus
//! - Configuration loading
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
