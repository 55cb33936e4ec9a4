//! API Module
//!
//! This module handles the HTTP API for receiving transactions.
//! It provides the endpoint that clients use to submit key/value pairs.

mod server;
pub use server::{Server, router};
