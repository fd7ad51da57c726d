//! Utility functions and helpers
//!
//! This module contains timestamp utilities.

pub mod time;

pub use time::{format_server_time, server_time, SERVER_TIME_FORMAT};
