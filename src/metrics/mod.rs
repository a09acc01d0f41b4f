//! Relay metrics.

pub mod periodic;
