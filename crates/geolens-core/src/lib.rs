// Session store, reconciliation and streaming transports for Geolens

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod session;
pub mod test_utils;
pub mod tools;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
