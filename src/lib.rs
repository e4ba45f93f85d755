//! mailroom - Gmail aggregation, classification and labeling backend
//!
//! This crate provides the HTTP API, the classification and threading
//! services, the Gmail adapter and the SQLite storage behind them.

pub mod api;
pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

pub use api::{router, App, AppState};
pub use config::Settings;
