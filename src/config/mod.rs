//! Configuration and settings management.
//!
//! This module provides the layered application settings.

mod settings;

pub use settings::{
    AiSettings, ConfigError, DatabaseSettings, GmailSettings, SchedulerSettings, ServerSettings,
    Settings, CONFIG_PATH_ENV,
};
