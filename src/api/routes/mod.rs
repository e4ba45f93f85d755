//! Route handlers grouped by resource.

pub mod accounts;
pub mod assistant;
pub mod categories;
pub mod categorize;
pub mod gmail;
pub mod scheduler;
pub mod system;
pub mod templates;
pub mod threads;
