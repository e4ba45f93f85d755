//! Mail source implementations.
//!
//! This module contains the [`MailSource`] trait and the places messages are
//! fetched from:
//!
//! - [`GmailProvider`] - Gmail REST API with an OAuth bearer token
//! - [`SampleSource`] - bundled or file-based sample messages for offline use
//!
//! Sources only normalize messages into [`NewEmail`](crate::domain::NewEmail)
//! records. Classification, storage and threading happen in the ingest service.

mod gmail;
mod sample;
mod traits;

pub use gmail::{AuthorizedUserToken, GmailProvider, UNKNOWN_SENDER};
pub use sample::{SampleSource, SAMPLE_SENDER};
#[cfg(test)]
pub use traits::MockMailSource;
pub use traits::{MailSource, ProviderError, Result, MAX_FETCH_RESULTS};
