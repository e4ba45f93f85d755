//! External service integrations.
//!
//! - [`email`] - Mail sources (Gmail API, sample data)
//! - [`ai`] - Hosted models (OpenAI, Gemini, Hugging Face)

pub mod ai;
pub mod email;
