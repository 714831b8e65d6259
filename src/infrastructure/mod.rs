//! Infrastructure layer providing external service integrations.
//!
//! This module contains implementations for external concerns, currently
//! file persistence of spreadsheets.

pub mod persistence;

pub use persistence::*;
