//! Parsers for the EDGAR text formats the scanner reads.
//!
//! Parsers are pure: they take text and return typed values, leaving fetching to
//! [`crate::traits`] implementations.

pub mod header;
pub mod index;
pub(crate) mod utils;
