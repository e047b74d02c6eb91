//! Typed request and response shapes for each venue.

pub mod extended;
pub mod grvt;
