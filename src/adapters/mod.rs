pub mod extended;
pub mod grvt;
