//! Rule matching and per-document field extraction.

mod matcher;
mod processor;

pub use matcher::Matcher;
pub use processor::DocumentProcessor;
