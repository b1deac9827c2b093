//! Reporting: pure rendering of session results for the console.

pub mod text;

pub use text::{render_summary, render_text};
