//! bandcheck-report: Results pages for scored attempts.

pub mod html;

pub use html::{generate_html, write_html_report};
