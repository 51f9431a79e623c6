//! Dashboard output.

pub mod render;

pub use render::{format_count, render_dashboard, render_history, render_json};
