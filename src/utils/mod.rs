//! Utilities module for logging, errors and charts
//!
//! This module provides:
//! - Structured logging with tracing
//! - The crate-wide error type
//! - SVG charts of training histories
//! - Small formatting helpers for terminal output

pub mod charts;
pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{FlowerError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};

/// Format a fraction with a text progress bar
pub fn format_share_bar(fraction: f64, width: usize) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:5.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        fraction * 100.0
    )
}
