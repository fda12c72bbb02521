//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod finish_alert;
pub mod session_ticker;

// Re-export main functions
pub use finish_alert::finish_alert_task;
pub use session_ticker::session_ticker_task;
