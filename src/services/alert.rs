//! One-shot alert played when a session finishes

use std::io::Write;
use tracing::{info, warn};

/// Collaborator that plays the finished alert
pub trait AlertSink: Send + Sync {
    fn play(&self, session_id: u64);
}

/// Rings the terminal bell on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AlertSink for TerminalBell {
    fn play(&self, session_id: u64) {
        info!("Session {} finished, ringing bell", session_id);
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            warn!("Failed to ring terminal bell: {}", e);
        }
    }
}

/// Logs the finish without making a sound
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAlert;

impl AlertSink for SilentAlert {
    fn play(&self, session_id: u64) {
        info!("Session {} finished (alert muted)", session_id);
    }
}
