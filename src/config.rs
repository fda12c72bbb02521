//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::{
    error::ConfigError,
    state::{Smoothing, TimerSettings},
};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "hbot-session")]
#[command(about = "Session countdown and username availability service for an HBOT companion app")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Authoritative countdown period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Progress smoothing period in milliseconds
    #[arg(long, default_value = "100")]
    pub smooth_ms: u64,

    /// Share of the display gap closed per smoothing step
    #[arg(long, default_value_t = Smoothing::DEFAULT_FACTOR)]
    pub smoothing_factor: f64,

    /// Gap below which the display snaps to the countdown
    #[arg(long, default_value_t = Smoothing::DEFAULT_EPSILON)]
    pub smoothing_epsilon: f64,

    /// Debounce delay for username availability checks in milliseconds
    #[arg(long, default_value = "350")]
    pub username_debounce_ms: u64,

    /// Base URL of the companion API used for username lookups
    #[arg(long, default_value = "http://127.0.0.1:3000/api")]
    pub api_base_url: String,

    /// Timeout for username lookups in seconds
    #[arg(long, default_value = "5")]
    pub api_timeout: u64,

    /// File that receives one JSON line per confirmed session
    #[arg(long, default_value = "sessions.jsonl")]
    pub session_log: PathBuf,

    /// Keep confirmed sessions in memory instead of the session log
    #[arg(long)]
    pub no_log: bool,

    /// Do not ring the terminal bell when a session finishes
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Validate the scheduling and smoothing options
    pub fn timer_settings(&self) -> Result<TimerSettings, ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroPeriod("tick"));
        }
        if self.smooth_ms == 0 {
            return Err(ConfigError::ZeroPeriod("smoothing"));
        }
        let smoothing = Smoothing::new(self.smoothing_factor, self.smoothing_epsilon)?;

        Ok(TimerSettings {
            tick_interval: Duration::from_millis(self.tick_ms),
            smooth_interval: Duration::from_millis(self.smooth_ms),
            smoothing,
        })
    }

    pub fn username_debounce(&self) -> Duration {
        Duration::from_millis(self.username_debounce_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout)
    }
}
