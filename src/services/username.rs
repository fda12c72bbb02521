//! Username availability checks with local validation and debounce

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, warn};

/// Minimum accepted username length
pub const MIN_USERNAME_LEN: usize = 4;

/// Default delay between the last keystroke and the remote lookup
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

/// Local format violations, checked before any lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameFormatError {
    #[error("username must be at least 4 characters")]
    TooShort,

    #[error("username may only contain lowercase letters and digits, found '{0}'")]
    InvalidCharacter(char),

    #[error("username must start with a letter")]
    MustStartWithLetter,
}

/// Failure talking to the username directory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("username directory request failed: {0}")]
pub struct DirectoryError(pub String);

/// Validate a username: lowercase ASCII letters and digits, at least four
/// characters, starting with a letter
pub fn validate_username(name: &str) -> Result<(), UsernameFormatError> {
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
    {
        return Err(UsernameFormatError::InvalidCharacter(bad));
    }
    if name.len() < MIN_USERNAME_LEN {
        return Err(UsernameFormatError::TooShort);
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(UsernameFormatError::MustStartWithLetter);
    }
    Ok(())
}

/// Availability of a single username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Availability {
    /// Nothing has been typed yet
    Idle,
    Invalid(String),
    Checking,
    Available,
    Taken,
    /// Directory answered with an unexpected status code
    Unknown(u16),
    Failed(String),
}

impl Availability {
    /// Map a directory status code: 404 means nobody holds the name
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Availability::Available,
            200 => Availability::Taken,
            other => Availability::Unknown(other),
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Availability::Idle | Availability::Checking)
    }
}

/// Latest known status for the most recently typed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameStatus {
    pub name: String,
    pub availability: Availability,
}

/// Remote lookup of a username, returning the HTTP status of the answer
#[async_trait]
pub trait UsernameDirectory: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<u16, DirectoryError>;
}

/// Directory backed by the companion REST API
#[derive(Debug, Clone)]
pub struct HttpUsernameDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUsernameDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, name: &str) -> String {
        format!("{}/users/username/{}", self.base_url, name)
    }
}

#[async_trait]
impl UsernameDirectory for HttpUsernameDirectory {
    async fn lookup(&self, name: &str) -> Result<u16, DirectoryError> {
        let url = self.lookup_url(name);
        debug!("Looking up username at {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

/// Validate and look up a name right away
pub async fn check_now(directory: &dyn UsernameDirectory, name: &str) -> Availability {
    if let Err(e) = validate_username(name) {
        return Availability::Invalid(e.to_string());
    }

    match directory.lookup(name).await {
        Ok(status) => Availability::from_status(status),
        Err(e) => {
            warn!("Username lookup for '{}' failed: {}", name, e);
            Availability::Failed(e.to_string())
        }
    }
}

/// Debounced checker: only the most recently typed value can publish a result
pub struct UsernameCheck {
    directory: Arc<dyn UsernameDirectory>,
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    status_tx: watch::Sender<UsernameStatus>,
}

impl UsernameCheck {
    pub fn new(directory: Arc<dyn UsernameDirectory>, delay: Duration) -> Self {
        let (status_tx, _) = watch::channel(UsernameStatus {
            name: String::new(),
            availability: Availability::Idle,
        });

        Self {
            directory,
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            status_tx,
        }
    }

    /// Register a new value from the input field
    ///
    /// Must be called from within a tokio runtime.
    pub fn input(&mut self, name: &str) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if name.is_empty() {
            self.publish(name, Availability::Idle);
            return;
        }

        if let Err(e) = validate_username(name) {
            self.publish(name, Availability::Invalid(e.to_string()));
            return;
        }

        self.publish(name, Availability::Checking);

        let directory = Arc::clone(&self.directory);
        let current = Arc::clone(&self.generation);
        let status_tx = self.status_tx.clone();
        let delay = self.delay;
        let name = name.to_string();

        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let availability = check_now(directory.as_ref(), &name).await;

            // A newer value may have been typed while the lookup was in flight
            if current.load(Ordering::SeqCst) != generation {
                debug!("Dropping stale username result for '{}'", name);
                return;
            }
            status_tx.send_replace(UsernameStatus { name, availability });
        }));
    }

    pub fn latest(&self) -> UsernameStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UsernameStatus> {
        self.status_tx.subscribe()
    }

    fn publish(&self, name: &str, availability: Availability) {
        self.status_tx.send_replace(UsernameStatus {
            name: name.to_string(),
            availability,
        });
    }
}

impl Drop for UsernameCheck {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
