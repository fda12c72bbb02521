//! Session setup input handed over by the setup flow

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Goal duration as entered by the user, minutes and seconds in 0..=59
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSetup {
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

impl SessionSetup {
    pub const MAX_FIELD: u32 = 59;

    pub fn new(minutes: u32, seconds: u32) -> Self {
        Self { minutes, seconds }
    }

    /// Check field ranges and return the total goal in seconds
    pub fn goal_seconds(&self) -> SessionResult<u32> {
        if self.minutes > Self::MAX_FIELD {
            return Err(SessionError::InvalidSetup(format!(
                "minutes must be between 0 and {}, got {}",
                Self::MAX_FIELD,
                self.minutes
            )));
        }
        if self.seconds > Self::MAX_FIELD {
            return Err(SessionError::InvalidSetup(format!(
                "seconds must be between 0 and {}, got {}",
                Self::MAX_FIELD,
                self.seconds
            )));
        }
        Ok(self.minutes * 60 + self.seconds)
    }
}
