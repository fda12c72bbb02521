//! Finished-session alert background task

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    services::AlertSink,
    state::{AppState, SessionEvent},
};

/// Background task that plays the alert once for every finished session
pub async fn finish_alert_task(state: Arc<AppState>, alert: Arc<dyn AlertSink>) {
    info!("Starting finish alert task");

    let mut events = state.event_tx.subscribe();
    drop(state);

    loop {
        match events.recv().await {
            Ok(SessionEvent::Finished { session_id, goal_seconds }) => {
                debug!("Session {} finished after {}s goal", session_id, goal_seconds);
                alert.play(session_id);
            }
            Ok(other) => {
                debug!("Alert task ignoring {:?}", other);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Alert task lagged behind, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    info!("Finish alert task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{username::DirectoryError, MemoryRecorder, UsernameDirectory},
        state::{SessionSetup, TimerSettings},
        tasks::session_ticker_task,
    };
    use async_trait::async_trait;
    use std::{sync::Mutex, time::Duration};
    use tokio::time::sleep;

    #[derive(Default)]
    struct CountingAlert {
        played: Mutex<Vec<u64>>,
    }

    impl AlertSink for CountingAlert {
        fn play(&self, session_id: u64) {
            self.played.lock().unwrap().push(session_id);
        }
    }

    struct NoDirectory;

    #[async_trait]
    impl UsernameDirectory for NoDirectory {
        async fn lookup(&self, _name: &str) -> Result<u16, DirectoryError> {
            Err(DirectoryError("offline".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn plays_exactly_once_per_finished_session() {
        let state = Arc::new(AppState::new(
            "127.0.0.1".to_string(),
            0,
            TimerSettings::default(),
            Arc::new(MemoryRecorder::new()),
            Arc::new(NoDirectory),
            Duration::from_millis(350),
        ));
        let alert = Arc::new(CountingAlert::default());
        tokio::spawn(finish_alert_task(Arc::clone(&state), alert.clone()));
        tokio::spawn(session_ticker_task(Arc::clone(&state)));
        tokio::task::yield_now().await;

        let id = state.start_session(SessionSetup::new(0, 2)).unwrap().session_id;
        sleep(Duration::from_secs(10)).await;

        assert_eq!(*alert.played.lock().unwrap(), vec![id]);
    }
}
