//! Host scheduler driving the tick and smoothing intervals

use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

use crate::state::{AppState, RunSignal, TickOutcome};

/// Why the interval loop for one run signal ended
enum DriveEnd {
    /// The run signal changed (pause, finish, discard or resume)
    SignalChanged,
    /// The session stopped accepting ticks without a new signal
    Stalled,
    /// The state was dropped
    Closed,
}

/// Background task that ticks the active session while it is running
///
/// Both intervals live only as long as the run signal they were created for.
/// Pausing drops them, resuming creates fresh ones.
pub async fn session_ticker_task(state: Arc<AppState>) {
    info!("Starting session ticker task");

    let mut run_rx = state.run_tx.subscribe();

    loop {
        let signal = *run_rx.borrow_and_update();

        let end = match signal.active_session() {
            Some(session_id) => drive(&state, &mut run_rx, signal, session_id).await,
            None => DriveEnd::Stalled,
        };

        match end {
            DriveEnd::SignalChanged => continue,
            DriveEnd::Stalled => {
                if run_rx.changed().await.is_err() {
                    break;
                }
            }
            DriveEnd::Closed => break,
        }
    }

    info!("Session ticker task stopped");
}

async fn drive(
    state: &AppState,
    run_rx: &mut watch::Receiver<RunSignal>,
    signal: RunSignal,
    session_id: u64,
) -> DriveEnd {
    let tick_period = state.settings.tick_interval;
    let smooth_period = state.settings.smooth_interval;
    debug!(
        "Driving session {} (epoch {}): tick every {:?}, smooth every {:?}",
        session_id, signal.epoch, tick_period, smooth_period
    );

    let start = Instant::now();
    let mut tick = interval_at(start + tick_period, tick_period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut smooth = interval_at(start + smooth_period, smooth_period);
    smooth.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match state.tick_session(session_id) {
                    Ok(TickOutcome::Counted) => {}
                    Ok(TickOutcome::Finished) => {
                        debug!("Session {} reached zero, releasing intervals", session_id);
                        return DriveEnd::SignalChanged;
                    }
                    Ok(TickOutcome::Ignored) => {
                        debug!("Session {} no longer accepts ticks", session_id);
                        return DriveEnd::Stalled;
                    }
                    Err(e) => {
                        error!("Failed to tick session {}: {}", session_id, e);
                        return DriveEnd::Stalled;
                    }
                }
            }

            _ = smooth.tick() => {
                if let Err(e) = state.smooth_session(session_id) {
                    error!("Failed to smooth session {}: {}", session_id, e);
                }
            }

            changed = run_rx.changed() => {
                if changed.is_err() {
                    return DriveEnd::Closed;
                }
                if *run_rx.borrow() != signal {
                    return DriveEnd::SignalChanged;
                }
            }
        }
    }
}
