use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::services::session::SessionManager;

/// Background sweeper for abandoned upload sessions. Runs until the
/// shutdown channel flips.
pub struct SessionJanitor {
    sessions: Arc<SessionManager>,
    shutdown: watch::Receiver<bool>,
    interval: Duration,
}

impl SessionJanitor {
    pub fn new(sessions: Arc<SessionManager>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            sessions,
            shutdown,
            interval: Duration::from_secs(3600),
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Session janitor started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("Session janitor shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    let swept = self.sessions.sweep_expired().await;
                    if swept > 0 {
                        tracing::info!("Swept {} expired upload session(s)", swept);
                    }
                }
            }
        }
    }
}
