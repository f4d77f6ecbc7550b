//! Escalation alert timer
//!
//! Every check looks at what the viewer can currently see and plays one
//! bounded alert for all tickets that escalated since the last check.

use crate::session::SessionInner;
use async_trait::async_trait;
use monitor_common::AlertBurst;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Output device for audible alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Play the alert. The session cuts playback off after `burst.duration`.
    async fn play(&self, burst: &AlertBurst);
}

/// Sink that only writes a log line
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn play(&self, burst: &AlertBurst) {
        let ids: Vec<String> = burst.ticket_ids.iter().map(ToString::to_string).collect();
        tracing::warn!(tickets = %ids.join(" "), "Escalation alert");
    }
}

impl SessionInner {
    /// Run one notifier check and start playback if something escalated
    pub(crate) fn check_alerts(&self) -> Option<AlertBurst> {
        if !self.notifier.lock().is_enabled() {
            return None;
        }
        let visible = self.visible(self.clock.now());
        let burst = self.notifier.lock().check(&visible)?;

        tracing::info!(
            session = %self.id,
            count = burst.ticket_ids.len(),
            "Tickets escalated"
        );

        let sink = self.sink.clone();
        let played = burst.clone();
        tokio::spawn(async move {
            // Playback length is bounded no matter what the sink does
            let _ = tokio::time::timeout(played.duration, sink.play(&played)).await;
        });
        Some(burst)
    }
}

pub(crate) fn spawn_alert_task(
    inner: Arc<SessionInner>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(inner.config.alert_check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    inner.check_alerts();
                }
            }
        }
        tracing::debug!(session = %inner.id, "Alert timer stopped");
    })
}
