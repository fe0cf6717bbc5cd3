// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a polling cycle into a [`SyncClient`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chorus_core::{ChorusError, Resume, SyncMetadata, SyncProgress, Watermark};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientEvent, SyncClient};

/// Result of polling one scope.
#[derive(Debug)]
pub struct PollBatch<R> {
    pub records: Vec<R>,
    /// Progress after these records. `None` means nothing was consumed.
    pub watermark: Option<Watermark>,
    pub metadata: SyncMetadata,
}

impl<R> PollBatch<R> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            watermark: None,
            metadata: SyncMetadata::default(),
        }
    }
}

/// Something that can be asked for records newer than a watermark.
#[async_trait]
pub trait PollSource: Send + Sync + 'static {
    type Record: Send + 'static;

    /// Stable name used as the sync-state `source`.
    fn source(&self) -> &str;

    /// Independent sync scopes, each with its own watermark.
    fn scopes(&self) -> Vec<String>;

    /// Called once before the first poll.
    async fn connect(&self) -> Result<(), ChorusError> {
        Ok(())
    }

    async fn poll(
        &self,
        scope: &str,
        since: Option<&Watermark>,
    ) -> Result<PollBatch<Self::Record>, ChorusError>;
}

#[derive(Debug, Clone)]
pub struct PollerOptions {
    pub interval: Duration,
    /// Ceiling for the exponential delay after consecutive failures.
    pub max_backoff: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_backoff: Duration::from_secs(600),
        }
    }
}

impl PollerOptions {
    /// Delay before the next cycle after `failures` consecutive errors.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let factor = 2u32.saturating_pow(failures.min(16));
        self.interval.saturating_mul(factor).min(self.max_backoff)
    }
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Polls a [`PollSource`] on an interval, resuming each scope from its
/// watermark and backing off exponentially while cycles fail.
pub struct Poller<S> {
    source: Arc<S>,
    options: PollerOptions,
    running: Mutex<Option<Running>>,
}

impl<S: PollSource> Poller<S> {
    pub fn new(source: S, options: PollerOptions) -> Self {
        Self {
            source: Arc::new(source),
            options,
            running: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[async_trait]
impl<S: PollSource> SyncClient for Poller<S> {
    type Record = S::Record;

    async fn start(
        &self,
        resume: Resume,
        events: mpsc::Sender<ClientEvent<S::Record>>,
    ) -> Result<(), ChorusError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return Ok(());
        }

        self.source.connect().await?;

        let watermarks: HashMap<String, Option<Watermark>> = self
            .source
            .scopes()
            .into_iter()
            .map(|scope| {
                let mark = resume.watermark(self.source.source(), &scope).cloned();
                (scope, mark)
            })
            .collect();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.source.clone(),
            self.options.clone(),
            watermarks,
            events,
            cancel.clone(),
        ));
        *running = Some(Running { cancel, task });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChorusError> {
        if let Some(running) = self.running.lock().await.take() {
            running.cancel.cancel();
            if let Err(e) = running.task.await
                && e.is_panic()
            {
                return Err(ChorusError::Internal(format!("poll loop panicked: {e}")));
            }
        }
        Ok(())
    }
}

async fn poll_loop<S: PollSource>(
    source: Arc<S>,
    options: PollerOptions,
    mut watermarks: HashMap<String, Option<Watermark>>,
    events: mpsc::Sender<ClientEvent<S::Record>>,
    cancel: CancellationToken,
) {
    info!(source = source.source(), scopes = watermarks.len(), "poll loop started");
    if events.send(ClientEvent::Connected).await.is_err() {
        return;
    }

    let mut failures: u32 = 0;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = poll_cycle(source.as_ref(), &mut watermarks, &events) => outcome,
        };
        match outcome {
            Ok(()) => {
                if failures > 0 {
                    info!(source = source.source(), "polling recovered");
                    if events.send(ClientEvent::Connected).await.is_err() {
                        break;
                    }
                }
                failures = 0;
            }
            Err(CycleError::Closed) => break,
            Err(CycleError::Source(e)) => {
                failures = failures.saturating_add(1);
                warn!(source = source.source(), failures, error = %e, "poll cycle failed");
                let message = e.to_string();
                if events.send(ClientEvent::Error { message }).await.is_err() {
                    break;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.delay(failures)) => {}
        }
    }
    debug!(source = source.source(), "poll loop stopped");
}

enum CycleError {
    Source(ChorusError),
    Closed,
}

async fn poll_cycle<S: PollSource>(
    source: &S,
    watermarks: &mut HashMap<String, Option<Watermark>>,
    events: &mpsc::Sender<ClientEvent<S::Record>>,
) -> Result<(), CycleError> {
    let mut scopes: Vec<String> = watermarks.keys().cloned().collect();
    scopes.sort();

    for scope in scopes {
        let since = watermarks.get(&scope).cloned().flatten();
        let batch = source
            .poll(&scope, since.as_ref())
            .await
            .map_err(CycleError::Source)?;

        let count = batch.records.len() as u64;
        for record in batch.records {
            events
                .send(ClientEvent::Record(record))
                .await
                .map_err(|_| CycleError::Closed)?;
        }

        if let Some(watermark) = batch.watermark {
            debug!(source = source.source(), scope = %scope, count, "batch complete");
            watermarks.insert(scope.clone(), Some(watermark.clone()));
            events
                .send(ClientEvent::Sync(SyncProgress {
                    source: source.source().to_string(),
                    scope,
                    watermark,
                    metadata: batch.metadata,
                    count,
                }))
                .await
                .map_err(|_| CycleError::Closed)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let options = PollerOptions {
            interval: Duration::from_secs(10),
            max_backoff: Duration::from_secs(60),
        };
        assert_eq!(options.delay(0), Duration::from_secs(10));
        assert_eq!(options.delay(1), Duration::from_secs(20));
        assert_eq!(options.delay(2), Duration::from_secs(40));
        assert_eq!(options.delay(3), Duration::from_secs(60));
        assert_eq!(options.delay(u32::MAX), Duration::from_secs(60));
    }
}
