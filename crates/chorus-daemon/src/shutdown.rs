// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that `serve` waits on before stopping the
//! platform manager.

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is
/// received. If SIGTERM cannot be hooked only Ctrl+C is watched.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, watching Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Awaits every task until `deadline`. Tasks still running then are
/// aborted. Returns `true` when all finished in time.
pub async fn join_until(tasks: Vec<(String, JoinHandle<()>)>, deadline: Instant) -> bool {
    let mut clean = true;
    for (name, mut task) in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => debug!(task = %name, "task finished"),
            Ok(Err(e)) => {
                warn!(task = %name, error = %e, "task panicked or was cancelled");
            }
            Err(_) => {
                warn!(task = %name, "shutdown deadline reached, aborting task");
                task.abort();
                clean = false;
            }
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn finished_tasks_join_cleanly() {
        let tasks = vec![
            ("a".to_string(), tokio::spawn(async {})),
            ("b".to_string(), tokio::spawn(async {})),
        ];
        assert!(join_until(tasks, Instant::now() + Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_task_is_aborted_at_deadline() {
        let hung = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let tasks = vec![("hung".to_string(), hung)];
        assert!(!join_until(tasks, Instant::now() + Duration::from_secs(5)).await);
    }
}
