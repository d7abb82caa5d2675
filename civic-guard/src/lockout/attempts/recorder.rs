//! Background writer for attempt rows
//!
//! The guard hands rows to [`AttemptRecorder::record`] after the counter and
//! lock have been updated. A single worker appends them in enqueue order, so
//! a slow or failing repository never delays a lockout decision.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{LoginAttempt, LoginAttemptRepository};

enum Command {
    Append(Box<LoginAttempt>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the attempt-row worker
///
/// Cheap to clone; every clone feeds the same worker. The worker stops once
/// every handle is dropped.
#[derive(Clone)]
pub struct AttemptRecorder {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for AttemptRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptRecorder")
            .field("running", &!self.tx.is_closed())
            .finish()
    }
}

impl AttemptRecorder {
    /// Start the worker writing to `repository`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(repository: Arc<dyn LoginAttemptRepository>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(repository, rx));
        Self { tx }
    }

    /// Enqueue one row (fire-and-forget)
    pub fn record(&self, attempt: LoginAttempt) {
        if self.tx.send(Command::Append(Box::new(attempt))).is_err() {
            tracing::warn!("Attempt recorder stopped, login attempt dropped");
        }
    }

    /// Wait until every row enqueued before this call has been handled
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn run(repository: Arc<dyn LoginAttemptRepository>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Append(attempt) => {
                if let Err(e) = repository.append(&attempt).await {
                    tracing::warn!(
                        identifier = %attempt.email,
                        successful = attempt.successful,
                        error = %e,
                        "Failed to record login attempt"
                    );
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("Attempt recorder stopped");
}
