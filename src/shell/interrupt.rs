use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Ctrl-C routing for an interactive session.
///
/// Once tokio listens for SIGINT the default handler is gone for the rest of
/// the process, so a single listener decides what an interrupt means: it
/// stops the wait in progress if there is one, otherwise it ends the session.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    waiting: Arc<Mutex<Option<CancellationToken>>>,
    session: CancellationToken,
}

impl Interrupts {
    /// Starts the process-wide listener; it stops when the handle drops.
    pub fn listen(&self) -> Listener {
        let interrupts = self.clone();
        Listener(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                interrupts.interrupt();
            }
        }))
    }

    /// Routes one interrupt.
    pub fn interrupt(&self) {
        let waiting = self.slot().take();
        match waiting {
            Some(wait) => {
                tracing::info!("interrupted; cancelling wait");
                wait.cancel();
            }
            None => {
                tracing::info!("interrupted; ending session");
                self.session.cancel();
            }
        }
    }

    /// Makes `token` the target of interrupts until the guard drops.
    pub fn arm(&self, token: CancellationToken) -> Armed {
        *self.slot() = Some(token);
        Armed(self.clone())
    }

    pub fn is_ended(&self) -> bool {
        self.session.is_cancelled()
    }

    /// Resolves once an interrupt ends the session.
    pub async fn ended(&self) {
        self.session.cancelled().await;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[must_use = "interrupts stop reaching the token once the guard drops"]
pub struct Armed(Interrupts);

impl Drop for Armed {
    fn drop(&mut self) {
        self.0.slot().take();
    }
}

#[must_use = "the listener stops when dropped"]
pub struct Listener(JoinHandle<()>);

impl Drop for Listener {
    fn drop(&mut self) {
        self.0.abort();
    }
}
