//! Cooperative cancellation for generation calls.
//!
//! A [`Canceller`] flips a watch channel; every network call and delay in the
//! pipeline races against the paired [`CancellationSignal`].

use crate::{Error, Result};
use std::future::Future;
use tokio::sync::watch;

/// Owning half. Dropping it without calling [`Canceller::cancel`] never cancels.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    pub fn cancel(&self) {
        // No receivers left just means nobody is listening anymore.
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Create a linked canceller/signal pair.
pub fn cancellation() -> (Canceller, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancellationSignal { rx: Some(rx) })
}

impl CancellationSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };

        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Canceller dropped without cancelling.
                return std::future::pending().await;
            }
        }
    }

    /// Run `fut` unless cancellation wins the race first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::never()
    }
}
