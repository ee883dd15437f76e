//! Data sources that deliver posture updates.
//!
//! A source runs as a single spawned task and reports what it observes
//! as [`PostureEvent`]s over one channel. The controller owns the
//! receiving end and is the only place state changes.
//!
//! ```text
//! ┌──────────────┐   PostureEvent    ┌──────────────┐
//! │ StreamSource │──────────────────▶│              │
//! │ (Socket.IO)  │                   │  Controller  │──▶ DashboardState
//! ├──────────────┤    mpsc (FIFO)    │  (reducer)   │
//! │  PollSource  │──────────────────▶│              │
//! │  (HTTP GET)  │                   └──────────────┘
//! └──────────────┘
//! ```

pub mod socketio;

#[cfg(feature = "poll")]
pub mod poll;

#[cfg(feature = "stream")]
pub mod stream;

use crate::posture::PostureEvent;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[cfg(feature = "poll")]
pub use poll::PollSource;

#[cfg(feature = "stream")]
pub use stream::StreamSource;

/// Capacity of the event channel between a source and the controller.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A strategy for obtaining posture updates.
pub trait PostureSource: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Start delivering events to `events`.
    ///
    /// Must be called within a tokio runtime. The returned guard stops the
    /// source when cancelled or dropped.
    fn spawn(self: Box<Self>, events: mpsc::Sender<PostureEvent>) -> Subscription;
}

/// Owns a running source task.
///
/// Cancelling (or dropping) signals shutdown and aborts the task, so no
/// timer or socket outlives the subscription.
#[derive(Debug)]
pub struct Subscription {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Spawn `run`, handing it the shutdown signal.
    ///
    /// The signal resolves on cancel and also if the subscription is
    /// dropped, so tasks can simply `select!` on it.
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(shutdown_rx));
        Self {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Stop the source task.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }

    /// Whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
