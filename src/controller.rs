//! Posture display controller.
//!
//! Owns the dashboard state, the data source subscription and the
//! receiving end of the event channel. Events are applied one at a time
//! in receipt order through [`reduce`].

use crate::config::{Config, ConfigError, SourceMode};
use crate::error::{FetchError, TransportError};
use crate::posture::{reduce, DashboardState, PostureEvent};
use crate::source::{PostureSource, Subscription, EVENT_CHANNEL_CAPACITY};
use crate::stats::{SessionStats, SharedSessionStats};
use crate::view::View;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Keeps one authoritative posture in sync with a data source.
pub struct PostureController {
    /// Source waiting for `connect`
    source: Option<Box<dyn PostureSource>>,
    /// Running source, released on teardown
    subscription: Option<Subscription>,
    /// Events from the running source
    events: Option<mpsc::Receiver<PostureEvent>>,
    state: DashboardState,
    stats: SharedSessionStats,
    torn_down: bool,
}

impl PostureController {
    /// Create a controller for the given source. Nothing runs until
    /// [`connect`](Self::connect).
    pub fn new(source: Box<dyn PostureSource>) -> Self {
        Self {
            source: Some(source),
            subscription: None,
            events: None,
            state: DashboardState::new(),
            stats: Arc::new(SessionStats::new()),
            torn_down: false,
        }
    }

    /// Create a controller with the source selected by `config.mode`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let source: Box<dyn PostureSource> = match config.mode {
            #[cfg(feature = "stream")]
            SourceMode::Stream => Box::new(crate::source::StreamSource::from_config(config)),
            #[cfg(feature = "poll")]
            SourceMode::Poll => Box::new(crate::source::PollSource::from_config(config)?),
            #[allow(unreachable_patterns)]
            mode => return Err(ConfigError::Unsupported(mode)),
        };
        Ok(Self::new(source))
    }

    /// Start the data source.
    ///
    /// Only the first call does anything; later calls, and calls after
    /// teardown, are ignored. Returns whether this call started the source.
    /// Must be called within a tokio runtime.
    pub fn connect(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(source) = self.source.take() else {
            return false;
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tracing::info!(
            source = source.name(),
            session = %self.stats.session_id(),
            "Connecting posture source"
        );
        self.subscription = Some(source.spawn(tx));
        self.events = Some(rx);
        true
    }

    /// Handle a raw payload from the backend.
    pub fn on_reading(&mut self, raw: Value) {
        self.apply(PostureEvent::Reading(raw));
    }

    /// Handle the transport coming up.
    pub fn on_transport_up(&mut self) {
        self.apply(PostureEvent::TransportUp);
    }

    /// Handle the transport failing or going away.
    pub fn on_transport_down(&mut self, reason: TransportError) {
        self.apply(PostureEvent::TransportDown(reason));
    }

    /// Handle a failed polling cycle.
    pub fn on_fetch_error(&mut self, error: FetchError) {
        self.apply(PostureEvent::FetchFailed(error));
    }

    /// Apply one event. Returns `false` if the controller is torn down.
    pub fn apply(&mut self, event: PostureEvent) -> bool {
        if self.torn_down {
            tracing::debug!(?event, "Ignoring event after teardown");
            return false;
        }

        let next = reduce(&self.state, &event, Utc::now());
        let accepted = matches!(event, PostureEvent::Reading(_)) && next.error().is_none();
        self.stats.record(&event, accepted);

        match (&event, next.error()) {
            (PostureEvent::Reading(raw), Some(e)) => {
                tracing::warn!(payload = %raw, error = ?e, "Rejected posture payload")
            }
            (PostureEvent::Reading(_), None) => {
                tracing::debug!(posture = %next.posture(), "Posture updated")
            }
            _ => {}
        }

        self.state = next;
        true
    }

    /// Wait for the next event from the source and apply it.
    ///
    /// Returns `None` once torn down, before `connect`, or when the source
    /// has stopped.
    pub async fn next_event(&mut self) -> Option<&DashboardState> {
        if self.torn_down {
            return None;
        }
        let event = self.events.as_mut()?.recv().await?;
        self.apply(event);
        Some(&self.state)
    }

    /// Stop the source and ignore everything that arrives afterwards.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.source = None;

        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(mut events) = self.events.take() {
            events.close();
        }

        tracing::info!(session = %self.stats.session_id(), "Posture controller torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Whether a source is running.
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// The view for the current state.
    pub fn view(&self) -> View {
        View::from_state(&self.state)
    }

    pub fn stats(&self) -> &SharedSessionStats {
        &self.stats
    }
}

impl Drop for PostureController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::{ConnectionState, Posture};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sends a fixed script of events, then idles until shut down.
    struct ScriptedSource {
        script: Vec<PostureEvent>,
        spawns: Arc<AtomicUsize>,
    }

    impl PostureSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn spawn(self: Box<Self>, events: mpsc::Sender<PostureEvent>) -> Subscription {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            let script = self.script;
            Subscription::spawn(move |shutdown| async move {
                for event in script {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                let _ = shutdown.await;
            })
        }
    }

    /// Sends a reading every few milliseconds forever.
    struct TickingSource;

    impl PostureSource for TickingSource {
        fn name(&self) -> &'static str {
            "ticking"
        }

        fn spawn(self: Box<Self>, events: mpsc::Sender<PostureEvent>) -> Subscription {
            Subscription::spawn(move |mut shutdown| async move {
                let wires = ["parado", "sentado", "echado", "caido_suelo"];
                let mut i = 0;
                loop {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(Duration::from_millis(2)) => {}
                    }
                    let event = PostureEvent::Reading(json!({ "postura": wires[i % 4] }));
                    if events.send(event).await.is_err() {
                        break;
                    }
                    i += 1;
                }
            })
        }
    }

    fn scripted(script: Vec<PostureEvent>) -> (PostureController, Arc<AtomicUsize>) {
        let spawns = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource {
            script,
            spawns: spawns.clone(),
        };
        (PostureController::new(Box::new(source)), spawns)
    }

    fn reading(wire: &str) -> PostureEvent {
        PostureEvent::Reading(json!({ "postura": wire }))
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (mut controller, spawns) = scripted(vec![]);
        assert!(controller.connect());
        assert!(!controller.connect());
        assert_eq!(spawns.load(Ordering::SeqCst), 1);
        assert!(controller.is_active());
    }

    #[tokio::test]
    async fn test_events_applied_in_order() {
        let (mut controller, _) = scripted(vec![
            PostureEvent::TransportUp,
            reading("sentado"),
            reading("caido_suelo"),
        ]);
        controller.connect();

        for _ in 0..3 {
            controller.next_event().await.unwrap();
        }

        assert_eq!(controller.state().posture(), Posture::Fallen);
        assert!(controller.state().connection().is_connected());
        assert!(controller.state().error().is_none());

        let stats = controller.stats().snapshot();
        assert_eq!(stats.readings_accepted, 2);
    }

    #[tokio::test]
    async fn test_invalid_then_valid_reading() {
        let (mut controller, _) = scripted(vec![
            reading("echado"),
            reading("volando"),
            reading("parado"),
        ]);
        controller.connect();

        controller.next_event().await.unwrap();
        let state = controller.next_event().await.unwrap();
        assert_eq!(state.posture(), Posture::Lying);
        assert_eq!(
            controller.view(),
            View::Error {
                message: "Postura inválida recibida".to_string()
            }
        );

        let state = controller.next_event().await.unwrap();
        assert_eq!(state.posture(), Posture::Standing);
        assert!(state.error().is_none());
        assert_eq!(controller.stats().snapshot().readings_rejected, 1);
    }

    #[test]
    fn test_direct_callbacks() {
        let (mut controller, _) = scripted(vec![]);

        controller.on_transport_up();
        controller.on_reading(json!({"postura": "sentado"}));
        controller.on_transport_down(TransportError::Dropped("reset".to_string()));
        assert_eq!(controller.state().connection(), &ConnectionState::Disconnected);
        assert_eq!(controller.state().posture(), Posture::Sitting);
        assert!(matches!(controller.view(), View::Error { .. }));

        controller.on_fetch_error(FetchError::Status(502));
        assert!(matches!(
            controller.state().connection(),
            ConnectionState::Errored(_)
        ));

        controller.on_transport_up();
        assert!(controller.state().connection().is_connected());
        assert!(matches!(controller.view(), View::Posture { .. }));
    }

    #[tokio::test]
    async fn test_no_mutation_after_teardown() {
        let mut controller = PostureController::new(Box::new(TickingSource));
        controller.connect();

        for _ in 0..3 {
            controller.next_event().await.unwrap();
        }
        controller.teardown();
        let frozen = controller.state().clone();
        let accepted = controller.stats().snapshot().readings_accepted;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(controller.next_event().await.is_none());

        controller.on_reading(json!({"postura": "caido_suelo"}));
        controller.on_transport_down(TransportError::Dropped("late".to_string()));
        assert!(!controller.apply(PostureEvent::TransportUp));

        assert_eq!(controller.state(), &frozen);
        assert_eq!(controller.stats().snapshot().readings_accepted, accepted);
        assert!(!controller.is_active());
        assert!(!controller.connect());
    }

    #[tokio::test]
    async fn test_next_event_before_connect() {
        let (mut controller, _) = scripted(vec![reading("sentado")]);
        assert!(controller.next_event().await.is_none());
    }

    #[cfg(all(feature = "stream", feature = "poll"))]
    #[test]
    fn test_from_config_selects_mode() {
        let mut config = Config::default();
        config.mode = SourceMode::Poll;
        assert!(PostureController::from_config(&config).is_ok());

        config.mode = SourceMode::Stream;
        assert!(PostureController::from_config(&config).is_ok());
    }
}
