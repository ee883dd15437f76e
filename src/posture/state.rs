//! Dashboard state and the reducer that advances it.
//!
//! All state changes go through [`reduce`], which takes the current
//! state, one event, and the time of receipt, and returns the next state.

use crate::error::{DashboardError, FetchError, TransportError};
use crate::posture::types::{Posture, Reading};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Something a data source observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PostureEvent {
    /// Transport connected (or reconnected)
    TransportUp,
    /// Transport failed to connect or went away
    TransportDown(TransportError),
    /// A payload arrived; not yet validated
    Reading(Value),
    /// A polling cycle failed
    FetchFailed(FetchError),
}

/// Connectivity as derived from transport events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
    Errored(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Errored(msg) => write!(f, "errored: {msg}"),
        }
    }
}

/// Everything the view needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardState {
    reading: Option<Reading>,
    connection: ConnectionState,
    error: Option<DashboardError>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last accepted reading, if any.
    pub fn reading(&self) -> Option<&Reading> {
        self.reading.as_ref()
    }

    /// Current posture, `Unknown` until the first valid reading.
    pub fn posture(&self) -> Posture {
        self.reading
            .map(|r| r.posture())
            .unwrap_or(Posture::Unknown)
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    /// The error to display, if any. Takes priority over the reading.
    pub fn error(&self) -> Option<&DashboardError> {
        self.error.as_ref()
    }
}

/// Apply one event to `state`, returning the next state.
///
/// - A valid reading replaces the stored one, marks the transport as
///   connected and clears the error.
/// - An invalid reading sets an error and leaves the stored reading as is.
/// - Transport and fetch failures set an error and keep the stale reading.
pub fn reduce(state: &DashboardState, event: &PostureEvent, now: DateTime<Utc>) -> DashboardState {
    let mut next = state.clone();

    match event {
        PostureEvent::TransportUp => {
            next.connection = ConnectionState::Connected;
            next.error = None;
        }
        PostureEvent::TransportDown(reason) => {
            next.connection = match reason {
                TransportError::Dropped(_) => ConnectionState::Disconnected,
                TransportError::ConnectFailed(_) => ConnectionState::Errored(reason.to_string()),
            };
            next.error = Some(reason.clone().into());
        }
        PostureEvent::Reading(raw) => match Reading::accept(raw, now) {
            Ok(reading) => {
                next.reading = Some(reading);
                next.connection = ConnectionState::Connected;
                next.error = None;
            }
            Err(e) => {
                next.connection = ConnectionState::Errored(e.to_string());
                next.error = Some(e.into());
            }
        },
        PostureEvent::FetchFailed(e) => {
            next.connection = ConnectionState::Errored(e.to_string());
            next.error = Some(e.clone().into());
        }
    }

    next
}
