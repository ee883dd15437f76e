//! Error taxonomy for the posture monitor.
//!
//! Every error here is recovered locally: the controller folds it into a
//! displayable message and keeps running. `Display` yields the message
//! shown to the person watching the dashboard; the technical detail
//! stays in the variant and is only logged.

/// Message shown when a payload does not carry a valid posture.
pub const INVALID_POSTURE_MESSAGE: &str = "Postura inválida recibida";

/// Message shown when the backend cannot be reached.
pub const CONNECT_FAILED_MESSAGE: &str = "No se pudo conectar al servidor";

/// Message shown when an established connection is lost.
pub const CONNECTION_LOST_MESSAGE: &str = "Conexión perdida con el servidor";

/// Transport-level failures (socket or HTTP connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish the connection
    ConnectFailed(String),
    /// An established connection went away
    Dropped(String),
}

impl TransportError {
    /// Technical detail for logs.
    pub fn detail(&self) -> &str {
        match self {
            TransportError::ConnectFailed(d) | TransportError::Dropped(d) => d,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::ConnectFailed(_) => f.write_str(CONNECT_FAILED_MESSAGE),
            TransportError::Dropped(_) => f.write_str(CONNECTION_LOST_MESSAGE),
        }
    }
}

impl std::error::Error for TransportError {}

/// A payload that does not name one of the known postures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No posture field, or the payload is not an object
    MissingPosture,
    /// Posture field present but not a known value
    UnknownPosture(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(INVALID_POSTURE_MESSAGE)
    }
}

impl std::error::Error for ValidationError {}

/// Failures of a single polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Server answered with a non-success status
    Status(u16),
    /// Body was not valid JSON
    Decode(String),
    /// Request never got a response
    Network(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Status(code) => write!(f, "El servidor respondió con estado {code}"),
            FetchError::Decode(_) => f.write_str("Respuesta inválida del servidor"),
            FetchError::Network(_) => f.write_str(CONNECT_FAILED_MESSAGE),
        }
    }
}

impl std::error::Error for FetchError {}

/// Any error the dashboard can display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    Transport(TransportError),
    Validation(ValidationError),
    Fetch(FetchError),
}

impl DashboardError {
    /// The message for the error banner.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for DashboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DashboardError::Transport(e) => e.fmt(f),
            DashboardError::Validation(e) => e.fmt(f),
            DashboardError::Fetch(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DashboardError::Transport(e) => Some(e),
            DashboardError::Validation(e) => Some(e),
            DashboardError::Fetch(e) => Some(e),
        }
    }
}

impl From<TransportError> for DashboardError {
    fn from(e: TransportError) -> Self {
        DashboardError::Transport(e)
    }
}

impl From<ValidationError> for DashboardError {
    fn from(e: ValidationError) -> Self {
        DashboardError::Validation(e)
    }
}

impl From<FetchError> for DashboardError {
    fn from(e: FetchError) -> Self {
        DashboardError::Fetch(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hides_detail() {
        let err = TransportError::ConnectFailed("tcp connect error: refused".to_string());
        assert_eq!(err.to_string(), CONNECT_FAILED_MESSAGE);
        assert_eq!(err.detail(), "tcp connect error: refused");

        let err = ValidationError::UnknownPosture("volando".to_string());
        assert_eq!(err.to_string(), "Postura inválida recibida");
    }

    #[test]
    fn test_fetch_status_message() {
        let err = DashboardError::from(FetchError::Status(500));
        assert!(err.message().contains("500"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
