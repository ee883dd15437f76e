//! Posture values as reported by the sensing backend.
//!
//! Only the four classified postures are ever stored. Anything else the
//! backend sends is rejected at this boundary.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload field carrying the posture, as the backend names it.
pub const POSTURE_FIELD: &str = "postura";

/// Alternative payload field accepted for the posture.
pub const POSTURE_FIELD_ALIAS: &str = "posture";

/// Classified body position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// Nothing accepted yet
    #[default]
    Unknown,
    Standing,
    Sitting,
    Lying,
    Fallen,
}

/// Display metadata for a known posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostureInfo {
    /// Short label
    pub label: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Whether this posture needs attention
    pub alert: bool,
}

impl Posture {
    /// The four postures a reading may hold, in legend order.
    pub const KNOWN: [Posture; 4] = [
        Posture::Standing,
        Posture::Sitting,
        Posture::Lying,
        Posture::Fallen,
    ];

    /// Map a backend value to a posture. Matching is exact.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "parado" => Some(Posture::Standing),
            "sentado" => Some(Posture::Sitting),
            "echado" => Some(Posture::Lying),
            "caido_suelo" => Some(Posture::Fallen),
            _ => None,
        }
    }

    /// The backend value for this posture.
    pub fn wire_name(&self) -> Option<&'static str> {
        match self {
            Posture::Unknown => None,
            Posture::Standing => Some("parado"),
            Posture::Sitting => Some("sentado"),
            Posture::Lying => Some("echado"),
            Posture::Fallen => Some("caido_suelo"),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Posture::Unknown)
    }

    /// Display metadata, `None` for the unset sentinel.
    pub fn info(&self) -> Option<PostureInfo> {
        let info = match self {
            Posture::Unknown => return None,
            Posture::Standing => PostureInfo {
                label: "De pie",
                description: "Postura erguida detectada",
                alert: false,
            },
            Posture::Sitting => PostureInfo {
                label: "Sentado",
                description: "Postura sentada detectada",
                alert: false,
            },
            Posture::Lying => PostureInfo {
                label: "Echado",
                description: "Postura reclinada detectada",
                alert: false,
            },
            Posture::Fallen => PostureInfo {
                label: "Caído",
                description: "¡Posible caída detectada!",
                alert: true,
            },
        };
        Some(info)
    }

    /// Extract and validate the posture carried by a raw payload.
    ///
    /// The payload must be an object whose `postura` (or `posture`) field
    /// is a string naming one of the four known postures. A null `postura`
    /// falls back to `posture`.
    pub fn from_payload(raw: &Value) -> Result<Self, ValidationError> {
        let field = [POSTURE_FIELD, POSTURE_FIELD_ALIAS]
            .into_iter()
            .filter_map(|key| raw.get(key))
            .find(|value| !value.is_null())
            .ok_or(ValidationError::MissingPosture)?;

        match field {
            Value::String(s) => {
                Self::from_wire(s).ok_or_else(|| ValidationError::UnknownPosture(s.clone()))
            }
            other => Err(ValidationError::UnknownPosture(other.to_string())),
        }
    }
}

impl std::fmt::Display for Posture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Posture::Unknown => "unknown",
            Posture::Standing => "standing",
            Posture::Sitting => "sitting",
            Posture::Lying => "lying",
            Posture::Fallen => "fallen",
        };
        f.write_str(name)
    }
}

/// An accepted posture and the time the controller accepted it.
///
/// Fields are private so a reading can only come out of validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reading {
    posture: Posture,
    received_at: DateTime<Utc>,
}

impl Reading {
    /// Validate a raw payload and stamp it with `received_at`.
    pub fn accept(raw: &Value, received_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        let posture = Posture::from_payload(raw)?;
        Ok(Self {
            posture,
            received_at,
        })
    }

    pub fn posture(&self) -> Posture {
        self.posture
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
