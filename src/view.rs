//! Text rendering of the dashboard.
//!
//! The view is derived entirely from [`DashboardState`]. An error always
//! wins over a (possibly stale) reading.

use crate::posture::{DashboardState, Posture, PostureInfo};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

/// Dashboard title.
pub const TITLE: &str = "Monitor de Postura";

/// Shown before the first reading arrives.
pub const WAITING_MESSAGE: &str = "Esperando datos de postura...";

const TIME_FORMAT: &str = "%H:%M:%S";

/// What the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Error banner replacing the status card
    Error { message: String },
    /// Status card for the current posture
    Posture {
        posture: Posture,
        info: PostureInfo,
        updated_at: DateTime<Utc>,
    },
    /// Nothing received yet
    Waiting,
}

impl View {
    /// Derive the view from the dashboard state.
    pub fn from_state(state: &DashboardState) -> Self {
        if let Some(error) = state.error() {
            return View::Error {
                message: error.message(),
            };
        }

        match state.reading() {
            Some(reading) => match reading.posture().info() {
                Some(info) => View::Posture {
                    posture: reading.posture(),
                    info,
                    updated_at: reading.received_at(),
                },
                None => View::Waiting,
            },
            None => View::Waiting,
        }
    }

    /// Render as text, with timestamps in `tz` (local time if `None`).
    pub fn render(&self, tz: Option<Tz>) -> String {
        match self {
            View::Error { message } => format!("[!] Error de conexión: {message}"),
            View::Posture {
                info, updated_at, ..
            } => {
                let marker = if info.alert { "[!!]" } else { "[ok]" };
                format!(
                    "{marker} {} - {} (Actualizado: {})",
                    info.label,
                    info.description,
                    format_time(*updated_at, tz)
                )
            }
            View::Waiting => WAITING_MESSAGE.to_string(),
        }
    }

    /// Whether the view calls for attention.
    pub fn is_alert(&self) -> bool {
        match self {
            View::Error { .. } => true,
            View::Posture { info, .. } => info.alert,
            View::Waiting => false,
        }
    }
}

/// Format a timestamp as wall-clock time.
pub fn format_time(at: DateTime<Utc>, tz: Option<Tz>) -> String {
    match tz {
        Some(tz) => at.with_timezone(&tz).format(TIME_FORMAT).to_string(),
        None => at.with_timezone(&Local).format(TIME_FORMAT).to_string(),
    }
}

/// Legend of every posture the dashboard can show.
pub fn legend() -> String {
    let mut out = String::from("Leyenda de estados\n");
    for posture in Posture::KNOWN {
        if let Some(info) = posture.info() {
            out.push_str(&format!("  {:<8} {}\n", info.label, info.description));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::{reduce, PostureEvent};
    use chrono::TimeZone;
    use serde_json::json;

    fn state_with(wires: &[&str]) -> DashboardState {
        wires.iter().fold(DashboardState::new(), |state, wire| {
            reduce(
                &state,
                &PostureEvent::Reading(json!({ "postura": wire })),
                Utc::now(),
            )
        })
    }

    #[test]
    fn test_waiting_before_first_reading() {
        let view = View::from_state(&DashboardState::new());
        assert_eq!(view, View::Waiting);
        assert_eq!(view.render(None), WAITING_MESSAGE);
    }

    #[test]
    fn test_error_wins_over_reading() {
        let view = View::from_state(&state_with(&["sentado", "volando"]));
        assert_eq!(
            view,
            View::Error {
                message: "Postura inválida recibida".to_string()
            }
        );
        assert!(view.render(None).contains("Postura inválida recibida"));
    }

    #[test]
    fn test_fallen_card_alerts() {
        let view = View::from_state(&state_with(&["sentado", "caido_suelo"]));
        match &view {
            View::Posture { posture, info, .. } => {
                assert_eq!(*posture, Posture::Fallen);
                assert_eq!(info.label, "Caído");
            }
            other => panic!("unexpected view {other:?}"),
        }
        assert!(view.is_alert());
        assert!(view.render(None).contains("¡Posible caída detectada!"));
    }

    #[test]
    fn test_format_time_in_zone() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 15, 4, 5).unwrap();
        assert_eq!(format_time(at, Some(chrono_tz::UTC)), "15:04:05");
        assert_eq!(format_time(at, Some(chrono_tz::America::Lima)), "10:04:05");
    }

    #[test]
    fn test_legend_lists_all_postures() {
        let legend = legend();
        for posture in Posture::KNOWN {
            assert!(legend.contains(posture.info().unwrap().label));
        }
    }
}
