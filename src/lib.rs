//! Posture Monitor - near real-time posture display for a fall-detection backend.
//!
//! This library keeps a single authoritative "current posture" in sync
//! with a remote sensing backend, either over a Socket.IO event stream or
//! by polling an HTTP endpoint, and derives a displayable connection/error
//! state from whatever the transport reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Posture Monitor                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Source    │──▶│ Controller  │──▶│    View     │        │
//! │  │(stream/poll)│   │  (reducer)  │   │   (text)    │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                           │                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐                          │
//! │                    │   Session   │                          │
//! │                    │    Stats    │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use posture_monitor::{Config, PostureController};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let mut controller = PostureController::from_config(&config)?;
//! controller.connect();
//!
//! while controller.next_event().await.is_some() {
//!     println!("{}", controller.view().render(None));
//! }
//!
//! controller.teardown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod posture;
pub mod source;
pub mod stats;
pub mod view;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SourceMode};
pub use controller::PostureController;
pub use error::{DashboardError, FetchError, TransportError, ValidationError};
pub use posture::{reduce, ConnectionState, DashboardState, Posture, PostureEvent, Reading};
pub use source::{PostureSource, Subscription};
pub use stats::{SessionStats, SharedSessionStats, StatsSnapshot};
pub use view::View;

#[cfg(feature = "poll")]
pub use source::PollSource;

#[cfg(feature = "stream")]
pub use source::StreamSource;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
