//! Posture model and dashboard state.
//!
//! This module contains:
//! - The posture enumeration and validated readings
//! - The dashboard state and its reducer

pub mod state;
pub mod types;

// Re-export commonly used types
pub use state::{reduce, ConnectionState, DashboardState, PostureEvent};
pub use types::{Posture, PostureInfo, Reading};
