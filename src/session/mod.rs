//! The frame loop's view of the system
//!
//! [`DrivingSession`] ties the mapping, vehicle and trial modules together and
//! produces a [`HudSnapshot`] for whatever renders the HUD.

pub mod driving_session;
pub mod hud;
pub mod notifications;

pub use crate::mapping::dispatcher::Command;
pub use driving_session::{DrivingSession, GO_BANNER_SECONDS};
pub use hud::HudSnapshot;
pub use notifications::{Notification, Notifications};
