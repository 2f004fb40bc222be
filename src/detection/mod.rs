//! Rate-windowed abuse detection

mod detector;
mod event;
mod latch;
mod window;

pub use detector::{AbuseDetector, Detection, RemediationOutcome};
pub use event::{ActionKind, ActorContext, ObservedAction};
pub use latch::{DEFAULT_COOLDOWN, PunishmentDeduplicator};
pub use window::{ActionWindow, WindowKey};
