#[cfg(feature = "desktop")]
pub mod detector;
pub mod landmark;
pub mod metrics;

#[cfg(feature = "desktop")]
pub use detector::{LandmarkDetector, MoveNetDetector};
pub use landmark::{Landmark, LandmarkIndex, LandmarkSet};
pub use metrics::{extract_metrics, PoseMetrics};
