#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
pub mod geometry;
pub mod guide;
#[cfg(feature = "desktop")]
pub mod pipeline;
pub mod pose;
pub mod session;
