//! HTTP API handlers for remasterd

pub mod health;
pub mod mastering;
pub mod segments;
pub mod tracks;

pub use health::health_routes;
pub use mastering::mastering_routes;
pub use segments::segment_routes;
pub use tracks::track_routes;
