//! HTTP API handlers for minivgg-train

pub mod health;
pub mod jobs;
pub mod train;

pub use health::health_routes;
pub use jobs::job_routes;
pub use train::train_routes;
