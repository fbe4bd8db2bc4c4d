//! HTTP API handlers

pub mod health;
pub mod items;
pub mod queue;
pub mod recipes;

pub use health::health_routes;
pub use items::item_routes;
pub use queue::queue_routes;
pub use recipes::recipe_routes;
