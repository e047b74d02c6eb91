pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod params;
pub mod schema;
pub mod types;
