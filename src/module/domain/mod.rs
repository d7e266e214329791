pub mod diff;
pub mod normalize;
pub mod schema;
