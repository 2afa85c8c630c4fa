mod bounds;
mod logging;

pub use bounds::BoundingBox;

pub use tracing;
