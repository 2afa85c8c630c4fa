pub mod backend;
pub mod core;
pub mod handles;
pub mod scene;

pub use handles::*;
pub use scene::{Scene, SceneError};
