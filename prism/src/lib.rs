//! Renderer-agnostic scene graph with swappable rendering backends.
//!
//! Client code builds a scene graph of visuals, cameras, lights, meshes and
//! materials through [`Scene`]; every operation is translated into calls
//! against whichever [`backend::RenderContext`] the scene was created with.
//! Entities created by one context can never corrupt another: each
//! cross-entity operation narrows its argument against the receiver's context
//! and degrades to a reported no-op on mismatch.

pub mod engine;

pub use engine::*;

pub use ::prism_utils;
pub use ::tracing;
