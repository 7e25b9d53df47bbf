//! Application services: content source seam, routing, binding and rendering.

pub mod binding;
pub mod error;
pub mod render;
pub mod routing;
pub mod source;
