//! CLI command implementations.

pub(crate) mod render;
pub(crate) mod segment;

pub(crate) use render::RenderArgs;
pub(crate) use segment::SegmentArgs;
