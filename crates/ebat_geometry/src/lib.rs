//! Pure geometry for the EBAT annotation engine.
//!
//! Everything in this crate is free of UI state: image/screen coordinate
//! mapping, the pan/zoom viewport, polygon primitives and Ramer-Douglas-Peucker
//! simplification. All coordinates are `f32` pixels.

pub mod mapper;
pub mod shape;
pub mod simplify;
pub mod viewport;

pub use mapper::CoordinateMapper;
pub use shape::{BoundingBox, Point, Size, polygon_bounds, polygon_centroid, polygon_contains};
pub use simplify::{perpendicular_distance, simplify};
pub use viewport::{PanDragState, Viewport, ZoomLimits};
