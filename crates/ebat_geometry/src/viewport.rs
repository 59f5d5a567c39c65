//! Pan/zoom viewport state and zoom-about-a-point mathematics.

use serde::{Deserialize, Serialize};

use crate::mapper::CoordinateMapper;
use crate::shape::Point;

/// Allowed zoom range, relative to the fit-to-container scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLimits {
    pub min: f32,
    pub max: f32,
}

impl ZoomLimits {
    pub const DEFAULT_MIN: f32 = 0.25;
    pub const DEFAULT_MAX: f32 = 8.0;

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Saturate a zoom value into the range.
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
    }
}

/// User zoom and pan for the current image.
///
/// `zoom` multiplies the mapper's base scale, `pan` is a screen-space offset
/// added after the image has been centred. Pan is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f32,
    pub pan: Point,
}

impl Viewport {
    pub fn new(zoom: f32, pan: Point) -> Self {
        Self { zoom, pan }
    }

    /// Zoom 1.0, no pan.
    pub fn identity() -> Self {
        Self::new(1.0, Point::ORIGIN)
    }

    /// Back to fit-to-container.
    pub fn reset(&mut self) {
        *self = Self::identity();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    /// Multiply the effective scale by `factor`, keeping the image point under
    /// `focal` visually fixed.
    ///
    /// With no focal point the image's own centre on screen is used ("zoom to
    /// centre"). The new scale saturates at `[base * min, base * max]`. The pan
    /// correction is added to the current pan rather than recomputed from
    /// scratch so repeated zooms don't accumulate drift.
    pub fn zoom_about(
        &mut self,
        factor: f32,
        focal: Option<Point>,
        mapper: &CoordinateMapper,
        limits: &ZoomLimits,
    ) {
        if !factor.is_finite() || factor <= 0.0 {
            log::debug!("Ignoring zoom factor {}", factor);
            return;
        }

        let base = mapper.base_scale();
        if base <= 0.0 {
            // No image geometry yet: only the zoom level can change.
            self.zoom = limits.clamp(self.zoom * factor);
            return;
        }

        let old_scale = base * self.zoom;
        let old_offset = mapper.offset(self);
        let focal = focal.unwrap_or_else(|| mapper.image_center_on_screen(self));

        // Image-space point under the focal point before zooming
        let image_x = (focal.x - old_offset.x) / old_scale;
        let image_y = (focal.y - old_offset.y) / old_scale;

        let new_scale = (old_scale * factor).clamp(base * limits.min, base * limits.max);

        // Offset that puts the same image point back under the focal point
        let new_offset_x = focal.x - image_x * new_scale;
        let new_offset_y = focal.y - image_y * new_scale;

        self.pan.x += new_offset_x - old_offset.x;
        self.pan.y += new_offset_y - old_offset.y;
        self.zoom = new_scale / base;
    }

    /// Button zoom-in about the image centre.
    pub fn zoom_in(&mut self, step: f32, mapper: &CoordinateMapper, limits: &ZoomLimits) {
        self.zoom_about(step, None, mapper, limits);
    }

    /// Button zoom-out about the image centre.
    pub fn zoom_out(&mut self, step: f32, mapper: &CoordinateMapper, limits: &ZoomLimits) {
        self.zoom_about(1.0 / step, None, mapper, limits);
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pan drag interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PanDragState {
    /// Not dragging
    #[default]
    Idle,
    /// Dragging with last pointer position (screen space)
    Dragging { last_pos: Point },
}

impl PanDragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, PanDragState::Dragging { .. })
    }

    pub fn start_drag(&mut self, pos: Point) {
        *self = PanDragState::Dragging { last_pos: pos };
    }

    /// Move the drag to `pos`, returning the delta since the previous position.
    pub fn drag_to(&mut self, pos: Point) -> Option<(f32, f32)> {
        match self {
            PanDragState::Dragging { last_pos } => {
                let delta = (pos.x - last_pos.x, pos.y - last_pos.y);
                *last_pos = pos;
                Some(delta)
            }
            PanDragState::Idle => None,
        }
    }

    pub fn stop_drag(&mut self) {
        *self = PanDragState::Idle;
    }
}
