//! Conversion between image-pixel space and container (screen) space.
//!
//! The image is first fitted into the container ("base scale"), then the
//! viewport's zoom multiplies that scale and its pan shifts the centred image.
//! Screen coordinates are relative to the container's top-left corner.

use crate::shape::{Point, Size};
use crate::viewport::Viewport;

/// Maps points for one image displayed inside one container.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoordinateMapper {
    image: Size,
    container: Size,
}

impl CoordinateMapper {
    pub fn new(image: Size, container: Size) -> Self {
        Self { image, container }
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    pub fn container_size(&self) -> Size {
        self.container
    }

    /// Update the container size (window resize).
    pub fn set_container(&mut self, container: Size) {
        self.container = container;
    }

    /// The "fit" scale before user zoom. Zero when either size is unknown.
    pub fn base_scale(&self) -> f32 {
        if self.image.is_empty() || self.container.is_empty() {
            return 0.0;
        }
        (self.container.width / self.image.width).min(self.container.height / self.image.height)
    }

    /// Effective scale: base scale times zoom.
    pub fn scale(&self, viewport: &Viewport) -> f32 {
        self.base_scale() * viewport.zoom
    }

    /// Screen position of the image's top-left corner.
    pub fn offset(&self, viewport: &Viewport) -> Point {
        let scale = self.scale(viewport);
        Point::new(
            (self.container.width - self.image.width * scale) / 2.0 + viewport.pan.x,
            (self.container.height - self.image.height * scale) / 2.0 + viewport.pan.y,
        )
    }

    /// Size of the image as currently displayed.
    pub fn displayed_size(&self, viewport: &Viewport) -> Size {
        let scale = self.scale(viewport);
        Size::new(self.image.width * scale, self.image.height * scale)
    }

    /// Map a screen point to image pixels.
    ///
    /// Returns `None` when the point lands outside `[0, w] x [0, h]` or when the
    /// mapping is undefined (no image dimensions yet).
    pub fn to_image(&self, screen: Point, viewport: &Viewport) -> Option<Point> {
        let scale = self.scale(viewport);
        if scale <= 0.0 || !scale.is_finite() {
            return None;
        }
        let offset = self.offset(viewport);
        let image = Point::new((screen.x - offset.x) / scale, (screen.y - offset.y) / scale);

        let inside = image.x >= 0.0
            && image.y >= 0.0
            && image.x <= self.image.width
            && image.y <= self.image.height;
        inside.then_some(image)
    }

    /// Map an image pixel to its screen position. Points outside the image
    /// are mapped as well.
    pub fn to_screen(&self, image: Point, viewport: &Viewport) -> Point {
        let scale = self.scale(viewport);
        let offset = self.offset(viewport);
        Point::new(offset.x + image.x * scale, offset.y + image.y * scale)
    }

    /// Screen position of the image's own centre.
    pub fn image_center_on_screen(&self, viewport: &Viewport) -> Point {
        self.to_screen(
            Point::new(self.image.width / 2.0, self.image.height / 2.0),
            viewport,
        )
    }
}
