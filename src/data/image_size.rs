//! Slide image header probing.

use std::path::Path;

use ebat_geometry::Size;

use crate::error::DataError;

/// Read the pixel dimensions of a slide image without decoding it.
pub fn read_image_size(path: impl AsRef<Path>) -> Result<Size, DataError> {
    let path = path.as_ref();
    let (width, height) = image::image_dimensions(path).map_err(|source| DataError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("Image {:?} is {}x{}", path, width, height);
    Ok(Size::new(width as f32, height as f32))
}
