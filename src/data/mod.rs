//! CSV codecs for the files exchanged with the backend, and image probing.
//!
//! - detection CSV: `x0,y0,x1,y1,score,label,poly_x,poly_y`
//! - similarity seeds: `label,x,y,score,selected`
//! - similarity results: `x,y,score,label`
//! - commit CSV: detection layout with the cell type as label
//!
//! Polygon columns hold comma-joined coordinate lists in quoted fields.

mod detections;
mod export;
mod image_size;
mod similarity;

pub use detections::{
    DetectionRow, REQUIRED_HEADERS, RowDefect, coerce_f32, join_coords, parse_coord_list,
    parse_detections_csv,
};
pub use export::encode_commit_csv;
pub use image_size::read_image_size;
pub use similarity::{encode_seeds_csv, parse_similarity_csv};
