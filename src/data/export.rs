//! Commit CSV: the rows handed to the annotation store.

use serde::Serialize;

use crate::data::join_coords;
use crate::detection::CommitRow;
use crate::error::DataError;

#[derive(Serialize)]
struct CommitRecord<'a> {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    score: f32,
    /// The cell type name
    label: &'a str,
    poly_x: String,
    poly_y: String,
}

/// Encode committed cells as `x0,y0,x1,y1,score,label,poly_x,poly_y`.
///
/// Cells without an outline get empty polygon columns.
pub fn encode_commit_csv(rows: &[CommitRow]) -> Result<String, DataError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        let (xs, ys): (Vec<f32>, Vec<f32>) = row
            .polygon
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| (p.x, p.y))
            .unzip();
        writer.serialize(CommitRecord {
            x0: row.bbox.x0,
            y0: row.bbox.y0,
            x1: row.bbox.x1,
            y1: row.bbox.y1,
            score: row.score,
            label: &row.cell_type,
            poly_x: join_coords(&xs),
            poly_y: join_coords(&ys),
        })?;
    }
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}
