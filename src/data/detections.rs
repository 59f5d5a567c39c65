//! Detection CSV rows: `x0,y0,x1,y1,score,label,poly_x,poly_y`.
//!
//! Values are kept as text until conversion so that a missing field can be
//! told apart from one that is present but not a number.

use ebat_geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::model::{Cell, CellSource};

/// Columns the detection CSV is expected to carry.
pub const REQUIRED_HEADERS: &[&str] = &["x0", "y0", "x1", "y1", "score", "label"];

/// One raw row from the detection data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionRow {
    pub x0: Option<String>,
    pub y0: Option<String>,
    pub x1: Option<String>,
    pub y1: Option<String>,
    pub score: Option<String>,
    pub label: Option<String>,
    /// Comma-joined x coordinates of the outline
    pub poly_x: Option<String>,
    /// Comma-joined y coordinates of the outline
    pub poly_y: Option<String>,
}

/// Why a row could not become a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDefect {
    /// A box coordinate is absent or empty
    MissingField(&'static str),
    /// The derived centroid is NaN or infinite
    NonFiniteCentroid,
}

impl std::fmt::Display for RowDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowDefect::MissingField(field) => write!(f, "missing field '{}'", field),
            RowDefect::NonFiniteCentroid => f.write_str("invalid centroid"),
        }
    }
}

impl DetectionRow {
    /// A row from already-numeric values, without outline.
    pub fn from_values(x0: f32, y0: f32, x1: f32, y1: f32, score: f32, label: i32) -> Self {
        Self {
            x0: Some(x0.to_string()),
            y0: Some(y0.to_string()),
            x1: Some(x1.to_string()),
            y1: Some(y1.to_string()),
            score: Some(score.to_string()),
            label: Some(label.to_string()),
            poly_x: None,
            poly_y: None,
        }
    }

    /// Attach an outline given as separate x and y lists.
    pub fn with_polygon(mut self, xs: &[f32], ys: &[f32]) -> Self {
        self.poly_x = Some(join_coords(xs));
        self.poly_y = Some(join_coords(ys));
        self
    }

    /// Convert to a [`Cell`] (index left for the registry to assign).
    ///
    /// Box coordinates must be present; any other non-numeric value is read
    /// as 0. Outline lists are truncated to the shorter of the two.
    pub fn to_cell(&self) -> Result<Cell, RowDefect> {
        let x0 = required(self.x0.as_deref(), "x0")?;
        let y0 = required(self.y0.as_deref(), "y0")?;
        let x1 = required(self.x1.as_deref(), "x1")?;
        let y1 = required(self.y1.as_deref(), "y1")?;
        let score = coerce_f32(self.score.as_deref());
        let label = coerce_label(self.label.as_deref());

        let polygon = match (self.poly_x.as_deref(), self.poly_y.as_deref()) {
            (Some(px), Some(py)) => {
                let xs = parse_coord_list(px);
                let ys = parse_coord_list(py);
                let vertices: Vec<Point> =
                    xs.into_iter().zip(ys).map(|(x, y)| Point::new(x, y)).collect();
                (!vertices.is_empty()).then_some(vertices)
            }
            _ => None,
        };

        Cell::new(
            BoundingBox::from_corners(x0, y0, x1, y1),
            polygon,
            score,
            label,
            CellSource::Detected,
        )
        .ok_or(RowDefect::NonFiniteCentroid)
    }
}

fn required(value: Option<&str>, field: &'static str) -> Result<f32, RowDefect> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(coerce_f32(Some(text))),
        _ => Err(RowDefect::MissingField(field)),
    }
}

/// Parse a number, falling back to 0 for anything unparsable.
pub fn coerce_f32(value: Option<&str>) -> f32 {
    value
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(0.0)
}

/// Parse an integer label; "3.0" reads as 3, anything else as 0.
fn coerce_label(value: Option<&str>) -> i32 {
    let Some(text) = value.map(str::trim) else {
        return 0;
    };
    text.parse::<i32>()
        .ok()
        .or_else(|| {
            text.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i32)
        })
        .unwrap_or(0)
}

/// Split a comma-joined coordinate list, skipping empty entries.
pub fn parse_coord_list(text: &str) -> Vec<f32> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| coerce_f32(Some(s)))
        .collect()
}

/// Join coordinates into the comma-separated form used by the CSV files.
pub fn join_coords(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Read detection rows from CSV text.
///
/// Only a failure to read the header line is an error. Records that fail to
/// decode are logged and skipped; blank lines are ignored.
pub fn parse_detections_csv(text: &str) -> Result<Vec<DetectionRow>, DataError> {
    if text.trim().is_empty() {
        log::warn!("Detection CSV is empty");
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_HEADERS
        .iter()
        .copied()
        .filter(|h| !headers.iter().any(|found| found == *h))
        .collect();
    if !missing.is_empty() {
        log::warn!("Detection CSV is missing headers: {:?}", missing);
    }

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<DetectionRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => log::warn!("Skipping unreadable detection record {}: {}", i, e),
        }
    }
    Ok(rows)
}
