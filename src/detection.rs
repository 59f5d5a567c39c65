//! External collaborators of the engine and the types exchanged with them.
//!
//! The backend (detection CSVs, the similarity inference service, and the
//! annotation store) is opaque to the engine. It is reached through the three
//! traits below, which the hosting application implements over its transport.

use std::time::Duration;

use ebat_geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

use crate::constants::{CUMULATIVE_MIN_SEEDS, MAX_RETRY_DELAY, USER_ONLY_MIN_SEEDS};
use crate::data::DetectionRow;
use crate::error::CollaboratorError;
use crate::model::{SlideId, TypeCounts};

// ============================================================================
// Collaborator traits
// ============================================================================

/// Supplies the initial candidate cells for a slide.
pub trait DetectionSource {
    fn fetch_detections(&self, slide: &SlideId) -> Result<Vec<DetectionRow>, CollaboratorError>;
}

/// The similarity ("find similar cells") inference service.
pub trait SimilarityDetector {
    /// Return additional candidates resembling the selected seeds.
    fn detect(&self, query: &SimilarityQuery) -> Result<Vec<SimilarityResult>, CollaboratorError>;
}

/// Persists finalized annotations for a slide.
pub trait CommitSink {
    fn commit(&self, slide: &SlideId, submission: &Submission) -> Result<(), CollaboratorError>;
}

// ============================================================================
// Similarity request / response
// ============================================================================

/// Which selections seed a similarity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMode {
    /// Only cells the user picked by hand
    UserOnly,
    /// Everything selected so far, including earlier detection results
    #[default]
    Cumulative,
}

impl SimilarityMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMode::UserOnly => "user_only",
            SimilarityMode::Cumulative => "cumulative",
        }
    }

    /// Default number of selected cells required before a request.
    pub fn default_min_seeds(&self) -> usize {
        match self {
            SimilarityMode::UserOnly => USER_ONLY_MIN_SEEDS,
            SimilarityMode::Cumulative => CUMULATIVE_MIN_SEEDS,
        }
    }
}

/// One registry cell as sent to the similarity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRow {
    /// `cell_<index>`
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub score: f32,
    pub selected: bool,
}

/// A complete similarity request.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    pub slide: SlideId,
    pub seeds: Vec<SeedRow>,
    /// 1 (most lenient) to 10 (most strict)
    pub strictness: u8,
    pub mode: SimilarityMode,
}

impl SimilarityQuery {
    /// Number of seeds flagged as selected.
    pub fn selected_count(&self) -> usize {
        self.seeds.iter().filter(|s| s.selected).count()
    }
}

/// One candidate returned by the similarity service, in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub position: Point,
    pub score: f32,
    /// Optional `cell_<index>` label naming an existing cell.
    pub label: Option<String>,
}

impl SimilarityResult {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self {
            position: Point::new(x, y),
            score,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A committed cell as handed to the [`CommitSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRow {
    pub bbox: BoundingBox,
    pub polygon: Option<Vec<Point>>,
    pub score: f32,
    pub cell_type: String,
}

/// Everything the [`CommitSink`] receives for one slide.
///
/// A slide rejected for poor image quality is sent with no rows and no
/// counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub rows: Vec<CommitRow>,
    /// Whether the annotator judged the slide image usable
    pub image_quality: bool,
    /// Committed cells per cell type
    pub type_counts: TypeCounts,
}

impl Submission {
    /// Committed annotations on a slide of usable quality.
    pub fn annotated(rows: Vec<CommitRow>, type_counts: TypeCounts) -> Self {
        Self {
            rows,
            image_quality: true,
            type_counts,
        }
    }

    /// A slide skipped because its image is unusable.
    pub fn poor_quality() -> Self {
        Self {
            rows: Vec::new(),
            image_quality: false,
            type_counts: TypeCounts::new(),
        }
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Retry with fixed or exponential delay for collaborator calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_millis")]
    pub delay: Duration,
    /// Multiplier applied to the delay after each retry; values <= 1 keep it
    /// fixed. The grown delay saturates at [`MAX_RETRY_DELAY`].
    pub backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1500),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Run `op`, sleeping on the current thread between attempts.
    pub fn execute<T>(
        &self,
        op: impl FnMut() -> Result<T, CollaboratorError>,
    ) -> Result<T, CollaboratorError> {
        self.execute_with(op, std::thread::sleep)
    }

    /// Run `op`, retrying retryable failures; `sleep` is called with each delay.
    pub fn execute_with<T>(
        &self,
        mut op: impl FnMut() -> Result<T, CollaboratorError>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, CollaboratorError> {
        let mut delay = self.delay.min(MAX_RETRY_DELAY);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    attempt += 1;
                    log::warn!(
                        "Retry attempt {}/{} after {:?}: {}",
                        attempt,
                        self.max_retries,
                        delay,
                        err
                    );
                    sleep(delay);
                    delay = self.next_delay(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        if self.backoff_multiplier > 1.0 {
            let grown = delay.as_secs_f64() * f64::from(self.backoff_multiplier);
            Duration::try_from_secs_f64(grown)
                .map_or(MAX_RETRY_DELAY, |grown| grown.min(MAX_RETRY_DELAY))
        } else {
            delay
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
