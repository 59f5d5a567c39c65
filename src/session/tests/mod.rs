//! Scenario tests for the annotation session.
//!
//! The fixture slide is a 1000x1000 image shown in a 500x500 container, so
//! the base scale is 0.5 and screen = image / 2 at the default viewport.

mod drawing_tests;
mod similarity_tests;
mod viewport_tests;

use std::cell::RefCell;
use std::collections::VecDeque;

use ebat_geometry::{Point, Size};

use crate::config::EngineConfig;
use crate::data::DetectionRow;
use crate::detection::{
    CommitSink, RetryPolicy, SimilarityDetector, SimilarityQuery, SimilarityResult, Submission,
};
use crate::error::CollaboratorError;
use crate::model::SlideId;
use crate::session::AnnotationSession;

/// Five 10x10 cells along the top edge; cell `i` has centroid `(100i + 5, 5)`.
fn detection_rows() -> Vec<DetectionRow> {
    (0..5)
        .map(|i| {
            let x = i as f32 * 100.0;
            DetectionRow::from_values(x, 0.0, x + 10.0, 10.0, 0.8, 1)
        })
        .collect()
}

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.detection.retry = RetryPolicy::none();
    config
}

/// A session with the fixture slide loaded and the image size known.
fn ready_session() -> AnnotationSession {
    let mut session = AnnotationSession::new(test_config());
    session.set_container(Size::new(500.0, 500.0));
    session.load_slide(SlideId::new("slide-1"), &detection_rows());
    session.set_image_size(Size::new(1000.0, 1000.0)).unwrap();
    session.drain_events();
    session
}

/// Screen position of an image point at the default viewport.
fn screen(x: f32, y: f32) -> Point {
    Point::new(x / 2.0, y / 2.0)
}

/// Screen position of cell `i`'s centroid at the default viewport.
fn cell_screen(i: usize) -> Point {
    screen(i as f32 * 100.0 + 5.0, 5.0)
}

/// A result sitting on cell `i`'s centroid.
fn result_on(i: usize) -> SimilarityResult {
    SimilarityResult::new(i as f32 * 100.0 + 5.0, 5.0, 0.7)
}

/// Similarity service returning canned responses in order.
#[derive(Default)]
struct ScriptedDetector {
    responses: RefCell<VecDeque<Result<Vec<SimilarityResult>, CollaboratorError>>>,
    queries: RefCell<Vec<SimilarityQuery>>,
}

impl ScriptedDetector {
    fn with(responses: Vec<Result<Vec<SimilarityResult>, CollaboratorError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            queries: RefCell::new(Vec::new()),
        }
    }
}

impl SimilarityDetector for ScriptedDetector {
    fn detect(&self, query: &SimilarityQuery) -> Result<Vec<SimilarityResult>, CollaboratorError> {
        self.queries.borrow_mut().push(query.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Commit sink that keeps what it receives.
#[derive(Default)]
struct RecordingSink {
    received: RefCell<Vec<(SlideId, Submission)>>,
}

impl CommitSink for RecordingSink {
    fn commit(&self, slide: &SlideId, submission: &Submission) -> Result<(), CollaboratorError> {
        self.received
            .borrow_mut()
            .push((slide.clone(), submission.clone()));
        Ok(())
    }
}
