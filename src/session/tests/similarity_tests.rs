//! Tests for the similarity-detection round trip.

use std::collections::BTreeSet;

use super::{ScriptedDetector, detection_rows, ready_session, result_on};
use crate::detection::{SimilarityMode, SimilarityResult};
use crate::error::{CollaboratorError, EngineError};
use crate::model::{PointSource, SlideId};
use crate::session::{SessionEvent, SimilarityCompletion};
use crate::undo::UndoEntry;

fn applied(completion: SimilarityCompletion) -> crate::selection::BatchOutcome {
    match completion {
        SimilarityCompletion::Applied(outcome) => outcome,
        SimilarityCompletion::Stale => panic!("expected an applied batch"),
    }
}

#[test]
fn test_auto_batch_undo_in_one_step() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let detector = ScriptedDetector::with(vec![Ok(vec![result_on(2), result_on(3), result_on(4)])]);

    let outcome = applied(
        session
            .run_similarity(&detector, SimilarityMode::Cumulative, 5)
            .unwrap(),
    );
    assert_eq!(outcome.selected, vec![2, 3, 4]);
    assert_eq!(session.selection().auto_selected(), &BTreeSet::from([2, 3, 4]));
    assert_eq!(session.selection().candidates().len(), 3);

    let entry = session.undo().unwrap();
    assert!(matches!(entry, UndoEntry::AutoBatch { ref indices, .. } if indices == &[2, 3, 4]));
    assert!(session.selection().auto_selected().is_empty());
    assert!(session.selection().candidates().is_empty());
    assert!(session.selection().points().iter().all(|p| !p.is_auto()));
    assert_eq!(session.selection().user_selected(), &BTreeSet::from([0]));

    // Then the manual pick, then nothing
    session.undo().unwrap();
    assert!(session.undo().is_none());
    assert!(!session.selection().has_working_state());
}

#[test]
fn test_query_contents() {
    let mut session = ready_session();
    session.toggle(1).unwrap();
    let detector = ScriptedDetector::with(vec![Ok(vec![result_on(3)])]);
    session
        .run_similarity(&detector, SimilarityMode::Cumulative, 7)
        .unwrap();
    let detector_two = ScriptedDetector::default();
    session
        .run_similarity(&detector_two, SimilarityMode::Cumulative, 7)
        .unwrap();

    let first = &detector.queries.borrow()[0];
    assert_eq!(first.slide, SlideId::new("slide-1"));
    assert_eq!(first.strictness, 7);
    assert_eq!(first.seeds.len(), 5);
    assert_eq!(first.seeds[1].label, "cell_1");
    assert_eq!((first.seeds[1].x, first.seeds[1].y), (105.0, 5.0));
    assert_eq!(first.selected_count(), 1);

    // The second request is seeded by everything selected so far
    let second = &detector_two.queries.borrow()[0];
    let flagged: Vec<&str> = second
        .seeds
        .iter()
        .filter(|s| s.selected)
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(flagged, vec!["cell_1", "cell_3"]);
}

#[test]
fn test_user_only_needs_five_seeds() {
    let mut session = ready_session();
    for i in 0..4 {
        session.toggle(i).unwrap();
    }
    let detector = ScriptedDetector::default();
    let err = session
        .run_similarity(&detector, SimilarityMode::UserOnly, 5)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::NotEnoughSeeds {
            required: 5,
            found: 4
        }
    ));
    assert!(detector.queries.borrow().is_empty());

    session.toggle(4).unwrap();
    session
        .run_similarity(&detector, SimilarityMode::UserOnly, 5)
        .unwrap();
    assert_eq!(detector.queries.borrow()[0].mode, SimilarityMode::UserOnly);
}

#[test]
fn test_cumulative_needs_one_seed() {
    let mut session = ready_session();
    assert!(matches!(
        session.begin_similarity(SimilarityMode::Cumulative, 5),
        Err(EngineError::NotEnoughSeeds {
            required: 1,
            found: 0
        })
    ));
    assert!(!session.is_detecting());
}

#[test]
fn test_strictness_validated() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    for bad in [0, 11] {
        assert!(matches!(
            session.begin_similarity(SimilarityMode::Cumulative, bad),
            Err(EngineError::StrictnessOutOfRange { .. })
        ));
    }
    assert!(session.begin_similarity(SimilarityMode::Cumulative, 10).is_ok());
}

#[test]
fn test_second_request_rejected_while_in_flight() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let ticket = session
        .begin_similarity(SimilarityMode::Cumulative, 5)
        .unwrap();
    assert!(session.is_detecting());
    assert!(matches!(
        session.begin_similarity(SimilarityMode::Cumulative, 5),
        Err(EngineError::DetectionInFlight)
    ));

    // Other interactions stay available meanwhile
    session.toggle(1).unwrap();
    session.zoom_in();
    session.undo().unwrap();

    session
        .complete_similarity(ticket, Ok(vec![result_on(2)]))
        .unwrap();
    assert!(!session.is_detecting());
    assert!(session.begin_similarity(SimilarityMode::Cumulative, 5).is_ok());
}

#[test]
fn test_stale_response_discarded() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let ticket = session
        .begin_similarity(SimilarityMode::Cumulative, 5)
        .unwrap();
    let batch = ticket.batch();

    session.load_slide(SlideId::new("slide-2"), &detection_rows());
    assert!(!session.is_detecting());
    session.drain_events();

    let completion = session
        .complete_similarity(ticket, Ok(vec![result_on(2), result_on(3)]))
        .unwrap();
    assert_eq!(completion, SimilarityCompletion::Stale);
    assert!(session.selection().auto_selected().is_empty());
    assert!(!session.selection().has_working_state());
    assert_eq!(
        session.drain_events(),
        vec![SessionEvent::StaleResponseDiscarded { batch }]
    );
}

#[test]
fn test_cancelled_response_discarded() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let ticket = session
        .begin_similarity(SimilarityMode::Cumulative, 5)
        .unwrap();
    let batch = ticket.batch();
    session.cancel_similarity();
    session.drain_events();

    let completion = session
        .complete_similarity(ticket, Ok(vec![result_on(4)]))
        .unwrap();
    assert_eq!(completion, SimilarityCompletion::Stale);
    assert!(session.selection().auto_selected().is_empty());
    assert!(session.selection().candidates().is_empty());
    assert_eq!(
        session.drain_events(),
        vec![SessionEvent::StaleResponseDiscarded { batch }]
    );
    // Nothing was recorded, so undo reaches the manual pick
    assert!(matches!(session.undo(), Some(UndoEntry::Manual { index: 0, .. })));
}

#[test]
fn test_superseded_response_keeps_new_request() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let first = session
        .begin_similarity(SimilarityMode::Cumulative, 5)
        .unwrap();
    session.cancel_similarity();
    let second = session
        .begin_similarity(SimilarityMode::Cumulative, 5)
        .unwrap();
    assert_ne!(first.batch(), second.batch());

    let completion = session
        .complete_similarity(first, Ok(vec![result_on(4)]))
        .unwrap();
    assert_eq!(completion, SimilarityCompletion::Stale);
    assert!(session.selection().auto_selected().is_empty());
    assert!(session.is_detecting());
    assert!(matches!(
        session.begin_similarity(SimilarityMode::Cumulative, 5),
        Err(EngineError::DetectionInFlight)
    ));

    let outcome = applied(
        session
            .complete_similarity(second, Ok(vec![result_on(2)]))
            .unwrap(),
    );
    assert_eq!(outcome.selected, vec![2]);
    assert!(!session.is_detecting());
}

#[test]
fn test_failure_leaves_state_untouched() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let before = session.selection().clone();
    let detector = ScriptedDetector::with(vec![Err(CollaboratorError::Status {
        code: 500,
        message: "inference crashed".into(),
    })]);

    let err = session
        .run_similarity(&detector, SimilarityMode::Cumulative, 5)
        .unwrap_err();
    assert!(matches!(err, EngineError::Collaborator(_)));
    assert_eq!(session.selection().user_selected(), before.user_selected());
    assert_eq!(session.selection().points(), before.points());
    assert!(session.selection().auto_selected().is_empty());
    assert!(!session.is_detecting());
    assert!(
        session
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::DetectionFailed { .. }))
    );

    // The caller may retry right away
    let retry = ScriptedDetector::with(vec![Ok(vec![result_on(1)])]);
    let outcome = applied(
        session
            .run_similarity(&retry, SimilarityMode::Cumulative, 5)
            .unwrap(),
    );
    assert_eq!(outcome.selected, vec![1]);
}

#[test]
fn test_unmatched_results_shown_not_committed() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let detector = ScriptedDetector::with(vec![Ok(vec![
        result_on(2),
        SimilarityResult::new(500.0, 900.0, 0.4),
    ])]);
    let outcome = applied(
        session
            .run_similarity(&detector, SimilarityMode::Cumulative, 5)
            .unwrap(),
    );
    assert_eq!(outcome.unmatched, 1);
    let floating: Vec<_> = session
        .selection()
        .points()
        .iter()
        .filter(|p| p.source == PointSource::AutoSimilar && p.cell.is_none())
        .collect();
    assert_eq!(floating.len(), 1);

    let record = session.commit_selection("RBC").unwrap();
    assert_eq!(record.cell_indices, BTreeSet::from([0, 2]));
    assert!(session.selection().points().is_empty());
}

#[test]
fn test_consecutive_batches_and_redo() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let detector = ScriptedDetector::with(vec![
        Ok(vec![result_on(1)]),
        Ok(vec![result_on(2), result_on(3)]),
    ]);
    session
        .run_similarity(&detector, SimilarityMode::Cumulative, 5)
        .unwrap();
    session
        .run_similarity(&detector, SimilarityMode::Cumulative, 5)
        .unwrap();

    session.undo();
    assert_eq!(session.selection().auto_selected(), &BTreeSet::from([1]));
    session.redo();
    assert_eq!(session.selection().auto_selected(), &BTreeSet::from([1, 2, 3]));
}

#[test]
fn test_duplicate_results_dropped() {
    let mut session = ready_session();
    session.toggle(0).unwrap();
    let near = SimilarityResult::new(110.0, 10.0, 0.5);
    let detector = ScriptedDetector::with(vec![Ok(vec![result_on(1)]), Ok(vec![near])]);
    session
        .run_similarity(&detector, SimilarityMode::Cumulative, 5)
        .unwrap();
    let outcome = applied(
        session
            .run_similarity(&detector, SimilarityMode::Cumulative, 5)
            .unwrap(),
    );
    assert_eq!(outcome.duplicates, 1);
    assert!(outcome.points.is_empty());
}
