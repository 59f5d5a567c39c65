//! Tests for freehand strokes and click-built polygons.

use ebat_geometry::Point;

use super::{ready_session, screen};
use crate::error::EngineError;
use crate::model::{CellSource, PointSource};
use crate::session::SessionEvent;
use crate::undo::UndoEntry;

/// Press, move through `points` (image pixels), release.
fn draw(
    session: &mut crate::session::AnnotationSession,
    points: &[(f32, f32)],
) -> Option<i64> {
    let mut iter = points.iter();
    let &(x, y) = iter.next()?;
    assert!(session.begin_stroke(screen(x, y)).unwrap());
    for &(x, y) in iter {
        session.extend_stroke(screen(x, y)).unwrap();
    }
    session.end_stroke().unwrap()
}

#[test]
fn test_two_point_stroke_yields_no_cell() {
    let mut session = ready_session();
    let before = session.registry().len();
    assert_eq!(draw(&mut session, &[(500.0, 500.0), (520.0, 520.0)]), None);
    assert_eq!(session.registry().len(), before);
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_three_collinear_points_yield_one_cell() {
    let mut session = ready_session();
    let before = session.registry().len();
    let index = draw(
        &mut session,
        &[(500.0, 500.0), (510.0, 500.0), (520.0, 500.0)],
    )
    .unwrap();
    assert_eq!(session.registry().len(), before + 1);
    assert_eq!(index, -1);

    let cell = session.registry().get(index).unwrap();
    assert_eq!(cell.source, CellSource::ManualFreehand);
    assert_eq!(cell.score, 1.0);
    assert!(cell.bbox.height() >= 1.0);
}

#[test]
fn test_freehand_cell_joins_selection() {
    let mut session = ready_session();
    let index = draw(
        &mut session,
        &[(600.0, 600.0), (640.0, 600.0), (640.0, 640.0), (600.0, 640.0)],
    )
    .unwrap();

    assert!(session.selection().user_selected().contains(&index));
    let point = session.selection().points().last().unwrap();
    assert_eq!(point.source, PointSource::ManualDraw);
    assert_eq!(point.cell, Some(index));
    assert_eq!(point.position, Point::new(620.0, 620.0));
    assert_eq!(
        session.drain_events(),
        vec![
            SessionEvent::CellAdded { index },
            SessionEvent::SelectionChanged
        ]
    );

    // Committable like any other cell
    let record = session.commit_selection("Atypical cell").unwrap();
    assert!(record.cell_indices.contains(&index));
    let rows = session.commit_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].polygon.as_ref().map(Vec::len), Some(4));
}

#[test]
fn test_strokes_stay_separate() {
    let mut session = ready_session();
    let square = |o: f32| [(o, o), (o + 30.0, o), (o + 30.0, o + 30.0)];
    let a = draw(&mut session, &square(500.0)).unwrap();
    let b = draw(&mut session, &square(510.0)).unwrap();
    assert_eq!((a, b), (-1, -2));
    assert_eq!(session.selection().user_selected().len(), 2);
}

#[test]
fn test_undo_removes_drawn_cell_from_selection() {
    let mut session = ready_session();
    let index = draw(&mut session, &[(500.0, 500.0), (540.0, 500.0), (540.0, 540.0)]).unwrap();
    let entry = session.undo().unwrap();
    assert!(matches!(entry, UndoEntry::Manual { index: i, .. } if i == index));
    assert!(session.selection().user_selected().is_empty());
    // The drawn cell stays in the registry
    assert!(session.registry().contains(index));
}

#[test]
fn test_stroke_presses_outside_image_ignored() {
    let mut session = ready_session();
    assert!(!session.begin_stroke(Point::new(900.0, 900.0)).unwrap());
    assert!(!session.stroke().is_recording());
    assert_eq!(session.end_stroke().unwrap(), None);
}

#[test]
fn test_submit_polygon_too_few_points() {
    let mut session = ready_session();
    let err = session
        .submit_polygon(&[Point::new(1.0, 1.0), Point::new(5.0, 5.0)])
        .unwrap_err();
    assert!(matches!(err, EngineError::TooFewPoints { count: 2, min: 3 }));
    assert!(err.to_string().contains("minimum 3 points"));
}

#[test]
fn test_submit_polygon_creates_point_cell() {
    let mut session = ready_session();
    let index = session
        .submit_polygon(&[
            Point::new(700.0, 700.0),
            Point::new(760.0, 700.0),
            Point::new(760.0, 760.0),
        ])
        .unwrap()
        .unwrap();
    let cell = session.registry().get(index).unwrap();
    assert_eq!(cell.source, CellSource::ManualPoint);
    assert!(session.selection().user_selected().contains(&index));
}

#[test]
fn test_draft_polygon_flow() {
    let mut session = ready_session();
    for (x, y) in [(800.0, 800.0), (860.0, 800.0), (860.0, 860.0), (805.0, 805.0)] {
        assert!(session.place_point(screen(x, y)).unwrap());
    }
    assert_eq!(session.undo_point(), Some(Point::new(805.0, 805.0)));
    assert!(!session.close_polygon());

    session.place_point(screen(806.0, 806.0)).unwrap();
    assert!(session.close_polygon());

    let index = session.submit_draft().unwrap().unwrap();
    assert!(session.stroke().draft().is_empty());
    let cell = session.registry().get(index).unwrap();
    assert_eq!(cell.source, CellSource::ManualPoint);
    assert!(cell.contains(&Point::new(850.0, 810.0)));
}
