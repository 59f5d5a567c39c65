//! Tests for zoom, pan, and coordinate mapping through the session.

use ebat_geometry::{Point, Size, Viewport};

use super::{cell_screen, detection_rows, ready_session};
use crate::model::SlideId;
use crate::selection::ToggleOutcome;
use crate::session::SessionEvent;

const EPSILON: f32 = 0.01;

fn approx_point(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
}

#[test]
fn test_zoom_clamped_at_max() {
    let mut session = ready_session();
    let base = session.mapper().base_scale();
    let centre = session.mapper().image_center_on_screen(session.viewport());
    for _ in 0..10 {
        session.zoom_about(1000.0, Some(centre));
        let scale = session.mapper().scale(session.viewport());
        assert!(scale <= base * 8.0 + EPSILON);
    }
    assert!((session.viewport().zoom - 8.0).abs() < EPSILON);
}

#[test]
fn test_zoom_clamped_at_min() {
    let mut session = ready_session();
    for _ in 0..10 {
        session.zoom_out();
    }
    assert!((session.viewport().zoom - 0.25).abs() < EPSILON);
}

#[test]
fn test_zoom_round_trip_restores_view() {
    let mut session = ready_session();
    let focal = Point::new(123.0, 321.0);
    let before_scale = session.mapper().scale(session.viewport());
    let before_image = session.screen_to_image(focal).unwrap();

    session.zoom_about(2.5, Some(focal));
    session.zoom_about(1.0 / 2.5, Some(focal));

    assert!((session.mapper().scale(session.viewport()) - before_scale).abs() < 1e-4);
    assert!(approx_point(session.screen_to_image(focal).unwrap(), before_image));
}

#[test]
fn test_wheel_zooms_about_cursor() {
    let mut session = ready_session();
    let cursor = Point::new(400.0, 100.0);
    let under_cursor = session.screen_to_image(cursor).unwrap();

    session.wheel(cursor, -120.0).unwrap();
    assert!((session.viewport().zoom - 1.2).abs() < EPSILON);
    assert!(approx_point(session.screen_to_image(cursor).unwrap(), under_cursor));

    session.wheel(cursor, 120.0).unwrap();
    assert!((session.viewport().zoom - 1.0).abs() < EPSILON);
}

#[test]
fn test_button_zoom_keeps_image_centre() {
    let mut session = ready_session();
    session.zoom_in();
    let centre = session.mapper().image_center_on_screen(session.viewport());
    assert!(approx_point(centre, Point::new(250.0, 250.0)));
    assert!(
        session
            .drain_events()
            .iter()
            .all(|e| matches!(e, SessionEvent::ViewportChanged(_)))
    );
}

#[test]
fn test_pan_drag_moves_image() {
    let mut session = ready_session();
    session.begin_pan(Point::new(100.0, 100.0)).unwrap();
    assert!(session.is_panning());
    session.drag_pan(Point::new(130.0, 90.0)).unwrap();
    session.drag_pan(Point::new(150.0, 80.0)).unwrap();
    session.end_pan();
    assert!(!session.is_panning());

    assert_eq!(session.viewport().pan, Point::new(50.0, -20.0));
    // Cell 1 now sits 50px right and 20px up on screen
    let moved = session.image_to_screen(Point::new(105.0, 5.0));
    assert!(approx_point(moved, Point::new(102.5, -17.5)));
    // Dragging without an active pan does nothing
    session.drag_pan(Point::new(0.0, 0.0)).unwrap();
    assert_eq!(session.viewport().pan, Point::new(50.0, -20.0));
}

#[test]
fn test_click_after_zoom_hits_same_cell() {
    let mut session = ready_session();
    session.zoom_about(3.0, Some(cell_screen(3)));
    let at = session.image_to_screen(Point::new(305.0, 5.0));
    assert_eq!(session.click(at).unwrap(), Some((3, ToggleOutcome::Selected)));
}

#[test]
fn test_slide_load_resets_viewport() {
    let mut session = ready_session();
    session.zoom_in();
    session.pan_by(40.0, 40.0);
    session.load_slide(SlideId::new("slide-2"), &detection_rows());
    assert_eq!(*session.viewport(), Viewport::identity());
    assert!(!session.is_image_ready());

    session.set_image_size(Size::new(1000.0, 1000.0)).unwrap();
    session.fit_to_screen();
    assert_eq!(*session.viewport(), Viewport::identity());
}

#[test]
fn test_container_resize_changes_mapping() {
    let mut session = ready_session();
    session.set_container(Size::new(1000.0, 500.0));
    // Base scale stays 0.5, image centred horizontally with 250px margins
    assert!((session.mapper().base_scale() - 0.5).abs() < EPSILON);
    let mapped = session.image_to_screen(Point::new(0.0, 0.0));
    assert!(approx_point(mapped, Point::new(250.0, 0.0)));
}
