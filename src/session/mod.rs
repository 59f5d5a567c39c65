//! Annotation session: the state container for one slide at a time.
//!
//! The session owns the cell registry, selection, undo log, viewport, and
//! stroke recorder, and routes pointer input through the coordinate mapper.
//! Every mutation that a renderer cares about queues a [`SessionEvent`];
//! the host drains them with [`AnnotationSession::drain_events`].
//!
//! Screen positions are relative to the image container's top-left corner.

mod events;
mod similarity;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use ebat_geometry::{CoordinateMapper, PanDragState, Point, Size, Viewport};

use crate::config::EngineConfig;
use crate::data::DetectionRow;
use crate::detection::{CommitRow, CommitSink, DetectionSource, Submission};
use crate::error::EngineError;
use crate::model::{AnnotationRecord, BatchId, Cell, CellIndex, CellSource, RecordId, SlideId};
use crate::registry::CellRegistry;
use crate::selection::{SelectionState, SelectionStats, ToggleOutcome};
use crate::stroke::StrokeRecorder;
use crate::undo::{self, UndoConfig, UndoEntry, UndoLog};

pub use events::SessionEvent;
pub use similarity::{SimilarityCompletion, SimilarityTicket};

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Explicit state container for annotating one slide.
#[derive(Debug)]
pub struct AnnotationSession {
    config: EngineConfig,
    slide: Option<SlideId>,
    /// Bumped on every slide load; similarity tickets carry it
    generation: u64,
    registry: CellRegistry,
    selection: SelectionState,
    undo: UndoLog,
    viewport: Viewport,
    mapper: CoordinateMapper,
    image_known: bool,
    pan_drag: PanDragState,
    stroke: StrokeRecorder,
    in_flight: Option<BatchId>,
    next_batch: BatchId,
    events: Vec<SessionEvent>,
}

impl Default for AnnotationSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl AnnotationSession {
    pub fn new(config: EngineConfig) -> Self {
        let undo = UndoLog::with_config(UndoConfig {
            max_history: config.selection.max_history,
        });
        let stroke = StrokeRecorder::new(config.stroke);
        Self {
            config,
            slide: None,
            generation: 0,
            registry: CellRegistry::new(),
            selection: SelectionState::new(),
            undo,
            viewport: Viewport::identity(),
            mapper: CoordinateMapper::default(),
            image_known: false,
            pan_drag: PanDragState::default(),
            stroke,
            in_flight: None,
            next_batch: 1,
            events: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn slide(&self) -> Option<&SlideId> {
        self.slide.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &CellRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn stroke(&self) -> &StrokeRecorder {
        &self.stroke
    }

    /// Whether a similarity request is outstanding.
    pub fn is_detecting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_image_ready(&self) -> bool {
        self.image_known
    }

    pub fn stats(&self) -> SelectionStats {
        self.selection.stats(self.registry.len())
    }

    /// Take all events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    // ========================================================================
    // Slide lifecycle
    // ========================================================================

    /// Start annotating `slide` with the given detection rows.
    ///
    /// All per-slide state is reset, the viewport returns to fit-to-screen,
    /// and any outstanding similarity ticket becomes stale. The image size
    /// must be set again before pointer input is accepted.
    pub fn load_slide(&mut self, slide: SlideId, rows: &[DetectionRow]) -> usize {
        self.generation += 1;
        self.registry.ingest(rows);
        self.selection.reset();
        self.undo.clear();
        self.viewport.reset();
        self.mapper = CoordinateMapper::new(Size::default(), self.mapper.container_size());
        self.image_known = false;
        self.pan_drag.stop_drag();
        self.stroke.cancel();
        self.stroke.clear_draft();
        if let Some(batch) = self.in_flight.take() {
            log::debug!("Similarity batch {} invalidated by slide change", batch);
        }

        let cells = self.registry.len();
        log::info!(
            "Loaded slide {} with {} cells (generation {})",
            slide,
            cells,
            self.generation
        );
        self.emit(SessionEvent::SlideLoaded {
            slide: slide.clone(),
            cells,
        });
        self.slide = Some(slide);
        cells
    }

    /// Fetch detections from `source` and load them.
    ///
    /// On failure the current slide is left untouched.
    pub fn load_slide_from(
        &mut self,
        source: &dyn DetectionSource,
        slide: SlideId,
    ) -> Result<usize, EngineError> {
        let rows = self
            .config
            .detection
            .retry
            .execute(|| source.fetch_detections(&slide))?;
        Ok(self.load_slide(slide, &rows))
    }

    /// Record the slide image's pixel dimensions. Pointer input is accepted
    /// from here on.
    pub fn set_image_size(&mut self, size: Size) -> Result<(), EngineError> {
        if self.slide.is_none() {
            return Err(EngineError::NoSlide);
        }
        self.mapper = CoordinateMapper::new(size, self.mapper.container_size());
        self.image_known = !size.is_empty();
        self.viewport.reset();
        log::debug!("Image size {}x{}", size.width, size.height);
        self.emit(SessionEvent::ImageReady(size));
        self.emit(SessionEvent::ViewportChanged(self.viewport));
        Ok(())
    }

    /// Update the container size, e.g. after a layout change.
    pub fn set_container(&mut self, size: Size) {
        self.mapper.set_container(size);
        self.emit(SessionEvent::ViewportChanged(self.viewport));
    }

    fn require_image(&self) -> Result<(), EngineError> {
        if self.slide.is_none() {
            return Err(EngineError::NoSlide);
        }
        if !self.image_known || self.mapper.base_scale() <= 0.0 {
            return Err(EngineError::ImageNotReady);
        }
        Ok(())
    }

    // ========================================================================
    // Coordinates and viewport
    // ========================================================================

    /// Map a screen position to image pixels; `None` outside the image.
    pub fn screen_to_image(&self, screen: Point) -> Option<Point> {
        self.mapper.to_image(screen, &self.viewport)
    }

    pub fn image_to_screen(&self, image: Point) -> Point {
        self.mapper.to_screen(image, &self.viewport)
    }

    /// Zoom by `factor` about `focal` (screen), or about the image centre.
    pub fn zoom_about(&mut self, factor: f32, focal: Option<Point>) {
        self.viewport
            .zoom_about(factor, focal, &self.mapper, &self.config.zoom.limits);
        self.emit(SessionEvent::ViewportChanged(self.viewport));
    }

    pub fn zoom_in(&mut self) {
        self.viewport
            .zoom_in(self.config.zoom.step, &self.mapper, &self.config.zoom.limits);
        self.emit(SessionEvent::ViewportChanged(self.viewport));
    }

    pub fn zoom_out(&mut self) {
        self.viewport
            .zoom_out(self.config.zoom.step, &self.mapper, &self.config.zoom.limits);
        self.emit(SessionEvent::ViewportChanged(self.viewport));
    }

    /// Mouse wheel: scrolling up (negative delta) zooms in about the cursor.
    pub fn wheel(&mut self, screen: Point, delta_y: f32) -> Result<(), EngineError> {
        self.require_image()?;
        if delta_y == 0.0 || !delta_y.is_finite() {
            return Ok(());
        }
        let step = self.config.zoom.step;
        let factor = if delta_y < 0.0 { step } else { 1.0 / step };
        self.zoom_about(factor, Some(screen));
        Ok(())
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.viewport.pan_by(dx, dy);
        self.emit(SessionEvent::ViewportChanged(self.viewport));
    }

    /// Back to zoom 1.0 with no pan.
    pub fn fit_to_screen(&mut self) {
        self.viewport.reset();
        self.emit(SessionEvent::ViewportChanged(self.viewport));
    }

    pub fn begin_pan(&mut self, screen: Point) -> Result<(), EngineError> {
        self.require_image()?;
        self.pan_drag.start_drag(screen);
        Ok(())
    }

    pub fn drag_pan(&mut self, screen: Point) -> Result<(), EngineError> {
        self.require_image()?;
        if let Some((dx, dy)) = self.pan_drag.drag_to(screen) {
            self.pan_by(dx, dy);
        }
        Ok(())
    }

    pub fn end_pan(&mut self) {
        self.pan_drag.stop_drag();
    }

    pub fn is_panning(&self) -> bool {
        self.pan_drag.is_dragging()
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select or deselect the cell nearest to a click.
    ///
    /// The click snaps to the nearest centroid within the configured radius,
    /// falling back to the cell whose outline contains it. Returns `None`
    /// when the click hits no cell.
    pub fn click(
        &mut self,
        screen: Point,
    ) -> Result<Option<(CellIndex, ToggleOutcome)>, EngineError> {
        self.require_image()?;
        let Some(point) = self.screen_to_image(screen) else {
            return Ok(None);
        };
        let snap = self.config.selection.snap_distance();
        let Some(index) = self
            .registry
            .nearest(point, snap)
            .or_else(|| self.registry.hit_test(point))
        else {
            return Ok(None);
        };
        let outcome = self.toggle(index)?;
        Ok(Some((index, outcome)))
    }

    /// Toggle a cell by index.
    pub fn toggle(&mut self, index: CellIndex) -> Result<ToggleOutcome, EngineError> {
        let outcome = self.selection.toggle(index, &self.registry)?;
        match outcome {
            ToggleOutcome::Selected => {
                if let Some(point) = self.selection.points().last().cloned() {
                    self.undo.record_manual(index, point);
                }
            }
            ToggleOutcome::Deselected | ToggleOutcome::Demoted => self.undo.forget(index),
        }
        self.emit(SessionEvent::SelectionChanged);
        Ok(outcome)
    }

    /// Commit specific selected cells under `cell_type`.
    pub fn commit(
        &mut self,
        indices: &BTreeSet<CellIndex>,
        cell_type: &str,
    ) -> Result<&AnnotationRecord, EngineError> {
        let (id, cells) = {
            let record = self.selection.commit(indices, cell_type, now_ms())?;
            (record.id, record.len())
        };
        self.after_commit(id, cells);
        self.record(id)
    }

    /// Commit the whole displayed selection under `cell_type`.
    pub fn commit_selection(&mut self, cell_type: &str) -> Result<&AnnotationRecord, EngineError> {
        let (id, cells) = {
            let record = self.selection.commit_selection(cell_type, now_ms())?;
            (record.id, record.len())
        };
        self.after_commit(id, cells);
        self.record(id)
    }

    fn after_commit(&mut self, record: RecordId, cells: usize) {
        self.undo.clear();
        self.emit(SessionEvent::Committed { record, cells });
        self.emit(SessionEvent::SelectionChanged);
    }

    fn record(&self, id: RecordId) -> Result<&AnnotationRecord, EngineError> {
        self.selection
            .records()
            .iter()
            .find(|r| r.id == id)
            .ok_or(EngineError::UnknownRecord { id })
    }

    /// Un-annotate one committed cell.
    pub fn remove_annotation(&mut self, index: CellIndex) -> Result<String, EngineError> {
        let cell_type = self.selection.remove_committed(index)?;
        self.emit(SessionEvent::AnnotationRemoved { index });
        Ok(cell_type)
    }

    /// Delete a whole annotation record.
    pub fn delete_record(&mut self, id: RecordId) -> Result<AnnotationRecord, EngineError> {
        let record = self.selection.delete_record(id)?;
        for &index in &record.cell_indices {
            self.emit(SessionEvent::AnnotationRemoved { index });
        }
        Ok(record)
    }

    pub fn undo(&mut self) -> Option<UndoEntry> {
        let entry = undo::undo_selection(&mut self.undo, &mut self.selection)?;
        self.emit(SessionEvent::SelectionChanged);
        Some(entry)
    }

    pub fn redo(&mut self) -> Option<UndoEntry> {
        let entry = undo::redo_selection(&mut self.undo, &mut self.selection)?;
        self.emit(SessionEvent::SelectionChanged);
        Some(entry)
    }

    /// Drop the working selection, overlay, candidates, and undo history.
    pub fn clear_all(&mut self) {
        let had_state = self.selection.has_working_state() || self.undo.can_undo();
        undo::clear_all(&mut self.undo, &mut self.selection);
        if had_state {
            log::debug!("Cleared working selection");
            self.emit(SessionEvent::SelectionChanged);
        }
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Pointer down in freehand mode. Presses outside the image are ignored.
    pub fn begin_stroke(&mut self, screen: Point) -> Result<bool, EngineError> {
        self.require_image()?;
        let Some(point) = self.screen_to_image(screen) else {
            return Ok(false);
        };
        self.stroke.press(point);
        Ok(true)
    }

    /// Pointer move in freehand mode.
    pub fn extend_stroke(&mut self, screen: Point) -> Result<(), EngineError> {
        self.require_image()?;
        if let Some(point) = self.screen_to_image(screen) {
            self.stroke.move_to(point);
        }
        Ok(())
    }

    /// Pointer up in freehand mode.
    ///
    /// Returns the new cell, or `None` when the stroke was too short.
    pub fn end_stroke(&mut self) -> Result<Option<CellIndex>, EngineError> {
        let Some(outline) = self.stroke.release() else {
            return Ok(None);
        };
        Ok(self.add_drawn_cell(&outline, CellSource::ManualFreehand))
    }

    pub fn cancel_stroke(&mut self) {
        self.stroke.cancel();
    }

    /// Place one vertex of a click-built polygon.
    pub fn place_point(&mut self, screen: Point) -> Result<bool, EngineError> {
        self.require_image()?;
        let Some(point) = self.screen_to_image(screen) else {
            return Ok(false);
        };
        self.stroke.add_point(point);
        Ok(true)
    }

    pub fn undo_point(&mut self) -> Option<Point> {
        self.stroke.undo_point()
    }

    pub fn clear_polygon(&mut self) {
        self.stroke.clear_draft();
    }

    /// Close the draft polygon if its ends are near each other.
    pub fn close_polygon(&mut self) -> bool {
        self.stroke.try_auto_close()
    }

    /// Submit the click-built polygon as a new cell.
    pub fn submit_draft(&mut self) -> Result<Option<CellIndex>, EngineError> {
        if self.slide.is_none() {
            return Err(EngineError::NoSlide);
        }
        let outline = self.stroke.take_draft()?;
        Ok(self.add_drawn_cell(&outline, CellSource::ManualPoint))
    }

    /// Submit a polygon given in image pixels as a new cell.
    pub fn submit_polygon(&mut self, points: &[Point]) -> Result<Option<CellIndex>, EngineError> {
        if self.slide.is_none() {
            return Err(EngineError::NoSlide);
        }
        let outline = self.stroke.finish_polygon(points)?;
        Ok(self.add_drawn_cell(&outline, CellSource::ManualPoint))
    }

    fn add_drawn_cell(&mut self, outline: &[Point], source: CellSource) -> Option<CellIndex> {
        let cell = Cell::from_outline(outline, source)?;
        let index = self.registry.append(cell);
        let cell = self.registry.get(index)?;
        self.selection.select_drawn(cell);
        if let Some(point) = self.selection.points().last().cloned() {
            self.undo.record_manual(index, point);
        }
        log::info!("Added {:?} cell {}", source, index);
        self.emit(SessionEvent::CellAdded { index });
        self.emit(SessionEvent::SelectionChanged);
        Some(index)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Rows for every committed cell on the slide.
    pub fn commit_rows(&self) -> Vec<CommitRow> {
        self.selection.commit_rows(&self.registry)
    }

    /// Send all committed annotations to `sink`, with the per-type counts.
    pub fn submit(&mut self, sink: &dyn CommitSink) -> Result<usize, EngineError> {
        let slide = self.slide.clone().ok_or(EngineError::NoSlide)?;
        let rows = self.commit_rows();
        if rows.is_empty() {
            return Err(EngineError::NothingToSubmit);
        }
        let submission = Submission::annotated(rows, self.selection.type_counts().clone());
        self.config
            .detection
            .retry
            .execute(|| sink.commit(&slide, &submission))?;
        let count = submission.rows.len();
        log::info!("Submitted {} cell annotations for {}", count, slide);
        self.emit(SessionEvent::Submitted { rows: count });
        Ok(count)
    }

    /// Report the slide image as unusable. No annotations are sent, even if
    /// some were committed; the host moves on to the next slide.
    pub fn reject_image_quality(&mut self, sink: &dyn CommitSink) -> Result<(), EngineError> {
        let slide = self.slide.clone().ok_or(EngineError::NoSlide)?;
        let submission = Submission::poor_quality();
        self.config
            .detection
            .retry
            .execute(|| sink.commit(&slide, &submission))?;
        log::info!("Reported {} as poor image quality", slide);
        self.emit(SessionEvent::QualityRejected { slide });
        Ok(())
    }
}
