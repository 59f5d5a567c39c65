//! The similarity-detection round trip.
//!
//! A request is split in two so the host can await the service without
//! holding the session: [`AnnotationSession::begin_similarity`] builds the
//! query and marks a request in flight, and
//! [`AnnotationSession::complete_similarity`] folds the response in. Only one
//! request may be in flight. A ticket issued before the current slide was
//! loaded, or one whose request was cancelled or superseded, completes as
//! [`SimilarityCompletion::Stale`].

use crate::constants::{MAX_STRICTNESS, MIN_STRICTNESS};
use crate::detection::{SimilarityDetector, SimilarityMode, SimilarityQuery, SimilarityResult};
use crate::error::{CollaboratorError, EngineError};
use crate::model::BatchId;
use crate::selection::BatchOutcome;

use super::{AnnotationSession, SessionEvent};

/// Proof of an issued similarity request. Consumed on completion.
#[derive(Debug, PartialEq)]
pub struct SimilarityTicket {
    generation: u64,
    batch: BatchId,
    query: SimilarityQuery,
}

impl SimilarityTicket {
    /// The request to send to the similarity service.
    pub fn query(&self) -> &SimilarityQuery {
        &self.query
    }

    pub fn batch(&self) -> BatchId {
        self.batch
    }

    pub fn mode(&self) -> SimilarityMode {
        self.query.mode
    }
}

/// How a similarity response was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityCompletion {
    /// Results were folded into the selection
    Applied(BatchOutcome),
    /// The ticket predates the current slide or no longer owns the request
    /// slot; the response was dropped
    Stale,
}

impl AnnotationSession {
    /// Issue a similarity request with the configured default mode and
    /// strictness.
    pub fn begin_default_similarity(&mut self) -> Result<SimilarityTicket, EngineError> {
        let mode = self.config.detection.default_mode;
        let strictness = self.config.detection.default_strictness;
        self.begin_similarity(mode, strictness)
    }

    /// Build a similarity query and mark it in flight.
    pub fn begin_similarity(
        &mut self,
        mode: SimilarityMode,
        strictness: u8,
    ) -> Result<SimilarityTicket, EngineError> {
        let slide = self.slide.clone().ok_or(EngineError::NoSlide)?;
        if self.in_flight.is_some() {
            return Err(EngineError::DetectionInFlight);
        }
        if !(MIN_STRICTNESS..=MAX_STRICTNESS).contains(&strictness) {
            return Err(EngineError::StrictnessOutOfRange {
                value: strictness,
                min: MIN_STRICTNESS,
                max: MAX_STRICTNESS,
            });
        }

        let seeds = self.selection.seed_rows(mode, &self.registry);
        let query = SimilarityQuery {
            slide,
            seeds,
            strictness,
            mode,
        };
        let required = self.config.detection.min_seeds(mode);
        let found = query.selected_count();
        if found < required {
            return Err(EngineError::NotEnoughSeeds { required, found });
        }

        let batch = self.next_batch;
        self.next_batch += 1;
        self.in_flight = Some(batch);
        log::info!(
            "Similarity batch {} started ({} mode, strictness {}, {} seeds)",
            batch,
            mode.as_str(),
            strictness,
            found
        );
        self.emit(SessionEvent::DetectionStarted { batch });

        Ok(SimilarityTicket {
            generation: self.generation,
            batch,
            query,
        })
    }

    /// Fold a similarity response into the selection.
    ///
    /// A failed response is returned as an error with the selection
    /// untouched; the request slot is released so the caller can retry.
    pub fn complete_similarity(
        &mut self,
        ticket: SimilarityTicket,
        response: Result<Vec<SimilarityResult>, CollaboratorError>,
    ) -> Result<SimilarityCompletion, EngineError> {
        if ticket.generation != self.generation {
            log::debug!(
                "Discarding stale similarity batch {} (generation {} != {})",
                ticket.batch,
                ticket.generation,
                self.generation
            );
            self.emit(SessionEvent::StaleResponseDiscarded {
                batch: ticket.batch,
            });
            return Ok(SimilarityCompletion::Stale);
        }
        if self.in_flight != Some(ticket.batch) {
            log::debug!(
                "Discarding similarity batch {} (in flight: {:?})",
                ticket.batch,
                self.in_flight
            );
            self.emit(SessionEvent::StaleResponseDiscarded {
                batch: ticket.batch,
            });
            return Ok(SimilarityCompletion::Stale);
        }
        self.in_flight = None;

        let results = match response {
            Ok(results) => results,
            Err(err) => {
                log::warn!("Similarity batch {} failed: {}", ticket.batch, err);
                self.emit(SessionEvent::DetectionFailed {
                    batch: ticket.batch,
                    message: err.to_string(),
                });
                return Err(err.into());
            }
        };

        let outcome = self.selection.apply_similarity_results(
            &results,
            ticket.batch,
            ticket.query.mode,
            &self.registry,
            &self.config.matching,
        );
        self.undo.record_auto_batch(&outcome);
        self.emit(SessionEvent::DetectionFinished {
            batch: ticket.batch,
            selected: outcome.selected.len(),
        });
        self.emit(SessionEvent::SelectionChanged);
        Ok(SimilarityCompletion::Applied(outcome))
    }

    /// Release the request slot without applying anything.
    pub fn cancel_similarity(&mut self) {
        if let Some(batch) = self.in_flight.take() {
            log::debug!("Similarity batch {} cancelled", batch);
        }
    }

    /// Run a whole round trip against `detector`, retrying per the
    /// configured policy.
    pub fn run_similarity(
        &mut self,
        detector: &dyn SimilarityDetector,
        mode: SimilarityMode,
        strictness: u8,
    ) -> Result<SimilarityCompletion, EngineError> {
        let ticket = self.begin_similarity(mode, strictness)?;
        let response = self
            .config
            .detection
            .retry
            .execute(|| detector.detect(ticket.query()));
        self.complete_similarity(ticket, response)
    }
}
