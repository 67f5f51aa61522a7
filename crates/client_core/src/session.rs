use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{RoastCatalog, RoastProfile},
    error::{ErrorKind, Failure},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    asset::{AssetId, ImageAsset, ImageFile},
    error::{AssetError, CommandRejected, PredictionError},
    prediction::RoastPredictor,
    preview::{PreviewHandle, PreviewStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Staged,
    Submitting,
    Resolved,
    Failed,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Staged => "staged",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Resolved => "resolved",
            SessionPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    pub generation: u64,
    pub asset_id: AssetId,
}

#[derive(Debug)]
pub enum SessionState {
    Idle,
    Staged {
        asset: ImageAsset,
    },
    Submitting {
        asset: ImageAsset,
        ticket: SubmitTicket,
    },
    Resolved {
        asset: ImageAsset,
        profile: &'static RoastProfile,
    },
    Failed {
        asset: ImageAsset,
        failure: Failure,
    },
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Staged { .. } => SessionPhase::Staged,
            SessionState::Submitting { .. } => SessionPhase::Submitting,
            SessionState::Resolved { .. } => SessionPhase::Resolved,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    pub fn asset(&self) -> Option<&ImageAsset> {
        match self {
            SessionState::Idle => None,
            SessionState::Staged { asset }
            | SessionState::Submitting { asset, .. }
            | SessionState::Resolved { asset, .. }
            | SessionState::Failed { asset, .. } => Some(asset),
        }
    }

    fn into_asset(self) -> Option<ImageAsset> {
        match self {
            SessionState::Idle => None,
            SessionState::Staged { asset }
            | SessionState::Submitting { asset, .. }
            | SessionState::Resolved { asset, .. }
            | SessionState::Failed { asset, .. } => Some(asset),
        }
    }
}

#[derive(Debug)]
pub struct PredictionOutcome {
    pub ticket: SubmitTicket,
    pub result: Result<i64, PredictionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeDisposition {
    Applied(SessionPhase),
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub generation: u64,
    pub preview: Option<PreviewHandle>,
    pub file_name: Option<String>,
    pub profile: Option<&'static RoastProfile>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub can_submit: bool,
    pub can_reset: bool,
}

pub struct SessionController {
    predictor: Arc<dyn RoastPredictor>,
    previews: Arc<dyn PreviewStore>,
    state: SessionState,
    generation: u64,
    in_flight: usize,
    outcome_tx: mpsc::UnboundedSender<PredictionOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<PredictionOutcome>,
}

impl SessionController {
    pub fn new(predictor: Arc<dyn RoastPredictor>, previews: Arc<dyn PreviewStore>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            predictor,
            previews,
            state: SessionState::Idle,
            generation: 0,
            in_flight: 0,
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Includes predictions whose outcome will be discarded as stale.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn previews(&self) -> &Arc<dyn PreviewStore> {
        &self.previews
    }

    /// A rejected file leaves the session as it was. Selecting while a
    /// prediction is in flight acts as `reset` followed by a selection.
    pub fn select_image(&mut self, file: ImageFile) -> Result<AssetId, AssetError> {
        let image = file.validate().map_err(|err| {
            warn!(phase = %self.phase(), "session: selection rejected: {err}");
            err
        })?;

        if self.phase() == SessionPhase::Submitting {
            info!(
                generation = self.generation,
                "session: selection replaces in-flight submission"
            );
        }
        self.retire_current();

        let asset = ImageAsset::stage(image, Arc::clone(&self.previews));
        info!(
            generation = self.generation,
            asset_id = %asset.id(),
            file_name = asset.file_name(),
            media_type = asset.media_type(),
            "session: image staged"
        );
        let asset_id = asset.id();
        self.state = SessionState::Staged { asset };
        Ok(asset_id)
    }

    /// Only legal in `Staged`. Must be called from within a tokio runtime,
    /// since the prediction is spawned onto it.
    pub fn submit(&mut self) -> Result<SubmitTicket, CommandRejected> {
        let asset = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Staged { asset } => asset,
            other => {
                let phase = other.phase();
                self.state = other;
                debug!(%phase, "session: submit ignored");
                return Err(CommandRejected {
                    command: "submit",
                    phase,
                });
            }
        };

        self.generation += 1;
        let ticket = SubmitTicket {
            generation: self.generation,
            asset_id: asset.id(),
        };
        let upload = asset.upload();
        self.state = SessionState::Submitting { asset, ticket };
        self.in_flight += 1;
        info!(
            generation = ticket.generation,
            asset_id = %ticket.asset_id,
            "session: submitted"
        );

        let predictor = Arc::clone(&self.predictor);
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = predictor.predict(upload).await;
            let _ = outcome_tx.send(PredictionOutcome { ticket, result });
        });

        Ok(ticket)
    }

    pub fn reset(&mut self) {
        let phase = self.phase();
        self.retire_current();
        info!(generation = self.generation, from = %phase, "session: reset");
    }

    /// Returns `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<OutcomeDisposition> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.outcome_rx.recv().await?;
        Some(self.receive(outcome))
    }

    pub fn drain_outcomes(&mut self) -> Vec<OutcomeDisposition> {
        let mut applied = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            applied.push(self.receive(outcome));
        }
        applied
    }

    fn receive(&mut self, outcome: PredictionOutcome) -> OutcomeDisposition {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.apply_outcome(outcome)
    }

    pub fn apply_outcome(&mut self, outcome: PredictionOutcome) -> OutcomeDisposition {
        let asset = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Submitting { asset, ticket } if ticket == outcome.ticket => asset,
            other => {
                info!(
                    generation = outcome.ticket.generation,
                    asset_id = %outcome.ticket.asset_id,
                    current_generation = self.generation,
                    phase = %other.phase(),
                    "session: prediction discarded as stale"
                );
                self.state = other;
                return OutcomeDisposition::Stale;
            }
        };

        let resolved = outcome
            .result
            .map_err(Failure::from)
            .and_then(|code| RoastCatalog::lookup(code).map_err(Failure::from));

        self.state = match resolved {
            Ok(profile) => {
                info!(
                    generation = self.generation,
                    code = %profile.code,
                    profile = profile.name,
                    "session: resolved"
                );
                SessionState::Resolved { asset, profile }
            }
            Err(failure) => {
                warn!(
                    generation = self.generation,
                    kind = %failure.kind,
                    "session: failed: {}",
                    failure.message
                );
                SessionState::Failed { asset, failure }
            }
        };
        OutcomeDisposition::Applied(self.phase())
    }

    pub fn view(&self) -> SessionView {
        let asset = self.state.asset();
        let (profile, failure) = match &self.state {
            SessionState::Resolved { profile, .. } => (Some(*profile), None),
            SessionState::Failed { failure, .. } => (None, Some(failure)),
            _ => (None, None),
        };
        let phase = self.phase();

        SessionView {
            phase,
            generation: self.generation,
            preview: asset.map(|asset| asset.preview().clone()),
            file_name: asset.map(|asset| asset.file_name().to_string()),
            profile,
            error_kind: failure.map(|failure| failure.kind),
            error_message: failure.map(|failure| failure.message.clone()),
            can_submit: phase == SessionPhase::Staged,
            can_reset: phase != SessionPhase::Idle,
        }
    }

    fn retire_current(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Idle);
        if let Some(mut asset) = previous.into_asset() {
            asset.dispose();
        }
        self.generation += 1;
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
