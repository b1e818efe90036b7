//! Adaptive testing session: an explicit state machine advanced by
//! [`CatSession::submit_response`].

use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::config::CatConfig;
use crate::error::{CatError, CatResult, ConfigError, InputError};
use crate::estimator::{AbilityEstimate, AbilityEstimator, Observation};
use crate::item_bank::{Item, ItemBank, ItemId};
use crate::model::test_information;
use crate::scoring::{proportional_score, LegacyScore};
use crate::selector::ItemSelector;
use crate::stopping::{SessionStatus, StoppingRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministeredItem {
    pub item_id: ItemId,
    pub category: u32,
}

/// A response arriving from outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub session_id: String,
    pub item_id: ItemId,
    pub category: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub theta_hat: f64,
    pub sem: f64,
    pub status: SessionStatus,
    pub degraded_estimate: bool,
    pub administered_items: Vec<AdministeredItem>,
}

impl SessionResult {
    pub fn administered_count(&self) -> usize {
        self.administered_items.len()
    }
}

/// Source of category responses for [`CatSession::run`].
pub trait Responder {
    fn respond(&mut self, item: &Item) -> u32;
}

/// Validated configuration plus everything sessions share read-only.
#[derive(Debug)]
pub struct CatEngine {
    config: CatConfig,
    bank: Arc<ItemBank>,
    estimator: AbilityEstimator,
    selector: ItemSelector,
    stopping: StoppingRule,
}

impl CatEngine {
    pub fn new(bank: Arc<ItemBank>, config: CatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let estimator = AbilityEstimator::new(&bank, config.estimation_method);
        Ok(Self {
            selector: ItemSelector::new(config.start_rule, config.exposure_control),
            stopping: StoppingRule::from(&config),
            estimator,
            bank,
            config,
        })
    }

    /// Rebuild the estimator tables on `n_quad` nodes of this engine's bank.
    pub fn with_quadrature(mut self, n_quad: usize) -> Self {
        let (max_iter, tol) = self.estimator.newton_limits();
        self.estimator =
            AbilityEstimator::with_quadrature(&self.bank, self.config.estimation_method, n_quad)
                .with_newton_limits(max_iter, tol);
        self
    }

    /// Override the MAP iteration budget and step tolerance.
    pub fn with_newton_limits(mut self, max_iter: usize, tol: f64) -> Self {
        self.estimator = self.estimator.with_newton_limits(max_iter, tol);
        self
    }

    pub fn config(&self) -> &CatConfig {
        &self.config
    }

    pub fn bank(&self) -> &ItemBank {
        &self.bank
    }

    pub fn shared_bank(&self) -> Arc<ItemBank> {
        Arc::clone(&self.bank)
    }

    pub fn estimator(&self) -> &AbilityEstimator {
        &self.estimator
    }

    pub fn selector(&self) -> &ItemSelector {
        &self.selector
    }

    pub fn start_session(self: &Arc<Self>, id: impl Into<String>, seed: u64) -> CatSession {
        CatSession::new(Arc::clone(self), id.into(), seed)
    }
}

#[derive(Debug)]
pub struct CatSession {
    id: String,
    engine: Arc<CatEngine>,
    rng: Pcg64,
    history: Vec<AdministeredItem>,
    observations: Vec<Observation>,
    administered: Vec<bool>,
    estimate: AbilityEstimate,
    trajectory: Vec<f64>,
    degraded: bool,
    status: SessionStatus,
    pending: Option<usize>,
}

impl CatSession {
    fn new(engine: Arc<CatEngine>, id: String, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        let n_items = engine.bank.len();
        let pending = engine.selector.select_start(&engine.bank, &mut rng);
        let status = if pending.is_some() {
            SessionStatus::InProgress
        } else {
            SessionStatus::StoppedExhausted
        };

        Self {
            id,
            rng,
            history: Vec::with_capacity(engine.config.max_items),
            observations: Vec::with_capacity(engine.config.max_items),
            administered: vec![false; n_items],
            estimate: AbilityEstimate::PRIOR,
            trajectory: Vec::with_capacity(engine.config.max_items),
            degraded: false,
            status,
            pending,
            engine,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn theta(&self) -> f64 {
        self.estimate.theta
    }

    pub fn sem(&self) -> f64 {
        self.estimate.sem
    }

    pub fn estimate(&self) -> AbilityEstimate {
        self.estimate
    }

    /// True once any estimate in this session came from the EAP fallback.
    pub fn degraded_estimate(&self) -> bool {
        self.degraded
    }

    pub fn history(&self) -> &[AdministeredItem] {
        &self.history
    }

    /// θ̂ after each recorded response, in administration order.
    pub fn theta_trajectory(&self) -> &[f64] {
        &self.trajectory
    }

    /// Item awaiting a response, if the session is still running.
    pub fn pending_item(&self) -> Option<&Item> {
        self.pending.map(|pos| self.engine.bank.item(pos))
    }

    /// Test information of the administered items at the current estimate.
    pub fn information(&self) -> f64 {
        let bank = &self.engine.bank;
        test_information(
            self.observations.iter().map(|o| bank.item(o.position)),
            self.estimate.theta,
        )
    }

    /// Non-canonical proportional raw score of the answered items.
    pub fn legacy_score(&self) -> Option<LegacyScore> {
        proportional_score(&self.engine.bank, &self.history)
    }

    /// Route an external response event to this session.
    pub fn apply(&mut self, event: &ResponseEvent) -> CatResult<SessionStatus> {
        if event.session_id != self.id {
            return Err(InputError::WrongSession {
                expected: self.id.clone(),
                received: event.session_id.clone(),
            }
            .into());
        }
        self.submit_response(event.item_id, event.category)
    }

    /// Record a response to the pending item and advance the state machine.
    ///
    /// Rejected responses leave the session untouched with the same item pending.
    pub fn submit_response(&mut self, item_id: ItemId, category: u32) -> CatResult<SessionStatus> {
        if self.status.is_terminal() {
            return Err(CatError::SessionFinished {
                session_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }

        let bank = Arc::clone(&self.engine.bank);
        let position = match self.pending {
            Some(pos) if bank.item(pos).id() == item_id => pos,
            pending => {
                return Err(InputError::UnexpectedItem {
                    item_id,
                    pending: pending.map(|pos| bank.item(pos).id()),
                }
                .into())
            }
        };

        let item = bank.item(position);
        let category_count = item.category_count();
        if category < 1 || category as usize > category_count {
            return Err(InputError::CategoryOutOfRange {
                item_id,
                category,
                category_count,
            }
            .into());
        }

        self.history.push(AdministeredItem { item_id, category });
        self.observations.push(Observation { position, category });
        self.administered[position] = true;

        self.estimate = self
            .engine
            .estimator
            .estimate(&bank, &self.observations);
        self.degraded |= self.estimate.degraded;
        self.trajectory.push(self.estimate.theta);

        let remaining = self.administered.iter().filter(|&&done| !done).count();
        self.status =
            self.engine
                .stopping
                .evaluate(self.history.len(), self.estimate.sem, remaining);

        tracing::debug!(
            session = %self.id,
            item_id,
            category,
            theta = self.estimate.theta,
            sem = self.estimate.sem,
            administered = self.history.len(),
            status = %self.status,
            "recorded response"
        );

        if self.status.is_terminal() {
            self.pending = None;
            tracing::info!(
                session = %self.id,
                theta = self.estimate.theta,
                sem = self.estimate.sem,
                items = self.history.len(),
                status = %self.status,
                "session finished"
            );
        } else {
            self.pending = self.engine.selector.select_next(
                &bank,
                self.estimate.theta,
                &self.administered,
                &mut self.rng,
            );
            if self.pending.is_none() {
                self.status = SessionStatus::StoppedExhausted;
            }
        }

        Ok(self.status)
    }

    /// Drive the session to termination with `responder` answering every item.
    pub fn run<R: Responder + ?Sized>(&mut self, responder: &mut R) -> CatResult<SessionResult> {
        let engine = Arc::clone(&self.engine);
        while let Some(pos) = self.pending {
            let item = engine.bank.item(pos);
            let category = responder.respond(item);
            self.submit_response(item.id(), category)?;
        }
        Ok(self.result())
    }

    pub fn result(&self) -> SessionResult {
        SessionResult {
            session_id: self.id.clone(),
            theta_hat: self.estimate.theta,
            sem: self.estimate.sem,
            status: self.status,
            degraded_estimate: self.degraded,
            administered_items: self.history.clone(),
        }
    }
}
