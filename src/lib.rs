//! Computerized adaptive testing for graded-response item banks.
//!
//! This crate provides:
//! - Graded response model category probabilities and item information
//! - EAP and MAP ability estimation under a standard normal prior
//! - Maximum-information item selection with randomesque exposure control
//! - A stopping-rule state machine and an externally driven CAT session
//! - A parallel Monte Carlo harness measuring ability recovery
//! - Python bindings (feature `python`)

pub mod utils;

pub mod config;
pub mod error;
pub mod estimator;
pub mod item_bank;
pub mod model;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod stopping;
pub mod validation;

#[cfg(feature = "python")]
pub mod python;

pub use config::{CatConfig, EstimationMethod, ExposureControl, SelectionCriterion, StartRule};
pub use error::{CatError, CatResult, ConfigError, EstimationError, InputError};
pub use estimator::{AbilityEstimate, AbilityEstimator};
pub use item_bank::{Item, ItemBank, ItemId, ItemRecord};
pub use session::{
    AdministeredItem, CatEngine, CatSession, Responder, ResponseEvent, SessionResult,
};
pub use stopping::SessionStatus;
pub use validation::{
    AbilityDistribution, SimulatedResponder, ValidationHarness, ValidationReport, ValidationRun,
};
