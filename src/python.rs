//! Python bindings for the adaptive testing engine.

use std::sync::Arc;

use ndarray::Array1;
use numpy::{PyArray1, PyReadonlyArray1, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{CatConfig, ExposureControl, StartRule};
use crate::item_bank::{Item, ItemBank, ItemRecord};
use crate::model::{category_probabilities, item_information};
use crate::selector::ItemSelector;
use crate::session::CatEngine;
use crate::validation::{AbilityDistribution, ValidationHarness};

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn build_engine(bank_json: &str, config_toml: Option<&str>) -> PyResult<Arc<CatEngine>> {
    let bank = ItemBank::from_json_str(bank_json).map_err(value_error)?;
    let config = match config_toml {
        Some(text) => CatConfig::from_toml_str(text).map_err(value_error)?,
        None => CatConfig::default(),
    };
    let engine = CatEngine::new(Arc::new(bank), config).map_err(value_error)?;
    Ok(Arc::new(engine))
}

/// Category probabilities of a single GRM item at theta
#[pyfunction]
#[pyo3(signature = (theta, discrimination, thresholds, reverse=false))]
pub fn cat_category_probabilities<'py>(
    py: Python<'py>,
    theta: f64,
    discrimination: f64,
    thresholds: PyReadonlyArray1<f64>,
    reverse: bool,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let thresholds = thresholds.as_array().to_vec();
    let item = Item::from_record(ItemRecord {
        id: 0,
        category_count: thresholds.len() + 1,
        discrimination,
        thresholds,
        reverse,
        display_text: String::new(),
    })
    .map_err(value_error)?;
    Ok(Array1::from_vec(category_probabilities(&item, theta)).to_pyarray(py))
}

/// Information of every bank item at theta, in bank order
#[pyfunction]
pub fn cat_item_information<'py>(
    py: Python<'py>,
    theta: f64,
    bank_json: &str,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let bank = ItemBank::from_json_str(bank_json).map_err(value_error)?;
    let info: Vec<f64> = bank
        .items()
        .iter()
        .map(|item| item_information(item, theta))
        .collect();
    Ok(Array1::from_vec(info).to_pyarray(py))
}

/// Select the next item id by maximum information among items not yet administered
#[pyfunction]
#[pyo3(signature = (theta, bank_json, administered_ids))]
pub fn cat_select_next_item(
    theta: f64,
    bank_json: &str,
    administered_ids: PyReadonlyArray1<u32>,
) -> PyResult<Option<u32>> {
    let bank = ItemBank::from_json_str(bank_json).map_err(value_error)?;
    let mut administered = vec![false; bank.len()];
    for id in administered_ids.as_array().iter() {
        if let Some(pos) = bank.position(*id) {
            administered[pos] = true;
        }
    }
    let selector = ItemSelector::new(StartRule::Random, ExposureControl::disabled());
    let ranked = selector.rank(&bank, theta, &administered);
    Ok(ranked.first().map(|&(pos, _)| bank.item(pos).id()))
}

/// Run full CAT sessions for the given true thetas in parallel
#[pyfunction]
#[pyo3(signature = (bank_json, true_thetas, seed, config_toml=None))]
#[allow(clippy::type_complexity)]
pub fn cat_simulate_batch<'py>(
    py: Python<'py>,
    bank_json: &str,
    true_thetas: PyReadonlyArray1<f64>,
    seed: u64,
    config_toml: Option<&str>,
) -> PyResult<(
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray1<f64>>,
    Bound<'py, PyArray1<i32>>,
    Bound<'py, PyArray1<f64>>,
)> {
    let engine = build_engine(bank_json, config_toml)?;
    let population = AbilityDistribution::Fixed(true_thetas.as_array().to_vec());
    let harness = ValidationHarness::new(engine);

    let runs = py
        .detach(|| harness.simulate(&population, seed))
        .map_err(value_error)?;

    let n_total = runs.len();
    let mut theta_est = Array1::zeros(n_total);
    let mut se_est = Array1::zeros(n_total);
    let mut n_items = Array1::zeros(n_total);
    let mut true_theta_out = Array1::zeros(n_total);

    for (i, run) in runs.into_iter().enumerate() {
        theta_est[i] = run.result.theta_hat;
        se_est[i] = run.result.sem;
        n_items[i] = run.result.administered_count() as i32;
        true_theta_out[i] = run.true_theta;
    }

    Ok((
        theta_est.to_pyarray(py),
        se_est.to_pyarray(py),
        n_items.to_pyarray(py),
        true_theta_out.to_pyarray(py),
    ))
}

/// Monte Carlo validation report as a JSON string
#[pyfunction]
#[pyo3(signature = (bank_json, n, seed, config_toml=None))]
pub fn cat_validation_report(
    py: Python<'_>,
    bank_json: &str,
    n: usize,
    seed: u64,
    config_toml: Option<&str>,
) -> PyResult<String> {
    let engine = build_engine(bank_json, config_toml)?;
    let harness = ValidationHarness::new(engine);
    let report = py
        .detach(|| harness.run(&AbilityDistribution::StandardNormal { n }, seed))
        .map_err(value_error)?;
    serde_json::to_string(&report).map_err(value_error)
}

/// Register CAT functions with the Python module
pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(cat_category_probabilities, m)?)?;
    m.add_function(wrap_pyfunction!(cat_item_information, m)?)?;
    m.add_function(wrap_pyfunction!(cat_select_next_item, m)?)?;
    m.add_function(wrap_pyfunction!(cat_simulate_batch, m)?)?;
    m.add_function(wrap_pyfunction!(cat_validation_report, m)?)?;
    Ok(())
}

/// Module init; Python resolves `PyInit_<library name>`, so the name must
/// stay in step with `[lib] name`.
#[pymodule]
fn catsim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    register(m)
}
