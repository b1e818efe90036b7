//! Monte Carlo validation of ability recovery.
//!
//! Every simulated examinee runs a full [`CatSession`](crate::session::CatSession)
//! against a responder that samples categories from the response model at the
//! examinee's true ability.
//! Examinees are independent and run in parallel, each with its own `Pcg64`
//! stream seeded from a master stream of the run seed, so a report depends
//! only on the seed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::prelude::*;
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CatResult, ConfigError};
use crate::item_bank::Item;
use crate::model::sample_category;
use crate::session::{CatEngine, Responder, SessionResult};

/// Conditional report bins: `(lower, upper]`, open at both outer ends.
pub const THETA_BINS: [(f64, f64, &str); 6] = [
    (f64::NEG_INFINITY, -2.0, "(-inf, -2]"),
    (-2.0, -1.0, "(-2, -1]"),
    (-1.0, 0.0, "(-1, 0]"),
    (0.0, 1.0, "(0, 1]"),
    (1.0, 2.0, "(1, 2]"),
    (2.0, f64::INFINITY, "(2, inf)"),
];

/// Index into [`THETA_BINS`] for a true ability.
pub fn bin_index(theta: f64) -> usize {
    THETA_BINS
        .iter()
        .position(|&(_, upper, _)| theta <= upper)
        .unwrap_or(THETA_BINS.len() - 1)
}

/// Where the true abilities of a simulated population come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityDistribution {
    /// `n` i.i.d. draws from N(0, 1).
    StandardNormal { n: usize },
    Fixed(Vec<f64>),
}

impl AbilityDistribution {
    pub fn len(&self) -> usize {
        match self {
            AbilityDistribution::StandardNormal { n } => *n,
            AbilityDistribution::Fixed(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn draw(&self, seed: u64) -> Vec<f64> {
        self.sample(&mut Pcg64::seed_from_u64(seed))
    }

    /// True abilities drawn from `rng`; fixed populations consume nothing.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        match self {
            AbilityDistribution::StandardNormal { n } => {
                (0..*n).map(|_| rng.sample(StandardNormal)).collect()
            }
            AbilityDistribution::Fixed(values) => values.clone(),
        }
    }
}

/// Answers items by inverse-CDF sampling at a fixed true ability.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    theta: f64,
    rng: Pcg64,
}

impl SimulatedResponder {
    pub fn new(theta: f64, rng: Pcg64) -> Self {
        Self { theta, rng }
    }
}

impl Responder for SimulatedResponder {
    fn respond(&mut self, item: &Item) -> u32 {
        let u: f64 = self.rng.random();
        sample_category(item, self.theta, u)
    }
}

/// One simulated examinee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRun {
    pub true_theta: f64,
    pub result: SessionResult,
    /// `theta_hat - true_theta`
    pub error: f64,
    pub abs_error: f64,
    pub squared_error: f64,
}

impl ValidationRun {
    pub fn new(true_theta: f64, result: SessionResult) -> Self {
        let error = result.theta_hat - true_theta;
        Self {
            true_theta,
            result,
            error,
            abs_error: error.abs(),
            squared_error: error * error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub n: usize,
    pub bias: f64,
    pub mae: f64,
    pub rmse: f64,
    pub mean_items: f64,
    pub mean_sem: f64,
    pub degraded: usize,
    pub status_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalStats {
    pub range_label: String,
    pub n: usize,
    pub cbias: Option<f64>,
    pub cmae: Option<f64>,
    pub crmse: Option<f64>,
    pub avg_items: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall: OverallStats,
    pub conditional: Vec<ConditionalStats>,
}

impl ValidationReport {
    pub fn from_runs(runs: &[ValidationRun]) -> Result<Self, ConfigError> {
        if runs.is_empty() {
            return Err(ConfigError::EmptyPopulation);
        }

        let n = runs.len() as f64;
        let mut status_counts = BTreeMap::new();
        for run in runs {
            *status_counts
                .entry(run.result.status.to_string())
                .or_insert(0) += 1;
        }

        let overall = OverallStats {
            n: runs.len(),
            bias: runs.iter().map(|r| r.error).sum::<f64>() / n,
            mae: runs.iter().map(|r| r.abs_error).sum::<f64>() / n,
            rmse: (runs.iter().map(|r| r.squared_error).sum::<f64>() / n).sqrt(),
            mean_items: runs
                .iter()
                .map(|r| r.result.administered_count() as f64)
                .sum::<f64>()
                / n,
            mean_sem: runs.iter().map(|r| r.result.sem).sum::<f64>() / n,
            degraded: runs.iter().filter(|r| r.result.degraded_estimate).count(),
            status_counts,
        };

        let mut bins: Vec<Vec<&ValidationRun>> = vec![Vec::new(); THETA_BINS.len()];
        for run in runs {
            bins[bin_index(run.true_theta)].push(run);
        }

        let conditional = THETA_BINS
            .iter()
            .zip(bins.iter())
            .map(|(&(_, _, label), members)| {
                ConditionalStats {
                    range_label: label.to_string(),
                    n: members.len(),
                    cbias: bin_mean(members, |r| r.error),
                    cmae: bin_mean(members, |r| r.abs_error),
                    crmse: bin_mean(members, |r| r.squared_error).map(f64::sqrt),
                    avg_items: bin_mean(members, |r| r.result.administered_count() as f64),
                }
            })
            .collect();

        Ok(Self {
            overall,
            conditional,
        })
    }

    /// Conditional row by its range label.
    pub fn bin(&self, label: &str) -> Option<&ConditionalStats> {
        self.conditional.iter().find(|c| c.range_label == label)
    }
}

fn bin_mean(members: &[&ValidationRun], f: impl Fn(&ValidationRun) -> f64) -> Option<f64> {
    if members.is_empty() {
        return None;
    }
    Some(members.iter().map(|&r| f(r)).sum::<f64>() / members.len() as f64)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.overall;
        writeln!(f, "Overall (n = {})", o.n)?;
        writeln!(f, "  Bias       {:>9.4}", o.bias)?;
        writeln!(f, "  MAE        {:>9.4}", o.mae)?;
        writeln!(f, "  RMSE       {:>9.4}", o.rmse)?;
        writeln!(f, "  Mean items {:>9.2}", o.mean_items)?;
        writeln!(f, "  Mean SEM   {:>9.4}", o.mean_sem)?;
        for (status, count) in &o.status_counts {
            writeln!(f, "  {status:<18} {count}")?;
        }
        if o.degraded > 0 {
            writeln!(f, "  degraded_estimate  {}", o.degraded)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<12} {:>6} {:>9} {:>9} {:>9} {:>9}",
            "theta", "n", "cBias", "cMAE", "cRMSE", "items"
        )?;
        for row in &self.conditional {
            writeln!(
                f,
                "{:<12} {:>6} {:>9} {:>9} {:>9} {:>9}",
                row.range_label,
                row.n,
                fmt_opt(row.cbias),
                fmt_opt(row.cmae),
                fmt_opt(row.crmse),
                row.avg_items
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.2}")),
            )?;
        }
        Ok(())
    }
}

/// Runs simulated populations through a shared engine.
#[derive(Debug, Clone)]
pub struct ValidationHarness {
    engine: Arc<CatEngine>,
}

impl ValidationHarness {
    pub fn new(engine: Arc<CatEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CatEngine> {
        &self.engine
    }

    /// Simulate one examinee from its own seed.
    pub fn simulate_examinee(
        &self,
        index: usize,
        true_theta: f64,
        seed: u64,
    ) -> CatResult<ValidationRun> {
        let mut rng = Pcg64::seed_from_u64(seed);
        let session_seed: u64 = rng.random();
        let mut responder = SimulatedResponder::new(true_theta, rng);
        let mut session = self
            .engine
            .start_session(format!("sim-{index:06}"), session_seed);
        let result = session.run(&mut responder)?;
        Ok(ValidationRun::new(true_theta, result))
    }

    /// Simulate every examinee; results come back in population order.
    pub fn simulate(
        &self,
        population: &AbilityDistribution,
        seed: u64,
    ) -> CatResult<Vec<ValidationRun>> {
        if population.is_empty() {
            return Err(ConfigError::EmptyPopulation.into());
        }

        let plan = Self::plan(population, seed);
        tracing::info!(
            examinees = plan.len(),
            seed,
            method = ?self.engine.config().estimation_method,
            "starting validation run"
        );

        plan.par_iter()
            .enumerate()
            .map(|(i, &(theta, examinee_seed))| self.simulate_examinee(i, theta, examinee_seed))
            .collect()
    }

    /// True ability and private seed of every examinee, in population order.
    ///
    /// Both come from one `Pcg64` master stream seeded by `seed`: the
    /// abilities first, then one seed per examinee.
    pub fn plan(population: &AbilityDistribution, seed: u64) -> Vec<(f64, u64)> {
        let mut master = Pcg64::seed_from_u64(seed);
        let thetas = population.sample(&mut master);
        thetas
            .into_iter()
            .map(|theta| (theta, master.random::<u64>()))
            .collect()
    }

    pub fn run(&self, population: &AbilityDistribution, seed: u64) -> CatResult<ValidationReport> {
        let runs = self.simulate(population, seed)?;
        let report = ValidationReport::from_runs(&runs)?;
        tracing::info!(
            n = report.overall.n,
            bias = report.overall.bias,
            mae = report.overall.mae,
            rmse = report.overall.rmse,
            "validation run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stopping::SessionStatus;

    #[test]
    fn bin_edges_are_right_closed() {
        assert_eq!(bin_index(-5.0), 0);
        assert_eq!(bin_index(-2.0), 0);
        assert_eq!(bin_index(-1.999), 1);
        assert_eq!(bin_index(-1.0), 1);
        assert_eq!(bin_index(0.0), 2);
        assert_eq!(bin_index(1e-12), 3);
        assert_eq!(bin_index(1.0), 3);
        assert_eq!(bin_index(2.0), 4);
        assert_eq!(bin_index(2.000_001), 5);
        assert_eq!(bin_index(f64::INFINITY), 5);
    }

    fn run(true_theta: f64, theta_hat: f64, items: usize) -> ValidationRun {
        let result = SessionResult {
            session_id: "t".into(),
            theta_hat,
            sem: 0.3,
            status: SessionStatus::StoppedPrecision,
            degraded_estimate: false,
            administered_items: (0..items as u32)
                .map(|item_id| crate::session::AdministeredItem {
                    item_id,
                    category: 3,
                })
                .collect(),
        };
        ValidationRun::new(true_theta, result)
    }

    #[test]
    fn report_statistics_by_hand() {
        let runs = vec![
            run(-0.5, -0.2, 8),
            run(-0.4, -0.8, 10),
            run(2.5, 1.5, 15),
        ];
        let report = ValidationReport::from_runs(&runs).unwrap();
        let o = &report.overall;
        assert_eq!(o.n, 3);
        assert!((o.bias - (0.3 - 0.4 - 1.0) / 3.0).abs() < 1e-12);
        assert!((o.mae - (0.3 + 0.4 + 1.0) / 3.0).abs() < 1e-12);
        assert!((o.rmse - ((0.09 + 0.16 + 1.0) / 3.0f64).sqrt()).abs() < 1e-12);
        assert!((o.mean_items - 11.0).abs() < 1e-12);
        assert_eq!(o.status_counts.get("stopped_precision"), Some(&3));

        let mid = report.bin("(-1, 0]").unwrap();
        assert_eq!(mid.n, 2);
        assert!((mid.cbias.unwrap() + 0.05).abs() < 1e-12);
        assert!((mid.avg_items.unwrap() - 9.0).abs() < 1e-12);

        let top = report.bin("(2, inf)").unwrap();
        assert_eq!(top.n, 1);
        assert!((top.crmse.unwrap() - 1.0).abs() < 1e-12);

        let empty = report.bin("(-inf, -2]").unwrap();
        assert_eq!(empty.n, 0);
        assert_eq!(empty.cbias, None);
        assert_eq!(report.conditional.len(), 6);
    }

    #[test]
    fn empty_population_is_rejected() {
        assert_eq!(
            ValidationReport::from_runs(&[]),
            Err(ConfigError::EmptyPopulation)
        );
    }

    #[test]
    fn normal_draws_are_seeded() {
        let dist = AbilityDistribution::StandardNormal { n: 50 };
        assert_eq!(dist.draw(3), dist.draw(3));
        assert_ne!(dist.draw(3), dist.draw(4));
        let fixed = AbilityDistribution::Fixed(vec![0.5, -1.0]);
        assert_eq!(fixed.draw(99), vec![0.5, -1.0]);
    }

    #[test]
    fn adjacent_run_seeds_share_no_examinee_streams() {
        let population = AbilityDistribution::Fixed(vec![0.0; 64]);
        let seeds = |seed| -> Vec<u64> {
            ValidationHarness::plan(&population, seed)
                .into_iter()
                .map(|(_, s)| s)
                .collect()
        };
        let a = seeds(41);
        let b = seeds(42);
        assert_eq!(a, seeds(41));
        assert!(a.iter().all(|s| !b.contains(s)));
        // no examinee replays another run's master stream
        assert!(!a.contains(&42) && !b.contains(&41));
    }

    #[test]
    fn plan_keeps_population_order_and_draws() {
        let normal = AbilityDistribution::StandardNormal { n: 10 };
        let plan = ValidationHarness::plan(&normal, 5);
        let thetas: Vec<f64> = plan.iter().map(|&(t, _)| t).collect();
        assert_eq!(thetas, normal.draw(5));

        let fixed = AbilityDistribution::Fixed(vec![1.5, -0.5]);
        let plan = ValidationHarness::plan(&fixed, 5);
        assert_eq!(plan[0].0, 1.5);
        assert_eq!(plan[1].0, -0.5);
    }

    #[test]
    fn report_renders_every_bin() {
        let report = ValidationReport::from_runs(&[run(0.5, 0.7, 9)]).unwrap();
        let text = report.to_string();
        for (_, _, label) in THETA_BINS {
            assert!(text.contains(label), "missing {label}");
        }
    }
}
