//! Graded response model: category probabilities, item information and
//! log-likelihood derivatives.
//!
//! Categories are numbered `1..=k` everywhere outside this module's internals.

use crate::item_bank::Item;
use crate::utils::{sigmoid, EPSILON};

/// Boundary curves `P*(x >= j)` for `j = 1..=k+1`, padded with 1 and 0.
#[inline]
fn cumulative_probabilities(item: &Item, theta: f64) -> Vec<f64> {
    let k = item.category_count();
    let slope = item.effective_discrimination();
    let mut cum = vec![0.0; k + 1];
    cum[0] = 1.0;
    for (j, &d) in item.intercepts().iter().enumerate() {
        cum[j + 1] = sigmoid(slope * theta + d);
    }
    cum
}

/// Probability of each response category at `theta`, index 0 holding category 1.
pub fn category_probabilities(item: &Item, theta: f64) -> Vec<f64> {
    let k = item.category_count();
    let slope = item.effective_discrimination();
    let cum = cumulative_probabilities(item, theta);

    let mut probs = vec![0.0; k];
    // complement via the mirrored logistic avoids 1 - (1 - eps) cancellation
    probs[0] = sigmoid(-(slope * theta + item.intercepts()[0]));
    for j in 1..k {
        probs[j] = cum[j] - cum[j + 1];
    }
    probs
}

/// Probability of a single 1-based category.
pub fn category_probability(item: &Item, theta: f64, category: u32) -> f64 {
    let probs = category_probabilities(item, theta);
    probs[(category - 1) as usize]
}

/// Closed-form GRM item information at `theta`.
pub fn item_information(item: &Item, theta: f64) -> f64 {
    let k = item.category_count();
    let slope = item.effective_discrimination();
    let cum = cumulative_probabilities(item, theta);
    let probs = category_probabilities(item, theta);

    let deriv: Vec<f64> = cum.iter().map(|&p| slope * p * (1.0 - p)).collect();

    let mut info = 0.0;
    for j in 0..k {
        let p = probs[j];
        if p < EPSILON {
            continue;
        }
        let dp = deriv[j] - deriv[j + 1];
        info += dp * dp / p;
    }
    info
}

/// Sum of item information over a set of items.
pub fn test_information<'a>(items: impl IntoIterator<Item = &'a Item>, theta: f64) -> f64 {
    items
        .into_iter()
        .map(|item| item_information(item, theta))
        .sum()
}

/// `ln P(x = category | theta)` floored at `ln(EPSILON)`.
pub fn log_category_probability(item: &Item, theta: f64, category: u32) -> f64 {
    category_probability(item, theta, category).max(EPSILON).ln()
}

/// First and second derivative of `ln P(x = category | theta)`.
pub fn log_likelihood_derivatives(item: &Item, theta: f64, category: u32) -> (f64, f64) {
    let slope = item.effective_discrimination();
    let cum = cumulative_probabilities(item, theta);
    let j = (category - 1) as usize;

    let d1 = |p: f64| slope * p * (1.0 - p);
    let d2 = |p: f64| slope * slope * p * (1.0 - p) * (1.0 - 2.0 * p);

    let p = category_probability(item, theta, category).max(EPSILON);
    let dp = d1(cum[j]) - d1(cum[j + 1]);
    let ddp = d2(cum[j]) - d2(cum[j + 1]);

    let gradient = dp / p;
    let curvature = ddp / p - gradient * gradient;
    (gradient, curvature)
}

/// Inverse-CDF draw of a 1-based category given a uniform `u` in `[0, 1)`.
pub fn sample_category(item: &Item, theta: f64, u: f64) -> u32 {
    let probs = category_probabilities(item, theta);
    let mut cumsum = 0.0;
    for (j, &p) in probs.iter().enumerate() {
        cumsum += p;
        if u < cumsum {
            return j as u32 + 1;
        }
    }
    item.category_count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_bank::ItemRecord;

    fn item(reverse: bool) -> Item {
        Item::from_record(ItemRecord {
            id: 1,
            category_count: 5,
            discrimination: 1.8,
            thresholds: vec![-1.5, -0.5, 0.4, 1.3],
            reverse,
            display_text: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn forward_item_matches_difficulty_form() {
        let it = item(false);
        let theta = 0.7;
        let probs = category_probabilities(&it, theta);
        let b = it.thresholds();
        let star = |j: usize| 1.0 / (1.0 + (-1.8 * (theta - b[j])).exp());
        assert!((probs[0] - (1.0 - star(0))).abs() < 1e-12);
        assert!((probs[2] - (star(1) - star(2))).abs() < 1e-12);
        assert!((probs[4] - star(3)).abs() < 1e-12);
    }

    #[test]
    fn probabilities_sum_to_one() {
        for reverse in [false, true] {
            let it = item(reverse);
            for theta in [-40.0, -6.0, -1.2, 0.0, 0.33, 2.5, 6.0, 40.0] {
                let probs = category_probabilities(&it, theta);
                let total: f64 = probs.iter().sum();
                assert!((total - 1.0).abs() < 1e-9, "theta={theta} total={total}");
                assert!(probs.iter().all(|&p| p >= 0.0));
            }
        }
    }

    #[test]
    fn higher_ability_favours_higher_categories_unless_reversed() {
        let fwd = item(false);
        let rev = item(true);
        assert!(category_probability(&fwd, 3.0, 5) > category_probability(&fwd, -3.0, 5));
        assert!(category_probability(&rev, 3.0, 5) < category_probability(&rev, -3.0, 5));
    }

    #[test]
    fn reverse_information_mirrors_forward() {
        let fwd = item(false);
        let rev = item(true);
        for theta in [-2.5, -1.0, 0.0, 0.8, 1.9] {
            let a = item_information(&rev, theta);
            let b = item_information(&fwd, -theta);
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn information_matches_numeric_score_variance() {
        let it = item(false);
        let theta = 0.2;
        let h = 1e-5;
        let probs = category_probabilities(&it, theta);
        let numeric: f64 = (1..=5u32)
            .map(|c| {
                let up = log_category_probability(&it, theta + h, c);
                let down = log_category_probability(&it, theta - h, c);
                let score = (up - down) / (2.0 * h);
                probs[(c - 1) as usize] * score * score
            })
            .sum();
        assert!((numeric - item_information(&it, theta)).abs() < 1e-5);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let it = item(true);
        let h = 1e-4;
        for category in 1..=5u32 {
            let theta = 0.3;
            let (g, c) = log_likelihood_derivatives(&it, theta, category);
            let f = |t: f64| log_category_probability(&it, t, category);
            let g_num = (f(theta + h) - f(theta - h)) / (2.0 * h);
            let c_num = (f(theta + h) - 2.0 * f(theta) + f(theta - h)) / (h * h);
            assert!((g - g_num).abs() < 1e-5, "category {category}");
            assert!((c - c_num).abs() < 1e-3, "category {category}");
        }
    }

    #[test]
    fn sampling_follows_cumulative_boundaries() {
        let it = item(false);
        let probs = category_probabilities(&it, 0.0);
        assert_eq!(sample_category(&it, 0.0, 0.0), 1);
        assert_eq!(sample_category(&it, 0.0, probs[0] + 1e-9), 2);
        assert_eq!(sample_category(&it, 0.0, 0.999_999_999_999), 5);
    }
}
