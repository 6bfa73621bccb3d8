//! Search strategies over drug loading.
//!
//! Both strategies look for the highest loading whose stability meets a threshold. They are
//! generic over the evaluation closure so they can be exercised against any score curve.
//! Binary search assumes stability does not improve as loading rises; on curves that violate
//! this it returns a qualifying loading that need not be the highest one.

use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub loading: f64,
    pub stability: f64,
    /// Whether `stability` meets the threshold. When false, `loading` is the best-scoring
    /// point the search evaluated.
    pub qualified: bool,
}

/// `points` evenly spaced loadings covering `[min, max]` inclusive.
pub fn grid_loadings((min, max): (f64, f64), points: usize) -> Vec<f64> {
    if points < 2 {
        return vec![min];
    }
    let step = (max - min) / (points - 1) as f64;
    (0..points)
        .map(|i| if i == points - 1 { max } else { min + step * i as f64 })
        .collect()
}

/// Evaluates every grid loading; returns the highest qualifying one or, if none qualifies,
/// the best-scoring one (ties favour the higher loading).
pub fn grid_search<E>(
    range: (f64, f64),
    points: usize,
    threshold: f64,
    mut evaluate: impl FnMut(f64) -> Result<f64, E>,
) -> Result<SearchOutcome, E> {
    let mut best_qualifying: Option<SearchOutcome> = None;
    let mut best_overall: Option<SearchOutcome> = None;

    for loading in grid_loadings(range, points) {
        let stability = evaluate(loading)?;
        trace!(loading, stability, "Grid point evaluated.");
        let candidate = SearchOutcome {
            loading,
            stability,
            qualified: stability >= threshold,
        };
        if candidate.qualified {
            best_qualifying = Some(candidate);
        }
        if best_overall.is_none_or(|best| stability >= best.stability) {
            best_overall = Some(candidate);
        }
    }

    let outcome = best_qualifying.or(best_overall).unwrap_or(SearchOutcome {
        loading: range.0,
        stability: 0.0,
        qualified: false,
    });
    debug!(
        loading = outcome.loading,
        qualified = outcome.qualified,
        "Grid search finished."
    );
    Ok(outcome)
}

/// Bisects between the endpoints for the highest qualifying loading.
///
/// Both endpoints are evaluated first. If both qualify the upper one is returned at once;
/// if neither does the search is abandoned and the better endpoint returned (ties favour
/// the upper one). Otherwise the interval is halved at most `max_iterations` times or until
/// it is narrower than `tolerance`.
pub fn binary_search<E>(
    (min, max): (f64, f64),
    threshold: f64,
    max_iterations: usize,
    tolerance: f64,
    mut evaluate: impl FnMut(f64) -> Result<f64, E>,
) -> Result<SearchOutcome, E> {
    let low_score = evaluate(min)?;
    let high_score = evaluate(max)?;
    let low = SearchOutcome {
        loading: min,
        stability: low_score,
        qualified: low_score >= threshold,
    };
    let high = SearchOutcome {
        loading: max,
        stability: high_score,
        qualified: high_score >= threshold,
    };

    match (low.qualified, high.qualified) {
        (_, true) => {
            debug!(loading = max, "Upper endpoint qualifies.");
            return Ok(high);
        }
        (false, false) => {
            debug!("Neither endpoint qualifies; returning the better one.");
            return Ok(if low.stability > high.stability { low } else { high });
        }
        (true, false) => {}
    }

    let (mut lo, mut hi) = (min, max);
    let mut best = low;
    for iteration in 0..max_iterations {
        if hi - lo < tolerance {
            break;
        }
        let mid = 0.5 * (lo + hi);
        let stability = evaluate(mid)?;
        trace!(iteration, loading = mid, stability, "Bisection step.");
        if stability >= threshold {
            best = SearchOutcome {
                loading: mid,
                stability,
                qualified: true,
            };
            lo = mid;
        } else {
            hi = mid;
        }
    }

    debug!(loading = best.loading, "Binary search finished.");
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_loadings_include_both_endpoints() {
        let grid = grid_loadings((0.1, 0.5), 9);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0], 0.1);
        assert_eq!(grid[8], 0.5);
        assert!((grid[4] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn grid_search_falls_back_to_best_score_when_nothing_qualifies() {
        let outcome =
            grid_search::<()>((0.1, 0.5), 9, 0.9, |l| Ok(0.5 - (l - 0.2).abs())).unwrap();
        assert!(!outcome.qualified);
        assert!((outcome.loading - 0.2).abs() < 1e-12);
    }

    #[test]
    fn binary_search_short_circuits_when_both_endpoints_qualify() {
        let mut calls = Vec::new();
        let outcome = binary_search::<()>((0.1, 0.5), 0.5, 10, 0.01, |l| {
            calls.push(l);
            Ok(0.9)
        })
        .unwrap();
        assert_eq!(outcome.loading, 0.5);
        assert_eq!(calls, vec![0.1, 0.5]);
    }

    #[test]
    fn binary_search_returns_better_endpoint_when_neither_qualifies() {
        let outcome = binary_search::<()>((0.1, 0.5), 0.95, 10, 0.01, |l| Ok(1.0 - l)).unwrap();
        assert_eq!(outcome.loading, 0.1);
        assert!(!outcome.qualified);

        let flat = binary_search::<()>((0.1, 0.5), 0.9, 10, 0.01, |_| Ok(0.4)).unwrap();
        assert_eq!(flat.loading, 0.5);
        assert!(!flat.qualified);
    }

    #[test]
    fn binary_search_respects_the_iteration_cap() {
        let mut calls = 0;
        binary_search::<()>((0.0, 1.0), 0.5, 3, 1e-9, |l| {
            calls += 1;
            Ok(1.0 - l)
        })
        .unwrap();
        assert_eq!(calls, 2 + 3);
    }

    #[test]
    fn evaluation_errors_propagate() {
        let err = binary_search((0.1, 0.5), 0.5, 10, 0.01, |l| {
            if l > 0.2 { Err("boom") } else { Ok(0.9) }
        })
        .unwrap_err();
        assert_eq!(err, "boom");
    }

    #[test]
    fn grid_and_binary_agree_on_monotonically_decreasing_stability() {
        let range = (0.1, 0.5);
        for boundary in grid_loadings(range, 9).into_iter().skip(1) {
            let threshold = 1.0 - boundary - 1e-9;
            let curve = |l: f64| Ok::<_, ()>(1.0 - l);

            let grid = grid_search(range, 9, threshold, curve).unwrap();
            let binary = binary_search(range, threshold, 10, 0.01, curve).unwrap();

            assert!(grid.qualified && binary.qualified);
            assert!(
                (grid.loading - binary.loading).abs() <= 0.01,
                "boundary {boundary}: grid {} vs binary {}",
                grid.loading,
                binary.loading
            );
        }
    }
}
