//! Derivative-free minimisation used for conditional sum of squares estimation

use std::cmp::Ordering;

/// Outcome of a simplex search
#[derive(Debug, Clone)]
pub struct SimplexResult {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether the tolerance was reached before `max_iter`
    pub converged: bool,
}

/// Tuning knobs for the Nelder-Mead simplex
#[derive(Debug, Clone, Copy)]
pub struct SimplexConfig {
    pub max_iter: usize,
    pub tolerance: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
    pub initial_step: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            tolerance: 1e-8,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            initial_step: 0.05,
        }
    }
}

/// Minimise `objective` starting from `initial`, clamping every vertex to
/// `bounds` when given.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: SimplexConfig,
) -> SimplexResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return SimplexResult {
            point: Vec::new(),
            value: objective(&[]),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial.to_vec(), bounds));
    for i in 0..n {
        let mut vertex = initial.to_vec();
        let step = if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        vertex[i] += step;
        simplex.push(clamp(vertex, bounds));
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| compare(values[a], values[b]));
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if (values[worst] - values[best]).abs() < config.tolerance {
            converged = true;
            break;
        }

        let centroid = centroid(&simplex, worst);
        let spread = simplex
            .iter()
            .map(|v| distance(v, &centroid))
            .fold(0.0, f64::max);
        if spread < config.tolerance {
            converged = true;
            break;
        }

        let reflected = clamp(
            towards(&centroid, &simplex[worst], -config.reflection),
            bounds,
        );
        let reflected_value = objective(&reflected);

        if reflected_value < values[best] {
            let expanded = clamp(towards(&centroid, &reflected, config.expansion), bounds);
            let expanded_value = objective(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (target, target_value) = if reflected_value < values[worst] {
            (reflected.clone(), reflected_value)
        } else {
            (simplex[worst].clone(), values[worst])
        };
        let contracted = clamp(towards(&centroid, &target, config.contraction), bounds);
        let contracted_value = objective(&contracted);
        if contracted_value < target_value {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i == best {
                continue;
            }
            let shrunk = anchor
                .iter()
                .zip(&simplex[i])
                .map(|(a, v)| a + config.shrink * (v - a))
                .collect();
            simplex[i] = clamp(shrunk, bounds);
            values[i] = objective(&simplex[i]);
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| compare(values[a], values[b]))
        .unwrap_or(0);

    SimplexResult {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}

// NaN sorts last so a poisoned vertex is always the one replaced.
fn compare(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn centroid(simplex: &[Vec<f64>], exclude: usize) -> Vec<f64> {
    let dim = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut c = vec![0.0; dim];
    for (i, vertex) in simplex.iter().enumerate() {
        if i == exclude {
            continue;
        }
        for (acc, v) in c.iter_mut().zip(vertex) {
            *acc += v;
        }
    }
    c.iter_mut().for_each(|v| *v /= count);
    c
}

/// `centroid + coeff * (point - centroid)`
fn towards(centroid: &[f64], point: &[f64], coeff: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + coeff * (p - c))
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn clamp(mut point: Vec<f64>, bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    if let Some(bounds) = bounds {
        for (v, (lo, hi)) in point.iter_mut().zip(bounds) {
            *v = v.clamp(*lo, *hi);
        }
    }
    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_quadratic_minimum() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
            &[0.0, 0.0],
            None,
            SimplexConfig::default(),
        );

        assert!(result.converged);
        assert_abs_diff_eq!(result.point[0], 2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(result.point[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn respects_bounds() {
        let bounds = [(-0.5, 0.5)];
        let result = nelder_mead(
            |x| (x[0] - 3.0).powi(2),
            &[0.0],
            Some(&bounds),
            SimplexConfig::default(),
        );

        assert_abs_diff_eq!(result.point[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn empty_problem_is_trivially_converged() {
        let result = nelder_mead(|_| 4.0, &[], None, SimplexConfig::default());
        assert!(result.converged);
        assert_eq!(result.value, 4.0);
    }
}
