//! Derivative-free minimisation for model fitting.

use std::cmp::Ordering;

/// Outcome of a [`NelderMead::minimize`] run.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best point found.
    pub point: Vec<f64>,
    /// Objective value at `point`.
    pub value: f64,
    /// Iterations used.
    pub iterations: usize,
    /// Whether the simplex collapsed below tolerance before `max_iter`.
    pub converged: bool,
}

/// Nelder-Mead simplex minimiser with optional box bounds.
///
/// # Example
/// ```
/// use weekly_anomaly::utils::NelderMead;
///
/// let min = NelderMead::new()
///     .with_max_iter(500)
///     .minimize(|x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2), &[0.0, 0.0]);
///
/// assert!(min.converged);
/// assert!((min.point[0] - 2.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iter: usize,
    tolerance: f64,
    initial_step: f64,
    bounds: Option<Vec<(f64, f64)>>,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            initial_step: 0.05,
            bounds: None,
        }
    }
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

impl NelderMead {
    /// Minimiser with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance on simplex size.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the initial simplex step, relative to each coordinate's magnitude.
    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    /// Clamp each coordinate to `(lo, hi)`.
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Minimise `objective` starting from `initial`.
    ///
    /// Non-finite objective values are treated as `+∞`.
    pub fn minimize<F>(&self, objective: F, initial: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = initial.len();
        let eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        if n == 0 {
            return Minimum {
                point: Vec::new(),
                value: eval(&[]),
                iterations: 0,
                converged: true,
            };
        }

        let start = self.clamp(initial.to_vec());
        let mut simplex = vec![start.clone()];
        for i in 0..n {
            let mut vertex = start.clone();
            let scale = if vertex[i].abs() > 1e-10 {
                vertex[i].abs()
            } else {
                1.0
            };
            vertex[i] += self.initial_step * scale;
            simplex.push(self.clamp(vertex));
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iter {
            iterations += 1;
            sort_simplex(&mut simplex, &mut values);

            // Converged only once the simplex itself has collapsed.
            let size = simplex[1..]
                .iter()
                .map(|v| distance(v, &simplex[0]))
                .fold(0.0, f64::max);
            if size < self.tolerance {
                converged = true;
                break;
            }

            let centroid = centroid(&simplex[..n]);
            let reflected = self.clamp(towards(&centroid, &simplex[n], -REFLECT));
            let f_reflected = eval(&reflected);

            if f_reflected < values[0] {
                let expanded = self.clamp(towards(&centroid, &simplex[n], -REFLECT * EXPAND));
                let f_expanded = eval(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }
            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            let (contracted, accept_below) = if f_reflected < values[n] {
                (towards(&centroid, &reflected, CONTRACT), f_reflected)
            } else {
                (towards(&centroid, &simplex[n], CONTRACT), values[n])
            };
            let contracted = self.clamp(contracted);
            let f_contracted = eval(&contracted);
            if f_contracted < accept_below {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            let best = simplex[0].clone();
            for i in 1..=n {
                simplex[i] = self.clamp(towards(&best, &simplex[i], SHRINK));
                values[i] = eval(&simplex[i]);
            }
        }

        sort_simplex(&mut simplex, &mut values);
        Minimum {
            point: simplex.swap_remove(0),
            value: values[0],
            iterations,
            converged,
        }
    }

    fn clamp(&self, mut x: Vec<f64>) -> Vec<f64> {
        if let Some(bounds) = &self.bounds {
            for (xi, &(lo, hi)) in x.iter_mut().zip(bounds.iter()) {
                *xi = xi.clamp(lo, hi);
            }
        }
        x
    }
}

fn sort_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}

fn centroid(points: &[Vec<f64>]) -> Vec<f64> {
    let k = points.len() as f64;
    let mut c = vec![0.0; points[0].len()];
    for p in points {
        for (ci, pi) in c.iter_mut().zip(p.iter()) {
            *ci += pi / k;
        }
    }
    c
}

/// `origin + t · (target − origin)`.
fn towards(origin: &[f64], target: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target.iter())
        .map(|(o, x)| o + t * (x - o))
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
