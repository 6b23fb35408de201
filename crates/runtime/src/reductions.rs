//! Deterministic reductions over sample buffers.
//!
//! Signals arrive in the store in whatever order the workers finish, but a
//! given combined buffer must always reduce to the same bits. Sums therefore
//! use a fixed binary tree whose pairing depends only on index:
//!
//! ```text
//! Samples: [s0, s1, s2, s3, s4]
//!
//! Level 0: s0+s1  s2+s3  s4
//! Level 1: (s0+s1)+(s2+s3)  s4
//! Level 2: ((s0+s1)+(s2+s3))+s4
//! ```
//!
//! Odd trailing elements are carried up unchanged.
//!
//! # Available Operations
//!
//! | Function | Notes |
//! |----------|-------|
//! | [`sum`] | Fixed-tree reduction |
//! | [`mean`] | `sum / count`, `0.0` when empty |
//! | [`min`] / [`max`] | `None` when empty, NaN-free input assumed |
//! | [`population_std`] | Divisor `N` |
//! | [`sample_std`] | Divisor `N - 1`, `None` below two samples |
//! | [`quantile`] | Linear interpolation between closest ranks |

/// Reduce `values` pairwise along a fixed binary tree.
///
/// Returns `None` for an empty slice.
///
/// ```
/// use cosmic_runtime::reductions::tree_reduce;
///
/// let total = tree_reduce(&[1.0, 2.0, 3.0, 4.0, 5.0], |a, b| a + b);
/// assert_eq!(total, Some(15.0));
/// ```
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    match values.len() {
        0 => return None,
        1 => return Some(values[0]),
        _ => {}
    }

    let mut current: Vec<T> = values.to_vec();
    let mut next: Vec<T> = Vec::with_capacity(values.len().div_ceil(2));

    while current.len() > 1 {
        next.clear();
        for pair in current.chunks(2) {
            match pair {
                [a, b] => next.push(op(*a, *b)),
                [a] => next.push(*a),
                _ => unreachable!("chunks(2) yields one or two elements"),
            }
        }
        std::mem::swap(&mut current, &mut next);
    }

    Some(current[0])
}

/// Deterministic sum. `0.0` for an empty slice.
pub fn sum(values: &[f64]) -> f64 {
    tree_reduce(values, |a, b| a + b).unwrap_or(0.0)
}

/// Arithmetic mean. `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sum(values) / values.len() as f64
}

pub fn min(values: &[f64]) -> Option<f64> {
    tree_reduce(values, f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    tree_reduce(values, f64::max)
}

/// Sum of squared deviations from `center`, reduced along the same tree.
fn squared_deviations(values: &[f64], center: f64) -> f64 {
    let squares: Vec<f64> = values.iter().map(|v| (v - center).powi(2)).collect();
    sum(&squares)
}

/// Population standard deviation (divisor `N`). `0.0` for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = mean(values);
    (squared_deviations(values, center) / values.len() as f64).sqrt()
}

/// Sample standard deviation (divisor `N - 1`).
///
/// Undefined for fewer than two samples.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let center = mean(values);
    Some((squared_deviations(values, center) / (values.len() - 1) as f64).sqrt())
}

/// Quantile `q` (in `[0, 1]`) of an ascending-sorted slice.
///
/// Uses linear interpolation: position `q * (n - 1)` is split into the
/// neighbouring ranks and blended by its fractional part.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}
