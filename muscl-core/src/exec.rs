//! Index-space kernels.
//!
//! Every stage of a step is a pure per-cell (or per-face) function writing to
//! a disjoint output slot. With the `parallel` feature the work is spread
//! over the rayon thread pool; otherwise the same closures run in order.
//! Either way the results are identical, since no closure observes another's
//! output and the reductions used are order-insensitive.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::diagnostics::CellReport;

/// Run `f(index, slot)` over every element of `out`.
pub fn for_each_cell<T, F>(out: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    out.par_iter_mut().enumerate().for_each(|(i, slot)| f(i, slot));

    #[cfg(not(feature = "parallel"))]
    out.iter_mut().enumerate().for_each(|(i, slot)| f(i, slot));
}

/// Like [`for_each_cell`], merging the per-cell reports.
pub fn for_each_cell_reported<T, F>(out: &mut [T], f: F) -> CellReport
where
    T: Send,
    F: Fn(usize, &mut T) -> CellReport + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let report = out
        .par_iter_mut()
        .enumerate()
        .map(|(i, slot)| f(i, slot))
        .reduce(CellReport::clean, CellReport::merge);

    #[cfg(not(feature = "parallel"))]
    let report = out
        .iter_mut()
        .enumerate()
        .map(|(i, slot)| f(i, slot))
        .fold(CellReport::clean(), CellReport::merge);

    report
}

/// Map every index in `0..n` and fold the results with an associative,
/// commutative `reduce`.
pub fn map_reduce<T, M, R>(n: usize, identity: T, map: M, reduce: R) -> T
where
    T: Copy + Send + Sync,
    M: Fn(usize) -> T + Sync + Send,
    R: Fn(T, T) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let out = (0..n).into_par_iter().map(map).reduce(|| identity, reduce);

    #[cfg(not(feature = "parallel"))]
    let out = (0..n).map(map).fold(identity, reduce);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Violation;

    #[test]
    fn reported_kernel_finds_lowest_bad_index() {
        let mut out = vec![0.0f64; 1000];
        let report = for_each_cell_reported(&mut out, |i, slot| {
            *slot = i as f64;
            if i % 97 == 13 {
                CellReport::flag(i, Violation::NonFinite)
            } else {
                CellReport::clean()
            }
        });
        assert_eq!(out[999], 999.0);
        assert_eq!(report.non_finite, 11);
        assert_eq!(report.first, Some((13, Violation::NonFinite)));
    }

    #[test]
    fn map_reduce_max() {
        let m = map_reduce(500, f64::NEG_INFINITY, |i| ((i * 37) % 500) as f64, f64::max);
        assert_eq!(m, 499.0);
    }
}
