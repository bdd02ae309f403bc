use serde::{Deserialize, Serialize};

use crate::data::TrackPropertyDict;
use crate::{TrackCutsError, TrackCutsResult};

/// A bin specifier, normalized into ascending bin edges by [`make_bins`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinSpec {
    /// A number of bins; the range is taken from the min and max of the
    /// values being binned.
    Count(usize),
    /// Evenly spaced bins between two bounds.
    Range(f64, f64, usize),
    /// Explicit ascending bin edges, one more than the number of bins.
    Edges(Vec<f64>),
}

impl From<usize> for BinSpec {
    fn from(bins: usize) -> Self {
        BinSpec::Count(bins)
    }
}

impl From<(f64, f64, usize)> for BinSpec {
    fn from((lo, hi, bins): (f64, f64, usize)) -> Self {
        BinSpec::Range(lo, hi, bins)
    }
}

impl From<Vec<f64>> for BinSpec {
    fn from(edges: Vec<f64>) -> Self {
        BinSpec::Edges(edges)
    }
}

fn invalid<T>(reason: impl Into<String>) -> TrackCutsResult<T> {
    Err(TrackCutsError::InvalidBinSpec {
        reason: reason.into(),
    })
}

/// Evenly spaced edges for `bins` bins over `range`, endpoints exact.
fn get_bin_edges(bins: usize, range: (f64, f64)) -> Vec<f64> {
    let bin_width = (range.1 - range.0) / (bins as f64);
    let mut edges: Vec<f64> = (0..=bins).map(|i| range.0 + (i as f64 * bin_width)).collect();
    edges[bins] = range.1;
    edges
}

/// Normalize a [`BinSpec`] into an ascending edge sequence of length one
/// greater than the number of bins. `values` is consulted only for
/// [`BinSpec::Count`], which derives its range from the data.
pub fn make_bins(spec: &BinSpec, values: &[f64]) -> TrackCutsResult<Vec<f64>> {
    match spec {
        BinSpec::Count(bins) => {
            if *bins == 0 {
                return invalid("bin count must be nonzero");
            }
            let Some(lo) = values.iter().copied().reduce(f64::min) else {
                return invalid("cannot derive a bin range from an empty value list");
            };
            let hi = values.iter().copied().fold(lo, f64::max);
            Ok(get_bin_edges(*bins, (lo, hi)))
        }
        BinSpec::Range(lo, hi, bins) => {
            if *bins == 0 {
                return invalid("bin count must be nonzero");
            }
            if !lo.is_finite() || !hi.is_finite() || hi <= lo {
                return invalid(format!("bin range ({lo}, {hi}) is not a finite interval"));
            }
            Ok(get_bin_edges(*bins, (*lo, *hi)))
        }
        BinSpec::Edges(edges) => {
            if edges.len() < 2 {
                return invalid("an edge list needs at least two edges");
            }
            if edges.windows(2).any(|pair| pair[1] <= pair[0]) {
                return invalid("bin edges must be strictly ascending");
            }
            Ok(edges.clone())
        }
    }
}

/// The index of the bin a value falls in, against ascending `edges`.
///
/// Every bin is half-open from above, `[lo, hi)`, except the final bin,
/// which is closed at both ends; values outside the overall range get
/// `None`.
fn bin_index_for(value: f64, edges: &[f64]) -> Option<usize> {
    let n_bins = edges.len() - 1;
    // positive form so NaN falls out of range instead of reaching the search
    if !(value >= edges[0] && value <= edges[n_bins]) {
        return None;
    }
    if value == edges[n_bins] {
        return Some(n_bins - 1);
    }
    // first edge strictly greater than value bounds the bin from above
    Some(edges.partition_point(|&edge| edge <= value) - 1)
}

/// Bin edges and the per-bin measure values computed over them;
/// `heights.len() == edges.len() - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedMeasure {
    /// Ascending bin edges.
    pub edges: Vec<f64>,
    /// One measure output per bin.
    pub heights: Vec<f64>,
}

/// Bin a track property dict by one of its properties and apply an
/// aggregate measure to each bin's restricted dict.
///
/// Tracks whose `bin_property` value falls outside the overall edge range
/// are dropped from every bin. The measure sees a dict with the full
/// property set but only the rows landing in its bin.
pub fn measure_by_bin<F>(
    dict: &TrackPropertyDict,
    bin_property: &str,
    measure: F,
    spec: &BinSpec,
) -> TrackCutsResult<BinnedMeasure>
where
    F: Fn(&TrackPropertyDict) -> f64,
{
    let values = dict.column(bin_property)?;
    let edges = make_bins(spec, values)?;
    let n_bins = edges.len() - 1;
    let mut binned_indices: Vec<Vec<usize>> = vec![Vec::new(); n_bins];
    for (index, &value) in values.iter().enumerate() {
        if let Some(bin_index) = bin_index_for(value, &edges) {
            binned_indices[bin_index].push(index);
        }
    }
    let heights = binned_indices
        .into_iter()
        .map(|indices| measure(&dict.take_rows(&indices)))
        .collect();
    Ok(BinnedMeasure { edges, heights })
}
