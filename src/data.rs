use auto_ops::impl_op_ex;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::selection::{known_selectors, SelectorDict};
use crate::{TrackCutsError, TrackCutsResult};

/// A small track property dict that can be used to test cut and binning
/// operations. Row `i` across all properties describes the same track.
pub fn test_track_prop_dict() -> TrackPropertyDict {
    TrackPropertyDict::from_columns(IndexMap::from([
        ("pt".to_string(), vec![1.0, 5.0, 9.0, 20.0]),
        ("eta".to_string(), vec![0.0, 2.2, -1.1, 2.6]),
        ("genuine".to_string(), vec![0.0, 1.0, 1.0, 1.0]),
    ]))
    .expect("test columns are rectangular")
}

/// A flattened, per-track view of ntuple data: an ordered mapping from a
/// track property name to one value per track.
///
/// All value lists in one dict have the same length (the track count); this
/// is validated at construction, so every later operation can rely on it.
/// Operations return new dicts and leave their input unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPropertyDict {
    columns: IndexMap<String, Vec<f64>>,
}

impl TrackPropertyDict {
    /// Create an empty dict with no properties and no tracks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dict from property columns, validating that all value lists
    /// share one length.
    pub fn from_columns(columns: IndexMap<String, Vec<f64>>) -> TrackCutsResult<Self> {
        let mut lengths: Vec<usize> = Vec::new();
        for values in columns.values() {
            if !lengths.contains(&values.len()) {
                lengths.push(values.len());
            }
        }
        if lengths.len() > 1 {
            return Err(TrackCutsError::InconsistentLengths { lengths });
        }
        Ok(Self { columns })
    }

    /// The number of tracks described by this dict.
    pub fn n_tracks(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }

    /// The number of track properties in this dict.
    pub fn n_properties(&self) -> usize {
        self.columns.len()
    }

    /// Property names in insertion order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Whether the dict carries the named property.
    pub fn contains_property(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// The value list for the named property, if present.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// The value list for the named property, failing if absent.
    pub fn column(&self, name: &str) -> TrackCutsResult<&[f64]> {
        self.get(name).ok_or_else(|| TrackCutsError::MissingProperty {
            category: "property",
            name: name.to_string(),
        })
    }

    /// Return a new dict with an extra property column, e.g. model scores
    /// merged back under a `pred_<label>` key. Fails with
    /// [`LengthMismatch`](TrackCutsError::LengthMismatch) unless the new
    /// column has one value per existing track.
    pub fn with_column<N: Into<String>>(
        &self,
        name: N,
        values: Vec<f64>,
    ) -> TrackCutsResult<Self> {
        if !self.columns.is_empty() && values.len() != self.n_tracks() {
            return Err(TrackCutsError::LengthMismatch {
                expected: self.n_tracks(),
                found: values.len(),
            });
        }
        let mut columns = self.columns.clone();
        columns.insert(name.into(), values);
        Ok(Self { columns })
    }

    /// Indices of tracks failing (`invert = true`, the cut convention) or
    /// passing (`invert = false`) the conjunction of all selectors, in
    /// ascending order.
    ///
    /// Selector entries naming properties this dict does not carry are
    /// dropped from a local copy with a warning; an empty (or fully dropped)
    /// selector dict selects every track, so `invert = true` returns no
    /// indices.
    pub fn select_indices(&self, selectors: &SelectorDict, invert: bool) -> Vec<usize> {
        let selectors = known_selectors(selectors, |name| self.contains_property(name));
        let selected = |index: usize| {
            selectors
                .iter()
                .all(|(property, selector)| selector.selects(self.columns[property][index]))
        };
        (0..self.n_tracks())
            .filter(|&index| invert != selected(index))
            .collect()
    }

    /// Remove the given track indices from every value list.
    ///
    /// Duplicate and unsorted indices are tolerated; deletion happens in
    /// descending index order so earlier removals never shift the rows later
    /// removals refer to. Any index outside `[0, n_tracks())` is fatal.
    pub fn cut_by_indices(&self, indices: &[usize]) -> TrackCutsResult<Self> {
        let n_tracks = self.n_tracks();
        let mut to_cut = indices.to_vec();
        to_cut.sort_unstable();
        to_cut.dedup();
        if let Some(&index) = to_cut.last() {
            if index >= n_tracks {
                return Err(TrackCutsError::IndexOutOfRange {
                    index,
                    len: n_tracks,
                });
            }
        }
        let columns = self
            .columns
            .iter()
            .map(|(property, values)| {
                let mut values = values.clone();
                for &index in to_cut.iter().rev() {
                    values.remove(index);
                }
                (property.clone(), values)
            })
            .collect();
        Ok(Self { columns })
    }

    /// Cut this dict by a selector dict, removing every track that fails
    /// the conjunction of selectors.
    pub fn cut(&self, selectors: &SelectorDict) -> Self {
        self.take_rows(&self.select_indices(selectors, false))
    }

    /// Concatenate several dicts property-by-property, in input order. All
    /// dicts must carry identical property sets.
    pub fn concat(dicts: &[TrackPropertyDict]) -> TrackCutsResult<Self> {
        let Some((first, rest)) = dicts.split_first() else {
            return Ok(Self::new());
        };
        let expected: Vec<&str> = first.property_names().collect();
        let mut columns: IndexMap<String, Vec<f64>> = first.columns.clone();
        for dict in rest {
            let found: Vec<&str> = dict.property_names().collect();
            if found != expected {
                return Err(TrackCutsError::SchemaMismatch {
                    category: "property",
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                    found: found.iter().map(|s| s.to_string()).collect(),
                });
            }
            for (property, values) in &mut columns {
                values.extend_from_slice(&dict.columns[property]);
            }
        }
        Ok(Self { columns })
    }

    /// Apply one permutation of track indices to every value list, so row
    /// alignment across properties survives. The permutation must have
    /// exactly one entry per track.
    pub fn permuted(&self, permutation: &[usize]) -> TrackCutsResult<Self> {
        let n_tracks = self.n_tracks();
        if permutation.len() != n_tracks {
            return Err(TrackCutsError::LengthMismatch {
                expected: n_tracks,
                found: permutation.len(),
            });
        }
        if let Some(&index) = permutation.iter().find(|&&index| index >= n_tracks) {
            return Err(TrackCutsError::IndexOutOfRange {
                index,
                len: n_tracks,
            });
        }
        Ok(self.take_rows(permutation))
    }

    /// Shuffle the tracks with a uniformly random permutation, optionally
    /// seeded for reproducibility.
    pub fn shuffled(&self, seed: Option<u64>) -> Self {
        self.take_rows(&random_permutation(self.n_tracks(), seed))
    }

    /// Truncate every value list to at most `limit` tracks, optionally
    /// shuffling first. A dict with fewer tracks than `limit` passes
    /// through unchanged.
    pub fn reduce(&self, limit: usize, shuffle_first: bool, seed: Option<u64>) -> Self {
        let source = if shuffle_first {
            self.shuffled(seed)
        } else {
            self.clone()
        };
        let limit = limit.min(source.n_tracks());
        let columns = source
            .columns
            .into_iter()
            .map(|(property, mut values)| {
                values.truncate(limit);
                (property, values)
            })
            .collect();
        Self { columns }
    }

    /// Gather the rows at `indices` (assumed in range) into a new dict.
    pub(crate) fn take_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(property, values)| {
                (
                    property.clone(),
                    indices.iter().map(|&index| values[index]).collect(),
                )
            })
            .collect();
        Self { columns }
    }
}

/// Draw a uniformly random permutation of `0..n`, Fisher-Yates style, from a
/// seeded or entropy-initialized rng.
pub(crate) fn random_permutation(n: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    let mut permutation: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        permutation.swap(i, rng.usize(..=i));
    }
    permutation
}

impl_op_ex!(+ |a: &TrackPropertyDict, b: &TrackPropertyDict| -> TrackPropertyDict {
    debug_assert!(
        a.property_names().eq(b.property_names()),
        "added track property dicts must share a property set"
    );
    TrackPropertyDict::concat(&[a.clone(), b.clone()])
        .expect("added track property dicts must share a property set")
});
