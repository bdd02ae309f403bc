use auto_ops::impl_op_ex;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{random_permutation, test_track_prop_dict, TrackPropertyDict};
use crate::selection::CutDicts;
use crate::{TrackCutsError, TrackCutsResult};

/// The paired track type collections: cutting a track from one member of a
/// pair must cut the same row from the other, because both describe the same
/// matched reconstructed-track/tracking-particle object from two roles.
///
/// This table is the single source of truth for the pairing; the cut and
/// shuffle algorithms consult it rather than hardcoding the four names.
pub const TRACK_TYPE_PAIRS: &[(&str, &str)] = &[("trk", "matchtp"), ("tp", "matchtrk")];

/// The track type paired with the given one, or `None` for track types
/// outside the pairing table (which are cut independently).
pub fn paired_track_type(track_type: &str) -> Option<&'static str> {
    TRACK_TYPE_PAIRS.iter().find_map(|&(a, b)| {
        if track_type == a {
            Some(b)
        } else if track_type == b {
            Some(a)
        } else {
            None
        }
    })
}

/// An ntuple dict that can be used to test cross-group cuts: `trk` and
/// `matchtp` are row-aligned, as are `tp` and `matchtrk`.
pub fn test_ntuple_dict() -> NtupleDict {
    let trk = test_track_prop_dict();
    let matchtp = TrackPropertyDict::from_columns(IndexMap::from([
        ("pt".to_string(), vec![1.1, 4.8, 9.2, 19.5]),
        ("nmatch".to_string(), vec![1.0, 1.0, 2.0, 1.0]),
    ]))
    .expect("test columns are rectangular");
    let tp = TrackPropertyDict::from_columns(IndexMap::from([
        ("pt".to_string(), vec![2.0, 40.0, 60.0]),
        ("eta".to_string(), vec![0.4, -0.8, 2.5]),
        ("nmatch".to_string(), vec![0.0, 1.0, 2.0]),
    ]))
    .expect("test columns are rectangular");
    let matchtrk = TrackPropertyDict::from_columns(IndexMap::from([
        ("pt".to_string(), vec![2.1, 39.0, 61.0]),
        ("chi2rphi".to_string(), vec![0.5, 3.0, 80.0]),
    ]))
    .expect("test columns are rectangular");
    NtupleDict::from_groups(IndexMap::from([
        ("trk".to_string(), trk),
        ("matchtp".to_string(), matchtp),
        ("tp".to_string(), tp),
        ("matchtrk".to_string(), matchtrk),
    ]))
}

/// Per-track-type limits for [`NtupleDict::reduce`]: one limit for every
/// group, or an explicit limit per track type (types absent from the map are
/// left untruncated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupLimits {
    /// The same track limit for every group.
    Uniform(usize),
    /// A limit per track type name.
    ByType(IndexMap<String, usize>),
}

impl From<usize> for GroupLimits {
    fn from(limit: usize) -> Self {
        GroupLimits::Uniform(limit)
    }
}

impl From<IndexMap<String, usize>> for GroupLimits {
    fn from(limits: IndexMap<String, usize>) -> Self {
        GroupLimits::ByType(limits)
    }
}

impl GroupLimits {
    fn for_type(&self, track_type: &str, n_tracks: usize) -> usize {
        match self {
            GroupLimits::Uniform(limit) => *limit,
            GroupLimits::ByType(limits) => limits.get(track_type).copied().unwrap_or(n_tracks),
        }
    }
}

/// A collection of [`TrackPropertyDict`]s keyed by track type.
///
/// The canonical track types are `trk` (reconstructed track), `tp`
/// (tracking particle), and the two matched views `matchtrk` and `matchtp`;
/// see [`TRACK_TYPE_PAIRS`] for the index correspondence [`cut`](Self::cut)
/// preserves between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NtupleDict {
    groups: IndexMap<String, TrackPropertyDict>,
}

impl NtupleDict {
    /// Create an empty ntuple dict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an ntuple dict from track property dicts keyed by track type.
    pub fn from_groups(groups: IndexMap<String, TrackPropertyDict>) -> Self {
        Self { groups }
    }

    /// Track type names in insertion order.
    pub fn track_types(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// The track property dict for the named track type, if present.
    pub fn get(&self, track_type: &str) -> Option<&TrackPropertyDict> {
        self.groups.get(track_type)
    }

    /// The track property dict for the named track type, failing if absent.
    pub fn group(&self, track_type: &str) -> TrackCutsResult<&TrackPropertyDict> {
        self.get(track_type)
            .ok_or_else(|| TrackCutsError::MissingProperty {
                category: "track type",
                name: track_type.to_string(),
            })
    }

    /// Return a new ntuple dict with the given group added or replaced.
    pub fn with_group<N: Into<String>>(&self, track_type: N, dict: TrackPropertyDict) -> Self {
        let mut groups = self.groups.clone();
        groups.insert(track_type.into(), dict);
        Self { groups }
    }

    /// The number of tracks of each track type.
    pub fn row_counts(&self) -> IndexMap<String, usize> {
        self.groups
            .iter()
            .map(|(track_type, dict)| (track_type.clone(), dict.n_tracks()))
            .collect()
    }

    /// Cut every track type by its selector dict, keeping paired track
    /// collections index-consistent.
    ///
    /// For each track type named in `cuts`, the indices failing selection
    /// are computed against that group's dict. The indices to remove from a
    /// group are then the sorted, duplicate-free union of its own failing
    /// indices and those of its paired track type, so a cut on `trk`
    /// properties also discards the corresponding `matchtp` rows (and
    /// `tp`/`matchtrk` likewise). Track types outside the pairing table are
    /// cut by their own indices alone.
    pub fn cut(&self, cuts: &CutDicts) -> TrackCutsResult<Self> {
        let mut indices_by_type: IndexMap<&str, Vec<usize>> = IndexMap::new();
        for (track_type, selectors) in cuts {
            if let Some(dict) = self.groups.get(track_type) {
                indices_by_type.insert(track_type, dict.select_indices(selectors, true));
            } else {
                log::warn!("track type \"{track_type}\" not in ntuple dict; will not cut it");
            }
        }
        let mut groups = IndexMap::with_capacity(self.groups.len());
        for (track_type, dict) in &self.groups {
            let mut to_cut = indices_by_type
                .get(track_type.as_str())
                .cloned()
                .unwrap_or_default();
            if let Some(paired) = paired_track_type(track_type) {
                if let Some(paired_indices) = indices_by_type.get(paired) {
                    to_cut.extend_from_slice(paired_indices);
                }
            }
            to_cut.sort_unstable();
            to_cut.dedup();
            groups.insert(track_type.clone(), dict.cut_by_indices(&to_cut)?);
        }
        Ok(Self { groups })
    }

    /// Concatenate several ntuple dicts group-by-group, in input order. All
    /// dicts must carry identical track type sets (and, within each type,
    /// identical property sets). This is how independent event sources are
    /// combined into one analysis set.
    pub fn concat(dicts: &[NtupleDict]) -> TrackCutsResult<Self> {
        let Some(first) = dicts.first() else {
            return Ok(Self::new());
        };
        let expected: Vec<&str> = first.track_types().collect();
        for dict in &dicts[1..] {
            let found: Vec<&str> = dict.track_types().collect();
            if found != expected {
                return Err(TrackCutsError::SchemaMismatch {
                    category: "track type",
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                    found: found.iter().map(|s| s.to_string()).collect(),
                });
            }
        }
        let mut groups = IndexMap::with_capacity(expected.len());
        for track_type in expected {
            let per_type: Vec<TrackPropertyDict> = dicts
                .iter()
                .map(|dict| dict.groups[track_type].clone())
                .collect();
            groups.insert(track_type.to_string(), TrackPropertyDict::concat(&per_type)?);
        }
        Ok(Self { groups })
    }

    /// Shuffle every group, preserving the pairing invariant: paired track
    /// types of equal length reuse the identical permutation so their row
    /// correspondence survives. Unequal-length pairs fall back to
    /// independent permutations (the correspondence cannot be preserved
    /// positionally in that case).
    pub fn shuffle(&self, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let mut permutations: IndexMap<&str, Vec<usize>> = IndexMap::new();
        for (track_type, dict) in &self.groups {
            let shared = paired_track_type(track_type).and_then(|paired| {
                let permutation = permutations.get(paired)?;
                if permutation.len() == dict.n_tracks() {
                    Some(permutation.clone())
                } else {
                    debug!(
                        "paired track types \"{track_type}\" and \"{paired}\" have unequal \
                         lengths; shuffling them independently"
                    );
                    None
                }
            });
            let permutation =
                shared.unwrap_or_else(|| random_permutation(dict.n_tracks(), Some(rng.u64(..))));
            permutations.insert(track_type, permutation);
        }
        let groups = self
            .groups
            .iter()
            .map(|(track_type, dict)| {
                (
                    track_type.clone(),
                    dict.take_rows(&permutations[track_type.as_str()]),
                )
            })
            .collect();
        Self { groups }
    }

    /// Reduce every group to at most its track limit, optionally shuffling
    /// first with a seed shared across groups (so equal-length groups are
    /// permuted identically and pairing survives).
    pub fn reduce<L: Into<GroupLimits>>(
        &self,
        limits: L,
        shuffle_first: bool,
        seed: Option<u64>,
    ) -> Self {
        let limits = limits.into();
        let source = if shuffle_first {
            self.shuffle(seed)
        } else {
            self.clone()
        };
        let groups = source
            .groups
            .into_iter()
            .map(|(track_type, dict)| {
                let limit = limits.for_type(&track_type, dict.n_tracks());
                (track_type, dict.reduce(limit, false, None))
            })
            .collect();
        Self { groups }
    }
}

impl_op_ex!(+ |a: &NtupleDict, b: &NtupleDict| -> NtupleDict {
    debug_assert!(
        a.track_types().eq(b.track_types()),
        "added ntuple dicts must share a track type set"
    );
    NtupleDict::concat(&[a.clone(), b.clone()])
        .expect("added ntuple dicts must share a track type set")
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{cut_dicts, selector_dict, Selector, SelectorDict};

    #[test]
    fn test_pairing_table() {
        assert_eq!(paired_track_type("trk"), Some("matchtp"));
        assert_eq!(paired_track_type("matchtp"), Some("trk"));
        assert_eq!(paired_track_type("tp"), Some("matchtrk"));
        assert_eq!(paired_track_type("matchtrk"), Some("tp"));
        assert_eq!(paired_track_type("l1trk"), None);
    }

    #[test]
    fn test_empty_cut_is_noop() {
        let ntuple = test_ntuple_dict();
        let cut = ntuple.cut(&CutDicts::new()).unwrap();
        assert_eq!(cut, ntuple);
    }

    #[test]
    fn test_cut_on_trk_also_cuts_matchtp() {
        let ntuple = test_ntuple_dict();
        // trk row 0 fails genuine == 1
        let cuts = cut_dicts([("trk", selector_dict([("genuine", Selector::equal(1.0))]))]);
        let cut = ntuple.cut(&cuts).unwrap();
        assert_eq!(cut.get("trk").unwrap().n_tracks(), 3);
        assert_eq!(cut.get("matchtp").unwrap().n_tracks(), 3);
        assert_eq!(cut.get("matchtp").unwrap().get("pt").unwrap(), &[4.8, 9.2, 19.5]);
        // the tp/matchtrk pair is untouched
        assert_eq!(cut.get("tp").unwrap().n_tracks(), 3);
        assert_eq!(cut.get("matchtrk").unwrap().n_tracks(), 3);
    }

    #[test]
    fn test_cut_unions_paired_indices() {
        let ntuple = test_ntuple_dict();
        // tp row 2 fails eta, matchtrk rows 2 fails chi2rphi, matchtrk row 0 fails pt
        let cuts = cut_dicts([
            ("tp", selector_dict([("eta", Selector::range(-2.4, 2.4))])),
            (
                "matchtrk",
                selector_dict([
                    ("chi2rphi", Selector::range(0.0, 50.0)),
                    ("pt", Selector::range(10.0, 1000.0)),
                ]),
            ),
        ]);
        let cut = ntuple.cut(&cuts).unwrap();
        // union {2} | {0, 2} = {0, 2}; only row 1 survives in both groups
        assert_eq!(cut.get("tp").unwrap().get("pt").unwrap(), &[40.0]);
        assert_eq!(cut.get("matchtrk").unwrap().get("pt").unwrap(), &[39.0]);
    }

    #[test]
    fn test_cut_is_idempotent() {
        let ntuple = test_ntuple_dict();
        let cuts = cut_dicts([
            ("trk", selector_dict([("pt", Selector::range(2.0, 100.0))])),
            ("tp", selector_dict([("nmatch", Selector::at_least(1.0))])),
        ]);
        let once = ntuple.cut(&cuts).unwrap();
        let twice = once.cut(&cuts).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pairing_invariant_row_count() {
        let ntuple = test_ntuple_dict();
        let cuts = cut_dicts([("trk", selector_dict([("pt", Selector::range(2.0, 10.0))]))]);
        let n_failing = ntuple
            .get("trk")
            .unwrap()
            .select_indices(&selector_dict([("pt", Selector::range(2.0, 10.0))]), true)
            .len();
        let cut = ntuple.cut(&cuts).unwrap();
        let before = ntuple.get("matchtp").unwrap().n_tracks();
        let after = cut.get("matchtp").unwrap().n_tracks();
        assert_eq!(before - after, n_failing);
    }

    #[test]
    fn test_unknown_track_type_in_cuts_is_dropped() {
        let ntuple = test_ntuple_dict();
        let cuts = cut_dicts([("l1trk", SelectorDict::new())]);
        assert_eq!(ntuple.cut(&cuts).unwrap(), ntuple);
    }

    #[test]
    fn test_concat_and_row_counts() {
        let ntuple = test_ntuple_dict();
        let doubled = NtupleDict::concat(&[ntuple.clone(), ntuple.clone()]).unwrap();
        for (track_type, count) in ntuple.row_counts() {
            assert_eq!(doubled.row_counts()[&track_type], 2 * count);
        }
        let summed = &ntuple + &ntuple;
        assert_eq!(summed, doubled);
    }

    #[test]
    fn test_concat_track_type_mismatch() {
        let ntuple = test_ntuple_dict();
        let partial = NtupleDict::from_groups(IndexMap::from([(
            "trk".to_string(),
            test_track_prop_dict(),
        )]));
        assert!(matches!(
            NtupleDict::concat(&[ntuple, partial]),
            Err(TrackCutsError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_shuffle_preserves_pairing() {
        let ntuple = test_ntuple_dict();
        let shuffled = ntuple.shuffle(Some(23));
        // trk and matchtp have equal length, so they share a permutation:
        // recover it from trk's pt column and check matchtp moved the same way
        let trk_pt = ntuple.get("trk").unwrap().get("pt").unwrap().to_vec();
        let shuffled_trk_pt = shuffled.get("trk").unwrap().get("pt").unwrap();
        let permutation: Vec<usize> = shuffled_trk_pt
            .iter()
            .map(|value| trk_pt.iter().position(|x| x == value).unwrap())
            .collect();
        let matchtp_pt = ntuple.get("matchtp").unwrap().get("pt").unwrap();
        let shuffled_matchtp_pt = shuffled.get("matchtp").unwrap().get("pt").unwrap();
        for (i, &source) in permutation.iter().enumerate() {
            assert_eq!(shuffled_matchtp_pt[i], matchtp_pt[source]);
        }
    }

    #[test]
    fn test_shuffle_unequal_pair_lengths() {
        // a post-cut dict can leave trk and matchtp at different lengths;
        // shuffling then permutes them independently but leaves each group
        // internally row-aligned and its track count unchanged
        let trk = test_track_prop_dict();
        let matchtp = TrackPropertyDict::from_columns(IndexMap::from([
            ("pt".to_string(), vec![1.1, 4.8, 9.2]),
            ("nmatch".to_string(), vec![10.0, 40.0, 90.0]),
        ]))
        .unwrap();
        let ntuple = NtupleDict::from_groups(IndexMap::from([
            ("trk".to_string(), trk),
            ("matchtp".to_string(), matchtp),
        ]));
        let shuffled = ntuple.shuffle(Some(23));
        assert_eq!(shuffled.row_counts(), ntuple.row_counts());
        // rows travel together within the shorter group
        let source_pt = ntuple.get("matchtp").unwrap().get("pt").unwrap();
        let source_nmatch = ntuple.get("matchtp").unwrap().get("nmatch").unwrap();
        let pt = shuffled.get("matchtp").unwrap().get("pt").unwrap();
        let nmatch = shuffled.get("matchtp").unwrap().get("nmatch").unwrap();
        for i in 0..3 {
            let source = source_pt.iter().position(|&x| x == pt[i]).unwrap();
            assert_eq!(nmatch[i], source_nmatch[source]);
        }
        let mut sorted = pt.to_vec();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(sorted, vec![1.1, 4.8, 9.2]);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let ntuple = test_ntuple_dict();
        assert_eq!(ntuple.shuffle(Some(7)), ntuple.shuffle(Some(7)));
    }

    #[test]
    fn test_reduce_uniform_and_by_type() {
        let ntuple = test_ntuple_dict();
        let reduced = ntuple.reduce(2, false, None);
        for (_, count) in reduced.row_counts() {
            assert_eq!(count, 2);
        }
        let limits = IndexMap::from([("trk".to_string(), 1_usize)]);
        let partial = ntuple.reduce(limits, false, None);
        assert_eq!(partial.get("trk").unwrap().n_tracks(), 1);
        // untargeted groups keep every track
        assert_eq!(partial.get("tp").unwrap().n_tracks(), 3);
    }
}
