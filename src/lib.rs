//! # trackcuts
//!
//! Selection cuts and efficiency analysis for track-finding ntuple data.
//!
//! Event data is held in a [`TrackPropertyDict`], an ordered mapping from a
//! track property name (`"pt"`, `"eta"`, `"nmatch"`, ...) to a flat list of
//! per-track values. Several of these, keyed by track type (`"trk"`, `"tp"`,
//! `"matchtrk"`, `"matchtp"`), form an [`NtupleDict`]. Cuts are expressed as
//! [`Selector`]s (equality or inclusive range) gathered into selector
//! dictionaries, and [`NtupleDict::cut`] keeps the paired track collections
//! (`trk`/`matchtp` and `tp`/`matchtrk`) index-consistent while filtering.
//!
//! On top of the cut engine sit binning ([`measure_by_bin`]), efficiency and
//! fake-rate metrics, a narrow [`TrackSource`] ingestion boundary, and the
//! [`Predictor`] seam for handing rectangular data to classifiers.
#![warn(clippy::perf, clippy::style)]

use thiserror::Error;

/// Binning of track property dicts and per-bin aggregate measures.
pub mod binning;
/// The [`TrackPropertyDict`] engine: validation, cuts, concatenation, shuffling.
pub mod data;
/// Efficiency, fake-rate, and proportion-selected metrics.
pub mod metrics;
/// Conversions to rectangular classifier datasets and the [`Predictor`] seam.
pub mod ml;
/// The [`NtupleDict`] engine: symmetric cross-group cuts and multi-group operations.
pub mod ntuple;
/// [`Selector`]s and selector dictionaries.
pub mod selection;
/// The [`TrackSource`] boundary for reading flattened ntuple columns.
pub mod source;
/// Decoding of eta/hit-pattern pairs into per-layer stub information.
pub mod stubs;

pub use crate::binning::{make_bins, measure_by_bin, BinSpec, BinnedMeasure};
pub use crate::data::{test_track_prop_dict, TrackPropertyDict};
pub use crate::metrics::{efficiency, efficiency_from_ntuple, fake_rate, proportion_selected};
pub use crate::ml::{
    apply_threshold, false_positive_rate, prediction_proportion, true_positive_rate, CutPredictor,
    Predictor, TrackPropertiesDataset,
};
pub use crate::ntuple::{
    paired_track_type, test_ntuple_dict, GroupLimits, NtupleDict, TRACK_TYPE_PAIRS,
};
pub use crate::selection::{cut_dicts, selector_dict, CutDicts, Selector, SelectorDict};
pub use crate::source::{MemorySource, PropertiesByType, TrackSource};
pub use crate::stubs::{stub_info_list, ModuleType, StubInfo};

pub type TrackCutsResult<T> = Result<T, TrackCutsError>;

/// The error type used by all `trackcuts` methods.
///
/// Every variant is a deterministic validation failure of malformed input;
/// none are transient, so no operation in this crate retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackCutsError {
    /// A track property dict's value lists are not all the same length.
    #[error("invalid track property dict: value lists have differing lengths {lengths:?}")]
    InconsistentLengths {
        /// The distinct lengths observed, in first-seen order.
        lengths: Vec<usize>,
    },
    /// Concatenation was attempted over dicts with differing key sets.
    #[error("schema mismatch: expected {category} keys {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// Which level of dict disagreed ("property" or "track type").
        category: &'static str,
        /// Key set of the first dict.
        expected: Vec<String>,
        /// Key set of the offending dict.
        found: Vec<String>,
    },
    /// A supplied permutation, label list, or score list has the wrong length.
    #[error("length mismatch: expected {expected} values, found {found}")]
    LengthMismatch {
        /// The required length.
        expected: usize,
        /// The length actually supplied.
        found: usize,
    },
    /// A cut or permutation index falls outside the dict's row range.
    #[error("index {index} out of range for {len} tracks")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of tracks in the dict.
        len: usize,
    },
    /// A selector was constructed from something other than one value
    /// (equality) or two values (inclusive range).
    #[error("invalid selector key of {found} values: expected one (equality) or two (range)")]
    InvalidSelectorSpec {
        /// How many values were supplied.
        found: usize,
    },
    /// A bin specifier could not be normalized into ascending bin edges.
    #[error("invalid bin specifier: {reason}")]
    InvalidBinSpec {
        /// Why normalization failed.
        reason: String,
    },
    /// A required property, track type, or source branch is absent.
    #[error("no {category} named \"{name}\"")]
    MissingProperty {
        /// The kind of key that failed lookup ("property", "track type", "branch").
        category: &'static str,
        /// The missing name.
        name: String,
    },
}
