use indexmap::IndexMap;

use crate::data::TrackPropertyDict;
use crate::ntuple::NtupleDict;
use crate::{TrackCutsError, TrackCutsResult};

/// The properties to read per track type, e.g.
/// `{"trk": ["pt", "eta", "genuine"], "tp": ["pt", "nmatch"]}`.
pub type PropertiesByType = IndexMap<String, Vec<String>>;

/// A source of flattened ntuple columns.
///
/// Implementors hand back one scalar per track for a `(track type,
/// property)` pair, with any per-event grouping already discarded. The cut
/// engine does not care about the underlying storage; file-backed readers
/// live outside this crate and plug in here.
pub trait TrackSource {
    /// The flattened value list for one track type and property.
    fn column(&self, track_type: &str, property: &str) -> TrackCutsResult<Vec<f64>>;
}

/// An in-memory [`TrackSource`] keyed by branch name in the conventional
/// `<track type>_<property>` form (`trk_pt`, `tp_nmatch`, ...).
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    branches: IndexMap<String, Vec<f64>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from branch-name-to-values columns.
    pub fn from_branches(branches: IndexMap<String, Vec<f64>>) -> Self {
        Self { branches }
    }

    /// Add a branch, builder style.
    pub fn with_branch<N: Into<String>>(mut self, name: N, values: Vec<f64>) -> Self {
        self.branches.insert(name.into(), values);
        self
    }
}

impl TrackSource for MemorySource {
    fn column(&self, track_type: &str, property: &str) -> TrackCutsResult<Vec<f64>> {
        let branch = format!("{track_type}_{property}");
        self.branches
            .get(&branch)
            .cloned()
            .ok_or(TrackCutsError::MissingProperty {
                category: "branch",
                name: branch,
            })
    }
}

impl NtupleDict {
    /// Build an ntuple dict by reading the requested properties for each
    /// track type from one source. Rectangularity of each group is
    /// validated on construction.
    pub fn from_source<S: TrackSource + ?Sized>(
        source: &S,
        properties: &PropertiesByType,
    ) -> TrackCutsResult<Self> {
        let mut groups = IndexMap::with_capacity(properties.len());
        for (track_type, names) in properties {
            let mut columns = IndexMap::with_capacity(names.len());
            for name in names {
                columns.insert(name.clone(), source.column(track_type, name)?);
            }
            groups.insert(track_type.clone(), TrackPropertyDict::from_columns(columns)?);
        }
        Ok(NtupleDict::from_groups(groups))
    }

    /// Build one ntuple dict from several sources by reading each and
    /// concatenating the results in input order.
    pub fn from_sources(
        sources: &[&dyn TrackSource],
        properties: &PropertiesByType,
    ) -> TrackCutsResult<Self> {
        let dicts = sources
            .iter()
            .map(|source| NtupleDict::from_source(*source, properties))
            .collect::<TrackCutsResult<Vec<_>>>()?;
        NtupleDict::concat(&dicts)
    }
}
