use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{TrackCutsError, TrackCutsResult};

/// A predicate over a single track property value.
///
/// Selectors are the unit out of which cuts are built: a [`SelectorDict`]
/// maps property names to selectors, and a track passes the dict only if
/// every named property's value is selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    /// Selects values exactly equal to the given value.
    Equal(f64),
    /// Selects values in the given range, inclusive at both ends.
    Range(f64, f64),
}

impl Selector {
    /// An equality selector: `x == value`.
    pub fn equal(value: f64) -> Self {
        Selector::Equal(value)
    }

    /// An inclusive range selector: `lo <= x <= hi`.
    pub fn range(lo: f64, hi: f64) -> Self {
        Selector::Range(lo, hi)
    }

    /// A one-sided range selector: `x >= lo`.
    pub fn at_least(lo: f64) -> Self {
        Selector::Range(lo, f64::INFINITY)
    }

    /// Build a selector from a slice of one (equality) or two (inclusive
    /// range) values, the way cuts are written as literal configuration.
    pub fn from_key(key: &[f64]) -> TrackCutsResult<Self> {
        match *key {
            [value] => Ok(Selector::Equal(value)),
            [lo, hi] => Ok(Selector::Range(lo, hi)),
            _ => Err(TrackCutsError::InvalidSelectorSpec { found: key.len() }),
        }
    }

    /// Whether the selector accepts the given value.
    pub fn selects(&self, value: f64) -> bool {
        match *self {
            Selector::Equal(target) => value == target,
            Selector::Range(lo, hi) => lo <= value && value <= hi,
        }
    }
}

/// A dictionary from track property names to [`Selector`]s.
///
/// A track is selected by the dict only if every entry's selector accepts
/// the corresponding property value; the empty dict selects every track.
pub type SelectorDict = IndexMap<String, Selector>;

/// A dictionary from track type names to [`SelectorDict`]s, the
/// configuration consumed by [`NtupleDict::cut`](crate::NtupleDict::cut).
pub type CutDicts = IndexMap<String, SelectorDict>;

/// Build a [`SelectorDict`] from `(property, selector)` pairs.
pub fn selector_dict<N, I>(entries: I) -> SelectorDict
where
    N: Into<String>,
    I: IntoIterator<Item = (N, Selector)>,
{
    entries
        .into_iter()
        .map(|(name, selector)| (name.into(), selector))
        .collect()
}

/// Build a [`CutDicts`] from `(track type, selector dict)` pairs.
pub fn cut_dicts<N, I>(entries: I) -> CutDicts
where
    N: Into<String>,
    I: IntoIterator<Item = (N, SelectorDict)>,
{
    entries
        .into_iter()
        .map(|(name, selectors)| (name.into(), selectors))
        .collect()
}

/// Return a copy of `selectors` restricted to properties for which
/// `is_known` holds, warning about every dropped entry. The caller's dict is
/// never modified; dropping unknown properties is the one lenient path in
/// the cut engine.
pub(crate) fn known_selectors<F>(selectors: &SelectorDict, is_known: F) -> SelectorDict
where
    F: Fn(&str) -> bool,
{
    let mut known = SelectorDict::with_capacity(selectors.len());
    for (property, selector) in selectors {
        if is_known(property) {
            known.insert(property.clone(), *selector);
        } else {
            warn!("property \"{property}\" not in track property dict; will not select on it");
        }
    }
    known
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_selector() {
        let selector = Selector::equal(1.0);
        assert!(selector.selects(1.0));
        assert!(!selector.selects(0.0));
        assert!(!selector.selects(1.0000001));
    }

    #[test]
    fn test_range_selector_inclusive_both_ends() {
        let selector = Selector::range(2.0, 100.0);
        assert!(selector.selects(2.0));
        assert!(selector.selects(100.0));
        assert!(selector.selects(50.0));
        assert!(!selector.selects(1.9999));
        assert!(!selector.selects(100.0001));
    }

    #[test]
    fn test_at_least_is_unbounded_above() {
        let selector = Selector::at_least(1.0);
        assert!(selector.selects(1.0));
        assert!(selector.selects(1e300));
        assert!(!selector.selects(0.0));
    }

    #[test]
    fn test_from_key() {
        assert_eq!(Selector::from_key(&[0.0]).unwrap(), Selector::Equal(0.0));
        assert_eq!(
            Selector::from_key(&[-2.4, 2.4]).unwrap(),
            Selector::Range(-2.4, 2.4)
        );
        assert_eq!(
            Selector::from_key(&[]).unwrap_err(),
            TrackCutsError::InvalidSelectorSpec { found: 0 }
        );
        assert_eq!(
            Selector::from_key(&[1.0, 2.0, 3.0]).unwrap_err(),
            TrackCutsError::InvalidSelectorSpec { found: 3 }
        );
    }

    #[test]
    fn test_known_selectors_drops_unknown() {
        let selectors = selector_dict([
            ("pt", Selector::range(2.0, 100.0)),
            ("bogus", Selector::equal(0.0)),
        ]);
        let known = known_selectors(&selectors, |name| name == "pt");
        assert_eq!(known.len(), 1);
        assert!(known.contains_key("pt"));
        // the caller's dict is untouched
        assert_eq!(selectors.len(), 2);
    }
}
