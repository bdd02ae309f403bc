use log::warn;

use crate::data::TrackPropertyDict;
use crate::ntuple::NtupleDict;
use crate::selection::{Selector, SelectorDict};
use crate::TrackCutsResult;

/// The proportion (or, with `normalize = false`, the raw count) of values
/// the selector accepts. An empty value list yields `0.0` rather than an
/// error, so this never divides by zero.
pub fn proportion_selected(values: &[f64], selector: &Selector, normalize: bool) -> f64 {
    if values.is_empty() {
        warn!("cannot take a proportion of a zero-length value list; returning zero");
        return 0.0;
    }
    let selected = values.iter().filter(|&&value| selector.selects(value)).count() as f64;
    if normalize {
        selected / values.len() as f64
    } else {
        selected
    }
}

/// Tracking efficiency of a tracking-particle dict: the proportion of
/// tracking particles matched by at least one reconstructed track
/// (`nmatch >= 1`), after restricting the dict by `tp_selectors`.
pub fn efficiency(tp_dict: &TrackPropertyDict, tp_selectors: &SelectorDict) -> TrackCutsResult<f64> {
    let cut = tp_dict.cut(tp_selectors);
    let nmatch = cut.column("nmatch")?;
    Ok(proportion_selected(nmatch, &Selector::at_least(1.0), true))
}

/// Tracking efficiency of a full ntuple dict, computed from its `tp` group.
pub fn efficiency_from_ntuple(
    ntuple: &NtupleDict,
    tp_selectors: &SelectorDict,
) -> TrackCutsResult<f64> {
    efficiency(ntuple.group("tp")?, tp_selectors)
}

/// Fake rate of a reconstructed-track dict: the proportion of tracks not
/// corresponding to any genuine particle (`genuine == 0`), after
/// restricting the dict by `trk_selectors`.
pub fn fake_rate(
    trk_dict: &TrackPropertyDict,
    trk_selectors: &SelectorDict,
) -> TrackCutsResult<f64> {
    let cut = trk_dict.cut(trk_selectors);
    let genuine = cut.column("genuine")?;
    Ok(proportion_selected(genuine, &Selector::equal(0.0), true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_track_prop_dict;
    use crate::ntuple::test_ntuple_dict;
    use crate::selection::selector_dict;
    use crate::TrackCutsError;
    use approx::assert_relative_eq;
    use indexmap::IndexMap;

    #[test]
    fn test_proportion_selected_bounds() {
        let values = [0.0, 1.0, 2.0, 3.0];
        let selector = Selector::at_least(1.0);
        let proportion = proportion_selected(&values, &selector, true);
        assert!((0.0..=1.0).contains(&proportion));
        assert_relative_eq!(proportion, 0.75);
        assert_relative_eq!(proportion_selected(&values, &selector, false), 3.0);
    }

    #[test]
    fn test_proportion_selected_empty_is_zero() {
        assert_relative_eq!(
            proportion_selected(&[], &Selector::equal(1.0), true),
            0.0
        );
    }

    #[test]
    fn test_efficiency() {
        // 2 of 4 tracking particles have nmatch > 0
        let tp = TrackPropertyDict::from_columns(IndexMap::from([(
            "nmatch".to_string(),
            vec![0.0, 0.0, 2.0, 3.0],
        )]))
        .unwrap();
        assert_relative_eq!(efficiency(&tp, &SelectorDict::new()).unwrap(), 0.5);
    }

    #[test]
    fn test_efficiency_with_tp_restriction() {
        let tp = TrackPropertyDict::from_columns(IndexMap::from([
            ("nmatch".to_string(), vec![0.0, 1.0, 1.0, 0.0]),
            ("pt".to_string(), vec![1.0, 5.0, 50.0, 60.0]),
        ]))
        .unwrap();
        let selectors = selector_dict([("pt", Selector::range(2.0, 100.0))]);
        assert_relative_eq!(efficiency(&tp, &selectors).unwrap(), 2.0 / 3.0);
    }

    #[test]
    fn test_efficiency_requires_nmatch() {
        let dict = test_track_prop_dict();
        assert!(matches!(
            efficiency(&dict, &SelectorDict::new()),
            Err(TrackCutsError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_efficiency_from_ntuple() {
        let ntuple = test_ntuple_dict();
        // tp nmatch is [0, 1, 2]
        assert_relative_eq!(
            efficiency_from_ntuple(&ntuple, &SelectorDict::new()).unwrap(),
            2.0 / 3.0
        );
    }

    #[test]
    fn test_fake_rate() {
        let trk = test_track_prop_dict();
        // genuine is [0, 1, 1, 1]
        assert_relative_eq!(fake_rate(&trk, &SelectorDict::new()).unwrap(), 0.25);
    }
}
