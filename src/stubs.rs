use serde::{Deserialize, Serialize};

use crate::data::TrackPropertyDict;
use crate::TrackCutsResult;

/// Layer/disk slot count: indices 0-5 are barrel layers 1-6, indices 6-10
/// are endcap disks 1-5.
const N_SLOTS: usize = 11;

/// Module type per slot. The three innermost barrel layers and two
/// innermost disks carry PS modules, the rest 2S.
const PS_MODULE: [bool; N_SLOTS] = [
    true, true, true, false, false, false, // layers
    true, true, false, false, false, // disks
];

/// Absolute-eta region boundaries; each consecutive pair selects one entry
/// of [`LAYER_MAPS`]. Outside the last boundary no hits are expected.
const ETA_REGIONS: [f64; 9] = [0.0, 0.2, 0.41, 0.62, 0.9, 1.26, 1.68, 2.08, 2.4];

/// One-based layer/disk numbers the Kalman filter expects a track crossing
/// each eta region to hit.
const LAYER_MAPS: [&[usize]; 8] = [
    &[1, 2, 3, 4, 5, 6],
    &[1, 2, 3, 4, 5, 6],
    &[1, 2, 3, 4, 5, 6],
    &[1, 2, 3, 4, 5, 6],
    &[1, 2, 3, 4, 7, 8, 9],
    &[1, 2, 3, 7, 8, 9, 10],
    &[1, 2, 8, 9, 10, 11],
    &[1, 7, 8, 9, 10, 11],
];

/// Outer-tracker module flavor: pixel-strip or strip-strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleType {
    /// Pixel-strip module.
    Ps,
    /// Strip-strip module.
    TwoS,
}

/// Per-layer stub expectations and hits decoded from a track's eta and
/// hit-pattern word.
///
/// The definitions follow the Kalman filter that produced the hit pattern:
/// a bit in the pattern counts only toward a layer or disk the filter
/// expected to be hit, so a hit on an unexpected slot cannot occur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubInfo {
    expected: [bool; N_SLOTS],
    hit: [bool; N_SLOTS],
}

impl StubInfo {
    /// Decode one track's eta and hit-pattern word.
    ///
    /// The eta region of `|eta|` determines which layers and disks expect
    /// a hit; tracks beyond the tracker acceptance (`|eta| > 2.4`) expect
    /// none. Bits of `hitpattern`, least significant first, then record a
    /// hit or miss for each expected slot in order.
    pub fn new(eta: f64, hitpattern: u32) -> Self {
        let expected = expected_slots(eta.abs());
        let mut hit = [false; N_SLOTS];
        let mut bit = 0;
        for (slot, &slot_expected) in expected.iter().enumerate() {
            if slot_expected {
                hit[slot] = (hitpattern >> bit) & 1 == 1;
                bit += 1;
            }
        }
        Self { expected, hit }
    }

    /// Whether a hit was expected on the given slot (0-5 for barrel layers
    /// 1-6, 6-10 for endcap disks 1-5).
    pub fn expected(&self, slot: usize) -> bool {
        self.expected[slot]
    }

    /// Whether the given slot was hit.
    pub fn hit(&self, slot: usize) -> bool {
        self.hit[slot]
    }

    /// The module type of the given slot.
    pub fn module_type(&self, slot: usize) -> ModuleType {
        if PS_MODULE[slot] {
            ModuleType::Ps
        } else {
            ModuleType::TwoS
        }
    }

    /// The number of layers and disks expected to be hit.
    pub fn n_expected(&self) -> usize {
        self.expected.iter().filter(|&&expected| expected).count()
    }

    /// The number of layers and disks actually hit.
    pub fn n_hit(&self) -> usize {
        self.hit.iter().filter(|&&hit| hit).count()
    }

    /// The number of expected layers and disks that went unhit.
    pub fn n_missed(&self) -> usize {
        self.n_expected() - self.n_hit()
    }

    /// The number of expected hits on modules of one type.
    pub fn n_expected_of(&self, module_type: ModuleType) -> usize {
        self.slots_of(module_type)
            .filter(|&slot| self.expected[slot])
            .count()
    }

    /// The number of hits on modules of one type.
    pub fn n_hit_of(&self, module_type: ModuleType) -> usize {
        self.slots_of(module_type)
            .filter(|&slot| self.hit[slot])
            .count()
    }

    /// The number of misses on modules of one type.
    pub fn n_missed_of(&self, module_type: ModuleType) -> usize {
        self.n_expected_of(module_type) - self.n_hit_of(module_type)
    }

    fn slots_of(&self, module_type: ModuleType) -> impl Iterator<Item = usize> {
        (0..N_SLOTS).filter(move |&slot| {
            matches!(
                (PS_MODULE[slot], module_type),
                (true, ModuleType::Ps) | (false, ModuleType::TwoS)
            )
        })
    }
}

/// The expected-hit mask for an absolute eta, from the first region whose
/// inclusive bounds contain it.
fn expected_slots(abseta: f64) -> [bool; N_SLOTS] {
    let mut expected = [false; N_SLOTS];
    for (region, layer_map) in LAYER_MAPS.iter().enumerate() {
        if ETA_REGIONS[region] <= abseta && abseta <= ETA_REGIONS[region + 1] {
            for &layer in *layer_map {
                expected[layer - 1] = true;
            }
            break;
        }
    }
    expected
}

/// Decode stub info for every track in a dict carrying `eta` and
/// `hitpattern` columns (a `trk` or `matchtrk` dict; the truth-level track
/// types have no hit pattern).
pub fn stub_info_list(dict: &TrackPropertyDict) -> TrackCutsResult<Vec<StubInfo>> {
    let etas = dict.column("eta")?;
    let hitpatterns = dict.column("hitpattern")?;
    Ok(etas
        .iter()
        .zip(hitpatterns)
        .map(|(&eta, &hitpattern)| StubInfo::new(eta, hitpattern as u32))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackCutsError;
    use indexmap::IndexMap;

    #[test]
    fn test_central_track_expects_all_barrel_layers() {
        let info = StubInfo::new(0.1, 0b111111);
        assert_eq!(info.n_expected(), 6);
        assert!((0..6).all(|slot| info.expected(slot)));
        assert!((6..11).all(|slot| !info.expected(slot)));
        assert_eq!(info.n_hit(), 6);
        assert_eq!(info.n_missed(), 0);
    }

    #[test]
    fn test_negative_eta_uses_absolute_value() {
        assert_eq!(StubInfo::new(-1.0, 0), StubInfo::new(1.0, 0));
    }

    #[test]
    fn test_forward_track_expects_disks() {
        // |eta| in [2.08, 2.4]: layer 1 plus disks 1-5
        let info = StubInfo::new(2.2, 0);
        assert_eq!(info.n_expected(), 6);
        assert!(info.expected(0));
        assert!((6..11).all(|slot| info.expected(slot)));
    }

    #[test]
    fn test_beyond_acceptance_expects_nothing() {
        let info = StubInfo::new(2.6, 0b1111111);
        assert_eq!(info.n_expected(), 0);
        // pattern bits never land on unexpected slots
        assert_eq!(info.n_hit(), 0);
    }

    #[test]
    fn test_bits_assigned_to_expected_slots_in_order() {
        // |eta| in [1.26, 1.68]: layers 1, 2, 3 and disks 1-4
        let info = StubInfo::new(1.5, 0b0001011);
        assert!(info.hit(0));
        assert!(info.hit(1));
        assert!(!info.hit(2));
        // fourth expected slot is disk 1
        assert!(info.hit(6));
        assert!(!info.hit(7));
        assert_eq!(info.n_hit(), 3);
        assert_eq!(info.n_missed(), 4);
    }

    #[test]
    fn test_module_type_counts() {
        // all six barrel layers expected, all hit: 3 PS + 3 2S
        let info = StubInfo::new(0.0, 0b111111);
        assert_eq!(info.module_type(0), ModuleType::Ps);
        assert_eq!(info.module_type(3), ModuleType::TwoS);
        assert_eq!(info.n_expected_of(ModuleType::Ps), 3);
        assert_eq!(info.n_expected_of(ModuleType::TwoS), 3);
        assert_eq!(info.n_hit_of(ModuleType::Ps), 3);
        assert_eq!(info.n_missed_of(ModuleType::TwoS), 0);

        let inner_only = StubInfo::new(0.0, 0b000111);
        assert_eq!(inner_only.n_hit_of(ModuleType::Ps), 3);
        assert_eq!(inner_only.n_hit_of(ModuleType::TwoS), 0);
        assert_eq!(inner_only.n_missed_of(ModuleType::TwoS), 3);
    }

    #[test]
    fn test_stub_info_list() {
        let dict = TrackPropertyDict::from_columns(IndexMap::from([
            ("eta".to_string(), vec![0.1, 2.6]),
            ("hitpattern".to_string(), vec![63.0, 63.0]),
        ]))
        .unwrap();
        let infos = stub_info_list(&dict).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].n_hit(), 6);
        assert_eq!(infos[1].n_hit(), 0);
    }

    #[test]
    fn test_stub_info_list_requires_hitpattern() {
        let dict = TrackPropertyDict::from_columns(IndexMap::from([(
            "eta".to_string(),
            vec![0.1],
        )]))
        .unwrap();
        assert!(matches!(
            stub_info_list(&dict),
            Err(TrackCutsError::MissingProperty { .. })
        ));
    }
}
