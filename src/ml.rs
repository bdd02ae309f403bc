use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::TrackPropertyDict;
use crate::selection::{Selector, SelectorDict};
use crate::{TrackCutsError, TrackCutsResult};

/// A track property dict reshaped for a classifier: a rectangular row-major
/// data matrix, the property names indexing its columns, and a label vector
/// split off under its own property name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPropertiesDataset {
    data: Vec<Vec<f64>>,
    data_properties: Vec<String>,
    labels: Vec<f64>,
    label_property: String,
}

impl TrackPropertiesDataset {
    /// Build one or more datasets from a track property dict.
    ///
    /// `data_properties` selects the columns that become the data matrix
    /// (`None` takes every property except the label). `split` gives the
    /// relative sizes of the datasets to produce, e.g. `[0.7, 0.2, 0.1]` for
    /// train/validation/test; the sizes are normalized against the track
    /// count and the last split absorbs integer rounding so the total is
    /// exact. Splitting does not shuffle; shuffle the dict first.
    pub fn from_track_prop_dict(
        dict: &TrackPropertyDict,
        data_properties: Option<&[&str]>,
        label_property: &str,
        split: &[f64],
    ) -> TrackCutsResult<Vec<Self>> {
        let labels = dict.column(label_property)?.to_vec();
        let data_properties: Vec<String> = match data_properties {
            Some(names) => names.iter().map(|name| name.to_string()).collect(),
            None => dict
                .property_names()
                .filter(|&name| name != label_property)
                .map(String::from)
                .collect(),
        };
        let mut columns = Vec::with_capacity(data_properties.len());
        for name in &data_properties {
            columns.push(dict.column(name)?);
        }
        let n_tracks = dict.n_tracks();
        let data: Vec<Vec<f64>> = (0..n_tracks)
            .map(|row| columns.iter().map(|column| column[row]).collect())
            .collect();

        let sizes = split_sizes(split, n_tracks);
        let mut datasets = Vec::with_capacity(sizes.len());
        let mut start = 0;
        for size in sizes {
            datasets.push(Self {
                data: data[start..start + size].to_vec(),
                data_properties: data_properties.clone(),
                labels: labels[start..start + size].to_vec(),
                label_property: label_property.to_string(),
            });
            start += size;
        }
        Ok(datasets)
    }

    /// The number of tracks in the dataset.
    pub fn n_tracks(&self) -> usize {
        self.data.len()
    }

    /// The number of data columns per track.
    pub fn data_dim(&self) -> usize {
        self.data_properties.len()
    }

    /// The row-major data matrix.
    pub fn data(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// The label values, one per track.
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// The property names indexing the data columns.
    pub fn data_properties(&self) -> &[String] {
        &self.data_properties
    }

    /// The property the labels were drawn from.
    pub fn label_property(&self) -> &str {
        &self.label_property
    }

    /// The column index of the named data property.
    pub fn column_index(&self, property: &str) -> Option<usize> {
        self.data_properties
            .iter()
            .position(|name| name == property)
    }

    /// Reassemble a track property dict from the data and label columns,
    /// e.g. to re-cut the data.
    pub fn to_track_prop_dict(&self) -> TrackPropertyDict {
        let mut columns: IndexMap<String, Vec<f64>> = self
            .data_properties
            .iter()
            .enumerate()
            .map(|(column, name)| {
                (
                    name.clone(),
                    self.data.iter().map(|row| row[column]).collect(),
                )
            })
            .collect();
        columns.insert(self.label_property.clone(), self.labels.clone());
        TrackPropertyDict::from_columns(columns)
            .expect("dataset columns are rectangular by construction")
    }
}

/// Normalize a relative split distribution into dataset sizes summing to
/// `n_tracks` exactly; the last split absorbs rounding.
fn split_sizes(split: &[f64], n_tracks: usize) -> Vec<usize> {
    if split.is_empty() {
        return vec![n_tracks];
    }
    let total: f64 = split.iter().sum();
    let mut sizes: Vec<usize> = split
        .iter()
        .map(|&fraction| (fraction * n_tracks as f64 / total) as usize)
        .collect();
    let assigned: usize = sizes.iter().sum();
    if let Some(last) = sizes.last_mut() {
        *last += n_tracks - assigned;
    }
    sizes
}

/// The capability a classifier exposes to this crate: per-track scores for
/// a dataset. Tree and neural model families live outside the crate and
/// implement this; the caller picks the implementation explicitly.
pub trait Predictor {
    /// One score per track, typically a probability in `[0, 1]`.
    fn predict(&self, dataset: &TrackPropertiesDataset) -> Vec<f64>;
}

/// A [`Predictor`] that scores by selection cuts alone: `1.0` for tracks a
/// selector dict keeps, `0.0` for tracks it would cut. A useful baseline
/// against trained models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutPredictor {
    selectors: SelectorDict,
}

impl CutPredictor {
    /// Create a cut-based predictor from a selector dict.
    pub fn new(selectors: SelectorDict) -> Self {
        Self { selectors }
    }
}

impl Predictor for CutPredictor {
    fn predict(&self, dataset: &TrackPropertiesDataset) -> Vec<f64> {
        let dict = dataset.to_track_prop_dict();
        let cut_indices = dict.select_indices(&self.selectors, true);
        let mut scores = vec![1.0; dict.n_tracks()];
        for index in cut_indices {
            scores[index] = 0.0;
        }
        scores
    }
}

/// Send every score below the threshold to `0.0` and everything at or above
/// it to `1.0`, turning probabilistic scores into predicted labels.
pub fn apply_threshold(scores: &[f64], threshold: f64) -> Vec<f64> {
    scores
        .iter()
        .map(|&score| if score >= threshold { 1.0 } else { 0.0 })
        .collect()
}

/// The proportion of thresholded predictions accepted by `pred_selector`,
/// restricted to tracks whose true label is accepted by `truth_selector`.
/// This is the generalization of true and false positive rates.
pub fn prediction_proportion(
    labels: &[f64],
    scores: &[f64],
    truth_selector: &Selector,
    pred_selector: &Selector,
    threshold: f64,
) -> TrackCutsResult<f64> {
    if labels.len() != scores.len() {
        return Err(TrackCutsError::LengthMismatch {
            expected: labels.len(),
            found: scores.len(),
        });
    }
    let restricted: Vec<f64> = labels
        .iter()
        .zip(scores)
        .filter(|(label, _)| truth_selector.selects(**label))
        .map(|(_, &score)| score)
        .collect();
    let predictions = apply_threshold(&restricted, threshold);
    Ok(crate::metrics::proportion_selected(
        &predictions,
        pred_selector,
        true,
    ))
}

/// The proportion of genuinely "true" tracks the model predicted correctly.
pub fn true_positive_rate(
    labels: &[f64],
    scores: &[f64],
    threshold: f64,
) -> TrackCutsResult<f64> {
    prediction_proportion(
        labels,
        scores,
        &Selector::equal(1.0),
        &Selector::equal(1.0),
        threshold,
    )
}

/// The proportion of genuinely "false" tracks the model predicted "true".
pub fn false_positive_rate(
    labels: &[f64],
    scores: &[f64],
    threshold: f64,
) -> TrackCutsResult<f64> {
    prediction_proportion(
        labels,
        scores,
        &Selector::equal(0.0),
        &Selector::equal(1.0),
        threshold,
    )
}
