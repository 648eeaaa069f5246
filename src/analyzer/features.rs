use serde::Deserialize;
use std::path::Path;

use super::AnalyzeError;

/// Per-track output of the signal-processing front end.
///
/// Either the series fields are filled in, or `error` says why the file
/// couldn't be decoded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackFeatures {
    pub filename: String,
    /// Frame-wise tempo estimates (BPM).
    pub tempo: Vec<f64>,
    /// Chroma frames, each 12 bins C..B.
    pub chroma: Vec<Vec<f64>>,
    /// Frame-wise RMS amplitude.
    pub rms: Vec<f64>,
    /// Frame-wise spectral centroid (Hz).
    pub spectral_centroid: Vec<f64>,
    pub error: Option<String>,
}

/// Scalars the core components consume, reduced from the frame series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub tempo_bpm: f64,
    pub chroma: Option<[f64; 12]>,
    pub energy: f64,
    pub brightness_hz: f64,
}

impl TrackFeatures {
    /// Check the series for values the estimators can't use.
    pub fn validate(&self) -> Result<(), AnalyzeError> {
        let invalid = |message: String| AnalyzeError::InvalidFeatures {
            filename: self.filename.clone(),
            message,
        };

        if let Some(i) = self.chroma.iter().position(|frame| frame.len() != 12) {
            return Err(invalid(format!(
                "chroma frame {} has {} bins, expected 12",
                i,
                self.chroma[i].len()
            )));
        }

        let series: [(&str, &[f64]); 3] = [
            ("tempo", &self.tempo),
            ("rms", &self.rms),
            ("spectral_centroid", &self.spectral_centroid),
        ];
        for (name, values) in series {
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(invalid(format!("{name} contains negative or non-finite values")));
            }
        }
        if self.chroma.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(invalid("chroma contains negative or non-finite values".to_string()));
        }

        Ok(())
    }

    /// Reduce the series: median tempo (0 if none), mean chroma, mean RMS,
    /// mean centroid.
    pub fn summarize(&self) -> TrackSummary {
        TrackSummary {
            tempo_bpm: median(&self.tempo).unwrap_or(0.0),
            chroma: crate::key::mean_chroma(&self.chroma),
            energy: mean(&self.rms).unwrap_or(0.0),
            brightness_hz: mean(&self.spectral_centroid).unwrap_or(0.0),
        }
    }
}

/// Load a JSON array of feature records.
pub fn load_features(path: &Path) -> Result<Vec<TrackFeatures>, AnalyzeError> {
    let contents = std::fs::read_to_string(path)?;
    let records: Vec<TrackFeatures> = serde_json::from_str(&contents)?;
    log::info!("Loaded {} feature records from {}", records.len(), path.display());
    Ok(records)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    } else {
        Some(sorted[n / 2])
    }
}
