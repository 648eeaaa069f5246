use crate::camelot::CamelotCode;
use crate::catalog::Catalog;
use crate::key::Key;
use crate::mood::Mood;
use serde::Deserialize;
use thiserror::Error;

/// Candidates further than this from the query tempo (after half/double-time
/// matching) are dropped.
pub const DEFAULT_TEMPO_WINDOW_BPM: f64 = 12.0;

/// Number of recommendations returned.
pub const DEFAULT_MAX_RESULTS: usize = 10;

const KEY_WEIGHT: f64 = 3.0;
const TEMPO_WEIGHT: f64 = 0.2;

/// Tunables for [`recommend_with`]. Defaults give the standard behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendOptions {
    pub tempo_window_bpm: f64,
    pub max_results: usize,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            tempo_window_bpm: DEFAULT_TEMPO_WINDOW_BPM,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("tempo window must be a finite, non-negative BPM value, got {0}")]
    TempoWindow(f64),
    #[error("max results must be at least 1")]
    MaxResults,
}

impl RecommendOptions {
    /// Reject settings that would silently disable the tempo filter or
    /// always return nothing.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !self.tempo_window_bpm.is_finite() || self.tempo_window_bpm < 0.0 {
            return Err(OptionsError::TempoWindow(self.tempo_window_bpm));
        }
        if self.max_results == 0 {
            return Err(OptionsError::MaxResults);
        }
        Ok(())
    }
}

/// A candidate next track. Lower `score` = better mix.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub filename: String,
    pub tempo_bpm: f64,
    pub camelot: CamelotCode,
    pub key: Option<Key>,
    pub mood: Option<Mood>,
    pub score: f64,
    pub tempo_distance: f64,
    pub key_distance: u32,
}

/// Smallest BPM gap between `query` and `candidate` played straight, at
/// double speed, or at half speed.
pub fn tempo_distance(query: f64, candidate: f64) -> f64 {
    let direct = (query - candidate).abs();
    let half_time = (query - 2.0 * candidate).abs();
    let double_time = (query - candidate / 2.0).abs();
    direct.min(half_time).min(double_time)
}

/// Combined mix score: key compatibility dominates, tempo breaks ties.
pub fn mix_score(key_distance: u32, tempo_distance: f64) -> f64 {
    key_distance as f64 * KEY_WEIGHT + tempo_distance * TEMPO_WEIGHT
}

/// Rank what to play after `query` using the default window and limit.
pub fn recommend(query: &str, catalog: &Catalog) -> Vec<Recommendation> {
    recommend_with(query, catalog, &RecommendOptions::default())
}

/// Rank every other usable catalog entry against `query`.
///
/// Returns an empty list if the query is unknown, failed, or lacks a tempo
/// or key. Entries without a usable tempo and key are skipped. Ties keep
/// catalog order.
pub fn recommend_with(
    query: &str,
    catalog: &Catalog,
    options: &RecommendOptions,
) -> Vec<Recommendation> {
    let Some((query_tempo, query_camelot)) = catalog.get(query).and_then(|fp| fp.mix_point())
    else {
        log::debug!("No usable tempo/key for {query}, nothing to recommend");
        return Vec::new();
    };

    let mut candidates: Vec<Recommendation> = catalog
        .iter()
        .filter(|fp| fp.filename != query)
        .filter_map(|fp| {
            let (tempo, camelot) = fp.mix_point()?;

            let tempo_distance = tempo_distance(query_tempo, tempo);
            if tempo_distance > options.tempo_window_bpm {
                log::trace!(
                    "Skipping {}: {:.1} BPM away from {}",
                    fp.filename,
                    tempo_distance,
                    query
                );
                return None;
            }

            let key_distance = query_camelot.distance(camelot);
            Some(Recommendation {
                filename: fp.filename.clone(),
                tempo_bpm: tempo,
                camelot,
                key: fp.key(),
                mood: fp.mood(),
                score: mix_score(key_distance, tempo_distance),
                tempo_distance,
                key_distance,
            })
        })
        .collect();

    // Stable sort: equal scores stay in catalog order
    candidates.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(options.max_results);
    candidates
}
