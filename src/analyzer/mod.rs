pub mod features;

use crate::camelot::to_camelot;
use crate::catalog::{Analysis, SongFingerprint};
use crate::db::Database;
use crate::key::estimate_key;
use crate::mood::classify_mood;
use features::TrackFeatures;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid feature file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid features for {filename}: {message}")]
    InvalidFeatures { filename: String, message: String },
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

pub struct AnalyzeResult {
    pub analyzed: u64,
    pub failed: u64,
}

/// Build a fingerprint from one track's front-end features.
///
/// Tracks the front end couldn't decode come back as [`Analysis::Failed`]
/// without touching the estimators. Mood needs a mode, so it's only set when
/// the key is known.
pub fn analyze_track(features: &TrackFeatures) -> Result<SongFingerprint, AnalyzeError> {
    if let Some(error) = &features.error {
        return Ok(SongFingerprint::failed(&features.filename, error));
    }

    features.validate()?;
    let summary = features.summarize();

    let key = summary.chroma.and_then(|chroma| estimate_key(&chroma));
    let camelot = to_camelot(key.as_ref());
    let mood = key.map(|k| {
        classify_mood(summary.tempo_bpm, summary.energy, summary.brightness_hz, k.mode)
    });

    log::debug!(
        "{}: {:.1} BPM, {}, {}",
        features.filename,
        summary.tempo_bpm,
        key.map(|k| k.to_string()).unwrap_or_else(|| "unknown key".to_string()),
        camelot.map(|c| c.to_string()).unwrap_or_default(),
    );

    Ok(SongFingerprint {
        filename: features.filename.clone(),
        analysis: Analysis::Analyzed {
            tempo_bpm: summary.tempo_bpm,
            key,
            camelot,
            mood,
        },
    })
}

/// Analyze one track, turning any per-track error into a failed fingerprint
/// so a bad record never stops the batch.
pub fn analyze_or_fail(features: &TrackFeatures) -> SongFingerprint {
    analyze_track(features).unwrap_or_else(|e| {
        log::warn!("Analysis failed: {}", e);
        SongFingerprint::failed(&features.filename, e.to_string())
    })
}

/// Analyze every record on a rayon pool, keeping input order.
pub fn analyze_all(
    records: &[TrackFeatures],
    jobs: usize,
) -> Result<Vec<SongFingerprint>, AnalyzeError> {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let pb = progress_bar(records.len() as u64);
    let fingerprints = analyze_chunk(&pool, &pb, records);
    pb.finish_and_clear();
    Ok(fingerprints)
}

fn analyze_chunk(
    pool: &ThreadPool,
    pb: &ProgressBar,
    records: &[TrackFeatures],
) -> Vec<SongFingerprint> {
    pool.install(|| {
        records
            .par_iter()
            .map(|record| {
                let fp = analyze_or_fail(record);
                pb.inc(1);
                fp
            })
            .collect()
    })
}

/// Analyze feature records and store the fingerprints.
///
/// With `replace`, the whole batch is analyzed first and swapped in as the
/// new catalog in one transaction; an empty batch empties the catalog.
/// Otherwise records are processed in chunks and upserted as they complete,
/// so progress survives an interruption.
pub fn analyze_tracks(
    db: &Database,
    records: &[TrackFeatures],
    jobs: usize,
    replace: bool,
) -> Result<AnalyzeResult, AnalyzeError> {
    if records.is_empty() {
        if replace {
            db.replace_catalog(&[])?;
        } else {
            log::info!("No tracks to analyze");
        }
        return Ok(AnalyzeResult {
            analyzed: 0,
            failed: 0,
        });
    }

    let jobs = jobs.max(1);
    log::info!("Analyzing {} tracks with {} workers", records.len(), jobs);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let pb = progress_bar(records.len() as u64);

    let mut analyzed: u64 = 0;
    let mut failed: u64 = 0;

    if replace {
        let fingerprints = analyze_chunk(&pool, &pb, records);
        db.replace_catalog(&fingerprints)?;
        let (ok, bad) = tally(&fingerprints);
        analyzed += ok;
        failed += bad;
    } else {
        // Chunk size = jobs * 2 keeps every worker busy with bounded memory
        for chunk in records.chunks(jobs * 2) {
            let fingerprints = analyze_chunk(&pool, &pb, chunk);
            db.store_fingerprints(&fingerprints)?;
            let (ok, bad) = tally(&fingerprints);
            analyzed += ok;
            failed += bad;
            pb.set_message(format!("{} stored, {} failed", analyzed, failed));
        }
    }

    pb.finish_with_message(format!("Done: {} analyzed, {} failed", analyzed, failed));

    Ok(AnalyzeResult { analyzed, failed })
}

/// Count (analyzed, failed) fingerprints.
fn tally(fps: &[SongFingerprint]) -> (u64, u64) {
    let failed = fps.iter().filter(|fp| fp.is_failed()).count() as u64;
    (fps.len() as u64 - failed, failed)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
