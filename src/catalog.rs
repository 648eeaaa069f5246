use crate::camelot::CamelotCode;
use crate::key::Key;
use crate::mood::Mood;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Default upper bound on catalog entries. Scoring is linear in catalog size.
pub const DEFAULT_MAX_CATALOG_SIZE: usize = 10_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog is full ({0} entries)")]
    Full(usize),
}

/// Outcome of analyzing one track.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Analyzed {
        /// 0.0 when the tempo couldn't be determined.
        tempo_bpm: f64,
        key: Option<Key>,
        camelot: Option<CamelotCode>,
        mood: Option<Mood>,
    },
    /// The feature front end couldn't process the file (decode error,
    /// corrupt file, unsupported codec...).
    Failed { error: String },
}

/// Everything the recommender knows about one track.
#[derive(Debug, Clone, PartialEq)]
pub struct SongFingerprint {
    pub filename: String,
    pub analysis: Analysis,
}

impl SongFingerprint {
    pub fn analyzed(
        filename: impl Into<String>,
        tempo_bpm: f64,
        key: Option<Key>,
        mood: Option<Mood>,
    ) -> Self {
        Self {
            filename: filename.into(),
            analysis: Analysis::Analyzed {
                tempo_bpm,
                key,
                camelot: key.map(CamelotCode::from_key),
                mood,
            },
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            analysis: Analysis::Failed {
                error: error.into(),
            },
        }
    }

    pub fn tempo_bpm(&self) -> Option<f64> {
        match self.analysis {
            Analysis::Analyzed { tempo_bpm, .. } => Some(tempo_bpm),
            Analysis::Failed { .. } => None,
        }
    }

    pub fn key(&self) -> Option<Key> {
        match self.analysis {
            Analysis::Analyzed { key, .. } => key,
            Analysis::Failed { .. } => None,
        }
    }

    pub fn camelot(&self) -> Option<CamelotCode> {
        match self.analysis {
            Analysis::Analyzed { camelot, .. } => camelot,
            Analysis::Failed { .. } => None,
        }
    }

    pub fn mood(&self) -> Option<Mood> {
        match self.analysis {
            Analysis::Analyzed { mood, .. } => mood,
            Analysis::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.analysis {
            Analysis::Failed { error } => Some(error),
            Analysis::Analyzed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.analysis, Analysis::Failed { .. })
    }

    /// Tempo and wheel position, if both are usable for scoring.
    pub fn mix_point(&self) -> Option<(f64, CamelotCode)> {
        match self.analysis {
            Analysis::Analyzed {
                tempo_bpm,
                camelot: Some(camelot),
                ..
            } if tempo_bpm.is_finite() && tempo_bpm > 0.0 => Some((tempo_bpm, camelot)),
            _ => None,
        }
    }
}

/// Filename → fingerprint map that remembers insertion order.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<SongFingerprint>,
    index: HashMap<String, usize>,
    max_size: usize,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_max_size(DEFAULT_MAX_CATALOG_SIZE)
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            max_size,
        }
    }

    /// Insert a fingerprint. An existing filename is replaced in place and
    /// keeps its original position.
    pub fn insert(&mut self, fp: SongFingerprint) -> Result<(), CatalogError> {
        if let Some(&i) = self.index.get(&fp.filename) {
            self.entries[i] = fp;
            return Ok(());
        }
        if self.entries.len() >= self.max_size {
            return Err(CatalogError::Full(self.max_size));
        }
        self.index.insert(fp.filename.clone(), self.entries.len());
        self.entries.push(fp);
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&SongFingerprint> {
        self.index.get(filename).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.index.contains_key(filename)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SongFingerprint> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a SongFingerprint;
    type IntoIter = std::slice::Iter<'a, SongFingerprint>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A catalog shared between readers and a refresher, for applications that
/// embed mixbuddy and keep answering queries while a re-analysis runs. The
/// CLI loads a fresh catalog per command and doesn't need it.
///
/// Readers grab an immutable snapshot and work on it without holding the
/// lock. Refreshing swaps in a whole new catalog; fingerprints are never
/// mutated in place, so a running query never sees a half-updated view.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    current: RwLock<Arc<Catalog>>,
}

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Swap in a new catalog, returning the one it replaced.
    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Mode, PitchClass};

    fn a_minor() -> Key {
        Key::new(PitchClass::new(9), Mode::Minor)
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut catalog = Catalog::new();
        for name in ["c.mp3", "a.mp3", "b.mp3"] {
            catalog
                .insert(SongFingerprint::analyzed(name, 120.0, None, None))
                .unwrap();
        }
        let names: Vec<&str> = catalog.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["c.mp3", "a.mp3", "b.mp3"]);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut catalog = Catalog::new();
        catalog.insert(SongFingerprint::analyzed("a.mp3", 120.0, None, None)).unwrap();
        catalog.insert(SongFingerprint::analyzed("b.mp3", 124.0, None, None)).unwrap();
        catalog.insert(SongFingerprint::failed("a.mp3", "corrupt")).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.iter().next().unwrap().error(), Some("corrupt"));
    }

    #[test]
    fn test_size_bound() {
        let mut catalog = Catalog::with_max_size(2);
        catalog.insert(SongFingerprint::failed("a", "x")).unwrap();
        catalog.insert(SongFingerprint::failed("b", "x")).unwrap();
        assert_eq!(
            catalog.insert(SongFingerprint::failed("c", "x")),
            Err(CatalogError::Full(2))
        );
        // Replacing an existing entry is still allowed when full
        assert!(catalog.insert(SongFingerprint::failed("a", "y")).is_ok());
    }

    #[test]
    fn test_camelot_follows_key() {
        let fp = SongFingerprint::analyzed("a", 120.0, Some(a_minor()), None);
        assert_eq!(fp.camelot().unwrap().to_string(), "8A");

        let unknown = SongFingerprint::analyzed("b", 120.0, None, None);
        assert!(unknown.camelot().is_none());
    }

    #[test]
    fn test_mix_point() {
        assert!(SongFingerprint::analyzed("a", 120.0, Some(a_minor()), None).mix_point().is_some());
        assert!(SongFingerprint::analyzed("a", 0.0, Some(a_minor()), None).mix_point().is_none());
        assert!(SongFingerprint::analyzed("a", f64::NAN, Some(a_minor()), None).mix_point().is_none());
        assert!(SongFingerprint::analyzed("a", 120.0, None, None).mix_point().is_none());
        assert!(SongFingerprint::failed("a", "boom").mix_point().is_none());
    }

    #[test]
    fn test_failed_has_no_fields() {
        let fp = SongFingerprint::failed("a", "boom");
        assert!(fp.is_failed());
        assert_eq!(fp.tempo_bpm(), None);
        assert_eq!(fp.key(), None);
        assert_eq!(fp.mood(), None);
    }

    #[test]
    fn test_shared_snapshot_survives_replace() {
        let mut first = Catalog::new();
        first.insert(SongFingerprint::failed("old", "x")).unwrap();
        let shared = SharedCatalog::new(first);

        let snapshot = shared.snapshot();
        let mut second = Catalog::new();
        second.insert(SongFingerprint::failed("new", "x")).unwrap();
        shared.replace(second);

        assert!(snapshot.contains("old"));
        assert!(!snapshot.contains("new"));
        assert!(shared.snapshot().contains("new"));
    }

    #[test]
    fn test_shared_queries_during_refresh() {
        let library = |tempo: f64| {
            let mut c = Catalog::new();
            c.insert(SongFingerprint::analyzed("now", tempo, Some(a_minor()), None))
                .unwrap();
            c.insert(SongFingerprint::analyzed("next", tempo + 1.0, Some(a_minor()), None))
                .unwrap();
            c
        };
        let shared = Arc::new(SharedCatalog::new(library(120.0)));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = shared.snapshot();
                        let recs = crate::recommend::recommend("now", &snapshot);
                        // Every snapshot is one whole catalog: the pair is always 1 BPM apart
                        assert_eq!(recs.len(), 1);
                        assert_eq!(recs[0].tempo_distance, 1.0);
                    }
                })
            })
            .collect();

        for i in 0..50 {
            shared.replace(library(100.0 + i as f64));
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.snapshot().get("now").unwrap().tempo_bpm(), Some(149.0));
    }
}
