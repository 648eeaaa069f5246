use crate::camelot::CamelotCode;
use crate::catalog::{Analysis, SongFingerprint};
use crate::key::Key;
use crate::mood::Mood;

/// A fingerprint as stored in the `fingerprints` table.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRow {
    pub filename: String,
    pub tempo_bpm: Option<f64>,
    pub key_label: Option<String>,
    pub camelot_key: Option<String>,
    pub mood: Option<String>,
    pub error: Option<String>,
}

impl FingerprintRow {
    pub fn from_fingerprint(fp: &SongFingerprint) -> Self {
        match &fp.analysis {
            Analysis::Analyzed {
                tempo_bpm,
                key,
                camelot,
                mood,
            } => Self {
                filename: fp.filename.clone(),
                tempo_bpm: Some(*tempo_bpm),
                key_label: key.map(|k| k.to_string()),
                camelot_key: camelot.map(|c| c.to_string()),
                mood: mood.map(|m| m.to_string()),
                error: None,
            },
            Analysis::Failed { error } => Self {
                filename: fp.filename.clone(),
                tempo_bpm: None,
                key_label: None,
                camelot_key: None,
                mood: None,
                error: Some(error.clone()),
            },
        }
    }

    /// Rebuild the fingerprint. Labels that no longer parse degrade to
    /// "unknown" rather than failing the load. The stored Camelot code is only
    /// used when the key label is missing.
    pub fn into_fingerprint(self) -> SongFingerprint {
        if let Some(error) = self.error {
            return SongFingerprint::failed(self.filename, error);
        }

        let key = self
            .key_label
            .as_deref()
            .and_then(|label| label.parse::<Key>().ok())
            .or_else(|| {
                self.camelot_key
                    .as_deref()
                    .and_then(|code| code.parse::<CamelotCode>().ok())
                    .map(CamelotCode::key)
            });
        let mood = self.mood.as_deref().and_then(|m| m.parse::<Mood>().ok());

        SongFingerprint::analyzed(self.filename, self.tempo_bpm.unwrap_or(0.0), key, mood)
    }
}

/// Library statistics for the `stats` command.
pub struct LibraryStats {
    pub total_tracks: i64,
    pub analyzed_tracks: i64,
    pub failed_tracks: i64,
    pub unknown_key_tracks: i64,
    pub moods: Vec<(String, i64)>,
    pub camelot_keys: Vec<(String, i64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_roundtrip() {
        let fp = SongFingerprint::analyzed(
            "a.mp3",
            124.0,
            "F# minor".parse().ok(),
            Some(Mood::Dark),
        );
        let row = FingerprintRow::from_fingerprint(&fp);
        assert_eq!(row.camelot_key.as_deref(), Some("11A"));
        assert_eq!(row.into_fingerprint(), fp);

        let failed = SongFingerprint::failed("b.mp3", "decode error");
        assert_eq!(FingerprintRow::from_fingerprint(&failed).into_fingerprint(), failed);
    }

    #[test]
    fn test_garbage_labels_degrade() {
        let row = FingerprintRow {
            filename: "a.mp3".into(),
            tempo_bpm: None,
            key_label: Some("Unknown".into()),
            camelot_key: Some("??".into()),
            mood: Some("Happy".into()),
            error: None,
        };
        let fp = row.into_fingerprint();
        assert!(!fp.is_failed());
        assert_eq!(fp.tempo_bpm(), Some(0.0));
        assert_eq!(fp.key(), None);
        assert_eq!(fp.camelot(), None);
        assert_eq!(fp.mood(), None);
    }

    #[test]
    fn test_key_recovered_from_camelot() {
        let row = FingerprintRow {
            filename: "a.mp3".into(),
            tempo_bpm: Some(120.0),
            key_label: None,
            camelot_key: Some("8B".into()),
            mood: None,
            error: None,
        };
        let fp = row.into_fingerprint();
        assert_eq!(fp.key().unwrap().to_string(), "C major");
        assert_eq!(fp.camelot().unwrap().to_string(), "8B");
    }
}
