use super::models::{FingerprintRow, LibraryStats};
use super::{Database, Result};
use crate::catalog::{Catalog, CatalogError, SongFingerprint};
use rusqlite::{params, Connection};

const UPSERT_SQL: &str = "
    INSERT INTO fingerprints (
        filename, tempo_bpm, key_label, camelot_key, mood, error, analyzed_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
    ON CONFLICT(filename) DO UPDATE SET
        tempo_bpm = excluded.tempo_bpm,
        key_label = excluded.key_label,
        camelot_key = excluded.camelot_key,
        mood = excluded.mood,
        error = excluded.error,
        analyzed_at = datetime('now')
";

impl Database {
    /// Insert or update fingerprints in a single transaction. An existing
    /// filename keeps its row id, and with it its catalog position.
    pub fn store_fingerprints(&self, fps: &[SongFingerprint]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        Self::upsert_all(&tx, fps)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the whole catalog atomically: readers see either the old set
    /// or the new one.
    pub fn replace_catalog(&self, fps: &[SongFingerprint]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM fingerprints", [])?;
        Self::upsert_all(&tx, fps)?;
        tx.commit()?;
        log::info!("Replaced catalog with {} fingerprints", fps.len());
        Ok(())
    }

    fn upsert_all(conn: &Connection, fps: &[SongFingerprint]) -> Result<()> {
        let mut stmt = conn.prepare_cached(UPSERT_SQL)?;
        for fp in fps {
            let row = FingerprintRow::from_fingerprint(fp);
            stmt.execute(params![
                row.filename,
                row.tempo_bpm,
                row.key_label,
                row.camelot_key,
                row.mood,
                row.error,
            ])?;
        }
        Ok(())
    }

    /// Load the catalog in insertion order. Entries past `max_size` are
    /// dropped with a warning.
    pub fn load_catalog(&self, max_size: usize) -> Result<Catalog> {
        let rows = self.get_fingerprint_rows()?;
        let total = rows.len();
        let mut catalog = Catalog::with_max_size(max_size);

        for row in rows {
            match catalog.insert(row.into_fingerprint()) {
                Ok(()) => {}
                Err(CatalogError::Full(limit)) => {
                    log::warn!(
                        "Catalog limit of {} reached, ignoring {} of {} stored tracks",
                        limit,
                        total - catalog.len(),
                        total
                    );
                    break;
                }
            }
        }

        Ok(catalog)
    }

    /// All stored rows ordered by id.
    pub fn get_fingerprint_rows(&self) -> Result<Vec<FingerprintRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT filename, tempo_bpm, key_label, camelot_key, mood, error
             FROM fingerprints ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(FingerprintRow {
                    filename: row.get(0)?,
                    tempo_bpm: row.get(1)?,
                    key_label: row.get(2)?,
                    camelot_key: row.get(3)?,
                    mood: row.get(4)?,
                    error: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn get_fingerprint(&self, filename: &str) -> Result<Option<SongFingerprint>> {
        let result = self.conn.query_row(
            "SELECT filename, tempo_bpm, key_label, camelot_key, mood, error
             FROM fingerprints WHERE filename = ?1",
            params![filename],
            |row| {
                Ok(FingerprintRow {
                    filename: row.get(0)?,
                    tempo_bpm: row.get(1)?,
                    key_label: row.get(2)?,
                    camelot_key: row.get(3)?,
                    mood: row.get(4)?,
                    error: row.get(5)?,
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row.into_fingerprint())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get library statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let total_tracks: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;

        let failed_tracks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fingerprints WHERE error IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let unknown_key_tracks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fingerprints WHERE error IS NULL AND camelot_key IS NULL",
            [],
            |row| row.get(0),
        )?;

        let mut mood_stmt = self.conn.prepare(
            "SELECT mood, COUNT(*) FROM fingerprints
             WHERE mood IS NOT NULL
             GROUP BY mood ORDER BY COUNT(*) DESC, mood",
        )?;
        let moods: Vec<(String, i64)> = mood_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut key_stmt = self.conn.prepare(
            "SELECT camelot_key, COUNT(*) FROM fingerprints
             WHERE camelot_key IS NOT NULL
             GROUP BY camelot_key ORDER BY COUNT(*) DESC, camelot_key",
        )?;
        let camelot_keys: Vec<(String, i64)> = key_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            total_tracks,
            analyzed_tracks: total_tracks - failed_tracks,
            failed_tracks,
            unknown_key_tracks,
            moods,
            camelot_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;

    fn sample() -> Vec<SongFingerprint> {
        vec![
            SongFingerprint::analyzed("b.mp3", 124.0, "A minor".parse().ok(), Some(Mood::Dark)),
            SongFingerprint::failed("broken.flac", "unsupported codec"),
            SongFingerprint::analyzed("a.mp3", 128.0, "C major".parse().ok(), Some(Mood::Energetic)),
            SongFingerprint::analyzed("silent.wav", 0.0, None, None),
        ]
    }

    #[test]
    fn test_store_and_load_preserves_order() {
        let db = Database::open_in_memory().unwrap();
        let fps = sample();
        db.store_fingerprints(&fps).unwrap();

        let catalog = db.load_catalog(100).unwrap();
        let loaded: Vec<SongFingerprint> = catalog.iter().cloned().collect();
        assert_eq!(loaded, fps);
    }

    #[test]
    fn test_upsert_keeps_position() {
        let db = Database::open_in_memory().unwrap();
        db.store_fingerprints(&sample()).unwrap();
        db.store_fingerprints(&[SongFingerprint::failed("b.mp3", "re-decode failed")])
            .unwrap();

        let catalog = db.load_catalog(100).unwrap();
        assert_eq!(catalog.len(), 4);
        let first = catalog.iter().next().unwrap();
        assert_eq!(first.filename, "b.mp3");
        assert_eq!(first.error(), Some("re-decode failed"));
    }

    #[test]
    fn test_replace_catalog() {
        let db = Database::open_in_memory().unwrap();
        db.store_fingerprints(&sample()).unwrap();
        db.replace_catalog(&[SongFingerprint::analyzed("new.mp3", 100.0, None, None)])
            .unwrap();

        let catalog = db.load_catalog(100).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("new.mp3"));
    }

    #[test]
    fn test_load_respects_limit() {
        let db = Database::open_in_memory().unwrap();
        db.store_fingerprints(&sample()).unwrap();
        let catalog = db.load_catalog(2).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("b.mp3"));
        assert!(catalog.contains("broken.flac"));
    }

    #[test]
    fn test_get_fingerprint() {
        let db = Database::open_in_memory().unwrap();
        db.store_fingerprints(&sample()).unwrap();

        let fp = db.get_fingerprint("a.mp3").unwrap().unwrap();
        assert_eq!(fp.camelot().unwrap().to_string(), "8B");
        assert!(db.get_fingerprint("nope.mp3").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let db = Database::open_in_memory().unwrap();
        let empty = db.stats().unwrap();
        assert_eq!(empty.total_tracks, 0);
        assert!(empty.moods.is_empty());

        db.store_fingerprints(&sample()).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_tracks, 4);
        assert_eq!(stats.analyzed_tracks, 3);
        assert_eq!(stats.failed_tracks, 1);
        assert_eq!(stats.unknown_key_tracks, 1);
        assert_eq!(stats.moods.len(), 2);
        assert_eq!(
            stats.camelot_keys,
            vec![("8A".to_string(), 1), ("8B".to_string(), 1)]
        );
    }
}
