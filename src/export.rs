//! CSV interchange: `filename,tempo_bpm,camelot_key,key,mood,error`.
//!
//! Tempo is written as a rounded integer. Reading accepts files without the
//! `mood` column.

use crate::camelot::CamelotCode;
use crate::catalog::{Catalog, CatalogError, SongFingerprint};
use crate::key::Key;
use crate::mood::Mood;
use std::io::{Read, Write};
use thiserror::Error;

pub const CSV_HEADER: [&str; 6] = ["filename", "tempo_bpm", "camelot_key", "key", "mood", "error"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV has no {0} column")]
    MissingColumn(&'static str),
    #[error("CSV line {line}: empty filename")]
    EmptyFilename { line: u64 },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Terse tempo display used in CSV and tables.
pub fn format_tempo(tempo_bpm: f64) -> String {
    format!("{}", tempo_bpm.round() as i64)
}

/// The six CSV fields for one fingerprint.
pub fn csv_fields(fp: &SongFingerprint) -> [String; 6] {
    [
        fp.filename.clone(),
        fp.tempo_bpm().map(format_tempo).unwrap_or_default(),
        fp.camelot().map(|c| c.to_string()).unwrap_or_default(),
        fp.key().map(|k| k.to_string()).unwrap_or_default(),
        fp.mood().map(|m| m.to_string()).unwrap_or_default(),
        fp.error().unwrap_or_default().to_string(),
    ]
}

/// Write the whole catalog, header first, in catalog order.
pub fn write_csv<W: Write>(out: W, catalog: &Catalog) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for fp in catalog {
        writer.write_record(csv_fields(fp))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a catalog back from CSV. Rows are matched to columns by header name,
/// so exports without a `mood` column still load.
pub fn read_csv<R: Read>(input: R, max_size: usize) -> Result<Catalog, ExportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let header = reader.headers()?.clone();
    let mut catalog = Catalog::with_max_size(max_size);
    if header.is_empty() {
        return Ok(catalog);
    }

    let column = |name: &str| header.iter().position(|h| h == name);
    let filename_col = column("filename").ok_or(ExportError::MissingColumn("filename"))?;
    let tempo_col = column("tempo_bpm");
    let camelot_col = column("camelot_key");
    let key_col = column("key");
    let mood_col = column("mood");
    let error_col = column("error");

    for result in reader.records() {
        let record = result?;
        let field = |col: Option<usize>| cell(&record, col);

        let filename = field(Some(filename_col));
        if filename.is_empty() {
            if record.iter().all(str::is_empty) {
                continue;
            }
            return Err(ExportError::EmptyFilename {
                line: record.position().map(|p| p.line()).unwrap_or(0),
            });
        }

        let error = field(error_col);
        if !error.is_empty() {
            catalog.insert(SongFingerprint::failed(filename, error))?;
            continue;
        }

        let tempo = field(tempo_col).parse::<f64>().unwrap_or(0.0);
        let key = field(key_col)
            .parse::<Key>()
            .ok()
            .or_else(|| field(camelot_col).parse::<CamelotCode>().ok().map(CamelotCode::key));
        let mood = field(mood_col).parse::<Mood>().ok();

        catalog.insert(SongFingerprint::analyzed(filename, tempo, key, mood))?;
    }

    Ok(catalog)
}

fn cell(record: &csv::StringRecord, col: Option<usize>) -> &str {
    col.and_then(|c| record.get(c)).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        let mut c = Catalog::new();
        c.insert(SongFingerprint::analyzed(
            "Deep, Dark.mp3",
            123.6,
            "C# minor".parse().ok(),
            Some(Mood::Dark),
        ))
        .unwrap();
        c.insert(SongFingerprint::failed("bad.flac", "decode failed: \"bad frame\""))
            .unwrap();
        c.insert(SongFingerprint::analyzed("quiet.wav", 0.0, None, None)).unwrap();
        c
    }

    fn to_string(catalog: &Catalog) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, catalog).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_csv() {
        let text = to_string(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "filename,tempo_bpm,camelot_key,key,mood,error");
        assert_eq!(lines[1], "\"Deep, Dark.mp3\",124,12A,C# minor,Dark,");
        assert_eq!(lines[2], "bad.flac,,,,,\"decode failed: \"\"bad frame\"\"\"");
        assert_eq!(lines[3], "quiet.wav,0,,,,");
    }

    #[test]
    fn test_read_back_written_csv() {
        let catalog = read_csv(to_string(&sample()).as_bytes(), 100).unwrap();
        assert_eq!(catalog.len(), 3);

        let first = catalog.get("Deep, Dark.mp3").unwrap();
        // Tempo was rounded on the way out
        assert_eq!(first.tempo_bpm(), Some(124.0));
        assert_eq!(first.camelot().unwrap().to_string(), "12A");
        assert_eq!(first.mood(), Some(Mood::Dark));

        assert_eq!(
            catalog.get("bad.flac").unwrap().error(),
            Some("decode failed: \"bad frame\"")
        );
        assert_eq!(catalog.get("quiet.wav").unwrap().key(), None);
    }

    #[test]
    fn test_read_csv_without_mood_column() {
        let text = "filename,tempo_bpm,camelot_key,key,error\n\
                    a.mp3,128,8A,A minor,\n\
                    b.mp3,,,,No backend available\n\
                    c.mp3,90,5A,,\n";
        let catalog = read_csv(text.as_bytes(), 100).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("a.mp3").unwrap().mood(), None);
        assert!(catalog.get("b.mp3").unwrap().is_failed());
        // Key recovered from the Camelot column
        assert_eq!(catalog.get("c.mp3").unwrap().key().unwrap().to_string(), "C minor");
    }

    #[test]
    fn test_read_csv_multiline_field_and_crlf() {
        let text = "filename,error\r\n\"x.mp3\",\"line one\nline two\"\r\ny.mp3,\r\n";
        let catalog = read_csv(text.as_bytes(), 100).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("x.mp3").unwrap().error(), Some("line one\nline two"));
        assert!(!catalog.get("y.mp3").unwrap().is_failed());
    }

    #[test]
    fn test_read_csv_errors() {
        assert!(matches!(
            read_csv("name,tempo\nx,1\n".as_bytes(), 100),
            Err(ExportError::MissingColumn("filename"))
        ));
        assert!(matches!(
            read_csv("filename,tempo_bpm\na.mp3,120\n,120\n".as_bytes(), 100),
            Err(ExportError::EmptyFilename { line: 3 })
        ));
        assert!(matches!(
            read_csv(&b"filename,tempo_bpm\n\xff\xfe.mp3,120\n"[..], 100),
            Err(ExportError::Csv(_))
        ));
        assert!(matches!(
            read_csv("filename\na\nb\n".as_bytes(), 1),
            Err(ExportError::Catalog(CatalogError::Full(1)))
        ));
    }

    #[test]
    fn test_read_csv_empty_and_blank_lines() {
        assert!(read_csv("".as_bytes(), 100).unwrap().is_empty());
        let catalog = read_csv("filename,tempo_bpm\n\na.mp3,120\n".as_bytes(), 100).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_format_tempo() {
        assert_eq!(format_tempo(127.5), "128");
        assert_eq!(format_tempo(127.4), "127");
        assert_eq!(format_tempo(0.0), "0");
    }
}
