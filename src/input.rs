use crate::error::{Error, Result};
use crate::models::TrackRequest;
use std::path::Path;

const TRACK_COLUMN: &str = "track";
const ARTIST_COLUMN: &str = "artist";

/// Read `(track, artist)` rows from a CSV file with a header row.
///
/// Column order does not matter and extra columns are ignored. Rows keep file
/// order; a row with both cells blank is skipped.
pub fn load_requests(path: &Path) -> Result<Vec<TrackRequest>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Input(format!("{}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::Input(format!("{}: {}", path.display(), e)))?
        .clone();
    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::Input(format!("{}: missing column '{}'", path.display(), name)))
    };
    let track_idx = column(TRACK_COLUMN)?;
    let artist_idx = column(ARTIST_COLUMN)?;

    let mut requests = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            Error::Input(format!("{}: row {}: {}", path.display(), line + 1, e))
        })?;
        let title = record.get(track_idx).unwrap_or("");
        let artist = record.get(artist_idx).unwrap_or("");
        if title.is_empty() && artist.is_empty() {
            continue;
        }
        requests.push(TrackRequest::new(title, artist));
    }
    Ok(requests)
}

/// Playlist name for an input file: its base name without the extension.
pub fn playlist_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| Error::Input(format!("cannot derive playlist name from {}", path.display())))
}
