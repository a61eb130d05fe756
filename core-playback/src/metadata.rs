//! Now-Playing metadata normalization.

use chrono::NaiveDate;
use serde_json::Value;

use bridge_traits::NowPlayingInfo;

use crate::protocol::MetadataUpdate;

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_ARTIST: &str = "Unknown";

/// Merges a script metadata update into the session's Now-Playing info.
///
/// Title and artist always receive a value. Album and release date are only
/// overwritten when present. `length` fills the duration only if none is
/// known yet. Artwork is left alone; it is fetched separately.
pub fn apply_update(info: &mut NowPlayingInfo, update: &MetadataUpdate) {
    info.title = Some(
        update
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
    );
    info.artist = Some(
        update
            .artist
            .clone()
            .unwrap_or_else(|| DEFAULT_ARTIST.to_string()),
    );

    if let Some(album) = &update.album {
        info.album = Some(album.clone());
    }

    if let Some(date) = update.year.as_ref().and_then(normalize_year) {
        info.release_date = Some(date);
    }

    if info.duration.is_none() {
        info.duration = update.length.filter(|l| l.is_finite() && *l >= 0.0);
    }
}

/// Normalizes a year given as a number (`1999`, `1999.0`) or a string with a
/// leading 4-digit year (`"1999"`, `"1999-05-01"`) into January 1st of that
/// year.
pub fn normalize_year(value: &Value) -> Option<NaiveDate> {
    let year = match value {
        Value::Number(n) => {
            let y = n.as_f64()?;
            if y.fract() != 0.0 {
                return None;
            }
            y as i32
        }
        Value::String(s) => {
            let prefix = s.trim().get(..4)?;
            if !prefix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            prefix.parse().ok()?
        }
        _ => return None,
    };

    if !(1000..=9999).contains(&year) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, 1, 1)
}
