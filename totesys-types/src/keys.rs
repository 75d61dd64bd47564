use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// The earliest watermark: used when no snapshot has ever been written, so
/// the first extraction pulls the full history. The Unix epoch comfortably
/// predates any Totesys row and stays representable in the source database.
pub fn epoch_watermark() -> NaiveDateTime {
    chrono::DateTime::UNIX_EPOCH.naive_utc()
}

/// A snapshot key in the object store. The textual form is load-bearing:
/// the extractor reconstructs its watermark by parsing these keys back, so
/// the format must stay bit-exact:
/// `{table}/{YYYY}/{MM}/{DD}/{table}_{HH}:{MM}:{SS}.{ext}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotKey {
    pub table: String,
    pub timestamp: NaiveDateTime,
    pub extension: String,
}

impl SnapshotKey {
    pub fn new(table: &str, timestamp: NaiveDateTime, extension: &str) -> Self {
        Self {
            table: table.to_string(),
            timestamp,
            extension: extension.to_string(),
        }
    }

    pub fn to_key(&self) -> String {
        format!(
            "{table}/{date}/{table}_{time}.{ext}",
            table = self.table,
            date = self.timestamp.format("%Y/%m/%d"),
            time = self.timestamp.format("%H:%M:%S"),
            ext = self.extension,
        )
    }

    /// Parses an object key back into its parts. Keys that don't follow the
    /// snapshot convention (for example `dim_design.parquet`) return `None`.
    pub fn parse(key: &str) -> Option<SnapshotKey> {
        let mut parts = key.split('/');
        let table = parts.next()?;
        let year = parts.next()?;
        let month = parts.next()?;
        let day = parts.next()?;
        let file = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let rest = file.strip_prefix(table)?.strip_prefix('_')?;
        let (time, extension) = rest.split_once('.')?;

        let date = NaiveDate::from_ymd_opt(
            year.parse().ok()?,
            month.parse().ok()?,
            day.parse().ok()?,
        )?;
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;

        Some(SnapshotKey {
            table: table.to_string(),
            timestamp: NaiveDateTime::new(date, time),
            extension: extension.to_string(),
        })
    }
}

/// Computes the global watermark from an object listing: the maximum
/// timestamp embedded in any snapshot key, or the epoch sentinel when the
/// area is empty. The watermark is global, not per table.
pub fn watermark_from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> NaiveDateTime {
    keys.into_iter()
        .filter_map(SnapshotKey::parse)
        .map(|k| k.timestamp)
        .max()
        .unwrap_or_else(epoch_watermark)
}

/// Picks the most recent snapshot key for the given table prefix.
pub fn latest_snapshot<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    table: &str,
) -> Option<String> {
    keys.into_iter()
        .filter_map(|k| SnapshotKey::parse(k).map(|parsed| (parsed, k)))
        .filter(|(parsed, _)| parsed.table == table)
        .max_by_key(|(parsed, _)| parsed.timestamp)
        .map(|(_, k)| k.to_string())
}
