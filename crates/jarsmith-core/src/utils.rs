//! Utility functions for jarsmith-core

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use zip::DateTime as ZipDateTime;

/// Convert a filesystem timestamp into a zip (DOS) timestamp.
///
/// DOS timestamps are evaluated in UTC here so the same file produces the
/// same archive bytes on every machine. Times outside 1980..=2107 clamp to
/// the DOS epoch.
pub fn zip_time_from_system(time: SystemTime) -> ZipDateTime {
    let utc: DateTime<Utc> = time.into();
    let (Ok(year), Ok(month), Ok(day), Ok(hour), Ok(minute), Ok(second)) = (
        u16::try_from(utc.year()),
        u8::try_from(utc.month()),
        u8::try_from(utc.day()),
        u8::try_from(utc.hour()),
        u8::try_from(utc.minute()),
        u8::try_from(utc.second()),
    ) else {
        return ZipDateTime::default();
    };
    ZipDateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default()
}

/// Convert a zip (DOS) timestamp back to a filesystem timestamp, if valid.
pub fn system_time_from_zip(time: ZipDateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?
    .and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )?;
    Some(naive.and_utc().into())
}

/// The earliest instant a DOS timestamp can hold, 1980-01-01 00:00:00 UTC
pub fn dos_epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(DOS_EPOCH_UNIX_SECS)
}

const DOS_EPOCH_UNIX_SECS: u64 = 315_532_800;

/// Modification time of a path, if the platform reports one
pub fn modified_time<P: AsRef<Path>>(path: P) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether the path names a zip-compatible archive by extension
pub fn is_archive_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}
