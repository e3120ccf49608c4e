//! Conversion between filesystem times and ZIP DOS date-times.
//!
//! ZIP headers store modification times as MS-DOS date-times:
//! - local calendar fields, no time zone (treated as UTC here)
//! - 2-second resolution
//! - years 1980 through 2107
//!
//! Times outside that range are clamped to the nearest representable value
//! when writing, so an entry never fails to compress because of its mtime.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds per day.
const SECS_PER_DAY: i64 = 86_400;

/// Earliest year a DOS date-time can hold.
const DOS_MIN_YEAR: i64 = 1980;

/// Latest year a DOS date-time can hold.
const DOS_MAX_YEAR: i64 = 2107;

/// A modification time with second precision, counted from the Unix epoch.
///
/// # Example
///
/// ```rust
/// use zipmerge::Timestamp;
///
/// let ts = Timestamp::from_unix_secs(1_700_000_000);
/// let dos = ts.to_zip_datetime();
/// assert_eq!(dos.year(), 2023);
/// assert_eq!(Timestamp::from_zip_datetime(&dos).as_unix_secs(), 1_700_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
}

impl Timestamp {
    /// Creates a timestamp from Unix seconds.
    #[inline]
    pub const fn from_unix_secs(secs: i64) -> Self {
        Self { secs }
    }

    /// Creates a timestamp from a `SystemTime`, truncating sub-second precision.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64),
        };
        Self { secs }
    }

    /// Returns the timestamp as Unix seconds.
    #[inline]
    pub const fn as_unix_secs(&self) -> i64 {
        self.secs
    }

    /// Converts to a `filetime::FileTime` for restoring mtimes on disk.
    pub fn as_filetime(&self) -> filetime::FileTime {
        filetime::FileTime::from_unix_time(self.secs, 0)
    }

    /// Converts to a ZIP DOS date-time, clamping to the representable range.
    ///
    /// Odd seconds are rounded down to match the DOS encoding.
    pub fn to_zip_datetime(&self) -> zip::DateTime {
        let days = self.secs.div_euclid(SECS_PER_DAY);
        let rem = self.secs.rem_euclid(SECS_PER_DAY);
        let (year, month, day) = civil_from_days(days);

        if year < DOS_MIN_YEAR {
            return zip::DateTime::default();
        }
        if year > DOS_MAX_YEAR {
            return zip::DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58)
                .unwrap_or_default();
        }

        let hour = (rem / 3600) as u8;
        let minute = ((rem % 3600) / 60) as u8;
        let second = ((rem % 60) as u8) & !1;
        zip::DateTime::from_date_and_time(year as u16, month, day, hour, minute, second)
            .unwrap_or_default()
    }

    /// Converts a ZIP DOS date-time back to a timestamp.
    pub fn from_zip_datetime(datetime: &zip::DateTime) -> Self {
        let days = days_from_civil(
            i64::from(datetime.year()),
            datetime.month(),
            datetime.day(),
        );
        let secs = days * SECS_PER_DAY
            + i64::from(datetime.hour()) * 3600
            + i64::from(datetime.minute()) * 60
            + i64::from(datetime.second());
        Self { secs }
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: u8, day: u8) -> i64 {
    let month = i64::from(month);
    let day = i64::from(day);
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Proleptic Gregorian date for a count of days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
