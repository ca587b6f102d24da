// mongo-blob-backup/src/backup/window.rs
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::{Map, Value, json};

use crate::errors::{AppError, Result};

/// Document field the dump window is applied to (epoch seconds).
pub const TIMESTAMP_FIELD: &str = "arrival-time";

/// Half-open `[since, before)` range of records selected for a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpWindow {
    since: DateTime<Utc>,
    before: Option<i64>,
}

/// 00:00:00 UTC on the first day of `now`'s month.
///
/// Agency-local midnight would be more accurate, but UTC is what the
/// archives have always been partitioned by.
pub fn start_of_month(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

impl DumpWindow {
    /// Window relative to the current clock.
    pub fn new(since: Option<i64>, before: Option<i64>) -> Result<Self> {
        Self::at(Utc::now(), since, before)
    }

    /// Window relative to `now`; `since` defaults to the start of `now`'s month.
    pub fn at(now: DateTime<Utc>, since: Option<i64>, before: Option<i64>) -> Result<Self> {
        let since = match since {
            Some(stamp) => DateTime::<Utc>::from_timestamp(stamp, 0).ok_or_else(|| {
                AppError::Config(format!("since timestamp {} is out of range", stamp))
            })?,
            None => start_of_month(now).ok_or_else(|| {
                AppError::Config(format!("cannot compute start of month for {}", now))
            })?,
        };

        if let Some(before) = before {
            if since.timestamp() >= before {
                return Err(AppError::Config(format!(
                    "dump window is empty: since {} is not before {}",
                    since.timestamp(),
                    before
                )));
            }
        }

        Ok(DumpWindow { since, before })
    }

    pub fn since(&self) -> i64 {
        self.since.timestamp()
    }

    pub fn before(&self) -> Option<i64> {
        self.before
    }

    /// `<collection>_<YYYY>_<MM>.gz`, keyed by the UTC month of `since`.
    pub fn archive_name(&self, collection: &str) -> String {
        format!("{}_{}.gz", collection, self.since.format("%Y_%m"))
    }

    /// Mongo query selecting the window, e.g. `{"arrival-time": {"$gte": 1709251200}}`.
    pub fn query(&self) -> Value {
        let mut range = Map::new();
        range.insert("$gte".to_string(), json!(self.since()));
        if let Some(before) = self.before {
            range.insert("$lt".to_string(), json!(before));
        }
        let mut query = Map::new();
        query.insert(TIMESTAMP_FIELD.to_string(), Value::Object(range));
        Value::Object(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_window_starts_at_month_start() -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 42, 9).unwrap();
        let window = DumpWindow::at(now, None, None)?;

        assert_eq!(window.since(), 1_709_251_200);
        assert_eq!(window.before(), None);
        assert_eq!(window.archive_name("trip-stops"), "trip-stops_2024_03.gz");
        assert_eq!(
            window.query(),
            json!({"arrival-time": {"$gte": 1_709_251_200i64}})
        );
        Ok(())
    }

    #[test]
    fn test_start_of_month_edges() {
        let first = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(start_of_month(first), Some(first));

        let last_second = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            start_of_month(last_second),
            Some(Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap())
        );

        let leap_day = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        assert_eq!(
            start_of_month(leap_day),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_archive_month_follows_utc_month_of_since() -> anyhow::Result<()> {
        let now = Utc::now();
        let samples = [
            0i64,
            1_672_531_199, // 2022-12-31T23:59:59Z
            1_672_531_200, // 2023-01-01T00:00:00Z
            1_709_251_199,
            1_709_251_200,
            1_719_792_000,
            4_102_444_800,
        ];
        for since in samples {
            let window = DumpWindow::at(now, Some(since), None)?;
            let expected = DateTime::<Utc>::from_timestamp(since, 0).unwrap();
            assert_eq!(
                window.archive_name("trip-stops"),
                format!("trip-stops_{:04}_{:02}.gz", expected.year(), expected.month())
            );
        }
        Ok(())
    }

    #[test]
    fn test_query_includes_upper_bound() -> anyhow::Result<()> {
        let now = Utc::now();
        let window = DumpWindow::at(now, Some(1_700_000_000), Some(1_700_086_400))?;
        assert_eq!(
            window.query(),
            json!({"arrival-time": {"$gte": 1_700_000_000i64, "$lt": 1_700_086_400i64}})
        );
        assert_eq!(window.archive_name("stops"), "stops_2023_11.gz");
        Ok(())
    }

    #[test]
    fn test_empty_window_is_rejected() {
        let now = Utc::now();
        assert!(matches!(
            DumpWindow::at(now, Some(100), Some(100)),
            Err(AppError::Config(_))
        ));
        assert!(DumpWindow::at(now, Some(200), Some(100)).is_err());
        assert!(DumpWindow::at(now, Some(i64::MAX), None).is_err());
    }
}
