// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::DateTime;
use chrono::Duration;
use chrono::SecondsFormat;
use chrono::Utc;
use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Serialize;

/// `9999-12-31T23:59:59Z` as a Unix timestamp.
const LATEST_SECONDS: i64 = 253_402_300_799;

const SECONDS_PER_DAY: i64 = 86_400;

/// A UTC instant.
///
/// Stored as fixed-width RFC 3339 text so that comparing the stored strings
/// orders them chronologically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    #[cfg(test)]
    pub fn new(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Add a number of 24-hour days. Stops at the last whole day that keeps
    /// the year at four digits, since later instants have no fixed-width
    /// text form.
    pub fn plus_days(self, days: u32) -> Self {
        let room = (LATEST_SECONDS - self.0.timestamp()).max(0) / SECONDS_PER_DAY;
        let days = i64::from(days).min(room);
        let ts = self
            .0
            .checked_add_signed(Duration::days(days))
            .unwrap_or(self.0);
        Self(ts)
    }

    pub fn to_rfc3339(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_rfc3339()))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        let ts =
            DateTime::parse_from_rfc3339(&string).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        let ts = ts.with_timezone(&Utc);
        Ok(Timestamp(ts))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_plus_days() {
        let ts = Timestamp::new(Utc.with_ymd_and_hms(2025, 3, 29, 12, 30, 0).unwrap());
        let later = ts.plus_days(6);
        assert_eq!(
            later.into_inner(),
            Utc.with_ymd_and_hms(2025, 4, 4, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_plus_days_stays_within_year_9999() {
        let ts = Timestamp::new(Utc.with_ymd_and_hms(9999, 12, 30, 9, 0, 0).unwrap());
        assert_eq!(
            ts.plus_days(1).into_inner(),
            Utc.with_ymd_and_hms(9999, 12, 31, 9, 0, 0).unwrap()
        );
        assert_eq!(ts.plus_days(2).into_inner(), ts.plus_days(1).into_inner());
        assert_eq!(ts.plus_days(u32::MAX), ts.plus_days(1));

        let ts = Timestamp::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let latest = ts.plus_days(u32::MAX);
        assert_eq!(
            latest.into_inner(),
            Utc.with_ymd_and_hms(9999, 12, 31, 9, 0, 0).unwrap()
        );
        assert_eq!(latest.to_rfc3339(), "9999-12-31T09:00:00.000000Z");
    }

    #[test]
    fn test_plus_days_past_the_end() {
        let ts = Timestamp::new(DateTime::<Utc>::MAX_UTC);
        assert_eq!(ts.plus_days(1), ts);
    }

    #[test]
    fn test_text_form_is_fixed_width() {
        let a = Timestamp::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let b = Timestamp::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(500),
        );
        assert_eq!(a.to_rfc3339(), "2025-01-01T00:00:00.000000Z");
        assert_eq!(a.to_rfc3339().len(), b.to_rfc3339().len());
        assert!(a.to_rfc3339() < b.to_rfc3339());
    }
}
