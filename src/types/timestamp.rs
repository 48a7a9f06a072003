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

use std::fmt::Display;
use std::fmt::Formatter;

use chrono::DateTime;
use chrono::Duration;
use chrono::FixedOffset;
use chrono::Local;
use chrono::SecondsFormat;
use chrono::TimeZone;
use chrono::Utc;
use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

/// An instant in time, stored in UTC.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse an RFC 3339 string. Nothing else is accepted.
    pub fn parse(s: &str) -> Fallible<Self> {
        let ts = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(ts.with_timezone(&Utc)))
    }

    /// Lossless RFC 3339 rendering (sub-second digits are kept).
    pub fn to_rfc3339(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn plus(self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }

    pub fn plus_minutes(self, minutes: i64) -> Self {
        self.plus(Duration::minutes(minutes))
    }

    pub fn plus_days(self, days: i64) -> Self {
        self.plus(Duration::days(days))
    }

    /// Whole days elapsed from `earlier` to `self`, floored at zero.
    pub fn days_since(self, earlier: Timestamp) -> i64 {
        (self.0 - earlier.0).num_days().max(0)
    }

    /// Signed seconds from `self` until `later`.
    pub fn seconds_until(self, later: Timestamp) -> i64 {
        (later.0 - self.0).num_seconds()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        Timestamp::parse(&string).map_err(|e| D::Error::custom(e.message().to_string()))
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
        Timestamp::parse(&string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// The wall-clock hour at which the daily new-card allowance resets.
///
/// With no offset, the hour is interpreted in the machine's local time zone.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DayBoundary {
    hour: u32,
    offset: Option<FixedOffset>,
}

impl DayBoundary {
    pub fn local(hour: u32) -> Fallible<Self> {
        if hour > 23 {
            return fail(format!("invalid reset hour: {hour}"));
        }
        Ok(Self { hour, offset: None })
    }

    pub fn fixed(hour: u32, offset: FixedOffset) -> Fallible<Self> {
        let mut boundary = Self::local(hour)?;
        boundary.offset = Some(offset);
        Ok(boundary)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// The first instant strictly after `now` at which the wall clock reads
    /// `hour:00:00`.
    pub fn next_after(&self, now: Timestamp) -> Fallible<Timestamp> {
        match self.offset {
            Some(offset) => next_boundary(now, &offset, self.hour),
            None => next_boundary(now, &Local, self.hour),
        }
    }
}

fn next_boundary<Tz: TimeZone>(now: Timestamp, tz: &Tz, hour: u32) -> Fallible<Timestamp> {
    let mut date = now.0.with_timezone(tz).date_naive();
    // Three candidate days cover a DST gap swallowing the boundary hour.
    for _ in 0..3 {
        let naive = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| ErrorReport::new(format!("invalid reset hour: {hour}")))?;
        if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now.0 {
                return Ok(Timestamp(candidate));
            }
        }
        date = date
            .succ_opt()
            .ok_or_else(|| ErrorReport::new("date out of range"))?;
    }
    fail("could not compute the next day boundary")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_rfc3339_round_trip_keeps_nanoseconds() -> Fallible<()> {
        let original = Timestamp::new(Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap());
        let parsed = Timestamp::parse(&original.to_rfc3339())?;
        assert_eq!(parsed, original);
        Ok(())
    }

    #[test]
    fn test_deserialize_rejects_numbers() {
        let result: Result<Timestamp, _> = serde_json::from_str("1700000000");
        assert!(result.is_err());
        let result: Result<Timestamp, _> = serde_json::from_str("\"2024-01-01\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_days_since() {
        let a = ts("2024-01-01T12:00:00Z");
        let b = ts("2024-01-04T11:00:00Z");
        assert_eq!(b.days_since(a), 2);
        assert_eq!(a.days_since(b), 0);
    }

    #[test]
    fn test_next_boundary_same_day() -> Fallible<()> {
        let boundary = DayBoundary::fixed(4, FixedOffset::east_opt(0).unwrap())?;
        let next = boundary.next_after(ts("2024-03-10T01:30:00Z"))?;
        assert_eq!(next, ts("2024-03-10T04:00:00Z"));
        Ok(())
    }

    #[test]
    fn test_next_boundary_is_strictly_after() -> Fallible<()> {
        let boundary = DayBoundary::fixed(4, FixedOffset::east_opt(0).unwrap())?;
        let next = boundary.next_after(ts("2024-03-10T04:00:00Z"))?;
        assert_eq!(next, ts("2024-03-11T04:00:00Z"));
        Ok(())
    }

    #[test]
    fn test_next_boundary_respects_offset() -> Fallible<()> {
        // 04:00 at UTC+9 is 19:00 UTC the previous day.
        let boundary = DayBoundary::fixed(4, FixedOffset::east_opt(9 * 3600).unwrap())?;
        let next = boundary.next_after(ts("2024-03-10T12:00:00Z"))?;
        assert_eq!(next, ts("2024-03-10T19:00:00Z"));
        Ok(())
    }

    #[test]
    fn test_local_boundary_is_in_the_future() -> Fallible<()> {
        let now = Timestamp::now();
        let next = DayBoundary::local(4)?.next_after(now)?;
        assert!(next > now);
        assert!(now.seconds_until(next) <= 25 * 3600);
        Ok(())
    }

    #[test]
    fn test_invalid_hour() {
        assert!(DayBoundary::local(24).is_err());
    }
}
