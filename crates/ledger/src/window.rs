//! Calendar-day reporting windows.

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use hotelstock_core::{DomainError, DomainResult, ValueObject};

/// A closed range of calendar days, interpreted in a fixed report timezone.
///
/// `start()` is the first day at 00:00 local time and `end_exclusive()` the
/// local midnight after the last day, both as UTC instants. Membership is
/// half-open so consecutive windows share no instant and miss none. `end()`
/// is the last displayed millisecond (23:59:59.999).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    from: NaiveDate,
    to: NaiveDate,
    offset: FixedOffset,
    start: DateTime<Utc>,
    end_exclusive: DateTime<Utc>,
}

impl ValueObject for ReportWindow {}

impl ReportWindow {
    pub fn new(from: NaiveDate, to: NaiveDate, offset: FixedOffset) -> DomainResult<Self> {
        if from > to {
            return Err(DomainError::validation(format!(
                "report window starts after it ends ({from} > {to})"
            )));
        }
        let start = local_midnight(offset, from)?;
        let after = to
            .checked_add_days(Days::new(1))
            .ok_or_else(|| DomainError::validation("report window out of range"))?;
        let end_exclusive = local_midnight(offset, after)?;
        Ok(Self {
            from,
            to,
            offset,
            start,
            end_exclusive,
        })
    }

    /// Parse request bounds. Both are required; each is `YYYY-MM-DD` or an
    /// RFC 3339 timestamp (reduced to its calendar day in `offset`).
    pub fn parse(from: Option<&str>, to: Option<&str>, offset: FixedOffset) -> DomainResult<Self> {
        let from = parse_day(required(from, "from")?, offset)?;
        let to = parse_day(required(to, "to")?, offset)?;
        Self::new(from, to, offset)
    }

    /// A single-day window.
    pub fn day(date: NaiveDate, offset: FixedOffset) -> DomainResult<Self> {
        Self::new(date, date, offset)
    }

    pub fn from_date(&self) -> NaiveDate {
        self.from
    }

    pub fn to_date(&self) -> NaiveDate {
        self.to
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end_exclusive - Duration::milliseconds(1)
    }

    pub fn end_exclusive(&self) -> DateTime<Utc> {
        self.end_exclusive
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end_exclusive
    }

    /// Calendar day of an instant in the window's timezone.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Number of calendar days covered (at least 1).
    pub fn day_count(&self) -> u64 {
        (self.to - self.from).num_days() as u64 + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.from.iter_days().take(self.day_count() as usize)
    }

    /// The window that starts the day after this one ends and lasts `days` days.
    pub fn following(&self, days: u64) -> DomainResult<Self> {
        let days = days.max(1);
        let from = self
            .to
            .checked_add_days(Days::new(1))
            .ok_or_else(|| DomainError::validation("report window out of range"))?;
        let to = from
            .checked_add_days(Days::new(days - 1))
            .ok_or_else(|| DomainError::validation("report window out of range"))?;
        Self::new(from, to, self.offset)
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> DomainResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DomainError::validation(format!("'{field}' date is required"))),
    }
}

fn parse_day(raw: &str, offset: FixedOffset) -> DomainResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&offset).date_naive())
        .map_err(|_| DomainError::validation(format!("malformed date '{raw}' (expected YYYY-MM-DD)")))
}

fn local_midnight(offset: FixedOffset, date: NaiveDate) -> DomainResult<DateTime<Utc>> {
    let naive: NaiveDateTime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DomainError::validation(format!("invalid time of day on {date}")))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DomainError::validation(format!("ambiguous local time on {date}")))
}
