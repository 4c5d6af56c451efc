//! Trading calendar and the scan window derived from it.
//!
//! A run scans the filings accepted between 09:30 local time on the most recent trading
//! day before the invocation date and 09:00 local time on the following calendar day.
//! The end day need not be a trading day: a Friday window ends Saturday 09:00.
//!
//! ```text
//!   trading day T                      T + 1 day
//!   ──────┬────────────────────────────────┬──────
//!       09:30 ─────── window ──────────▶ 09:00
//!   [start                                  end)
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use super::error::{Result, ScanError};

/// How far back the resolver looks for a trading day before giving up.
pub const MAX_LOOKBACK_DAYS: u32 = 14;

const WINDOW_START: (u32, u32) = (9, 30);
const WINDOW_END: (u32, u32) = (9, 0);

/// Weekends plus an injectable set of holiday dates.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn is_trading_day(&self, day: NaiveDate) -> bool {
        !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&day)
    }

    /// Returns the most recent trading day strictly before `day`.
    ///
    /// # Errors
    ///
    /// `ScanError::Configuration` when no trading day exists within
    /// [`MAX_LOOKBACK_DAYS`], which only happens with a malformed holiday list.
    pub fn previous_trading_day(&self, day: NaiveDate) -> Result<NaiveDate> {
        let mut candidate = day;
        for _ in 0..MAX_LOOKBACK_DAYS {
            candidate = candidate.pred_opt().ok_or_else(|| {
                ScanError::Configuration(format!("no calendar day before {day}"))
            })?;
            if self.is_trading_day(candidate) {
                return Ok(candidate);
            }
        }
        Err(ScanError::Configuration(format!(
            "no trading day within {MAX_LOOKBACK_DAYS} days before {day}; check the holiday list"
        )))
    }
}

/// Half-open interval `[start, end)` a filing's acceptance instant must fall in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWindow {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    trading_day: NaiveDate,
}

impl ScanWindow {
    /// Computes the window for an invocation at `now`.
    pub fn resolve(now: DateTime<Utc>, calendar: &TradingCalendar, tz: Tz) -> Result<Self> {
        let today = now.with_timezone(&tz).date_naive();
        let trading_day = calendar.previous_trading_day(today)?;
        Self::for_trading_day(trading_day, tz)
    }

    /// Builds the window that starts on `trading_day`, without consulting a calendar.
    pub fn for_trading_day(trading_day: NaiveDate, tz: Tz) -> Result<Self> {
        let end_day = trading_day.succ_opt().ok_or_else(|| {
            ScanError::Configuration(format!("no calendar day after {trading_day}"))
        })?;
        let start = local_instant(tz, trading_day, WINDOW_START)?;
        let end = local_instant(tz, end_day, WINDOW_END)?;
        Ok(Self {
            start,
            end,
            trading_day,
        })
    }

    pub fn start(&self) -> &DateTime<Tz> {
        &self.start
    }

    pub fn end(&self) -> &DateTime<Tz> {
        &self.end
    }

    pub fn time_zone(&self) -> Tz {
        self.start.timezone()
    }

    /// The trading day the window starts in.
    pub fn trading_day(&self) -> NaiveDate {
        self.trading_day
    }

    /// The calendar day the window ends in.
    pub fn end_day(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Calendar days whose daily index can hold filings accepted inside the window.
    pub fn index_days(&self) -> Vec<NaiveDate> {
        let mut days = vec![self.trading_day];
        if self.end_day() != self.trading_day {
            days.push(self.end_day());
        }
        days
    }

    /// `start <= instant < end`.
    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        *instant >= self.start && *instant < self.end
    }
}

fn local_instant(tz: Tz, day: NaiveDate, (hour, minute): (u32, u32)) -> Result<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| ScanError::Configuration(format!("invalid time {hour}:{minute}")))?;
    match tz.from_local_datetime(&day.and_time(time)) {
        LocalResult::Single(instant) => Ok(instant),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(ScanError::Configuration(format!(
            "{day} {time} does not exist in {tz}"
        ))),
    }
}
