use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Trading phase of the exchange at a given instant.
///
/// `Weekend` and `Holiday` are reported instead of `Closed` on non-trading
/// days so that skip reasons in execution records stay meaningful.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketSession {
    /// Pre-market window (before the regular open)
    #[serde(rename = "pre_market")]
    PreMarket,

    /// Regular trading session
    #[serde(rename = "regular")]
    Regular,

    /// Post-market window (after the regular close)
    #[serde(rename = "post_market")]
    PostMarket,

    /// Trading day, but outside all session windows
    #[serde(rename = "closed")]
    Closed,

    /// Saturday or Sunday (checked before the holiday table)
    #[serde(rename = "weekend")]
    Weekend,

    /// Exchange holiday on a weekday
    #[serde(rename = "holiday")]
    Holiday,
}

impl std::fmt::Display for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketSession::PreMarket => write!(f, "pre_market"),
            MarketSession::Regular => write!(f, "regular"),
            MarketSession::PostMarket => write!(f, "post_market"),
            MarketSession::Closed => write!(f, "closed"),
            MarketSession::Weekend => write!(f, "weekend"),
            MarketSession::Holiday => write!(f, "holiday"),
        }
    }
}

/// Market state snapshot captured alongside every history append and
/// reported by the scheduler status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    /// Session at capture time
    pub session: MarketSession,

    /// True iff the regular session was in progress
    pub is_open: bool,

    /// Next regular-session open after `as_of`
    pub next_open: Option<DateTime<Utc>>,

    /// Next regular-session close after `as_of`
    pub next_close: Option<DateTime<Utc>>,

    /// When the snapshot was taken
    pub as_of: DateTime<Utc>,
}

/// Immutable trading-calendar rule: exchange timezone as a fixed UTC offset,
/// session boundary times in exchange-local wall clock, trading weekdays, and
/// a holiday date set.
///
/// The fixed offset is a deliberate simplification: DST shifts the UTC
/// position of the session for part of the year, which is tolerable for
/// gating jobs on 5-minute cadences. Loaded once at startup and shared.
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    utc_offset: FixedOffset,
    pre_open: NaiveTime,
    regular_open: NaiveTime,
    regular_close: NaiveTime,
    post_close: NaiveTime,
    trading_weekdays: HashSet<Weekday>,
    holidays: HashSet<NaiveDate>,
}

/// Observed US exchange holidays. Extend when the horizon runs out.
const US_HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2024
    (2024, 1, 1),   // New Year's Day
    (2024, 1, 15),  // MLK Day
    (2024, 2, 19),  // Presidents' Day
    (2024, 3, 29),  // Good Friday
    (2024, 5, 27),  // Memorial Day
    (2024, 6, 19),  // Juneteenth
    (2024, 7, 4),   // Independence Day
    (2024, 9, 2),   // Labor Day
    (2024, 11, 28), // Thanksgiving
    (2024, 12, 25), // Christmas
    // 2025
    (2025, 1, 1),   // New Year's Day
    (2025, 1, 20),  // MLK Day
    (2025, 2, 17),  // Presidents' Day
    (2025, 4, 18),  // Good Friday
    (2025, 5, 26),  // Memorial Day
    (2025, 6, 19),  // Juneteenth
    (2025, 7, 4),   // Independence Day
    (2025, 9, 1),   // Labor Day
    (2025, 11, 27), // Thanksgiving
    (2025, 12, 25), // Christmas
    // 2026
    (2026, 1, 1),   // New Year's Day
    (2026, 1, 19),  // MLK Day
    (2026, 2, 16),  // Presidents' Day
    (2026, 4, 3),   // Good Friday
    (2026, 5, 25),  // Memorial Day
    (2026, 6, 19),  // Juneteenth
    (2026, 7, 3),   // Independence Day (observed, July 4 falls on Saturday)
    (2026, 9, 7),   // Labor Day
    (2026, 11, 26), // Thanksgiving
    (2026, 12, 25), // Christmas
    // 2027
    (2027, 1, 1),   // New Year's Day
    (2027, 1, 18),  // MLK Day
    (2027, 2, 15),  // Presidents' Day
    (2027, 3, 26),  // Good Friday
    (2027, 5, 31),  // Memorial Day
    (2027, 6, 18),  // Juneteenth (observed, June 19 falls on Saturday)
    (2027, 7, 5),   // Independence Day (observed, July 4 falls on Sunday)
    (2027, 9, 6),   // Labor Day
    (2027, 11, 25), // Thanksgiving
    (2027, 12, 24), // Christmas (observed, December 25 falls on Saturday)
];

impl TradingCalendar {
    /// US equities calendar: Eastern Time as UTC-5, pre-market 04:00,
    /// regular 09:30 to 16:00, post-market until 20:00, Monday to Friday,
    /// builtin holiday table.
    pub fn us_equities() -> Self {
        Self {
            utc_offset: FixedOffset::west_opt(5 * 3600).expect("valid offset"),
            pre_open: NaiveTime::from_hms_opt(4, 0, 0).expect("valid time"),
            regular_open: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
            regular_close: NaiveTime::from_hms_opt(16, 0, 0).expect("valid time"),
            post_close: NaiveTime::from_hms_opt(20, 0, 0).expect("valid time"),
            trading_weekdays: HashSet::from([
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]),
            holidays: US_HOLIDAYS
                .iter()
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
                .collect(),
        }
    }

    /// Around-the-clock calendar: every day is a trading day and the regular
    /// session spans the whole day. Used for 24/7 venues.
    pub fn always_open() -> Self {
        let end_of_day =
            NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).expect("valid time");
        Self {
            utc_offset: FixedOffset::east_opt(0).expect("valid offset"),
            pre_open: NaiveTime::MIN,
            regular_open: NaiveTime::MIN,
            regular_close: end_of_day,
            post_close: end_of_day,
            trading_weekdays: HashSet::from([
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]),
            holidays: HashSet::new(),
        }
    }

    /// Calendar with explicit session boundaries, for venues with other
    /// hours and for tests.
    pub fn with_sessions(
        utc_offset: FixedOffset,
        pre_open: NaiveTime,
        regular_open: NaiveTime,
        regular_close: NaiveTime,
        post_close: NaiveTime,
    ) -> Self {
        Self {
            utc_offset,
            pre_open,
            regular_open,
            regular_close,
            post_close,
            ..Self::us_equities()
        }
    }

    /// Add holiday dates on top of the builtin table.
    pub fn with_extra_holidays(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(dates);
        self
    }

    /// Override the UTC offset (minutes east of UTC; negative is west).
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        if let Some(offset) = FixedOffset::east_opt(minutes * 60) {
            self.utc_offset = offset;
        }
        self
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    pub fn pre_open(&self) -> NaiveTime {
        self.pre_open
    }

    pub fn regular_open(&self) -> NaiveTime {
        self.regular_open
    }

    pub fn regular_close(&self) -> NaiveTime {
        self.regular_close
    }

    pub fn post_close(&self) -> NaiveTime {
        self.post_close
    }

    /// Exchange-local wall clock for a UTC instant.
    pub fn to_local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.utc_offset)
    }

    pub fn is_trading_weekday(&self, weekday: Weekday) -> bool {
        self.trading_weekdays.contains(&weekday)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Full trading day: a trading weekday that is not in the holiday table.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.is_trading_weekday(date.weekday()) && !self.is_holiday(date)
    }

    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }
}
