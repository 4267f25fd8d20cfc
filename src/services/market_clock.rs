use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{JobType, MarketContext, MarketSession, TradingCalendar};

/// How far ahead next_open/next_close search before giving up. Covers a full
/// year of consecutive non-trading days.
const HORIZON_DAYS: i64 = 370;

/// Outcome of the pre-run market gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Market state allows the job to run
    Run,

    /// Outside the regular session; the tick resolves to Skipped
    Skip { session: MarketSession },

    /// Calendar could not answer; recorded as a skip reason, never raised
    Error(String),
}

/// Session arithmetic over a loaded trading calendar.
///
/// Every answer derives from the calendar alone; the clock performs no I/O
/// and holds no mutable state.
#[derive(Clone)]
pub struct MarketClock {
    calendar: TradingCalendar,
}

impl MarketClock {
    pub fn new(calendar: TradingCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Classify an instant. Total: every instant maps to exactly one session.
    ///
    /// Non-trading days report `Weekend` or `Holiday` rather than `Closed`,
    /// with the weekend check first, so a holiday falling on a Saturday still
    /// reads as a weekend.
    pub fn session(&self, at: DateTime<Utc>) -> MarketSession {
        let local = self.calendar.to_local(at);
        let date = local.date_naive();
        let time = local.time();

        if !self.calendar.is_trading_weekday(date.weekday()) {
            return MarketSession::Weekend;
        }
        if self.calendar.is_holiday(date) {
            return MarketSession::Holiday;
        }

        // Half-open windows: the opening instant belongs to the session,
        // the closing instant does not.
        if time >= self.calendar.regular_open() && time < self.calendar.regular_close() {
            MarketSession::Regular
        } else if time >= self.calendar.pre_open() && time < self.calendar.regular_open() {
            MarketSession::PreMarket
        } else if time >= self.calendar.regular_close() && time < self.calendar.post_close() {
            MarketSession::PostMarket
        } else {
            MarketSession::Closed
        }
    }

    /// True only during the regular session.
    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        self.session(at) == MarketSession::Regular
    }

    /// Decide whether a job may run at this instant. Maintenance jobs always
    /// run; analysis jobs run only during the regular session.
    pub fn gate(&self, at: DateTime<Utc>, job_type: JobType) -> GateDecision {
        if job_type == JobType::Maintenance {
            return GateDecision::Run;
        }

        match self.session(at) {
            MarketSession::Regular => GateDecision::Run,
            session => match self.next_open(at) {
                Some(_) => GateDecision::Skip { session },
                None => GateDecision::Error(format!(
                    "no trading session within {} days of {}",
                    HORIZON_DAYS, at
                )),
            },
        }
    }

    /// Next instant the regular session opens, strictly after `at`.
    /// None when no trading day exists within the search horizon.
    pub fn next_open(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_boundary(at, self.calendar.regular_open())
    }

    /// Next instant the regular session closes, strictly after `at`.
    pub fn next_close(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_boundary(at, self.calendar.regular_close())
    }

    /// Market snapshot attached to history entries and the status endpoint.
    pub fn context(&self, at: DateTime<Utc>) -> MarketContext {
        let session = self.session(at);
        MarketContext {
            session,
            is_open: session == MarketSession::Regular,
            next_open: self.next_open(at),
            next_close: self.next_close(at),
            as_of: at,
        }
    }

    /// Walk forward day by day, skipping weekends and holidays, and return
    /// the first occurrence of `time_of_day` after `at`.
    fn next_boundary(&self, at: DateTime<Utc>, time_of_day: NaiveTime) -> Option<DateTime<Utc>> {
        let mut date = self.calendar.to_local(at).date_naive();

        for _ in 0..HORIZON_DAYS {
            if self.calendar.is_trading_day(date) {
                if let Some(candidate) = self.at_local(date, time_of_day) {
                    if candidate > at {
                        return Some(candidate);
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }

    fn at_local(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.calendar
            .utc_offset()
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, NaiveDate};

    fn clock() -> MarketClock {
        MarketClock::new(TradingCalendar::us_equities())
    }

    /// Build a UTC instant from Eastern wall-clock time.
    fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_sessions_through_a_trading_day() {
        let clock = clock();
        // Tuesday 2025-01-07
        assert_eq!(clock.session(et(2025, 1, 7, 2, 0)), MarketSession::Closed);
        assert_eq!(clock.session(et(2025, 1, 7, 5, 0)), MarketSession::PreMarket);
        assert_eq!(clock.session(et(2025, 1, 7, 12, 0)), MarketSession::Regular);
        assert_eq!(clock.session(et(2025, 1, 7, 17, 0)), MarketSession::PostMarket);
        assert_eq!(clock.session(et(2025, 1, 7, 21, 0)), MarketSession::Closed);
    }

    #[test]
    fn test_session_boundaries_are_half_open() {
        let clock = clock();
        // Open instant belongs to the session
        assert_eq!(clock.session(et(2025, 1, 7, 9, 30)), MarketSession::Regular);
        assert!(clock.is_open(et(2025, 1, 7, 9, 30)));
        // Close instant does not
        assert_eq!(clock.session(et(2025, 1, 7, 16, 0)), MarketSession::PostMarket);
        assert!(!clock.is_open(et(2025, 1, 7, 16, 0)));
        // Same at the pre-market and post-market edges
        assert_eq!(clock.session(et(2025, 1, 7, 4, 0)), MarketSession::PreMarket);
        assert_eq!(clock.session(et(2025, 1, 7, 20, 0)), MarketSession::Closed);
    }

    #[test]
    fn test_weekends_and_holidays() {
        let clock = clock();
        // Saturday / Sunday
        assert_eq!(clock.session(et(2025, 1, 4, 12, 0)), MarketSession::Weekend);
        assert_eq!(clock.session(et(2025, 1, 5, 12, 0)), MarketSession::Weekend);
        // New Year's Day 2025 (Wednesday)
        assert_eq!(clock.session(et(2025, 1, 1, 12, 0)), MarketSession::Holiday);
    }

    #[test]
    fn test_weekend_wins_over_holiday() {
        // A holiday placed on a Saturday still reads as a weekend
        let calendar = TradingCalendar::us_equities()
            .with_extra_holidays([NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()]);
        let clock = MarketClock::new(calendar);
        assert_eq!(clock.session(et(2025, 1, 4, 12, 0)), MarketSession::Weekend);
    }

    #[test]
    fn test_next_open_skips_weekend() {
        let clock = clock();
        // Friday 2025-01-03 after close -> Monday 2025-01-06 09:30 ET
        let next = clock.next_open(et(2025, 1, 3, 17, 0)).unwrap();
        assert_eq!(next, et(2025, 1, 6, 9, 30));
        assert_eq!(clock.session(next), MarketSession::Regular);
    }

    #[test]
    fn test_next_open_skips_holiday() {
        let clock = clock();
        // 2024-12-24 evening -> Christmas skipped -> 2024-12-26 09:30 ET
        let next = clock.next_open(et(2024, 12, 24, 17, 0)).unwrap();
        assert_eq!(next, et(2024, 12, 26, 9, 30));
    }

    #[test]
    fn test_next_close_during_session_is_today() {
        let clock = clock();
        let next = clock.next_close(et(2025, 1, 7, 12, 0)).unwrap();
        assert_eq!(next, et(2025, 1, 7, 16, 0));
    }

    #[test]
    fn test_next_open_is_strictly_after() {
        let clock = clock();
        // At the open instant, the next open is the following trading day
        let next = clock.next_open(et(2025, 1, 7, 9, 30)).unwrap();
        assert_eq!(next, et(2025, 1, 8, 9, 30));
    }

    #[test]
    fn test_gate_lets_maintenance_through_when_closed() {
        let clock = clock();
        let closed = et(2025, 1, 4, 12, 0);
        assert_eq!(clock.gate(closed, JobType::Maintenance), GateDecision::Run);
        assert_eq!(
            clock.gate(closed, JobType::Analysis),
            GateDecision::Skip {
                session: MarketSession::Weekend
            }
        );
    }

    #[test]
    fn test_gate_runs_analysis_while_open() {
        let clock = clock();
        assert_eq!(
            clock.gate(et(2025, 1, 7, 12, 0), JobType::Analysis),
            GateDecision::Run
        );
    }

    #[test]
    fn test_gate_reports_error_when_calendar_has_no_trading_days() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let dark_year = (0..400).map(|i| start + Duration::days(i));
        let clock = MarketClock::new(TradingCalendar::us_equities().with_extra_holidays(dark_year));

        match clock.gate(et(2025, 1, 7, 12, 0), JobType::Analysis) {
            GateDecision::Error(reason) => assert!(reason.contains("no trading session")),
            other => panic!("expected gate error, got {:?}", other),
        }
    }

    #[test]
    fn test_always_open_calendar_is_always_regular() {
        let clock = MarketClock::new(TradingCalendar::always_open());
        assert!(clock.is_open(et(2025, 1, 4, 3, 0)));
        assert!(clock.is_open(et(2025, 1, 1, 12, 0)));
        assert_eq!(clock.gate(et(2025, 1, 5, 0, 0), JobType::Analysis), GateDecision::Run);
        // Last second of the day still falls inside the regular session.
        let end_of_day = Utc.with_ymd_and_hms(2025, 1, 4, 23, 59, 59).unwrap();
        assert!(clock.is_open(end_of_day));
    }

    #[test]
    fn test_custom_session_calendar_gates_by_its_own_hours() {
        // Central-time venue trading 08:30 to 15:00
        let offset = FixedOffset::west_opt(6 * 3600).unwrap();
        let calendar = TradingCalendar::with_sessions(
            offset,
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        );
        let clock = MarketClock::new(calendar);

        // Tuesday 2025-01-07, Central wall-clock time
        let ct = |h: u32, min: u32| {
            offset
                .with_ymd_and_hms(2025, 1, 7, h, min, 0)
                .unwrap()
                .with_timezone(&Utc)
        };

        assert_eq!(clock.session(ct(7, 30)), MarketSession::PreMarket);
        assert_eq!(clock.session(ct(8, 30)), MarketSession::Regular);
        assert_eq!(clock.session(ct(14, 59)), MarketSession::Regular);
        assert_eq!(clock.session(ct(15, 0)), MarketSession::PostMarket);
        assert_eq!(clock.session(ct(19, 0)), MarketSession::Closed);
        assert_eq!(clock.gate(ct(12, 0), JobType::Analysis), GateDecision::Run);
        assert_eq!(clock.next_close(ct(12, 0)).unwrap(), ct(15, 0));

        // Weekday mask and the builtin holiday table carry over.
        let new_years = offset
            .with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(clock.session(new_years), MarketSession::Holiday);
    }

    #[test]
    fn test_context_snapshot_is_consistent() {
        let clock = clock();
        let at = et(2025, 1, 7, 12, 0);
        let context = clock.context(at);
        assert_eq!(context.session, MarketSession::Regular);
        assert!(context.is_open);
        assert_eq!(context.as_of, at);
        assert_eq!(context.next_close.unwrap(), et(2025, 1, 7, 16, 0));
        assert!(context.next_open.unwrap() > at);
    }
}
