//! Civil-date recurrence and DST-aware wall-clock resolution.
//!
//! A recurring event is anchored to a civil (month, day) pair in a user's
//! timezone, not to an absolute instant. This module turns that civil
//! anchor into both the civil date used for dedup identity and the UTC
//! instant used for delivery timing, handling the DST edge cases spec §4.C
//! calls out explicitly.

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// How far forward to search for a valid wall-clock instant across a DST
/// spring-forward gap before giving up. Gaps observed in IANA tz data are at
/// most two hours (double-DST transitions); this gives headroom.
const GAP_SEARCH_LIMIT_MINUTES: i64 = 4 * 60;

/// The civil occurrence date for `anchor` in `year`, or `None` if the
/// anchor is February 29th and `year` is not a leap year.
///
/// Per the open question this spec leaves unresolved, a Feb-29 anchor is
/// simply not materialized in non-leap years rather than shifted to Feb 28
/// or Mar 1 — no occurrence record is created for that user that year.
#[must_use]
pub fn civil_occurrence_date(anchor: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, anchor.month(), anchor.day())
}

/// Resolve a civil date plus a configured wall-clock hour/minute into a UTC
/// instant, in `tz`.
///
/// - **Unambiguous**: the obvious instant.
/// - **Gap** (spring-forward skips this wall time): the first valid instant
///   at or after the configured wall time.
/// - **Ambiguous** (fall-back repeats this wall time): the earlier of the
///   two UTC instants, so the message fires at the first occurrence of that
///   wall clock reading rather than waiting for the repeat.
#[must_use]
pub fn resolve_wall_clock(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> DateTime<Utc> {
    let wall_time = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid hour/minute");
    let naive = date.and_time(wall_time);

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _latest) => earliest.with_timezone(&Utc),
        LocalResult::None => resolve_gap(naive, tz),
    }
}

/// Step forward minute by minute past a DST gap until a valid local instant
/// is found, returning its UTC equivalent.
fn resolve_gap(mut naive: chrono::NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    for _ in 0..GAP_SEARCH_LIMIT_MINUTES {
        naive += chrono::Duration::minutes(1);
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => continue,
        }
    }
    // Exhausted the search window; this would mean a pathological tz
    // database entry. Fall back to a naive UTC interpretation rather than
    // panicking.
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feb_29_anchor_absent_in_non_leap_year() {
        let anchor = NaiveDate::from_ymd_opt(2000, 2, 29).unwrap();
        assert_eq!(civil_occurrence_date(anchor, 2000), Some(anchor));
        assert_eq!(civil_occurrence_date(anchor, 2001), None);
        assert_eq!(
            civil_occurrence_date(anchor, 2004),
            NaiveDate::from_ymd_opt(2004, 2, 29)
        );
    }

    #[test]
    fn ordinary_anchor_recurs_every_year() {
        let anchor = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(
            civil_occurrence_date(anchor, 2026),
            NaiveDate::from_ymd_opt(2026, 6, 15)
        );
    }

    #[test]
    fn unambiguous_wall_clock_resolves_directly() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 26).unwrap();
        let dt = resolve_wall_clock(date, 9, 0, chrono_tz::America::New_York);
        assert_eq!(dt.with_timezone(&chrono_tz::America::New_York).hour(), 9);
    }

    #[test]
    fn spring_forward_gap_resolves_to_first_valid_instant() {
        // 2026-03-08 America/New_York: clocks jump 02:00 -> 03:00.
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let dt = resolve_wall_clock(date, 2, 30, chrono_tz::America::New_York);
        let local = dt.with_timezone(&chrono_tz::America::New_York);
        assert!(local.hour() >= 3);
    }

    #[test]
    fn fall_back_ambiguity_resolves_to_earlier_instant() {
        // 2026-11-01 America/New_York: 01:30 occurs twice.
        let date = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        let dt = resolve_wall_clock(date, 1, 30, chrono_tz::America::New_York);
        let later_offset_dt = chrono_tz::America::New_York
            .from_local_datetime(&date.and_hms_opt(1, 30, 0).unwrap());
        if let LocalResult::Ambiguous(earliest, latest) = later_offset_dt {
            assert_eq!(dt, earliest.with_timezone(&Utc));
            assert!(earliest.with_timezone(&Utc) < latest.with_timezone(&Utc));
        }
    }
}
