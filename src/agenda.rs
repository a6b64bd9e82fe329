//! Appointment slot generation.

use crate::settings::Agenda as AgendaCfg;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// Slot start instants for `days` consecutive calendar days from `first_day`,
/// weekdays only, between the configured opening and closing hours in `tz`.
pub fn slot_instants<Tz: TimeZone>(
    tz: &Tz,
    first_day: NaiveDate,
    days: u32,
    cfg: &AgendaCfg,
) -> Vec<DateTime<Utc>> {
    let mut slots = Vec::new();
    let step = i64::from(cfg.slot_minutes);
    let open = i64::from(cfg.day_start_hour) * 60;
    let close = i64::from(cfg.day_end_hour) * 60;

    for offset in 0..i64::from(days) {
        let day = first_day + Duration::days(offset);
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }

        let mut minute = open;
        while minute < close {
            let local = NaiveTime::from_num_seconds_from_midnight_opt((minute * 60) as u32, 0)
                .map(|time| day.and_time(time));
            // Times inside a DST gap have no instant; skip them.
            if let Some(dt) = local.and_then(|l| tz.from_local_datetime(&l).earliest()) {
                slots.push(dt.with_timezone(&Utc));
            }
            minute += step;
        }
    }

    slots
}

/// First day new slots may be generated for: today, or the day after the
/// latest existing slot, whichever is later.
pub fn next_open_day<Tz: TimeZone>(tz: &Tz, today: NaiveDate, latest_slot: Option<i64>) -> NaiveDate {
    let after_latest = latest_slot
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.with_timezone(tz).date_naive() + Duration::days(1));

    match after_latest {
        Some(day) if day > today => day,
        _ => today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_zone::DaylightZone;
    use chrono::{FixedOffset, Timelike};

    fn cfg() -> AgendaCfg {
        AgendaCfg {
            slot_minutes: 30,
            day_start_hour: 8,
            day_end_hour: 17,
        }
    }

    #[test]
    fn test_weekday_has_eighteen_half_hour_slots() {
        // 2024-03-11 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let slots = slot_instants(&Utc, monday, 1, &cfg());

        assert_eq!(slots.len(), 18);
        assert_eq!(slots[0].hour(), 8);
        assert_eq!(slots[0].minute(), 0);
        let last = slots.last().unwrap();
        assert_eq!((last.hour(), last.minute()), (16, 30));
    }

    #[test]
    fn test_weekends_are_skipped() {
        // Friday through Monday
        let friday = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let slots = slot_instants(&Utc, friday, 4, &cfg());

        assert_eq!(slots.len(), 36);
        assert!(slots
            .iter()
            .all(|s| !matches!(s.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn test_slots_are_local_times() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let slots = slot_instants(&tz, monday, 1, &cfg());

        // 08:00 at +01:00 is 07:00 UTC
        assert_eq!(slots[0].hour(), 7);
    }

    #[test]
    fn test_slots_inside_clock_change_gap_are_dropped() {
        // Monday 2024-03-11: local 10:00 and 10:30 do not exist
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let slots = slot_instants(&DaylightZone, monday, 1, &cfg());

        assert_eq!(slots.len(), 16);
        let local: Vec<(u32, u32)> = slots
            .iter()
            .map(|s| {
                let l = s.with_timezone(&DaylightZone);
                (l.hour(), l.minute())
            })
            .collect();
        assert!(local.contains(&(9, 30)));
        assert!(!local.contains(&(10, 0)));
        assert!(!local.contains(&(10, 30)));
        assert!(local.contains(&(11, 0)));
    }

    #[test]
    fn test_repeated_slots_use_first_occurrence() {
        // Tuesday 2024-03-12: local 10:00 and 10:30 happen twice
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        let slots = slot_instants(&DaylightZone, tuesday, 1, &cfg());

        assert_eq!(slots.len(), 18);
        assert!(slots.contains(&Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap()));
        assert!(slots.contains(&Utc.with_ymd_and_hms(2024, 3, 12, 9, 30, 0).unwrap()));
        // 11:00 local is after the switch back, UTC+0
        assert!(slots.contains(&Utc.with_ymd_and_hms(2024, 3, 12, 11, 0, 0).unwrap()));
        let mut unique = slots.clone();
        unique.dedup();
        assert_eq!(unique.len(), slots.len());
    }

    #[test]
    fn test_next_open_day() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        assert_eq!(next_open_day(&Utc, today, None), today);

        let past = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap().timestamp();
        assert_eq!(next_open_day(&Utc, today, Some(past)), today);

        let future = Utc.with_ymd_and_hms(2024, 3, 15, 16, 30, 0).unwrap().timestamp();
        assert_eq!(
            next_open_day(&Utc, today, Some(future)),
            NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()
        );
    }
}
