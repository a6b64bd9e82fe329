//! A time zone with one daylight saving switch in each direction, for tests
//! that need local times that are skipped or repeated.
//!
//! Offset is +00:00 until 2024-03-11 10:00 UTC, then +01:00 until
//! 2024-03-12 10:00 UTC, then +00:00 again. Local 10:00-10:59 on Monday
//! 2024-03-11 does not exist; on Tuesday 2024-03-12 it happens twice.

use chrono::{FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone};

#[derive(Debug, Clone, Copy)]
pub struct DaylightZone;

fn standard() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

fn summer() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

fn utc_at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

impl TimeZone for DaylightZone {
    type Offset = FixedOffset;

    fn from_offset(_offset: &FixedOffset) -> Self {
        DaylightZone
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
        self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
        // Earlier instant first, which is the one with the larger offset.
        let fits: Vec<FixedOffset> = [summer(), standard()]
            .into_iter()
            .filter(|offset| {
                let utc = *local - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
                self.offset_from_utc_datetime(&utc) == *offset
            })
            .collect();
        match fits.as_slice() {
            [] => LocalResult::None,
            [one] => LocalResult::Single(*one),
            [first, second, ..] => LocalResult::Ambiguous(*first, *second),
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
        self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
        if *utc >= utc_at(11) && *utc < utc_at(12) {
            summer()
        } else {
            standard()
        }
    }
}
