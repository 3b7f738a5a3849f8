use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::America::Lima;
use chrono_tz::Tz;

/// All user-facing wall-clock logic runs in America/Lima (UTC-05:00, no DST).
pub const USER_TIME_ZONE: Tz = Lima;

pub fn now_local() -> DateTime<Tz> {
    Utc::now().with_timezone(&Lima)
}

pub fn local_date(now_utc: DateTime<Utc>) -> NaiveDate {
    now_utc.with_timezone(&Lima).date_naive()
}

/// Renders a local naive datetime with the Lima offset attached,
/// e.g. `2026-02-05T17:00:00-05:00`.
pub fn local_iso(local: NaiveDateTime) -> String {
    match Lima.from_local_datetime(&local).single() {
        Some(stamped) => stamped.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        // Lima has no DST gaps; the fallback keeps the formatter total anyway.
        None => format!("{}-05:00", local.format("%Y-%m-%dT%H:%M:%S")),
    }
}

pub fn combine_local(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    Lima.from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// UTC instant of the end of the given local day (exclusive upper bound).
pub fn local_day_end_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    let next = date.checked_add_days(Days::new(1))?;
    combine_local(next, NaiveTime::MIN)
}

/// Weekday index in the Spanish convention used across the extractor:
/// lunes = 0 .. domingo = 6.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use super::{combine_local, local_date, local_day_end_utc, local_iso, weekday_index};

    #[test]
    fn local_iso_carries_lima_offset() {
        let local = NaiveDate::from_ymd_opt(2026, 2, 5)
            .expect("valid date")
            .and_hms_opt(17, 0, 0)
            .expect("valid time");
        assert_eq!(local_iso(local), "2026-02-05T17:00:00-05:00");
    }

    #[test]
    fn local_date_shifts_utc_midnight_back_a_day() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 5, 3, 0, 0)
            .single()
            .expect("valid utc datetime");
        assert_eq!(local_date(now).to_string(), "2026-02-04");
    }

    #[test]
    fn combine_local_converts_to_utc() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 5).expect("valid date");
        let time = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
        let utc = combine_local(date, time).expect("lima has no gaps");
        assert_eq!(utc.to_rfc3339(), "2026-02-05T14:00:00+00:00");
    }

    #[test]
    fn day_end_is_next_local_midnight() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 5).expect("valid date");
        let end = local_day_end_utc(date).expect("bound");
        assert_eq!(end.to_rfc3339(), "2026-02-06T05:00:00+00:00");
    }

    #[test]
    fn weekday_index_is_monday_based() {
        // 2026-02-04 is a Wednesday.
        let date = NaiveDate::from_ymd_opt(2026, 2, 4).expect("valid date");
        assert_eq!(weekday_index(date), 2);
    }
}
