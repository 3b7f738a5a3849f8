use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use regex::Regex;

use crate::timezone::weekday_index;

const MONTHS: [(&str, u32); 12] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

// lunes = 0 .. domingo = 6, matching `timezone::weekday_index`.
const WEEKDAYS: [(&str, u32); 9] = [
    ("lunes", 0),
    ("martes", 1),
    ("miércoles", 2),
    ("miercoles", 2),
    ("jueves", 3),
    ("viernes", 4),
    ("sábado", 5),
    ("sabado", 5),
    ("domingo", 6),
];

static RE_TEXT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s+de\s+(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)\s+del?\s+(\d{4})")
        .expect("valid text date regex")
});
static RE_SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("valid slash date regex"));
static RE_ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("valid iso date regex"));
static RE_SHORT_TEXT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s+de\s+(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)\b")
        .expect("valid short text date regex")
});
static RE_SHORT_SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").expect("valid short slash regex"));

static RE_TIME_CONTEXTUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:a\s+las?\s+)?(\d{1,2})\s+de\s+la\s+(mañana|tarde|noche)")
        .expect("valid contextual time regex")
});
static RE_TIME_24H: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("valid 24h time regex"));
static RE_TIME_AMPM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*(am|pm)\b").expect("valid am/pm time regex"));
static RE_TIME_SIMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"a\s+las?\s+(\d{1,2})\b").expect("valid simple time regex"));

/// Date resolution ladder, highest precedence first: explicit full dates,
/// relative words, weekday names, and (only for inputs under 50 chars) a
/// year-less fallback parse.
pub fn resolve_date(text_lower: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = explicit_date(text_lower) {
        return Some(date);
    }
    if let Some(date) = relative_date(text_lower, reference) {
        return Some(date);
    }
    if let Some(date) = weekday_date(text_lower, reference) {
        return Some(date);
    }
    if text_lower.chars().count() < 50 {
        return fuzzy_date(text_lower, reference);
    }
    None
}

fn explicit_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = RE_TEXT_DATE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    if let Some(caps) = RE_SLASH_DATE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    if let Some(caps) = RE_ISO_DATE.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    None
}

fn relative_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    // "de la mañana" is a time of day, not tomorrow.
    let scrubbed = text.replace("de la mañana", "");
    if scrubbed.contains("pasado mañana") {
        return reference.checked_add_days(Days::new(2));
    }
    if scrubbed.contains("hoy") {
        return Some(reference);
    }
    if scrubbed.contains("mañana") {
        return reference.checked_add_days(Days::new(1));
    }
    None
}

fn weekday_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    for (name, target) in WEEKDAYS {
        if text.contains(name) {
            let mut ahead = (target + 7 - weekday_index(reference)) % 7;
            if ahead == 0 {
                // Same-day mention means next week.
                ahead = 7;
            }
            return reference.checked_add_days(Days::new(u64::from(ahead)));
        }
    }
    None
}

/// Year-less forms roll into next year once the date has passed.
fn fuzzy_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let (day, month) = if let Some(caps) = RE_SHORT_TEXT_DATE.captures(text) {
        (caps[1].parse::<u32>().ok()?, month_number(&caps[2])?)
    } else if let Some(caps) = RE_SHORT_SLASH_DATE.captures(text) {
        (caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?)
    } else {
        return None;
    };

    let this_year = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if this_year < reference {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// Time resolution ladder: colloquial day-part forms, 24-hour, am/pm, and a
/// bare "a las N" heuristic where 1-6 reads as afternoon.
pub fn resolve_time(text_lower: &str) -> Option<NaiveTime> {
    if let Some(caps) = RE_TIME_CONTEXTUAL.captures(text_lower) {
        if let Ok(hour) = caps[1].parse::<u32>() {
            if (1..=12).contains(&hour) {
                let adjusted = match &caps[2] {
                    "tarde" | "noche" if hour < 12 => hour + 12,
                    _ => hour % 24,
                };
                if let Some(time) = NaiveTime::from_hms_opt(adjusted, 0, 0) {
                    return Some(time);
                }
            }
        }
    }

    if let Some(caps) = RE_TIME_24H.captures(text_lower) {
        let hour = caps[1].parse::<u32>().ok()?;
        let minute = caps[2].parse::<u32>().ok()?;
        if let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) {
            return Some(time);
        }
    }

    if let Some(caps) = RE_TIME_AMPM.captures(text_lower) {
        if let Ok(hour) = caps[1].parse::<u32>() {
            if (1..=12).contains(&hour) {
                let adjusted = if &caps[2] == "pm" && hour < 12 {
                    hour + 12
                } else {
                    hour % 24
                };
                if let Some(time) = NaiveTime::from_hms_opt(adjusted % 24, 0, 0) {
                    return Some(time);
                }
            }
        }
    }

    if let Some(caps) = RE_TIME_SIMPLE.captures(text_lower) {
        if let Ok(hour) = caps[1].parse::<u32>() {
            if (1..=12).contains(&hour) {
                let adjusted = if (1..=6).contains(&hour) { hour + 12 } else { hour };
                if let Some(time) = NaiveTime::from_hms_opt(adjusted, 0, 0) {
                    return Some(time);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{resolve_date, resolve_time};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn explicit_text_date_wins_over_relative_words() {
        let resolved = resolve_date("mañana no, el 31 de enero del 2026", date(2026, 1, 10));
        assert_eq!(resolved, Some(date(2026, 1, 31)));
    }

    #[test]
    fn slash_and_iso_dates_parse() {
        assert_eq!(
            resolve_date("cita el 05/03/2026 confirmada", date(2026, 1, 10)),
            Some(date(2026, 3, 5))
        );
        assert_eq!(
            resolve_date("entrega 2026-03-05 sin falta", date(2026, 1, 10)),
            Some(date(2026, 3, 5))
        );
    }

    #[test]
    fn tomorrow_and_day_after_tomorrow() {
        assert_eq!(
            resolve_date("recuérdame mañana", date(2026, 2, 4)),
            Some(date(2026, 2, 5))
        );
        assert_eq!(
            resolve_date("pasado mañana temprano", date(2026, 2, 4)),
            Some(date(2026, 2, 6))
        );
    }

    #[test]
    fn morning_time_of_day_is_not_tomorrow() {
        // "a las 6 de la mañana" must not shift the date.
        assert_eq!(
            resolve_date("hoy a las 6 de la mañana", date(2026, 2, 4)),
            Some(date(2026, 2, 4))
        );
    }

    #[test]
    fn weekday_resolves_to_next_strict_occurrence() {
        // 2026-02-04 is a Wednesday; "viernes" is two days out.
        assert_eq!(
            resolve_date("nos vemos el viernes", date(2026, 2, 4)),
            Some(date(2026, 2, 6))
        );
        // Same weekday maps to +7, never 0.
        assert_eq!(
            resolve_date("el miércoles otra vez", date(2026, 2, 4)),
            Some(date(2026, 2, 11))
        );
    }

    #[test]
    fn fuzzy_parse_only_for_short_inputs() {
        assert_eq!(
            resolve_date("cita el 15 de enero", date(2026, 2, 4)),
            Some(date(2027, 1, 15))
        );
        let long = "este texto es deliberadamente mucho más largo que cincuenta caracteres y menciona el 15 de enero al final";
        assert_eq!(resolve_date(long, date(2026, 2, 4)), None);
    }

    #[test]
    fn colloquial_afternoon_adds_twelve() {
        assert_eq!(
            resolve_time("a las 5 de la tarde"),
            NaiveTime::from_hms_opt(17, 0, 0)
        );
        assert_eq!(
            resolve_time("8 de la noche"),
            NaiveTime::from_hms_opt(20, 0, 0)
        );
        assert_eq!(
            resolve_time("6 de la mañana"),
            NaiveTime::from_hms_opt(6, 0, 0)
        );
    }

    #[test]
    fn twenty_four_hour_and_ampm_forms() {
        assert_eq!(resolve_time("a las 17:30"), NaiveTime::from_hms_opt(17, 30, 0));
        assert_eq!(resolve_time("2pm en punto"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(resolve_time("11 am"), NaiveTime::from_hms_opt(11, 0, 0));
    }

    #[test]
    fn bare_hour_uses_afternoon_heuristic() {
        assert_eq!(resolve_time("a las 5"), NaiveTime::from_hms_opt(17, 0, 0));
        assert_eq!(resolve_time("a las 9"), NaiveTime::from_hms_opt(9, 0, 0));
    }

    #[test]
    fn resolution_is_stable_under_whitespace_noise() {
        let reference = date(2026, 2, 4);
        let a = resolve_date("reunión  el   viernes", reference);
        let b = resolve_date("reunión el viernes", reference);
        assert_eq!(a, b);
    }
}
