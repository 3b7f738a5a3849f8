use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use shared::briefing::BriefingEdition;
use shared::timezone::USER_TIME_ZONE;

/// The two briefing triggers, evaluated in America/Lima.
pub struct BriefingSchedule {
    morning: Schedule,
    evening: Schedule,
    zone: Tz,
}

impl BriefingSchedule {
    pub fn new(morning_expr: &str, evening_expr: &str) -> Result<Self, cron::error::Error> {
        Ok(Self {
            morning: Schedule::from_str(morning_expr)?,
            evening: Schedule::from_str(evening_expr)?,
            zone: USER_TIME_ZONE,
        })
    }

    /// Earliest upcoming fire across both jobs, as a UTC instant.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, BriefingEdition)> {
        let after_local = after.with_timezone(&self.zone);

        let morning = self
            .morning
            .after(&after_local)
            .next()
            .map(|at| (at.with_timezone(&Utc), BriefingEdition::Matutino));
        let evening = self
            .evening
            .after(&after_local)
            .next()
            .map(|at| (at.with_timezone(&Utc), BriefingEdition::Nocturno));

        match (morning, evening) {
            (Some(morning), Some(evening)) => {
                Some(if morning.0 <= evening.0 { morning } else { evening })
            }
            (fire, None) | (None, fire) => fire,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike, Utc};
    use shared::briefing::BriefingEdition;
    use shared::timezone::USER_TIME_ZONE;

    use super::BriefingSchedule;

    fn schedule() -> BriefingSchedule {
        BriefingSchedule::new("0 0 6 * * *", "0 0 18 * * *").expect("valid cron expressions")
    }

    #[test]
    fn morning_fires_at_six_lima() {
        // 08:00 UTC is 03:00 in Lima; the next trigger is 06:00 Lima.
        let after = Utc.with_ymd_and_hms(2026, 2, 4, 8, 0, 0).single().expect("valid");
        let (fire, edition) = schedule().next_fire(after).expect("upcoming fire");
        assert_eq!(edition, BriefingEdition::Matutino);

        let local = fire.with_timezone(&USER_TIME_ZONE);
        assert_eq!(local.hour(), 6);
        assert_eq!(local.date_naive().to_string(), "2026-02-04");
    }

    #[test]
    fn evening_comes_before_next_morning() {
        // 17:00 UTC is 12:00 in Lima; 18:00 Lima beats 06:00 tomorrow.
        let after = Utc.with_ymd_and_hms(2026, 2, 4, 17, 0, 0).single().expect("valid");
        let (fire, edition) = schedule().next_fire(after).expect("upcoming fire");
        assert_eq!(edition, BriefingEdition::Nocturno);
        assert_eq!(fire.with_timezone(&USER_TIME_ZONE).hour(), 18);
    }
}
