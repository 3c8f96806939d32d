use crate::db::ActivityRow;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// Time window selectable from the activity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    All,
    Today,
    Week,
    Month,
}

impl TimeWindow {
    /// Unknown selectors fall back to `All`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "today" => TimeWindow::Today,
            "week" => TimeWindow::Week,
            "month" => TimeWindow::Month,
            _ => TimeWindow::All,
        }
    }
}

/// Which timestamp of an activity is matched against the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// The caller-supplied "occurred on" timestamp.
    #[default]
    Date,
    /// The server-assigned write time.
    CreatedAt,
}

impl FilterField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "date" => Some(FilterField::Date),
            "created_at" | "createdat" | "created" => Some(FilterField::CreatedAt),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterField::Date => "date",
            FilterField::CreatedAt => "created_at",
        }
    }

    fn pick(self, activity: &ActivityRow) -> i64 {
        match self {
            FilterField::Date => activity.date,
            FilterField::CreatedAt => activity.created_at,
        }
    }
}

/// Keeps the activities whose `field` falls inside `window` as seen from `now`.
///
/// Day, week and month boundaries are taken in `now`'s time zone. Weeks start
/// on Monday. Both ends of every window are inclusive. Input order is kept.
pub fn filter_activities<Tz: TimeZone>(
    activities: &[ActivityRow],
    window: TimeWindow,
    field: FilterField,
    now: &DateTime<Tz>,
) -> Vec<ActivityRow> {
    let Some((start, end)) = window_bounds(window, now.date_naive()) else {
        return activities.to_vec();
    };

    let zone = now.timezone();

    activities
        .iter()
        .filter(|activity| {
            local_date(&zone, field.pick(activity))
                .is_some_and(|date| start <= date && date <= end)
        })
        .cloned()
        .collect()
}

fn window_bounds(window: TimeWindow, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    match window {
        TimeWindow::All => None,
        TimeWindow::Today => Some((today, today)),
        TimeWindow::Week => {
            let monday =
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            Some((monday, monday + Duration::days(6)))
        }
        TimeWindow::Month => {
            let first = today.with_day(1)?;
            let next_first = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
            };
            Some((first, next_first.pred_opt()?))
        }
    }
}

fn local_date<Tz: TimeZone>(zone: &Tz, timestamp_ms: i64) -> Option<NaiveDate> {
    zone.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|datetime| datetime.date_naive())
}

#[cfg(test)]
mod tests {
    use super::{FilterField, TimeWindow, filter_activities};
    use crate::db::ActivityRow;
    use chrono::{DateTime, FixedOffset, TimeZone};

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("offset")
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        zone()
            .with_ymd_and_hms(y, m, d, h, min, s)
            .single()
            .expect("valid datetime")
    }

    fn activity(id: i64, date: i64, created_at: i64) -> ActivityRow {
        ActivityRow {
            id,
            text: format!("activity {id}"),
            date,
            created_at,
            updated_at: created_at,
        }
    }

    fn ids(rows: &[ActivityRow]) -> Vec<i64> {
        rows.iter().map(|row| row.id).collect()
    }

    // Wednesday 2026-02-18 14:00 +09:00
    fn now() -> DateTime<FixedOffset> {
        at(2026, 2, 18, 14, 0, 0)
    }

    #[test]
    fn all_is_identity_in_input_order() {
        let rows = vec![
            activity(3, 0, 0),
            activity(1, at(2026, 2, 18, 1, 0, 0).timestamp_millis(), 0),
            activity(2, i64::MAX / 2, 0),
        ];

        let filtered = filter_activities(&rows, TimeWindow::All, FilterField::Date, &now());
        assert_eq!(filtered, rows);
    }

    #[test]
    fn today_keeps_same_local_calendar_day() {
        let rows = vec![
            activity(1, at(2026, 2, 18, 0, 0, 0).timestamp_millis(), 0),
            activity(2, at(2026, 2, 18, 23, 59, 59).timestamp_millis() + 999, 0),
            activity(3, at(2026, 2, 17, 23, 59, 59).timestamp_millis(), 0),
            activity(4, at(2026, 2, 19, 0, 0, 0).timestamp_millis(), 0),
        ];

        let filtered = filter_activities(&rows, TimeWindow::Today, FilterField::Date, &now());
        assert_eq!(ids(&filtered), vec![1, 2]);
    }

    #[test]
    fn week_starts_on_monday_and_includes_both_boundaries() {
        let rows = vec![
            activity(1, at(2026, 2, 16, 0, 0, 0).timestamp_millis(), 0),
            activity(2, at(2026, 2, 22, 23, 59, 59).timestamp_millis() + 999, 0),
            activity(3, at(2026, 2, 15, 23, 59, 59).timestamp_millis() + 999, 0),
            activity(4, at(2026, 2, 23, 0, 0, 0).timestamp_millis(), 0),
        ];

        let filtered = filter_activities(&rows, TimeWindow::Week, FilterField::Date, &now());
        assert_eq!(ids(&filtered), vec![1, 2]);
    }

    #[test]
    fn week_on_sunday_reaches_back_to_monday() {
        let sunday = at(2026, 2, 22, 20, 0, 0);
        let rows = vec![
            activity(1, at(2026, 2, 16, 9, 0, 0).timestamp_millis(), 0),
            activity(2, at(2026, 2, 23, 9, 0, 0).timestamp_millis(), 0),
        ];

        let filtered = filter_activities(&rows, TimeWindow::Week, FilterField::Date, &sunday);
        assert_eq!(ids(&filtered), vec![1]);
    }

    #[test]
    fn month_covers_first_through_last_day() {
        let rows = vec![
            activity(1, at(2026, 2, 1, 0, 0, 0).timestamp_millis(), 0),
            activity(2, at(2026, 2, 28, 23, 59, 59).timestamp_millis() + 999, 0),
            activity(3, at(2026, 1, 31, 23, 59, 59).timestamp_millis(), 0),
            activity(4, at(2026, 3, 1, 0, 0, 0).timestamp_millis(), 0),
        ];

        let filtered = filter_activities(&rows, TimeWindow::Month, FilterField::Date, &now());
        assert_eq!(ids(&filtered), vec![1, 2]);
    }

    #[test]
    fn december_month_window_rolls_into_next_year() {
        let new_years_eve = at(2026, 12, 31, 10, 0, 0);
        let rows = vec![
            activity(1, at(2026, 12, 31, 23, 0, 0).timestamp_millis(), 0),
            activity(2, at(2027, 1, 1, 0, 0, 0).timestamp_millis(), 0),
        ];

        let filtered =
            filter_activities(&rows, TimeWindow::Month, FilterField::Date, &new_years_eve);
        assert_eq!(ids(&filtered), vec![1]);
    }

    #[test]
    fn boundaries_follow_the_clock_time_zone() {
        // 2026-02-17 16:00 UTC is already 2026-02-18 01:00 at +09:00.
        let timestamp = chrono::Utc
            .with_ymd_and_hms(2026, 2, 17, 16, 0, 0)
            .single()
            .expect("valid")
            .timestamp_millis();
        let rows = vec![activity(1, timestamp, 0)];

        let filtered = filter_activities(&rows, TimeWindow::Today, FilterField::Date, &now());
        assert_eq!(ids(&filtered), vec![1]);
    }

    #[test]
    fn filter_field_selects_which_timestamp_is_matched() {
        let today = at(2026, 2, 18, 9, 0, 0).timestamp_millis();
        let last_year = at(2025, 2, 18, 9, 0, 0).timestamp_millis();
        let rows = vec![activity(1, last_year, today), activity(2, today, last_year)];

        let by_date = filter_activities(&rows, TimeWindow::Today, FilterField::Date, &now());
        let by_created =
            filter_activities(&rows, TimeWindow::Today, FilterField::CreatedAt, &now());

        assert_eq!(ids(&by_date), vec![2]);
        assert_eq!(ids(&by_created), vec![1]);
    }

    #[test]
    fn unknown_selector_falls_back_to_all() {
        assert_eq!(TimeWindow::parse("fortnight"), TimeWindow::All);
        assert_eq!(TimeWindow::parse(" Week "), TimeWindow::Week);
        assert_eq!(TimeWindow::parse(""), TimeWindow::All);
    }
}
