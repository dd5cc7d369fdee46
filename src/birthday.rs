use crate::config::CalendarConfig;
use crate::model::TreeNode;
use crate::people::{PersonDirectory, for_each_person};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})[.\-/\s](\d{1,2})[.\-/\s](\d{4}|[xX]{4})$").unwrap());
static ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());

pub const MONTH_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    /// `"07 Mar"`.
    pub fn label(self) -> String {
        let month = MONTH_SHORT.get(self.month as usize - 1).copied().unwrap_or_default();
        format!("{:02} {month}", self.day)
    }

    /// The date this birthday is observed on in `year`. Feb 29 falls on
    /// Mar 1 outside leap years.
    pub fn in_year(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            (self.month == 2 && self.day == 29)
                .then(|| NaiveDate::from_ymd_opt(year, 3, 1))
                .flatten()
        })
    }
}

/// Parses `DD/MM/YYYY` (also `-`, `.` or space separated, `XXXX` for an
/// unknown year) or ISO `YYYY-MM-DD`. The day is checked against the
/// month length of the given year.
pub fn parse_birthday(raw: &str, unknown_year: i32) -> Option<MonthDay> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    let (year, month, day) = if let Some(caps) = DAY_FIRST.captures(text) {
        let year = if caps[3].eq_ignore_ascii_case("xxxx") {
            unknown_year
        } else {
            caps[3].parse().ok()?
        };
        (year, caps[2].parse().ok()?, caps[1].parse().ok()?)
    } else if let Some(caps) = ISO.captures(text) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(year, month, day)?;
    Some(MonthDay { month, day })
}

/// Birthdays grouped by month (index 0 is January), then day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BirthdayCalendar {
    pub months: Vec<BTreeMap<u32, Vec<String>>>,
}

impl BirthdayCalendar {
    pub fn on(&self, month: u32, day: u32) -> &[String] {
        self.months
            .get(month.wrapping_sub(1) as usize)
            .and_then(|days| days.get(&day))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.months.iter().flat_map(BTreeMap::values).map(Vec::len).sum()
    }
}

pub fn month_buckets(directory: &PersonDirectory, config: &CalendarConfig) -> BirthdayCalendar {
    let excluded: HashSet<String> = config.excluded_names.iter().map(|name| name.trim().to_lowercase()).collect();
    let mut months = vec![BTreeMap::new(); 12];
    for entry in directory.iter() {
        if excluded.contains(&entry.name.to_lowercase()) {
            continue;
        }
        let Some(date) = parse_birthday(&entry.birthday, config.unknown_year) else {
            continue;
        };
        let days: &mut BTreeMap<u32, Vec<String>> = &mut months[date.month as usize - 1];
        days.entry(date.day).or_default().push(entry.name.clone());
    }
    BirthdayCalendar { months }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBirthday {
    pub name: String,
    pub birthday: String,
    pub image: String,
    pub days_away: i64,
    pub label: String,
}

/// Next birthday for `date` on or after `today`.
fn next_occurrence(date: MonthDay, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = date.in_year(today.year())?;
    if this_year >= today {
        return Some(this_year);
    }
    date.in_year(today.year() + 1)
}

/// Everyone in the tree whose next birthday is at most `window_days` after
/// `today`. A name seen more than once keeps its closest date. Sorted by
/// distance, then name.
pub fn upcoming_birthdays(
    tree: &TreeNode,
    today: NaiveDate,
    window_days: u32,
    config: &CalendarConfig,
) -> Vec<UpcomingBirthday> {
    let mut closest: HashMap<String, UpcomingBirthday> = HashMap::new();
    for_each_person(tree, &mut |visit| {
        let person = visit.person;
        if person.name.is_empty() {
            return;
        }
        let Some(date) = parse_birthday(&person.birthday, config.unknown_year) else {
            return;
        };
        let Some(next) = next_occurrence(date, today) else {
            return;
        };
        let days_away = (next - today).num_days();
        if days_away > i64::from(window_days) {
            return;
        }
        let keep = closest
            .get(&person.name)
            .is_none_or(|existing| days_away < existing.days_away);
        if keep {
            closest.insert(
                person.name.clone(),
                UpcomingBirthday {
                    name: person.name.clone(),
                    birthday: person.birthday.clone(),
                    image: person.image.clone(),
                    days_away,
                    label: date.label(),
                },
            );
        }
    });
    let mut upcoming: Vec<UpcomingBirthday> = closest.into_values().collect();
    upcoming.sort_by(|a, b| a.days_away.cmp(&b.days_away).then_with(|| a.name.cmp(&b.name)));
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::people::build_directory;
    use crate::schema::TreeDocument;
    use serde_json::json;

    fn md(month: u32, day: u32) -> Option<MonthDay> {
        Some(MonthDay { month, day })
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_day_first_and_iso_formats() {
        assert_eq!(parse_birthday("07/03/1980", 2000), md(3, 7));
        assert_eq!(parse_birthday("7-3-1980", 2000), md(3, 7));
        assert_eq!(parse_birthday("07.03.1980", 2000), md(3, 7));
        assert_eq!(parse_birthday("07 03 1980", 2000), md(3, 7));
        assert_eq!(parse_birthday(" 1980-03-07 ", 2000), md(3, 7));
        assert_eq!(parse_birthday("", 2000), None);
        assert_eq!(parse_birthday("March 7", 2000), None);
        assert_eq!(parse_birthday("1980/03/07", 2000), None);
    }

    #[test]
    fn validates_month_length_and_leap_years() {
        assert_eq!(parse_birthday("29/02/1984", 2000), md(2, 29));
        assert_eq!(parse_birthday("29/02/1983", 2000), None);
        assert_eq!(parse_birthday("31/04/1990", 2000), None);
        assert_eq!(parse_birthday("01/13/1990", 2000), None);
        assert_eq!(parse_birthday("00/01/1990", 2000), None);
        assert_eq!(parse_birthday("29/02/XXXX", 2000), md(2, 29));
        assert_eq!(parse_birthday("29/02/xxxx", 2001), None);
    }

    #[test]
    fn labels_use_short_month_names() {
        assert_eq!(MonthDay { month: 3, day: 7 }.label(), "07 Mar");
        assert_eq!(MonthDay { month: 12, day: 25 }.label(), "25 Dec");
    }

    #[test]
    fn leap_day_falls_on_march_first() {
        let leap = MonthDay { month: 2, day: 29 };
        assert_eq!(leap.in_year(2023), Some(date(2023, 3, 1)));
        assert_eq!(leap.in_year(2024), Some(date(2024, 2, 29)));
        assert_eq!(next_occurrence(leap, date(2023, 2, 25)), Some(date(2023, 3, 1)));
        assert_eq!(next_occurrence(leap, date(2023, 3, 2)), Some(date(2024, 2, 29)));
        assert_eq!(next_occurrence(leap, date(2024, 3, 1)), Some(date(2025, 3, 1)));
        assert_eq!(next_occurrence(MonthDay { month: 1, day: 2 }, date(2023, 12, 30)), Some(date(2024, 1, 2)));
    }

    fn family() -> TreeNode {
        let doc = TreeDocument::from_value(json!({
            "name": "Maria", "birthday": "15/03/1960",
            "spouse": {"name": "George", "birthday": "10/03/1958"},
            "children": [
                {"name": "Elena", "birthday": "1990-03-12"},
                {"name": "Ion", "birthday": "bad"},
                {"name": "Elena", "birthday": "20/03/1992"}
            ]
        }))
        .unwrap();
        normalize(&doc).unwrap()
    }

    #[test]
    fn upcoming_window_dedupes_and_sorts() {
        let config = CalendarConfig::default();
        let upcoming = upcoming_birthdays(&family(), date(2024, 3, 10), 10, &config);
        let names: Vec<(&str, i64)> = upcoming.iter().map(|u| (u.name.as_str(), u.days_away)).collect();
        assert_eq!(names, vec![("George", 0), ("Elena", 2), ("Maria", 5)]);
        assert_eq!(upcoming[1].label, "12 Mar");
        assert_eq!(upcoming[1].birthday, "1990-03-12");
    }

    #[test]
    fn upcoming_wraps_into_next_year() {
        let config = CalendarConfig::default();
        let upcoming = upcoming_birthdays(&family(), date(2024, 3, 11), 365, &config);
        let george = upcoming.iter().find(|u| u.name == "George").unwrap();
        assert_eq!(george.days_away, 364);
        assert_eq!(upcoming.last().map(|u| u.name.as_str()), Some("George"));
    }

    #[test]
    fn leap_day_birthday_counts_to_the_next_leap_year() {
        let doc = TreeDocument::from_value(json!({"name": "Ana", "birthday": "29/02/1984"})).unwrap();
        let tree = normalize(&doc).unwrap();
        let upcoming = upcoming_birthdays(&tree, date(2023, 3, 2), 365, &CalendarConfig::default());
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].days_away, 364);
        assert_eq!(upcoming[0].label, "29 Feb");
    }

    #[test]
    fn upcoming_includes_relatives_of_a_re_rooted_origin() {
        let doc = TreeDocument::from_value(json!({
            "Grandparent": "Ana",
            "Parent": [
                {"name": "Ion", "children": [
                    {"name": "Dan", "isOrigin": true},
                    {"name": "Eva", "birthday": "12/03/1990"}
                ]},
                {"name": "Radu", "birthday": "11/03/1962", "children": [{"name": "Cousin", "birthday": "13/03/1995"}]}
            ]
        }))
        .unwrap();
        let tree = crate::origin::resolve_origin(normalize(&doc).unwrap(), None);
        let upcoming = upcoming_birthdays(&tree, date(2024, 3, 10), 10, &CalendarConfig::default());
        let names: Vec<(&str, i64)> = upcoming.iter().map(|u| (u.name.as_str(), u.days_away)).collect();
        assert_eq!(names, vec![("Radu", 1), ("Eva", 2), ("Cousin", 3)]);
    }

    #[test]
    fn month_buckets_skip_excluded_names() {
        let tree = family();
        let directory = build_directory(&tree);
        let config = CalendarConfig {
            excluded_names: vec!["  maria ".into()],
            ..CalendarConfig::default()
        };
        let calendar = month_buckets(&directory, &config);
        assert_eq!(calendar.on(3, 10), ["George".to_string()]);
        assert_eq!(calendar.on(3, 12), ["Elena".to_string()]);
        assert!(calendar.on(3, 15).is_empty());
        assert!(calendar.on(13, 1).is_empty());
        assert_eq!(calendar.count(), 2);
    }
}
