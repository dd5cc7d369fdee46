use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub person_width: f32,
    pub person_height: f32,
    pub spouse_gap: f32,
    pub vertical_gap: f32,
    pub min_gap_floor: f32,
    pub min_gap_ratio: f32,
    pub unrelated_factor: f32,
    pub split_pad: f32,
    pub merge_pad_floor: f32,
    pub merge_pad_ratio: f32,
    pub row_tolerance: f32,
    pub align_epsilon: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            person_width: 170.0,
            person_height: 120.0,
            spouse_gap: 48.0,
            vertical_gap: 180.0,
            min_gap_floor: 16.0,
            min_gap_ratio: 0.35,
            unrelated_factor: 1.4,
            split_pad: 18.0,
            merge_pad_floor: 24.0,
            merge_pad_ratio: 0.35,
            row_tolerance: 0.5,
            align_epsilon: 0.75,
        }
    }
}

impl LayoutConfig {
    pub fn generation_step(&self) -> f32 {
        self.person_height + self.vertical_gap
    }

    pub fn min_gap(&self) -> f32 {
        self.min_gap_floor.max(self.person_width * self.min_gap_ratio)
    }

    /// Width of a two-person couple; the unit of horizontal separation.
    pub fn base_couple_width(&self) -> f32 {
        self.person_width * 2.0 + self.spouse_gap
    }

    pub fn merge_pad(&self) -> f32 {
        self.merge_pad_floor.max(self.person_height * self.merge_pad_ratio)
    }

    /// Closest two card centres may be when a row is redistributed.
    pub fn min_center_gap(&self) -> f32 {
        self.person_width + self.spouse_gap
    }

    pub fn group_width(&self, people: usize) -> f32 {
        let people = people.max(1) as f32;
        self.person_width * people + self.spouse_gap * (people - 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub upcoming_window_days: u32,
    pub unknown_year: i32,
    pub excluded_names: Vec<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            upcoming_window_days: 10,
            unknown_year: 2000,
            excluded_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobeConfig {
    pub home_country: Option<String>,
    pub moved_countries: Vec<String>,
    pub aliases: BTreeMap<String, String>,
}

impl GlobeConfig {
    pub fn with_default_aliases() -> Self {
        let aliases = [
            ("usa", "United States"),
            ("us", "United States"),
            ("united states of america", "United States"),
            ("uk", "United Kingdom"),
            ("great britain", "United Kingdom"),
            ("england", "United Kingdom"),
            ("holland", "Netherlands"),
            ("the netherlands", "Netherlands"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
        Self {
            aliases,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub layout: LayoutConfig,
    pub calendar: CalendarConfig,
    pub globe: GlobeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            calendar: CalendarConfig::default(),
            globe: GlobeConfig::with_default_aliases(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    person_width: Option<f32>,
    person_height: Option<f32>,
    spouse_gap: Option<f32>,
    vertical_gap: Option<f32>,
    min_gap_floor: Option<f32>,
    min_gap_ratio: Option<f32>,
    unrelated_factor: Option<f32>,
    split_pad: Option<f32>,
    merge_pad_floor: Option<f32>,
    merge_pad_ratio: Option<f32>,
    row_tolerance: Option<f32>,
    align_epsilon: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CalendarConfigFile {
    upcoming_window_days: Option<u32>,
    unknown_year: Option<i32>,
    excluded_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GlobeConfigFile {
    home_country: Option<String>,
    moved_countries: Option<Vec<String>>,
    aliases: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    calendar: Option<CalendarConfigFile>,
    globe: Option<GlobeConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config {}", path.display()))
}

/// Parses a JSON or JSON5 config; missing keys keep their defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(layout) = parsed.layout {
        let target = &mut config.layout;
        if let Some(v) = layout.person_width {
            target.person_width = v;
        }
        if let Some(v) = layout.person_height {
            target.person_height = v;
        }
        if let Some(v) = layout.spouse_gap {
            target.spouse_gap = v;
        }
        if let Some(v) = layout.vertical_gap {
            target.vertical_gap = v;
        }
        if let Some(v) = layout.min_gap_floor {
            target.min_gap_floor = v;
        }
        if let Some(v) = layout.min_gap_ratio {
            target.min_gap_ratio = v;
        }
        if let Some(v) = layout.unrelated_factor {
            target.unrelated_factor = v;
        }
        if let Some(v) = layout.split_pad {
            target.split_pad = v;
        }
        if let Some(v) = layout.merge_pad_floor {
            target.merge_pad_floor = v;
        }
        if let Some(v) = layout.merge_pad_ratio {
            target.merge_pad_ratio = v;
        }
        if let Some(v) = layout.row_tolerance {
            target.row_tolerance = v;
        }
        if let Some(v) = layout.align_epsilon {
            target.align_epsilon = v;
        }
    }

    if let Some(calendar) = parsed.calendar {
        if let Some(v) = calendar.upcoming_window_days {
            config.calendar.upcoming_window_days = v;
        }
        if let Some(v) = calendar.unknown_year {
            config.calendar.unknown_year = v;
        }
        if let Some(v) = calendar.excluded_names {
            config.calendar.excluded_names = v;
        }
    }

    if let Some(globe) = parsed.globe {
        if let Some(v) = globe.home_country {
            config.globe.home_country = Some(v);
        }
        if let Some(v) = globe.moved_countries {
            config.globe.moved_countries = v;
        }
        if let Some(aliases) = globe.aliases {
            for (from, to) in aliases {
                config.globe.aliases.insert(from.trim().to_lowercase(), to);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_spacing_uses_floors() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.generation_step(), 300.0);
        assert!((layout.min_gap() - 59.5).abs() < 1e-4);
        assert_eq!(layout.base_couple_width(), 388.0);
        assert_eq!(layout.merge_pad(), 42.0);
        assert_eq!(layout.group_width(3), 606.0);

        let tiny = LayoutConfig {
            person_width: 20.0,
            person_height: 20.0,
            ..LayoutConfig::default()
        };
        assert_eq!(tiny.min_gap(), 16.0);
        assert_eq!(tiny.merge_pad(), 24.0);
    }

    #[test]
    fn json5_overrides_merge_into_defaults() {
        let config = parse_config(
            r#"{
                // trailing commas and comments are fine
                layout: { personWidth: 200, verticalGap: 100, },
                calendar: { upcomingWindowDays: 30, excludedNames: ["Family Member"] },
                globe: { homeCountry: "Romania", aliases: { " RO ": "Romania" } },
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout.person_width, 200.0);
        assert_eq!(config.layout.person_height, 120.0);
        assert_eq!(config.layout.generation_step(), 220.0);
        assert_eq!(config.calendar.upcoming_window_days, 30);
        assert_eq!(config.calendar.unknown_year, 2000);
        assert_eq!(config.globe.home_country.as_deref(), Some("Romania"));
        assert_eq!(config.globe.aliases.get("ro").map(String::as_str), Some("Romania"));
        assert!(config.globe.aliases.contains_key("usa"));
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.calendar.upcoming_window_days, 10);
        assert!(load_config(Some(Path::new("/nonexistent/famtree.json"))).is_err());
    }
}
