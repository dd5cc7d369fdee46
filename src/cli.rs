use crate::birthday::{month_buckets, upcoming_birthdays};
use crate::config::{Config, load_config};
use crate::layout::compute_layout;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::model::TreeNode;
use crate::normalize::normalize;
use crate::origin::resolve_origin;
use crate::people::{build_directory, visited_countries};
use crate::schema::TreeDocument;
use crate::template::{WizardAnswers, generate_template};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "famtree", version, about = "Family-tree normalization and layout")]
pub struct Args {
    /// Input tree JSON (or wizard answers with --wizard), '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// What to emit
    #[arg(short = 'e', long = "emit", value_enum, default_value = "layout")]
    pub emit: Emit,

    /// Config JSON/JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Origin name used when no person is flagged `isOrigin`
    #[arg(long = "center-name")]
    pub center_name: Option<String>,

    /// Reference date for upcoming birthdays (YYYY-MM-DD)
    #[arg(long = "today")]
    pub today: Option<NaiveDate>,

    /// Upcoming birthday window in days
    #[arg(long = "window")]
    pub window: Option<u32>,

    /// Treat the input as wizard answers and emit the generated tree
    #[arg(long = "wizard")]
    pub wizard: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Layout,
    Tree,
    People,
    Upcoming,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PeopleReport<'a> {
    people: &'a crate::people::PersonDirectory,
    calendar: crate::birthday::BirthdayCalendar,
    countries: Vec<crate::people::CountryVisits>,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;

    if args.wizard {
        let answers: WizardAnswers = serde_json::from_str(&input).context("invalid wizard answers")?;
        let doc = generate_template(&answers);
        return write_output(&doc.to_json_pretty()?, args.output.as_deref());
    }

    let doc = TreeDocument::parse(&input)?;
    let center_name = args.center_name.clone().or_else(|| doc.center_name_hint());
    let tree = normalize(&doc).map(|root| resolve_origin(root, center_name.as_deref()));

    match args.emit {
        Emit::Layout => {
            let layout = tree
                .as_ref()
                .map(|tree| compute_layout(tree, &config.layout))
                .unwrap_or_default();
            if let Some(path) = args.output.as_deref() {
                return write_layout_dump(path, &layout);
            }
            let json = serde_json::to_string_pretty(&LayoutDump::from_layout(&layout))?;
            write_output(&json, None)
        }
        Emit::Tree => {
            let json = serde_json::to_string_pretty(&tree)?;
            write_output(&json, args.output.as_deref())
        }
        Emit::People => {
            let json = people_report(tree.as_ref(), &config)?;
            write_output(&json, args.output.as_deref())
        }
        Emit::Upcoming => {
            let today = args.today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let window = args.window.unwrap_or(config.calendar.upcoming_window_days);
            let upcoming = tree
                .as_ref()
                .map(|tree| upcoming_birthdays(tree, today, window, &config.calendar))
                .unwrap_or_default();
            let json = serde_json::to_string_pretty(&upcoming)?;
            write_output(&json, args.output.as_deref())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn people_report(tree: Option<&TreeNode>, config: &Config) -> Result<String> {
    let directory = tree.map(build_directory).unwrap_or_default();
    let report = PeopleReport {
        calendar: month_buckets(&directory, &config.calendar),
        countries: visited_countries(&directory, &config.globe),
        people: &directory,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(contents: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_emit_and_dates() {
        let args = Args::try_parse_from([
            "famtree", "-i", "tree.json", "-e", "upcoming", "--today", "2024-03-10", "--window", "7",
        ])
        .unwrap();
        assert_eq!(args.emit, Emit::Upcoming);
        assert_eq!(args.today, NaiveDate::from_ymd_opt(2024, 3, 10));
        assert_eq!(args.window, Some(7));
        assert!(!args.wizard);

        let defaults = Args::try_parse_from(["famtree"]).unwrap();
        assert_eq!(defaults.emit, Emit::Layout);
        assert!(Args::try_parse_from(["famtree", "--today", "10/03/2024"]).is_err());
    }

    #[test]
    fn people_report_lists_directory_and_calendar() {
        let doc = TreeDocument::from_value(json!({
            "name": "Maria", "birthday": "15/03/1960", "visited": ["USA"]
        }))
        .unwrap();
        let tree = normalize(&doc);
        let report = people_report(tree.as_ref(), &Config::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["people"]["entries"][0]["name"], "Maria");
        assert_eq!(value["calendar"]["months"][2]["15"][0], "Maria");
        assert_eq!(value["countries"][0]["country"], "United States");
        assert_eq!(value["countries"][0]["tone"], "visited");
    }

    #[test]
    fn empty_tree_gives_empty_report() {
        let report = people_report(None, &Config::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert!(value["people"]["entries"].as_array().unwrap().is_empty());
    }
}
