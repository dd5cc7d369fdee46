use chrono::NaiveDate;
use family_tree_layout::birthday::upcoming_birthdays;
use family_tree_layout::config::{CalendarConfig, LayoutConfig};
use family_tree_layout::layout_dump::LayoutDump;
use family_tree_layout::mutation::{add_member, delete_member, reassign_children, remove_spouse, update_member};
use family_tree_layout::people::build_directory;
use family_tree_layout::template::{WizardAnswers, generate_template};
use family_tree_layout::{MemberInput, PersonRef, Relation, TreeDocument, build_tree, compute_layout};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    person_width: Option<f32>,
    person_height: Option<f32>,
    spouse_gap: Option<f32>,
    vertical_gap: Option<f32>,
}

fn build_layout_config(options: LayoutOptions) -> LayoutConfig {
    let mut config = LayoutConfig::default();
    if let Some(width) = options.person_width {
        config.person_width = width;
    }
    if let Some(height) = options.person_height {
        config.person_height = height;
    }
    if let Some(gap) = options.spouse_gap {
        config.spouse_gap = gap;
    }
    if let Some(gap) = options.vertical_gap {
        config.vertical_gap = gap;
    }
    config
}

/// One editor action against the stored document.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum Edit {
    Add {
        at: PersonRef,
        relation: Relation,
        person: MemberInput,
    },
    Update {
        at: PersonRef,
        person: MemberInput,
    },
    Delete {
        at: PersonRef,
    },
    RemoveSpouse {
        owner: PersonRef,
        index: usize,
    },
    ReassignChildren {
        owner: PersonRef,
        from: usize,
        to: usize,
    },
}

fn parse_options<T: Default + for<'de> Deserialize<'de>>(raw: Option<String>) -> Result<T, String> {
    match raw {
        Some(raw) => serde_json::from_str(&raw).map_err(|error| error.to_string()),
        None => Ok(T::default()),
    }
}

fn layout_json(tree_json: &str, options: LayoutOptions) -> Result<String, String> {
    let doc = TreeDocument::parse(tree_json).map_err(|error| error.to_string())?;
    let config = build_layout_config(options);
    let layout = build_tree(&doc)
        .map(|tree| compute_layout(&tree, &config))
        .unwrap_or_default();
    serde_json::to_string(&LayoutDump::from_layout(&layout)).map_err(|error| error.to_string())
}

fn edit_json(tree_json: &str, edit_json: &str) -> Result<String, String> {
    let mut doc = TreeDocument::parse(tree_json).map_err(|error| error.to_string())?;
    let edit: Edit = serde_json::from_str(edit_json).map_err(|error| error.to_string())?;
    let applied = match &edit {
        Edit::Add { at, relation, person } => add_member(&mut doc, at, *relation, person),
        Edit::Update { at, person } => update_member(&mut doc, at, person),
        Edit::Delete { at } => delete_member(&mut doc, at),
        Edit::RemoveSpouse { owner, index } => remove_spouse(&mut doc, owner, *index),
        Edit::ReassignChildren { owner, from, to } => reassign_children(&mut doc, owner, *from, *to).map(|_| ()),
    };
    applied.map_err(|error| error.to_string())?;
    doc.to_json_pretty().map_err(|error| error.to_string())
}

fn people_json(tree_json: &str) -> Result<String, String> {
    let doc = TreeDocument::parse(tree_json).map_err(|error| error.to_string())?;
    let directory = build_tree(&doc).map(|tree| build_directory(&tree)).unwrap_or_default();
    serde_json::to_string(&directory).map_err(|error| error.to_string())
}

fn upcoming_json(tree_json: &str, today: &str, window_days: u32) -> Result<String, String> {
    let doc = TreeDocument::parse(tree_json).map_err(|error| error.to_string())?;
    let today = today
        .parse::<NaiveDate>()
        .map_err(|error| format!("invalid date {today}: {error}"))?;
    let upcoming = build_tree(&doc)
        .map(|tree| upcoming_birthdays(&tree, today, window_days, &CalendarConfig::default()))
        .unwrap_or_default();
    serde_json::to_string(&upcoming).map_err(|error| error.to_string())
}

fn template_json(answers_json: &str) -> Result<String, String> {
    let answers: WizardAnswers = serde_json::from_str(answers_json).map_err(|error| error.to_string())?;
    generate_template(&answers)
        .to_json_pretty()
        .map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_family_tree(tree_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = parse_options(options_json).map_err(|error| JsValue::from_str(&error))?;
    layout_json(tree_json, options).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn apply_edit(tree_json: &str, edit: &str) -> Result<String, JsValue> {
    edit_json(tree_json, edit).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn person_directory(tree_json: &str) -> Result<String, JsValue> {
    people_json(tree_json).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn upcoming(tree_json: &str, today: &str, window_days: u32) -> Result<String, JsValue> {
    upcoming_json(tree_json, today, window_days).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn generate_tree(answers_json: &str) -> Result<String, JsValue> {
    template_json(answers_json).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{LayoutOptions, edit_json, layout_json, people_json, template_json, upcoming_json};
    use serde_json::Value;

    const FAMILY: &str = r#"{"name": "Maria", "birthday": "12/03/1960", "spouse": "George",
        "children": [{"name": "Elena"}]}"#;

    #[test]
    fn lays_out_a_couple_with_child() {
        let json = layout_json(FAMILY, LayoutOptions::default()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["branches"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn wider_cards_widen_the_layout() {
        let narrow: Value = serde_json::from_str(&layout_json(FAMILY, LayoutOptions::default()).unwrap()).unwrap();
        let options = LayoutOptions {
            person_width: Some(300.0),
            ..LayoutOptions::default()
        };
        let wide: Value = serde_json::from_str(&layout_json(FAMILY, options).unwrap()).unwrap();
        assert!(wide["width"].as_f64().unwrap() > narrow["width"].as_f64().unwrap());
    }

    #[test]
    fn applies_add_edit() {
        let edit = r#"{"op": "add", "at": {"type": "member", "path": {"type": "couple", "path": []}},
            "relation": "child", "person": {"name": "Ion"}}"#;
        let json = edit_json(FAMILY, edit).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["children"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn rejected_edit_reports_error() {
        let edit = r#"{"op": "delete", "at": {"type": "member", "path": {"type": "couple", "path": [7]}}}"#;
        assert!(edit_json(FAMILY, edit).is_err());
        assert!(edit_json("not json", edit).is_err());
    }

    #[test]
    fn directory_and_upcoming() {
        let people: Value = serde_json::from_str(&people_json(FAMILY).unwrap()).unwrap();
        assert_eq!(people["entries"].as_array().unwrap().len(), 3);
        let upcoming: Value = serde_json::from_str(&upcoming_json(FAMILY, "2024-03-10", 10).unwrap()).unwrap();
        assert_eq!(upcoming[0]["name"], "Maria");
        assert_eq!(upcoming[0]["daysAway"], 2);
        assert!(upcoming_json(FAMILY, "soon", 10).is_err());
    }

    #[test]
    fn generates_tree_from_answers() {
        let json = template_json(r#"{"centerName": "Maria", "children": ["Elena"]}"#).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Grandparent"], "Maria");
        assert_eq!(value["Parent"][0]["name"], "Elena");
    }
}
