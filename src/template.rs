use crate::schema::{LegacyRoot, RawPerson, SetupContext, SpouseField, SpouseItem, TreeDocument};
use serde::{Deserialize, Deserializer, Serialize};

const DEFAULT_NAME: &str = "Family Member";

/// Answers collected by the new-tree wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardAnswers {
    pub center_mode: String,
    pub center_name: String,
    pub center_birthdate: String,
    pub center_photo_url: String,
    pub relationship_to_center: String,
    pub enable_birthdays: Option<bool>,
    pub enable_globe_countries: Option<bool>,
    pub father_name: String,
    pub father_birthdate: String,
    pub mother_name: String,
    pub mother_birthdate: String,
    pub siblings: Vec<WizardPerson>,
    pub partner_name: String,
    pub partner_birthdate: String,
    pub children: Vec<WizardPerson>,
    pub grandchildren: Vec<WizardPerson>,
    /// Grandchildren grouped by the child they belong to, when captured.
    pub grandchildren_by_child: Vec<Vec<WizardPerson>>,
}

/// A wizard list entry: a bare name or `{ name, birthdate }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WizardPerson {
    pub name: String,
    pub birthdate: String,
}

impl WizardPerson {
    pub fn new(name: impl Into<String>, birthdate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            birthdate: birthdate.into(),
        }
    }
}

impl<'de> Deserialize<'de> for WizardPerson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Entry {
                #[serde(default)]
                name: String,
                #[serde(default)]
                birthdate: String,
            },
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Self::new(name, ""),
            Repr::Entry { name, birthdate } => Self::new(name, birthdate),
        })
    }
}

fn person_node(name: &str, image: &str, birthday: &str) -> RawPerson {
    let name = name.trim();
    RawPerson {
        name: Some(if name.is_empty() { DEFAULT_NAME } else { name }.to_string()),
        image: Some(image.trim().to_string()),
        birthday: Some(birthday.trim().to_string()),
        ..RawPerson::default()
    }
}

/// Builds the starting legacy document for a new tree. When parents or
/// siblings are known the tree is anchored one generation up and the
/// central person becomes a `Parent` entry; otherwise the central person is
/// the root.
pub fn generate_template(answers: &WizardAnswers) -> TreeDocument {
    let birthdays = answers.enable_birthdays != Some(false);
    let globe = answers.enable_globe_countries != Some(false);
    let date = |text: &str| if birthdays { text.trim().to_string() } else { String::new() };
    let people = |entries: &[WizardPerson]| -> Vec<RawPerson> {
        entries
            .iter()
            .filter(|entry| !entry.name.trim().is_empty())
            .map(|entry| person_node(&entry.name, "", &date(&entry.birthdate)))
            .collect()
    };

    let mut center = person_node(
        &answers.center_name,
        &answers.center_photo_url,
        &date(&answers.center_birthdate),
    );
    center.is_origin = Some(true);
    let center_name = center.trimmed_name().to_string();

    let partner_name = answers.partner_name.trim();
    let partner = (!partner_name.is_empty())
        .then(|| person_node(partner_name, "", &date(&answers.partner_birthdate)));

    let father = answers.father_name.trim();
    let mother = answers.mother_name.trim();
    let siblings = people(&answers.siblings);
    let anchored = !father.is_empty() || !mother.is_empty() || !siblings.is_empty();

    let mut children = people(&answers.children);
    let by_child: Vec<Vec<RawPerson>> = answers.grandchildren_by_child.iter().map(|group| people(group)).collect();
    let grandchildren = people(&answers.grandchildren);
    if by_child.iter().any(|group| !group.is_empty()) {
        for (child, group) in children.iter_mut().zip(by_child) {
            if !group.is_empty() {
                set_kids(child, group, anchored);
            }
        }
    } else if !grandchildren.is_empty() {
        if children.is_empty() {
            children.push(person_node("Child", "", ""));
        }
        set_kids(&mut children[0], grandchildren, anchored);
    }

    let mut doc = if anchored {
        if let Some(partner) = partner {
            center.spouse = SpouseField::Single(SpouseItem::Record(Box::new(partner)));
        }
        if !children.is_empty() {
            center.children = Some(children);
        }
        let (root_name, root_birthday) = match (father.is_empty(), mother.is_empty()) {
            (false, _) => (father, answers.father_birthdate.as_str()),
            (true, false) => (mother, answers.mother_birthdate.as_str()),
            (true, true) => ("Parent", ""),
        };
        let mut root = person_node(root_name, "", &date(root_birthday));
        if !father.is_empty() && !mother.is_empty() {
            let mother = person_node(mother, "", &date(&answers.mother_birthdate));
            root.spouse = SpouseField::Single(SpouseItem::Record(Box::new(mother)));
        }
        let mut parent = vec![center];
        parent.extend(siblings);
        LegacyRoot::new(root, parent)
    } else {
        if let Some(partner) = partner {
            center.spouse = SpouseField::Single(SpouseItem::Record(Box::new(partner)));
        }
        LegacyRoot::new(center, children)
    };

    let relationship = answers.relationship_to_center.trim();
    let center_mode = answers.center_mode.trim();
    doc.setup_context = Some(SetupContext {
        center_mode: Some(if center_mode.is_empty() { "me" } else { center_mode }.to_string()),
        center_name: Some(center_name),
        enable_birthdays: Some(birthdays),
        enable_globe_countries: Some(globe),
        relationship_to_center: (!relationship.is_empty()).then(|| relationship.to_string()),
        ..SetupContext::default()
    });
    TreeDocument::Legacy(doc)
}

/// Children of a `Parent` entry's child live under `grandchildren`; when
/// the child is itself a `Parent` entry they live under `children`.
fn set_kids(child: &mut RawPerson, kids: Vec<RawPerson>, anchored: bool) {
    if anchored {
        child.grandchildren = Some(kids);
    } else {
        child.children = Some(kids);
    }
}
