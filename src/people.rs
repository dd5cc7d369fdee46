use crate::config::GlobeConfig;
use crate::model::{Person, SpouseEntry, TreeNode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

static SPACED_AMPERSAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*&\s*").unwrap());
static SPACED_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*/\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relatives {
    pub spouses: Vec<String>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub siblings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PersonRole {
    Primary,
    Spouse,
    Ancestor,
    AncestorSpouse,
}

/// One person encountered while walking the tree.
#[derive(Debug)]
pub struct PersonVisit<'a> {
    pub person: &'a Person,
    pub role: PersonRole,
    /// 0 for the root row, negative above it.
    pub generation: i32,
    pub relatives: Relatives,
}

/// Visits every primary, spouse and ancestor in the tree: each node's
/// primary, then its spouses, then the ancestor chains of both, then its
/// children. Ancestor levels also yield their other children, so a
/// re-rooted tree still reaches the origin's siblings and cousins.
pub fn for_each_person<'a>(tree: &'a TreeNode, visit: &mut impl FnMut(PersonVisit<'a>)) {
    walk_member(tree, 0, Vec::new(), sibling_names(tree), visit);
}

fn names<'a>(people: impl IntoIterator<Item = &'a Person>) -> Vec<String> {
    people
        .into_iter()
        .filter(|person| person.has_name())
        .map(|person| person.name.clone())
        .collect()
}

fn level_names(level: Option<&TreeNode>) -> Vec<String> {
    level.map_or_else(Vec::new, |level| {
        names(std::iter::once(&level.primary).chain(level.named_spouses().map(|(_, spouse)| &spouse.person)))
    })
}

fn walk_member<'a>(
    node: &'a TreeNode,
    generation: i32,
    parents: Vec<String>,
    siblings: Vec<String>,
    visit: &mut impl FnMut(PersonVisit<'a>),
) {
    let child_names = names(node.children.iter().map(|child| &child.primary));
    let spouse_names = names(node.spouses.iter().map(|spouse| &spouse.person));
    let primary_parents = if parents.is_empty() {
        level_names(node.ancestors.as_deref())
    } else {
        parents
    };

    visit(PersonVisit {
        person: &node.primary,
        role: PersonRole::Primary,
        generation,
        relatives: Relatives {
            spouses: spouse_names,
            parents: primary_parents,
            children: child_names.clone(),
            siblings,
        },
    });
    for (slot, spouse) in node.spouses.iter().enumerate() {
        let children = names(
            node.children
                .iter()
                .filter(|child| child.from_spouse_index == slot)
                .map(|child| &child.primary),
        );
        visit_spouse(node, spouse, children, PersonRole::Spouse, generation, visit);
    }

    if let Some(level) = node.ancestors.as_deref() {
        walk_ancestors(level, &node.primary, generation - 1, visit);
    }
    for spouse in &node.spouses {
        if let Some(level) = spouse.parents.as_deref() {
            walk_ancestors(level, &spouse.person, generation - 1, visit);
        }
    }

    for (index, child) in node.children.iter().enumerate() {
        let union = node.spouses.get(child.from_spouse_index).map(|spouse| &spouse.person);
        let parents = names(std::iter::once(&node.primary).chain(union));
        let siblings = node
            .children
            .iter()
            .enumerate()
            .filter(|&(other, sibling)| other != index && sibling.primary.has_name())
            .map(|(_, sibling)| sibling.primary.name.clone())
            .collect();
        walk_member(child, generation + 1, parents, siblings, visit);
    }
}

fn visit_spouse<'a>(
    owner: &'a TreeNode,
    spouse: &'a SpouseEntry,
    children: Vec<String>,
    role: PersonRole,
    generation: i32,
    visit: &mut impl FnMut(PersonVisit<'a>),
) {
    visit(PersonVisit {
        person: &spouse.person,
        role,
        generation,
        relatives: Relatives {
            spouses: names([&owner.primary]),
            parents: level_names(spouse.parents.as_deref()),
            children,
            siblings: Vec::new(),
        },
    });
}

/// Visits an ancestor level, the chains above it, then the level's other
/// children (siblings of `below`) with their whole subtrees.
fn walk_ancestors<'a>(
    level: &'a TreeNode,
    below: &'a Person,
    generation: i32,
    visit: &mut impl FnMut(PersonVisit<'a>),
) {
    let mut children = names([below]);
    children.extend(names(level.children.iter().map(|child| &child.primary)));
    visit(PersonVisit {
        person: &level.primary,
        role: PersonRole::Ancestor,
        generation,
        relatives: Relatives {
            spouses: names(level.spouses.iter().map(|spouse| &spouse.person)),
            parents: level_names(level.ancestors.as_deref()),
            children: children.clone(),
            siblings: sibling_names(level),
        },
    });
    for spouse in &level.spouses {
        visit_spouse(level, spouse, children.clone(), PersonRole::AncestorSpouse, generation, visit);
    }
    if let Some(higher) = level.ancestors.as_deref() {
        walk_ancestors(higher, &level.primary, generation - 1, visit);
    }
    for spouse in &level.spouses {
        if let Some(parents) = spouse.parents.as_deref() {
            walk_ancestors(parents, &spouse.person, generation - 1, visit);
        }
    }

    for (index, child) in level.children.iter().enumerate() {
        let union = level.spouses.get(child.from_spouse_index).map(|spouse| &spouse.person);
        let parents = names(std::iter::once(&level.primary).chain(union));
        let others = level
            .children
            .iter()
            .enumerate()
            .filter(|&(other, _)| other != index)
            .map(|(_, sibling)| &sibling.primary);
        let siblings = names(std::iter::once(below).chain(others));
        walk_member(child, generation + 1, parents, siblings, visit);
    }
}

/// Children the level above `node` still holds besides `node` itself.
fn sibling_names(node: &TreeNode) -> Vec<String> {
    node.ancestors
        .as_deref()
        .map_or_else(Vec::new, |upper| names(upper.children.iter().map(|child| &child.primary)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub birthday: String,
    pub image: String,
    pub thumb: String,
    pub tags: Vec<String>,
    pub visited: Vec<String>,
    pub role: PersonRole,
    pub generation: i32,
    pub relatives: Relatives,
}

/// Flattened, name-keyed list of everyone in the tree. The first record
/// seen for a name wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonDirectory {
    entries: Vec<DirectoryEntry>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl PersonDirectory {
    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.by_name.get(name.trim()).map(|&index| &self.entries[index])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DirectoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, visit: PersonVisit<'_>) {
        let name = visit.person.name.trim();
        if name.is_empty() || self.by_name.contains_key(name) {
            return;
        }
        let person = visit.person;
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push(DirectoryEntry {
            name: name.to_string(),
            birthday: person.birthday.clone(),
            image: person.image.clone(),
            thumb: person.thumb.clone(),
            tags: person.tags.clone(),
            visited: person.visited.clone(),
            role: visit.role,
            generation: visit.generation,
            relatives: visit.relatives,
        });
    }
}

pub fn build_directory(tree: &TreeNode) -> PersonDirectory {
    let mut directory = PersonDirectory::default();
    for_each_person(tree, &mut |visit| directory.insert(visit));
    debug!(people = directory.len(), "built person directory");
    directory
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountryTone {
    Home,
    Moved,
    Visited,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryVisits {
    pub country: String,
    pub people: Vec<String>,
    pub tone: CountryTone,
}

fn country_key(name: &str) -> String {
    let lower = name.to_lowercase();
    let lower = SPACED_AMPERSAND.replace_all(&lower, "&");
    let lower = SPACED_SLASH.replace_all(&lower, "/");
    WHITESPACE.replace_all(&lower, " ").trim().to_string()
}

/// Canonical country name: trailing `.`/`,` removed, whitespace collapsed
/// and aliases applied. `None` for blank input.
pub fn normalize_country(name: &str, config: &GlobeConfig) -> Option<String> {
    let trimmed = name.trim().trim_end_matches(['.', ',']).trim();
    if trimmed.is_empty() {
        return None;
    }
    let key = country_key(trimmed);
    Some(match config.aliases.get(&key) {
        Some(alias) => alias.clone(),
        None => WHITESPACE.replace_all(trimmed, " ").into_owned(),
    })
}

/// Countries visited by people in the directory, sorted by country name.
pub fn visited_countries(directory: &PersonDirectory, config: &GlobeConfig) -> Vec<CountryVisits> {
    let canonical = |name: &str| normalize_country(name, config).map(|country| country_key(&country));
    let home = config.home_country.as_deref().and_then(canonical);
    let moved: Vec<String> = config.moved_countries.iter().filter_map(|name| canonical(name)).collect();

    let mut countries: BTreeMap<String, CountryVisits> = BTreeMap::new();
    for entry in directory.iter() {
        for raw in &entry.visited {
            let Some(country) = normalize_country(raw, config) else {
                continue;
            };
            let key = country_key(&country);
            let tone = if home.as_deref() == Some(key.as_str()) {
                CountryTone::Home
            } else if moved.contains(&key) {
                CountryTone::Moved
            } else {
                CountryTone::Visited
            };
            let visits = countries.entry(country.clone()).or_insert_with(|| CountryVisits {
                country,
                people: Vec::new(),
                tone,
            });
            if !visits.people.contains(&entry.name) {
                visits.people.push(entry.name.clone());
            }
        }
    }
    countries.into_values().collect()
}
