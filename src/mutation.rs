use crate::origin::origin_position;
use crate::position::{MemberPath, PersonRef};
use crate::schema::{RawPerson, SpouseField, SpouseItem, TreeDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("no person found at {0}")]
    Unresolved(String),
    #[error("the origin person and their ancestors' branches cannot be deleted")]
    OriginProtected,
    #[error("cannot delete the root: add a named spouse to take its place first")]
    NoReplacementRoot,
    #[error("cannot add a {relation} at {position}")]
    Unsupported {
        relation: &'static str,
        position: String,
    },
    #[error("a name is required")]
    EmptyName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    Child,
    Spouse,
    Parent,
}

impl Relation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Spouse => "spouse",
            Self::Parent => "parent",
        }
    }
}

/// Form data for a new or edited person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberInput {
    pub name: String,
    pub image: String,
    pub birthday: String,
    pub visited: Vec<String>,
}

impl MemberInput {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn to_record(&self) -> Result<RawPerson, MutationError> {
        let mut record = RawPerson::default();
        self.apply_to(&mut record)?;
        Ok(record)
    }

    fn apply_to(&self, record: &mut RawPerson) -> Result<(), MutationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(MutationError::EmptyName);
        }
        record.name = Some(name.to_string());
        record.image = non_empty(&self.image);
        record.birthday = non_empty(&self.birthday);
        record.dob = None;
        let visited: Vec<Value> = self
            .visited
            .iter()
            .map(|country| country.trim())
            .filter(|country| !country.is_empty())
            .map(|country| Value::String(country.to_string()))
            .collect();
        record.visited = (!visited.is_empty()).then_some(Value::Array(visited));
        Ok(())
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub fn add_member(
    doc: &mut TreeDocument,
    at: &PersonRef,
    relation: Relation,
    input: &MemberInput,
) -> Result<(), MutationError> {
    transact(doc, "add", at, |doc| {
        let person = input.to_record()?;
        match relation {
            Relation::Parent => {
                let target = resolve(doc, at)?;
                append_parent(target, person);
                Ok(())
            }
            Relation::Spouse => {
                let owner = match at {
                    PersonRef::Spouse { owner, .. } | PersonRef::PreviousSpouse { owner } => &**owner,
                    other => other,
                };
                resolve(doc, owner)?.spouse.push(SpouseItem::Record(Box::new(person)));
                Ok(())
            }
            Relation::Child => add_child(doc, at, person),
        }
    })
}

fn add_child(doc: &mut TreeDocument, at: &PersonRef, mut person: RawPerson) -> Result<(), MutationError> {
    let unsupported = || MutationError::Unsupported {
        relation: Relation::Child.as_str(),
        position: at.to_string(),
    };
    match at {
        PersonRef::Member { path } => {
            child_list_mut(doc, path).ok_or_else(unsupported)?.push(person);
            Ok(())
        }
        PersonRef::Spouse { owner, .. } | PersonRef::PreviousSpouse { owner } => {
            let Some(path) = owner.as_member() else {
                return Err(unsupported());
            };
            let record = resolve(doc, owner)?;
            let (index, exists) = match at {
                PersonRef::Spouse { index, .. } => (
                    *index,
                    record
                        .spouse
                        .items()
                        .get(*index)
                        .is_some_and(|item| !matches!(item, SpouseItem::Opaque(_))),
                ),
                _ => (1, record.prev_spouse.is_some()),
            };
            if !exists {
                return Err(unresolved(at));
            }
            person.set_stored_spouse_index(index);
            let list = child_list_mut(doc, path).ok_or_else(unsupported)?;
            insert_for_union(list, person, index);
            Ok(())
        }
        PersonRef::Ancestor { of, depth: 0 } => {
            let Some(path) = of.as_member() else {
                return Err(unsupported());
            };
            let (list, _) = member_list_mut(doc, path).ok_or_else(unsupported)?;
            list.push(person);
            Ok(())
        }
        _ => Err(unsupported()),
    }
}

/// Keeps children grouped by union, higher unions first.
fn insert_for_union(list: &mut Vec<RawPerson>, person: RawPerson, index: usize) {
    let at = list
        .iter()
        .position(|child| child.stored_spouse_index() < index)
        .unwrap_or(list.len());
    list.insert(at, person);
}

/// Fills the first unnamed level of the `parents` chain, else adds a level
/// at the top.
fn append_parent(record: &mut RawPerson, person: RawPerson) {
    if record.parents.is_none() {
        record.parents = Some(Box::new(person));
        return;
    }
    if let Some(level) = record.parents.as_deref_mut() {
        if level.trimmed_name().is_empty() {
            level.name = person.name;
            level.image = person.image;
            level.birthday = person.birthday;
            level.visited = person.visited;
        } else {
            append_parent(level, person);
        }
    }
}

pub fn update_member(doc: &mut TreeDocument, at: &PersonRef, input: &MemberInput) -> Result<(), MutationError> {
    transact(doc, "update", at, |doc| input.apply_to(resolve(doc, at)?))
}

pub fn delete_member(doc: &mut TreeDocument, at: &PersonRef) -> Result<(), MutationError> {
    let origin = origin_position(doc);
    transact(doc, "delete", at, |doc| {
        if origin.as_ref() == Some(at) {
            return Err(MutationError::OriginProtected);
        }
        match at {
            PersonRef::Member { path } if path.is_root() => promote_root_spouse(doc),
            PersonRef::Member { path } => {
                if let Some(PersonRef::Member { path: origin }) = &origin
                    && path.contains(origin)
                {
                    return Err(MutationError::OriginProtected);
                }
                let (list, index) = member_list_mut(doc, path).ok_or_else(|| unresolved(at))?;
                if index >= list.len() {
                    return Err(unresolved(at));
                }
                list.remove(index);
                Ok(())
            }
            PersonRef::Spouse { owner, index } => remove_spouse_in(doc, owner, *index),
            PersonRef::PreviousSpouse { owner } => {
                let record = resolve(doc, owner)?;
                if record.prev_spouse.take().is_none() {
                    return Err(unresolved(at));
                }
                // Only when the list has no second entry did `prevSpouse`
                // stand in for union 1.
                if record.spouse.len() <= 1 {
                    retag_children(doc, owner, |old| match old {
                        1 => 0,
                        old if old > 1 => old - 1,
                        old => old,
                    });
                }
                Ok(())
            }
            PersonRef::Ancestor { of, depth } => {
                let holder = match depth.checked_sub(1) {
                    None => resolve(doc, of)?,
                    Some(below) => resolve(
                        doc,
                        &PersonRef::Ancestor {
                            of: of.clone(),
                            depth: below,
                        },
                    )?,
                };
                let removed = holder.parents.take().ok_or_else(|| unresolved(at))?;
                holder.parents = removed.parents;
                Ok(())
            }
        }
    })
}

/// Deleting the root promotes its first spouse into the root record.
fn promote_root_spouse(doc: &mut TreeDocument) -> Result<(), MutationError> {
    let root_ref = match doc {
        TreeDocument::Legacy(_) => PersonRef::root(),
        _ => couple_root(),
    };
    let root = resolve(doc, &root_ref)?;
    let mut items = std::mem::take(&mut root.spouse).into_items();
    if items.first().is_none_or(|first| first.name().is_empty()) {
        return Err(MutationError::NoReplacementRoot);
    }
    let replacement = items.remove(0);

    let mut mapping = vec![0usize];
    let mut remaining = Vec::new();
    for item in items {
        if item.name().is_empty() {
            mapping.push(0);
            continue;
        }
        mapping.push(remaining.len());
        remaining.push(match item {
            SpouseItem::Name(name) => SpouseItem::Record(Box::new(RawPerson::named(name.trim()))),
            other => other,
        });
    }

    match replacement {
        SpouseItem::Record(record) => {
            let record = *record;
            root.name = Some(record.trimmed_name().to_string());
            root.image = record.image;
            root.birthday = record.birthday.or(record.dob);
            root.tags = record.tags;
            root.visited = record.visited;
            root.parents = record.parents;
        }
        other => {
            root.name = Some(other.name().to_string());
            root.image = None;
            root.birthday = None;
            root.tags = None;
            root.visited = None;
            root.parents = None;
        }
    }
    root.dob = None;
    root.spouse = SpouseField::from_items(remaining);
    debug!(root = root.trimmed_name(), "promoted spouse to root");
    retag_children(doc, &root_ref, |old| mapping.get(old).copied().unwrap_or(0));
    Ok(())
}

fn couple_root() -> PersonRef {
    PersonRef::member(MemberPath::Couple { path: Vec::new() })
}

/// Removes spouse `index` of `owner`. Children of that union move to
/// union 0 and later unions shift down by one.
pub fn remove_spouse(doc: &mut TreeDocument, owner: &PersonRef, index: usize) -> Result<(), MutationError> {
    let at = PersonRef::spouse(owner.clone(), index);
    transact(doc, "remove spouse", &at, |doc| remove_spouse_in(doc, owner, index))
}

fn remove_spouse_in(doc: &mut TreeDocument, owner: &PersonRef, index: usize) -> Result<(), MutationError> {
    let record = resolve(doc, owner)?;
    if record.spouse.remove(index).is_none() {
        return Err(unresolved(&PersonRef::spouse(owner.clone(), index)));
    }
    retag_children(doc, owner, |old| match old {
        old if old == index => 0,
        old if old > index => old - 1,
        old => old,
    });
    Ok(())
}

/// Moves the children of union `from` to union `to`. Returns how many moved.
pub fn reassign_children(
    doc: &mut TreeDocument,
    owner: &PersonRef,
    from: usize,
    to: usize,
) -> Result<usize, MutationError> {
    transact(doc, "reassign children", owner, |doc| {
        let record = resolve(doc, owner)?;
        if to != 0 && to >= record.spouse.len() {
            return Err(unresolved(&PersonRef::spouse(owner.clone(), to)));
        }
        let Some(path) = owner.as_member() else {
            return Ok(0);
        };
        let Some(list) = existing_child_list_mut(doc, path) else {
            return Ok(0);
        };
        let mut moved = Vec::new();
        let mut kept = Vec::new();
        for mut child in std::mem::take(list) {
            if child.stored_spouse_index() == from {
                child.set_stored_spouse_index(to);
                moved.push(child);
            } else {
                kept.push(child);
            }
        }
        let count = moved.len();
        *list = kept;
        for child in moved {
            insert_for_union(list, child, to);
        }
        Ok(count)
    })
}

/// True when every stored child names union 0 or an existing spouse slot of
/// its parent.
pub fn spouse_indices_consistent(doc: &TreeDocument) -> bool {
    fn family_ok(owner: &RawPerson, kids: &[RawPerson]) -> bool {
        let slots = owner.spouse.len();
        let has_prev = owner.prev_spouse.is_some();
        kids.iter().all(|kid| {
            let index = kid.stored_spouse_index();
            index == 0 || index < slots || (index == 1 && has_prev)
        })
    }
    fn couple_ok(node: &RawPerson) -> bool {
        let kids = node.children.as_deref().unwrap_or_default();
        family_ok(node, kids) && kids.iter().all(couple_ok)
    }
    match doc {
        TreeDocument::Legacy(legacy) => {
            family_ok(&legacy.root, legacy.parent_list())
                && legacy.parent_list().iter().all(|parent| {
                    let kids = crate::normalize::legacy_kids(parent);
                    family_ok(parent, kids)
                        && kids
                            .iter()
                            .all(|kid| family_ok(kid, kid.grandchildren.as_deref().unwrap_or_default()))
                })
        }
        TreeDocument::Couple(root) => couple_ok(root),
        TreeDocument::Empty(_) => true,
    }
}

fn transact<T>(
    doc: &mut TreeDocument,
    action: &'static str,
    at: &PersonRef,
    apply: impl FnOnce(&mut TreeDocument) -> Result<T, MutationError>,
) -> Result<T, MutationError> {
    let mut working = doc.clone();
    match apply(&mut working) {
        Ok(value) => {
            *doc = working;
            debug!(action, position = %at, "applied mutation");
            Ok(value)
        }
        Err(error) => {
            warn!(action, position = %at, %error, "rejected mutation");
            Err(error)
        }
    }
}

fn unresolved(at: &PersonRef) -> MutationError {
    MutationError::Unresolved(at.to_string())
}

fn resolve<'d>(doc: &'d mut TreeDocument, at: &PersonRef) -> Result<&'d mut RawPerson, MutationError> {
    record_mut(doc, at).ok_or_else(|| unresolved(at))
}

fn record_mut<'d>(doc: &'d mut TreeDocument, at: &PersonRef) -> Option<&'d mut RawPerson> {
    match at {
        PersonRef::Member { path } => member_mut(doc, path),
        PersonRef::Spouse { owner, index } => record_mut(doc, owner)?.spouse.get_mut(*index)?.record_mut(),
        PersonRef::PreviousSpouse { owner } => record_mut(doc, owner)?.prev_spouse.as_mut()?.record_mut(),
        PersonRef::Ancestor { of, depth } => {
            let mut level = record_mut(doc, of)?.parents.as_deref_mut()?;
            for _ in 0..*depth {
                level = level.parents.as_deref_mut()?;
            }
            Some(level)
        }
    }
}

fn member_mut<'d>(doc: &'d mut TreeDocument, path: &MemberPath) -> Option<&'d mut RawPerson> {
    match (doc, path) {
        (TreeDocument::Legacy(legacy), MemberPath::Root) => Some(&mut legacy.root),
        (TreeDocument::Couple(root), MemberPath::Couple { path }) => {
            let mut node = root;
            for &index in path {
                node = node.children.as_mut()?.get_mut(index)?;
            }
            Some(node)
        }
        (doc, path) => {
            let (list, index) = member_list_mut(doc, path)?;
            list.get_mut(index)
        }
    }
}

/// The stored list holding a non-root member, with the member's index.
fn member_list_mut<'d>(doc: &'d mut TreeDocument, path: &MemberPath) -> Option<(&'d mut Vec<RawPerson>, usize)> {
    match (doc, path) {
        (TreeDocument::Legacy(legacy), MemberPath::Parent { parent }) => Some((legacy.parent.as_mut()?, *parent)),
        (TreeDocument::Legacy(legacy), MemberPath::Child { parent, child }) => {
            let parent = legacy.parent.as_mut()?.get_mut(*parent)?;
            Some((legacy_kids_mut(parent)?, *child))
        }
        (TreeDocument::Legacy(legacy), MemberPath::Grandchild { parent, child, grand }) => {
            let parent = legacy.parent.as_mut()?.get_mut(*parent)?;
            let child = legacy_kids_mut(parent)?.get_mut(*child)?;
            Some((child.grandchildren.as_mut()?, *grand))
        }
        (TreeDocument::Couple(root), MemberPath::Couple { path }) => {
            let (&last, above) = path.split_last()?;
            let mut node = root;
            for &index in above {
                node = node.children.as_mut()?.get_mut(index)?;
            }
            Some((node.children.as_mut()?, last))
        }
        _ => None,
    }
}

fn legacy_kids_mut(parent: &mut RawPerson) -> Option<&mut Vec<RawPerson>> {
    if parent.children.is_some() {
        parent.children.as_mut()
    } else {
        parent.grandchildren.as_mut()
    }
}

/// Child list of a member, created when missing. Grandchildren have none.
fn child_list_mut<'d>(doc: &'d mut TreeDocument, path: &MemberPath) -> Option<&'d mut Vec<RawPerson>> {
    match path {
        MemberPath::Root => match doc {
            TreeDocument::Legacy(legacy) => Some(legacy.parent.get_or_insert_with(Vec::new)),
            _ => None,
        },
        MemberPath::Parent { .. } => {
            let record = member_mut(doc, path)?;
            if record.children.is_none() {
                record.children = Some(record.grandchildren.take().unwrap_or_default());
            }
            record.children.as_mut()
        }
        MemberPath::Child { .. } => Some(member_mut(doc, path)?.grandchildren.get_or_insert_with(Vec::new)),
        MemberPath::Grandchild { .. } => None,
        MemberPath::Couple { .. } => Some(member_mut(doc, path)?.children.get_or_insert_with(Vec::new)),
    }
}

fn existing_child_list_mut<'d>(doc: &'d mut TreeDocument, path: &MemberPath) -> Option<&'d mut Vec<RawPerson>> {
    match path {
        MemberPath::Root => match doc {
            TreeDocument::Legacy(legacy) => legacy.parent.as_mut(),
            _ => None,
        },
        MemberPath::Parent { .. } => legacy_kids_mut(member_mut(doc, path)?),
        MemberPath::Child { .. } => member_mut(doc, path)?.grandchildren.as_mut(),
        MemberPath::Grandchild { .. } => None,
        MemberPath::Couple { .. } => member_mut(doc, path)?.children.as_mut(),
    }
}

fn retag_children(doc: &mut TreeDocument, owner: &PersonRef, remap: impl Fn(usize) -> usize) {
    let Some(path) = owner.as_member() else {
        return;
    };
    let Some(list) = existing_child_list_mut(doc, path) else {
        return;
    };
    for child in list {
        let old = child.stored_spouse_index();
        let new = remap(old);
        if new != old {
            child.set_stored_spouse_index(new);
        }
    }
}
