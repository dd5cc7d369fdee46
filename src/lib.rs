pub mod birthday;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod layout;
pub mod layout_dump;
pub mod model;
pub mod mutation;
pub mod normalize;
pub mod origin;
pub mod people;
pub mod position;
pub mod schema;
pub mod template;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, load_config};
pub use layout::{FamilyLayout, LayoutNode, NodeKind, compute_layout};
pub use model::{Person, SpouseEntry, TreeNode};
pub use mutation::{MemberInput, MutationError, Relation};
pub use position::{MemberPath, PersonRef};
pub use schema::{DocumentError, TreeDocument};

/// Normalizes a stored document and re-roots it at its origin person.
pub fn build_tree(doc: &TreeDocument) -> Option<TreeNode> {
    let center_name = doc.center_name_hint();
    normalize::normalize(doc).map(|root| origin::resolve_origin(root, center_name.as_deref()))
}

/// Full pipeline from stored document to positioned layout. An empty
/// document gives an empty layout.
pub fn layout_document(doc: &TreeDocument, config: &LayoutConfig) -> FamilyLayout {
    build_tree(doc)
        .map(|tree| compute_layout(&tree, config))
        .unwrap_or_default()
}
