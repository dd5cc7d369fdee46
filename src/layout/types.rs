use crate::model::Person;
use crate::position::PersonRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Primary,
    Spouse,
    Ancestor,
    AncestorSpouse,
}

impl NodeKind {
    pub fn is_ancestor(self) -> bool {
        matches!(self, Self::Ancestor | Self::AncestorSpouse)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Spouse => "spouse",
            Self::Ancestor => "ancestor",
            Self::AncestorSpouse => "ancestorSpouse",
        }
    }
}

/// One positioned card. `x`/`y` are the card centre.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub kind: NodeKind,
    pub person: Person,
    pub label: String,
    pub x: f32,
    pub y: f32,
    /// Generation row: 0 is the origin, negative rows are ancestors.
    pub row: i32,
    pub group_width: f32,
    pub position: PersonRef,
    pub is_origin: bool,
    pub deletable: bool,
}

/// Cubic Bézier segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curve {
    pub start: (f32, f32),
    pub c1: (f32, f32),
    pub c2: (f32, f32),
    pub end: (f32, f32),
}

/// Curve from a partner's inner card edge down to the union merge point.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeCurve {
    pub union_id: String,
    pub person_id: String,
    pub position: PersonRef,
    pub curve: Curve,
}

/// Curve from a merge point or single-parent junction to the top of a child.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchCurve {
    pub union_id: Option<String>,
    pub parent_id: String,
    pub child_id: String,
    pub position: PersonRef,
    pub curve: Curve,
}

/// Flat line between the inner edges of a childless couple.
#[derive(Debug, Clone, PartialEq)]
pub struct MarriageLine {
    pub union_id: String,
    pub person_id: String,
    pub spouse_id: String,
    pub position: PersonRef,
    pub start: (f32, f32),
    pub end: (f32, f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyLayout {
    pub nodes: Vec<LayoutNode>,
    pub merges: Vec<MergeCurve>,
    pub branches: Vec<BranchCurve>,
    pub marriages: Vec<MarriageLine>,
    pub bounds: Bounds,
    pub origin_id: Option<String>,
}

impl FamilyLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.person.name == name)
    }

    pub fn row(&self, row: i32) -> Vec<&LayoutNode> {
        let mut nodes: Vec<&LayoutNode> = self.nodes.iter().filter(|node| node.row == row).collect();
        nodes.sort_by(|a, b| a.x.total_cmp(&b.x));
        nodes
    }
}
