use crate::layout::{Curve, FamilyLayout};
use crate::position::PersonRef;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub min_x: f32,
    pub min_y: f32,
    pub origin_id: Option<String>,
    pub nodes: Vec<NodeDump>,
    pub merges: Vec<MergeDump>,
    pub branches: Vec<BranchDump>,
    pub marriages: Vec<MarriageDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub kind: &'static str,
    pub name: String,
    pub label: String,
    pub image: String,
    pub thumb: String,
    pub birthday: String,
    pub tags: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub row: i32,
    pub group_width: f32,
    pub meta: String,
    pub position: PersonRef,
    pub is_origin: bool,
    pub deletable: bool,
}

#[derive(Debug, Serialize)]
pub struct CurveDump {
    pub points: [[f32; 2]; 4],
}

impl From<&Curve> for CurveDump {
    fn from(curve: &Curve) -> Self {
        let point = |(x, y): (f32, f32)| [x, y];
        Self {
            points: [point(curve.start), point(curve.c1), point(curve.c2), point(curve.end)],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDump {
    pub union_id: String,
    pub person_id: String,
    pub meta: String,
    pub curve: CurveDump,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDump {
    pub union_id: Option<String>,
    pub parent_id: String,
    pub child_id: String,
    pub meta: String,
    pub curve: CurveDump,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarriageDump {
    pub union_id: String,
    pub person_id: String,
    pub spouse_id: String,
    pub meta: String,
    pub points: [[f32; 2]; 2],
}

impl LayoutDump {
    pub fn from_layout(layout: &FamilyLayout) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                kind: node.kind.as_str(),
                name: node.person.name.clone(),
                label: node.label.clone(),
                image: node.person.image.clone(),
                thumb: node.person.thumb.clone(),
                birthday: node.person.birthday.clone(),
                tags: node.person.tags.clone(),
                x: node.x,
                y: node.y,
                row: node.row,
                group_width: node.group_width,
                meta: node.position.to_string(),
                position: node.position.clone(),
                is_origin: node.is_origin,
                deletable: node.deletable,
            })
            .collect();

        let merges = layout
            .merges
            .iter()
            .map(|merge| MergeDump {
                union_id: merge.union_id.clone(),
                person_id: merge.person_id.clone(),
                meta: merge.position.to_string(),
                curve: CurveDump::from(&merge.curve),
            })
            .collect();

        let branches = layout
            .branches
            .iter()
            .map(|branch| BranchDump {
                union_id: branch.union_id.clone(),
                parent_id: branch.parent_id.clone(),
                child_id: branch.child_id.clone(),
                meta: branch.position.to_string(),
                curve: CurveDump::from(&branch.curve),
            })
            .collect();

        let marriages = layout
            .marriages
            .iter()
            .map(|line| MarriageDump {
                union_id: line.union_id.clone(),
                person_id: line.person_id.clone(),
                spouse_id: line.spouse_id.clone(),
                meta: line.position.to_string(),
                points: [[line.start.0, line.start.1], [line.end.0, line.end.1]],
            })
            .collect();

        LayoutDump {
            width: layout.bounds.width(),
            height: layout.bounds.height(),
            min_x: layout.bounds.min_x,
            min_y: layout.bounds.min_y,
            origin_id: layout.origin_id.clone(),
            nodes,
            merges,
            branches,
            marriages,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &FamilyLayout) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
