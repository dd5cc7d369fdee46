use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use family_tree_layout::layout::compute_layout;
use family_tree_layout::mutation::{add_member, remove_spouse};
use family_tree_layout::{LayoutConfig, MemberInput, MemberPath, PersonRef, Relation, TreeDocument, build_tree};
use serde_json::{Value, json};
use std::hint::black_box;

/// Couple-schema family `generations` deep where every person has
/// `fanout` children spread over two unions.
fn synthetic_family(generations: usize, fanout: usize) -> Value {
    fn person(label: String, depth: usize, generations: usize, fanout: usize) -> Value {
        let mut value = json!({
            "name": label,
            "birthday": format!("{:02}/{:02}/19{:02}", depth + 1, depth % 12 + 1, 40 + depth),
            "spouse": [format!("{label} spouse"), format!("{label} second")],
        });
        if depth + 1 < generations {
            let children: Vec<Value> = (0..fanout)
                .map(|index| {
                    let mut child = person(format!("{label}.{index}"), depth + 1, generations, fanout);
                    child["fromSpouseIndex"] = json!(index % 2);
                    child
                })
                .collect();
            value["children"] = Value::Array(children);
        }
        value
    }
    let mut root = person("P".to_string(), 0, generations, fanout);
    root["parents"] = json!({"name": "Elder", "parents": {"name": "Eldest"}});
    root
}

fn deep_origin(generations: usize, fanout: usize) -> Value {
    let mut family = synthetic_family(generations, fanout);
    let mut node = &mut family;
    for _ in 1..generations {
        node = &mut node["children"][fanout - 1];
    }
    node["isOrigin"] = json!(true);
    family
}

const SIZES: [(usize, usize); 4] = [(3, 2), (4, 3), (5, 3), (6, 3)];

fn bench_build_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_tree");
    for (generations, fanout) in SIZES {
        let doc = TreeDocument::from_value(deep_origin(generations, fanout)).expect("synthetic family parses");
        let id = format!("g{generations}_f{fanout}");
        group.bench_with_input(BenchmarkId::from_parameter(id), &doc, |b, doc| {
            b.iter(|| {
                let tree = build_tree(black_box(doc));
                black_box(tree.map(|tree| tree.count_nodes()));
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    for (generations, fanout) in SIZES {
        for (label, value) in [
            ("root", synthetic_family(generations, fanout)),
            ("deep_origin", deep_origin(generations, fanout)),
        ] {
            let doc = TreeDocument::from_value(value).expect("synthetic family parses");
            let tree = build_tree(&doc).expect("synthetic family is not empty");
            let id = format!("{label}_g{generations}_f{fanout}");
            group.bench_with_input(BenchmarkId::from_parameter(id), &tree, |b, tree| {
                b.iter(|| {
                    let layout = compute_layout(black_box(tree), &config);
                    black_box(layout.nodes.len());
                });
            });
        }
    }
    group.finish();
}

fn bench_edit_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_cycle");
    let config = LayoutConfig::default();
    let doc = TreeDocument::from_value(synthetic_family(5, 3)).expect("synthetic family parses");
    let root = PersonRef::member(MemberPath::Couple { path: Vec::new() });
    let second = PersonRef::spouse(root.clone(), 1);
    let input = MemberInput::named("Newborn");
    group.bench_function("add_child_remove_spouse_relayout", |b| {
        b.iter(|| {
            let mut doc = doc.clone();
            add_member(&mut doc, &second, Relation::Child, &input).expect("add failed");
            remove_spouse(&mut doc, &root, 1).expect("remove failed");
            let layout = build_tree(&doc).map(|tree| compute_layout(&tree, &config));
            black_box(layout.map(|layout| layout.bounds.width()));
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_build_tree, bench_layout, bench_edit_cycle
);
criterion_main!(benches);
