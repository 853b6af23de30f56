// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{QName, StatementKeyword};
use crate::schema::{EffectiveModule, EffectiveStatement, SchemaContext};
use crate::tests::common::*;
use crate::Rc;

use anyhow::Result;
use serde_json::json;

use StatementKeyword::*;

fn empty_root() -> EffectiveStatement {
    EffectiveStatement {
        keyword: Module,
        arg: None,
        name: None,
        type_def: None,
        substatements: vec![],
    }
}

fn revision_of(namespace: &str, name: &str, revision: Option<&str>) -> Rc<EffectiveModule> {
    Rc::new(EffectiveModule {
        name: name.to_string(),
        namespace: namespace.to_string(),
        prefix: name.to_string(),
        revision: revision.map(str::to_string),
        root: empty_root(),
    })
}

#[test]
fn module_by_namespace_picks_latest_revision() {
    let schema = SchemaContext::new(
        vec![
            revision_of("urn:a", "a-old", Some("2020-01-01")),
            revision_of("urn:a", "a-new", Some("2023-05-01")),
            revision_of("urn:b", "b", None),
        ],
        vec![],
        vec![],
    );

    let picked = schema.module_by_namespace("urn:a", None).expect("module");
    assert_eq!(picked.name, "a-new");

    let pinned = schema
        .module_by_namespace("urn:a", Some("2020-01-01"))
        .expect("module");
    assert_eq!(pinned.name, "a-old");

    assert!(schema.module_by_namespace("urn:a", Some("2021-01-01")).is_none());
    assert!(schema.module_by_namespace("urn:c", None).is_none());
}

#[test]
fn find_node_descends_through_uses() -> Result<()> {
    let m = module("m", "m")
        .with(stmt(Grouping, Some("g")).with(leaf("inner", "string")))
        .with(
            stmt(Container, Some("outer"))
                .with(stmt(Uses, Some("g")))
                .with(leaf("direct", "string")),
        );
    let schema = build(vec![m])?;

    assert!(schema
        .find_node(&[QName::new("m", "outer"), QName::new("m", "direct")])
        .is_some());
    // The expanded leaf sits under the `uses` statement but is addressable
    // as a direct child of the container.
    assert!(schema
        .find_node(&[QName::new("m", "outer"), QName::new("m", "inner")])
        .is_some());
    Ok(())
}

#[test]
fn effective_statements_expose_substatements() -> Result<()> {
    let m = module("m", "m").with(
        stmt(Leaf, Some("v"))
            .with(ty("string"))
            .with(stmt(Description, Some("a value")))
            .with(stmt(Mandatory, Some("true"))),
    );
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    assert_eq!(
        v.child(Description).and_then(|d| d.arg_str()),
        Some("a value")
    );
    assert_eq!(v.children(Type).count(), 1);
    Ok(())
}

#[test]
fn type_definitions_are_collected_once() -> Result<()> {
    // Two leaves referring to the same typedef share one definition.
    let m = module("m", "m")
        .with(typedef("t", ty("int32").with(stmt(Range, Some("0..5")))))
        .with(leaf("a", "t"))
        .with(leaf("b", "t"));
    let schema = build(vec![m])?;
    let mine: Vec<_> = schema
        .type_definitions()
        .iter()
        .filter(|d| d.name == QName::new("m", "t"))
        .collect();
    assert_eq!(mine.len(), 1);
    Ok(())
}

#[test]
fn built_type_serializes_with_structured_ranges() -> Result<()> {
    let m = module("m", "m")
        .with(typedef(
            "t",
            ty("int32").with(stmt(Range, Some("3..9|11..max"))),
        ))
        .with(leaf("v", "t"));
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    let def = v.type_def.as_ref().expect("type");

    let value = serde_json::to_value(def.as_ref())?;
    assert_eq!(value["name"], json!({"module": "m", "name": "t"}));
    assert_eq!(
        value["body"]["numeric"]["range"]["intervals"],
        json!([[3, 9], [11, 2147483647]])
    );
    assert_eq!(value["body"]["numeric"]["kind"], json!("int32"));
    Ok(())
}
