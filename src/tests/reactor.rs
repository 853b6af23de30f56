// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{QName, RawStatement, StatementKeyword};
use crate::context::ContextId;
use crate::error::{BuildError, ReferenceError, StructuralError};
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceStore, NamespaceValue};
use crate::reactor::BuildSession;
use crate::source::{Source, Span};
use crate::tests::common::*;
use crate::types::TypeKind;

use anyhow::Result;

use StatementKeyword::*;

#[test]
fn minimal_module() -> Result<()> {
    let m = module("net", "n")
        .with(stmt(Revision, Some("2024-01-01")))
        .with(stmt(Revision, Some("2024-06-30")))
        .with(leaf("host", "string"));
    let schema = build(vec![m])?;

    let net = schema.module("net").expect("module should exist");
    assert_eq!(net.namespace, "urn:net");
    assert_eq!(net.prefix, "n");
    assert_eq!(net.revision.as_deref(), Some("2024-06-30"));

    let host = schema
        .find_node(&[QName::new("net", "host")])
        .expect("leaf should be registered");
    assert_eq!(host.keyword, Leaf);
    let def = host.type_def.as_ref().expect("leaf type should be built");
    assert_eq!(def.kind(), TypeKind::String);
    Ok(())
}

#[test]
fn unknown_statement_is_rejected() {
    let m = module("m", "m").with(RawStatement::unknown("vendor-magic", Some("x"), span()));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Structural(StructuralError::UnknownStatement { keyword, .. })) => {
            assert_eq!(keyword, "vendor-magic");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn duplicate_typedef_is_rejected() {
    let m = module("m", "m")
        .with(typedef("t", ty("string")))
        .with(typedef("t", ty("int32")));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Structural(StructuralError::DuplicateDeclaration { key, .. })) => {
            assert_eq!(key, "t")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn duplicate_schema_node_is_rejected() {
    let m = module("m", "m")
        .with(
            stmt(Container, Some("c"))
                .with(leaf("x", "string"))
                .with(leaf("x", "int32")),
        );
    let err = build(vec![m]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::Structural(
            StructuralError::DuplicateDeclaration { .. }
        ))
    ));
}

#[test]
fn typedef_forward_reference() -> Result<()> {
    // The leaf's type statement appears before the typedef it refers to;
    // resolution must not depend on source order.
    let m = module("m", "m")
        .with(leaf("v", "t"))
        .with(typedef("t", ty("int32")));
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    let def = v.type_def.as_ref().expect("type");
    assert_eq!(def.name, QName::new("m", "t"));
    assert_eq!(def.kind(), TypeKind::Int32);
    Ok(())
}

#[test]
fn import_resolves_regardless_of_source_order() -> Result<()> {
    let app = module("app", "a")
        .with(stmt(Import, Some("net")).with(stmt(Prefix, Some("n"))))
        .with(leaf("peer", "n:addr"));
    let net = module("net", "n").with(typedef("addr", ty("string")));
    // The importing module is handed over first.
    let schema = build(vec![app, net])?;
    let peer = schema.find_node(&[QName::new("app", "peer")]).expect("leaf");
    let def = peer.type_def.as_ref().expect("type");
    assert_eq!(def.name, QName::new("net", "addr"));
    Ok(())
}

#[test]
fn missing_typedef_stalls() {
    let m = module("m", "m").with(leaf("v", "nope"));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Reference(ReferenceError::Stalled { unresolved, .. })) => {
            assert_eq!(unresolved.len(), 1);
            assert_eq!(unresolved[0].key, "nope");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn circular_typedefs_stall_with_both_participants() {
    let m = module("m", "m")
        .with(typedef("a", ty("b")))
        .with(typedef("b", ty("a")));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Reference(ReferenceError::Stalled { phase, unresolved })) => {
            assert_eq!(phase, "effective-model");
            assert_eq!(unresolved.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_prefix_is_rejected() {
    let m = module("m", "m").with(leaf("v", "zz:t"));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Structural(StructuralError::UnknownPrefix { prefix, .. })) => {
            assert_eq!(prefix, "zz")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn leaf_without_type_is_rejected() {
    let m = module("m", "m").with(stmt(Leaf, Some("v")));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Structural(StructuralError::TooFew { parent, child, .. })) => {
            assert_eq!(*parent, Leaf);
            assert_eq!(*child, Type);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn bits_without_members_is_rejected() {
    let m = module("m", "m").with(stmt(Leaf, Some("flags")).with(ty("bits")));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Structural(StructuralError::TooFew { parent, child, .. })) => {
            assert_eq!(*parent, Type);
            assert_eq!(*child, Bit);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn grouping_expansion() -> Result<()> {
    let m = module("m", "m")
        .with(
            stmt(Grouping, Some("endpoint"))
                .with(leaf("host", "string"))
                .with(leaf("port", "uint16")),
        )
        .with(stmt(Container, Some("server")).with(stmt(Uses, Some("endpoint"))))
        .with(stmt(Container, Some("client")).with(stmt(Uses, Some("endpoint"))));
    let schema = build(vec![m])?;

    // Each use site carries an independent copy.
    for parent in ["server", "client"] {
        let host = schema
            .find_node(&[QName::new("m", parent), QName::new("m", "host")])
            .unwrap_or_else(|| panic!("{parent}/host should exist"));
        assert_eq!(host.type_def.as_ref().map(|d| d.kind()), Some(TypeKind::String));
    }
    Ok(())
}

#[test]
fn grouping_across_modules_resolves_in_defining_module() -> Result<()> {
    // The grouping's leaf refers to a typedef of the defining module; the
    // using module has no typedef of that name.
    let lib = module("lib", "l")
        .with(typedef("port", ty("uint16")))
        .with(stmt(Grouping, Some("sock")).with(leaf("port", "port")));
    let app = module("app", "a")
        .with(stmt(Import, Some("lib")).with(stmt(Prefix, Some("l"))))
        .with(stmt(Container, Some("conn")).with(stmt(Uses, Some("l:sock"))));
    let schema = build(vec![lib, app])?;
    let port = schema
        .find_node(&[QName::new("app", "conn"), QName::new("app", "port")])
        .expect("expanded leaf");
    assert_eq!(port.type_def.as_ref().map(|d| d.name.clone()), Some(QName::new("lib", "port")));
    Ok(())
}

#[test]
fn nested_uses_re_expands() -> Result<()> {
    let m = module("m", "m")
        .with(stmt(Grouping, Some("inner")).with(leaf("x", "string")))
        .with(stmt(Grouping, Some("outer")).with(stmt(Uses, Some("inner"))))
        .with(stmt(Container, Some("c")).with(stmt(Uses, Some("outer"))));
    let schema = build(vec![m])?;
    assert!(schema
        .find_node(&[QName::new("m", "c"), QName::new("m", "x")])
        .is_some());
    Ok(())
}

#[test]
fn missing_grouping_stalls() {
    let m = module("m", "m")
        .with(stmt(Container, Some("c")).with(stmt(Uses, Some("ghost"))));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Reference(ReferenceError::Stalled { phase, unresolved })) => {
            assert_eq!(phase, "full-declaration");
            assert_eq!(unresolved[0].key, "ghost");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn augment_grafts_into_foreign_module() -> Result<()> {
    let base = module("base", "b").with(stmt(Container, Some("top")));
    let ext = module("ext", "e")
        .with(stmt(Import, Some("base")).with(stmt(Prefix, Some("b"))))
        .with(stmt(Augment, Some("/b:top")).with(leaf("extra", "string")));
    let schema = build(vec![base, ext])?;

    // Grafted nodes keep the augmenting module's name.
    let extra = schema
        .find_node(&[QName::new("base", "top"), QName::new("ext", "extra")])
        .expect("grafted leaf");
    assert_eq!(extra.name, Some(QName::new("ext", "extra")));
    Ok(())
}

#[test]
fn augment_into_augmented_node() -> Result<()> {
    let base = module("base", "b").with(stmt(Container, Some("top")));
    let mid = module("mid", "m")
        .with(stmt(Import, Some("base")).with(stmt(Prefix, Some("b"))))
        .with(stmt(Augment, Some("/b:top")).with(stmt(Container, Some("shelf"))));
    let ext = module("ext", "e")
        .with(stmt(Import, Some("base")).with(stmt(Prefix, Some("b"))))
        .with(stmt(Import, Some("mid")).with(stmt(Prefix, Some("m"))))
        .with(stmt(Augment, Some("/b:top/m:shelf")).with(leaf("item", "string")));
    let schema = build(vec![ext, mid, base])?;
    assert!(schema
        .find_node(&[
            QName::new("base", "top"),
            QName::new("mid", "shelf"),
            QName::new("ext", "item"),
        ])
        .is_some());
    Ok(())
}

#[test]
fn augment_missing_target_stalls() {
    let m = module("m", "m").with(stmt(Augment, Some("/nothing")).with(leaf("x", "string")));
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Reference(ReferenceError::Stalled { phase, .. })) => {
            assert_eq!(phase, "full-declaration");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn include_folds_submodule_content() -> Result<()> {
    let m = module("m", "mm")
        .with(stmt(Include, Some("s")))
        .with(leaf("own", "shared"));
    let s = stmt(Submodule, Some("s"))
        .with(stmt(BelongsTo, Some("m")).with(stmt(Prefix, Some("mm"))))
        .with(typedef("shared", ty("int8")))
        .with(leaf("inherited", "shared"));
    let schema = build(vec![m, s])?;

    // Submodule leaves appear under the including module.
    let inherited = schema
        .find_node(&[QName::new("m", "inherited")])
        .expect("folded leaf");
    assert_eq!(inherited.type_def.as_ref().map(|d| d.kind()), Some(TypeKind::Int8));
    // A module leaf can use a submodule typedef.
    let own = schema.find_node(&[QName::new("m", "own")]).expect("leaf");
    assert_eq!(own.type_def.as_ref().map(|d| d.name.clone()), Some(QName::new("m", "shared")));
    Ok(())
}

#[test]
fn list_key_must_name_a_leaf() {
    let m = module("m", "m").with(
        stmt(List, Some("servers"))
            .with(stmt(Key, Some("name")))
            .with(leaf("address", "string")),
    );
    let err = build(vec![m]).unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::Structural(StructuralError::MissingListKey { list, key, .. })) => {
            assert_eq!(list, "servers");
            assert_eq!(key, "name");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn list_key_found_through_grouping() -> Result<()> {
    let m = module("m", "m")
        .with(stmt(Grouping, Some("named")).with(leaf("name", "string")))
        .with(
            stmt(List, Some("servers"))
                .with(stmt(Key, Some("name")))
                .with(stmt(Uses, Some("named"))),
        );
    build(vec![m]).map(|_| ())
}

#[test]
fn identity_hierarchy() -> Result<()> {
    let m = module("ids", "i")
        .with(stmt(Identity, Some("crypto")))
        .with(stmt(Identity, Some("aes")).with(stmt(Base, Some("crypto"))))
        .with(stmt(Identity, Some("aes256")).with(stmt(Base, Some("aes"))))
        .with(
            stmt(Leaf, Some("alg"))
                .with(ty("identityref").with(stmt(Base, Some("crypto")))),
        );
    let schema = build(vec![m])?;

    let crypto = QName::new("ids", "crypto");
    assert!(schema.identity_is_derived_from(&QName::new("ids", "aes256"), &crypto));
    assert!(!schema.identity_is_derived_from(&crypto, &QName::new("ids", "aes")));
    assert_eq!(
        schema.derived_identities(&crypto),
        vec![QName::new("ids", "aes"), QName::new("ids", "aes256")]
    );
    Ok(())
}

#[test]
fn identity_base_may_point_forward() -> Result<()> {
    let m = module("ids", "i")
        .with(stmt(Identity, Some("leaf-alg")).with(stmt(Base, Some("alg"))))
        .with(stmt(Identity, Some("alg")));
    let schema = build(vec![m])?;
    let def = schema.identity(&QName::new("ids", "leaf-alg")).expect("identity");
    assert_eq!(def.bases, vec![QName::new("ids", "alg")]);
    Ok(())
}

#[test]
fn identity_missing_base_stalls() {
    let m = module("ids", "i").with(stmt(Identity, Some("x")).with(stmt(Base, Some("ghost"))));
    let err = build(vec![m]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::Reference(ReferenceError::Stalled { .. }))
    ));
}

#[test]
fn leafref_target_must_exist() {
    let m = module("m", "m")
        .with(stmt(Leaf, Some("r")).with(ty("leafref").with(stmt(Path, Some("/gone")))));
    let err = build(vec![m]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::Reference(ReferenceError::Stalled { .. }))
    ));
}

#[test]
fn leafref_resolves_within_module() -> Result<()> {
    let m = module("m", "m")
        .with(leaf("host", "string"))
        .with(stmt(Leaf, Some("r")).with(ty("leafref").with(stmt(Path, Some("/host")))));
    let schema = build(vec![m])?;
    let r = schema.find_node(&[QName::new("m", "r")]).expect("leaf");
    let def = r.type_def.as_ref().expect("type");
    assert_eq!(def.kind(), TypeKind::Leafref);
    Ok(())
}

#[test]
fn errors_carry_caret_diagnostics() {
    let text = "module m { leaf v { type nope; } }";
    let source = Source::from_contents("m.yang".to_string(), text.to_string()).expect("source");
    let at = |col: u32| Span {
        source: source.clone(),
        line: 1,
        col,
        start: 0,
        end: 0,
    };
    let m = RawStatement::new(Module, Some("m"), at(1))
        .with(RawStatement::new(Namespace, Some("urn:m"), at(1)))
        .with(RawStatement::new(Prefix, Some("m"), at(1)))
        .with(
            RawStatement::new(Leaf, Some("v"), at(12))
                .with(RawStatement::new(Type, Some("nope"), at(21))),
        );
    let err = BuildSession::new().add_source(m).build().unwrap_err();

    // The rendered message points at the offending statement with a caret.
    let rendered = format!("{err}");
    assert!(rendered.contains("--> m.yang:1:21"), "no location header in: {rendered}");
    assert!(rendered.contains('^'), "no caret marker in: {rendered}");
    // The typed payload stays reachable underneath the rendering.
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::Reference(ReferenceError::Stalled { .. }))
    ));
}

#[test]
fn namespace_writes_outside_declared_intents_are_rejected() {
    let mut ns = NamespaceStore::new();
    ns.begin_intents(vec![NamespaceKind::Prefix]);
    let err = ns
        .put(
            NamespaceKind::Typedef,
            NamespaceScope::Global,
            NamespaceKey::Name("t".to_string()),
            NamespaceValue::Context(ContextId(0)),
            &span(),
        )
        .unwrap_err();
    assert!(matches!(err, StructuralError::UndeclaredWrite { .. }));
    ns.end_intents();
    ns.put(
        NamespaceKind::Typedef,
        NamespaceScope::Global,
        NamespaceKey::Name("t".to_string()),
        NamespaceValue::Context(ContextId(0)),
        &span(),
    )
    .expect("writes are unrestricted outside an action");
}

#[test]
fn rebuild_is_idempotent() -> Result<()> {
    let make = || {
        vec![module("m", "m")
            .with(typedef("t", ty("int32").with(stmt(Range, Some("0..10")))))
            .with(stmt(Container, Some("c")).with(leaf("v", "t")))]
    };
    let first = build(make())?;
    let second = build(make())?;
    assert_eq!(first, second);
    Ok(())
}
