// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Supports for data tree statements. Schema nodes claim their path at full
//! declaration; `uses` and `augment` expand by copying, then bring the copies
//! up to the current phase so the lock-step progression is preserved.

use crate::action::{InferenceAction, Prerequisite};
use crate::ast::{ArgValue, QName, StatementKeyword};
use crate::context::{ContextId, ModelPhase, Origin};
use crate::error::StructuralError;
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceValue};
use crate::reactor::SessionState;
use crate::source::Span;
use crate::support::{ArgSpec, StatementSupport};

use anyhow::Result;

/// Parse an absolute schema path (`/a/b` or `/p:a/p:b`) into qualified
/// segments, resolving prefixes against `scope`. Unprefixed segments default
/// to the module of the first segment. List key predicates are ignored. The
/// returned context is the module root owning the target tree.
pub(crate) fn parse_schema_path(
    st: &SessionState,
    keyword: StatementKeyword,
    text: &str,
    scope: ContextId,
    span: &Span,
) -> Result<(ContextId, Vec<QName>), StructuralError> {
    let malformed = |reason: &str| StructuralError::MalformedArgument {
        keyword,
        text: text.to_string(),
        reason: reason.to_string(),
        at: span.location(),
    };
    let body = match text.strip_prefix('/') {
        Some(b) => b,
        None => return Err(malformed("expected an absolute schema path")),
    };
    let mut target_root: Option<ContextId> = None;
    let mut segments = vec![];
    for seg in body.split('/') {
        let seg = seg.split('[').next().unwrap_or(seg).trim();
        if seg.is_empty() {
            return Err(malformed("empty path segment"));
        }
        let (prefix, name) = match seg.split_once(':') {
            Some((p, n)) => (Some(p), n),
            None => (None, seg),
        };
        let seg_root = match prefix {
            Some(p) => st.resolve_prefix(scope, p, span)?,
            None => target_root.unwrap_or(scope),
        };
        if target_root.is_none() {
            target_root = Some(seg_root);
        }
        segments.push(QName::new(&st.module_name(seg_root), name));
    }
    Ok((target_root.unwrap_or(scope), segments))
}

/// Shared support for the schema node statements. Nodes inside a grouping or
/// augment body are templates and claim no path; their expanded copies do.
pub struct DataNodeSupport {
    kw: StatementKeyword,
}

impl StatementSupport for DataNodeSupport {
    fn keyword(&self) -> StatementKeyword {
        self.kw
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }

    fn full_declaration(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.in_template(id) || st.in_submodule_tree(id) {
            return Ok(());
        }
        let path = st.schema_path(id);
        let span = st.ctx(id).span.clone();
        let root = st.module_root(id);
        st.namespaces.put(
            NamespaceKind::SchemaNode,
            NamespaceScope::Module(root),
            NamespaceKey::Path(path),
            NamespaceValue::Context(id),
            &span,
        )?;
        Ok(())
    }
}

pub static CONTAINER: DataNodeSupport = DataNodeSupport {
    kw: StatementKeyword::Container,
};
pub static LEAF: DataNodeSupport = DataNodeSupport {
    kw: StatementKeyword::Leaf,
};
pub static LEAF_LIST: DataNodeSupport = DataNodeSupport {
    kw: StatementKeyword::LeafList,
};
pub static LIST: DataNodeSupport = DataNodeSupport {
    kw: StatementKeyword::List,
};
pub static CHOICE: DataNodeSupport = DataNodeSupport {
    kw: StatementKeyword::Choice,
};
pub static CASE: DataNodeSupport = DataNodeSupport {
    kw: StatementKeyword::Case,
};

pub struct UsesSupport;

impl StatementSupport for UsesSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Uses
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::NodeId
    }

    // Expansion copies the grouping's data nodes under the `uses` statement.
    // The copies resolve unprefixed references against the grouping's module
    // but occupy the schema namespace of the use site.
    fn full_declaration(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.in_submodule_tree(id) {
            return Ok(());
        }
        let (prefix, name, span) = {
            let ctx = st.ctx(id);
            match &ctx.arg {
                Some(ArgValue::NodeId { prefix, name }) => {
                    (prefix.clone(), name.clone(), ctx.span.clone())
                }
                _ => {
                    return Err(StructuralError::MissingArgument {
                        keyword: StatementKeyword::Uses,
                        at: ctx.span.location(),
                    }
                    .into())
                }
            }
        };
        let scope = st.resolution_scope(id);
        let grouping_scope = match &prefix {
            Some(p) => st.resolve_prefix(scope, p, &span)?,
            None => scope,
        };
        let name_module = st.ctx(id).name_module.clone();
        let action = InferenceAction::new(
            id,
            Box::new(move |st: &mut SessionState, values| {
                let grouping = match values.into_iter().next() {
                    Some(NamespaceValue::Context(g)) => g,
                    _ => return Ok(()),
                };
                let body: Vec<ContextId> = st
                    .ctx(grouping)
                    .children
                    .iter()
                    .filter(|&&c| {
                        let kw = st.ctx(c).keyword;
                        kw.is_schema_node() || kw == StatementKeyword::Uses
                    })
                    .cloned()
                    .collect();
                for child in body {
                    let copy = st.copy_subtree(
                        child,
                        id,
                        grouping_scope,
                        name_module.clone(),
                        Origin::Expanded,
                    );
                    st.catch_up(copy, ModelPhase::FullDeclaration)?;
                }
                Ok(())
            }),
        )
        .requires(Prerequisite::new(
            NamespaceKind::Grouping,
            NamespaceScope::Module(grouping_scope),
            NamespaceKey::Name(name),
            ModelPhase::StatementDefinition,
        ))
        .mutates(NamespaceKind::SchemaNode);
        st.enqueue(action);
        Ok(())
    }
}
pub static USES: UsesSupport = UsesSupport;

pub struct AugmentSupport;

impl StatementSupport for AugmentSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Augment
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Text
    }

    // Grafting waits for the target node to claim its path, which may itself
    // happen through grouping expansion or another augment. Grafted nodes
    // keep the augmenting module's name in schema paths.
    fn full_declaration(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.in_submodule_tree(id) {
            return Ok(());
        }
        let span = st.ctx(id).span.clone();
        let text = match st.ctx(id).raw_arg.clone() {
            Some(t) => t,
            None => {
                return Err(StructuralError::MissingArgument {
                    keyword: StatementKeyword::Augment,
                    at: span.location(),
                }
                .into())
            }
        };
        let scope = st.resolution_scope(id);
        let (target_root, segments) =
            parse_schema_path(st, StatementKeyword::Augment, &text, scope, &span)?;
        let aug_scope = st.module_root(id);
        let aug_module = st.node_module_name(id);
        let action = InferenceAction::new(
            id,
            Box::new(move |st: &mut SessionState, values| {
                let target = match values.into_iter().next() {
                    Some(NamespaceValue::Context(t)) => t,
                    _ => return Ok(()),
                };
                let body: Vec<ContextId> = st
                    .ctx(id)
                    .children
                    .iter()
                    .filter(|&&c| {
                        let ctx = st.ctx(c);
                        (ctx.keyword.is_schema_node() || ctx.keyword == StatementKeyword::Uses)
                            && ctx.origin == Origin::Declared
                    })
                    .cloned()
                    .collect();
                for child in body {
                    let copy = st.copy_subtree(
                        child,
                        target,
                        aug_scope,
                        Some(aug_module.clone()),
                        Origin::Expanded,
                    );
                    st.catch_up(copy, ModelPhase::FullDeclaration)?;
                }
                Ok(())
            }),
        )
        .requires(Prerequisite::new(
            NamespaceKind::SchemaNode,
            NamespaceScope::Module(target_root),
            NamespaceKey::Path(segments),
            ModelPhase::FullDeclaration,
        ))
        .mutates(NamespaceKind::SchemaNode);
        st.enqueue(action);
        Ok(())
    }
}
pub static AUGMENT: AugmentSupport = AugmentSupport;
