// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Supports for body definitions: typedefs, groupings, identities and
//! features. These declare module-scope symbols at statement definition;
//! expanded copies skip declaration, the original already owns the name.

use crate::action::{InferenceAction, Prerequisite};
use crate::ast::{ArgValue, QName, StatementKeyword};
use crate::context::{ContextId, ModelPhase, Origin};
use crate::error::StructuralError;
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceValue};
use crate::reactor::SessionState;
use crate::support::{ArgSpec, StatementSupport};

use anyhow::Result;

/// Resolve a possibly prefixed node reference argument (`base`, `type`) to a
/// qualified name, using the prefixes visible in `scope_root`.
pub(crate) fn node_ref_qname(
    st: &SessionState,
    id: ContextId,
    scope_root: ContextId,
) -> Result<QName, StructuralError> {
    let ctx = st.ctx(id);
    let (prefix, name) = match &ctx.arg {
        Some(ArgValue::NodeId { prefix, name }) => (prefix.clone(), name.clone()),
        _ => {
            return Err(StructuralError::MissingArgument {
                keyword: ctx.keyword,
                at: ctx.span.location(),
            })
        }
    };
    let module = match prefix {
        Some(p) => {
            let target = st.resolve_prefix(scope_root, &p, &ctx.span)?;
            st.module_name(target)
        }
        None => st.module_name(scope_root),
    };
    Ok(QName::new(&module, &name))
}

fn declare_in_module(
    st: &mut SessionState,
    id: ContextId,
    namespace: NamespaceKind,
) -> Result<()> {
    if st.ctx(id).origin != Origin::Declared {
        return Ok(());
    }
    let name = st.ctx(id).name().to_string();
    let span = st.ctx(id).span.clone();
    let root = st.module_root(id);
    st.namespaces.put(
        namespace,
        NamespaceScope::Module(root),
        NamespaceKey::Name(name),
        NamespaceValue::Context(id),
        &span,
    )?;
    Ok(())
}

pub struct TypedefSupport;

impl StatementSupport for TypedefSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Typedef
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }
    fn statement_definition(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        declare_in_module(st, id, NamespaceKind::Typedef)
    }
}
pub static TYPEDEF: TypedefSupport = TypedefSupport;

pub struct GroupingSupport;

impl StatementSupport for GroupingSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Grouping
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }
    fn statement_definition(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        declare_in_module(st, id, NamespaceKind::Grouping)
    }
}
pub static GROUPING: GroupingSupport = GroupingSupport;

pub struct FeatureSupport;

impl StatementSupport for FeatureSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Feature
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }
    fn statement_definition(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        declare_in_module(st, id, NamespaceKind::Feature)
    }
}
pub static FEATURE: FeatureSupport = FeatureSupport;

pub struct IdentitySupport;

impl StatementSupport for IdentitySupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Identity
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }

    // Identities are globally visible by qualified name.
    fn statement_definition(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.ctx(id).origin != Origin::Declared {
            return Ok(());
        }
        let name = st.ctx(id).name().to_string();
        let span = st.ctx(id).span.clone();
        let module = st.module_name(st.module_root(id));
        st.namespaces.put(
            NamespaceKind::Identity,
            NamespaceScope::Global,
            NamespaceKey::Qualified(QName::new(&module, &name)),
            NamespaceValue::Context(id),
            &span,
        )?;
        Ok(())
    }

    // Base references may point forward or across modules; the base edges
    // are recorded once every referenced identity exists. One action per
    // identity keeps the declared base order.
    fn full_declaration(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.ctx(id).origin != Origin::Declared || st.in_submodule_tree(id) {
            return Ok(());
        }
        let base_children = st.children_of(id, StatementKeyword::Base);
        if base_children.is_empty() {
            return Ok(());
        }
        let scope = st.resolution_scope(id);
        let module = st.module_name(st.module_root(id));
        let self_name = QName::new(&module, st.ctx(id).name());
        let bases: Vec<QName> = base_children
            .iter()
            .map(|&b| node_ref_qname(st, b, scope))
            .collect::<Result<_, _>>()?;
        let mut action = InferenceAction::new(
            id,
            Box::new({
                let bases = bases.clone();
                move |st: &mut SessionState, _values| {
                    st.identity_bases.insert(self_name, bases);
                    Ok(())
                }
            }),
        )
        .mutates(NamespaceKind::Identity);
        for qname in bases {
            action = action.requires(Prerequisite::new(
                NamespaceKind::Identity,
                NamespaceScope::Global,
                NamespaceKey::Qualified(qname),
                ModelPhase::StatementDefinition,
            ));
        }
        st.enqueue(action);
        Ok(())
    }
}
pub static IDENTITY: IdentitySupport = IdentitySupport;

pub struct IfFeatureSupport;

impl StatementSupport for IfFeatureSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::IfFeature
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Text
    }

    // A plain feature name must refer to a declared feature. Boolean
    // feature expressions are carried through without verification.
    fn full_declaration(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.in_submodule_tree(id) {
            return Ok(());
        }
        let ctx = st.ctx(id);
        let span = ctx.span.clone();
        let text = ctx.raw_arg.clone().unwrap_or_default();
        if text.chars().any(|c| c.is_whitespace() || c == '(') {
            return Ok(());
        }
        let scope = st.resolution_scope(id);
        let target = match text.split_once(':') {
            Some((prefix, _)) => st.resolve_prefix(scope, prefix, &span)?,
            None => scope,
        };
        let name = match text.split_once(':') {
            Some((_, name)) => name.to_string(),
            None => text,
        };
        let action = InferenceAction::new(
            id,
            Box::new(move |_st, _values| Ok(())),
        )
        .requires(Prerequisite::new(
            NamespaceKind::Feature,
            NamespaceScope::Module(target),
            NamespaceKey::Name(name),
            ModelPhase::StatementDefinition,
        ));
        st.enqueue(action);
        Ok(())
    }
}
pub static IF_FEATURE: IfFeatureSupport = IfFeatureSupport;
