// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Linkage-phase supports: module and submodule identity, import prefix
//! binding and submodule inclusion.

use crate::action::{InferenceAction, Prerequisite};
use crate::ast::StatementKeyword;
use crate::context::{ContextId, ModelPhase, Origin};
use crate::error::StructuralError;
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceValue};
use crate::reactor::SessionState;
use crate::support::{ArgSpec, StatementSupport};

use anyhow::Result;

fn required_raw_arg(st: &SessionState, id: ContextId) -> Result<String, StructuralError> {
    let ctx = st.ctx(id);
    match &ctx.raw_arg {
        Some(arg) => Ok(arg.clone()),
        None => Err(StructuralError::MissingArgument {
            keyword: ctx.keyword,
            at: ctx.span.location(),
        }),
    }
}

pub struct ModuleSupport;

impl StatementSupport for ModuleSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Module
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }

    // Make the module's identity and its own prefix visible before any
    // cross-module resolution starts. Arguments are still raw text here;
    // parsing proper happens at statement definition.
    fn pre_linkage(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        let name = required_raw_arg(st, id)?;
        let span = st.ctx(id).span.clone();
        st.namespaces.put(
            NamespaceKind::Module,
            NamespaceScope::Global,
            NamespaceKey::Name(name),
            NamespaceValue::Context(id),
            &span,
        )?;
        if let Some(uri) = st.child_raw_arg(id, StatementKeyword::Namespace) {
            st.namespaces.put(
                NamespaceKind::ModuleNamespace,
                NamespaceScope::Global,
                NamespaceKey::Name(uri),
                NamespaceValue::Context(id),
                &span,
            )?;
        }
        if let Some(prefix) = st.child_raw_arg(id, StatementKeyword::Prefix) {
            st.namespaces.put(
                NamespaceKind::Prefix,
                NamespaceScope::Module(id),
                NamespaceKey::Name(prefix),
                NamespaceValue::Context(id),
                &span,
            )?;
        }
        Ok(())
    }
}
pub static MODULE: ModuleSupport = ModuleSupport;

pub struct SubmoduleSupport;

impl StatementSupport for SubmoduleSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Submodule
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }

    fn pre_linkage(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        let name = required_raw_arg(st, id)?;
        let span = st.ctx(id).span.clone();
        st.namespaces.put(
            NamespaceKind::Submodule,
            NamespaceScope::Global,
            NamespaceKey::Name(name),
            NamespaceValue::Context(id),
            &span,
        )?;
        // The belongs-to prefix refers to the owning module within the
        // submodule's own text.
        if let Some(bt) = st.find_child(id, StatementKeyword::BelongsTo) {
            if let Some(prefix) = st.child_raw_arg(bt, StatementKeyword::Prefix) {
                st.namespaces.put(
                    NamespaceKind::Prefix,
                    NamespaceScope::Module(id),
                    NamespaceKey::Name(prefix),
                    NamespaceValue::Context(id),
                    &span,
                )?;
            }
        }
        Ok(())
    }
}
pub static SUBMODULE: SubmoduleSupport = SubmoduleSupport;

pub struct ImportSupport;

impl StatementSupport for ImportSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Import
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }

    // Bind the import's prefix once the imported module exists, wherever it
    // appears in the source set.
    fn linkage(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        let module_name = required_raw_arg(st, id)?;
        let span = st.ctx(id).span.clone();
        let prefix = match st.child_raw_arg(id, StatementKeyword::Prefix) {
            Some(p) => p,
            None => {
                return Err(StructuralError::TooFew {
                    parent: StatementKeyword::Import,
                    child: StatementKeyword::Prefix,
                    min: 1,
                    found: 0,
                    at: span.location(),
                }
                .into())
            }
        };
        let importing_root = st.module_root(id);
        let action = InferenceAction::new(
            id,
            Box::new(move |st, values| {
                if let Some(NamespaceValue::Context(imported)) = values.into_iter().next() {
                    st.namespaces.put(
                        NamespaceKind::Prefix,
                        NamespaceScope::Module(importing_root),
                        NamespaceKey::Name(prefix),
                        NamespaceValue::Context(imported),
                        &span,
                    )?;
                }
                Ok(())
            }),
        )
        .requires(Prerequisite::new(
            NamespaceKind::Module,
            NamespaceScope::Global,
            NamespaceKey::Name(module_name),
            ModelPhase::SourcePreLinkage,
        ))
        .mutates(NamespaceKind::Prefix);
        st.enqueue(action);
        Ok(())
    }
}
pub static IMPORT: ImportSupport = ImportSupport;

pub struct IncludeSupport;

impl StatementSupport for IncludeSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Include
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }

    // Fold the submodule's body statements into the including module. The
    // copies are declared content of the module; they register their own
    // symbols in the module's scope during later phases.
    fn linkage(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        let submodule_name = required_raw_arg(st, id)?;
        let including_root = st.module_root(id);
        let action = InferenceAction::new(
            id,
            Box::new(move |st, values| {
                let submodule = match values.into_iter().next() {
                    Some(NamespaceValue::Context(sub)) => sub,
                    _ => return Ok(()),
                };
                let body: Vec<ContextId> = st
                    .ctx(submodule)
                    .children
                    .iter()
                    .filter(|&&c| is_body_statement(st.ctx(c).keyword))
                    .cloned()
                    .collect();
                for child in body {
                    let copy = st.copy_subtree(
                        child,
                        including_root,
                        including_root,
                        None,
                        Origin::Declared,
                    );
                    st.catch_up(copy, ModelPhase::SourceLinkage)?;
                }
                Ok(())
            }),
        )
        .requires(Prerequisite::new(
            NamespaceKind::Submodule,
            NamespaceScope::Global,
            NamespaceKey::Name(submodule_name),
            ModelPhase::SourcePreLinkage,
        ));
        st.enqueue(action);
        Ok(())
    }
}
pub static INCLUDE: IncludeSupport = IncludeSupport;

fn is_body_statement(kw: StatementKeyword) -> bool {
    kw.is_schema_node()
        || matches!(
            kw,
            StatementKeyword::Typedef
                | StatementKeyword::Grouping
                | StatementKeyword::Identity
                | StatementKeyword::Feature
                | StatementKeyword::Uses
                | StatementKeyword::Augment
        )
}
