// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::QName;
use crate::context::ContextId;
use crate::error::StructuralError;
use crate::source::Span;
use crate::types::TypeDefinition;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

/// The kinds of symbol tables used for cross-statement resolution.
///
/// Direct `get` access is only valid for data whose writing phase has already
/// completed; everything else must go through an inference action so that
/// resolution never depends on source ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamespaceKind {
    /// Module name -> module context. Global.
    Module,
    /// Submodule name -> submodule context. Global.
    Submodule,
    /// XML namespace URI -> module context. Global.
    ModuleNamespace,
    /// Prefix -> module context. Scoped to the declaring module.
    Prefix,
    /// Typedef name -> declaring context. Scoped to the declaring module.
    Typedef,
    /// Grouping name -> declaring context. Scoped to the declaring module.
    Grouping,
    /// Qualified identity name -> declaring context. Global.
    Identity,
    /// Feature name -> declaring context. Scoped to the declaring module.
    Feature,
    /// Schema node path -> declaring context. Scoped to the declaring module.
    SchemaNode,
    /// Built type definitions, written during the effective-model phase.
    /// Built-ins live in the global scope; typedefs in their module's scope.
    Type,
}

/// Scope of one namespace instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamespaceScope {
    Global,
    /// Scoped to the module or submodule rooted at this context.
    Module(ContextId),
}

/// Keys are typed rather than stringly so that path-keyed and name-keyed
/// namespaces cannot collide by formatting accident.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamespaceKey {
    Name(String),
    Qualified(QName),
    Path(Vec<QName>),
    /// Anonymous per-statement key, used for built types of nested `type`
    /// statements that have no declared name.
    Anon(ContextId),
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceKey::Name(n) => f.write_str(n),
            NamespaceKey::Qualified(q) => q.fmt(f),
            NamespaceKey::Path(p) => {
                for seg in p {
                    write!(f, "/{seg}")?;
                }
                Ok(())
            }
            NamespaceKey::Anon(id) => write!(f, "<anonymous #{}>", id.0),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NamespaceValue {
    /// A reference to the declaring statement context. An index, not an
    /// ownership edge; this is what keeps the context tree acyclic.
    Context(ContextId),
    /// A pre-built resolved value (built-in and built type definitions).
    Type(Rc<TypeDefinition>),
}

#[derive(Debug, Clone)]
pub struct NamespaceEntry {
    pub value: NamespaceValue,
    pub span: Span,
}

/// All namespace instances of one build session.
///
/// A key is written at most once per namespace instance; a second `put` is a
/// duplicate-declaration error carrying both locations.
#[derive(Default)]
pub struct NamespaceStore {
    tables: BTreeMap<(NamespaceKind, NamespaceScope), BTreeMap<NamespaceKey, NamespaceEntry>>,
    /// Declared write intents of the inference action currently applying.
    /// While set, a `put` to any other kind is rejected.
    intents: Option<Vec<NamespaceKind>>,
}

impl NamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict writes to the given kinds until `end_intents`. The reactor
    /// brackets every action's apply callback with this.
    pub fn begin_intents(&mut self, kinds: Vec<NamespaceKind>) {
        self.intents = Some(kinds);
    }

    pub fn end_intents(&mut self) {
        self.intents = None;
    }

    pub fn put(
        &mut self,
        kind: NamespaceKind,
        scope: NamespaceScope,
        key: NamespaceKey,
        value: NamespaceValue,
        span: &Span,
    ) -> Result<(), StructuralError> {
        if let Some(allowed) = &self.intents {
            if !allowed.contains(&kind) {
                return Err(StructuralError::UndeclaredWrite {
                    namespace: kind,
                    at: span.location(),
                });
            }
        }
        let table = self.tables.entry((kind, scope)).or_default();
        if let Some(previous) = table.get(&key) {
            return Err(StructuralError::DuplicateDeclaration {
                namespace: kind,
                key: key.to_string(),
                at: span.location(),
                previous: previous.span.location(),
            });
        }
        table.insert(
            key,
            NamespaceEntry {
                value,
                span: span.clone(),
            },
        );
        Ok(())
    }

    /// Non-blocking point lookup. May return `None` even though the key will
    /// eventually exist; callers that need forward references must use an
    /// inference action instead.
    pub fn get(
        &self,
        kind: NamespaceKind,
        scope: NamespaceScope,
        key: &NamespaceKey,
    ) -> Option<&NamespaceEntry> {
        self.tables.get(&(kind, scope))?.get(key)
    }

    /// All entries of one namespace instance, in key order.
    pub fn entries(
        &self,
        kind: NamespaceKind,
        scope: NamespaceScope,
    ) -> impl Iterator<Item = (&NamespaceKey, &NamespaceEntry)> {
        self.tables
            .get(&(kind, scope))
            .into_iter()
            .flat_map(|t| t.iter())
    }
}
