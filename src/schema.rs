// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{ArgValue, QName, StatementKeyword};
use crate::types::TypeDefinition;
use crate::Rc;

use std::collections::BTreeSet;

use serde::Serialize;

/// The fully resolved, immutable form of one declared statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveStatement {
    pub keyword: StatementKeyword,
    pub arg: Option<ArgValue>,
    /// Qualified name, for statements that name a schema node.
    pub name: Option<QName>,
    /// The built type, for `type`, `typedef`, `leaf` and `leaf-list`
    /// statements.
    pub type_def: Option<Rc<TypeDefinition>>,
    pub substatements: Vec<EffectiveStatement>,
}

impl EffectiveStatement {
    pub fn child(&self, kw: StatementKeyword) -> Option<&EffectiveStatement> {
        self.substatements.iter().find(|s| s.keyword == kw)
    }

    pub fn children(&self, kw: StatementKeyword) -> impl Iterator<Item = &EffectiveStatement> {
        self.substatements.iter().filter(move |s| s.keyword == kw)
    }

    pub fn arg_str(&self) -> Option<&str> {
        self.arg.as_ref().and_then(ArgValue::as_str)
    }

    /// Find a direct schema-node child by qualified name, looking through
    /// statements that are expanded in place (`uses`).
    pub fn find_named(&self, seg: &QName) -> Option<&EffectiveStatement> {
        for sub in &self.substatements {
            if sub.name.as_ref() == Some(seg) {
                return Some(sub);
            }
            if sub.keyword == StatementKeyword::Uses {
                if let Some(found) = sub.find_named(seg) {
                    return Some(found);
                }
            }
        }
        None
    }
}

/// One module of the built schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveModule {
    pub name: String,
    pub namespace: String,
    pub prefix: String,
    /// Most recent revision date, if any revisions were declared.
    pub revision: Option<String>,
    pub root: EffectiveStatement,
}

/// An identity with its declared bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityDef {
    pub name: QName,
    pub bases: Vec<QName>,
}

/// The frozen output of a successful build: the effective statement trees of
/// all modules, the identity hierarchy and every built type definition.
/// Immutable and freely shareable; no locking is required after the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaContext {
    modules: Vec<Rc<EffectiveModule>>,
    identities: Vec<IdentityDef>,
    types: Vec<Rc<TypeDefinition>>,
}

impl SchemaContext {
    pub(crate) fn new(
        modules: Vec<Rc<EffectiveModule>>,
        identities: Vec<IdentityDef>,
        types: Vec<Rc<TypeDefinition>>,
    ) -> SchemaContext {
        SchemaContext {
            modules,
            identities,
            types,
        }
    }

    pub fn modules(&self) -> &[Rc<EffectiveModule>] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Rc<EffectiveModule>> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Look up a module by XML namespace and, optionally, revision date.
    /// Without a revision the most recent matching module wins.
    pub fn module_by_namespace(
        &self,
        namespace: &str,
        revision: Option<&str>,
    ) -> Option<&Rc<EffectiveModule>> {
        let mut candidates: Vec<&Rc<EffectiveModule>> = self
            .modules
            .iter()
            .filter(|m| m.namespace == namespace)
            .collect();
        match revision {
            Some(rev) => candidates
                .into_iter()
                .find(|m| m.revision.as_deref() == Some(rev)),
            None => {
                candidates.sort_by(|a, b| a.revision.cmp(&b.revision));
                candidates.pop()
            }
        }
    }

    /// Look up a schema node by its qualified path. The first segment's
    /// module selects the tree to walk.
    pub fn find_node(&self, path: &[QName]) -> Option<&EffectiveStatement> {
        let first = path.first()?;
        let module = self.module(first.module.as_deref()?)?;
        let mut cur = module.root.find_named(first)?;
        for seg in &path[1..] {
            cur = cur.find_named(seg)?;
        }
        Some(cur)
    }

    /// Every type definition built during this session, in no particular
    /// order.
    pub fn type_definitions(&self) -> &[Rc<TypeDefinition>] {
        &self.types
    }

    pub fn identities(&self) -> &[IdentityDef] {
        &self.identities
    }

    pub fn identity(&self, name: &QName) -> Option<&IdentityDef> {
        self.identities.iter().find(|i| &i.name == name)
    }

    /// Whether `ident` is transitively derived from `base`.
    pub fn identity_is_derived_from(&self, ident: &QName, base: &QName) -> bool {
        let mut visited = BTreeSet::new();
        self.derived_from_impl(ident, base, &mut visited)
    }

    fn derived_from_impl(
        &self,
        ident: &QName,
        base: &QName,
        visited: &mut BTreeSet<QName>,
    ) -> bool {
        if !visited.insert(ident.clone()) {
            return false;
        }
        let Some(def) = self.identity(ident) else {
            return false;
        };
        def.bases
            .iter()
            .any(|b| b == base || self.derived_from_impl(b, base, visited))
    }

    /// Serialize the frozen schema to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// All identities transitively derived from `base`, in name order.
    pub fn derived_identities(&self, base: &QName) -> Vec<QName> {
        let mut out: Vec<QName> = self
            .identities
            .iter()
            .filter(|i| self.identity_is_derived_from(&i.name, base))
            .map(|i| i.name.clone())
            .collect();
        out.sort();
        out
    }
}
