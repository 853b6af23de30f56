// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{ArgValue, StatementKeyword};
use crate::source::Span;

use core::fmt;

/// The strictly ordered build phases. Every context must complete a phase
/// before any context enters the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelPhase {
    /// Context created, nothing run yet.
    Init,
    /// Module/submodule identity and import/include declarations become
    /// visible.
    SourcePreLinkage,
    /// Imports are resolved to concrete module contexts; prefix tables are
    /// populated.
    SourceLinkage,
    /// Arguments parsed, substatement cardinality checked, local symbols
    /// (typedefs, groupings, identities) declared.
    StatementDefinition,
    /// Cross-context validation, grouping expansion, augment grafting,
    /// schema node registration.
    FullDeclaration,
    /// Effective statements and type definitions are materialized.
    EffectiveModel,
}

impl ModelPhase {
    pub const ALL: [ModelPhase; 5] = [
        ModelPhase::SourcePreLinkage,
        ModelPhase::SourceLinkage,
        ModelPhase::StatementDefinition,
        ModelPhase::FullDeclaration,
        ModelPhase::EffectiveModel,
    ];

    pub fn previous(&self) -> ModelPhase {
        match self {
            ModelPhase::Init | ModelPhase::SourcePreLinkage => ModelPhase::Init,
            ModelPhase::SourceLinkage => ModelPhase::SourcePreLinkage,
            ModelPhase::StatementDefinition => ModelPhase::SourceLinkage,
            ModelPhase::FullDeclaration => ModelPhase::StatementDefinition,
            ModelPhase::EffectiveModel => ModelPhase::FullDeclaration,
        }
    }
}

impl fmt::Display for ModelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelPhase::Init => "init",
            ModelPhase::SourcePreLinkage => "source-pre-linkage",
            ModelPhase::SourceLinkage => "source-linkage",
            ModelPhase::StatementDefinition => "statement-definition",
            ModelPhase::FullDeclaration => "full-declaration",
            ModelPhase::EffectiveModel => "effective-model",
        })
    }
}

/// Stable handle to a statement context within one build session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContextId(pub u32);

/// Whether a context came from a declared statement or was copied in by
/// grouping expansion / augment grafting. Copies carry independent identity
/// and ordering but skip module-level symbol registration, which the original
/// already performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Declared,
    Expanded,
}

/// One declared statement during the build. Mutable only while the session
/// is building; the one-way conversion to `EffectiveStatement` is the freeze.
#[derive(Debug)]
pub struct StatementContext {
    pub keyword: StatementKeyword,
    pub raw_arg: Option<String>,
    /// Parsed lazily by the statement-definition pass, memoized once.
    pub arg: Option<ArgValue>,
    pub span: Span,
    pub parent: Option<ContextId>,
    /// Insertion order preserved; substatement order is semantically
    /// meaningful.
    pub children: Vec<ContextId>,
    /// Last completed phase.
    pub phase: ModelPhase,
    pub origin: Origin,
    /// For expanded contexts, the module root of the defining scope; type
    /// references inside a copied grouping resolve against the grouping's
    /// original module, not the use site.
    pub origin_scope: Option<ContextId>,
    /// Module name qualifying this node in schema paths, when it differs
    /// from the enclosing module (augment grafts keep the augmenting
    /// module's name).
    pub name_module: Option<String>,
}

impl StatementContext {
    pub fn new(
        keyword: StatementKeyword,
        raw_arg: Option<String>,
        span: Span,
        parent: Option<ContextId>,
        origin: Origin,
    ) -> StatementContext {
        StatementContext {
            keyword,
            raw_arg,
            arg: None,
            span,
            parent,
            children: vec![],
            phase: ModelPhase::Init,
            origin,
            origin_scope: None,
            name_module: None,
        }
    }

    /// The identifier argument, once parsed. Empty string before parsing or
    /// for statements without an identifier argument.
    pub fn name(&self) -> &str {
        match &self.arg {
            Some(ArgValue::Identifier(s)) => s,
            Some(ArgValue::NodeId { name, .. }) => name,
            _ => "",
        }
    }
}
