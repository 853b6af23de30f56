// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

// Built artifacts are handed out as shared immutable values.
pub use std::sync::Arc as Rc;

mod action;
mod ast;
mod context;
mod error;
mod namespace;
mod reactor;
mod restrict;
mod schema;
mod source;
mod support;
mod types;

pub use ast::{ArgValue, QName, RawStatement, StatementKeyword};
pub use context::ModelPhase;
pub use error::{BuildError, InvalidRestriction, ReferenceError, StructuralError};
pub use namespace::NamespaceKind;
pub use reactor::BuildSession;
pub use schema::{EffectiveModule, EffectiveStatement, IdentityDef, SchemaContext};
pub use source::{Source, Span};
pub use types::{EnumPair, BitDef, Pattern, RangeSet, TypeBody, TypeDefinition, TypeKind};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::action::*;
    pub use crate::context::*;
    pub use crate::namespace::*;
}

#[cfg(test)]
mod tests;
