// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared helpers for building raw statement trees without a grammar front
//! end.

use crate::ast::{RawStatement, StatementKeyword};
use crate::reactor::BuildSession;
use crate::schema::SchemaContext;
use crate::source::{Source, Span};

use anyhow::Result;
use lazy_static::lazy_static;

lazy_static! {
    static ref TEST_SOURCE: Source = Source::synthetic("test");
}

pub fn span() -> Span {
    Span::synthetic(&TEST_SOURCE, 1)
}

pub fn stmt(kw: StatementKeyword, arg: Option<&str>) -> RawStatement {
    RawStatement::new(kw, arg, span())
}

/// A module skeleton with namespace `urn:<name>` and the given prefix.
pub fn module(name: &str, prefix: &str) -> RawStatement {
    stmt(StatementKeyword::Module, Some(name))
        .with(stmt(
            StatementKeyword::Namespace,
            Some(&format!("urn:{name}")),
        ))
        .with(stmt(StatementKeyword::Prefix, Some(prefix)))
}

pub fn ty(name: &str) -> RawStatement {
    stmt(StatementKeyword::Type, Some(name))
}

pub fn leaf(name: &str, type_name: &str) -> RawStatement {
    stmt(StatementKeyword::Leaf, Some(name)).with(ty(type_name))
}

pub fn typedef(name: &str, type_stmt: RawStatement) -> RawStatement {
    stmt(StatementKeyword::Typedef, Some(name)).with(type_stmt)
}

pub fn build(modules: Vec<RawStatement>) -> Result<SchemaContext> {
    let mut session = BuildSession::new();
    for m in modules {
        session = session.add_source(m);
    }
    session.build()
}
