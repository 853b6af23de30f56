// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::source::Span;

use core::fmt;
use serde::{Deserialize, Serialize};

/// The closed set of statement keywords understood by the reactor.
///
/// Unknown keywords are rejected during context tree construction; extension
/// statements would slot in as additional variants together with a support
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatementKeyword {
    // Module structure and linkage.
    Module,
    Submodule,
    Namespace,
    Prefix,
    Import,
    Include,
    Revision,
    RevisionDate,
    YangVersion,
    BelongsTo,

    // Body definitions.
    Typedef,
    Type,
    Identity,
    Grouping,
    Feature,
    IfFeature,

    // Data tree.
    Container,
    Leaf,
    LeafList,
    List,
    Choice,
    Case,
    Uses,
    Augment,
    Key,

    // Type restrictions.
    Range,
    Length,
    Pattern,
    Modifier,
    FractionDigits,
    Enum,
    Bit,
    Value,
    Position,
    Base,
    Path,
    RequireInstance,

    // Common leaf/data annotations.
    Default,
    Units,
    Mandatory,
    Config,
    MinElements,
    MaxElements,
    Presence,
    Status,
    When,

    // Documentation.
    Description,
    Reference,
    Organization,
    Contact,
    ErrorMessage,
    ErrorAppTag,
}

impl StatementKeyword {
    pub fn as_str(&self) -> &'static str {
        use StatementKeyword::*;
        match self {
            Module => "module",
            Submodule => "submodule",
            Namespace => "namespace",
            Prefix => "prefix",
            Import => "import",
            Include => "include",
            Revision => "revision",
            RevisionDate => "revision-date",
            YangVersion => "yang-version",
            BelongsTo => "belongs-to",
            Typedef => "typedef",
            Type => "type",
            Identity => "identity",
            Grouping => "grouping",
            Feature => "feature",
            IfFeature => "if-feature",
            Container => "container",
            Leaf => "leaf",
            LeafList => "leaf-list",
            List => "list",
            Choice => "choice",
            Case => "case",
            Uses => "uses",
            Augment => "augment",
            Key => "key",
            Range => "range",
            Length => "length",
            Pattern => "pattern",
            Modifier => "modifier",
            FractionDigits => "fraction-digits",
            Enum => "enum",
            Bit => "bit",
            Value => "value",
            Position => "position",
            Base => "base",
            Path => "path",
            RequireInstance => "require-instance",
            Default => "default",
            Units => "units",
            Mandatory => "mandatory",
            Config => "config",
            MinElements => "min-elements",
            MaxElements => "max-elements",
            Presence => "presence",
            Status => "status",
            When => "when",
            Description => "description",
            Reference => "reference",
            Organization => "organization",
            Contact => "contact",
            ErrorMessage => "error-message",
            ErrorAppTag => "error-app-tag",
        }
    }

    pub fn from_str(s: &str) -> Option<StatementKeyword> {
        use StatementKeyword::*;
        Some(match s {
            "module" => Module,
            "submodule" => Submodule,
            "namespace" => Namespace,
            "prefix" => Prefix,
            "import" => Import,
            "include" => Include,
            "revision" => Revision,
            "revision-date" => RevisionDate,
            "yang-version" => YangVersion,
            "belongs-to" => BelongsTo,
            "typedef" => Typedef,
            "type" => Type,
            "identity" => Identity,
            "grouping" => Grouping,
            "feature" => Feature,
            "if-feature" => IfFeature,
            "container" => Container,
            "leaf" => Leaf,
            "leaf-list" => LeafList,
            "list" => List,
            "choice" => Choice,
            "case" => Case,
            "uses" => Uses,
            "augment" => Augment,
            "key" => Key,
            "range" => Range,
            "length" => Length,
            "pattern" => Pattern,
            "modifier" => Modifier,
            "fraction-digits" => FractionDigits,
            "enum" => Enum,
            "bit" => Bit,
            "value" => Value,
            "position" => Position,
            "base" => Base,
            "path" => Path,
            "require-instance" => RequireInstance,
            "default" => Default,
            "units" => Units,
            "mandatory" => Mandatory,
            "config" => Config,
            "min-elements" => MinElements,
            "max-elements" => MaxElements,
            "presence" => Presence,
            "status" => Status,
            "when" => When,
            "description" => Description,
            "reference" => Reference,
            "organization" => Organization,
            "contact" => Contact,
            "error-message" => ErrorMessage,
            "error-app-tag" => ErrorAppTag,
            _ => return None,
        })
    }

    /// Statements that are expanded away or only group their children; they do
    /// not contribute a step to schema node paths.
    pub fn is_transparent(&self) -> bool {
        matches!(self, StatementKeyword::Uses | StatementKeyword::Augment)
    }

    /// Statements that name a node in the schema tree.
    pub fn is_schema_node(&self) -> bool {
        matches!(
            self,
            StatementKeyword::Container
                | StatementKeyword::Leaf
                | StatementKeyword::LeafList
                | StatementKeyword::List
                | StatementKeyword::Choice
                | StatementKeyword::Case
        )
    }
}

impl fmt::Display for StatementKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module-qualified name. Built-in type names have no module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pub module: Option<String>,
    pub name: String,
}

impl QName {
    pub fn new(module: &str, name: &str) -> QName {
        QName {
            module: Some(module.to_string()),
            name: name.to_string(),
        }
    }

    pub fn builtin(name: &str) -> QName {
        QName {
            module: None,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(m) => write!(f, "{m}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A statement argument after keyword-specific parsing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgValue {
    /// Bare identifier: node names, typedef names, enum labels.
    Identifier(String),
    /// Possibly prefixed reference: `foo` or `p:foo`.
    NodeId { prefix: Option<String>, name: String },
    /// Free-form text: descriptions, range expressions, path expressions.
    Text(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Identifier(s) | ArgValue::Text(s) => Some(s),
            ArgValue::NodeId { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// One raw statement as handed over by the grammar layer:
/// `(keyword, argument, substatements, span)`. The keyword is still raw text
/// at this point; a keyword with no registered support is rejected when the
/// context tree is constructed. Substatement order is semantically
/// meaningful and is preserved everywhere downstream.
#[derive(Debug, Clone)]
pub struct RawStatement {
    pub keyword: String,
    pub arg: Option<String>,
    pub substatements: Vec<RawStatement>,
    pub span: Span,
}

impl RawStatement {
    pub fn new(keyword: StatementKeyword, arg: Option<&str>, span: Span) -> RawStatement {
        RawStatement {
            keyword: keyword.as_str().to_string(),
            arg: arg.map(str::to_string),
            substatements: vec![],
            span,
        }
    }

    /// A statement with an arbitrary keyword, as a grammar layer would
    /// produce for an extension it does not recognize.
    pub fn unknown(keyword: &str, arg: Option<&str>, span: Span) -> RawStatement {
        RawStatement {
            keyword: keyword.to_string(),
            arg: arg.map(str::to_string),
            substatements: vec![],
            span,
        }
    }

    /// Append a substatement, builder style.
    pub fn with(mut self, sub: RawStatement) -> RawStatement {
        self.substatements.push(sub);
        self
    }

    pub fn push(&mut self, sub: RawStatement) {
        self.substatements.push(sub);
    }
}
