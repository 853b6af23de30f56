// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{ArgValue, StatementKeyword};
use crate::context::ContextId;
use crate::error::StructuralError;
use crate::reactor::SessionState;
use crate::source::Span;

use anyhow::Result;

mod data;
mod def;
mod linkage;
mod meta;
mod type_stmt;

/// What kind of argument a statement keyword takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSpec {
    /// No argument accepted.
    None,
    /// A bare identifier.
    Identifier,
    /// A possibly prefixed identifier, `foo` or `p:foo`.
    NodeId,
    /// Free-form text (descriptions, range expressions, paths, dates).
    Text,
    Int,
    Uint,
    Bool,
}

/// Behavior of one statement keyword: argument parsing, substatement
/// cardinality, per-phase callbacks and effective-statement concerns.
///
/// The default callbacks do nothing; most keywords only carry data. The
/// reactor performs argument parsing and cardinality validation for every
/// context before invoking `statement_definition`.
pub trait StatementSupport: Sync {
    fn keyword(&self) -> StatementKeyword;

    fn argument(&self) -> ArgSpec;

    /// Extra argument validation beyond the `ArgSpec` shape.
    fn validate_argument(&self, _arg: &ArgValue, _span: &Span) -> Result<(), StructuralError> {
        Ok(())
    }

    fn pre_linkage(&self, _st: &mut SessionState, _id: ContextId) -> Result<()> {
        Ok(())
    }

    fn linkage(&self, _st: &mut SessionState, _id: ContextId) -> Result<()> {
        Ok(())
    }

    fn statement_definition(&self, _st: &mut SessionState, _id: ContextId) -> Result<()> {
        Ok(())
    }

    fn full_declaration(&self, _st: &mut SessionState, _id: ContextId) -> Result<()> {
        Ok(())
    }

    fn effective_model(&self, _st: &mut SessionState, _id: ContextId) -> Result<()> {
        Ok(())
    }
}

/// Parse a raw argument according to the keyword's `ArgSpec`.
pub fn parse_argument(
    spec: ArgSpec,
    keyword: StatementKeyword,
    raw: Option<&str>,
    span: &Span,
) -> Result<Option<ArgValue>, StructuralError> {
    let at = || span.location();
    let raw = match (spec, raw) {
        (ArgSpec::None, None) => return Ok(None),
        (ArgSpec::None, Some(_)) => {
            return Err(StructuralError::UnexpectedArgument { keyword, at: at() })
        }
        (_, None) => return Err(StructuralError::MissingArgument { keyword, at: at() }),
        (_, Some(raw)) => raw,
    };
    let malformed = |reason: &str| StructuralError::MalformedArgument {
        keyword,
        text: raw.to_string(),
        reason: reason.to_string(),
        at: at(),
    };
    Ok(Some(match spec {
        ArgSpec::None => return Ok(None),
        ArgSpec::Identifier => {
            if !is_identifier(raw) {
                return Err(malformed("not a valid identifier"));
            }
            ArgValue::Identifier(raw.to_string())
        }
        ArgSpec::NodeId => match raw.split_once(':') {
            Some((prefix, name)) => {
                if !is_identifier(prefix) || !is_identifier(name) {
                    return Err(malformed("not a valid prefixed identifier"));
                }
                ArgValue::NodeId {
                    prefix: Some(prefix.to_string()),
                    name: name.to_string(),
                }
            }
            None => {
                if !is_identifier(raw) {
                    return Err(malformed("not a valid identifier"));
                }
                ArgValue::NodeId {
                    prefix: None,
                    name: raw.to_string(),
                }
            }
        },
        ArgSpec::Text => ArgValue::Text(raw.to_string()),
        ArgSpec::Int => match raw.parse::<i64>() {
            Ok(v) => ArgValue::Int(v),
            Err(_) => return Err(malformed("not a valid integer")),
        },
        ArgSpec::Uint => match raw.parse::<u64>() {
            Ok(v) => ArgValue::Uint(v),
            Err(_) => return Err(malformed("not a valid unsigned integer")),
        },
        ArgSpec::Bool => match raw {
            "true" => ArgValue::Bool(true),
            "false" => ArgValue::Bool(false),
            _ => return Err(malformed("expected 'true' or 'false'")),
        },
    }))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Unbounded cardinality.
pub const MANY: u32 = u32::MAX;

/// Allowed substatements of each keyword with their cardinality, collapsing
/// the RFC6020 and RFC7950 rule sets into the union of both. Children not
/// listed are rejected.
pub fn substatement_rules(kw: StatementKeyword) -> &'static [(StatementKeyword, u32, u32)] {
    use StatementKeyword::*;
    match kw {
        Module => &[
            (Namespace, 1, 1),
            (Prefix, 1, 1),
            (YangVersion, 0, 1),
            (Import, 0, MANY),
            (Include, 0, MANY),
            (Revision, 0, MANY),
            (Organization, 0, 1),
            (Contact, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Typedef, 0, MANY),
            (Identity, 0, MANY),
            (Grouping, 0, MANY),
            (Feature, 0, MANY),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Uses, 0, MANY),
            (Augment, 0, MANY),
        ],
        Submodule => &[
            (BelongsTo, 1, 1),
            (YangVersion, 0, 1),
            (Import, 0, MANY),
            (Include, 0, MANY),
            (Revision, 0, MANY),
            (Organization, 0, 1),
            (Contact, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Typedef, 0, MANY),
            (Identity, 0, MANY),
            (Grouping, 0, MANY),
            (Feature, 0, MANY),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Uses, 0, MANY),
            (Augment, 0, MANY),
        ],
        Import => &[
            (Prefix, 1, 1),
            (RevisionDate, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Include => &[
            (RevisionDate, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Revision => &[(Description, 0, 1), (Reference, 0, 1)],
        BelongsTo => &[(Prefix, 1, 1)],
        Typedef => &[
            (Type, 1, 1),
            (Default, 0, 1),
            (Units, 0, 1),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Type => &[
            (Range, 0, 1),
            (Length, 0, 1),
            (Pattern, 0, MANY),
            (FractionDigits, 0, 1),
            (Enum, 0, MANY),
            (Bit, 0, MANY),
            (Base, 0, MANY),
            (Path, 0, 1),
            (RequireInstance, 0, 1),
            (Type, 0, MANY),
        ],
        Range | Length => &[
            (ErrorMessage, 0, 1),
            (ErrorAppTag, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Pattern => &[
            (Modifier, 0, 1),
            (ErrorMessage, 0, 1),
            (ErrorAppTag, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Enum => &[
            (Value, 0, 1),
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Bit => &[
            (Position, 0, 1),
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Identity => &[
            (Base, 0, MANY),
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Grouping => &[
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Typedef, 0, MANY),
            (Grouping, 0, MANY),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Uses, 0, MANY),
        ],
        Feature => &[
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Container => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Presence, 0, 1),
            (Config, 0, 1),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Typedef, 0, MANY),
            (Grouping, 0, MANY),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Uses, 0, MANY),
        ],
        Leaf => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Type, 1, 1),
            (Units, 0, 1),
            (Default, 0, 1),
            (Config, 0, 1),
            (Mandatory, 0, 1),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        LeafList => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Type, 1, 1),
            (Units, 0, 1),
            (Default, 0, MANY),
            (Config, 0, 1),
            (MinElements, 0, 1),
            (MaxElements, 0, 1),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        List => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Key, 0, 1),
            (Config, 0, 1),
            (MinElements, 0, 1),
            (MaxElements, 0, 1),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Typedef, 0, MANY),
            (Grouping, 0, MANY),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Uses, 0, MANY),
        ],
        Choice => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Default, 0, 1),
            (Config, 0, 1),
            (Mandatory, 0, 1),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Case, 0, MANY),
            // Shorthand cases.
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
        ],
        Case => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Uses, 0, MANY),
        ],
        Uses => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
        ],
        Augment => &[
            (When, 0, 1),
            (IfFeature, 0, MANY),
            (Status, 0, 1),
            (Description, 0, 1),
            (Reference, 0, 1),
            (Container, 0, MANY),
            (Leaf, 0, MANY),
            (LeafList, 0, MANY),
            (List, 0, MANY),
            (Choice, 0, MANY),
            (Case, 0, MANY),
            (Uses, 0, MANY),
        ],
        // Leaf statements carry no substatements beyond documentation.
        Namespace | Prefix | RevisionDate | YangVersion | Key | Default | Units | Mandatory
        | Config | MinElements | MaxElements | Presence | Status | When | IfFeature
        | Description | Reference | Organization | Contact | ErrorMessage | ErrorAppTag
        | Value | Position | Base | Path | RequireInstance | Modifier | FractionDigits => &[],
    }
}

/// Validate the substatements of `id` against its keyword's rules.
pub fn validate_substatements(st: &SessionState, id: ContextId) -> Result<(), StructuralError> {
    let ctx = st.ctx(id);
    let rules = substatement_rules(ctx.keyword);
    for &child_id in &ctx.children {
        let child = st.ctx(child_id);
        if !rules.iter().any(|(kw, _, _)| *kw == child.keyword) {
            return Err(StructuralError::NotAllowed {
                parent: ctx.keyword,
                child: child.keyword,
                at: child.span.location(),
            });
        }
    }
    for &(kw, min, max) in rules {
        let found = ctx
            .children
            .iter()
            .filter(|&&c| st.ctx(c).keyword == kw)
            .count() as u32;
        if found < min {
            return Err(StructuralError::TooFew {
                parent: ctx.keyword,
                child: kw,
                min,
                found,
                at: ctx.span.location(),
            });
        }
        if found > max {
            return Err(StructuralError::TooMany {
                parent: ctx.keyword,
                child: kw,
                max,
                found,
                at: ctx.span.location(),
            });
        }
    }
    Ok(())
}

/// Resolve the support object for a keyword. The statement kind set is
/// closed; `type` additionally inspects its argument, so that
/// `type decimal64` and `type enumeration` can demand the substatements
/// their kind cannot exist without.
pub fn support_for(kw: StatementKeyword) -> &'static dyn StatementSupport {
    use StatementKeyword::*;
    match kw {
        Module => &linkage::MODULE,
        Submodule => &linkage::SUBMODULE,
        Import => &linkage::IMPORT,
        Include => &linkage::INCLUDE,
        Namespace => &meta::NAMESPACE,
        Prefix => &meta::PREFIX,
        Revision => &meta::REVISION,
        RevisionDate => &meta::REVISION_DATE,
        YangVersion => &meta::YANG_VERSION,
        BelongsTo => &meta::BELONGS_TO,
        Typedef => &def::TYPEDEF,
        Type => &type_stmt::TYPE,
        Identity => &def::IDENTITY,
        Grouping => &def::GROUPING,
        Feature => &def::FEATURE,
        IfFeature => &def::IF_FEATURE,
        Container => &data::CONTAINER,
        Leaf => &data::LEAF,
        LeafList => &data::LEAF_LIST,
        List => &data::LIST,
        Choice => &data::CHOICE,
        Case => &data::CASE,
        Uses => &data::USES,
        Augment => &data::AUGMENT,
        Key => &meta::KEY,
        Range => &type_stmt::RANGE,
        Length => &type_stmt::LENGTH,
        Pattern => &type_stmt::PATTERN,
        Modifier => &type_stmt::MODIFIER,
        FractionDigits => &type_stmt::FRACTION_DIGITS,
        Enum => &type_stmt::ENUM,
        Bit => &type_stmt::BIT,
        Value => &type_stmt::VALUE,
        Position => &type_stmt::POSITION,
        Base => &type_stmt::BASE,
        Path => &type_stmt::PATH,
        RequireInstance => &type_stmt::REQUIRE_INSTANCE,
        Default => &meta::DEFAULT,
        Units => &meta::UNITS,
        Mandatory => &meta::MANDATORY,
        Config => &meta::CONFIG,
        MinElements => &meta::MIN_ELEMENTS,
        MaxElements => &meta::MAX_ELEMENTS,
        Presence => &meta::PRESENCE,
        Status => &meta::STATUS,
        When => &meta::WHEN,
        Description => &meta::DESCRIPTION,
        Reference => &meta::REFERENCE,
        Organization => &meta::ORGANIZATION,
        Contact => &meta::CONTACT,
        ErrorMessage => &meta::ERROR_MESSAGE,
        ErrorAppTag => &meta::ERROR_APP_TAG,
    }
}
