// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::StatementKeyword;
use crate::namespace::NamespaceKind;

use core::fmt;

/// Errors detected synchronously while validating statement structure:
/// unknown keywords, duplicate declarations, cardinality violations and
/// malformed arguments. Always fatal to the build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("unknown statement '{keyword}' at {at}")]
    UnknownStatement { keyword: String, at: String },

    #[error("'{child}' is not a valid substatement of '{parent}' at {at}")]
    NotAllowed {
        parent: StatementKeyword,
        child: StatementKeyword,
        at: String,
    },

    #[error("'{parent}' requires {min} '{child}' substatement(s), found {found}, at {at}")]
    TooFew {
        parent: StatementKeyword,
        child: StatementKeyword,
        min: u32,
        found: u32,
        at: String,
    },

    #[error("'{parent}' allows at most {max} '{child}' substatement(s), found {found}, at {at}")]
    TooMany {
        parent: StatementKeyword,
        child: StatementKeyword,
        max: u32,
        found: u32,
        at: String,
    },

    #[error("duplicate declaration of {key} in {namespace:?} namespace at {at}; previously declared at {previous}")]
    DuplicateDeclaration {
        namespace: NamespaceKind,
        key: String,
        at: String,
        previous: String,
    },

    #[error("'{keyword}' requires an argument at {at}")]
    MissingArgument { keyword: StatementKeyword, at: String },

    #[error("'{keyword}' does not take an argument at {at}")]
    UnexpectedArgument { keyword: StatementKeyword, at: String },

    #[error("malformed argument '{text}' for '{keyword}' at {at}: {reason}")]
    MalformedArgument {
        keyword: StatementKeyword,
        text: String,
        reason: String,
        at: String,
    },

    #[error("prefix '{prefix}' is not declared by this module or its imports, at {at}")]
    UnknownPrefix { prefix: String, at: String },

    #[error("list '{list}' declares key '{key}' but has no such leaf, at {at}")]
    MissingListKey {
        list: String,
        key: String,
        at: String,
    },

    #[error("write to {namespace:?} namespace at {at} was not declared by the inference action")]
    UndeclaredWrite { namespace: NamespaceKind, at: String },
}

/// One prerequisite that could not be satisfied when the worklist stalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPrerequisite {
    /// Keyword of the statement that declared the requirement.
    pub requirer: StatementKeyword,
    /// Location of the requiring statement.
    pub at: String,
    pub namespace: NamespaceKind,
    pub key: String,
}

impl fmt::Display for UnresolvedPrerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' at {} is waiting for {} in {:?} namespace",
            self.requirer, self.at, self.key, self.namespace
        )
    }
}

/// Errors detected when the inference worklist stalls at the end of a phase:
/// missing targets and circular references. The full set of unresolved
/// prerequisites is reported so a cycle shows up as the mutually waiting
/// statements, not as an arbitrary first victim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("unresolved references after {phase} phase:{}", format_unresolved(.unresolved))]
    Stalled {
        phase: String,
        unresolved: Vec<UnresolvedPrerequisite>,
    },
}

fn format_unresolved(unresolved: &[UnresolvedPrerequisite]) -> String {
    let mut s = String::new();
    for u in unresolved {
        s.push_str("\n  ");
        s.push_str(&u.to_string());
    }
    s
}

/// Violations raised by the type restriction builders. Each variant carries
/// the concrete offending values so tooling can highlight the illegal bound
/// rather than re-parse a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRestriction {
    /// A range restriction is not a subset of the base type's range.
    RangeNotSubset {
        offending: Vec<(i128, i128)>,
        base: Vec<(i128, i128)>,
        at: String,
    },
    /// A length restriction is not a subset of the base type's length.
    LengthNotSubset {
        offending: Vec<(i128, i128)>,
        base: Vec<(i128, i128)>,
        at: String,
    },
    /// A range/length expression that does not parse or is not ascending.
    MalformedRange {
        text: String,
        reason: String,
        at: String,
    },
    /// `fraction-digits` on a restricting decimal64 differs from the base.
    FractionDigitsMismatch {
        declared: u8,
        actual: u8,
        at: String,
    },
    /// `fraction-digits` outside 1..=18.
    FractionDigitsOutOfRange { value: i64, at: String },
    /// A decimal64 definition without `fraction-digits`.
    MissingFractionDigits { at: String },
    /// Auto-increment overflowed the kind's maximum value.
    NeedsExplicitValue {
        keyword: StatementKeyword,
        member: String,
        at: String,
    },
    /// A restricting enumeration/bits type named a member that does not exist
    /// on the base type.
    UnknownMember {
        member: String,
        base: String,
        at: String,
    },
    /// Duplicate enum label or bit name within one definition.
    DuplicateMember { member: String, at: String },
    /// Duplicate enum value or bit position within one definition.
    DuplicateValue { value: i64, at: String },
    /// A restricting member re-declared with a different value/position than
    /// the base type assigns it.
    ValueMismatch {
        member: String,
        declared: i64,
        actual: i64,
        at: String,
    },
    /// `identityref` with no `base` substatement and no inherited base.
    MissingBase { at: String },
    /// A restriction statement that the base type's kind does not admit.
    InvalidForKind {
        kind: &'static str,
        keyword: StatementKeyword,
        at: String,
    },
    /// A `pattern` expression that does not compile.
    InvalidPattern {
        pattern: String,
        error: String,
        at: String,
    },
    /// A malformed enum value, bit position or decimal literal.
    InvalidValue {
        text: String,
        reason: String,
        at: String,
    },
    /// A value check against a built range set failed; carries the full set
    /// of permitted sub-ranges.
    ValueOutOfRange {
        value: i128,
        ranges: Vec<(i128, i128)>,
    },
}

fn format_ranges(ranges: &[(i128, i128)]) -> String {
    let mut s = String::new();
    for (i, (lo, hi)) in ranges.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        if lo == hi {
            s.push_str(&format!("[{lo}]"));
        } else {
            s.push_str(&format!("[{lo}, {hi}]"));
        }
    }
    s
}

impl fmt::Display for InvalidRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRestriction::RangeNotSubset {
                offending,
                base,
                at,
            } => {
                write!(
                    f,
                    "range {} at {at} is not a subset of the base type range {}",
                    format_ranges(offending),
                    format_ranges(base)
                )
            }
            InvalidRestriction::LengthNotSubset {
                offending,
                base,
                at,
            } => {
                write!(
                    f,
                    "length {} at {at} is not a subset of the base type length {}",
                    format_ranges(offending),
                    format_ranges(base)
                )
            }
            InvalidRestriction::MalformedRange { text, reason, at } => {
                write!(f, "cannot parse range expression '{text}' at {at}: {reason}")
            }
            InvalidRestriction::FractionDigitsMismatch {
                declared,
                actual,
                at,
            } => {
                write!(
                    f,
                    "fraction-digits {declared} at {at} does not match base type fraction-digits {actual}; fraction-digits cannot be changed by a restriction"
                )
            }
            InvalidRestriction::FractionDigitsOutOfRange { value, at } => {
                write!(f, "fraction-digits {value} at {at} must be between 1 and 18")
            }
            InvalidRestriction::MissingFractionDigits { at } => {
                write!(f, "decimal64 requires a fraction-digits statement at {at}")
            }
            InvalidRestriction::NeedsExplicitValue { keyword, member, at } => {
                write!(f, "'{keyword}' {member} at {at} must have an explicit value")
            }
            InvalidRestriction::UnknownMember { member, base, at } => {
                write!(
                    f,
                    "'{member}' at {at} is not a member of the base type {base}"
                )
            }
            InvalidRestriction::DuplicateMember { member, at } => {
                write!(f, "duplicate member '{member}' at {at}")
            }
            InvalidRestriction::DuplicateValue { value, at } => {
                write!(f, "duplicate value {value} at {at}")
            }
            InvalidRestriction::ValueMismatch {
                member,
                declared,
                actual,
                at,
            } => {
                write!(
                    f,
                    "'{member}' at {at} declares value {declared} but the base type assigns {actual}"
                )
            }
            InvalidRestriction::MissingBase { at } => {
                write!(
                    f,
                    "at least one base statement has to be present, at {at}"
                )
            }
            InvalidRestriction::InvalidForKind { kind, keyword, at } => {
                write!(f, "'{keyword}' at {at} cannot restrict a {kind} type")
            }
            InvalidRestriction::InvalidPattern { pattern, error, at } => {
                write!(f, "invalid pattern '{pattern}' at {at}: {error}")
            }
            InvalidRestriction::InvalidValue { text, reason, at } => {
                write!(f, "invalid value '{text}' at {at}: {reason}")
            }
            InvalidRestriction::ValueOutOfRange { value, ranges } => {
                write!(
                    f,
                    "value {value} is outside the permitted ranges {}",
                    format_ranges(ranges)
                )
            }
        }
    }
}

impl core::error::Error for InvalidRestriction {}

/// Top level taxonomy; every build failure is one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Restriction(#[from] InvalidRestriction),
}
