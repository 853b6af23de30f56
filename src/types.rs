// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::QName;
use crate::error::InvalidRestriction;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// The closed set of YANG built-in type kinds. Every dispatch over kinds is
/// an exhaustive match; adding a kind is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
    Binary,
    Bits,
    Boolean,
    Decimal64,
    Empty,
    Enumeration,
    IdentityRef,
    InstanceIdentifier,
    Int8,
    Int16,
    Int32,
    Int64,
    Leafref,
    String,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Union,
}

impl TypeKind {
    pub fn from_name(name: &str) -> Option<TypeKind> {
        use TypeKind::*;
        Some(match name {
            "binary" => Binary,
            "bits" => Bits,
            "boolean" => Boolean,
            "decimal64" => Decimal64,
            "empty" => Empty,
            "enumeration" => Enumeration,
            "identityref" => IdentityRef,
            "instance-identifier" => InstanceIdentifier,
            "int8" => Int8,
            "int16" => Int16,
            "int32" => Int32,
            "int64" => Int64,
            "leafref" => Leafref,
            "string" => String,
            "uint8" => Uint8,
            "uint16" => Uint16,
            "uint32" => Uint32,
            "uint64" => Uint64,
            "union" => Union,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        use TypeKind::*;
        match self {
            Binary => "binary",
            Bits => "bits",
            Boolean => "boolean",
            Decimal64 => "decimal64",
            Empty => "empty",
            Enumeration => "enumeration",
            IdentityRef => "identityref",
            InstanceIdentifier => "instance-identifier",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Leafref => "leafref",
            String => "string",
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Union => "union",
        }
    }

    pub fn is_integral(&self) -> bool {
        use TypeKind::*;
        matches!(
            self,
            Int8 | Int16 | Int32 | Int64 | Uint8 | Uint16 | Uint32 | Uint64
        )
    }

    /// Value bounds of an integral kind.
    pub fn integral_bounds(&self) -> Option<(i128, i128)> {
        use TypeKind::*;
        Some(match self {
            Int8 => (i8::MIN as i128, i8::MAX as i128),
            Int16 => (i16::MIN as i128, i16::MAX as i128),
            Int32 => (i32::MIN as i128, i32::MAX as i128),
            Int64 => (i64::MIN as i128, i64::MAX as i128),
            Uint8 => (0, u8::MAX as i128),
            Uint16 => (0, u16::MAX as i128),
            Uint32 => (0, u32::MAX as i128),
            Uint64 => (0, u64::MAX as i128),
            _ => return None,
        })
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of disjoint, ascending closed intervals. Used for both
/// numeric ranges and string/binary lengths (lengths use the non-negative
/// part). Values are kept as i128 so that the full u64 and i64 domains, and
/// decimal64 values scaled by fraction-digits, fit without widening checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSet {
    intervals: Vec<(i128, i128)>,
}

impl RangeSet {
    /// A single closed interval.
    pub fn span(lo: i128, hi: i128) -> RangeSet {
        RangeSet {
            intervals: vec![(lo, hi)],
        }
    }

    pub fn from_intervals(intervals: Vec<(i128, i128)>) -> RangeSet {
        RangeSet { intervals }
    }

    pub fn intervals(&self) -> &[(i128, i128)] {
        &self.intervals
    }

    pub fn lower_bound(&self) -> i128 {
        self.intervals.first().map(|r| r.0).unwrap_or(0)
    }

    pub fn upper_bound(&self) -> i128 {
        self.intervals.last().map(|r| r.1).unwrap_or(0)
    }

    pub fn contains(&self, value: i128) -> bool {
        self.intervals
            .iter()
            .any(|(lo, hi)| *lo <= value && value <= *hi)
    }

    /// Membership check carrying the full permitted set on failure.
    pub fn check(&self, value: i128) -> Result<(), InvalidRestriction> {
        if self.contains(value) {
            return Ok(());
        }
        Err(InvalidRestriction::ValueOutOfRange {
            value,
            ranges: self.intervals.clone(),
        })
    }

    /// Intervals of `self` that are not fully covered by `other`.
    /// Empty result means `self` is a subset of `other`.
    pub fn uncovered_by(&self, other: &RangeSet) -> Vec<(i128, i128)> {
        let mut offending = vec![];
        'next: for (lo, hi) in &self.intervals {
            let mut cur = *lo;
            for (blo, bhi) in &other.intervals {
                if *bhi < cur {
                    continue;
                }
                if *blo > cur {
                    break;
                }
                // Interval domains are integral, so adjacent base intervals
                // cover contiguously.
                cur = match bhi.checked_add(1) {
                    Some(n) => n,
                    None => continue 'next,
                };
                if cur > *hi {
                    continue 'next;
                }
            }
            offending.push((*lo, *hi));
        }
        offending
    }

    /// Parse a range/length expression such as `3..9|11..max` against the
    /// base set, which supplies the meaning of `min` and `max`. `parse_val`
    /// turns one literal into the i128 domain (plain integer for integral
    /// kinds and lengths, scaled integer for decimal64).
    pub fn parse(
        text: &str,
        base: &RangeSet,
        at: &str,
        parse_val: &dyn Fn(&str) -> Result<i128, String>,
    ) -> Result<RangeSet, InvalidRestriction> {
        let malformed = |reason: &str| InvalidRestriction::MalformedRange {
            text: text.to_string(),
            reason: reason.to_string(),
            at: at.to_string(),
        };

        let value = |s: &str| -> Result<i128, InvalidRestriction> {
            match s {
                "min" => Ok(base.lower_bound()),
                "max" => Ok(base.upper_bound()),
                _ => parse_val(s).map_err(|e| malformed(&e)),
            }
        };

        let mut intervals = vec![];
        for part in text.split('|') {
            let part = part.trim();
            if part.is_empty() {
                return Err(malformed("empty range part"));
            }
            let (lo, hi) = match part.split_once("..") {
                Some((lo, hi)) => (value(lo.trim())?, value(hi.trim())?),
                None => {
                    let v = value(part)?;
                    (v, v)
                }
            };
            if lo > hi {
                return Err(malformed("lower bound exceeds upper bound"));
            }
            if let Some((_, prev_hi)) = intervals.last() {
                if lo <= *prev_hi {
                    return Err(malformed("range parts must be in ascending order"));
                }
            }
            intervals.push((lo, hi));
        }
        if intervals.is_empty() {
            return Err(malformed("empty range expression"));
        }
        Ok(RangeSet { intervals })
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (lo, hi)) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}..{hi}")?;
            }
        }
        Ok(())
    }
}

/// A `pattern` restriction. The expression has been compile-checked when the
/// definition was built; `invert` corresponds to `modifier invert-match`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub expr: String,
    pub invert: bool,
}

/// One member of an enumeration type with its effective value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumPair {
    pub name: String,
    pub value: i64,
}

/// One member of a bits type with its effective position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitDef {
    pub name: String,
    pub position: u64,
}

/// Kind-specific restriction payload of a type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeBody {
    Numeric {
        kind: TypeKind,
        range: RangeSet,
    },
    Decimal64 {
        /// None only on the bare built-in; every definition carries a value.
        fraction_digits: Option<u8>,
        /// In scaled units of 10^-fraction-digits.
        range: RangeSet,
    },
    String {
        length: RangeSet,
        patterns: Vec<Pattern>,
    },
    Binary {
        length: RangeSet,
    },
    Boolean,
    Empty,
    Enumeration {
        enums: Vec<EnumPair>,
    },
    Bits {
        bits: Vec<BitDef>,
    },
    IdentityRef {
        bases: Vec<QName>,
    },
    InstanceIdentifier {
        require_instance: bool,
    },
    Leafref {
        /// Opaque, already-validated path expression. None only on the bare
        /// built-in.
        path: Option<String>,
        require_instance: bool,
    },
    Union {
        /// Declaration order preserved; first matching member wins during
        /// value parsing.
        members: Vec<Rc<TypeDefinition>>,
    },
}

/// A fully built, immutable type definition. Deriving a more restricted type
/// always produces a new definition wrapping this one as its base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: QName,
    /// None for true built-ins.
    pub base: Option<Rc<TypeDefinition>>,
    pub body: TypeBody,
    pub default_value: Option<String>,
    pub units: Option<String>,
}

impl TypeDefinition {
    pub fn kind(&self) -> TypeKind {
        match &self.body {
            TypeBody::Numeric { kind, .. } => *kind,
            TypeBody::Decimal64 { .. } => TypeKind::Decimal64,
            TypeBody::String { .. } => TypeKind::String,
            TypeBody::Binary { .. } => TypeKind::Binary,
            TypeBody::Boolean => TypeKind::Boolean,
            TypeBody::Empty => TypeKind::Empty,
            TypeBody::Enumeration { .. } => TypeKind::Enumeration,
            TypeBody::Bits { .. } => TypeKind::Bits,
            TypeBody::IdentityRef { .. } => TypeKind::IdentityRef,
            TypeBody::InstanceIdentifier { .. } => TypeKind::InstanceIdentifier,
            TypeBody::Leafref { .. } => TypeKind::Leafref,
            TypeBody::Union { .. } => TypeKind::Union,
        }
    }

    /// The numeric range of this definition, if its kind has one.
    pub fn range(&self) -> Option<&RangeSet> {
        match &self.body {
            TypeBody::Numeric { range, .. } | TypeBody::Decimal64 { range, .. } => Some(range),
            _ => None,
        }
    }

    /// The length set of this definition, if its kind has one.
    pub fn length(&self) -> Option<&RangeSet> {
        match &self.body {
            TypeBody::String { length, .. } | TypeBody::Binary { length } => Some(length),
            _ => None,
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        match &self.body {
            TypeBody::String { patterns, .. } => patterns,
            _ => &[],
        }
    }

    pub fn enums(&self) -> &[EnumPair] {
        match &self.body {
            TypeBody::Enumeration { enums } => enums,
            _ => &[],
        }
    }

    pub fn bits(&self) -> &[BitDef] {
        match &self.body {
            TypeBody::Bits { bits } => bits,
            _ => &[],
        }
    }

    /// Check a numeric value against this definition's range. For decimal64,
    /// the value must already be scaled by 10^fraction-digits.
    pub fn check_number(&self, value: i128) -> Result<(), InvalidRestriction> {
        match self.range() {
            Some(range) => range.check(value),
            None => Ok(()),
        }
    }

    /// Walk the base chain to the built-in this definition derives from.
    pub fn root(&self) -> &TypeDefinition {
        let mut t = self;
        while let Some(base) = &t.base {
            t = base;
        }
        t
    }
}

fn builtin(name: &str, body: TypeBody) -> (&str, Rc<TypeDefinition>) {
    (
        name,
        Rc::new(TypeDefinition {
            name: QName::builtin(name),
            base: None,
            body,
            default_value: None,
            units: None,
        }),
    )
}

fn integral(kind: TypeKind) -> TypeBody {
    let (lo, hi) = match kind.integral_bounds() {
        Some(b) => b,
        None => unreachable!("integral() called with non-integral kind"),
    };
    TypeBody::Numeric {
        kind,
        range: RangeSet::span(lo, hi),
    }
}

/// Full length domain for string and binary.
fn full_length() -> RangeSet {
    RangeSet::span(0, u64::MAX as i128)
}

lazy_static! {
    /// The statically known built-in type definitions, pre-resolved into the
    /// global type namespace of every build session.
    pub static ref BUILT_IN_TYPES: BTreeMap<&'static str, Rc<TypeDefinition>> = {
        let mut m = BTreeMap::new();
        for (name, def) in [
            builtin("binary", TypeBody::Binary { length: full_length() }),
            builtin("bits", TypeBody::Bits { bits: vec![] }),
            builtin("boolean", TypeBody::Boolean),
            builtin(
                "decimal64",
                TypeBody::Decimal64 {
                    fraction_digits: None,
                    range: RangeSet::span(i64::MIN as i128, i64::MAX as i128),
                },
            ),
            builtin("empty", TypeBody::Empty),
            builtin("enumeration", TypeBody::Enumeration { enums: vec![] }),
            builtin("identityref", TypeBody::IdentityRef { bases: vec![] }),
            builtin(
                "instance-identifier",
                TypeBody::InstanceIdentifier { require_instance: true },
            ),
            builtin("int8", integral(TypeKind::Int8)),
            builtin("int16", integral(TypeKind::Int16)),
            builtin("int32", integral(TypeKind::Int32)),
            builtin("int64", integral(TypeKind::Int64)),
            builtin(
                "leafref",
                TypeBody::Leafref { path: None, require_instance: true },
            ),
            builtin(
                "string",
                TypeBody::String { length: full_length(), patterns: vec![] },
            ),
            builtin("uint8", integral(TypeKind::Uint8)),
            builtin("uint16", integral(TypeKind::Uint16)),
            builtin("uint32", integral(TypeKind::Uint32)),
            builtin("uint64", integral(TypeKind::Uint64)),
            builtin("union", TypeBody::Union { members: vec![] }),
        ] {
            m.insert(name, def);
        }
        m
    };
}

/// Parse a decimal64 literal into scaled units of 10^-fraction_digits.
pub fn parse_decimal_scaled(text: &str, fraction_digits: u8) -> Result<i128, String> {
    let text = text.trim();
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err("empty decimal literal".to_string());
    }
    if frac_part.len() > fraction_digits as usize {
        return Err(format!(
            "more than {fraction_digits} fraction digits in '{text}'"
        ));
    }
    let mut scaled: i128 = 0;
    for ch in int_part.chars().chain(frac_part.chars()) {
        let d = ch
            .to_digit(10)
            .ok_or_else(|| format!("invalid digit '{ch}' in '{text}'"))?;
        scaled = scaled
            .checked_mul(10)
            .and_then(|v| v.checked_add(d as i128))
            .ok_or_else(|| format!("decimal literal '{text}' out of range"))?;
    }
    for _ in frac_part.len()..fraction_digits as usize {
        scaled = scaled
            .checked_mul(10)
            .ok_or_else(|| format!("decimal literal '{text}' out of range"))?;
    }
    Ok(if neg { -scaled } else { scaled })
}
