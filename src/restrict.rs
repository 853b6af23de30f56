// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{QName, StatementKeyword};
use crate::error::InvalidRestriction;
use crate::types::{
    parse_decimal_scaled, BitDef, EnumPair, Pattern, RangeSet, TypeBody, TypeDefinition, TypeKind,
};
use crate::Rc;

use std::collections::BTreeSet;

/// One `enum` substatement as collected from the statement tree.
#[derive(Debug, Clone)]
pub struct EnumMemberStmt {
    pub name: String,
    pub value: Option<i64>,
    pub at: String,
}

/// One `bit` substatement as collected from the statement tree.
#[derive(Debug, Clone)]
pub struct BitMemberStmt {
    pub name: String,
    pub position: Option<u64>,
    pub at: String,
}

/// Restriction substatements of one `type` statement, already argument-parsed
/// and (for unions) with member types already built. This is the input to the
/// restriction builders; building never mutates the base type.
#[derive(Debug, Clone, Default)]
pub struct Restrictions {
    pub range: Option<(String, String)>,
    pub length: Option<(String, String)>,
    /// (expression, invert-match, location)
    pub patterns: Vec<(String, bool, String)>,
    pub fraction_digits: Option<(i64, String)>,
    pub enums: Vec<EnumMemberStmt>,
    pub bits: Vec<BitMemberStmt>,
    pub bases: Vec<QName>,
    pub path: Option<String>,
    pub require_instance: Option<bool>,
    pub members: Vec<Rc<TypeDefinition>>,
    /// Location of the `type` statement itself.
    pub at: String,
}

/// Which restriction substatements a kind admits.
struct Admitted {
    range: bool,
    length: bool,
    patterns: bool,
    fraction_digits: bool,
    enums: bool,
    bits: bool,
    bases: bool,
    path: bool,
    require_instance: bool,
    members: bool,
}

impl Admitted {
    fn none() -> Admitted {
        Admitted {
            range: false,
            length: false,
            patterns: false,
            fraction_digits: false,
            enums: false,
            bits: false,
            bases: false,
            path: false,
            require_instance: false,
            members: false,
        }
    }
}

fn check_admitted(
    kind: TypeKind,
    r: &Restrictions,
    admitted: &Admitted,
) -> Result<(), InvalidRestriction> {
    let reject = |keyword: StatementKeyword, at: &str| {
        Err(InvalidRestriction::InvalidForKind {
            kind: kind.as_str(),
            keyword,
            at: at.to_string(),
        })
    };
    if !admitted.range {
        if let Some((_, at)) = &r.range {
            return reject(StatementKeyword::Range, at);
        }
    }
    if !admitted.length {
        if let Some((_, at)) = &r.length {
            return reject(StatementKeyword::Length, at);
        }
    }
    if !admitted.patterns {
        if let Some((_, _, at)) = r.patterns.first() {
            return reject(StatementKeyword::Pattern, at);
        }
    }
    if !admitted.fraction_digits {
        if let Some((_, at)) = &r.fraction_digits {
            return reject(StatementKeyword::FractionDigits, at);
        }
    }
    if !admitted.enums {
        if let Some(m) = r.enums.first() {
            return reject(StatementKeyword::Enum, &m.at);
        }
    }
    if !admitted.bits {
        if let Some(m) = r.bits.first() {
            return reject(StatementKeyword::Bit, &m.at);
        }
    }
    if !admitted.bases && !r.bases.is_empty() {
        return reject(StatementKeyword::Base, &r.at);
    }
    if !admitted.path && r.path.is_some() {
        return reject(StatementKeyword::Path, &r.at);
    }
    if !admitted.require_instance && r.require_instance.is_some() {
        return reject(StatementKeyword::RequireInstance, &r.at);
    }
    if !admitted.members && !r.members.is_empty() {
        return reject(StatementKeyword::Type, &r.at);
    }
    Ok(())
}

/// Build a new type definition from `base` narrowed by the restriction
/// substatements in `r`. Dispatches on the runtime kind of `base` and
/// enforces the kind-specific numeric and ordering rules. The returned
/// definition wraps `base`; restriction is always intersection, never
/// replacement, never widening.
pub fn derive_type(
    name: QName,
    base: Rc<TypeDefinition>,
    r: &Restrictions,
) -> Result<TypeDefinition, InvalidRestriction> {
    let kind = base.kind();
    let body = match kind {
        TypeKind::Int8
        | TypeKind::Int16
        | TypeKind::Int32
        | TypeKind::Int64
        | TypeKind::Uint8
        | TypeKind::Uint16
        | TypeKind::Uint32
        | TypeKind::Uint64 => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    range: true,
                    ..Admitted::none()
                },
            )?;
            let base_range = match base.range() {
                Some(rs) => rs,
                None => return Err(internal_body_mismatch(kind, r)),
            };
            let range = fold_range(&r.range, base_range, false, &|s| {
                s.parse::<i128>().map_err(|e| e.to_string())
            })?;
            TypeBody::Numeric { kind, range }
        }

        TypeKind::Decimal64 => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    range: true,
                    fraction_digits: true,
                    ..Admitted::none()
                },
            )?;
            let (base_fd, base_range) = match &base.body {
                TypeBody::Decimal64 {
                    fraction_digits,
                    range,
                } => (*fraction_digits, range),
                _ => return Err(internal_body_mismatch(kind, r)),
            };
            let fd = match (base_fd, &r.fraction_digits) {
                // First definition over the bare built-in.
                (None, Some((declared, at))) => {
                    if *declared < 1 || *declared > 18 {
                        return Err(InvalidRestriction::FractionDigitsOutOfRange {
                            value: *declared,
                            at: at.clone(),
                        });
                    }
                    *declared as u8
                }
                (None, None) => {
                    return Err(InvalidRestriction::MissingFractionDigits {
                        at: r.at.clone(),
                    })
                }
                // fraction-digits is not narrowable; re-declaring it must
                // match the base exactly.
                (Some(actual), Some((declared, at))) => {
                    if *declared != actual as i64 {
                        return Err(InvalidRestriction::FractionDigitsMismatch {
                            declared: (*declared).clamp(0, u8::MAX as i64) as u8,
                            actual,
                            at: at.clone(),
                        });
                    }
                    actual
                }
                (Some(actual), None) => actual,
            };
            let range = fold_range(&r.range, base_range, false, &|s| {
                parse_decimal_scaled(s, fd)
            })?;
            TypeBody::Decimal64 {
                fraction_digits: Some(fd),
                range,
            }
        }

        TypeKind::String => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    length: true,
                    patterns: true,
                    ..Admitted::none()
                },
            )?;
            let base_length = match base.length() {
                Some(rs) => rs,
                None => return Err(internal_body_mismatch(kind, r)),
            };
            let length = fold_range(&r.length, base_length, true, &|s| {
                s.parse::<i128>().map_err(|e| e.to_string())
            })?;
            // Patterns accumulate; each new pattern further narrows the
            // value space.
            let mut patterns = base.patterns().to_vec();
            for (expr, invert, at) in &r.patterns {
                if let Err(e) = regex::Regex::new(expr) {
                    return Err(InvalidRestriction::InvalidPattern {
                        pattern: expr.clone(),
                        error: e.to_string(),
                        at: at.clone(),
                    });
                }
                patterns.push(Pattern {
                    expr: expr.clone(),
                    invert: *invert,
                });
            }
            TypeBody::String { length, patterns }
        }

        TypeKind::Binary => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    length: true,
                    ..Admitted::none()
                },
            )?;
            let base_length = match base.length() {
                Some(rs) => rs,
                None => return Err(internal_body_mismatch(kind, r)),
            };
            let length = fold_range(&r.length, base_length, true, &|s| {
                s.parse::<i128>().map_err(|e| e.to_string())
            })?;
            TypeBody::Binary { length }
        }

        TypeKind::Boolean => {
            check_admitted(kind, r, &Admitted::none())?;
            TypeBody::Boolean
        }

        TypeKind::Empty => {
            check_admitted(kind, r, &Admitted::none())?;
            TypeBody::Empty
        }

        TypeKind::Enumeration => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    enums: true,
                    ..Admitted::none()
                },
            )?;
            let enums = build_enums(&base, &r.enums)?;
            TypeBody::Enumeration { enums }
        }

        TypeKind::Bits => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    bits: true,
                    ..Admitted::none()
                },
            )?;
            let bits = build_bits(&base, &r.bits)?;
            TypeBody::Bits { bits }
        }

        TypeKind::IdentityRef => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    bases: true,
                    ..Admitted::none()
                },
            )?;
            // A restricting identityref may re-declare bases, narrowing the
            // inherited set; with none declared the base set is inherited.
            let bases = if r.bases.is_empty() {
                match &base.body {
                    TypeBody::IdentityRef { bases } => bases.clone(),
                    _ => return Err(internal_body_mismatch(kind, r)),
                }
            } else {
                r.bases.clone()
            };
            if bases.is_empty() {
                return Err(InvalidRestriction::MissingBase { at: r.at.clone() });
            }
            TypeBody::IdentityRef { bases }
        }

        TypeKind::InstanceIdentifier => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    require_instance: true,
                    ..Admitted::none()
                },
            )?;
            let inherited = match &base.body {
                TypeBody::InstanceIdentifier { require_instance } => *require_instance,
                _ => return Err(internal_body_mismatch(kind, r)),
            };
            TypeBody::InstanceIdentifier {
                require_instance: r.require_instance.unwrap_or(inherited),
            }
        }

        TypeKind::Leafref => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    path: true,
                    require_instance: true,
                    ..Admitted::none()
                },
            )?;
            let (base_path, base_ri) = match &base.body {
                TypeBody::Leafref {
                    path,
                    require_instance,
                } => (path.clone(), *require_instance),
                _ => return Err(internal_body_mismatch(kind, r)),
            };
            TypeBody::Leafref {
                path: r.path.clone().or(base_path),
                require_instance: r.require_instance.unwrap_or(base_ri),
            }
        }

        TypeKind::Union => {
            check_admitted(
                kind,
                r,
                &Admitted {
                    // Member types are only allowed on the defining union;
                    // a union cannot be restricted further.
                    members: base.base.is_none(),
                    ..Admitted::none()
                },
            )?;
            let members = if base.base.is_none() {
                r.members.clone()
            } else {
                match &base.body {
                    TypeBody::Union { members } => members.clone(),
                    _ => return Err(internal_body_mismatch(kind, r)),
                }
            };
            TypeBody::Union { members }
        }
    };

    Ok(TypeDefinition {
        name,
        base: Some(base),
        body,
        default_value: None,
        units: None,
    })
}

// A definition whose body does not match its kind can only come from a bug in
// the builders themselves; report it as a malformed restriction rather than
// panicking mid-build.
fn internal_body_mismatch(kind: TypeKind, r: &Restrictions) -> InvalidRestriction {
    InvalidRestriction::InvalidValue {
        text: kind.as_str().to_string(),
        reason: "internal error: type body does not match its kind".to_string(),
        at: r.at.clone(),
    }
}

/// Parse and intersect one optional range/length restriction against the
/// base set. The new constraint must be a subset of the base constraint.
fn fold_range(
    stmt: &Option<(String, String)>,
    base: &RangeSet,
    is_length: bool,
    parse_val: &dyn Fn(&str) -> Result<i128, String>,
) -> Result<RangeSet, InvalidRestriction> {
    let (text, at) = match stmt {
        Some((text, at)) => (text, at),
        None => return Ok(base.clone()),
    };
    let narrowed = RangeSet::parse(text, base, at, parse_val)?;
    let offending = narrowed.uncovered_by(base);
    if !offending.is_empty() {
        let base_intervals = base.intervals().to_vec();
        return Err(if is_length {
            InvalidRestriction::LengthNotSubset {
                offending,
                base: base_intervals,
                at: at.clone(),
            }
        } else {
            InvalidRestriction::RangeNotSubset {
                offending,
                base: base_intervals,
                at: at.clone(),
            }
        });
    }
    Ok(narrowed)
}

const ENUM_MAX: i64 = i32::MAX as i64;
const ENUM_MIN: i64 = i32::MIN as i64;
const POSITION_MAX: u64 = u32::MAX as u64;

fn build_enums(
    base: &TypeDefinition,
    stmts: &[EnumMemberStmt],
) -> Result<Vec<EnumPair>, InvalidRestriction> {
    let base_enums = base.enums();
    if base_enums.is_empty() {
        // Defining enumeration: assign values with auto-increment.
        let mut enums: Vec<EnumPair> = vec![];
        let mut names = BTreeSet::new();
        let mut values = BTreeSet::new();
        // The first item with no explicit value gets 0.
        let mut next: i64 = 0;
        for m in stmts {
            if !names.insert(m.name.clone()) {
                return Err(InvalidRestriction::DuplicateMember {
                    member: m.name.clone(),
                    at: m.at.clone(),
                });
            }
            let value = match m.value {
                Some(v) => {
                    if !(ENUM_MIN..=ENUM_MAX).contains(&v) {
                        return Err(InvalidRestriction::InvalidValue {
                            text: v.to_string(),
                            reason: "enum value must fit in int32".to_string(),
                            at: m.at.clone(),
                        });
                    }
                    v
                }
                None => {
                    if next > ENUM_MAX {
                        return Err(InvalidRestriction::NeedsExplicitValue {
                            keyword: StatementKeyword::Enum,
                            member: m.name.clone(),
                            at: m.at.clone(),
                        });
                    }
                    next
                }
            };
            if !values.insert(value) {
                return Err(InvalidRestriction::DuplicateValue {
                    value,
                    at: m.at.clone(),
                });
            }
            next = value + 1;
            enums.push(EnumPair {
                name: m.name.clone(),
                value,
            });
        }
        Ok(enums)
    } else if stmts.is_empty() {
        // Plain derivation carries the base members forward.
        Ok(base_enums.to_vec())
    } else {
        // Narrowing: only members that exist on the base may be named, and a
        // re-declared value must match the one the base assigns.
        let mut enums: Vec<EnumPair> = vec![];
        let mut names = BTreeSet::new();
        for m in stmts {
            if !names.insert(m.name.clone()) {
                return Err(InvalidRestriction::DuplicateMember {
                    member: m.name.clone(),
                    at: m.at.clone(),
                });
            }
            let inherited = match base_enums.iter().find(|e| e.name == m.name) {
                Some(e) => e,
                None => {
                    return Err(InvalidRestriction::UnknownMember {
                        member: m.name.clone(),
                        base: base.name.to_string(),
                        at: m.at.clone(),
                    })
                }
            };
            if let Some(declared) = m.value {
                if declared != inherited.value {
                    return Err(InvalidRestriction::ValueMismatch {
                        member: m.name.clone(),
                        declared,
                        actual: inherited.value,
                        at: m.at.clone(),
                    });
                }
            }
            enums.push(inherited.clone());
        }
        Ok(enums)
    }
}

fn build_bits(
    base: &TypeDefinition,
    stmts: &[BitMemberStmt],
) -> Result<Vec<BitDef>, InvalidRestriction> {
    let base_bits = base.bits();
    if base_bits.is_empty() {
        let mut bits: Vec<BitDef> = vec![];
        let mut names = BTreeSet::new();
        let mut positions = BTreeSet::new();
        let mut next: u64 = 0;
        for m in stmts {
            if !names.insert(m.name.clone()) {
                return Err(InvalidRestriction::DuplicateMember {
                    member: m.name.clone(),
                    at: m.at.clone(),
                });
            }
            let position = match m.position {
                Some(p) => {
                    if p > POSITION_MAX {
                        return Err(InvalidRestriction::InvalidValue {
                            text: p.to_string(),
                            reason: "bit position must fit in uint32".to_string(),
                            at: m.at.clone(),
                        });
                    }
                    p
                }
                None => {
                    if next > POSITION_MAX {
                        return Err(InvalidRestriction::NeedsExplicitValue {
                            keyword: StatementKeyword::Bit,
                            member: m.name.clone(),
                            at: m.at.clone(),
                        });
                    }
                    next
                }
            };
            if !positions.insert(position) {
                return Err(InvalidRestriction::DuplicateValue {
                    value: position as i64,
                    at: m.at.clone(),
                });
            }
            next = position + 1;
            bits.push(BitDef {
                name: m.name.clone(),
                position,
            });
        }
        Ok(bits)
    } else if stmts.is_empty() {
        Ok(base_bits.to_vec())
    } else {
        let mut bits: Vec<BitDef> = vec![];
        let mut names = BTreeSet::new();
        for m in stmts {
            if !names.insert(m.name.clone()) {
                return Err(InvalidRestriction::DuplicateMember {
                    member: m.name.clone(),
                    at: m.at.clone(),
                });
            }
            let inherited = match base_bits.iter().find(|b| b.name == m.name) {
                Some(b) => b,
                None => {
                    return Err(InvalidRestriction::UnknownMember {
                        member: m.name.clone(),
                        base: base.name.to_string(),
                        at: m.at.clone(),
                    })
                }
            };
            if let Some(declared) = m.position {
                if declared != inherited.position {
                    return Err(InvalidRestriction::ValueMismatch {
                        member: m.name.clone(),
                        declared: declared as i64,
                        actual: inherited.position as i64,
                        at: m.at.clone(),
                    });
                }
            }
            bits.push(inherited.clone());
        }
        Ok(bits)
    }
}
