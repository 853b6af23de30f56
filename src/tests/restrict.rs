// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{QName, StatementKeyword};
use crate::error::InvalidRestriction;
use crate::restrict::{derive_type, BitMemberStmt, EnumMemberStmt, Restrictions};
use crate::tests::common::*;
use crate::types::{parse_decimal_scaled, TypeBody, TypeDefinition, TypeKind, BUILT_IN_TYPES};
use crate::Rc;

use anyhow::Result;

use StatementKeyword::*;

const AT: &str = "test:1:1";

fn builtin(name: &str) -> Rc<TypeDefinition> {
    BUILT_IN_TYPES.get(name).expect("built-in").clone()
}

fn at() -> String {
    AT.to_string()
}

fn restrictions() -> Restrictions {
    Restrictions {
        at: at(),
        ..Restrictions::default()
    }
}

fn with_range(expr: &str) -> Restrictions {
    Restrictions {
        range: Some((expr.to_string(), at())),
        ..restrictions()
    }
}

fn enums(members: &[(&str, Option<i64>)]) -> Restrictions {
    Restrictions {
        enums: members
            .iter()
            .map(|(name, value)| EnumMemberStmt {
                name: name.to_string(),
                value: *value,
                at: at(),
            })
            .collect(),
        ..restrictions()
    }
}

fn name(n: &str) -> QName {
    QName::new("m", n)
}

#[test]
fn int32_split_range_end_to_end() -> Result<()> {
    let m = module("m", "m")
        .with(typedef(
            "t",
            ty("int32").with(stmt(Range, Some("3..9|11..max"))),
        ))
        .with(leaf("v", "t"));
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    let def = v.type_def.as_ref().expect("type");

    def.check_number(7)?;
    def.check_number(2147483647)?;
    match def.check_number(10) {
        Err(InvalidRestriction::ValueOutOfRange { value, ranges }) => {
            assert_eq!(value, 10);
            assert_eq!(ranges, vec![(3, 9), (11, 2147483647)]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(def.check_number(2).is_err());
    Ok(())
}

#[test]
fn restriction_must_be_subset() {
    let narrowed = Rc::new(
        derive_type(name("t"), builtin("int8"), &with_range("5..10")).expect("valid restriction"),
    );
    let err = derive_type(name("u"), narrowed, &with_range("0..20")).unwrap_err();
    match err {
        InvalidRestriction::RangeNotSubset { offending, base, .. } => {
            assert_eq!(offending, vec![(0, 20)]);
            assert_eq!(base, vec![(5, 10)]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn range_min_max_refer_to_base() -> Result<()> {
    let t = derive_type(name("t"), builtin("uint8"), &with_range("min..10"))?;
    assert_eq!(t.range().map(|r| r.intervals().to_vec()), Some(vec![(0, 10)]));
    let u = derive_type(name("u"), Rc::new(t), &with_range("max"))?;
    assert_eq!(u.range().map(|r| r.intervals().to_vec()), Some(vec![(10, 10)]));
    Ok(())
}

#[test]
fn malformed_range_is_rejected() {
    for expr in ["9..3", "1..2|2..5", "", "a..b"] {
        let err = derive_type(name("t"), builtin("int32"), &with_range(expr)).unwrap_err();
        assert!(
            matches!(err, InvalidRestriction::MalformedRange { .. }),
            "expected malformed range for '{expr}', got {err}"
        );
    }
}

#[test]
fn range_on_string_is_rejected() {
    let err = derive_type(name("t"), builtin("string"), &with_range("1..5")).unwrap_err();
    match err {
        InvalidRestriction::InvalidForKind { kind, keyword, .. } => {
            assert_eq!(kind, "string");
            assert_eq!(keyword, Range);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn enum_auto_increment() -> Result<()> {
    let t = derive_type(
        name("e"),
        builtin("enumeration"),
        &enums(&[("a", Some(2)), ("b", None), ("c", None)]),
    )?;
    let values: Vec<i64> = t.enums().iter().map(|e| e.value).collect();
    assert_eq!(values, vec![2, 3, 4]);

    // The first member with no explicit value gets zero.
    let t = derive_type(
        name("e2"),
        builtin("enumeration"),
        &enums(&[("a", None), ("b", Some(7)), ("c", None)]),
    )?;
    let values: Vec<i64> = t.enums().iter().map(|e| e.value).collect();
    assert_eq!(values, vec![0, 7, 8]);
    Ok(())
}

#[test]
fn enum_auto_increment_overflow_needs_explicit_value() {
    let err = derive_type(
        name("e"),
        builtin("enumeration"),
        &enums(&[("hi", Some(i32::MAX as i64)), ("over", None)]),
    )
    .unwrap_err();
    match &err {
        InvalidRestriction::NeedsExplicitValue { keyword, member, .. } => {
            assert_eq!(*keyword, Enum);
            assert_eq!(member, "over");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("must have an explicit value"));
}

#[test]
fn enum_duplicates_are_rejected() {
    let err = derive_type(
        name("e"),
        builtin("enumeration"),
        &enums(&[("a", None), ("a", None)]),
    )
    .unwrap_err();
    assert!(matches!(err, InvalidRestriction::DuplicateMember { .. }));

    let err = derive_type(
        name("e"),
        builtin("enumeration"),
        &enums(&[("a", Some(1)), ("b", Some(1))]),
    )
    .unwrap_err();
    assert!(matches!(err, InvalidRestriction::DuplicateValue { value: 1, .. }));
}

#[test]
fn enum_narrowing_is_by_name_only() -> Result<()> {
    let base = Rc::new(derive_type(
        name("e"),
        builtin("enumeration"),
        &enums(&[("a", None), ("b", None), ("c", None)]),
    )?);

    let narrowed = derive_type(name("n"), base.clone(), &enums(&[("b", None)]))?;
    assert_eq!(narrowed.enums().len(), 1);
    // The inherited value is kept, not re-assigned.
    assert_eq!(narrowed.enums()[0].value, 1);

    let err = derive_type(name("n"), base.clone(), &enums(&[("z", None)])).unwrap_err();
    assert!(matches!(err, InvalidRestriction::UnknownMember { .. }));

    let err = derive_type(name("n"), base, &enums(&[("b", Some(5))])).unwrap_err();
    match err {
        InvalidRestriction::ValueMismatch { declared, actual, .. } => {
            assert_eq!(declared, 5);
            assert_eq!(actual, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn plain_derivation_inherits_members() -> Result<()> {
    let base = Rc::new(derive_type(
        name("e"),
        builtin("enumeration"),
        &enums(&[("a", None), ("b", None)]),
    )?);
    let derived = derive_type(name("d"), base.clone(), &restrictions())?;
    assert_eq!(derived.enums(), base.enums());
    Ok(())
}

#[test]
fn bit_positions_auto_increment() -> Result<()> {
    let bits = |members: &[(&str, Option<u64>)]| Restrictions {
        bits: members
            .iter()
            .map(|(name, position)| BitMemberStmt {
                name: name.to_string(),
                position: *position,
                at: at(),
            })
            .collect(),
        ..restrictions()
    };
    let t = derive_type(
        name("f"),
        builtin("bits"),
        &bits(&[("x", Some(3)), ("y", None)]),
    )?;
    let positions: Vec<u64> = t.bits().iter().map(|b| b.position).collect();
    assert_eq!(positions, vec![3, 4]);

    let err = derive_type(
        name("f"),
        builtin("bits"),
        &bits(&[("hi", Some(u32::MAX as u64)), ("over", None)]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InvalidRestriction::NeedsExplicitValue { keyword: Bit, .. }
    ));
    Ok(())
}

#[test]
fn decimal64_scaled_ranges() -> Result<()> {
    let r = Restrictions {
        fraction_digits: Some((2, at())),
        range: Some(("1.5..2.5".to_string(), at())),
        ..restrictions()
    };
    let t = derive_type(name("d"), builtin("decimal64"), &r)?;
    assert_eq!(t.range().map(|r| r.intervals().to_vec()), Some(vec![(150, 250)]));
    t.check_number(parse_decimal_scaled("2.25", 2).expect("literal"))?;
    assert!(t.check_number(251).is_err());
    Ok(())
}

#[test]
fn decimal64_fraction_digits_is_immutable() -> Result<()> {
    let base = Rc::new(derive_type(
        name("d"),
        builtin("decimal64"),
        &Restrictions {
            fraction_digits: Some((2, at())),
            ..restrictions()
        },
    )?);
    let err = derive_type(
        name("d2"),
        base,
        &Restrictions {
            fraction_digits: Some((3, at())),
            ..restrictions()
        },
    )
    .unwrap_err();
    match err {
        InvalidRestriction::FractionDigitsMismatch { declared, actual, .. } => {
            assert_eq!(declared, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn decimal64_requires_fraction_digits() {
    let err = derive_type(name("d"), builtin("decimal64"), &restrictions()).unwrap_err();
    assert!(matches!(err, InvalidRestriction::MissingFractionDigits { .. }));

    let err = derive_type(
        name("d"),
        builtin("decimal64"),
        &Restrictions {
            fraction_digits: Some((19, at())),
            ..restrictions()
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InvalidRestriction::FractionDigitsOutOfRange { value: 19, .. }
    ));
}

#[test]
fn string_patterns_accumulate() -> Result<()> {
    let first = Rc::new(derive_type(
        name("s"),
        builtin("string"),
        &Restrictions {
            patterns: vec![("[a-z]+".to_string(), false, at())],
            ..restrictions()
        },
    )?);
    let second = derive_type(
        name("s2"),
        first,
        &Restrictions {
            patterns: vec![("[^q]*".to_string(), true, at())],
            ..restrictions()
        },
    )?;
    let pats = second.patterns();
    assert_eq!(pats.len(), 2);
    assert!(!pats[0].invert);
    assert!(pats[1].invert);
    Ok(())
}

#[test]
fn invalid_pattern_is_rejected() {
    let err = derive_type(
        name("s"),
        builtin("string"),
        &Restrictions {
            patterns: vec![("[unclosed".to_string(), false, at())],
            ..restrictions()
        },
    )
    .unwrap_err();
    assert!(matches!(err, InvalidRestriction::InvalidPattern { .. }));
}

#[test]
fn string_length_subset() -> Result<()> {
    let base = Rc::new(derive_type(
        name("s"),
        builtin("string"),
        &Restrictions {
            length: Some(("1..32".to_string(), at())),
            ..restrictions()
        },
    )?);
    let err = derive_type(
        name("s2"),
        base,
        &Restrictions {
            length: Some(("0..16".to_string(), at())),
            ..restrictions()
        },
    )
    .unwrap_err();
    assert!(matches!(err, InvalidRestriction::LengthNotSubset { .. }));
    Ok(())
}

#[test]
fn identityref_requires_a_base() {
    let err = derive_type(name("i"), builtin("identityref"), &restrictions()).unwrap_err();
    assert!(matches!(err, InvalidRestriction::MissingBase { .. }));
    assert!(err
        .to_string()
        .contains("at least one base statement has to be present"));
}

#[test]
fn union_member_order_is_preserved() -> Result<()> {
    let m = module("m", "m")
        .with(typedef(
            "u",
            ty("union").with(ty("string")).with(ty("int32")),
        ))
        .with(leaf("v", "u"));
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    let def = v.type_def.as_ref().expect("type");
    match &def.body {
        TypeBody::Union { members } => {
            let kinds: Vec<TypeKind> = members.iter().map(|m| m.kind()).collect();
            assert_eq!(kinds, vec![TypeKind::String, TypeKind::Int32]);
        }
        other => panic!("unexpected body: {other:?}"),
    }
    Ok(())
}

#[test]
fn union_cannot_gain_members() -> Result<()> {
    let defined = Rc::new(derive_type(
        name("u"),
        builtin("union"),
        &Restrictions {
            members: vec![builtin("string")],
            ..restrictions()
        },
    )?);
    let err = derive_type(
        name("u2"),
        defined,
        &Restrictions {
            members: vec![builtin("int32")],
            ..restrictions()
        },
    )
    .unwrap_err();
    assert!(matches!(err, InvalidRestriction::InvalidForKind { .. }));
    Ok(())
}

#[test]
fn pattern_modifier_inverts_via_build() -> Result<()> {
    let m = module("m", "m").with(
        stmt(Leaf, Some("v")).with(
            ty("string").with(
                stmt(Pattern, Some("[a-z]*"))
                    .with(stmt(Modifier, Some("invert-match"))),
            ),
        ),
    );
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    let def = v.type_def.as_ref().expect("type");
    assert_eq!(def.patterns().len(), 1);
    assert!(def.patterns()[0].invert);
    Ok(())
}

#[test]
fn random_nested_ranges_never_accept_outside_base() -> Result<()> {
    fn rand_in(next: &mut dyn FnMut() -> u64, lo: i128, hi: i128) -> i128 {
        let width = (hi - lo) as u128 + 1;
        lo + (next() as u128 % width) as i128
    }
    // Deterministic xorshift; the seed pins the generated cases.
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    for round in 0..64 {
        let mut chain: Vec<Rc<TypeDefinition>> = vec![builtin("int32")];
        for depth in 0..3 {
            let current = chain.last().expect("chain is never empty").clone();
            let intervals = current.range().expect("numeric type").intervals().to_vec();
            let (lo, hi) = intervals[next() as usize % intervals.len()];
            let a = rand_in(&mut next, lo, hi);
            let b = rand_in(&mut next, a, hi);
            let expr = if hi - b >= 2 && next() & 1 == 0 {
                let c = rand_in(&mut next, b + 2, hi);
                let d = rand_in(&mut next, c, hi);
                format!("{a}..{b}|{c}..{d}")
            } else {
                format!("{a}..{b}")
            };
            let derived = derive_type(name(&format!("r{round}_{depth}")), current, &with_range(&expr))?;
            chain.push(Rc::new(derived));
        }
        // A value accepted at some depth must be accepted at every shallower
        // depth; restriction only ever narrows.
        for _ in 0..128 {
            let v = rand_in(&mut next, i32::MIN as i128, i32::MAX as i128);
            for pair in chain.windows(2) {
                if pair[1].check_number(v).is_ok() {
                    assert!(
                        pair[0].check_number(v).is_ok(),
                        "value {v} accepted by a restriction but not by its base"
                    );
                }
            }
        }
    }
    Ok(())
}

#[test]
fn typedef_carries_units_and_default() -> Result<()> {
    let m = module("m", "m")
        .with(
            stmt(Typedef, Some("temp"))
                .with(ty("int16"))
                .with(stmt(Units, Some("celsius")))
                .with(stmt(Default, Some("20"))),
        )
        .with(leaf("v", "temp"));
    let schema = build(vec![m])?;
    let v = schema.find_node(&[QName::new("m", "v")]).expect("leaf");
    let def = v.type_def.as_ref().expect("type");
    assert_eq!(def.units.as_deref(), Some("celsius"));
    assert_eq!(def.default_value.as_deref(), Some("20"));
    Ok(())
}
