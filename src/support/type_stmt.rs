// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The `type` statement support and the restriction leaf statements it
//! collects. Type building is deferred to the effective-model phase: every
//! `type` statement registers one inference action whose prerequisites are
//! its base definition, its union members and, for identityref and absolute
//! leafref, the referenced identities and schema nodes.

use crate::action::{InferenceAction, Prerequisite};
use crate::ast::{ArgValue, QName, StatementKeyword};
use crate::context::{ContextId, ModelPhase, Origin};
use crate::error::StructuralError;
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceValue};
use crate::reactor::SessionState;
use crate::restrict::{derive_type, BitMemberStmt, EnumMemberStmt, Restrictions};
use crate::source::Span;
use crate::support::data::parse_schema_path;
use crate::support::def::node_ref_qname;
use crate::support::{ArgSpec, StatementSupport};
use crate::types::TypeKind;
use crate::Rc;

use anyhow::Result;

/// Gather the restriction substatements of one `type` context. Bases and
/// union members are resolved separately and filled in by the caller.
pub fn collect_restrictions(st: &SessionState, id: ContextId) -> Restrictions {
    let mut r = Restrictions {
        at: st.ctx(id).span.location(),
        ..Restrictions::default()
    };
    for &child in &st.ctx(id).children {
        let ctx = st.ctx(child);
        let at = ctx.span.location();
        let text = || ctx.raw_arg.clone().unwrap_or_default();
        match ctx.keyword {
            StatementKeyword::Range => r.range = Some((text(), at)),
            StatementKeyword::Length => r.length = Some((text(), at)),
            StatementKeyword::Pattern => {
                let invert = st.find_child(child, StatementKeyword::Modifier).is_some();
                r.patterns.push((text(), invert, at));
            }
            StatementKeyword::FractionDigits => {
                if let Some(ArgValue::Int(v)) = &ctx.arg {
                    r.fraction_digits = Some((*v, at));
                }
            }
            StatementKeyword::Enum => {
                let value = st
                    .find_child(child, StatementKeyword::Value)
                    .and_then(|v| match &st.ctx(v).arg {
                        Some(ArgValue::Int(i)) => Some(*i),
                        _ => None,
                    });
                r.enums.push(EnumMemberStmt {
                    name: text(),
                    value,
                    at,
                });
            }
            StatementKeyword::Bit => {
                let position = st
                    .find_child(child, StatementKeyword::Position)
                    .and_then(|p| match &st.ctx(p).arg {
                        Some(ArgValue::Uint(u)) => Some(*u),
                        _ => None,
                    });
                r.bits.push(BitMemberStmt {
                    name: text(),
                    position,
                    at,
                });
            }
            StatementKeyword::Path => r.path = ctx.raw_arg.clone(),
            StatementKeyword::RequireInstance => {
                if let Some(ArgValue::Bool(b)) = &ctx.arg {
                    r.require_instance = Some(*b);
                }
            }
            _ => {}
        }
    }
    r
}

fn require_child(
    st: &SessionState,
    id: ContextId,
    child: StatementKeyword,
    min: u32,
) -> Result<(), StructuralError> {
    let found = st.children_of(id, child).len() as u32;
    if found < min {
        return Err(StructuralError::TooFew {
            parent: StatementKeyword::Type,
            child,
            min,
            found,
            at: st.ctx(id).span.location(),
        });
    }
    Ok(())
}

fn is_restriction(kw: StatementKeyword) -> bool {
    matches!(
        kw,
        StatementKeyword::Range
            | StatementKeyword::Length
            | StatementKeyword::Pattern
            | StatementKeyword::FractionDigits
            | StatementKeyword::Enum
            | StatementKeyword::Bit
            | StatementKeyword::Base
            | StatementKeyword::Path
            | StatementKeyword::RequireInstance
            | StatementKeyword::Type
    )
}

pub struct TypeSupport;

impl StatementSupport for TypeSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Type
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::NodeId
    }

    // Kinds that cannot exist without their defining substatements reject a
    // bare reference to the built-in name up front; everything else is
    // deferred to the restriction builders.
    fn statement_definition(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        let name = match &st.ctx(id).arg {
            Some(ArgValue::NodeId { prefix: None, name }) => name.clone(),
            _ => return Ok(()),
        };
        let kind = match TypeKind::from_name(&name) {
            Some(k) => k,
            None => return Ok(()),
        };
        match kind {
            TypeKind::Enumeration => require_child(st, id, StatementKeyword::Enum, 1)?,
            TypeKind::Bits => require_child(st, id, StatementKeyword::Bit, 1)?,
            TypeKind::Union => require_child(st, id, StatementKeyword::Type, 1)?,
            TypeKind::IdentityRef => require_child(st, id, StatementKeyword::Base, 1)?,
            TypeKind::Leafref => require_child(st, id, StatementKeyword::Path, 1)?,
            TypeKind::Decimal64 => require_child(st, id, StatementKeyword::FractionDigits, 1)?,
            _ => {}
        }
        Ok(())
    }

    fn effective_model(&self, st: &mut SessionState, id: ContextId) -> Result<()> {
        if st.in_submodule_tree(id) {
            return Ok(());
        }
        let (prefix, tname, span) = {
            let ctx = st.ctx(id);
            match &ctx.arg {
                Some(ArgValue::NodeId { prefix, name }) => {
                    (prefix.clone(), name.clone(), ctx.span.clone())
                }
                _ => {
                    return Err(StructuralError::MissingArgument {
                        keyword: StatementKeyword::Type,
                        at: ctx.span.location(),
                    }
                    .into())
                }
            }
        };
        let scope = st.resolution_scope(id);
        let mut prereqs = vec![];

        // Built-in names are only recognized unprefixed; a prefixed name is
        // always a typedef reference.
        if prefix.is_none() && TypeKind::from_name(&tname).is_some() {
            prereqs.push(Prerequisite::new(
                NamespaceKind::Type,
                NamespaceScope::Global,
                NamespaceKey::Name(tname),
                ModelPhase::EffectiveModel,
            ));
        } else {
            let target = match &prefix {
                Some(p) => st.resolve_prefix(scope, p, &span)?,
                None => scope,
            };
            prereqs.push(Prerequisite::new(
                NamespaceKind::Type,
                NamespaceScope::Module(target),
                NamespaceKey::Name(tname),
                ModelPhase::EffectiveModel,
            ));
        }

        let member_ids = st.children_of(id, StatementKeyword::Type);
        for &m in &member_ids {
            prereqs.push(Prerequisite::new(
                NamespaceKind::Type,
                NamespaceScope::Global,
                NamespaceKey::Anon(m),
                ModelPhase::EffectiveModel,
            ));
        }

        let mut base_qnames = vec![];
        for b in st.children_of(id, StatementKeyword::Base) {
            let qname = node_ref_qname(st, b, scope)?;
            prereqs.push(Prerequisite::new(
                NamespaceKind::Identity,
                NamespaceScope::Global,
                NamespaceKey::Qualified(qname.clone()),
                ModelPhase::StatementDefinition,
            ));
            base_qnames.push(qname);
        }

        // An absolute leafref path must resolve to a registered schema node.
        // Relative paths are carried through unverified.
        if let Some(path_text) = st.child_raw_arg(id, StatementKeyword::Path) {
            if path_text.starts_with('/') {
                let (root, segments) =
                    parse_schema_path(st, StatementKeyword::Path, &path_text, scope, &span)?;
                prereqs.push(Prerequisite::new(
                    NamespaceKind::SchemaNode,
                    NamespaceScope::Module(root),
                    NamespaceKey::Path(segments),
                    ModelPhase::FullDeclaration,
                ));
            }
        }

        let typedef_parent = st
            .ctx(id)
            .parent
            .filter(|&p| st.ctx(p).keyword == StatementKeyword::Typedef);
        let is_declared = st.ctx(id).origin == Origin::Declared;
        let module_root = st.module_root(id);
        let module_name = st.module_name(module_root);
        let has_restrictions = st
            .ctx(id)
            .children
            .iter()
            .any(|&c| is_restriction(st.ctx(c).keyword));
        let n_members = member_ids.len();

        let mut action = InferenceAction::new(
            id,
            Box::new(move |st: &mut SessionState, values| {
                build_type(
                    st,
                    id,
                    values,
                    n_members,
                    base_qnames,
                    typedef_parent,
                    is_declared,
                    module_root,
                    &module_name,
                    has_restrictions,
                    &span,
                )
            }),
        )
        .mutates(NamespaceKind::Type);
        for p in prereqs {
            action = action.requires(p);
        }
        st.enqueue(action);
        Ok(())
    }
}
pub static TYPE: TypeSupport = TypeSupport;

#[allow(clippy::too_many_arguments)]
fn build_type(
    st: &mut SessionState,
    id: ContextId,
    values: Vec<NamespaceValue>,
    n_members: usize,
    base_qnames: Vec<QName>,
    typedef_parent: Option<ContextId>,
    is_declared: bool,
    module_root: ContextId,
    module_name: &str,
    has_restrictions: bool,
    span: &Span,
) -> Result<()> {
    let mut it = values.into_iter();
    let base = match it.next() {
        Some(NamespaceValue::Type(t)) => t,
        _ => return Err(anyhow::anyhow!("type prerequisite did not resolve to a type")),
    };
    let mut members = vec![];
    for _ in 0..n_members {
        match it.next() {
            Some(NamespaceValue::Type(t)) => members.push(t),
            _ => {
                return Err(anyhow::anyhow!(
                    "union member prerequisite did not resolve to a type"
                ))
            }
        }
    }

    let mut r = collect_restrictions(st, id);
    r.bases = base_qnames;
    r.members = members;

    let built = if let Some(td) = typedef_parent {
        let td_name = st.ctx(td).name().to_string();
        let mut def = derive_type(QName::new(module_name, &td_name), base, &r)?;
        def.default_value = st.child_raw_arg(td, StatementKeyword::Default);
        def.units = st.child_raw_arg(td, StatementKeyword::Units);
        let built = Rc::new(def);
        if is_declared {
            st.namespaces.put(
                NamespaceKind::Type,
                NamespaceScope::Module(module_root),
                NamespaceKey::Name(td_name),
                NamespaceValue::Type(built.clone()),
                span,
            )?;
        }
        built
    } else if !has_restrictions {
        // A bare reference shares the referenced definition.
        base
    } else {
        // Anonymous restricted type; it keeps the base's name.
        Rc::new(derive_type(base.name.clone(), base, &r)?)
    };

    st.namespaces.put(
        NamespaceKind::Type,
        NamespaceScope::Global,
        NamespaceKey::Anon(id),
        NamespaceValue::Type(built.clone()),
        span,
    )?;
    st.built_types.insert(id, built);
    Ok(())
}

macro_rules! leaf_support {
    ($name:ident, $static_name:ident, $kw:ident, $spec:ident) => {
        pub struct $name;
        impl StatementSupport for $name {
            fn keyword(&self) -> StatementKeyword {
                StatementKeyword::$kw
            }
            fn argument(&self) -> ArgSpec {
                ArgSpec::$spec
            }
        }
        pub static $static_name: $name = $name;
    };
}

leaf_support!(RangeSupport, RANGE, Range, Text);
leaf_support!(LengthSupport, LENGTH, Length, Text);
leaf_support!(PatternSupport, PATTERN, Pattern, Text);
leaf_support!(FractionDigitsSupport, FRACTION_DIGITS, FractionDigits, Int);
leaf_support!(EnumSupport, ENUM, Enum, Text);
leaf_support!(BitSupport, BIT, Bit, Identifier);
leaf_support!(ValueSupport, VALUE, Value, Int);
leaf_support!(PositionSupport, POSITION, Position, Uint);
leaf_support!(BaseSupport, BASE, Base, NodeId);
leaf_support!(PathSupport, PATH, Path, Text);
leaf_support!(RequireInstanceSupport, REQUIRE_INSTANCE, RequireInstance, Bool);

pub struct ModifierSupport;
impl StatementSupport for ModifierSupport {
    fn keyword(&self) -> StatementKeyword {
        StatementKeyword::Modifier
    }
    fn argument(&self) -> ArgSpec {
        ArgSpec::Identifier
    }
    fn validate_argument(&self, arg: &ArgValue, span: &Span) -> Result<(), StructuralError> {
        match arg.as_str() {
            Some("invert-match") => Ok(()),
            _ => Err(StructuralError::MalformedArgument {
                keyword: self.keyword(),
                text: arg.as_str().unwrap_or_default().to_string(),
                reason: "expected 'invert-match'".to_string(),
                at: span.location(),
            }),
        }
    }
}
pub static MODIFIER: ModifierSupport = ModifierSupport;
