// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::action::{InferenceAction, Prerequisite};
use crate::ast::{QName, RawStatement, StatementKeyword};
use crate::context::{ContextId, ModelPhase, Origin, StatementContext};
use crate::error::{
    BuildError, InvalidRestriction, ReferenceError, StructuralError, UnresolvedPrerequisite,
};
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceStore, NamespaceValue};
use crate::schema::{EffectiveModule, EffectiveStatement, IdentityDef, SchemaContext};
use crate::source::{Source, Span};
use crate::support::{self, support_for};
use crate::types::{TypeDefinition, BUILT_IN_TYPES};
use crate::Rc;

use std::collections::BTreeMap;

use anyhow::Result;

/// Wrap a typed failure into the outer `BuildError` taxonomy and attach the
/// offending statement's caret-formatted message as the rendered context.
/// Errors diagnosed deeper in the build pass through untouched.
fn diagnose(span: &Span, err: anyhow::Error) -> anyhow::Error {
    if err.downcast_ref::<BuildError>().is_some() {
        return err;
    }
    let err = match err.downcast::<StructuralError>() {
        Ok(e) => BuildError::from(e),
        Err(err) => match err.downcast::<InvalidRestriction>() {
            Ok(e) => BuildError::from(e),
            Err(err) => return err,
        },
    };
    let caret = span.message("error", &err.to_string());
    anyhow::Error::new(err).context(caret)
}

/// Mutable state of one build: the context arena, all namespace instances,
/// the inference-action worklist and the side tables filled while the
/// effective model is assembled. Exclusively owned by the session; consumed
/// when the effective model is frozen.
pub struct SessionState {
    pub(crate) arena: Vec<StatementContext>,
    pub(crate) roots: Vec<ContextId>,
    pub(crate) namespaces: NamespaceStore,
    pub(crate) actions: Vec<InferenceAction>,
    /// Built type definition of each `type` statement context.
    pub(crate) built_types: BTreeMap<ContextId, Rc<TypeDefinition>>,
    /// Identity -> declared bases, filled by identity inference actions.
    pub(crate) identity_bases: BTreeMap<QName, Vec<QName>>,
}

impl SessionState {
    fn new() -> SessionState {
        SessionState {
            arena: vec![],
            roots: vec![],
            namespaces: NamespaceStore::new(),
            actions: vec![],
            built_types: BTreeMap::new(),
            identity_bases: BTreeMap::new(),
        }
    }

    pub fn ctx(&self, id: ContextId) -> &StatementContext {
        &self.arena[id.0 as usize]
    }

    pub fn ctx_mut(&mut self, id: ContextId) -> &mut StatementContext {
        &mut self.arena[id.0 as usize]
    }

    pub fn enqueue(&mut self, action: InferenceAction) {
        self.actions.push(action);
    }

    /// The module or submodule context enclosing `id` (or `id` itself).
    pub fn module_root(&self, id: ContextId) -> ContextId {
        let mut cur = id;
        loop {
            let ctx = self.ctx(cur);
            if matches!(
                ctx.keyword,
                StatementKeyword::Module | StatementKeyword::Submodule
            ) {
                return cur;
            }
            match ctx.parent {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    pub fn module_name(&self, root: ContextId) -> String {
        self.ctx(root).raw_arg.clone().unwrap_or_default()
    }

    /// The scope against which unprefixed references inside `id` resolve:
    /// the defining module for expanded contexts, the enclosing module
    /// otherwise.
    pub fn resolution_scope(&self, id: ContextId) -> ContextId {
        match self.ctx(id).origin_scope {
            Some(scope) => scope,
            None => self.module_root(id),
        }
    }

    pub fn find_child(&self, id: ContextId, kw: StatementKeyword) -> Option<ContextId> {
        self.ctx(id)
            .children
            .iter()
            .find(|&&c| self.ctx(c).keyword == kw)
            .cloned()
    }

    pub fn children_of(&self, id: ContextId, kw: StatementKeyword) -> Vec<ContextId> {
        self.ctx(id)
            .children
            .iter()
            .filter(|&&c| self.ctx(c).keyword == kw)
            .cloned()
            .collect()
    }

    pub fn child_raw_arg(&self, id: ContextId, kw: StatementKeyword) -> Option<String> {
        self.find_child(id, kw)
            .and_then(|c| self.ctx(c).raw_arg.clone())
    }

    /// Resolve a prefix declared by `scope_root`'s module (its own prefix or
    /// one of its imports) to the module context it denotes.
    pub fn resolve_prefix(
        &self,
        scope_root: ContextId,
        prefix: &str,
        span: &Span,
    ) -> Result<ContextId, StructuralError> {
        match self.namespaces.get(
            NamespaceKind::Prefix,
            NamespaceScope::Module(scope_root),
            &NamespaceKey::Name(prefix.to_string()),
        ) {
            Some(entry) => match &entry.value {
                NamespaceValue::Context(id) => Ok(*id),
                NamespaceValue::Type(_) => Err(StructuralError::UnknownPrefix {
                    prefix: prefix.to_string(),
                    at: span.location(),
                }),
            },
            None => Err(StructuralError::UnknownPrefix {
                prefix: prefix.to_string(),
                at: span.location(),
            }),
        }
    }

    /// Module name qualifying `id` in schema paths.
    pub fn node_module_name(&self, id: ContextId) -> String {
        match &self.ctx(id).name_module {
            Some(m) => m.clone(),
            None => self.module_name(self.module_root(id)),
        }
    }

    /// Whether `id` belongs to a submodule's own statement tree. Submodule
    /// content is folded into the including module by copy; the original tree
    /// declares its local symbols but performs no cross-context resolution,
    /// which may reference statements only visible in the including module.
    pub fn in_submodule_tree(&self, id: ContextId) -> bool {
        self.ctx(self.module_root(id)).keyword == StatementKeyword::Submodule
    }

    /// Whether `id` sits inside a grouping or augment body; such nodes are
    /// templates and do not occupy a place in the schema tree themselves.
    pub fn in_template(&self, id: ContextId) -> bool {
        let mut cur = self.ctx(id).parent;
        while let Some(p) = cur {
            if matches!(
                self.ctx(p).keyword,
                StatementKeyword::Grouping | StatementKeyword::Augment
            ) {
                return true;
            }
            cur = self.ctx(p).parent;
        }
        false
    }

    /// Schema path of a data node from its module root, skipping statements
    /// that are expanded away (`uses`).
    pub fn schema_path(&self, id: ContextId) -> Vec<QName> {
        let mut path = vec![];
        let mut cur = Some(id);
        while let Some(c) = cur {
            let ctx = self.ctx(c);
            if matches!(
                ctx.keyword,
                StatementKeyword::Module | StatementKeyword::Submodule
            ) {
                break;
            }
            if ctx.keyword.is_schema_node() {
                path.push(QName {
                    module: Some(self.node_module_name(c)),
                    name: ctx.name().to_string(),
                });
            }
            cur = ctx.parent;
        }
        path.reverse();
        path
    }

    fn alloc(
        &mut self,
        keyword: StatementKeyword,
        raw_arg: Option<String>,
        span: Span,
        parent: Option<ContextId>,
        origin: Origin,
    ) -> ContextId {
        let id = ContextId(self.arena.len() as u32);
        self.arena
            .push(StatementContext::new(keyword, raw_arg, span, parent, origin));
        if let Some(p) = parent {
            self.arena[p.0 as usize].children.push(id);
        }
        id
    }

    fn build_context_tree(
        &mut self,
        raw: &RawStatement,
        parent: Option<ContextId>,
    ) -> Result<ContextId> {
        let keyword = match StatementKeyword::from_str(&raw.keyword) {
            Some(kw) => kw,
            None => {
                let err = StructuralError::UnknownStatement {
                    keyword: raw.keyword.clone(),
                    at: raw.span.location(),
                };
                return Err(diagnose(&raw.span, err.into()));
            }
        };
        let id = self.alloc(
            keyword,
            raw.arg.clone(),
            raw.span.clone(),
            parent,
            Origin::Declared,
        );
        for sub in &raw.substatements {
            self.build_context_tree(sub, Some(id))?;
        }
        Ok(id)
    }

    /// Copy the statement subtree rooted at `src` (copies, not shared
    /// instances; each use site carries independent identity and ordering).
    /// Children that were themselves expanded into `src`'s subtree are
    /// skipped; the copied `uses`/`include` statements re-expand at the new
    /// site.
    pub fn copy_subtree(
        &mut self,
        src: ContextId,
        parent: ContextId,
        origin_scope: ContextId,
        name_module: Option<String>,
        origin: Origin,
    ) -> ContextId {
        let (keyword, raw_arg, span) = {
            let ctx = self.ctx(src);
            (ctx.keyword, ctx.raw_arg.clone(), ctx.span.clone())
        };
        let id = self.alloc(keyword, raw_arg, span, Some(parent), origin);
        self.ctx_mut(id).origin_scope = Some(origin_scope);
        self.ctx_mut(id).name_module = name_module.clone();
        let children = self.ctx(src).children.clone();
        for child in children {
            if self.ctx(child).origin == Origin::Expanded {
                continue;
            }
            self.copy_subtree(child, id, origin_scope, name_module.clone(), origin);
        }
        id
    }

    /// Subtree in depth-first order, parents before children.
    pub fn subtree(&self, id: ContextId) -> Vec<ContextId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            let children = self.ctx(out[i]).children.clone();
            out.extend(children);
            i += 1;
        }
        out
    }

    /// Run one phase on one context: the reactor-side argument parsing and
    /// cardinality validation at statement definition, then the support's
    /// phase callback.
    fn run_single(&mut self, id: ContextId, phase: ModelPhase) -> Result<()> {
        let keyword = self.ctx(id).keyword;
        let span = self.ctx(id).span.clone();
        let sup = support_for(keyword);
        if phase == ModelPhase::StatementDefinition {
            let raw = self.ctx(id).raw_arg.clone();
            let arg = support::parse_argument(sup.argument(), keyword, raw.as_deref(), &span)
                .map_err(|e| diagnose(&span, e.into()))?;
            if let Some(arg) = &arg {
                sup.validate_argument(arg, &span)
                    .map_err(|e| diagnose(&span, e.into()))?;
            }
            self.ctx_mut(id).arg = arg;
            support::validate_substatements(self, id).map_err(|e| diagnose(&span, e.into()))?;
        }
        let ran = match phase {
            ModelPhase::Init => Ok(()),
            ModelPhase::SourcePreLinkage => sup.pre_linkage(self, id),
            ModelPhase::SourceLinkage => sup.linkage(self, id),
            ModelPhase::StatementDefinition => sup.statement_definition(self, id),
            ModelPhase::FullDeclaration => sup.full_declaration(self, id),
            ModelPhase::EffectiveModel => sup.effective_model(self, id),
        };
        ran.map_err(|e| diagnose(&span, e))?;
        self.ctx_mut(id).phase = phase;
        Ok(())
    }

    /// Bring a freshly expanded subtree up to `through`, so it joins the
    /// lock-step phase progression of the declared contexts.
    pub fn catch_up(&mut self, root: ContextId, through: ModelPhase) -> Result<()> {
        let ids = self.subtree(root);
        for phase in ModelPhase::ALL {
            if phase > through {
                break;
            }
            for &id in &ids {
                if self.ctx(id).phase < phase {
                    self.run_single(id, phase)?;
                }
            }
        }
        Ok(())
    }

    fn prerequisite_satisfied(&self, p: &Prerequisite) -> Option<NamespaceValue> {
        let entry = self.namespaces.get(p.namespace, p.scope, &p.key)?;
        match &entry.value {
            NamespaceValue::Context(id) => {
                if self.ctx(*id).phase >= p.phase {
                    Some(entry.value.clone())
                } else {
                    None
                }
            }
            NamespaceValue::Type(_) => Some(entry.value.clone()),
        }
    }

    fn try_resolve(&self, prereqs: &[Prerequisite]) -> Option<Vec<NamespaceValue>> {
        let mut values = Vec::with_capacity(prereqs.len());
        for p in prereqs {
            values.push(self.prerequisite_satisfied(p)?);
        }
        Some(values)
    }

    /// Execute every action whose prerequisites are all satisfied, repeating
    /// until a fixpoint. Actions registered by an apply callback participate
    /// in the same drain.
    fn drain_worklist(&mut self) -> Result<bool> {
        let mut any = false;
        loop {
            if self.actions.is_empty() {
                return Ok(any);
            }
            let pending = std::mem::take(&mut self.actions);
            let mut still = vec![];
            let mut progressed = false;
            for action in pending {
                match self.try_resolve(&action.prerequisites) {
                    Some(values) => {
                        let span = self.ctx(action.requirer).span.clone();
                        self.namespaces.begin_intents(action.mutates.clone());
                        let applied = (action.apply)(self, values);
                        self.namespaces.end_intents();
                        applied.map_err(|e| diagnose(&span, e))?;
                        progressed = true;
                        any = true;
                    }
                    None => still.push(action),
                }
            }
            let mut newly = std::mem::take(&mut self.actions);
            still.append(&mut newly);
            self.actions = still;
            if !progressed {
                return Ok(any);
            }
        }
    }

    /// At the end of a phase, any pending action whose prerequisites should
    /// all have been producible by now is permanently unresolvable: its
    /// target is missing, or a set of actions mutually prerequisite one
    /// another. Either way the build fails with the full chain.
    fn check_stalled(&self, phase: ModelPhase) -> Result<()> {
        let mut unresolved = vec![];
        let mut first_span: Option<Span> = None;
        for action in &self.actions {
            if action.prerequisites.iter().any(|p| p.phase > phase) {
                continue;
            }
            for p in &action.prerequisites {
                if self.prerequisite_satisfied(p).is_none() {
                    let ctx = self.ctx(action.requirer);
                    if first_span.is_none() {
                        first_span = Some(ctx.span.clone());
                    }
                    unresolved.push(UnresolvedPrerequisite {
                        requirer: ctx.keyword,
                        at: ctx.span.location(),
                        namespace: p.namespace,
                        key: p.key.to_string(),
                    });
                }
            }
        }
        let span = match first_span {
            Some(span) => span,
            None => return Ok(()),
        };
        let err = BuildError::Reference(ReferenceError::Stalled {
            phase: phase.to_string(),
            unresolved,
        });
        let caret = span.message("error", &err.to_string());
        Err(anyhow::Error::new(err).context(caret))
    }
}

/// One schema build. Sources are raw statement trees, fully materialized
/// before the reactor starts; building is single-threaded cooperative, and
/// all waiting is expressed through the inference-action worklist.
#[derive(Default)]
pub struct BuildSession {
    sources: Vec<RawStatement>,
}

impl BuildSession {
    pub fn new() -> BuildSession {
        BuildSession::default()
    }

    pub fn add_source(mut self, source: RawStatement) -> BuildSession {
        self.sources.push(source);
        self
    }

    /// Drive every statement context through all build phases and freeze the
    /// result. On failure the whole build is abandoned; there is no partial
    /// effective model.
    pub fn build(self) -> Result<SchemaContext> {
        let mut st = SessionState::new();

        // Statically known built-ins are pre-resolved values in the global
        // type namespace.
        let builtin_source = Source::synthetic("built-in");
        let builtin_span = Span::synthetic(&builtin_source, 1);
        for (name, def) in BUILT_IN_TYPES.iter() {
            st.namespaces
                .put(
                    NamespaceKind::Type,
                    NamespaceScope::Global,
                    NamespaceKey::Name(name.to_string()),
                    NamespaceValue::Type(def.clone()),
                    &builtin_span,
                )
                .map_err(|e| diagnose(&builtin_span, e.into()))?;
        }

        for raw in &self.sources {
            let root = st.build_context_tree(raw, None)?;
            st.roots.push(root);
        }

        for phase in ModelPhase::ALL {
            loop {
                let previous = phase.previous();
                let ready: Vec<ContextId> = (0..st.arena.len() as u32)
                    .map(ContextId)
                    .filter(|&id| st.ctx(id).phase == previous)
                    .collect();
                let mut ran = false;
                for id in ready {
                    // Expanded contexts may have been caught up past this
                    // phase while the sweep was collected.
                    if st.ctx(id).phase == previous {
                        st.run_single(id, phase)?;
                        ran = true;
                    }
                }
                let progressed = st.drain_worklist()?;
                if !ran && !progressed {
                    break;
                }
            }
            st.check_stalled(phase)?;
        }

        materialize(st)
    }
}

fn materialize(st: SessionState) -> Result<SchemaContext> {
    let mut modules = vec![];
    for &root in &st.roots {
        let ctx = st.ctx(root);
        if ctx.keyword != StatementKeyword::Module {
            // Submodules are folded into their including module.
            continue;
        }
        let name = ctx.name().to_string();
        let namespace = st
            .child_raw_arg(root, StatementKeyword::Namespace)
            .unwrap_or_default();
        let prefix = st
            .child_raw_arg(root, StatementKeyword::Prefix)
            .unwrap_or_default();
        let revision = st
            .children_of(root, StatementKeyword::Revision)
            .iter()
            .filter_map(|&c| st.ctx(c).raw_arg.clone())
            .max();
        let root_stmt = build_effective(&st, root)?;
        modules.push(Rc::new(EffectiveModule {
            name,
            namespace,
            prefix,
            revision,
            root: root_stmt,
        }));
    }

    let mut identities = vec![];
    for (key, _) in st
        .namespaces
        .entries(NamespaceKind::Identity, NamespaceScope::Global)
    {
        if let NamespaceKey::Qualified(qname) = key {
            identities.push(IdentityDef {
                name: qname.clone(),
                bases: st
                    .identity_bases
                    .get(qname)
                    .cloned()
                    .unwrap_or_default(),
            });
        }
    }

    let mut types: Vec<Rc<TypeDefinition>> = vec![];
    for def in st.built_types.values() {
        if !types.iter().any(|t| Rc::ptr_eq(t, def)) {
            types.push(def.clone());
        }
    }

    Ok(SchemaContext::new(modules, identities, types))
}

fn build_effective(st: &SessionState, id: ContextId) -> Result<EffectiveStatement> {
    let ctx = st.ctx(id);

    if ctx.keyword == StatementKeyword::List {
        check_list_keys(st, id)?;
    }

    let mut substatements = vec![];
    for &child in &ctx.children {
        substatements.push(build_effective(st, child)?);
    }

    let type_def = match ctx.keyword {
        StatementKeyword::Type => st.built_types.get(&id).cloned(),
        StatementKeyword::Typedef | StatementKeyword::Leaf | StatementKeyword::LeafList => st
            .find_child(id, StatementKeyword::Type)
            .and_then(|t| st.built_types.get(&t).cloned()),
        _ => None,
    };

    let name = if ctx.keyword.is_schema_node() {
        Some(QName {
            module: Some(st.node_module_name(id)),
            name: ctx.name().to_string(),
        })
    } else {
        None
    };

    Ok(EffectiveStatement {
        keyword: ctx.keyword,
        arg: ctx.arg.clone(),
        name,
        type_def,
        substatements,
    })
}

/// Every name in a list's `key` must be a leaf of the list, counting leaves
/// brought in by grouping expansion.
fn check_list_keys(st: &SessionState, id: ContextId) -> Result<()> {
    let key = match st.find_child(id, StatementKeyword::Key) {
        Some(k) => k,
        None => return Ok(()),
    };
    let key_arg = st.ctx(key).raw_arg.clone().unwrap_or_default();
    for name in key_arg.split_whitespace() {
        if !has_leaf_named(st, id, name) {
            let err = StructuralError::MissingListKey {
                list: st.ctx(id).name().to_string(),
                key: name.to_string(),
                at: st.ctx(key).span.location(),
            };
            return Err(diagnose(&st.ctx(key).span, err.into()));
        }
    }
    Ok(())
}

fn has_leaf_named(st: &SessionState, id: ContextId, name: &str) -> bool {
    for &child in &st.ctx(id).children {
        let ctx = st.ctx(child);
        if ctx.keyword == StatementKeyword::Leaf && ctx.name() == name {
            return true;
        }
        if ctx.keyword.is_transparent() && has_leaf_named(st, child, name) {
            return true;
        }
    }
    false
}
