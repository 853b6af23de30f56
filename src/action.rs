// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::context::{ContextId, ModelPhase};
use crate::namespace::{NamespaceKey, NamespaceKind, NamespaceScope, NamespaceValue};
use crate::reactor::SessionState;

use anyhow::Result;

/// One declarative requirement of an inference action: the key must exist in
/// the namespace and, when it refers to a statement context, that context
/// must have completed the given phase.
#[derive(Debug, Clone)]
pub struct Prerequisite {
    pub namespace: NamespaceKind,
    pub scope: NamespaceScope,
    pub key: NamespaceKey,
    pub phase: ModelPhase,
}

impl Prerequisite {
    pub fn new(
        namespace: NamespaceKind,
        scope: NamespaceScope,
        key: NamespaceKey,
        phase: ModelPhase,
    ) -> Prerequisite {
        Prerequisite {
            namespace,
            scope,
            key,
            phase,
        }
    }
}

pub type ApplyFn = Box<dyn FnOnce(&mut SessionState, Vec<NamespaceValue>) -> Result<()>>;

/// A deferred inference step. Registered by statement supports during phase
/// callbacks; executed by the reactor exactly once, after all prerequisites
/// resolve. Actions that never resolve are reported together when the
/// worklist stalls, which is how missing and circular references surface.
pub struct InferenceAction {
    /// Context that declared the requirement, for diagnostics.
    pub requirer: ContextId,
    pub prerequisites: Vec<Prerequisite>,
    /// Declared write intents. While the apply callback runs, the namespace
    /// store rejects `put`s to kinds outside this set.
    pub mutates: Vec<NamespaceKind>,
    pub(crate) apply: ApplyFn,
}

impl InferenceAction {
    pub fn new(requirer: ContextId, apply: ApplyFn) -> InferenceAction {
        InferenceAction {
            requirer,
            prerequisites: vec![],
            mutates: vec![],
            apply,
        }
    }

    pub fn requires(mut self, p: Prerequisite) -> InferenceAction {
        self.prerequisites.push(p);
        self
    }

    pub fn mutates(mut self, ns: NamespaceKind) -> InferenceAction {
        self.mutates.push(ns);
        self
    }
}
