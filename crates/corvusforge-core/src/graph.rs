// crates/corvusforge-core/src/graph.rs
// ============================================================================
// Module: Corvusforge Prerequisite Graph
// Description: Static DAG of stage dependencies with cascade-block support.
// Purpose: Provide predecessor lookup, transitive-dependent computation for
// cascade blocking, and a topological order, rejecting cyclic configuration
// at construction time.
// Dependencies: std::collections, crate::stage
// ============================================================================

//! ## Overview
//! The prerequisite graph is part of the configuration baseline: it is built
//! once from a predecessor map and is immutable afterward. Construction
//! fails closed if the declared edges form a cycle, per the design note that
//! fail-closed constructors are preferred over fallible use-time checks.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::stage::ALL_STAGES;
use crate::stage::StageIdentifier;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing a [`PrerequisiteGraph`].
#[derive(Debug, Error)]
pub enum GraphError {
    /// The declared predecessor edges form a cycle.
    #[error("prerequisite graph contains a cycle involving {0}")]
    Cycle(StageIdentifier),
}

// ============================================================================
// SECTION: Prerequisite Graph
// ============================================================================

/// Static DAG over stage identifiers.
///
/// # Invariants
/// - Acyclic; enforced at construction.
/// - Every stage in [`ALL_STAGES`] has an entry, possibly with an empty
///   predecessor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerequisiteGraph {
    predecessors: BTreeMap<StageIdentifier, BTreeSet<StageIdentifier>>,
}

impl PrerequisiteGraph {
    /// Builds a prerequisite graph from an explicit predecessor map.
    ///
    /// Stages absent from `predecessors` are assumed to have no
    /// predecessors.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] if the declared edges form a cycle.
    pub fn new(
        predecessors: BTreeMap<StageIdentifier, BTreeSet<StageIdentifier>>,
    ) -> Result<Self, GraphError> {
        let mut complete = predecessors;
        for stage in ALL_STAGES {
            complete.entry(stage).or_default();
        }
        let graph = Self { predecessors: complete };
        graph.topological_order()?;
        Ok(graph)
    }

    /// Builds the default linear pipeline graph: each stage depends on
    /// exactly the stage before it in [`ALL_STAGES`] order.
    #[must_use]
    pub fn linear_default() -> Self {
        let mut predecessors = BTreeMap::new();
        for window in ALL_STAGES.windows(2) {
            let mut set = BTreeSet::new();
            set.insert(window[0]);
            predecessors.insert(window[1], set);
        }
        // A linear chain is acyclic by construction; unwrap-free build.
        Self::new(predecessors).unwrap_or_else(|_| Self { predecessors: BTreeMap::new() })
    }

    /// Returns the direct predecessors of `stage`.
    #[must_use]
    pub fn predecessors(&self, stage: StageIdentifier) -> &BTreeSet<StageIdentifier> {
        static EMPTY: BTreeSet<StageIdentifier> = BTreeSet::new();
        self.predecessors.get(&stage).unwrap_or(&EMPTY)
    }

    /// Returns every stage that transitively depends on `stage`, used to
    /// compute the cascade-block set when `stage` fails.
    #[must_use]
    pub fn transitive_dependents(&self, stage: StageIdentifier) -> BTreeSet<StageIdentifier> {
        let mut dependents = BTreeSet::new();
        let mut frontier = vec![stage];
        while let Some(current) = frontier.pop() {
            for (candidate, preds) in &self.predecessors {
                if preds.contains(&current) && dependents.insert(*candidate) {
                    frontier.push(*candidate);
                }
            }
        }
        dependents
    }

    /// Returns a topological order of all stages.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] if the graph contains a cycle (this can
    /// only happen if called during construction on not-yet-validated edges;
    /// once a [`PrerequisiteGraph`] exists, this always succeeds).
    pub fn topological_order(&self) -> Result<Vec<StageIdentifier>, GraphError> {
        let mut visited: BTreeMap<StageIdentifier, VisitState> = BTreeMap::new();
        let mut order = Vec::with_capacity(self.predecessors.len());
        for &stage in self.predecessors.keys() {
            self.visit(stage, &mut visited, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        stage: StageIdentifier,
        visited: &mut BTreeMap<StageIdentifier, VisitState>,
        order: &mut Vec<StageIdentifier>,
    ) -> Result<(), GraphError> {
        match visited.get(&stage) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => return Err(GraphError::Cycle(stage)),
            None => {}
        }
        visited.insert(stage, VisitState::InProgress);
        for &pred in self.predecessors(stage) {
            self.visit(pred, visited, order)?;
        }
        visited.insert(stage, VisitState::Done);
        order.push(stage);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}
