use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::IndexSet;
use petgraph::graph::EdgeIndex;

use crate::error::FederationError;
use crate::query_graph::QueryGraph;

/// Whether the conditions of an edge can be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConditionResolution {
    Satisfied,
    Unsatisfied,
}

#[cfg(test)]
impl ConditionResolution {
    pub(crate) fn is_satisfied(self) -> bool {
        matches!(self, ConditionResolution::Satisfied)
    }
}

/// The edges whose conditions are being resolved "above" the current resolution. Taking them
/// again while resolving nested conditions would loop, so they are skipped.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExcludedEdges(Arc<IndexSet<EdgeIndex>>);

impl ExcludedEdges {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn contains(&self, edge: EdgeIndex) -> bool {
        self.0.contains(&edge)
    }

    /// A copy of this set with `edge` added. `self` is left untouched.
    pub(crate) fn add_item(&self, edge: EdgeIndex) -> Self {
        let mut edges = IndexSet::clone(&self.0);
        edges.insert(edge);
        Self(Arc::new(edges))
    }
}

/// A query graph edge's conditions resolver.
pub(crate) trait ConditionResolver {
    /// Resolves the conditions of `edge`, skipping `excluded_edges` along the way. Edges without
    /// conditions are trivially satisfied.
    fn resolve(
        &mut self,
        edge: EdgeIndex,
        excluded_edges: &ExcludedEdges,
    ) -> Result<ConditionResolution, FederationError>;
}

#[derive(Debug, Default)]
pub(crate) struct ConditionResolverCache {
    edge_states: IndexMap<EdgeIndex, ConditionResolution>,
}

impl ConditionResolverCache {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn get(&self, edge: EdgeIndex) -> Option<ConditionResolution> {
        self.edge_states.get(&edge).copied()
    }

    pub(crate) fn insert(&mut self, edge: EdgeIndex, resolution: ConditionResolution) {
        self.edge_states.insert(edge, resolution);
    }
}

/// A [`ConditionResolver`] that remembers the resolution of each edge.
///
/// Only resolutions computed with no excluded edges are cached: a resolution with exclusions
/// depends on how the edge was reached.
pub(crate) trait CachingConditionResolver {
    fn query_graph(&self) -> &QueryGraph;

    fn resolve_without_cache(
        &self,
        edge: EdgeIndex,
        excluded_edges: &ExcludedEdges,
    ) -> Result<ConditionResolution, FederationError>;

    fn resolver_cache(&mut self) -> &mut ConditionResolverCache;

    fn resolve_with_cache(
        &mut self,
        edge: EdgeIndex,
        excluded_edges: &ExcludedEdges,
    ) -> Result<ConditionResolution, FederationError> {
        if !excluded_edges.is_empty() {
            return self.resolve_without_cache(edge, excluded_edges);
        }
        if let Some(resolution) = self.resolver_cache().get(edge) {
            return Ok(resolution);
        }
        let resolution = self.resolve_without_cache(edge, excluded_edges)?;
        self.resolver_cache().insert(edge, resolution);
        Ok(resolution)
    }
}

impl<T: CachingConditionResolver> ConditionResolver for T {
    fn resolve(
        &mut self,
        edge: EdgeIndex,
        excluded_edges: &ExcludedEdges,
    ) -> Result<ConditionResolution, FederationError> {
        if self.query_graph().edge_weight(edge)?.conditions.is_none() {
            return Ok(ConditionResolution::Satisfied);
        }
        self.resolve_with_cache(edge, excluded_edges)
    }
}
