use std::sync::Arc;

use either::Either;
use petgraph::graph::EdgeIndex;
use tracing::debug;
use tracing::trace;

use crate::bail;
use crate::composition::satisfiability::SatisfiabilityConfig;
use crate::composition::satisfiability::satisfiability_error::ValidationError;
use crate::composition::satisfiability::validation_state::ValidationState;
use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::operation::Selection;
use crate::query_graph::QueryGraph;
use crate::query_graph::condition_resolver::CachingConditionResolver;
use crate::query_graph::condition_resolver::ConditionResolution;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::condition_resolver::ConditionResolverCache;
use crate::query_graph::condition_resolver::ExcludedEdges;
use crate::query_graph::graph_path::operation::OpGraphPath;
use crate::query_graph::graph_path::operation::SimultaneousPaths;
use crate::utils::logging::snapshot;

/// Explores every supergraph path, depth-first, checking each one can be followed in the
/// subgraphs.
pub(crate) struct ValidationTraversal {
    condition_resolver: SimpleConditionResolver,
    /// The states still to expand. The last one is expanded first.
    stack: Vec<ValidationState>,
    /// The number of subgraph paths held by the states of `stack`.
    total_validation_subgraph_paths: usize,
    max_validation_subgraph_paths: usize,
}

impl ValidationTraversal {
    /// Seeds the traversal with one state per root kind of the supergraph.
    pub(crate) fn new(
        api_schema_query_graph: Arc<QueryGraph>,
        federated_query_graph: Arc<QueryGraph>,
        config: &SatisfiabilityConfig,
    ) -> Result<Self, FederationError> {
        let mut traversal = Self {
            condition_resolver: SimpleConditionResolver::new(federated_query_graph.clone()),
            stack: Vec::new(),
            total_validation_subgraph_paths: 0,
            max_validation_subgraph_paths: config.max_validation_subgraph_paths,
        };
        for root_kind in api_schema_query_graph.root_kinds_to_nodes()?.keys() {
            debug!("Validating {root_kind} root");
            traversal.push_stack(ValidationState::new(
                api_schema_query_graph.clone(),
                federated_query_graph.clone(),
                *root_kind,
            )?)?;
        }
        Ok(traversal)
    }

    fn push_stack(&mut self, state: ValidationState) -> Result<(), FederationError> {
        self.total_validation_subgraph_paths += state.subgraph_paths().len();
        self.stack.push(state);
        if self.total_validation_subgraph_paths > self.max_validation_subgraph_paths {
            return Err(SingleFederationError::MaxValidationSubgraphPathsExceeded {
                message: format!(
                    "Maximum number of validation subgraph paths exceeded: {}",
                    self.total_validation_subgraph_paths
                ),
            }
            .into());
        }
        Ok(())
    }

    fn pop_stack(&mut self) -> Option<ValidationState> {
        let state = self.stack.pop()?;
        self.total_validation_subgraph_paths -= state.subgraph_paths().len();
        Some(state)
    }

    /// Runs the traversal to completion, returning the first unsatisfiable path found, if any.
    pub(crate) fn validate(mut self) -> Result<Option<ValidationError>, FederationError> {
        while let Some(state) = self.pop_stack() {
            if let Some(error) = self.handle_state(&state)? {
                return Ok(Some(error));
            }
        }
        Ok(None)
    }

    fn handle_state(
        &mut self,
        state: &ValidationState,
    ) -> Result<Option<ValidationError>, FederationError> {
        trace!("Validation: {} open states. Validating {state}", self.stack.len() + 1);
        for edge in state.supergraph_path().next_edges() {
            let new_state = match state.validate_transition(edge, &mut self.condition_resolver)? {
                Either::Left(new_state) => new_state,
                Either::Right(error) => {
                    debug!(
                        "Validation error for {}",
                        error.supergraph_unsatisfiable_path()
                    );
                    snapshot!("ValidationError", error.to_string(), "unsatisfiable path");
                    return Ok(Some(error));
                }
            };
            // A terminal path has been fully validated.
            if new_state.supergraph_path().is_terminal() {
                continue;
            }
            if new_state.has_cycled() {
                trace!("Skipping cycled state {new_state}");
                continue;
            }
            self.push_stack(new_state)?;
        }
        Ok(None)
    }
}

#[derive(Clone)]
struct ConditionValidationState<'a> {
    /// Selection that belongs to the condition we're validating.
    selection: &'a Selection,
    /// All the possible "simultaneous paths" we could be in the subgraph when we reach this state
    /// selection. The same options are shared by the states of sibling selections.
    subgraph_options: Arc<Vec<SimultaneousPaths>>,
}

impl std::fmt::Display for ConditionValidationState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <=> [", self.selection)?;
        let mut iter = self.subgraph_options.iter();
        if let Some(first) = iter.next() {
            write!(f, "{first}")?;
            for option in iter {
                write!(f, ", {option}")?;
            }
        }
        write!(f, "]")
    }
}

impl ConditionValidationState<'_> {
    /// Advances all the options with the selection. Returns `None` when no option can, which means
    /// the whole condition cannot be satisfied; otherwise, one state per sub-selection.
    fn advance(
        &self,
        condition_resolver: &mut impl ConditionResolver,
        excluded_edges: &ExcludedEdges,
    ) -> Result<Option<Vec<Self>>, FederationError> {
        let mut new_options = Vec::new();
        let element = self.selection.element();
        for paths in self.subgraph_options.iter() {
            let options =
                paths.advance_with_operation_element(&element, condition_resolver, excluded_edges)?;
            let Some(options) = options else {
                continue;
            };
            new_options.extend(options);
        }

        if new_options.is_empty() {
            // If we got no options, it means that particular selection of the conditions cannot be
            // satisfied, so the overall condition cannot.
            return Ok(None);
        }

        let subgraph_options = Arc::new(new_options);
        let result = match self.selection.selection_set() {
            Some(selection_set) => selection_set
                .iter()
                .map(|selection| ConditionValidationState {
                    selection,
                    subgraph_options: subgraph_options.clone(),
                })
                .collect(),
            None => Vec::new(),
        };
        Ok(Some(result))
    }
}

/// A `ConditionResolver` that only validates that the conditions of an edge can be satisfied,
/// without comparing the various ways to satisfy them.
pub(crate) struct SimpleConditionResolver {
    query_graph: Arc<QueryGraph>,
    /// The cache for condition resolution.
    condition_resolver_cache: ConditionResolverCache,
}

impl SimpleConditionResolver {
    pub(crate) fn new(query_graph: Arc<QueryGraph>) -> Self {
        SimpleConditionResolver {
            query_graph,
            condition_resolver_cache: ConditionResolverCache::new(),
        }
    }
}

impl CachingConditionResolver for SimpleConditionResolver {
    fn query_graph(&self) -> &QueryGraph {
        &self.query_graph
    }

    fn resolver_cache(&mut self) -> &mut ConditionResolverCache {
        &mut self.condition_resolver_cache
    }

    fn resolve_without_cache(
        &self,
        edge: EdgeIndex,
        excluded_edges: &ExcludedEdges,
    ) -> Result<ConditionResolution, FederationError> {
        let edge_weight = self.query_graph.edge_weight(edge)?;
        let Some(conditions) = &edge_weight.conditions else {
            bail!("Edge {edge_weight} has no conditions to resolve");
        };
        // The edge can't be used to satisfy its own conditions.
        let excluded_edges = excluded_edges.add_item(edge);
        let head = self.query_graph.edge_endpoints(edge)?.0;

        let initial_path = OpGraphPath::new(self.query_graph.clone(), head)?;
        let initial_options = Arc::new(vec![SimultaneousPaths::from(initial_path)]);
        let mut condition_resolver = SimpleConditionResolver::new(self.query_graph.clone());

        let mut stack = Vec::new();
        for selection in conditions.iter() {
            stack.push(ConditionValidationState {
                selection,
                subgraph_options: initial_options.clone(),
            });
        }

        while let Some(state) = stack.pop() {
            trace!("Validating condition {state}");
            match state.advance(&mut condition_resolver, &excluded_edges)? {
                None => {
                    return Ok(ConditionResolution::Unsatisfied);
                }
                Some(new_states) => {
                    stack.extend(new_states);
                }
            }
        }
        // If we exhaust the stack, it means we've been able to find "some" path for every possible
        // selection in the condition, so the condition is validated.
        Ok(ConditionResolution::Satisfied)
    }
}
