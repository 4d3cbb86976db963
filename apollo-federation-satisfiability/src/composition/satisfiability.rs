pub(crate) mod satisfiability_error;
pub(crate) mod validation_state;
pub(crate) mod validation_traversal;

use std::sync::Arc;

use either::Either;

use crate::Supergraph;
use crate::bail;
use crate::composition::satisfiability::satisfiability_error::ValidationError;
use crate::composition::satisfiability::validation_state::ValidationState;
use crate::composition::satisfiability::validation_traversal::SimpleConditionResolver;
use crate::composition::satisfiability::validation_traversal::ValidationTraversal;
use crate::ensure;
use crate::error::CompositionError;
use crate::error::FederationError;
use crate::query_graph::QueryGraph;
use crate::query_graph::build_federated_query_graph;
use crate::query_graph::build_query_graph;
use crate::query_graph::graph_path::transition::TransitionGraphPath;
use crate::subgraph::Subgraph;

/// The name of the query graph built from the supergraph API schema.
const API_SCHEMA_QUERY_GRAPH_NAME: &str = "supergraph";

#[derive(Debug, Clone)]
pub struct SatisfiabilityConfig {
    /// The maximum number of subgraph paths the validation traversal may keep at once, across all
    /// the states yet to be expanded. Exceeding it aborts the validation.
    ///
    /// Defaults to 1,000,000.
    pub max_validation_subgraph_paths: usize,
}

impl Default for SatisfiabilityConfig {
    fn default() -> Self {
        Self {
            max_validation_subgraph_paths: 1_000_000,
        }
    }
}

/// Validates that every query against the supergraph API can be executed by the subgraphs, given
/// the query graph of the API schema and the federated query graph of the subgraphs.
///
/// The first unsatisfiable supergraph path found is returned as an error value; `Err` is reserved
/// for internal errors and exceeded limits.
#[cfg_attr(
    feature = "snapshot_tracing",
    tracing::instrument(level = "trace", skip_all, name = "validate_graph_composition")
)]
pub fn validate_graph_composition(
    api_schema_query_graph: Arc<QueryGraph>,
    federated_query_graph: Arc<QueryGraph>,
) -> Result<Option<ValidationError>, FederationError> {
    validate_graph_composition_with_config(
        api_schema_query_graph,
        federated_query_graph,
        &SatisfiabilityConfig::default(),
    )
}

pub fn validate_graph_composition_with_config(
    api_schema_query_graph: Arc<QueryGraph>,
    federated_query_graph: Arc<QueryGraph>,
    config: &SatisfiabilityConfig,
) -> Result<Option<ValidationError>, FederationError> {
    ValidationTraversal::new(api_schema_query_graph, federated_query_graph, config)?.validate()
}

/// Follows the given supergraph path (which must start at a root) in the subgraphs, returning the
/// state at its end, or the error for the first edge which can't be followed.
#[cfg_attr(
    feature = "snapshot_tracing",
    tracing::instrument(level = "trace", skip_all, name = "compute_subgraph_paths")
)]
pub fn compute_subgraph_paths(
    supergraph_path: &TransitionGraphPath,
    federated_query_graph: Arc<QueryGraph>,
) -> Result<Either<ValidationState, ValidationError>, FederationError> {
    let Some(root_kind) = supergraph_path.head_node()?.root_kind else {
        bail!("Supergraph path {supergraph_path} does not start at a root");
    };
    let mut condition_resolver = SimpleConditionResolver::new(federated_query_graph.clone());
    let mut state = ValidationState::new(
        supergraph_path.graph().clone(),
        federated_query_graph,
        root_kind,
    )?;
    ensure!(
        state.supergraph_path().head() == supergraph_path.head(),
        "Supergraph path {supergraph_path} does not start at the {root_kind} root",
    );
    for (edge, _) in supergraph_path.iter() {
        state = match state.validate_transition(edge, &mut condition_resolver)? {
            Either::Left(state) => state,
            Either::Right(error) => return Ok(Either::Right(error)),
        };
    }
    Ok(Either::Left(state))
}

/// Builds the query graphs of the supergraph API and of the subgraphs, and validates them.
pub fn validate_satisfiability(
    supergraph: &Supergraph,
    subgraphs: Vec<Subgraph>,
) -> Result<(), Vec<CompositionError>> {
    let validate = || -> Result<Option<ValidationError>, FederationError> {
        let api_schema_query_graph =
            build_query_graph(API_SCHEMA_QUERY_GRAPH_NAME.into(), supergraph.schema.clone())?;
        let federated_query_graph =
            build_federated_query_graph(supergraph.schema.clone(), subgraphs)?;
        validate_graph_composition(
            Arc::new(api_schema_query_graph),
            Arc::new(federated_query_graph),
        )
    };
    match validate() {
        Ok(None) => Ok(()),
        Ok(Some(error)) => Err(vec![error.into()]),
        Err(error) => Err(vec![error.into()]),
    }
}
