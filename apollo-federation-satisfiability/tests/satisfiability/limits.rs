use apollo_federation_satisfiability::composition::SatisfiabilityConfig;
use apollo_federation_satisfiability::composition::validate_graph_composition_with_config;
use apollo_federation_satisfiability::error::FederationError;
use apollo_federation_satisfiability::error::SingleFederationError;

use super::test_helpers::ServiceDefinition;
use super::test_helpers::build_graphs;

const SUPERGRAPH: &str = "type Query { a: Int b: Int }";

const SERVICES: [ServiceDefinition<'static>; 2] = [
    ServiceDefinition {
        name: "A",
        type_defs: "type Query { a: Int }",
    },
    ServiceDefinition {
        name: "B",
        type_defs: "type Query { b: Int }",
    },
];

#[test]
fn aborts_when_too_many_subgraph_paths_are_kept() {
    let (api_schema_query_graph, federated_query_graph) = build_graphs(SUPERGRAPH, &SERVICES);
    let config = SatisfiabilityConfig {
        max_validation_subgraph_paths: 1,
    };
    let error = validate_graph_composition_with_config(
        api_schema_query_graph,
        federated_query_graph,
        &config,
    )
    .unwrap_err();
    assert!(matches!(
        error,
        FederationError::SingleFederationError(
            SingleFederationError::MaxValidationSubgraphPathsExceeded { .. }
        )
    ));
    assert!(!error.is_internal());
}

#[test]
fn validates_within_the_limit() {
    let (api_schema_query_graph, federated_query_graph) = build_graphs(SUPERGRAPH, &SERVICES);
    let config = SatisfiabilityConfig {
        max_validation_subgraph_paths: 2,
    };
    let result = validate_graph_composition_with_config(
        api_schema_query_graph,
        federated_query_graph,
        &config,
    )
    .unwrap();
    assert!(result.is_none());
}
