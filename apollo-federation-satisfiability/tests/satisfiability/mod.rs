mod abstract_types;
mod keys;
mod limits;
mod requires;
mod roots;

pub(crate) mod test_helpers {
    use std::sync::Arc;

    use apollo_federation_satisfiability::composition::ValidationError;
    use apollo_federation_satisfiability::composition::validate_graph_composition;
    use apollo_federation_satisfiability::query_graph::QueryGraph;
    use apollo_federation_satisfiability::query_graph::build_federated_query_graph;
    use apollo_federation_satisfiability::query_graph::build_query_graph;
    use apollo_federation_satisfiability::schema::ValidFederationSchema;
    use apollo_federation_satisfiability::subgraph::Subgraph;

    pub(crate) struct ServiceDefinition<'a> {
        pub(crate) name: &'a str,
        pub(crate) type_defs: &'a str,
    }

    /// Builds the query graph of the supergraph API schema and the federated query graph of the
    /// given subgraphs.
    pub(crate) fn build_graphs(
        supergraph_sdl: &str,
        service_list: &[ServiceDefinition<'_>],
    ) -> (Arc<QueryGraph>, Arc<QueryGraph>) {
        let supergraph_schema =
            ValidFederationSchema::parse(supergraph_sdl, "supergraph.graphql").unwrap();
        let subgraphs = service_list
            .iter()
            .map(|service| Subgraph::parse(service.name, service.type_defs).unwrap())
            .collect::<Vec<_>>();
        let api_schema_query_graph =
            build_query_graph("supergraph".into(), supergraph_schema.clone()).unwrap();
        let federated_query_graph =
            build_federated_query_graph(supergraph_schema, subgraphs).unwrap();
        (
            Arc::new(api_schema_query_graph),
            Arc::new(federated_query_graph),
        )
    }

    pub(crate) fn validate(
        supergraph_sdl: &str,
        service_list: &[ServiceDefinition<'_>],
    ) -> Option<ValidationError> {
        let (api_schema_query_graph, federated_query_graph) =
            build_graphs(supergraph_sdl, service_list);
        validate_graph_composition(api_schema_query_graph, federated_query_graph).unwrap()
    }

    #[track_caller]
    pub(crate) fn assert_satisfiable(supergraph_sdl: &str, service_list: &[ServiceDefinition<'_>]) {
        if let Some(error) = validate(supergraph_sdl, service_list) {
            panic!("expected a satisfiable supergraph, got:\n{error}");
        }
    }

    #[track_caller]
    pub(crate) fn unsatisfiable(
        supergraph_sdl: &str,
        service_list: &[ServiceDefinition<'_>],
    ) -> ValidationError {
        validate(supergraph_sdl, service_list).expect("expected an unsatisfiable supergraph")
    }
}
