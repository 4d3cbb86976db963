use apollo_federation_satisfiability::Supergraph;
use apollo_federation_satisfiability::composition::validate_satisfiability;
use apollo_federation_satisfiability::subgraph::Subgraph;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::test_helpers::ServiceDefinition;
use super::test_helpers::assert_satisfiable;
use super::test_helpers::unsatisfiable;

const SUPERGRAPH: &str = r#"
    type Query {
      a: Int
      b: Int
    }

    type Mutation {
      m: Int
      n: Int
    }
"#;

#[rstest]
#[case::single_subgraph(&[ServiceDefinition {
    name: "A",
    type_defs: "type Query { a: Int b: Int } type Mutation { m: Int n: Int }",
}])]
#[case::split_fields(&[
    ServiceDefinition {
        name: "A",
        type_defs: "type Query { a: Int } type Mutation { m: Int }",
    },
    ServiceDefinition {
        name: "B",
        type_defs: "type Query { b: Int } type Mutation { n: Int }",
    },
])]
#[case::mutations_in_one_subgraph(&[
    ServiceDefinition {
        name: "A",
        type_defs: "type Query { a: Int b: Int }",
    },
    ServiceDefinition {
        name: "B",
        type_defs: "type Mutation { m: Int n: Int }",
    },
])]
#[case::duplicated_fields(&[
    ServiceDefinition {
        name: "A",
        type_defs: "type Query { a: Int b: Int } type Mutation { m: Int }",
    },
    ServiceDefinition {
        name: "B",
        type_defs: "type Query { a: Int b: Int } type Mutation { n: Int }",
    },
])]
fn splits_without_gaps_are_satisfiable(#[case] service_list: &[ServiceDefinition<'_>]) {
    assert_satisfiable(SUPERGRAPH, service_list);
}

#[test]
fn reports_root_fields_no_subgraph_has() {
    let error = unsatisfiable(
        SUPERGRAPH,
        &[ServiceDefinition {
            name: "A",
            type_defs: "type Query { a: Int b: Int } type Mutation { m: Int }",
        }],
    );
    assert_eq!(
        error.supergraph_unsatisfiable_path().to_string(),
        "Mutation(supergraph) --[n]--> Int(supergraph)"
    );
    assert_snapshot!(error.message(), @r###"
    The following supergraph API query:
    mutation {
      n
    }
    cannot be satisfied by the subgraphs because:
    - from subgraph "A": cannot find field "Mutation.n".
    "###);
}

#[test]
fn witnesses_only_required_input_fields() {
    let error = unsatisfiable(
        r#"
        type Query {
          other: Int
          search(filter: Filter!): Int
        }

        input Filter {
          name: String!
          limit: Int
        }
        "#,
        &[ServiceDefinition {
            name: "A",
            type_defs: "type Query { other: Int }",
        }],
    );
    assert_snapshot!(error.witness().to_string(), @r###"
    {
      search(filter: {name: "A string value"})
    }
    "###);
}

#[test]
fn recursive_types_terminate() {
    assert_satisfiable(
        r#"
        type Query {
          user: User
        }

        type User {
          id: ID!
          name: String
          friends: [User]
        }
        "#,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: r#"
                type Query {
                  user: User
                }

                type User @key(fields: "id") {
                  id: ID!
                  friends: [User]
                }
                "#,
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"
                type User @key(fields: "id") {
                  id: ID!
                  name: String
                  friends: [User]
                }
                "#,
            },
        ],
    );
}

#[test]
fn validate_satisfiability_reports_composition_errors() {
    let supergraph = Supergraph::new("type Query { a: Int b: Int }").unwrap();
    let subgraphs = vec![Subgraph::parse("A", "type Query { a: Int }").unwrap()];
    let errors = validate_satisfiability(&supergraph, subgraphs).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code(), "SATISFIABILITY_ERROR");
    assert_snapshot!(errors[0].to_string(), @r###"
    The following supergraph API query:
    {
      b
    }
    cannot be satisfied by the subgraphs because:
    - from subgraph "A": cannot find field "Query.b".
    "###);

    let subgraphs = vec![
        Subgraph::parse("A", "type Query { a: Int }").unwrap(),
        Subgraph::parse("B", "type Query { b: Int }").unwrap(),
    ];
    assert!(validate_satisfiability(&supergraph, subgraphs).is_ok());
}

#[test]
fn validate_satisfiability_rejects_duplicate_subgraph_names() {
    let supergraph = Supergraph::new("type Query { a: Int }").unwrap();
    let subgraphs = vec![
        Subgraph::parse("A", "type Query { a: Int }").unwrap(),
        Subgraph::parse("A", "type Query { a: Int }").unwrap(),
    ];
    let errors = validate_satisfiability(&supergraph, subgraphs).unwrap_err();
    assert_eq!(errors[0].code(), "INVALID_SUBGRAPH");
}
