use apollo_federation_satisfiability::composition::compute_subgraph_paths;
use either::Either;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

use super::test_helpers::ServiceDefinition;
use super::test_helpers::assert_satisfiable;
use super::test_helpers::build_graphs;
use super::test_helpers::unsatisfiable;

const SUPERGRAPH: &str = r#"
    type Query {
      x: Leaf
    }

    type Leaf {
      id: ID!
      upc: ID!
      name: String
    }
"#;

#[test]
fn moves_between_subgraphs_through_keys() {
    assert_satisfiable(
        SUPERGRAPH,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: r#"
                type Query {
                  x: Leaf
                }

                type Leaf @key(fields: "id") {
                  id: ID!
                  upc: ID!
                }
                "#,
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"
                type Leaf @key(fields: "upc") {
                  upc: ID!
                  name: String
                }
                "#,
            },
        ],
    );
}

const KEY_NEVER_PROVIDED: [ServiceDefinition<'static>; 2] = [
    ServiceDefinition {
        name: "A",
        type_defs: r#"
        type Query {
          x: Leaf
        }

        type Leaf @key(fields: "id") {
          id: ID!
        }
        "#,
    },
    ServiceDefinition {
        name: "B",
        type_defs: r#"
        type Leaf @key(fields: "upc") {
          upc: ID!
          name: String
        }
        "#,
    },
];

#[test]
fn fails_when_a_key_is_never_provided() {
    let error = unsatisfiable(SUPERGRAPH, &KEY_NEVER_PROVIDED);
    assert_eq!(
        error.supergraph_unsatisfiable_path().to_string(),
        "Query(supergraph) --[x]--> Leaf(supergraph) --[upc]--> ID(supergraph)"
    );
    assert_snapshot!(error.message(), @r###"
    The following supergraph API query:
    {
      x {
        upc
      }
    }
    cannot be satisfied by the subgraphs because:
    - from subgraph "A":
      - cannot find field "Leaf.upc".
      - cannot move to subgraph "B" using @key(fields: "upc") of "Leaf", the key field(s) cannot be resolved from subgraph "A".
    "###);
}

#[test]
fn fails_when_the_type_has_no_key_in_the_other_subgraph() {
    let error = unsatisfiable(
        r#"
        type Query {
          t: T
        }

        type T {
          id: ID!
          x: Int
          y: Int
        }
        "#,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: "type Query { t: T } type T { id: ID! x: Int }",
            },
            ServiceDefinition {
                name: "B",
                type_defs: "type T { id: ID! y: Int }",
            },
        ],
    );
    assert_snapshot!(error.message(), @r###"
    The following supergraph API query:
    {
      t {
        y
      }
    }
    cannot be satisfied by the subgraphs because:
    - from subgraph "A":
      - cannot find field "T.y".
      - cannot move to subgraph "B", which has field "T.y", because type "T" has no @key defined in subgraph "B".
    "###);
}

#[test]
fn fails_when_no_key_is_resolvable() {
    let error = unsatisfiable(
        r#"
        type Query {
          t: T
        }

        type T {
          id: ID!
          y: Int
        }
        "#,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: "type Query { t: T } type T { id: ID! }",
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"type T @key(fields: "id", resolvable: false) { id: ID! y: Int }"#,
            },
        ],
    );
    let details = error
        .subgraphs_paths_unadvanceables()
        .iter()
        .flat_map(|unadvanceables| unadvanceables.iter())
        .map(|unadvanceable| unadvanceable.details().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(
        details,
        [
            r#"cannot find field "T.y""#,
            r#"cannot move to subgraph "B", which has field "T.y", because none of the @key defined on type "T" in subgraph "B" are resolvable (they are all declared with their "resolvable" argument set to false)"#,
        ]
    );
}

#[test]
fn recomputes_the_subgraph_paths_of_a_failing_path() {
    let (_, federated_query_graph) = build_graphs(SUPERGRAPH, &KEY_NEVER_PROVIDED);
    let error = unsatisfiable(SUPERGRAPH, &KEY_NEVER_PROVIDED);
    let Either::Right(recomputed) =
        compute_subgraph_paths(error.supergraph_unsatisfiable_path(), federated_query_graph)
            .unwrap()
    else {
        panic!("expected the path to remain unsatisfiable");
    };
    assert_eq!(recomputed.message(), error.message());
    assert_eq!(
        recomputed
            .subgraphs_paths()
            .iter()
            .map(|path| path.to_string())
            .collect::<Vec<_>>(),
        ["[query](_) --[∅]--> Query(A) --[x]--> Leaf(A)"]
    );
}
