use insta::assert_snapshot;

use super::test_helpers::ServiceDefinition;
use super::test_helpers::assert_satisfiable;
use super::test_helpers::unsatisfiable;

const SUPERGRAPH: &str = r#"
    type Query {
      node: Node
    }

    interface Node {
      id: ID!
    }

    type User implements Node {
      id: ID!
      name: String
    }

    type Org implements Node {
      id: ID!
    }
"#;

#[test]
fn downcasts_to_every_implementation() {
    assert_satisfiable(
        SUPERGRAPH,
        &[ServiceDefinition {
            name: "A",
            type_defs: r#"
            type Query {
              node: Node
            }

            interface Node {
              id: ID!
            }

            type User implements Node {
              id: ID!
              name: String
            }

            type Org implements Node {
              id: ID!
            }
            "#,
        }],
    );
}

#[test]
fn fails_on_implementations_the_subgraph_does_not_know() {
    let error = unsatisfiable(
        SUPERGRAPH,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: r#"
                type Query {
                  node: Node
                }

                interface Node {
                  id: ID!
                }

                type User implements Node {
                  id: ID!
                  name: String
                }
                "#,
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"
                interface Node {
                  id: ID!
                }

                type Org implements Node @key(fields: "id") {
                  id: ID!
                }
                "#,
            },
        ],
    );
    assert_snapshot!(error.witness().to_string(), @r###"
    {
      node {
        ... on Org {
          ...
        }
      }
    }
    "###);
    assert_snapshot!(error.message(), @r###"
    The following supergraph API query:
    {
      node {
        ... on Org {
          ...
        }
      }
    }
    cannot be satisfied by the subgraphs because:
    - from subgraph "A": cannot find type "Org".
    "###);
}
