use insta::assert_snapshot;

use super::test_helpers::ServiceDefinition;
use super::test_helpers::assert_satisfiable;
use super::test_helpers::unsatisfiable;

const SUPERGRAPH: &str = r#"
    type Query {
      t: T
    }

    type T {
      id: ID!
      weight: Int
      shipping: Int
    }
"#;

#[test]
fn requirements_are_fetched_from_other_subgraphs() {
    assert_satisfiable(
        SUPERGRAPH,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: r#"
                type Query {
                  t: T
                }

                type T @key(fields: "id") {
                  id: ID!
                  weight: Int
                }
                "#,
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"
                type T @key(fields: "id") {
                  id: ID!
                  weight: Int @external
                  shipping: Int @requires(fields: "weight")
                }
                "#,
            },
        ],
    );
}

#[test]
fn fails_when_requirements_cannot_be_fetched() {
    // B can be reached from A, but A cannot be reached back to get the required field.
    let error = unsatisfiable(
        SUPERGRAPH,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: r#"
                type Query {
                  t: T
                }

                type T {
                  id: ID!
                  weight: Int
                }
                "#,
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"
                type T @key(fields: "id") {
                  id: ID!
                  weight: Int @external
                  shipping: Int @requires(fields: "weight")
                }
                "#,
            },
        ],
    );
    assert_snapshot!(error.message(), @r###"
    The following supergraph API query:
    {
      t {
        shipping
      }
    }
    cannot be satisfied by the subgraphs because:
    - from subgraph "A": cannot find field "T.shipping".
    - from subgraph "B": cannot satisfy @requires conditions on field "T.shipping".
    "###);
}

#[test]
fn points_out_key_fields_marked_external() {
    let error = unsatisfiable(
        SUPERGRAPH,
        &[
            ServiceDefinition {
                name: "A",
                type_defs: r#"
                type Query {
                  t: T
                }

                type T {
                  id: ID!
                  weight: Int
                }
                "#,
            },
            ServiceDefinition {
                name: "B",
                type_defs: r#"
                type T @key(fields: "id") {
                  id: ID! @external
                  weight: Int @external
                  shipping: Int @requires(fields: "weight")
                }
                "#,
            },
        ],
    );
    assert!(error.message().contains(
        r#"cannot satisfy @requires conditions on field "T.shipping" (please ensure that this is not due to key field "id" being accidentally marked @external)"#
    ));
}
