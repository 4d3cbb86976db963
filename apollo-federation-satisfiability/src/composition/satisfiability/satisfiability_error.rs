use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast;
use indexmap::IndexMap;
use indexmap::IndexSet;
use petgraph::graph::EdgeIndex;

use crate::bail;
use crate::ensure;
use crate::error::CompositionError;
use crate::error::FederationError;
use crate::operation::Field;
use crate::operation::FieldSelection;
use crate::operation::InlineFragment;
use crate::operation::InlineFragmentSelection;
use crate::operation::Operation;
use crate::operation::SelectionSet;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNodeType;
use crate::query_graph::graph_path::Unadvanceable;
use crate::query_graph::graph_path::Unadvanceables;
use crate::query_graph::graph_path::transition::TransitionGraphPath;
use crate::schema::ValidFederationSchema;
use crate::schema::position::CompositeTypeDefinitionPosition;
use crate::schema::position::FieldDefinitionPosition;
use crate::schema::position::TypeDefinitionPosition;

/// A supergraph path which cannot be followed in the subgraphs, along with the subgraph paths which
/// were tried and a query exhibiting the issue.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    supergraph_unsatisfiable_path: Arc<TransitionGraphPath>,
    subgraphs_paths: Vec<TransitionGraphPath>,
    subgraphs_paths_unadvanceables: Vec<Unadvanceables>,
    witness: Operation,
}

impl ValidationError {
    pub(crate) fn new(
        supergraph_unsatisfiable_path: TransitionGraphPath,
        subgraphs_paths: Vec<TransitionGraphPath>,
        subgraphs_paths_unadvanceables: Vec<Unadvanceables>,
    ) -> Result<Self, FederationError> {
        let witness = build_witness_operation(&supergraph_unsatisfiable_path)?;
        let message = format!(
            "The following supergraph API query:\n\
             {witness}\n\
             cannot be satisfied by the subgraphs because:\n\
             {reasons}",
            reasons = display_reasons(&subgraphs_paths_unadvanceables),
        );
        Ok(Self {
            message,
            supergraph_unsatisfiable_path: Arc::new(supergraph_unsatisfiable_path),
            subgraphs_paths,
            subgraphs_paths_unadvanceables,
            witness,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The supergraph path, from a root, whose last edge cannot be taken in any subgraph.
    pub fn supergraph_unsatisfiable_path(&self) -> &TransitionGraphPath {
        &self.supergraph_unsatisfiable_path
    }

    /// The subgraph paths corresponding to the supergraph path without its last edge, none of which
    /// could take that edge.
    pub fn subgraphs_paths(&self) -> &[TransitionGraphPath] {
        &self.subgraphs_paths
    }

    /// Why each of the subgraph paths could not advance.
    pub fn subgraphs_paths_unadvanceables(&self) -> &[Unadvanceables] {
        &self.subgraphs_paths_unadvanceables
    }

    pub fn witness(&self) -> &Operation {
        &self.witness
    }
}

impl From<ValidationError> for CompositionError {
    fn from(error: ValidationError) -> Self {
        CompositionError::SatisfiabilityError {
            message: error.message,
        }
    }
}

/// Builds the operation following `witness` from its root, the counter-example of a validation
/// error.
pub(crate) fn build_witness_operation(
    witness: &TransitionGraphPath,
) -> Result<Operation, FederationError> {
    let root = witness.head_node()?;
    let Some(root_kind) = root.root_kind else {
        bail!("build_witness_operation: root kind is not set");
    };
    let schema = witness.graph().schema_by_source(&root.source)?;
    let edges: Vec<_> = witness.iter().map(|item| item.0).collect();
    ensure!(
        !edges.is_empty(),
        "unsatisfiable_path should contain at least one edge/transition"
    );
    let Some(selection_set) = build_witness_next_step(schema, witness, &edges)? else {
        bail!("build_witness_operation: root selection set failed to build");
    };
    Ok(Operation::new(root_kind, selection_set))
}

// Recursively build a selection set bottom-up.
fn build_witness_next_step(
    schema: &ValidFederationSchema,
    witness: &TransitionGraphPath,
    edges: &[EdgeIndex],
) -> Result<Option<SelectionSet>, FederationError> {
    match edges.split_first() {
        // Base case
        None => {
            // We're at the end of our counter-example, meaning that we're at a point of traversing
            // the supergraph where we know there is no valid equivalent subgraph traversals. That
            // said, we may well not be on a terminal node (the type may not be a leaf), meaning
            // that returning `None` may be invalid. In that case, we instead return an empty
            // selection set. This is, strictly speaking, equally invalid, but we use this as a
            // convention to mean "there is supposed to be a selection but we don't have it", and
            // operations print it as an ellipsis (a `...`).
            //
            // Putting the ellipsis makes it immediately clear after which part of the query there
            // is an issue, which a generated (valid) continuation of the query would not.
            let QueryGraphNodeType::SchemaType(type_pos) = &witness.tail_node()?.type_ else {
                bail!("build_witness_next_step: tail type is not a schema type");
            };
            // Node types are output types, so if it's not a leaf it is guaranteed to be
            // selectable.
            Ok(
                match CompositeTypeDefinitionPosition::try_from(type_pos.clone()) {
                    Ok(composite_type_pos) => Some(SelectionSet::empty(composite_type_pos)),
                    _ => None,
                },
            )
        }

        // Recursive case
        Some((edge_index, rest)) => {
            let sub_selection = build_witness_next_step(schema, witness, rest)?;
            let edge = witness.graph().edge_weight(*edge_index)?;
            let (parent_type, selection) = match &edge.transition {
                QueryGraphEdgeTransition::Downcast {
                    source: _,
                    from_type_position,
                    to_type_position,
                } => {
                    let inline_fragment = InlineFragment::new(
                        from_type_position.clone(),
                        Some(to_type_position.clone()),
                    );
                    let Some(sub_selection) = sub_selection else {
                        bail!("build_witness_next_step: sub_selection is None");
                    };
                    (
                        from_type_position.clone(),
                        InlineFragmentSelection::new(inline_fragment, sub_selection).into(),
                    )
                }
                QueryGraphEdgeTransition::FieldCollection {
                    source: _,
                    field_definition_position,
                } => {
                    let field = build_witness_field(schema, field_definition_position)?;
                    (
                        field_definition_position.parent(),
                        FieldSelection::new(field, sub_selection).into(),
                    )
                }
                // These don't correspond to anything in operations.
                QueryGraphEdgeTransition::KeyResolution
                | QueryGraphEdgeTransition::RootTypeResolution { .. }
                | QueryGraphEdgeTransition::FreeTransition => return Ok(sub_selection),
            };
            Ok(Some(SelectionSet::from_selection(parent_type, selection)))
        }
    }
}

fn build_witness_field(
    schema: &ValidFederationSchema,
    field_definition_position: &FieldDefinitionPosition,
) -> Result<Field, FederationError> {
    let field_def = field_definition_position.get(schema.schema())?;
    let arguments = field_def
        .arguments
        .iter()
        .map(|arg_def| {
            Ok(Node::new(ast::Argument {
                name: arg_def.name.clone(),
                value: generate_witness_value(schema, arg_def)?,
            }))
        })
        .collect::<Result<Vec<_>, FederationError>>()?;
    Ok(Field::new(field_definition_position.clone()).with_arguments(arguments))
}

/// A value of the type of `value_def`. We always generate a non-null value, even if the type is
/// nullable.
pub(crate) fn generate_witness_value(
    schema: &ValidFederationSchema,
    value_def: &ast::InputValueDefinition,
) -> Result<Node<ast::Value>, FederationError> {
    let value = match value_def.ty.as_ref() {
        ast::Type::Named(type_name) | ast::Type::NonNullNamed(type_name) => {
            let type_pos = schema.get_type(type_name.clone())?;
            match type_pos {
                TypeDefinitionPosition::Scalar(scalar_type_pos) => {
                    match scalar_type_pos.type_name.as_str() {
                        "Int" => ast::Value::Int(0.into()),
                        #[allow(clippy::approx_constant)]
                        "Float" => ast::Value::Float((3.14).into()),
                        "Boolean" => ast::Value::Boolean(true),
                        "String" => ast::Value::String("A string value".to_string()),
                        // Users probably expect a particular format of ID at any particular place,
                        // but we have zero info on the context, so we just throw a string that
                        // hopefully make things clear.
                        "ID" => ast::Value::String("<any id>".to_string()),
                        // It's a custom scalar, but we don't know anything about that scalar so
                        // providing some random string. This will technically probably not be a
                        // valid value for that scalar, but hopefully that won't be enough to throw
                        // users off.
                        _ => ast::Value::String("<some value>".to_string()),
                    }
                }
                TypeDefinitionPosition::Enum(enum_type_pos) => {
                    let enum_type = enum_type_pos.get(schema.schema())?;
                    let Some((first_value, _)) = enum_type.values.first() else {
                        bail!("generate_witness_value: enum type has no values");
                    };
                    ast::Value::Enum(first_value.clone())
                }
                TypeDefinitionPosition::InputObject(input_object_type_pos) => {
                    let object_type = input_object_type_pos.get(schema.schema())?;
                    let fields = object_type
                        .fields
                        .iter()
                        // We don't bother with non-mandatory fields.
                        .filter(|(_, field_def)| field_def.is_required())
                        .map(|(field_name, field_def)| {
                            Ok((field_name.clone(), generate_witness_value(schema, field_def)?))
                        })
                        .collect::<Result<Vec<_>, FederationError>>()?;
                    ast::Value::Object(fields)
                }
                _ => bail!(
                    "generate_witness_value: unexpected value type {}",
                    value_def.ty
                ),
            }
        }
        ast::Type::List(_item_type) | ast::Type::NonNullList(_item_type) => {
            ast::Value::List(vec![])
        }
    };
    Ok(Node::new(value))
}

fn display_reasons(reasons: &[Unadvanceables]) -> String {
    let mut by_subgraph: IndexMap<&str, Vec<&Unadvanceable>> = IndexMap::new();
    for reason in reasons {
        for unadvanceable in reason.iter() {
            by_subgraph
                .entry(unadvanceable.source_subgraph())
                .or_default()
                .push(unadvanceable);
        }
    }
    by_subgraph
        .iter()
        .filter_map(|(subgraph, reasons)| {
            let (first, rest) = reasons.split_first()?;
            let details = if rest.is_empty() {
                format!(r#" {}."#, first.details())
            } else {
                // We put all the reasons into a set because it's possible multiple paths of the
                // algorithm had the same "dead end". Typically, without this, there is cases where
                // we end up with multiple "cannot find field x" messages (for the same "x").
                let all_details = reasons
                    .iter()
                    .map(|reason| reason.details())
                    .collect::<IndexSet<_>>();
                if all_details.len() == 1 {
                    format!(r#" {}."#, first.details())
                } else {
                    let mut formatted_details = vec!["".to_string()]; // to add a newline
                    formatted_details
                        .extend(all_details.iter().map(|details| format!("  - {details}.")));
                    formatted_details.join("\n")
                }
            };
            Some(format!(r#"- from subgraph "{subgraph}":{details}"#))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;
    use insta::assert_snapshot;

    use super::*;
    use crate::query_graph::QueryGraph;
    use crate::query_graph::build_query_graph;
    use crate::query_graph::graph_path::GraphPath;
    use crate::query_graph::graph_path::UnadvanceableReason;
    use crate::schema::position::SchemaRootDefinitionKind;

    const SCHEMA: &str = r#"
        type Query {
          t: T
          i: I
          u(id: ID!, kinds: [E!]!, filter: Filter): U
        }

        type Mutation {
          update(score: Float!, force: Boolean): T
        }

        interface I {
          id: ID!
        }

        enum E { A B C }

        scalar DateTime

        input Filter {
          name: String!
          limit: Int
          since: DateTime! = "today"
        }

        type T implements I {
          id: ID!
          field(
            numArg: Int!, floatArg: Float!, strArg: String!, boolArg: Boolean!, idArg: ID!,
            listArg: [Int!]!, enumArg: E!, dateArg: DateTime, optionalArg: String
          ): String
        }

        type U {
          id: ID!
        }
    "#;

    fn api_graph() -> Arc<QueryGraph> {
        let schema = ValidFederationSchema::parse(SCHEMA, "schema.graphql").unwrap();
        Arc::new(build_query_graph("api".into(), schema).unwrap())
    }

    /// The path from the root of the given kind following the edges displayed as `steps`.
    fn path(
        graph: &Arc<QueryGraph>,
        root_kind: SchemaRootDefinitionKind,
        steps: &[&str],
    ) -> TransitionGraphPath {
        let mut path = GraphPath::from_graph_root(graph.clone(), root_kind).unwrap();
        for step in steps {
            let edge = path
                .next_edges()
                .into_iter()
                .find(|edge| graph.edge_weight(*edge).unwrap().transition.to_string() == *step)
                .unwrap();
            let transition = graph.edge_weight(edge).unwrap().transition.clone();
            path = path.add(transition, edge).unwrap();
        }
        path
    }

    fn witness(root_kind: SchemaRootDefinitionKind, steps: &[&str]) -> String {
        let graph = api_graph();
        build_witness_operation(&path(&graph, root_kind, steps))
            .unwrap()
            .to_string()
    }

    #[test]
    fn ends_leaf_paths_without_selection() {
        assert_snapshot!(witness(SchemaRootDefinitionKind::Query, &["t", "id"]), @r###"
        {
          t {
            id
          }
        }
        "###);
    }

    #[test]
    fn ends_composite_paths_with_an_ellipsis() {
        assert_snapshot!(witness(SchemaRootDefinitionKind::Query, &["i", "... on T"]), @r###"
        {
          i {
            ... on T {
              ...
            }
          }
        }
        "###);
    }

    #[test]
    fn generates_arguments_for_every_declared_argument() {
        assert_snapshot!(witness(SchemaRootDefinitionKind::Query, &["t", "field"]), @r###"
        {
          t {
            field(numArg: 0, floatArg: 3.14, strArg: "A string value", boolArg: true, idArg: "<any id>", listArg: [], enumArg: A, dateArg: "<some value>", optionalArg: "A string value")
          }
        }
        "###);
    }

    #[test]
    fn generates_only_required_input_object_fields() {
        assert_snapshot!(witness(SchemaRootDefinitionKind::Query, &["u"]), @r###"
        {
          u(id: "<any id>", kinds: [], filter: {name: "A string value"}) {
            ...
          }
        }
        "###);
    }

    #[test]
    fn uses_the_root_kind_of_the_path() {
        assert_snapshot!(witness(SchemaRootDefinitionKind::Mutation, &["update"]), @r###"
        mutation {
          update(score: 3.14, force: true) {
            ...
          }
        }
        "###);
    }

    #[test]
    fn rejects_empty_paths_and_output_types_as_input() {
        let graph = api_graph();
        let empty = path(&graph, SchemaRootDefinitionKind::Query, &[]);
        assert!(build_witness_operation(&empty).unwrap_err().is_internal());

        let schema = graph.schema().unwrap();
        let argument = ast::InputValueDefinition {
            description: None,
            name: name!("t"),
            ty: Node::new(ast::Type::Named(name!("T"))),
            default_value: None,
            directives: Default::default(),
        };
        assert!(
            generate_witness_value(schema, &argument)
                .unwrap_err()
                .is_internal()
        );
    }

    fn unadvanceable(from: &str, details: &str) -> Unadvanceable {
        Unadvanceable {
            reason: UnadvanceableReason::NoMatchingTransition,
            from_subgraph: from.into(),
            to_subgraph: from.into(),
            details: details.to_owned(),
        }
    }

    #[test]
    fn groups_reasons_by_subgraph() {
        let reasons = [
            Unadvanceables(vec![
                unadvanceable("A", r#"cannot find field "T.y""#),
                unadvanceable("B", r#"cannot find field "T.y""#),
            ]),
            Unadvanceables(vec![
                unadvanceable("A", r#"cannot find field "T.y""#),
                unadvanceable("A", r#"cannot move to subgraph "C""#),
            ]),
        ];
        assert_snapshot!(display_reasons(&reasons), @r###"
        - from subgraph "A":
          - cannot find field "T.y".
          - cannot move to subgraph "C".
        - from subgraph "B": cannot find field "T.y".
        "###);
    }
}
