use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use itertools::Itertools;
use petgraph::graph::EdgeIndex;

use crate::error::FederationError;
use crate::operation::InlineFragment;
use crate::operation::OpPathElement;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNodeType;
use crate::query_graph::condition_resolver::ConditionResolution;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::condition_resolver::ExcludedEdges;
use crate::query_graph::graph_path::GraphPath;
use crate::schema::position::CompositeTypeDefinitionPosition;

/// What made an [`OpGraphPath`] take an edge: either an element of the operation (or field set)
/// being followed, or a non-collecting edge (a key or root type edge) taken to reach another
/// subgraph.
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum OpGraphPathTrigger {
    OpPathElement(OpPathElement),
    Transition(QueryGraphEdgeTransition),
}

impl Display for OpGraphPathTrigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpGraphPathTrigger::OpPathElement(ele) => ele.fmt(f),
            OpGraphPathTrigger::Transition(edge) => edge.fmt(f),
        }
    }
}

/// A `GraphPath` whose triggers are operation elements (essentially meaning that the path has
/// been guided by a GraphQL operation or field set).
pub type OpGraphPath = GraphPath<OpGraphPathTrigger>;

impl OpGraphPath {
    /// The options to advance this path with `element`: `None` if there is none. Fields not
    /// available from the tail are looked for in the subgraphs reachable through keys.
    pub(crate) fn advance_with_operation_element(
        &self,
        element: &OpPathElement,
        condition_resolver: &mut impl ConditionResolver,
        excluded_edges: &ExcludedEdges,
    ) -> Result<Option<Vec<SimultaneousPaths>>, FederationError> {
        if let Some(options) =
            self.advance_with_direct_element(element, condition_resolver, excluded_edges)?
        {
            return Ok(Some(options));
        }
        let OpPathElement::Field(_) = element else {
            return Ok(None);
        };
        let mut options = Vec::new();
        for indirect_path in self
            .indirect_paths(condition_resolver, excluded_edges)?
            .paths
        {
            if let Some(indirect_options) = indirect_path.advance_with_direct_element(
                element,
                condition_resolver,
                excluded_edges,
            )? {
                options.extend(indirect_options);
            }
        }
        Ok((!options.is_empty()).then_some(options))
    }

    fn advance_with_direct_element(
        &self,
        element: &OpPathElement,
        condition_resolver: &mut impl ConditionResolver,
        excluded_edges: &ExcludedEdges,
    ) -> Result<Option<Vec<SimultaneousPaths>>, FederationError> {
        let QueryGraphNodeType::SchemaType(tail_type) = &self.tail_node()?.type_ else {
            // Field sets never select from federated roots.
            return Ok(None);
        };
        let Ok(tail_type) = CompositeTypeDefinitionPosition::try_from(tail_type.clone()) else {
            // Leaf types have nothing to select.
            return Ok(None);
        };
        match element {
            OpPathElement::Field(field) => {
                let field_edge = self.find_edge(excluded_edges, |transition| {
                    matches!(
                        transition,
                        QueryGraphEdgeTransition::FieldCollection {
                            field_definition_position,
                            ..
                        } if field_definition_position.field_name() == field.name()
                    )
                })?;
                if let Some(edge) = field_edge {
                    return match condition_resolver.resolve(edge, excluded_edges)? {
                        ConditionResolution::Satisfied => Ok(Some(vec![
                            self.add(element.clone().into(), edge)?.into(),
                        ])),
                        ConditionResolution::Unsatisfied => Ok(None),
                    };
                }
                if !tail_type.is_abstract_type() {
                    return Ok(None);
                }
                // The field is not on the abstract type in this subgraph, but may be on all its
                // implementations: we "explode" the type and advance each of them.
                let mut options_per_implementation = Vec::new();
                for edge in self.next_edges() {
                    let QueryGraphEdgeTransition::Downcast {
                        to_type_position, ..
                    } = &self.graph.edge_weight(edge)?.transition
                    else {
                        continue;
                    };
                    if excluded_edges.contains(edge) {
                        continue;
                    }
                    let trigger = InlineFragment::new(
                        tail_type.clone(),
                        Some(to_type_position.clone()),
                    );
                    let implementation_path =
                        self.add(OpPathElement::from(trigger).into(), edge)?;
                    let Some(options) = implementation_path.advance_with_operation_element(
                        element,
                        condition_resolver,
                        excluded_edges,
                    )?
                    else {
                        return Ok(None);
                    };
                    options_per_implementation.push(options);
                }
                if options_per_implementation.is_empty() {
                    return Ok(None);
                }
                Ok(Some(flat_cartesian_product(options_per_implementation)))
            }
            OpPathElement::InlineFragment(inline_fragment) => {
                let Some(type_condition) = inline_fragment.type_condition_position() else {
                    return Ok(Some(vec![self.clone().into()]));
                };
                if type_condition.type_name() == tail_type.type_name() {
                    return Ok(Some(vec![self.clone().into()]));
                }
                let downcast_edge = self.find_edge(excluded_edges, |transition| {
                    matches!(
                        transition,
                        QueryGraphEdgeTransition::Downcast {
                            to_type_position,
                            ..
                        } if to_type_position.type_name() == type_condition.type_name()
                    )
                })?;
                if let Some(edge) = downcast_edge {
                    return Ok(Some(vec![self.add(element.clone().into(), edge)?.into()]));
                }
                // Otherwise, the fragment applies to the runtime types of the tail that are also
                // runtime types of the condition, all of which must be handled.
                let schema = self.graph.schema_by_source(&self.tail_node()?.source)?;
                let Some(Ok(type_condition_in_subgraph)) = schema
                    .try_get_type(type_condition.type_name().clone())
                    .map(CompositeTypeDefinitionPosition::try_from)
                else {
                    return Ok(None);
                };
                let condition_runtime_types =
                    schema.possible_runtime_types(type_condition_in_subgraph)?;
                if let CompositeTypeDefinitionPosition::Object(tail_object) = &tail_type {
                    return Ok(condition_runtime_types
                        .contains(tail_object)
                        .then(|| vec![self.clone().into()]));
                }
                let mut paths = Vec::new();
                for edge in self.next_edges() {
                    let QueryGraphEdgeTransition::Downcast {
                        to_type_position: CompositeTypeDefinitionPosition::Object(to_object),
                        ..
                    } = &self.graph.edge_weight(edge)?.transition
                    else {
                        continue;
                    };
                    if excluded_edges.contains(edge) || !condition_runtime_types.contains(to_object)
                    {
                        continue;
                    }
                    let trigger = InlineFragment::new(
                        tail_type.clone(),
                        Some(to_object.clone().into()),
                    );
                    paths.push(Arc::new(
                        self.add(OpPathElement::from(trigger).into(), edge)?,
                    ));
                }
                if paths.is_empty() {
                    return Ok(None);
                }
                Ok(Some(vec![SimultaneousPaths(paths)]))
            }
        }
    }

    /// The first edge out of the tail, not excluded, whose transition matches `predicate`.
    fn find_edge(
        &self,
        excluded_edges: &ExcludedEdges,
        predicate: impl Fn(&QueryGraphEdgeTransition) -> bool,
    ) -> Result<Option<EdgeIndex>, FederationError> {
        for edge in self.next_edges() {
            if !excluded_edges.contains(edge) && predicate(&self.graph.edge_weight(edge)?.transition)
            {
                return Ok(Some(edge));
            }
        }
        Ok(None)
    }
}

/// A set of paths that must all be followed at once. Type explosion on abstract types yields
/// one path per implementation, and the field being collected must be available on each of them.
#[derive(Debug, Clone)]
pub struct SimultaneousPaths(pub(crate) Vec<Arc<OpGraphPath>>);

impl SimultaneousPaths {
    pub fn paths(&self) -> &[Arc<OpGraphPath>] {
        &self.0
    }

    /// Advances every path with `element`. Each combination of the options of the individual
    /// paths is an option for the whole set, and there is none as soon as one path can't advance.
    pub(crate) fn advance_with_operation_element(
        &self,
        element: &OpPathElement,
        condition_resolver: &mut impl ConditionResolver,
        excluded_edges: &ExcludedEdges,
    ) -> Result<Option<Vec<SimultaneousPaths>>, FederationError> {
        let mut options_per_path = Vec::with_capacity(self.0.len());
        for path in &self.0 {
            let Some(options) =
                path.advance_with_operation_element(element, condition_resolver, excluded_edges)?
            else {
                return Ok(None);
            };
            options_per_path.push(options);
        }
        Ok(Some(flat_cartesian_product(options_per_path)))
    }
}

impl From<OpGraphPath> for SimultaneousPaths {
    fn from(value: OpGraphPath) -> Self {
        Self(vec![Arc::new(value)])
    }
}

impl Display for SimultaneousPaths {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.as_slice() {
            [path] => path.fmt(f),
            paths => write!(f, "{{ {} }}", paths.iter().join(", ")),
        }
    }
}

/// Picks one option for each set of options in every possible way, merging the picked paths.
fn flat_cartesian_product(options: Vec<Vec<SimultaneousPaths>>) -> Vec<SimultaneousPaths> {
    options
        .into_iter()
        .multi_cartesian_product()
        .map(|combination| {
            SimultaneousPaths(
                combination
                    .into_iter()
                    .flat_map(|option| option.0)
                    .collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use apollo_compiler::name;

    use super::*;
    use crate::composition::satisfiability::validation_traversal::SimpleConditionResolver;
    use crate::operation::SelectionSet;
    use crate::query_graph::QueryGraph;
    use crate::query_graph::build_federated_query_graph;
    use crate::schema::ValidFederationSchema;
    use crate::schema::field_set::parse_field_set;
    use crate::subgraph::Subgraph;

    const SUPERGRAPH: &str = r#"
        type Query {
          node: Node
        }

        interface Node {
          id: ID!
          name: String
        }

        type User implements Node {
          id: ID!
          name: String
          email: String
        }

        type Org implements Node {
          id: ID!
          name: String
        }
    "#;

    fn setup(subgraphs: &[(&str, &str)]) -> (ValidFederationSchema, Arc<QueryGraph>) {
        let schema = ValidFederationSchema::parse(SUPERGRAPH, "supergraph.graphql").unwrap();
        let subgraphs = subgraphs
            .iter()
            .map(|(name, sdl)| Subgraph::parse(name, sdl).unwrap())
            .collect::<Vec<_>>();
        let graph = build_federated_query_graph(schema.clone(), subgraphs).unwrap();
        (schema, Arc::new(graph))
    }

    fn path_at(graph: &Arc<QueryGraph>, subgraph: &str, type_name: &str) -> OpGraphPath {
        let node = *graph
            .types_to_nodes_by_source(subgraph)
            .unwrap()
            .get(type_name)
            .unwrap();
        GraphPath::new(graph.clone(), node).unwrap()
    }

    /// Advances `path` with each top-level selection of the field set, returning the rendered
    /// options after each one.
    fn advance(
        graph: &Arc<QueryGraph>,
        path: OpGraphPath,
        selection_set: &SelectionSet,
    ) -> Vec<Option<Vec<String>>> {
        let mut resolver = SimpleConditionResolver::new(graph.clone());
        let start = SimultaneousPaths::from(path);
        selection_set
            .iter()
            .map(|selection| {
                start
                    .advance_with_operation_element(
                        &selection.element(),
                        &mut resolver,
                        &ExcludedEdges::default(),
                    )
                    .unwrap()
                    .map(|options| options.iter().map(|option| option.to_string()).collect())
            })
            .collect()
    }

    #[test]
    fn explodes_abstract_types_missing_a_field() {
        let (schema, graph) = setup(&[(
            "A",
            r#"
            type Query { node: Node }
            interface Node { id: ID! }
            type User implements Node { id: ID! name: String }
            type Org implements Node { id: ID! name: String }
            "#,
        )]);
        let field_set = parse_field_set(&schema, name!("Node"), "id name").unwrap();
        let options = advance(&graph, path_at(&graph, "A", "Node"), &field_set);
        assert_eq!(
            options,
            [
                Some(vec!["Node(A) --[id]--> ID(A)".to_owned()]),
                Some(vec![
                    "{ Node(A) --[... on User]--> User(A) --[name]--> String(A), Node(A) --[... on Org]--> Org(A) --[name]--> String(A) }"
                        .to_owned()
                ]),
            ]
        );
    }

    #[test]
    fn explosion_fails_when_one_implementation_lacks_the_field() {
        let (schema, graph) = setup(&[(
            "A",
            r#"
            type Query { node: Node }
            interface Node { id: ID! }
            type User implements Node { id: ID! name: String email: String }
            type Org implements Node { id: ID! }
            "#,
        )]);
        let field_set = parse_field_set(&schema, name!("Node"), "name").unwrap();
        assert_eq!(
            advance(&graph, path_at(&graph, "A", "Node"), &field_set),
            [None]
        );

        let field_set = parse_field_set(&schema, name!("Node"), "... on User { email }").unwrap();
        assert_eq!(
            advance(&graph, path_at(&graph, "A", "Node"), &field_set),
            [Some(vec!["Node(A) --[... on User]--> User(A)".to_owned()])]
        );
    }

    #[test]
    fn object_tails_ignore_fragments_on_their_abstract_types() {
        let (schema, graph) = setup(&[(
            "A",
            r#"
            type Query { node: Node }
            interface Node { id: ID! name: String }
            type User implements Node { id: ID! name: String }
            type Org implements Node { id: ID! name: String }
            "#,
        )]);
        let field_set = parse_field_set(&schema, name!("User"), "... on Node { id }").unwrap();
        assert_eq!(
            advance(&graph, path_at(&graph, "A", "User"), &field_set),
            [Some(vec!["User(A)".to_owned()])]
        );
    }

    #[test]
    fn collects_fields_from_other_subgraphs_through_keys() {
        let (schema, graph) = setup(&[
            (
                "A",
                r#"
                type Query { node: Node }
                interface Node { id: ID! }
                type User implements Node @key(fields: "id") { id: ID! }
                "#,
            ),
            (
                "B",
                r#"type User @key(fields: "id") { id: ID! email: String }"#,
            ),
        ]);
        let field_set = parse_field_set(&schema, name!("User"), "email").unwrap();
        let options = advance(&graph, path_at(&graph, "A", "User"), &field_set);
        assert_eq!(
            options,
            [Some(vec![
                "User(A) --[key()]--> User(B) --[email]--> String(B)".to_owned()
            ])]
        );
    }
}
