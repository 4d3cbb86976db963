use either::Either;
use indexmap::IndexMap;
use indexmap::IndexSet;
use indexmap::map::Entry;
use petgraph::graph::EdgeIndex;

use crate::bail;
use crate::ensure;
use crate::error::FederationError;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::condition_resolver::ConditionResolution;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::condition_resolver::ExcludedEdges;
use crate::query_graph::graph_path::GraphPath;
use crate::query_graph::graph_path::Unadvanceable;
use crate::query_graph::graph_path::UnadvanceableReason;
use crate::query_graph::graph_path::Unadvanceables;
use crate::schema::position::CompositeTypeDefinitionPosition;
use crate::schema::position::FieldDefinitionPosition;
use crate::subgraph::Subgraph;
use crate::utils::human_readable_list;

/// A `GraphPath` whose triggers are query graph transitions in some other query graph (essentially
/// meaning that the path has been guided by a walk through that other query graph).
pub type TransitionGraphPath = GraphPath<QueryGraphEdgeTransition>;

impl TransitionGraphPath {
    /// Advances the path with the given supergraph transition, either directly from its tail or
    /// after moving to other subgraphs through keys (or root type edges). All the resulting paths
    /// are returned, or why none exists.
    pub(crate) fn advance_with_transition(
        &self,
        transition: &QueryGraphEdgeTransition,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<Either<Vec<TransitionGraphPath>, Unadvanceables>, FederationError> {
        ensure!(
            transition.collect_operation_elements(),
            "Supergraphs shouldn't have transitions that don't collect elements",
        );
        let mut options = Vec::new();
        let mut dead_ends = Vec::new();
        match self.advance_with_direct_transition(transition, condition_resolver)? {
            Either::Left(paths) => options.extend(paths),
            Either::Right(unadvanceables) => dead_ends.extend(unadvanceables.0),
        }
        let indirect_paths = self.indirect_paths(condition_resolver, &ExcludedEdges::default())?;
        for indirect_path in &indirect_paths.paths {
            match indirect_path.advance_with_direct_transition(transition, condition_resolver)? {
                Either::Left(paths) => options.extend(paths),
                Either::Right(unadvanceables) => dead_ends.extend(unadvanceables.0),
            }
        }
        if !options.is_empty() {
            return Ok(Either::Left(options));
        }
        for edge in indirect_paths.dead_ends {
            dead_ends.push(self.unsatisfiable_key(edge)?);
        }
        if let QueryGraphEdgeTransition::FieldCollection {
            field_definition_position,
            ..
        } = transition
        {
            dead_ends.extend(
                self.unreachable_subgraphs(field_definition_position, &indirect_paths.paths)?,
            );
        }
        Ok(Either::Right(Unadvanceables(dead_ends)))
    }

    /// Why the key edge `edge` could not be taken.
    fn unsatisfiable_key(&self, edge: EdgeIndex) -> Result<Unadvanceable, FederationError> {
        let edge_weight = self.graph.edge_weight(edge)?;
        let (head, tail) = self.graph.edge_endpoints(edge)?;
        let head_weight = self.graph.node_weight(head)?;
        let tail_weight = self.graph.node_weight(tail)?;
        let key_fields = edge_weight
            .conditions
            .as_ref()
            .map(|conditions| field_set_string(&conditions.to_string()))
            .unwrap_or_default();
        Ok(Unadvanceable {
            reason: UnadvanceableReason::UnsatisfiableKeyCondition,
            from_subgraph: head_weight.source.clone(),
            to_subgraph: tail_weight.source.clone(),
            details: format!(
                "cannot move to subgraph \"{}\" using @key(fields: \"{}\") of \"{}\", the key field(s) cannot be resolved from subgraph \"{}\"",
                tail_weight.source, key_fields, tail_weight.type_, head_weight.source,
            ),
        })
    }

    fn advance_with_direct_transition(
        &self,
        transition: &QueryGraphEdgeTransition,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<Either<Vec<TransitionGraphPath>, Unadvanceables>, FederationError> {
        let mut options = Vec::new();
        let mut dead_ends = Vec::new();
        for edge in self.next_edges() {
            let edge_weight = self.graph.edge_weight(edge)?;
            // The edge must match the transition. If it doesn't, we cannot use it.
            if !edge_weight
                .transition
                .matches_supergraph_transition(transition)?
            {
                continue;
            }
            // Additionally, we can only take an edge if we can satisfy its conditions.
            match condition_resolver.resolve(edge, &ExcludedEdges::default())? {
                ConditionResolution::Satisfied => {
                    options.push(self.add(transition.clone(), edge)?);
                }
                ConditionResolution::Unsatisfied => {
                    // Condition on a field means a @requires.
                    let QueryGraphEdgeTransition::FieldCollection {
                        source,
                        field_definition_position,
                    } = &edge_weight.transition
                    else {
                        bail!("Shouldn't have conditions on direct transition {}", transition);
                    };
                    let warning = match self.graph.subgraph_by_name(source) {
                        Some(subgraph) => warn_on_key_fields_marked_external(
                            subgraph,
                            field_definition_position,
                        )?,
                        None => String::new(),
                    };
                    dead_ends.push(Unadvanceable {
                        reason: UnadvanceableReason::UnsatisfiableRequiresCondition,
                        from_subgraph: source.clone(),
                        to_subgraph: source.clone(),
                        details: format!(
                            "cannot satisfy @requires conditions on field \"{field_definition_position}\"{warning}",
                        ),
                    });
                }
            }
        }

        if !options.is_empty() {
            return Ok(Either::Left(options));
        }
        if !dead_ends.is_empty() {
            return Ok(Either::Right(Unadvanceables(dead_ends)));
        }

        let tail_weight = self.tail_node()?;
        let subgraph = &tail_weight.source;
        let details = match transition {
            QueryGraphEdgeTransition::FieldCollection {
                field_definition_position,
                ..
            } => 'details: {
                let subgraph_schema = self.graph.schema_by_source(subgraph)?;
                let parent_type_pos_in_subgraph = subgraph_schema
                    .try_get_type(field_definition_position.type_name().clone())
                    .and_then(|pos| CompositeTypeDefinitionPosition::try_from(pos).ok());
                let Some(field_pos_in_subgraph) = parent_type_pos_in_subgraph
                    .and_then(|pos| pos.field(field_definition_position.field_name().clone()).ok())
                    .filter(|pos| pos.get(subgraph_schema.schema()).is_ok())
                else {
                    break 'details format!("cannot find field \"{field_definition_position}\"");
                };
                // The subgraph has the field but no corresponding edge. This should only happen
                // if the field is external.
                let is_external = match self.graph.subgraph_by_name(subgraph) {
                    Some(subgraph) => subgraph.is_external(&field_pos_in_subgraph)?,
                    None => false,
                };
                if !is_external {
                    bail!(
                        "{} in {} is not external but there is no corresponding edge",
                        field_pos_in_subgraph,
                        subgraph,
                    );
                }
                format!(
                    "field \"{field_definition_position}\" is not resolvable because marked @external"
                )
            }
            QueryGraphEdgeTransition::Downcast {
                to_type_position, ..
            } => {
                format!("cannot find type \"{to_type_position}\"")
            }
            _ => {
                bail!("Unhandled direct transition {}", transition);
            }
        };
        Ok(Either::Right(Unadvanceables(vec![Unadvanceable {
            reason: UnadvanceableReason::NoMatchingTransition,
            from_subgraph: subgraph.clone(),
            to_subgraph: subgraph.clone(),
            details,
        }])))
    }

    /// Explains why the subgraphs defining the field, but which no indirect path reaches, could
    /// not be used: their version of the type cannot be resolved by key.
    fn unreachable_subgraphs(
        &self,
        field_definition_position: &FieldDefinitionPosition,
        indirect_paths: &[TransitionGraphPath],
    ) -> Result<Vec<Unadvanceable>, FederationError> {
        let current_subgraph = &self.tail_node()?.source;
        let mut reached = IndexSet::from([current_subgraph.clone()]);
        for path in indirect_paths {
            reached.insert(path.tail_node()?.source.clone());
        }
        let type_name = field_definition_position.type_name();
        let mut dead_ends = Vec::new();
        for subgraph in self.graph.subgraphs() {
            if reached.contains(&subgraph.name)
                || !has_local_field(subgraph, field_definition_position)?
            {
                continue;
            }
            let details = if !subgraph.is_entity(type_name) {
                format!(
                    "cannot move to subgraph \"{}\", which has field \"{}\", because type \"{}\" has no @key defined in subgraph \"{}\"",
                    subgraph.name, field_definition_position, type_name, subgraph.name,
                )
            } else if subgraph.resolvable_keys(type_name)?.is_empty() {
                format!(
                    "cannot move to subgraph \"{}\", which has field \"{}\", because none of the @key defined on type \"{}\" in subgraph \"{}\" are resolvable (they are all declared with their \"resolvable\" argument set to false)",
                    subgraph.name, field_definition_position, type_name, subgraph.name,
                )
            } else {
                // Unsatisfiable keys are reported with the indirect paths.
                continue;
            };
            dead_ends.push(Unadvanceable {
                reason: UnadvanceableReason::UnreachableType,
                from_subgraph: current_subgraph.clone(),
                to_subgraph: subgraph.name.clone(),
                details,
            });
        }
        Ok(dead_ends)
    }
}

/// Whether the subgraph defines the field, and not as `@external`.
fn has_local_field(
    subgraph: &Subgraph,
    field_definition_position: &FieldDefinitionPosition,
) -> Result<bool, FederationError> {
    let Some(Ok(parent_type_pos)) = subgraph
        .schema
        .try_get_type(field_definition_position.type_name().clone())
        .map(CompositeTypeDefinitionPosition::try_from)
    else {
        return Ok(false);
    };
    let Ok(field_pos) = parent_type_pos.field(field_definition_position.field_name().clone()) else {
        return Ok(false);
    };
    if field_pos.get(subgraph.schema.schema()).is_err() {
        return Ok(false);
    }
    Ok(!subgraph.is_external(&field_pos)?)
}

/// Because federation 1 used to (somewhat wrongly) require @external on key fields of type
/// extensions, users dropping `extend` from their schema may forget to remove the @external on
/// their key fields. That makes the key fields truly external, which easily makes @requires
/// conditions unsatisfiable, so the mistake is pointed out.
fn warn_on_key_fields_marked_external(
    subgraph: &Subgraph,
    field_definition_position: &FieldDefinitionPosition,
) -> Result<String, FederationError> {
    let key_fields_marked_external =
        subgraph.external_key_fields(field_definition_position.type_name())?;
    if key_fields_marked_external.is_empty() {
        return Ok(String::new());
    }
    let fields = key_fields_marked_external.into_iter().collect::<Vec<_>>();
    Ok(format!(
        " (please ensure that this is not due to key {} being accidentally marked @external)",
        human_readable_list(&fields, "field", "fields"),
    ))
}

/// Field sets render as `{ a b }`, but are written `a b` in directive arguments.
fn field_set_string(selection_set: &str) -> String {
    selection_set
        .strip_prefix("{ ")
        .and_then(|s| s.strip_suffix(" }"))
        .unwrap_or(selection_set)
        .to_owned()
}

/// Keeps a single path for each tail node: the first one which hasn't cycled if any, and the
/// shortest among those.
pub(crate) fn dedup_by_tail(paths: Vec<TransitionGraphPath>) -> Vec<TransitionGraphPath> {
    let mut by_tail = IndexMap::with_capacity(paths.len());
    for path in paths {
        match by_tail.entry(path.tail()) {
            Entry::Vacant(entry) => {
                entry.insert(path);
            }
            Entry::Occupied(mut entry) => {
                let preferred = (path.has_just_cycled(), path.size())
                    < (entry.get().has_just_cycled(), entry.get().size());
                if preferred {
                    entry.insert(path);
                }
            }
        }
    }
    by_tail.into_values().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use petgraph::visit::EdgeRef;

    use super::*;
    use crate::composition::satisfiability::validation_traversal::SimpleConditionResolver;
    use crate::query_graph::QueryGraph;
    use crate::query_graph::build_federated_query_graph;
    use crate::query_graph::build_query_graph;
    use crate::schema::ValidFederationSchema;
    use crate::schema::position::SchemaRootDefinitionKind;

    const SUPERGRAPH: &str = r#"
        type Query {
          t: T
        }

        type T {
          id: ID!
          name: String
          price: Int
          tax: Int
        }
    "#;

    fn graphs(subgraphs: &[(&str, &str)]) -> (Arc<QueryGraph>, Arc<QueryGraph>) {
        let schema = ValidFederationSchema::parse(SUPERGRAPH, "supergraph.graphql").unwrap();
        let subgraphs = subgraphs
            .iter()
            .map(|(name, sdl)| Subgraph::parse(name, sdl).unwrap())
            .collect::<Vec<_>>();
        let api_graph = build_query_graph("api".into(), schema.clone()).unwrap();
        let federated_graph = build_federated_query_graph(schema, subgraphs).unwrap();
        (Arc::new(api_graph), Arc::new(federated_graph))
    }

    /// Follows `t` then `field` in the API graph, returning the transition of `field`.
    fn field_transition(api_graph: &QueryGraph, field: &str) -> QueryGraphEdgeTransition {
        let root = *api_graph
            .root_kinds_to_nodes()
            .unwrap()
            .get(&SchemaRootDefinitionKind::Query)
            .unwrap();
        let t = api_graph.out_edges(root)[0].target();
        api_graph
            .out_edges(t)
            .into_iter()
            .find(|edge_ref| edge_ref.weight().transition.to_string() == field)
            .unwrap()
            .weight()
            .transition
            .clone()
    }

    /// The subgraph path following `Query.t` in the given subgraph.
    fn path_to_t(federated_graph: &Arc<QueryGraph>, subgraph: &str) -> TransitionGraphPath {
        let root = *federated_graph
            .root_kinds_to_nodes_by_source(subgraph)
            .unwrap()
            .get(&SchemaRootDefinitionKind::Query)
            .unwrap();
        let path = GraphPath::new(federated_graph.clone(), root).unwrap();
        let edge = path.next_edges()[0];
        let transition = federated_graph.edge_weight(edge).unwrap().transition.clone();
        path.add(transition, edge).unwrap()
    }

    #[test]
    fn advances_through_keys() {
        let (api_graph, federated_graph) = graphs(&[
            ("A", r#"type Query { t: T } type T @key(fields: "id") { id: ID! }"#),
            ("B", r#"type T @key(fields: "id") { id: ID! name: String }"#),
        ]);
        let mut resolver = SimpleConditionResolver::new(federated_graph.clone());
        let path = path_to_t(&federated_graph, "A");
        let Either::Left(paths) = path
            .advance_with_transition(&field_transition(&api_graph, "name"), &mut resolver)
            .unwrap()
        else {
            panic!("expected the path to advance");
        };
        assert_eq!(
            paths.iter().map(|path| path.to_string()).collect::<Vec<_>>(),
            ["Query(A) --[t]--> T(A) --[key()]--> T(B) --[name]--> String(B)"]
        );
    }

    #[test]
    fn explains_missing_and_external_fields() {
        let (api_graph, federated_graph) = graphs(&[
            (
                "A",
                r#"
                type Query { t: T }
                type T @key(fields: "id") { id: ID! price: Int @external tax: Int @requires(fields: "price") }
                "#,
            ),
            ("B", r#"type T { id: ID! name: String }"#),
        ]);
        let mut resolver = SimpleConditionResolver::new(federated_graph.clone());
        let path = path_to_t(&federated_graph, "A");

        let Either::Right(unadvanceables) = path
            .advance_with_transition(&field_transition(&api_graph, "price"), &mut resolver)
            .unwrap()
        else {
            panic!("expected the path not to advance");
        };
        assert_eq!(
            unadvanceables
                .iter()
                .map(|unadvanceable| unadvanceable.to_string())
                .collect::<Vec<_>>(),
            [r#"[NoMatchingTransition](A->A) field "T.price" is not resolvable because marked @external"#]
        );

        let Either::Right(unadvanceables) = path
            .advance_with_transition(&field_transition(&api_graph, "tax"), &mut resolver)
            .unwrap()
        else {
            panic!("expected the path not to advance");
        };
        assert_eq!(
            unadvanceables
                .iter()
                .map(|unadvanceable| unadvanceable.details().to_owned())
                .collect::<Vec<_>>(),
            [r#"cannot satisfy @requires conditions on field "T.tax""#]
        );

        let Either::Right(unadvanceables) = path
            .advance_with_transition(&field_transition(&api_graph, "name"), &mut resolver)
            .unwrap()
        else {
            panic!("expected the path not to advance");
        };
        assert_eq!(
            unadvanceables
                .iter()
                .map(|unadvanceable| unadvanceable.details().to_owned())
                .collect::<Vec<_>>(),
            [
                r#"cannot find field "T.name""#,
                r#"cannot move to subgraph "B", which has field "T.name", because type "T" has no @key defined in subgraph "B""#,
            ]
        );
    }

    #[test]
    fn keeps_one_path_per_tail() {
        let (_, federated_graph) = graphs(&[
            ("A", r#"type Query { t: T } type T @key(fields: "id") { id: ID! }"#),
            ("B", r#"type T @key(fields: "id") { id: ID! }"#),
        ]);
        let path = path_to_t(&federated_graph, "A");
        // Going to B and back to A ends where `path` does.
        let mut longer = path.clone();
        for _ in 0..2 {
            let key_edge = longer
                .next_edges()
                .into_iter()
                .find(|edge| {
                    federated_graph.edge_weight(*edge).unwrap().transition
                        == QueryGraphEdgeTransition::KeyResolution
                })
                .unwrap();
            longer = longer
                .add(QueryGraphEdgeTransition::KeyResolution, key_edge)
                .unwrap();
        }
        assert_eq!(path.tail(), longer.tail());
        assert!(longer.has_just_cycled());
        let paths = dedup_by_tail(vec![longer, path.clone(), path]);
        assert_eq!(
            paths.iter().map(|path| path.to_string()).collect::<Vec<_>>(),
            ["Query(A) --[t]--> T(A)"]
        );
    }

    #[test]
    fn renders_key_fields_like_directive_arguments() {
        assert_eq!(field_set_string("{ id }"), "id");
        assert_eq!(field_set_string("{ id org { id } }"), "id org { id }");
    }
}
