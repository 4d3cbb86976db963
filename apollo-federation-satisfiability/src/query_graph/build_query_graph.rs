use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::schema::ExtendedType;
use indexmap::IndexSet;
use petgraph::graph::NodeIndex;
use strum::IntoEnumIterator;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::operation::SelectionSet;
use crate::query_graph::FEDERATED_GRAPH_ROOT_SOURCE;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdge;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNode;
use crate::query_graph::QueryGraphNodeType;
use crate::schema::ValidFederationSchema;
use crate::schema::field_set::parse_field_set;
use crate::schema::position::CompositeTypeDefinitionPosition;
use crate::schema::position::OutputTypeDefinitionPosition;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::subgraph::Subgraph;

/// Builds a "federated" query graph based on the provided supergraph and its subgraphs.
///
/// A federated query graph is one that is used to reason about queries made by a router against a
/// set of federated subgraph services. `@requires` conditions are resolved against the supergraph
/// schema, `@key` conditions against the subgraph declaring the key.
pub fn build_federated_query_graph(
    supergraph_schema: ValidFederationSchema,
    subgraphs: impl IntoIterator<Item = Subgraph>,
) -> Result<QueryGraph, FederationError> {
    let mut query_graph = QueryGraph {
        // Note this name is a dummy initial name that gets overridden as we build the query graph.
        current_source: "".into(),
        graph: Default::default(),
        sources: Default::default(),
        subgraphs_by_name: Default::default(),
        types_to_nodes_by_source: Default::default(),
        root_kinds_to_nodes_by_source: Default::default(),
    };
    for subgraph in subgraphs {
        if *subgraph.name == *FEDERATED_GRAPH_ROOT_SOURCE
            || query_graph.subgraphs_by_name.contains_key(&subgraph.name)
        {
            return Err(SingleFederationError::InvalidSubgraph {
                message: format!("Invalid or duplicate subgraph name \"{}\"", subgraph.name),
            }
            .into());
        }
        query_graph = SchemaQueryGraphBuilder::new(
            query_graph,
            subgraph.name.clone(),
            subgraph.schema.clone(),
            Some(subgraph),
        )
        .build()?;
    }
    FederatedQueryGraphBuilder::new(query_graph, supergraph_schema).build()
}

/// Builds a query graph based on the provided schema (usually an API schema outside of testing).
///
/// Assumes the given schemas have been validated.
pub fn build_query_graph(
    name: Arc<str>,
    schema: ValidFederationSchema,
) -> Result<QueryGraph, FederationError> {
    let query_graph = QueryGraph {
        // Note this name is a dummy initial name that gets overridden as we build the query graph.
        current_source: "".into(),
        graph: Default::default(),
        sources: Default::default(),
        subgraphs_by_name: Default::default(),
        types_to_nodes_by_source: Default::default(),
        root_kinds_to_nodes_by_source: Default::default(),
    };
    SchemaQueryGraphBuilder::new(query_graph, name, schema, None).build()
}

/// Node/edge creation shared by the builders. Every node and edge of a query graph belongs to the
/// builder's current source.
struct BaseQueryGraphBuilder {
    query_graph: QueryGraph,
}

impl BaseQueryGraphBuilder {
    fn new(mut query_graph: QueryGraph, source: Arc<str>, schema: ValidFederationSchema) -> Self {
        query_graph.current_source = source.clone();
        query_graph.sources.insert(source.clone(), schema);
        query_graph
            .types_to_nodes_by_source
            .insert(source.clone(), Default::default());
        query_graph
            .root_kinds_to_nodes_by_source
            .insert(source, Default::default());
        Self { query_graph }
    }

    fn build(self) -> QueryGraph {
        self.query_graph
    }

    fn create_node(
        &mut self,
        type_: QueryGraphNodeType,
        root_kind: Option<SchemaRootDefinitionKind>,
    ) -> Result<NodeIndex, FederationError> {
        let source = self.query_graph.current_source.clone();
        let type_name = match &type_ {
            QueryGraphNodeType::SchemaType(type_) => Some(type_.type_name().clone()),
            QueryGraphNodeType::FederatedRootType(_) => None,
        };
        let node = self.query_graph.graph.add_node(QueryGraphNode {
            type_,
            source: source.clone(),
            root_kind,
        });
        if let Some(type_name) = type_name {
            self.query_graph
                .types_to_nodes_by_source
                .get_mut(&source)
                .ok_or_else(|| SingleFederationError::Internal {
                    message: "Types-to-nodes map unexpectedly missing".to_owned(),
                })?
                .insert(type_name, node);
        }
        if let Some(root_kind) = root_kind {
            self.query_graph
                .root_kinds_to_nodes_by_source
                .get_mut(&source)
                .ok_or_else(|| SingleFederationError::Internal {
                    message: "Root-kinds-to-nodes map unexpectedly missing".to_owned(),
                })?
                .insert(root_kind, node);
        }
        Ok(node)
    }

    fn add_edge(
        &mut self,
        head: NodeIndex,
        tail: NodeIndex,
        transition: QueryGraphEdgeTransition,
        conditions: Option<Arc<SelectionSet>>,
    ) -> Result<(), FederationError> {
        // Fail on missing nodes rather than letting petgraph panic.
        self.query_graph.node_weight(head)?;
        self.query_graph.node_weight(tail)?;
        self.query_graph.graph.add_edge(
            head,
            tail,
            QueryGraphEdge {
                transition,
                conditions,
            },
        );
        Ok(())
    }
}

/// Builds the part of a query graph corresponding to a single schema: a node per type reachable
/// from the schema roots (and, for subgraphs, from the entity types), with an edge per field and
/// per possible runtime type of abstract types.
struct SchemaQueryGraphBuilder {
    base: BaseQueryGraphBuilder,
    subgraph: Option<Subgraph>,
}

impl SchemaQueryGraphBuilder {
    fn new(
        query_graph: QueryGraph,
        source: Arc<str>,
        schema: ValidFederationSchema,
        subgraph: Option<Subgraph>,
    ) -> Self {
        let mut base = BaseQueryGraphBuilder::new(query_graph, source.clone(), schema);
        if let Some(subgraph) = &subgraph {
            base.query_graph
                .subgraphs_by_name
                .insert(source, subgraph.clone());
        }
        Self { base, subgraph }
    }

    fn schema(&self) -> Result<ValidFederationSchema, FederationError> {
        Ok(self.base.query_graph.schema()?.clone())
    }

    fn build(mut self) -> Result<QueryGraph, FederationError> {
        let schema = self.schema()?;
        let mut to_visit = Vec::new();
        for root_kind in SchemaRootDefinitionKind::iter() {
            let Some(root_type_name) = schema.schema().root_operation(root_kind.into()) else {
                continue;
            };
            let type_ = schema.get_type(root_type_name.clone())?.try_into()?;
            let node = self
                .base
                .create_node(QueryGraphNodeType::SchemaType(type_), Some(root_kind))?;
            to_visit.push(node);
        }
        // Entities can be queried directly through their keys, even when no field of this
        // subgraph leads to them.
        if let Some(subgraph) = &self.subgraph {
            for (type_name, type_) in &schema.schema().types {
                if !matches!(type_, ExtendedType::Object(_) | ExtendedType::Interface(_))
                    || !subgraph.is_entity(type_name)
                    || self.existing_node(type_name)?.is_some()
                {
                    continue;
                }
                let type_ = schema.get_type(type_name.clone())?.try_into()?;
                let node = self
                    .base
                    .create_node(QueryGraphNodeType::SchemaType(type_), None)?;
                to_visit.push(node);
            }
        }
        // Nodes are visited once, right after being created.
        while let Some(node) = to_visit.pop() {
            self.add_edges_from(node, &schema, &mut to_visit)?;
        }
        Ok(self.base.build())
    }

    fn existing_node(&self, type_name: &Name) -> Result<Option<NodeIndex>, FederationError> {
        Ok(self
            .base
            .query_graph
            .types_to_nodes_by_source(&self.base.query_graph.current_source)?
            .get(type_name)
            .copied())
    }

    fn get_or_create_node(
        &mut self,
        type_name: &Name,
        schema: &ValidFederationSchema,
        to_visit: &mut Vec<NodeIndex>,
    ) -> Result<NodeIndex, FederationError> {
        if let Some(node) = self.existing_node(type_name)? {
            return Ok(node);
        }
        let type_: OutputTypeDefinitionPosition = schema.get_type(type_name.clone())?.try_into()?;
        let node = self
            .base
            .create_node(QueryGraphNodeType::SchemaType(type_), None)?;
        to_visit.push(node);
        Ok(node)
    }

    fn add_edges_from(
        &mut self,
        node: NodeIndex,
        schema: &ValidFederationSchema,
        to_visit: &mut Vec<NodeIndex>,
    ) -> Result<(), FederationError> {
        let QueryGraphNodeType::SchemaType(type_) = &self.base.query_graph.node_weight(node)?.type_
        else {
            return Ok(());
        };
        let Ok(type_): Result<CompositeTypeDefinitionPosition, _> = type_.clone().try_into() else {
            // Leaf types have no outgoing edges.
            return Ok(());
        };
        let source = self.base.query_graph.current_source.clone();

        let fields = match &type_ {
            CompositeTypeDefinitionPosition::Object(pos) => {
                Some(&pos.get(schema.schema())?.fields)
            }
            CompositeTypeDefinitionPosition::Interface(pos) => {
                Some(&pos.get(schema.schema())?.fields)
            }
            CompositeTypeDefinitionPosition::Union(_) => None,
        };
        for (field_name, field) in fields.into_iter().flatten() {
            let field_definition_position = type_.field(field_name.clone())?;
            if let Some(subgraph) = &self.subgraph {
                // External fields are provided by other subgraphs.
                if subgraph.is_external(&field_definition_position)? {
                    continue;
                }
            }
            let tail = self.get_or_create_node(field.ty.inner_named_type(), schema, to_visit)?;
            self.base.add_edge(
                node,
                tail,
                QueryGraphEdgeTransition::FieldCollection {
                    source: source.clone(),
                    field_definition_position,
                },
                None,
            )?;
        }

        if type_.is_abstract_type() {
            for runtime_type in schema.possible_runtime_types(type_.clone())? {
                let tail = self.get_or_create_node(&runtime_type.type_name, schema, to_visit)?;
                self.base.add_edge(
                    node,
                    tail,
                    QueryGraphEdgeTransition::Downcast {
                        source: source.clone(),
                        from_type_position: type_.clone(),
                        to_type_position: runtime_type.into(),
                    },
                    None,
                )?;
            }
        }
        Ok(())
    }
}

struct FederatedQueryGraphBuilder {
    base: BaseQueryGraphBuilder,
    supergraph_schema: ValidFederationSchema,
}

impl FederatedQueryGraphBuilder {
    fn new(query_graph: QueryGraph, supergraph_schema: ValidFederationSchema) -> Self {
        let base = BaseQueryGraphBuilder::new(
            query_graph,
            FEDERATED_GRAPH_ROOT_SOURCE.into(),
            supergraph_schema.clone(),
        );
        Self {
            base,
            supergraph_schema,
        }
    }

    fn build(mut self) -> Result<QueryGraph, FederationError> {
        self.add_federated_root_nodes()?;
        self.add_root_edges()?;
        self.handle_key()?;
        self.handle_requires()?;
        Ok(self.base.build())
    }

    fn add_federated_root_nodes(&mut self) -> Result<(), FederationError> {
        let root_kinds = self
            .base
            .query_graph
            .root_kinds_to_nodes_by_source
            .iter()
            .filter(|(source, _)| **source != self.base.query_graph.current_source)
            .flat_map(|(_, root_kinds_to_nodes)| root_kinds_to_nodes.keys().copied())
            .collect::<IndexSet<_>>();
        for root_kind in root_kinds {
            self.base
                .create_node(QueryGraphNodeType::FederatedRootType(root_kind), Some(root_kind))?;
        }
        Ok(())
    }

    /// Add the edges from federated roots to the subgraph ones. Also, for each root kind, we add
    /// edges from the corresponding root type of each subgraph to the root type of every other
    /// subgraph. This encodes the fact that if a field returns a root type, we can always query
    /// any subgraph from that point.
    fn add_root_edges(&mut self) -> Result<(), FederationError> {
        let mut new_edges = Vec::new();
        let query_graph = &self.base.query_graph;
        for (source, root_kinds_to_nodes) in &query_graph.root_kinds_to_nodes_by_source {
            if *source == query_graph.current_source {
                continue;
            }
            for (root_kind, root_node) in root_kinds_to_nodes {
                let federated_root_node = query_graph
                    .root_kinds_to_nodes()?
                    .get(root_kind)
                    .ok_or_else(|| SingleFederationError::Internal {
                        message: "Federated root node unexpectedly missing".to_owned(),
                    })?;
                new_edges.push(QueryGraphEdgeData {
                    head: *federated_root_node,
                    tail: *root_node,
                    transition: QueryGraphEdgeTransition::FreeTransition,
                    conditions: None,
                });
                for (other_source, other_root_kinds_to_nodes) in
                    &query_graph.root_kinds_to_nodes_by_source
                {
                    if *other_source == query_graph.current_source || other_source == source {
                        continue;
                    }
                    if let Some(other_root_node) = other_root_kinds_to_nodes.get(root_kind) {
                        new_edges.push(QueryGraphEdgeData {
                            head: *root_node,
                            tail: *other_root_node,
                            transition: QueryGraphEdgeTransition::RootTypeResolution {
                                root_kind: *root_kind,
                            },
                            conditions: None,
                        })
                    }
                }
            }
        }
        for new_edge in new_edges {
            new_edge.add_to(&mut self.base)?;
        }
        Ok(())
    }

    /// Handle @key by adding the appropriate key-resolution edges.
    fn handle_key(&mut self) -> Result<(), FederationError> {
        let mut new_edges = Vec::new();
        let query_graph = &self.base.query_graph;
        // We look at adding edges from "other subgraphs" to the current type, so the tail of all
        // the edges built for a node is always that node.
        for tail in query_graph.graph.node_indices() {
            let tail_weight = query_graph.node_weight(tail)?;
            let source = &tail_weight.source;
            if *source == query_graph.current_source {
                continue;
            }
            // Ignore federated root nodes.
            let QueryGraphNodeType::SchemaType(type_pos) = &tail_weight.type_ else {
                continue;
            };
            let subgraph = query_graph.subgraph_by_name(source).ok_or_else(|| {
                SingleFederationError::Internal {
                    message: format!("Subgraph \"{source}\" unexpectedly missing"),
                }
            })?;
            for key in subgraph.resolvable_keys(type_pos.type_name())? {
                // The @key means the current subgraph can be queried for the entity as long as
                // "the other side" can provide the key fields. The other side doesn't need to
                // define the same key.
                let conditions = Arc::new(parse_field_set(
                    &subgraph.schema,
                    type_pos.type_name().clone(),
                    &key,
                )?);
                for (other_source, other_types_to_nodes) in &query_graph.types_to_nodes_by_source
                {
                    if *other_source == query_graph.current_source || other_source == source {
                        continue;
                    }
                    if let Some(head) = other_types_to_nodes.get(type_pos.type_name()) {
                        new_edges.push(QueryGraphEdgeData {
                            head: *head,
                            tail,
                            transition: QueryGraphEdgeTransition::KeyResolution,
                            conditions: Some(conditions.clone()),
                        });
                    }
                }
            }
        }
        for new_edge in new_edges {
            new_edge.add_to(&mut self.base)?;
        }
        Ok(())
    }

    /// Handle @requires by adding the required fields as conditions of the field edges.
    fn handle_requires(&mut self) -> Result<(), FederationError> {
        let mut new_conditions = Vec::new();
        let query_graph = &self.base.query_graph;
        for edge in query_graph.graph.edge_indices() {
            let edge_weight = query_graph.edge_weight(edge)?;
            let QueryGraphEdgeTransition::FieldCollection {
                source,
                field_definition_position,
            } = &edge_weight.transition
            else {
                continue;
            };
            let Some(subgraph) = query_graph.subgraph_by_name(source) else {
                continue;
            };
            let Some(fields) = subgraph.requires_fields(field_definition_position)? else {
                continue;
            };
            // @requires field set is validated against the supergraph
            let conditions = parse_field_set(
                &self.supergraph_schema,
                field_definition_position.parent().type_name().clone(),
                &fields,
            )?;
            new_conditions.push((edge, conditions));
        }
        for (edge, conditions) in new_conditions {
            let edge_weight = self.base.query_graph.edge_weight_mut(edge)?;
            // Nothing prior to this should have set any conditions for field-collecting edges.
            if edge_weight.conditions.is_some() {
                return Err(SingleFederationError::Internal {
                    message: format!(
                        "Field-collection edge \"{}\" unexpectedly had conditions",
                        edge_weight.transition,
                    ),
                }
                .into());
            }
            edge_weight.conditions = Some(Arc::new(conditions));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct QueryGraphEdgeData {
    head: NodeIndex,
    tail: NodeIndex,
    transition: QueryGraphEdgeTransition,
    conditions: Option<Arc<SelectionSet>>,
}

impl QueryGraphEdgeData {
    fn add_to(self, builder: &mut BaseQueryGraphBuilder) -> Result<(), FederationError> {
        builder.add_edge(self.head, self.tail, self.transition, self.conditions)
    }
}
