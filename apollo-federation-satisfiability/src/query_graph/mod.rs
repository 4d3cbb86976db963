use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::graph::EdgeIndex;
use petgraph::graph::EdgeReference;
use petgraph::graph::NodeIndex;

use crate::ensure;
use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::operation::SelectionSet;
use crate::schema::ValidFederationSchema;
use crate::schema::position::CompositeTypeDefinitionPosition;
use crate::schema::position::FieldDefinitionPosition;
use crate::schema::position::OutputTypeDefinitionPosition;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::subgraph::Subgraph;

pub mod build_query_graph;
pub(crate) mod condition_resolver;
pub mod graph_path;

pub use build_query_graph::build_federated_query_graph;
pub use build_query_graph::build_query_graph;

/// The source of the root nodes of federated query graphs. It is not a valid GraphQL name, so it
/// cannot clash with a subgraph name.
pub const FEDERATED_GRAPH_ROOT_SOURCE: &str = "_";

#[derive(Debug, Clone)]
pub struct QueryGraphNode {
    /// The GraphQL type this node points to.
    pub type_: QueryGraphNodeType,
    /// An identifier of the underlying schema containing the `type_` this node points to. This is
    /// mainly used in federated query graphs, where the `source` is a subgraph name.
    pub source: Arc<str>,
    // If present, this node represents a root node of the corresponding kind.
    pub root_kind: Option<SchemaRootDefinitionKind>,
}

impl QueryGraphNode {
    /// The name of the type this node points to, or `None` for federated root nodes.
    pub fn type_name(&self) -> Option<&Name> {
        match &self.type_ {
            QueryGraphNodeType::SchemaType(type_) => Some(type_.type_name()),
            QueryGraphNodeType::FederatedRootType(_) => None,
        }
    }
}

impl Display for QueryGraphNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_, self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::From)]
pub enum QueryGraphNodeType {
    SchemaType(OutputTypeDefinitionPosition),
    FederatedRootType(SchemaRootDefinitionKind),
}

impl Display for QueryGraphNodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryGraphNodeType::SchemaType(pos) => pos.fmt(f),
            QueryGraphNodeType::FederatedRootType(root_kind) => {
                write!(f, "[{root_kind}]")
            }
        }
    }
}

impl TryFrom<QueryGraphNodeType> for CompositeTypeDefinitionPosition {
    type Error = FederationError;

    fn try_from(value: QueryGraphNodeType) -> Result<Self, Self::Error> {
        match value {
            QueryGraphNodeType::SchemaType(type_) => type_.try_into(),
            QueryGraphNodeType::FederatedRootType(_) => Err(SingleFederationError::Internal {
                message: format!(r#"Type "{value}" was unexpectedly not a composite type"#),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryGraphEdge {
    /// Indicates what kind of edge this is and what the edge does/represents. For instance, if the
    /// edge represents a field, the `transition` will be a `FieldCollection` transition and will
    /// link to the definition of the field it represents.
    pub transition: QueryGraphEdgeTransition,
    /// Optional conditions on an edge.
    ///
    /// Conditions are a set of selections (in the GraphQL sense) that the traversal of a query
    /// graph needs to "collect" (traverse edges with transitions corresponding to those
    /// selections) in order to be able to collect that edge.
    ///
    /// Conditions are used for edges corresponding to @key, in which case they are the fields
    /// composing the @key, and for field edges with @requires. Only federated query graphs have
    /// conditions.
    pub conditions: Option<Arc<SelectionSet>>,
}

impl Display for QueryGraphEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.conditions {
            Some(conditions) => write!(f, "{conditions} ⊢ {}", self.transition),
            None => self.transition.fmt(f),
        }
    }
}

/// The type of query graph edge "transition".
///
/// An edge transition encodes what the edge corresponds to, in the underlying GraphQL schema.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryGraphEdgeTransition {
    /// A field edge, going from (a node for) the field parent type to the field's (base) type.
    FieldCollection {
        /// The name of the schema containing the field.
        source: Arc<str>,
        /// The object/interface field being collected.
        field_definition_position: FieldDefinitionPosition,
    },
    /// A downcast edge, going from an abstract type (interface or union) to one of its possible
    /// runtime types.
    Downcast {
        /// The name of the schema containing the from/to types.
        source: Arc<str>,
        /// The parent type of the type condition, i.e. the type of the selection set containing
        /// the type condition.
        from_type_position: CompositeTypeDefinitionPosition,
        /// The type of the type condition, i.e. the type coming after "... on".
        to_type_position: CompositeTypeDefinitionPosition,
    },
    /// A key edge (only found in federated query graphs) going from an entity type in a particular
    /// subgraph to the same entity type but in another subgraph. Key transition edges _must_ have
    /// `conditions` corresponding to the key fields.
    KeyResolution,
    /// A root type edge (only found in federated query graphs) going from a root type (query,
    /// mutation or subscription) of a subgraph to the (same) root type of another subgraph. It
    /// encodes the fact that if a subgraph field returns a root type, any subgraph can be queried
    /// from there.
    RootTypeResolution {
        /// The kind of schema root resolved.
        root_kind: SchemaRootDefinitionKind,
    },
    /// A "free" edge, only found coming out of the root nodes of federated query graphs. It does
    /// not correspond to any GraphQL element but encodes the fact that the router is always free
    /// to start querying any of the subgraphs.
    FreeTransition,
}

impl QueryGraphEdgeTransition {
    /// Whether taking an edge with this transition corresponds to some element of an operation.
    pub fn collect_operation_elements(&self) -> bool {
        match self {
            QueryGraphEdgeTransition::FieldCollection { .. } => true,
            QueryGraphEdgeTransition::Downcast { .. } => true,
            QueryGraphEdgeTransition::KeyResolution => false,
            QueryGraphEdgeTransition::RootTypeResolution { .. } => false,
            QueryGraphEdgeTransition::FreeTransition => false,
        }
    }

    /// Whether this (subgraph) transition can be used to mirror the given supergraph transition.
    /// Fields match by name and downcasts by the name of the type casted to, as positions point
    /// into different schemas.
    pub(crate) fn matches_supergraph_transition(
        &self,
        supergraph_transition: &Self,
    ) -> Result<bool, FederationError> {
        ensure!(
            supergraph_transition.collect_operation_elements(),
            "Supergraphs shouldn't have a transition that doesn't collect elements; got {}",
            supergraph_transition,
        );
        Ok(match (self, supergraph_transition) {
            (
                QueryGraphEdgeTransition::FieldCollection {
                    field_definition_position,
                    ..
                },
                QueryGraphEdgeTransition::FieldCollection {
                    field_definition_position: supergraph_field_definition_position,
                    ..
                },
            ) => {
                field_definition_position.field_name()
                    == supergraph_field_definition_position.field_name()
            }
            (
                QueryGraphEdgeTransition::Downcast {
                    to_type_position, ..
                },
                QueryGraphEdgeTransition::Downcast {
                    to_type_position: supergraph_to_type_position,
                    ..
                },
            ) => to_type_position.type_name() == supergraph_to_type_position.type_name(),
            _ => false,
        })
    }
}

impl Display for QueryGraphEdgeTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryGraphEdgeTransition::FieldCollection {
                field_definition_position,
                ..
            } => {
                write!(f, "{}", field_definition_position.field_name())
            }
            QueryGraphEdgeTransition::Downcast {
                to_type_position, ..
            } => {
                write!(f, "... on {}", to_type_position.type_name())
            }
            QueryGraphEdgeTransition::KeyResolution => {
                write!(f, "key()")
            }
            QueryGraphEdgeTransition::RootTypeResolution { root_kind } => {
                write!(f, "{root_kind}()")
            }
            QueryGraphEdgeTransition::FreeTransition => {
                write!(f, "∅")
            }
        }
    }
}

/// A graph of the types of one or more schemas, in which edges represent the ways to go from one
/// type to another (collecting a field, casting to a subtype, resolving a key, ...).
pub struct QueryGraph {
    /// The "current" source of the query graph. For query graphs representing a single source
    /// graph, this will only ever be one value, but it will change for "federated" query graphs
    /// while they're being built (and after construction, will become
    /// FEDERATED_GRAPH_ROOT_SOURCE).
    current_source: Arc<str>,
    /// The nodes/edges of the query graph. Note that nodes/edges are never removed, so indexes
    /// are immutable once a node/edge is created.
    graph: DiGraph<QueryGraphNode, QueryGraphEdge>,
    /// The sources on which the query graph was built, which is a set (potentially of size 1) of
    /// GraphQL schema keyed by the name identifying them. Note that the `source` strings in the
    /// nodes/edges of a query graph are guaranteed to be valid key in this map.
    sources: IndexMap<Arc<str>, ValidFederationSchema>,
    /// The subgraphs of a federated query graph, keyed by name. Empty for other query graphs.
    subgraphs_by_name: IndexMap<Arc<str>, Subgraph>,
    /// A map (keyed by source) that associates type names of the underlying schema on which this
    /// query graph was built to the node that points to a type of that name.
    types_to_nodes_by_source: IndexMap<Arc<str>, IndexMap<Name, NodeIndex>>,
    /// A map (keyed by source) that associates schema root kinds to root nodes.
    root_kinds_to_nodes_by_source: IndexMap<Arc<str>, IndexMap<SchemaRootDefinitionKind, NodeIndex>>,
}

impl QueryGraph {
    pub fn name(&self) -> &str {
        &self.current_source
    }

    pub fn graph(&self) -> &DiGraph<QueryGraphNode, QueryGraphEdge> {
        &self.graph
    }

    pub fn node_weight(&self, node: NodeIndex) -> Result<&QueryGraphNode, FederationError> {
        self.graph.node_weight(node).ok_or_else(|| {
            SingleFederationError::Internal {
                message: "Node unexpectedly missing".to_owned(),
            }
            .into()
        })
    }

    pub fn edge_weight(&self, edge: EdgeIndex) -> Result<&QueryGraphEdge, FederationError> {
        self.graph.edge_weight(edge).ok_or_else(|| {
            SingleFederationError::Internal {
                message: "Edge unexpectedly missing".to_owned(),
            }
            .into()
        })
    }

    fn edge_weight_mut(&mut self, edge: EdgeIndex) -> Result<&mut QueryGraphEdge, FederationError> {
        self.graph.edge_weight_mut(edge).ok_or_else(|| {
            SingleFederationError::Internal {
                message: "Edge unexpectedly missing".to_owned(),
            }
            .into()
        })
    }

    pub fn edge_endpoints(&self, edge: EdgeIndex) -> Result<(NodeIndex, NodeIndex), FederationError> {
        self.graph.edge_endpoints(edge).ok_or_else(|| {
            SingleFederationError::Internal {
                message: "Edge unexpectedly missing".to_owned(),
            }
            .into()
        })
    }

    pub fn schema(&self) -> Result<&ValidFederationSchema, FederationError> {
        self.schema_by_source(&self.current_source)
    }

    pub fn schema_by_source(&self, source: &str) -> Result<&ValidFederationSchema, FederationError> {
        self.sources.get(source).ok_or_else(|| {
            SingleFederationError::Internal {
                message: format!("Schema for source \"{source}\" unexpectedly missing"),
            }
            .into()
        })
    }

    pub(crate) fn subgraph_by_name(&self, name: &str) -> Option<&Subgraph> {
        self.subgraphs_by_name.get(name)
    }

    pub(crate) fn subgraphs(&self) -> impl Iterator<Item = &Subgraph> {
        self.subgraphs_by_name.values()
    }

    pub(crate) fn types_to_nodes_by_source(
        &self,
        source: &str,
    ) -> Result<&IndexMap<Name, NodeIndex>, FederationError> {
        self.types_to_nodes_by_source.get(source).ok_or_else(|| {
            SingleFederationError::Internal {
                message: "Types-to-nodes map unexpectedly missing".to_owned(),
            }
            .into()
        })
    }

    pub fn root_kinds_to_nodes(
        &self,
    ) -> Result<&IndexMap<SchemaRootDefinitionKind, NodeIndex>, FederationError> {
        self.root_kinds_to_nodes_by_source(&self.current_source)
    }

    pub(crate) fn root_kinds_to_nodes_by_source(
        &self,
        source: &str,
    ) -> Result<&IndexMap<SchemaRootDefinitionKind, NodeIndex>, FederationError> {
        self.root_kinds_to_nodes_by_source
            .get(source)
            .ok_or_else(|| {
                SingleFederationError::Internal {
                    message: "Root-kinds-to-nodes map unexpectedly missing".to_owned(),
                }
                .into()
            })
    }

    /// The edges going out of `node`, in the order they were added to the graph.
    pub fn out_edges(&self, node: NodeIndex) -> Vec<EdgeReference<'_, QueryGraphEdge>> {
        let mut edges = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .collect::<Vec<_>>();
        // petgraph iterates adjacency lists from the most recently added edge.
        edges.reverse();
        edges
    }

    /// Whether no edge goes out of `node`, which is the case for the nodes of leaf types.
    pub fn is_terminal(&self, node: NodeIndex) -> bool {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .next()
            .is_none()
    }
}
