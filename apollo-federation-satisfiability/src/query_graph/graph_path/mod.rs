use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use indexmap::IndexSet;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::display_helpers::DisplaySlice;
use crate::ensure;
use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphNode;
use crate::query_graph::condition_resolver::ConditionResolution;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::condition_resolver::ExcludedEdges;
use crate::schema::position::SchemaRootDefinitionKind;

pub mod operation;
pub mod transition;

/// An immutable path in a query graph.
///
/// A "path" here is mostly understood in the graph-theoretical sense of the term, i.e. as "a
/// connected series of edges", and a `GraphPath` is generated by traversing a query graph.
///
/// But as we usually traverse a query graph to validate something, each edge taken is associated
/// with the "trigger" that made us take it: a supergraph transition for [`TransitionGraphPath`]s,
/// an operation element for [`OpGraphPath`]s.
///
/// Paths are persistent: adding an edge shares every previous element with the original path, so
/// that the many paths a traversal keeps alive stay cheap.
///
/// [`TransitionGraphPath`]: transition::TransitionGraphPath
/// [`OpGraphPath`]: operation::OpGraphPath
pub struct GraphPath<TTrigger> {
    /// The query graph of which this is a path.
    graph: Arc<QueryGraph>,
    /// The node at which the path starts.
    head: NodeIndex,
    /// The node at which the path stops. This is the tail of the last edge, or `head` for paths
    /// without edges.
    tail: NodeIndex,
    last_element: Option<Arc<GraphPathElement<TTrigger>>>,
    /// The number of edges in the path.
    size: usize,
    /// Whether some edge of the path reached a node already visited since the last free
    /// transition. Once set, it stays set for all extensions of the path.
    has_cycled: bool,
}

struct GraphPathElement<TTrigger> {
    previous: Option<Arc<GraphPathElement<TTrigger>>>,
    edge: EdgeIndex,
    trigger: Arc<TTrigger>,
    tail: NodeIndex,
    /// Whether the edge is a free transition, after which nodes may be visited again.
    starts_segment: bool,
}

impl<TTrigger> Clone for GraphPath<TTrigger> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            head: self.head,
            tail: self.tail,
            last_element: self.last_element.clone(),
            size: self.size,
            has_cycled: self.has_cycled,
        }
    }
}

impl<TTrigger> GraphPath<TTrigger> {
    /// Creates an empty path starting (and ending) at `head`.
    pub fn new(graph: Arc<QueryGraph>, head: NodeIndex) -> Result<Self, FederationError> {
        graph.node_weight(head)?;
        Ok(Self {
            graph,
            head,
            tail: head,
            last_element: None,
            size: 0,
            has_cycled: false,
        })
    }

    /// Creates an empty path starting at the root node of the given kind.
    pub fn from_graph_root(
        graph: Arc<QueryGraph>,
        root_kind: SchemaRootDefinitionKind,
    ) -> Result<Self, FederationError> {
        let root = *graph.root_kinds_to_nodes()?.get(&root_kind).ok_or_else(|| {
            SingleFederationError::Internal {
                message: format!(
                    "Query graph \"{}\" has no {root_kind} root",
                    graph.name()
                ),
            }
        })?;
        Self::new(graph, root)
    }

    pub fn graph(&self) -> &Arc<QueryGraph> {
        &self.graph
    }

    pub fn head(&self) -> NodeIndex {
        self.head
    }

    pub fn tail(&self) -> NodeIndex {
        self.tail
    }

    pub fn head_node(&self) -> Result<&QueryGraphNode, FederationError> {
        self.graph.node_weight(self.head)
    }

    pub fn tail_node(&self) -> Result<&QueryGraphNode, FederationError> {
        self.graph.node_weight(self.tail)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn has_just_cycled(&self) -> bool {
        self.has_cycled
    }

    /// Whether the path ends on a node with no outgoing edges (a leaf type).
    pub fn is_terminal(&self) -> bool {
        self.graph.is_terminal(self.tail)
    }

    /// The edges going out of the tail, in graph order.
    pub fn next_edges(&self) -> Vec<EdgeIndex> {
        self.graph
            .out_edges(self.tail)
            .into_iter()
            .map(|edge_ref| edge_ref.id())
            .collect()
    }

    /// The edges of the path, in order, along with the trigger of each.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeIndex, &TTrigger)> {
        let mut elements = Vec::with_capacity(self.size);
        let mut current = self.last_element.as_deref();
        while let Some(element) = current {
            elements.push(element);
            current = element.previous.as_deref();
        }
        elements
            .into_iter()
            .rev()
            .map(|element| (element.edge, &*element.trigger))
    }

    /// Returns a new path made of this path followed by `edge`, taken because of `trigger`.
    pub(crate) fn add(&self, trigger: TTrigger, edge: EdgeIndex) -> Result<Self, FederationError> {
        let (edge_head, edge_tail) = self.graph.edge_endpoints(edge)?;
        ensure!(
            edge_head == self.tail,
            "Cannot add edge {} to a path ending at {}",
            self.graph.edge_weight(edge)?,
            self.tail_node()?,
        );
        let starts_segment = matches!(
            self.graph.edge_weight(edge)?.transition,
            QueryGraphEdgeTransition::FreeTransition
        );
        let has_cycled =
            self.has_cycled || (!starts_segment && self.visited_in_segment(edge_tail));
        Ok(Self {
            graph: self.graph.clone(),
            head: self.head,
            tail: edge_tail,
            last_element: Some(Arc::new(GraphPathElement {
                previous: self.last_element.clone(),
                edge,
                trigger: Arc::new(trigger),
                tail: edge_tail,
                starts_segment,
            })),
            size: self.size + 1,
            has_cycled,
        })
    }

    /// Whether `node` was visited since the start of the path or its last free transition.
    fn visited_in_segment(&self, node: NodeIndex) -> bool {
        let mut current = self.last_element.as_deref();
        while let Some(element) = current {
            if element.tail == node {
                return true;
            }
            if element.starts_segment {
                return false;
            }
            current = element.previous.as_deref();
        }
        self.head == node
    }
}

/// The result of [`GraphPath::indirect_paths`].
pub(crate) struct IndirectPaths<TTrigger> {
    pub(crate) paths: Vec<GraphPath<TTrigger>>,
    /// The non-collecting edges that could not be taken because of their conditions.
    pub(crate) dead_ends: Vec<EdgeIndex>,
}

impl<TTrigger: From<QueryGraphEdgeTransition>> GraphPath<TTrigger> {
    /// The paths continuing this one with only non-collecting edges (keys and root type edges)
    /// whose conditions are satisfiable, entering each subgraph at most once. Excluded edges are
    /// never taken.
    pub(crate) fn indirect_paths(
        &self,
        condition_resolver: &mut impl ConditionResolver,
        excluded_edges: &ExcludedEdges,
    ) -> Result<IndirectPaths<TTrigger>, FederationError> {
        let mut paths = Vec::new();
        let mut dead_ends = Vec::new();
        let start_source = self.tail_node()?.source.clone();
        let mut stack = vec![(self.clone(), IndexSet::from([start_source]))];
        while let Some((path, visited_sources)) = stack.pop() {
            for edge in path.next_edges() {
                let edge_weight = self.graph.edge_weight(edge)?;
                if edge_weight.transition.collect_operation_elements()
                    || excluded_edges.contains(edge)
                {
                    continue;
                }
                let (_, tail) = self.graph.edge_endpoints(edge)?;
                let tail_source = &self.graph.node_weight(tail)?.source;
                if visited_sources.contains(tail_source) {
                    continue;
                }
                match condition_resolver.resolve(edge, excluded_edges)? {
                    ConditionResolution::Satisfied => {
                        let new_path = path.add(edge_weight.transition.clone().into(), edge)?;
                        // Jumping back to a node the path already went through gains nothing.
                        if new_path.has_just_cycled() && !path.has_just_cycled() {
                            continue;
                        }
                        let mut new_visited_sources = visited_sources.clone();
                        new_visited_sources.insert(tail_source.clone());
                        paths.push(new_path.clone());
                        stack.push((new_path, new_visited_sources));
                    }
                    ConditionResolution::Unsatisfied => dead_ends.push(edge),
                }
            }
        }
        Ok(IndirectPaths { paths, dead_ends })
    }
}

impl<TTrigger: Display> Display for GraphPath<TTrigger> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let head = self.head_node().map_err(|_| std::fmt::Error)?;
        write!(f, "{head}")?;
        for (edge, trigger) in self.iter() {
            let (_, tail) = self.graph.edge_endpoints(edge).map_err(|_| std::fmt::Error)?;
            let tail = self.graph.node_weight(tail).map_err(|_| std::fmt::Error)?;
            write!(f, " --[{trigger}]--> {tail}")?;
        }
        Ok(())
    }
}

impl<TTrigger: Display> Debug for GraphPath<TTrigger> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unadvanceables(pub(crate) Vec<Unadvanceable>);

impl Unadvanceables {
    pub fn iter(&self) -> impl Iterator<Item = &Unadvanceable> {
        self.0.iter()
    }
}

impl Display for Unadvanceables {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        DisplaySlice(&self.0).fmt(f)
    }
}

/// Why a subgraph path could not follow a supergraph transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unadvanceable {
    pub(crate) reason: UnadvanceableReason,
    pub(crate) from_subgraph: Arc<str>,
    pub(crate) to_subgraph: Arc<str>,
    pub(crate) details: String,
}

impl Unadvanceable {
    pub fn reason(&self) -> &UnadvanceableReason {
        &self.reason
    }

    /// Returns the subgraph from which the path was trying to advance.
    pub fn source_subgraph(&self) -> &str {
        &self.from_subgraph
    }

    /// Returns the subgraph into which the path was trying to advance.
    pub fn dest_subgraph(&self) -> &str {
        &self.to_subgraph
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}

impl Display for Unadvanceable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]({}->{}) {}",
            self.reason, self.from_subgraph, self.to_subgraph, self.details
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, strum_macros::Display, Serialize)]
pub enum UnadvanceableReason {
    /// No edge of the subgraph matches the transition (missing or @external field, missing type).
    NoMatchingTransition,
    /// The subgraph defining the field cannot be reached, as its type has no resolvable key there.
    UnreachableType,
    UnsatisfiableKeyCondition,
    UnsatisfiableRequiresCondition,
}
