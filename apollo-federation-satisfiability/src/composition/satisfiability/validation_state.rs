use std::fmt::Display;
use std::sync::Arc;

use either::Either;
use indexmap::IndexSet;
use itertools::Itertools;
use petgraph::graph::EdgeIndex;
use petgraph::visit::EdgeRef;

use crate::bail;
use crate::composition::satisfiability::satisfiability_error::ValidationError;
use crate::ensure;
use crate::error::FederationError;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphNode;
use crate::query_graph::QueryGraphNodeType;
use crate::query_graph::condition_resolver::ConditionResolver;
use crate::query_graph::graph_path::transition::TransitionGraphPath;
use crate::query_graph::graph_path::transition::dedup_by_tail;
use crate::schema::position::SchemaRootDefinitionKind;

/// A step of the validation traversal: a path in the supergraph, along with all the subgraph paths
/// which may be used to resolve it.
#[derive(Debug, Clone)]
pub struct ValidationState {
    /// Path in the supergraph (i.e. the API schema query graph) corresponding to the current state.
    supergraph_path: TransitionGraphPath,
    /// All the possible paths we could be in the subgraphs.
    subgraph_paths: Vec<TransitionGraphPath>,
}

impl ValidationState {
    /// The state at the root of the given kind: every subgraph having such a root may be where
    /// execution starts.
    pub fn new(
        api_schema_query_graph: Arc<QueryGraph>,
        federated_query_graph: Arc<QueryGraph>,
        root_kind: SchemaRootDefinitionKind,
    ) -> Result<Self, FederationError> {
        let Some(federated_root_node) =
            federated_query_graph.root_kinds_to_nodes()?.get(&root_kind)
        else {
            bail!(
                "The supergraph shouldn't have a {} root if no subgraphs have one",
                root_kind
            );
        };
        let federated_root_node_weight = federated_query_graph.node_weight(*federated_root_node)?;
        ensure!(
            federated_root_node_weight.type_ == QueryGraphNodeType::FederatedRootType(root_kind),
            "Unexpected node type {} for federated query graph root (expected {})",
            federated_root_node_weight.type_,
            QueryGraphNodeType::FederatedRootType(root_kind),
        );
        let initial_subgraph_path =
            TransitionGraphPath::from_graph_root(federated_query_graph.clone(), root_kind)?;
        let subgraph_paths: Vec<_> = federated_query_graph
            .out_edges(*federated_root_node)
            .into_iter()
            .map(|edge_ref| {
                initial_subgraph_path.add(edge_ref.weight().transition.clone(), edge_ref.id())
            })
            .process_results(|iter| iter.collect())?;
        Self::from_paths(
            TransitionGraphPath::from_graph_root(api_schema_query_graph, root_kind)?,
            subgraph_paths,
        )
    }

    /// Pairs a supergraph path with the subgraph paths mirroring it. There must be at least one of
    /// those, and all of them must end on the type the supergraph path ends on.
    pub(crate) fn from_paths(
        supergraph_path: TransitionGraphPath,
        subgraph_paths: Vec<TransitionGraphPath>,
    ) -> Result<Self, FederationError> {
        ensure!(
            !subgraph_paths.is_empty(),
            "Supergraph path {} has no subgraph path",
            supergraph_path,
        );
        let supergraph_tail = supergraph_path.tail_node()?;
        for subgraph_path in &subgraph_paths {
            let subgraph_tail = subgraph_path.tail_node()?;
            ensure!(
                is_same_type(supergraph_tail, subgraph_tail),
                "Subgraph path {} doesn't end on the type of supergraph path {}",
                subgraph_path,
                supergraph_path,
            );
        }
        Ok(Self {
            supergraph_path,
            subgraph_paths,
        })
    }

    pub fn supergraph_path(&self) -> &TransitionGraphPath {
        &self.supergraph_path
    }

    pub fn subgraph_paths(&self) -> &[TransitionGraphPath] {
        &self.subgraph_paths
    }

    /// Validates that the current state can always be advanced for the provided supergraph edge,
    /// and returns the updated state if so, or the error explaining why otherwise.
    pub(crate) fn validate_transition(
        &self,
        supergraph_edge: EdgeIndex,
        condition_resolver: &mut impl ConditionResolver,
    ) -> Result<Either<ValidationState, ValidationError>, FederationError> {
        let edge_weight = self.supergraph_path.graph().edge_weight(supergraph_edge)?;
        ensure!(
            edge_weight.conditions.is_none(),
            "Supergraph edges should not have conditions ({})",
            edge_weight,
        );
        let transition = &edge_weight.transition;
        let new_supergraph_path = self
            .supergraph_path
            .add(transition.clone(), supergraph_edge)?;

        let mut new_subgraph_paths = Vec::new();
        let mut dead_ends = Vec::new();
        for path in &self.subgraph_paths {
            match path.advance_with_transition(transition, condition_resolver)? {
                Either::Left(options) => new_subgraph_paths.extend(options),
                Either::Right(unadvanceables) => dead_ends.push(unadvanceables),
            }
        }

        if new_subgraph_paths.is_empty() {
            // The subgraph paths from before the transition show where the subgraphs got stuck.
            return Ok(Either::Right(ValidationError::new(
                new_supergraph_path,
                self.subgraph_paths.clone(),
                dead_ends,
            )?));
        }

        Ok(Either::Left(Self::from_paths(
            new_supergraph_path,
            dedup_by_tail(new_subgraph_paths),
        )?))
    }

    /// Whether any of the subgraph paths went back to a node it already visited. Expanding such a
    /// state any further would only redo work done for an earlier state.
    pub fn has_cycled(&self) -> bool {
        self.subgraph_paths.iter().any(|path| path.has_just_cycled())
    }

    /// The names of the subgraphs the subgraph paths currently end in.
    pub fn current_subgraph_names(&self) -> Result<IndexSet<Arc<str>>, FederationError> {
        self.subgraph_paths
            .iter()
            .map(|path| Ok(path.tail_node()?.source.clone()))
            .process_results(|iter| iter.collect())
    }
}

/// Root nodes are compared by root kind, since subgraphs may name their root types differently.
fn is_same_type(supergraph_node: &QueryGraphNode, subgraph_node: &QueryGraphNode) -> bool {
    match (supergraph_node.root_kind, subgraph_node.root_kind) {
        (Some(supergraph_root_kind), Some(subgraph_root_kind)) => {
            supergraph_root_kind == subgraph_root_kind
        }
        _ => supergraph_node.type_name() == subgraph_node.type_name(),
    }
}

impl Display for ValidationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.supergraph_path.fmt(f)?;
        write!(f, " <=> ")?;
        let mut iter = self.subgraph_paths.iter();
        if let Some(first_path) = iter.next() {
            first_path.fmt(f)?;
            for path in iter {
                write!(f, ", ")?;
                path.fmt(f)?;
            }
        }
        Ok(())
    }
}
