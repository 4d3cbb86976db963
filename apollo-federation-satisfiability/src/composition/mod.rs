//! Satisfiability validation of composed supergraphs: every query against the supergraph API must
//! be executable by the subgraphs.

pub(crate) mod satisfiability;

pub use crate::composition::satisfiability::SatisfiabilityConfig;
pub use crate::composition::satisfiability::compute_subgraph_paths;
pub use crate::composition::satisfiability::satisfiability_error::ValidationError;
pub use crate::composition::satisfiability::validate_graph_composition;
pub use crate::composition::satisfiability::validate_graph_composition_with_config;
pub use crate::composition::satisfiability::validate_satisfiability;
pub use crate::composition::satisfiability::validation_state::ValidationState;
