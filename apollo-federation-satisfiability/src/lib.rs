//! ## Usage
//!
//! This crate validates that a composed (merged) supergraph is *satisfiable*: that every query
//! which can be written against its API can be executed by routing pieces of it to the
//! subgraphs it was composed from. When this is not the case, the first unsatisfiable query path
//! found is reported along with a counter-example query.
//!
//! ```
//! use apollo_federation_satisfiability::Supergraph;
//! use apollo_federation_satisfiability::composition::validate_satisfiability;
//! use apollo_federation_satisfiability::subgraph::Subgraph;
//!
//! let supergraph = Supergraph::new("type Query { a: Int b: Int }").unwrap();
//! let subgraphs = vec![
//!     Subgraph::parse("A", "type Query { a: Int }").unwrap(),
//!     Subgraph::parse("B", "type Query { b: Int }").unwrap(),
//! ];
//! assert!(validate_satisfiability(&supergraph, subgraphs).is_ok());
//! ```
//!
//! ## Crate versioning
//!
//! The `apollo-federation-satisfiability` crate does **not** adhere to
//! [Semantic Versioning](https://semver.org/). Its version number matches exactly that of the
//! `apollo-federation` crate it was derived from.

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

pub mod composition;
mod display_helpers;
pub mod error;
pub mod operation;
pub mod query_graph;
pub mod schema;
pub mod subgraph;
pub(crate) mod utils;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;

use crate::error::FederationError;
use crate::schema::ValidFederationSchema;

/// A composed supergraph, as exposed to clients (i.e. its API schema).
///
/// Merging subgraphs is not done by this crate: the schema is the result of a previous merge.
#[derive(Debug, Clone)]
pub struct Supergraph {
    pub schema: ValidFederationSchema,
}

impl Supergraph {
    pub fn new(schema_str: &str) -> Result<Self, FederationError> {
        let schema = Schema::parse_and_validate(schema_str, "schema.graphql")?;
        Ok(Self::from_schema(schema))
    }

    pub fn from_schema(schema: Valid<Schema>) -> Self {
        Self {
            schema: ValidFederationSchema::new(schema),
        }
    }
}
