use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use indexmap::IndexSet;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::schema::position::CompositeTypeDefinitionPosition;
use crate::schema::position::EnumTypeDefinitionPosition;
use crate::schema::position::InputObjectTypeDefinitionPosition;
use crate::schema::position::InterfaceTypeDefinitionPosition;
use crate::schema::position::ObjectTypeDefinitionPosition;
use crate::schema::position::ScalarTypeDefinitionPosition;
use crate::schema::position::TypeDefinitionPosition;
use crate::schema::position::UnionTypeDefinitionPosition;

pub(crate) mod field_set;
pub mod position;

/// A validated GraphQL schema, shared by every graph, path and selection built from it.
#[derive(Clone)]
pub struct ValidFederationSchema(Arc<Valid<Schema>>);

impl ValidFederationSchema {
    pub fn new(schema: Valid<Schema>) -> Self {
        Self(Arc::new(schema))
    }

    pub fn parse(sdl: &str, path: &str) -> Result<Self, FederationError> {
        let schema = Schema::parse_and_validate(sdl, path)?;
        Ok(Self::new(schema))
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.0
    }

    pub(crate) fn get_type(&self, type_name: Name) -> Result<TypeDefinitionPosition, FederationError> {
        let type_ = self
            .0
            .types
            .get(&type_name)
            .ok_or_else(|| SingleFederationError::Internal {
                message: format!("Schema has no type \"{type_name}\""),
            })?;
        Ok(match type_ {
            ExtendedType::Scalar(_) => ScalarTypeDefinitionPosition { type_name }.into(),
            ExtendedType::Object(_) => ObjectTypeDefinitionPosition { type_name }.into(),
            ExtendedType::Interface(_) => InterfaceTypeDefinitionPosition { type_name }.into(),
            ExtendedType::Union(_) => UnionTypeDefinitionPosition { type_name }.into(),
            ExtendedType::Enum(_) => EnumTypeDefinitionPosition { type_name }.into(),
            ExtendedType::InputObject(_) => InputObjectTypeDefinitionPosition { type_name }.into(),
        })
    }

    pub(crate) fn try_get_type(&self, type_name: Name) -> Option<TypeDefinitionPosition> {
        self.get_type(type_name).ok()
    }

    /// The object types a value of the given composite type may have at runtime, in schema
    /// definition order.
    pub(crate) fn possible_runtime_types(
        &self,
        composite_type_definition_position: CompositeTypeDefinitionPosition,
    ) -> Result<IndexSet<ObjectTypeDefinitionPosition>, FederationError> {
        Ok(match composite_type_definition_position {
            CompositeTypeDefinitionPosition::Object(pos) => IndexSet::from([pos]),
            CompositeTypeDefinitionPosition::Interface(pos) => self
                .0
                .types
                .iter()
                .filter_map(|(type_name, type_)| match type_ {
                    ExtendedType::Object(object_type)
                        if object_type
                            .implements_interfaces
                            .iter()
                            .any(|itf| itf.name == pos.type_name) =>
                    {
                        Some(ObjectTypeDefinitionPosition {
                            type_name: type_name.clone(),
                        })
                    }
                    _ => None,
                })
                .collect(),
            CompositeTypeDefinitionPosition::Union(pos) => pos
                .get(self.schema())?
                .members
                .iter()
                .map(|member| ObjectTypeDefinitionPosition {
                    type_name: member.name.clone(),
                })
                .collect(),
        })
    }

    /// Whether the named type is a scalar or an enum. Unknown names are not leaves.
    pub fn is_leaf_type(&self, type_name: &Name) -> bool {
        matches!(
            self.0.types.get(type_name),
            Some(ExtendedType::Scalar(_) | ExtendedType::Enum(_))
        )
    }
}

impl PartialEq for ValidFederationSchema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ValidFederationSchema {}

impl Debug for ValidFederationSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValidFederationSchema @ {:?}", Arc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use apollo_compiler::name;

    use super::*;

    const SCHEMA: &str = r#"
        type Query {
          node: Node
          search: SearchResult
        }

        interface Node {
          id: ID!
        }

        type User implements Node {
          id: ID!
          role: Role
        }

        type Product implements Node {
          id: ID!
        }

        type Review {
          body: String
        }

        union SearchResult = Review | Product

        enum Role { ADMIN MEMBER }
    "#;

    #[test]
    fn runtime_types_of_abstract_types() {
        let schema = ValidFederationSchema::parse(SCHEMA, "schema.graphql").unwrap();
        let node: CompositeTypeDefinitionPosition = InterfaceTypeDefinitionPosition {
            type_name: name!("Node"),
        }
        .into();
        let implementations = schema
            .possible_runtime_types(node)
            .unwrap()
            .into_iter()
            .map(|pos| pos.type_name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(implementations, ["User", "Product"]);

        let search: CompositeTypeDefinitionPosition = UnionTypeDefinitionPosition {
            type_name: name!("SearchResult"),
        }
        .into();
        let members = schema
            .possible_runtime_types(search)
            .unwrap()
            .into_iter()
            .map(|pos| pos.type_name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(members, ["Review", "Product"]);
    }

    #[test]
    fn leaf_types() {
        let schema = ValidFederationSchema::parse(SCHEMA, "schema.graphql").unwrap();
        assert!(schema.is_leaf_type(&name!("Role")));
        assert!(schema.is_leaf_type(&name!("ID")));
        assert!(!schema.is_leaf_type(&name!("User")));
        assert!(!schema.is_leaf_type(&name!("Missing")));
        assert!(schema.get_type(name!("Missing")).unwrap_err().is_internal());
    }
}
