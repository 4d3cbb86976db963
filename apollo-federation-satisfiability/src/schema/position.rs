use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::EnumType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::InputObjectType;
use apollo_compiler::schema::InterfaceType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::UnionType;
use serde::Serialize;

use crate::error::FederationError;
use crate::error::SingleFederationError;

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::EnumIter,
    Serialize,
)]
pub enum SchemaRootDefinitionKind {
    #[strum(to_string = "query")]
    Query,
    #[strum(to_string = "mutation")]
    Mutation,
    #[strum(to_string = "subscription")]
    Subscription,
}

impl From<SchemaRootDefinitionKind> for ast::OperationType {
    fn from(value: SchemaRootDefinitionKind) -> Self {
        match value {
            SchemaRootDefinitionKind::Query => ast::OperationType::Query,
            SchemaRootDefinitionKind::Mutation => ast::OperationType::Mutation,
            SchemaRootDefinitionKind::Subscription => ast::OperationType::Subscription,
        }
    }
}

impl From<ast::OperationType> for SchemaRootDefinitionKind {
    fn from(value: ast::OperationType) -> Self {
        match value {
            ast::OperationType::Query => SchemaRootDefinitionKind::Query,
            ast::OperationType::Mutation => SchemaRootDefinitionKind::Mutation,
            ast::OperationType::Subscription => SchemaRootDefinitionKind::Subscription,
        }
    }
}

fn missing_type(type_name: &Name, kind: &str) -> FederationError {
    SingleFederationError::Internal {
        message: format!("Schema has no {kind} type \"{type_name}\""),
    }
    .into()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScalarTypeDefinitionPosition {
    pub type_name: Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectTypeDefinitionPosition {
    pub type_name: Name,
}

impl ObjectTypeDefinitionPosition {
    pub fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Node<ObjectType>, FederationError> {
        schema
            .get_object(&self.type_name)
            .ok_or_else(|| missing_type(&self.type_name, "object"))
    }

    pub fn field(&self, field_name: Name) -> ObjectFieldDefinitionPosition {
        ObjectFieldDefinitionPosition {
            type_name: self.type_name.clone(),
            field_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceTypeDefinitionPosition {
    pub type_name: Name,
}

impl InterfaceTypeDefinitionPosition {
    pub fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Node<InterfaceType>, FederationError> {
        schema
            .get_interface(&self.type_name)
            .ok_or_else(|| missing_type(&self.type_name, "interface"))
    }

    pub fn field(&self, field_name: Name) -> InterfaceFieldDefinitionPosition {
        InterfaceFieldDefinitionPosition {
            type_name: self.type_name.clone(),
            field_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnionTypeDefinitionPosition {
    pub type_name: Name,
}

impl UnionTypeDefinitionPosition {
    pub fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Node<UnionType>, FederationError> {
        schema
            .get_union(&self.type_name)
            .ok_or_else(|| missing_type(&self.type_name, "union"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumTypeDefinitionPosition {
    pub type_name: Name,
}

impl EnumTypeDefinitionPosition {
    pub fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Node<EnumType>, FederationError> {
        schema
            .get_enum(&self.type_name)
            .ok_or_else(|| missing_type(&self.type_name, "enum"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputObjectTypeDefinitionPosition {
    pub type_name: Name,
}

impl InputObjectTypeDefinitionPosition {
    pub fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Node<InputObjectType>, FederationError> {
        schema
            .get_input_object(&self.type_name)
            .ok_or_else(|| missing_type(&self.type_name, "input object"))
    }
}

macro_rules! impl_display_type_name {
    ( $( $ty:ty ),+ ) => {
        $(
            impl Display for $ty {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.type_name)
                }
            }
        )+
    }
}

impl_display_type_name!(
    ScalarTypeDefinitionPosition,
    ObjectTypeDefinitionPosition,
    InterfaceTypeDefinitionPosition,
    UnionTypeDefinitionPosition,
    EnumTypeDefinitionPosition,
    InputObjectTypeDefinitionPosition
);

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::From)]
pub enum TypeDefinitionPosition {
    Scalar(ScalarTypeDefinitionPosition),
    Object(ObjectTypeDefinitionPosition),
    Interface(InterfaceTypeDefinitionPosition),
    Union(UnionTypeDefinitionPosition),
    Enum(EnumTypeDefinitionPosition),
    InputObject(InputObjectTypeDefinitionPosition),
}

impl TypeDefinitionPosition {
    pub fn type_name(&self) -> &Name {
        match self {
            TypeDefinitionPosition::Scalar(type_) => &type_.type_name,
            TypeDefinitionPosition::Object(type_) => &type_.type_name,
            TypeDefinitionPosition::Interface(type_) => &type_.type_name,
            TypeDefinitionPosition::Union(type_) => &type_.type_name,
            TypeDefinitionPosition::Enum(type_) => &type_.type_name,
            TypeDefinitionPosition::InputObject(type_) => &type_.type_name,
        }
    }
}

impl Display for TypeDefinitionPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.type_name().fmt(f)
    }
}

/// The named types that may appear as the (base) type of a field, i.e. every type but input
/// objects. Query graph nodes point to such types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::From)]
pub enum OutputTypeDefinitionPosition {
    Scalar(ScalarTypeDefinitionPosition),
    Object(ObjectTypeDefinitionPosition),
    Interface(InterfaceTypeDefinitionPosition),
    Union(UnionTypeDefinitionPosition),
    Enum(EnumTypeDefinitionPosition),
}

impl OutputTypeDefinitionPosition {
    pub fn type_name(&self) -> &Name {
        match self {
            OutputTypeDefinitionPosition::Scalar(type_) => &type_.type_name,
            OutputTypeDefinitionPosition::Object(type_) => &type_.type_name,
            OutputTypeDefinitionPosition::Interface(type_) => &type_.type_name,
            OutputTypeDefinitionPosition::Union(type_) => &type_.type_name,
            OutputTypeDefinitionPosition::Enum(type_) => &type_.type_name,
        }
    }

    pub fn is_leaf_type(&self) -> bool {
        matches!(
            self,
            OutputTypeDefinitionPosition::Scalar(_) | OutputTypeDefinitionPosition::Enum(_)
        )
    }
}

impl Display for OutputTypeDefinitionPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.type_name().fmt(f)
    }
}

impl TryFrom<TypeDefinitionPosition> for OutputTypeDefinitionPosition {
    type Error = FederationError;

    fn try_from(value: TypeDefinitionPosition) -> Result<Self, Self::Error> {
        Ok(match value {
            TypeDefinitionPosition::Scalar(type_) => type_.into(),
            TypeDefinitionPosition::Object(type_) => type_.into(),
            TypeDefinitionPosition::Interface(type_) => type_.into(),
            TypeDefinitionPosition::Union(type_) => type_.into(),
            TypeDefinitionPosition::Enum(type_) => type_.into(),
            TypeDefinitionPosition::InputObject(type_) => {
                return Err(SingleFederationError::Internal {
                    message: format!("Type \"{type_}\" is an input object, not an output type"),
                }
                .into());
            }
        })
    }
}

/// Object, interface and union types: the types that have selection sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::From)]
pub enum CompositeTypeDefinitionPosition {
    Object(ObjectTypeDefinitionPosition),
    Interface(InterfaceTypeDefinitionPosition),
    Union(UnionTypeDefinitionPosition),
}

impl CompositeTypeDefinitionPosition {
    pub fn type_name(&self) -> &Name {
        match self {
            CompositeTypeDefinitionPosition::Object(type_) => &type_.type_name,
            CompositeTypeDefinitionPosition::Interface(type_) => &type_.type_name,
            CompositeTypeDefinitionPosition::Union(type_) => &type_.type_name,
        }
    }

    pub fn is_abstract_type(&self) -> bool {
        !matches!(self, CompositeTypeDefinitionPosition::Object(_))
    }

    /// The position of the field of the given name in this type. Unions have no fields (outside
    /// of `__typename`, which has no position).
    pub fn field(&self, field_name: Name) -> Result<FieldDefinitionPosition, FederationError> {
        match self {
            CompositeTypeDefinitionPosition::Object(type_) => Ok(type_.field(field_name).into()),
            CompositeTypeDefinitionPosition::Interface(type_) => {
                Ok(type_.field(field_name).into())
            }
            CompositeTypeDefinitionPosition::Union(type_) => Err(SingleFederationError::Internal {
                message: format!("Union type \"{type_}\" has no field \"{field_name}\""),
            }
            .into()),
        }
    }
}

impl Display for CompositeTypeDefinitionPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.type_name().fmt(f)
    }
}

impl TryFrom<OutputTypeDefinitionPosition> for CompositeTypeDefinitionPosition {
    type Error = FederationError;

    fn try_from(value: OutputTypeDefinitionPosition) -> Result<Self, Self::Error> {
        Ok(match value {
            OutputTypeDefinitionPosition::Object(type_) => type_.into(),
            OutputTypeDefinitionPosition::Interface(type_) => type_.into(),
            OutputTypeDefinitionPosition::Union(type_) => type_.into(),
            _ => {
                return Err(SingleFederationError::Internal {
                    message: format!("Type \"{value}\" is not a composite type"),
                }
                .into());
            }
        })
    }
}

impl TryFrom<TypeDefinitionPosition> for CompositeTypeDefinitionPosition {
    type Error = FederationError;

    fn try_from(value: TypeDefinitionPosition) -> Result<Self, Self::Error> {
        OutputTypeDefinitionPosition::try_from(value)?.try_into()
    }
}

impl From<CompositeTypeDefinitionPosition> for OutputTypeDefinitionPosition {
    fn from(value: CompositeTypeDefinitionPosition) -> Self {
        match value {
            CompositeTypeDefinitionPosition::Object(type_) => type_.into(),
            CompositeTypeDefinitionPosition::Interface(type_) => type_.into(),
            CompositeTypeDefinitionPosition::Union(type_) => type_.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectFieldDefinitionPosition {
    pub type_name: Name,
    pub field_name: Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceFieldDefinitionPosition {
    pub type_name: Name,
    pub field_name: Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::From)]
pub enum FieldDefinitionPosition {
    Object(ObjectFieldDefinitionPosition),
    Interface(InterfaceFieldDefinitionPosition),
}

impl FieldDefinitionPosition {
    pub fn type_name(&self) -> &Name {
        match self {
            FieldDefinitionPosition::Object(field) => &field.type_name,
            FieldDefinitionPosition::Interface(field) => &field.type_name,
        }
    }

    pub fn field_name(&self) -> &Name {
        match self {
            FieldDefinitionPosition::Object(field) => &field.field_name,
            FieldDefinitionPosition::Interface(field) => &field.field_name,
        }
    }

    pub fn parent(&self) -> CompositeTypeDefinitionPosition {
        match self {
            FieldDefinitionPosition::Object(field) => ObjectTypeDefinitionPosition {
                type_name: field.type_name.clone(),
            }
            .into(),
            FieldDefinitionPosition::Interface(field) => InterfaceTypeDefinitionPosition {
                type_name: field.type_name.clone(),
            }
            .into(),
        }
    }

    pub fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Component<FieldDefinition>, FederationError> {
        let fields = match self {
            FieldDefinitionPosition::Object(field) => &ObjectTypeDefinitionPosition {
                type_name: field.type_name.clone(),
            }
            .get(schema)?
            .fields,
            FieldDefinitionPosition::Interface(field) => &InterfaceTypeDefinitionPosition {
                type_name: field.type_name.clone(),
            }
            .get(schema)?
            .fields,
        };
        fields.get(self.field_name()).ok_or_else(|| {
            SingleFederationError::Internal {
                message: format!("Schema has no field \"{self}\""),
            }
            .into()
        })
    }
}

impl Display for FieldDefinitionPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name(), self.field_name())
    }
}
