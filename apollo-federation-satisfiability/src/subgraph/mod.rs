use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast::Directive;
use apollo_compiler::ast::Value;
use apollo_compiler::schema::DirectiveList;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::DiagnosticList;
use indexmap::IndexSet;

use crate::error::FederationError;
use crate::error::SingleFederationError;
use crate::operation::Selection;
use crate::schema::ValidFederationSchema;
use crate::schema::field_set::parse_field_set;
use crate::schema::position::FieldDefinitionPosition;

pub(crate) const KEY_DIRECTIVE_NAME: &str = "key";
pub(crate) const REQUIRES_DIRECTIVE_NAME: &str = "requires";
pub(crate) const EXTERNAL_DIRECTIVE_NAME: &str = "external";
const FIELDS_ARGUMENT_NAME: &str = "fields";
const RESOLVABLE_ARGUMENT_NAME: &str = "resolvable";

const FIELD_SET_SCALAR_NAME: &str = "federation__FieldSet";

/// Definitions of the federation directives a subgraph may apply, keyed by the name they define.
/// Subgraphs don't have to define them, and any they do define take precedence.
const FEDERATION_DEFINITIONS: [(&str, &str); 6] = [
    (FIELD_SET_SCALAR_NAME, "scalar federation__FieldSet"),
    (
        KEY_DIRECTIVE_NAME,
        "directive @key(fields: federation__FieldSet!, resolvable: Boolean = true) repeatable on OBJECT | INTERFACE",
    ),
    (
        REQUIRES_DIRECTIVE_NAME,
        "directive @requires(fields: federation__FieldSet!) on FIELD_DEFINITION",
    ),
    (
        "provides",
        "directive @provides(fields: federation__FieldSet!) on FIELD_DEFINITION",
    ),
    (
        EXTERNAL_DIRECTIVE_NAME,
        "directive @external on OBJECT | FIELD_DEFINITION",
    ),
    (
        "shareable",
        "directive @shareable repeatable on OBJECT | FIELD_DEFINITION",
    ),
];

/// Subgraphs only exposing entities still get a query root (as federation adds `_service` and
/// `_entities` to every subgraph).
const SERVICE_QUERY_ROOT: &str = r#"
type Query {
  _service: _Service!
}

type _Service {
  sdl: String
}
"#;

/// A validated subgraph schema, along with the name identifying it.
#[derive(Clone)]
pub struct Subgraph {
    pub name: Arc<str>,
    pub schema: ValidFederationSchema,
}

impl Subgraph {
    /// Parses and validates the SDL of a subgraph, adding the definitions of the federation
    /// directives it uses but doesn't define.
    pub fn parse(name: &str, schema_str: &str) -> Result<Self, FederationError> {
        let partial = Schema::builder()
            .adopt_orphan_extensions()
            .parse(schema_str, name)
            .build()
            .map_err(|e| invalid_subgraph(name, e.errors))?;

        let mut missing_definitions = FEDERATION_DEFINITIONS
            .iter()
            .filter(|(defined_name, _)| {
                !partial.directive_definitions.contains_key(*defined_name)
                    && !partial.types.contains_key(*defined_name)
            })
            .map(|(_, definition)| *definition)
            .collect::<Vec<_>>()
            .join("\n");
        if partial.schema_definition.query.is_none() && !partial.types.contains_key("Query") {
            missing_definitions.push_str(SERVICE_QUERY_ROOT);
        }

        let mut builder = Schema::builder()
            .adopt_orphan_extensions()
            .parse(schema_str, name);
        if !missing_definitions.is_empty() {
            builder = builder.parse(missing_definitions, "federation_definitions.graphql");
        }
        let schema = builder
            .build()
            .map_err(|e| invalid_subgraph(name, e.errors))?
            .validate()
            .map_err(|e| invalid_subgraph(name, e.errors))?;
        Ok(Self {
            name: name.into(),
            schema: ValidFederationSchema::new(schema),
        })
    }

    /// The field sets of the `@key`s applied to the given type that can be used to resolve it in
    /// this subgraph, i.e. all the keys not declared with `resolvable: false`.
    pub(crate) fn resolvable_keys(&self, type_name: &Name) -> Result<Vec<String>, FederationError> {
        let Some(directives) = self.type_directives(type_name) else {
            return Ok(vec![]);
        };
        let mut keys = vec![];
        for application in directives.get_all(KEY_DIRECTIVE_NAME) {
            let resolvable = !matches!(
                application
                    .specified_argument_by_name(RESOLVABLE_ARGUMENT_NAME)
                    .map(|value| &**value),
                Some(Value::Boolean(false))
            );
            if resolvable {
                keys.push(self.fields_argument(application, type_name)?);
            }
        }
        Ok(keys)
    }

    /// Whether the given type has at least one `@key`, resolvable or not.
    pub(crate) fn is_entity(&self, type_name: &Name) -> bool {
        self.type_directives(type_name)
            .is_some_and(|directives| directives.has(KEY_DIRECTIVE_NAME))
    }

    /// The field set of the `@requires` applied to the given field, if any.
    pub(crate) fn requires_fields(
        &self,
        field_definition_position: &FieldDefinitionPosition,
    ) -> Result<Option<String>, FederationError> {
        let field = field_definition_position.get(self.schema.schema())?;
        let Some(application) = field.directives.get(REQUIRES_DIRECTIVE_NAME) else {
            return Ok(None);
        };
        Ok(Some(self.fields_argument(
            application,
            field_definition_position.type_name(),
        )?))
    }

    /// Whether the given field is `@external`, either directly or because its type is.
    pub(crate) fn is_external(
        &self,
        field_definition_position: &FieldDefinitionPosition,
    ) -> Result<bool, FederationError> {
        let field = field_definition_position.get(self.schema.schema())?;
        Ok(field.directives.has(EXTERNAL_DIRECTIVE_NAME)
            || self
                .type_directives(field_definition_position.type_name())
                .is_some_and(|directives| directives.has(EXTERNAL_DIRECTIVE_NAME)))
    }

    /// The top-level fields of the `@key`s of the given type (resolvable or not) that are marked
    /// `@external`. Such keys usually come from a type extension which lost its `extend` keyword.
    pub(crate) fn external_key_fields(
        &self,
        type_name: &Name,
    ) -> Result<IndexSet<Name>, FederationError> {
        let mut external_fields = IndexSet::new();
        let Some(directives) = self.type_directives(type_name) else {
            return Ok(external_fields);
        };
        for application in directives.get_all(KEY_DIRECTIVE_NAME) {
            let fields = self.fields_argument(application, type_name)?;
            let selection_set = parse_field_set(&self.schema, type_name.clone(), &fields)?;
            for selection in selection_set.iter() {
                let Selection::Field(field_selection) = selection else {
                    continue;
                };
                if self.is_external(field_selection.field().field_position())? {
                    external_fields.insert(field_selection.field().name().clone());
                }
            }
        }
        Ok(external_fields)
    }

    fn type_directives(&self, type_name: &Name) -> Option<&DirectiveList> {
        match self.schema.schema().types.get(type_name)? {
            ExtendedType::Object(object_type) => Some(&object_type.directives),
            ExtendedType::Interface(interface_type) => Some(&interface_type.directives),
            _ => None,
        }
    }

    // The schema was validated, so the argument is always there. It may still not be a string,
    // as any value is accepted for the custom field set scalar.
    fn fields_argument(
        &self,
        application: &Directive,
        element_name: &Name,
    ) -> Result<String, FederationError> {
        application
            .specified_argument_by_name(FIELDS_ARGUMENT_NAME)
            .and_then(|value| value.as_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                SingleFederationError::InvalidSubgraph {
                    message: format!(
                        "[{}] @{} on \"{element_name}\" must have a string \"fields\" argument",
                        self.name, application.name,
                    ),
                }
                .into()
            })
    }
}

fn invalid_subgraph(name: &str, diagnostics: DiagnosticList) -> FederationError {
    SingleFederationError::InvalidSubgraph {
        message: format!("[{name}] {diagnostics}"),
    }
    .into()
}

impl Debug for Subgraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, r#"name: {}, schema: {:?}"#, self.name, self.schema)
    }
}
