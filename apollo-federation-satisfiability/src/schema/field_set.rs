use apollo_compiler::executable::FieldSet;
use apollo_compiler::schema::NamedType;

use crate::error::FederationError;
use crate::error::MultipleFederationErrors;
use crate::error::SingleFederationError;
use crate::operation::SelectionSet;
use crate::schema::ValidFederationSchema;

// Field set strings are parsed with the regular selection set grammar, which allows aliases. The
// directives taking field sets do not, so they're rejected here.
fn check_absence_of_aliases(
    field_set: &apollo_compiler::executable::SelectionSet,
    errors: &mut MultipleFederationErrors,
) {
    for selection in &field_set.selections {
        match selection {
            apollo_compiler::executable::Selection::Field(field) => {
                if let Some(alias) = &field.alias {
                    errors.push(
                        SingleFederationError::InvalidSubgraph {
                            message: format!(
                                r#"Cannot use alias "{alias}" in field set: aliases are not supported"#
                            ),
                        }
                        .into(),
                    );
                }
                check_absence_of_aliases(&field.selection_set, errors);
            }
            apollo_compiler::executable::Selection::InlineFragment(inline_fragment) => {
                check_absence_of_aliases(&inline_fragment.selection_set, errors);
            }
            apollo_compiler::executable::Selection::FragmentSpread(_) => {}
        }
    }
}

/// Parses and validates a field set (the `fields` argument of `@key` or `@requires`) against
/// `schema`, relative to the type `parent_type_name`.
pub(crate) fn parse_field_set(
    schema: &ValidFederationSchema,
    parent_type_name: NamedType,
    field_set: &str,
) -> Result<SelectionSet, FederationError> {
    // Curly braces are optional in field sets, the parser deals with both forms.
    let field_set = FieldSet::parse_and_validate(
        schema.schema(),
        parent_type_name,
        field_set,
        "field_set.graphql",
    )?;

    let mut errors = MultipleFederationErrors { errors: vec![] };
    check_absence_of_aliases(&field_set.selection_set, &mut errors);
    errors.into_result()?;

    SelectionSet::from_selection_set(&field_set.selection_set, schema)
}
