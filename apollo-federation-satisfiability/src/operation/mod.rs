//! A small operation document model.
//!
//! Conditions (`@key`/`@requires` field sets) are parsed into [`SelectionSet`]s and walked
//! selection by selection during condition validation, and unsatisfiable supergraph paths are
//! turned into [`Operation`]s for error reporting. Every element points back to schema positions,
//! so that it can be matched against query graph edges directly.

use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::executable;

use crate::bail;
use crate::display_helpers::State;
use crate::display_helpers::write_indented_lines;
use crate::error::FederationError;
use crate::schema::ValidFederationSchema;
use crate::schema::position::CompositeTypeDefinitionPosition;
use crate::schema::position::FieldDefinitionPosition;
use crate::schema::position::SchemaRootDefinitionKind;

/// A field element, without its sub-selections.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) field_position: FieldDefinitionPosition,
    pub(crate) arguments: Arc<Vec<Node<ast::Argument>>>,
}

impl Field {
    pub fn new(field_position: FieldDefinitionPosition) -> Self {
        Self {
            field_position,
            arguments: Default::default(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Node<ast::Argument>>) -> Self {
        self.arguments = Arc::new(arguments);
        self
    }

    pub fn name(&self) -> &Name {
        self.field_position.field_name()
    }

    pub fn field_position(&self) -> &FieldDefinitionPosition {
        &self.field_position
    }

    pub fn arguments(&self) -> &[Node<ast::Argument>] {
        &self.arguments
    }
}

/// A type refinement (`... on T`), without its sub-selections.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub(crate) parent_type_position: CompositeTypeDefinitionPosition,
    pub(crate) type_condition_position: Option<CompositeTypeDefinitionPosition>,
}

impl InlineFragment {
    pub fn new(
        parent_type_position: CompositeTypeDefinitionPosition,
        type_condition_position: Option<CompositeTypeDefinitionPosition>,
    ) -> Self {
        Self {
            parent_type_position,
            type_condition_position,
        }
    }

    pub fn parent_type_position(&self) -> &CompositeTypeDefinitionPosition {
        &self.parent_type_position
    }

    pub fn type_condition_position(&self) -> Option<&CompositeTypeDefinitionPosition> {
        self.type_condition_position.as_ref()
    }

    /// The type the selections inside the fragment apply to.
    pub fn casted_type(&self) -> &CompositeTypeDefinitionPosition {
        self.type_condition_position
            .as_ref()
            .unwrap_or(&self.parent_type_position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelection {
    pub(crate) field: Field,
    /// `None` for leaf fields.
    pub(crate) selection_set: Option<SelectionSet>,
}

impl FieldSelection {
    pub fn new(field: Field, selection_set: Option<SelectionSet>) -> Self {
        Self {
            field,
            selection_set,
        }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn selection_set(&self) -> Option<&SelectionSet> {
        self.selection_set.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragmentSelection {
    pub(crate) inline_fragment: InlineFragment,
    pub(crate) selection_set: SelectionSet,
}

impl InlineFragmentSelection {
    pub fn new(inline_fragment: InlineFragment, selection_set: SelectionSet) -> Self {
        Self {
            inline_fragment,
            selection_set,
        }
    }

    pub fn inline_fragment(&self) -> &InlineFragment {
        &self.inline_fragment
    }

    pub fn selection_set(&self) -> &SelectionSet {
        &self.selection_set
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Selection {
    Field(Arc<FieldSelection>),
    InlineFragment(Arc<InlineFragmentSelection>),
}

impl From<FieldSelection> for Selection {
    fn from(value: FieldSelection) -> Self {
        Self::Field(Arc::new(value))
    }
}

impl From<InlineFragmentSelection> for Selection {
    fn from(value: InlineFragmentSelection) -> Self {
        Self::InlineFragment(Arc::new(value))
    }
}

impl Selection {
    /// The element of this selection, i.e. the step it makes from its parent type.
    pub fn element(&self) -> OpPathElement {
        match self {
            Selection::Field(field_selection) => {
                OpPathElement::Field(field_selection.field.clone())
            }
            Selection::InlineFragment(inline_fragment_selection) => {
                OpPathElement::InlineFragment(inline_fragment_selection.inline_fragment.clone())
            }
        }
    }

    pub fn selection_set(&self) -> Option<&SelectionSet> {
        match self {
            Selection::Field(field_selection) => field_selection.selection_set.as_ref(),
            Selection::InlineFragment(inline_fragment_selection) => {
                Some(&inline_fragment_selection.selection_set)
            }
        }
    }
}

/// An ordered list of selections on a composite type.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet {
    pub(crate) type_position: CompositeTypeDefinitionPosition,
    pub(crate) selections: Arc<Vec<Selection>>,
}

impl SelectionSet {
    /// An empty selection set. It renders as an ellipsis (`...`), meaning "some selection is
    /// needed here, which we do not know".
    pub fn empty(type_position: CompositeTypeDefinitionPosition) -> Self {
        Self {
            type_position,
            selections: Default::default(),
        }
    }

    pub fn from_selection(
        type_position: CompositeTypeDefinitionPosition,
        selection: Selection,
    ) -> Self {
        Self {
            type_position,
            selections: Arc::new(vec![selection]),
        }
    }

    /// Converts a selection set of an executable document, resolving every element against
    /// `schema`. `__typename` selections are dropped since any subgraph can always provide them.
    pub(crate) fn from_selection_set(
        selection_set: &executable::SelectionSet,
        schema: &ValidFederationSchema,
    ) -> Result<Self, FederationError> {
        let type_position: CompositeTypeDefinitionPosition =
            schema.get_type(selection_set.ty.clone())?.try_into()?;
        let mut selections = Vec::with_capacity(selection_set.selections.len());
        for selection in &selection_set.selections {
            match selection {
                executable::Selection::Field(field) => {
                    if field.name.as_str() == "__typename" {
                        continue;
                    }
                    let field_position = type_position.field(field.name.clone())?;
                    let sub_selection_set =
                        if schema.is_leaf_type(field.definition.ty.inner_named_type()) {
                            None
                        } else {
                            Some(Self::from_selection_set(&field.selection_set, schema)?)
                        };
                    let field = Field::new(field_position).with_arguments(field.arguments.clone());
                    selections.push(FieldSelection::new(field, sub_selection_set).into());
                }
                executable::Selection::InlineFragment(inline_fragment) => {
                    let type_condition_position = inline_fragment
                        .type_condition
                        .as_ref()
                        .map(
                            |type_condition| -> Result<CompositeTypeDefinitionPosition, FederationError> {
                                schema.get_type(type_condition.clone())?.try_into()
                            },
                        )
                        .transpose()?;
                    selections.push(
                        InlineFragmentSelection::new(
                            InlineFragment::new(type_position.clone(), type_condition_position),
                            Self::from_selection_set(&inline_fragment.selection_set, schema)?,
                        )
                        .into(),
                    );
                }
                executable::Selection::FragmentSpread(fragment_spread) => {
                    bail!(
                        "Unexpected spread of named fragment \"{}\" in a field set",
                        fragment_spread.fragment_name
                    );
                }
            }
        }
        Ok(Self {
            type_position,
            selections: Arc::new(selections),
        })
    }

    pub fn type_position(&self) -> &CompositeTypeDefinitionPosition {
        &self.type_position
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter()
    }
}

/// A single step of an operation: the element of a [`Selection`], without sub-selections.
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum OpPathElement {
    Field(Field),
    InlineFragment(InlineFragment),
}

/// An operation, i.e. a selection set on one of the schema roots.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub(crate) root_kind: SchemaRootDefinitionKind,
    pub(crate) selection_set: SelectionSet,
    pub(crate) variables: Arc<Vec<Node<executable::VariableDefinition>>>,
}

impl Operation {
    pub fn new(root_kind: SchemaRootDefinitionKind, selection_set: SelectionSet) -> Self {
        Self {
            root_kind,
            selection_set,
            variables: Default::default(),
        }
    }

    pub fn root_kind(&self) -> SchemaRootDefinitionKind {
        self.root_kind
    }

    pub fn selection_set(&self) -> &SelectionSet {
        &self.selection_set
    }

    pub fn variables(&self) -> &[Node<executable::VariableDefinition>] {
        &self.variables
    }
}

// Display implementations for the operation types. `Operation` is pretty-printed over multiple
// lines; everything else is printed on a single line, mostly for logging.

fn write_field(state: &mut State<'_, '_>, field: &Field) -> std::fmt::Result {
    state.write(field.name())?;
    if let Some((first, rest)) = field.arguments.split_first() {
        // Values stay on the line of their field, whatever their size.
        state.write_fmt(format_args!(
            "({}: {}",
            first.name,
            first.value.serialize().no_indent()
        ))?;
        for argument in rest {
            state.write_fmt(format_args!(
                ", {}: {}",
                argument.name,
                argument.value.serialize().no_indent()
            ))?;
        }
        state.write(")")?;
    }
    Ok(())
}

fn write_inline_fragment(
    state: &mut State<'_, '_>,
    inline_fragment: &InlineFragment,
) -> std::fmt::Result {
    match &inline_fragment.type_condition_position {
        Some(type_condition) => state.write_fmt(format_args!("... on {type_condition}")),
        None => state.write("..."),
    }
}

fn write_selection(state: &mut State<'_, '_>, selection: &Selection) -> std::fmt::Result {
    match selection {
        Selection::Field(field_selection) => {
            write_field(state, &field_selection.field)?;
            if let Some(selection_set) = &field_selection.selection_set {
                state.write(" ")?;
                write_selection_set(state, selection_set)?;
            }
            Ok(())
        }
        Selection::InlineFragment(inline_fragment_selection) => {
            write_inline_fragment(state, &inline_fragment_selection.inline_fragment)?;
            state.write(" ")?;
            write_selection_set(state, &inline_fragment_selection.selection_set)
        }
    }
}

fn write_selection_set(
    state: &mut State<'_, '_>,
    selection_set: &SelectionSet,
) -> std::fmt::Result {
    state.write("{")?;
    if selection_set.is_empty() {
        state.indent_no_new_line();
        state.new_line()?;
        state.write("...")?;
        state.dedent()?;
    } else {
        write_indented_lines(state, &selection_set.selections, write_selection)?;
    }
    state.write("}")
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = &mut State::new(f);
        // Anonymous queries use the shorthand syntax.
        if self.root_kind != SchemaRootDefinitionKind::Query || !self.variables.is_empty() {
            state.write(self.root_kind)?;
            if let Some((first, rest)) = self.variables.split_first() {
                state.write_fmt(format_args!("(${}: {}", first.name, first.ty))?;
                for variable in rest {
                    state.write_fmt(format_args!(", ${}: {}", variable.name, variable.ty))?;
                }
                state.write(")")?;
            }
            state.write(" ")?;
        }
        write_selection_set(state, &self.selection_set)
    }
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("{ ... }");
        }
        f.write_str("{")?;
        for selection in self.iter() {
            write!(f, " {selection}")?;
        }
        f.write_str(" }")
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::Field(field_selection) => {
                field_selection.field.fmt(f)?;
                if let Some(selection_set) = &field_selection.selection_set {
                    write!(f, " {selection_set}")?;
                }
                Ok(())
            }
            Selection::InlineFragment(inline_fragment_selection) => {
                write!(
                    f,
                    "{} {}",
                    inline_fragment_selection.inline_fragment,
                    inline_fragment_selection.selection_set
                )
            }
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_field(&mut State::new(f), self)
    }
}

impl Display for InlineFragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_inline_fragment(&mut State::new(f), self)
    }
}

impl Display for OpPathElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpPathElement::Field(field) => field.fmt(f),
            OpPathElement::InlineFragment(inline_fragment) => inline_fragment.fmt(f),
        }
    }
}
