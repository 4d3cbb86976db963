use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Write as _;

use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;

/// Create an internal error.
///
/// # Example
/// ```rust
/// use apollo_federation_satisfiability::internal_error;
/// use apollo_federation_satisfiability::error::FederationError;
/// # fn may_be_none() -> Option<()> { None }
///
/// const NAME: &str = "the thing";
/// let result: Result<(), FederationError> = may_be_none()
///     .ok_or_else(|| internal_error!("Expected {NAME} to be Some"));
/// ```
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::FederationError::internal(format!( $( $arg )+ ))
    }
}

/// Break out of the current function, returning an internal error.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ).into())
    }
}

/// A safe assertion: on failure, it returns an internal error from the current function instead
/// of panicking, so that a broken invariant aborts the current composition attempt.
///
/// Treat this as an assertion. It must only be used for conditions that *should never happen*
/// in normal operation.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        if !$expr {
            $crate::bail!( $( $arg )+ );
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SingleFederationError {
    #[error(
        "An internal error has occurred, please report this bug to Apollo.\n\nDetails: {message}"
    )]
    Internal { message: String },
    #[error("{message}")]
    InvalidGraphQL { message: String },
    #[error("{message}")]
    InvalidSubgraph { message: String },
    #[error("{message}")]
    MaxValidationSubgraphPathsExceeded { message: String },
}

impl SingleFederationError {
    pub fn code(&self) -> &'static str {
        match self {
            SingleFederationError::Internal { .. } => "INTERNAL",
            SingleFederationError::InvalidGraphQL { .. } => "INVALID_GRAPHQL",
            SingleFederationError::InvalidSubgraph { .. } => "INVALID_SUBGRAPH",
            SingleFederationError::MaxValidationSubgraphPathsExceeded { .. } => {
                "MAX_VALIDATION_SUBGRAPH_PATHS_EXCEEDED"
            }
        }
    }
}

impl From<DiagnosticList> for SingleFederationError {
    fn from(diagnostics: DiagnosticList) -> Self {
        SingleFederationError::InvalidGraphQL {
            message: diagnostics.to_string(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct MultipleFederationErrors {
    pub errors: Vec<SingleFederationError>,
}

impl MultipleFederationErrors {
    pub fn push(&mut self, error: FederationError) {
        match error {
            FederationError::SingleFederationError(error) => {
                self.errors.push(error);
            }
            FederationError::MultipleFederationErrors(errors) => {
                self.errors.extend(errors.errors);
            }
        }
    }

    pub fn into_result(self) -> Result<(), FederationError> {
        match self.errors.len().cmp(&1) {
            std::cmp::Ordering::Less => Ok(()),
            std::cmp::Ordering::Equal => Err(self.errors[0].clone().into()),
            std::cmp::Ordering::Greater => Err(self.into()),
        }
    }
}

impl Display for MultipleFederationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "The following errors occurred:")?;
        for error in &self.errors {
            write!(f, "\n  - ")?;
            for c in error.to_string().chars() {
                if c == '\n' {
                    write!(f, "\n    ")?;
                } else {
                    f.write_char(c)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, thiserror::Error)]
pub enum FederationError {
    #[error(transparent)]
    SingleFederationError(#[from] SingleFederationError),
    #[error(transparent)]
    MultipleFederationErrors(#[from] MultipleFederationErrors),
}

impl std::fmt::Debug for FederationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleFederationError(inner) => std::fmt::Debug::fmt(inner, f),
            Self::MultipleFederationErrors(inner) => std::fmt::Debug::fmt(inner, f),
        }
    }
}

impl FederationError {
    pub fn internal(message: impl Into<String>) -> Self {
        SingleFederationError::Internal {
            message: message.into(),
        }
        .into()
    }

    /// Whether this error reports a broken invariant (a bug upstream of validation) rather than a
    /// problem with the user's schemas.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::SingleFederationError(inner) => {
                matches!(inner, SingleFederationError::Internal { .. })
            }
            Self::MultipleFederationErrors(inner) => inner
                .errors
                .iter()
                .any(|error| matches!(error, SingleFederationError::Internal { .. })),
        }
    }

    pub fn errors(&self) -> Vec<&SingleFederationError> {
        match self {
            Self::SingleFederationError(inner) => vec![inner],
            Self::MultipleFederationErrors(inner) => inner.errors.iter().collect(),
        }
    }
}

impl From<DiagnosticList> for FederationError {
    fn from(value: DiagnosticList) -> Self {
        SingleFederationError::from(value).into()
    }
}

impl<T> From<WithErrors<T>> for FederationError {
    fn from(value: WithErrors<T>) -> Self {
        value.errors.into()
    }
}

/// Errors reported to the user at the end of a composition attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompositionError {
    #[error("{message}")]
    SatisfiabilityError { message: String },
    #[error(transparent)]
    InternalError(#[from] FederationError),
}

impl CompositionError {
    pub fn code(&self) -> &'static str {
        match self {
            CompositionError::SatisfiabilityError { .. } => "SATISFIABILITY_ERROR",
            CompositionError::InternalError(error) => match error {
                FederationError::SingleFederationError(inner) => inner.code(),
                FederationError::MultipleFederationErrors(_) => "INTERNAL",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(value: usize) -> Result<usize, FederationError> {
        ensure!(value < 10, "Value {value} is out of range");
        Ok(value)
    }

    #[test]
    fn ensure_returns_an_internal_error() {
        assert_eq!(checked(3).ok(), Some(3));
        let error = checked(12).unwrap_err();
        assert!(error.is_internal());
        assert!(error.to_string().ends_with("Details: Value 12 is out of range"));
    }

    #[test]
    fn multiple_errors_collapse_to_single() {
        let mut errors = MultipleFederationErrors { errors: vec![] };
        assert!(errors.clone().into_result().is_ok());
        errors.push(
            SingleFederationError::InvalidSubgraph {
                message: "first".to_owned(),
            }
            .into(),
        );
        let single = errors.clone().into_result().unwrap_err();
        assert!(matches!(single, FederationError::SingleFederationError(_)));
        errors.push(internal_error!("second"));
        let multiple = errors.into_result().unwrap_err();
        assert_eq!(multiple.errors().len(), 2);
        assert!(multiple.is_internal());
    }
}
