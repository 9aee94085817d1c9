//! Error types.
//!
//! Errors are split along the lines of *when* they can happen:
//! - [`ContractError`]s are raised while a contract is being assembled - an invalid matcher,
//!   a builder step invoked out of order, a typed body that cannot be represented as JSON.
//!   They are always surfaced at the offending call.
//! - [`ExecutionError`]s are returned by a test run (`execute_test` / `verify`) and aggregate
//!   everything that went wrong while exercising the mock provider.
use crate::contract::SpecificationVersion;
use crate::interaction::InteractionStage;
use crate::verification::Mismatch;
use std::fmt;

/// A boxed error returned by an exercise function or a message handler.
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum ContractError {
    #[error("Invalid array bounds: min ({min}) is greater than max ({max})")]
    InvalidBounds { min: usize, max: usize },
    #[error("Invalid regular expression `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("`{feature}` is not supported by the {version} pact specification")]
    UnsupportedForSpecVersion {
        feature: &'static str,
        version: SpecificationVersion,
    },
    #[error("Field `{field}` has no example value")]
    MissingExample { field: String },
    #[error("Body cannot be represented as JSON: {0}")]
    IncompatibleType(String),
    #[error("Invalid interaction sequence: expected the interaction to be at `{expected}`, but it is at `{actual}`")]
    InvalidInteractionSequence {
        expected: InteractionStage,
        actual: InteractionStage,
    },
    #[error("A contract cannot mix HTTP interactions and asynchronous messages")]
    MixedInteractionKind,
    #[error("An interaction described as `{description}` with the same provider states has already been registered")]
    DuplicateInteraction { description: String },
    #[error("Interactions must have a non-empty description before they are added to a contract")]
    IncompleteInteraction,
    #[error("`{0}` is not a valid HTTP method")]
    InvalidMethod(String),
    #[error("A request path can only be matched by a string or a regex matcher")]
    InvalidPathMatcher,
    #[error("`{0}` is not a valid header name")]
    InvalidHeaderName(String),
    #[error("The contract is being exercised and cannot be modified")]
    ContractSealed,
    #[error("Failed to read `{}`", path.display())]
    UnreadableFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("The contract does not contain any interaction")]
    EmptyContract,
    #[error("Invalid mock provider configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    TransportStart(#[from] TransportStartError),
    #[error(transparent)]
    Verification(#[from] VerificationFailure),
    /// Verification succeeded, but the contract could not be written.
    #[error("The contract was verified but could not be written: {0}")]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// The mock transport could not start listening.
#[derive(thiserror::Error, Debug)]
#[error("Failed to start the mock server on {address}: {reason}")]
pub struct TransportStartError {
    pub address: String,
    pub reason: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write the pact file")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize the pact")]
    Serialization(#[from] serde_json::Error),
}

/// Every reason a test run failed: the exercise function's own error (if any) together with
/// all the mismatches reported by the mock transport.
#[derive(Debug)]
pub struct VerificationFailure {
    pub exercise_error: Option<DynError>,
    pub mismatches: Vec<Mismatch>,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Verifications failed:")?;
        if let Some(error) = &self.exercise_error {
            writeln!(f, "- The test function returned an error: {}", error)?;
        }
        for mismatch in &self.mismatches {
            writeln!(f, "- {}", mismatch)?;
        }
        Ok(())
    }
}

impl std::error::Error for VerificationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.exercise_error
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl ExecutionError {
    /// The mismatches reported by the mock transport, if verification failed.
    pub fn mismatches(&self) -> &[Mismatch] {
        match self {
            ExecutionError::Verification(failure) => &failure.mismatches,
            _ => &[],
        }
    }
}
