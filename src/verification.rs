use serde_json::Value;
use std::fmt;

/// A single discrepancy between what the contract expects and what was observed.
///
/// `expected` is a short description of the violated expectation: `type:number`,
/// `regex:[a-z]+`, `present` for a missing element, `request:GET /foo` for an expected request
/// that never arrived, `no interaction` for a request nothing in the contract accounts for.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    pub actual: Option<Value>,
}

impl Mismatch {
    pub fn new(path: impl ToString, expected: impl Into<String>, actual: Option<Value>) -> Self {
        Self {
            path: path.to_string(),
            expected: expected.into(),
            actual,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(f, "{}: expected {}, got {}", self.path, self.expected, actual),
            None => write!(f, "{}: expected {}, got nothing", self.path, self.expected),
        }
    }
}

/// What a mock transport observed over a test run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationResult {
    /// Every expected interaction was exercised and every received request was expected.
    pub matched: bool,
    pub mismatches: Vec<Mismatch>,
}

impl VerificationResult {
    pub(crate) fn from_mismatches(mismatches: Vec<Mismatch>) -> Self {
        Self {
            matched: mismatches.is_empty(),
            mismatches,
        }
    }
}
