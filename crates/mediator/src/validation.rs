//! Declarative input validation for commands.

use std::fmt;

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// The property the rule checked (e.g., "Name").
    pub property: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Outcome of validating a command. Failures keep discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    /// A result with no failures.
    pub fn valid() -> Self {
        Self::default()
    }

    /// Returns true if no rule failed.
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the failures in discovery order.
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Records a failure.
    pub fn add(&mut self, property: impl Into<String>, message: impl Into<String>) {
        self.failures.push(ValidationFailure {
            property: property.into(),
            message: message.into(),
        });
    }

    /// Appends every failure of `other`.
    pub fn merge(&mut self, other: ValidationResult) {
        self.failures.extend(other.failures);
    }

    /// Returns the failure messages in discovery order.
    pub fn messages(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.message.clone()).collect()
    }
}

type Check<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Rule<T> {
    property: &'static str,
    check: Check<T>,
    message: String,
}

/// A list of rules checked against a value.
///
/// Rules run in declaration order. Once a rule fails for a property, later
/// rules for the same property are skipped, so an empty field reports
/// "required" without also reporting its format.
///
/// ```
/// use mediator::Validator;
///
/// let validator = Validator::<String>::new()
///     .rule("Name", |name| !name.trim().is_empty(), "Name is required")
///     .rule("Name", |name| name.chars().count() <= 5, "Name is too long");
///
/// assert!(validator.validate(&"Ada".to_string()).is_valid());
/// assert_eq!(validator.validate(&String::new()).messages(), vec!["Name is required"]);
/// ```
pub struct Validator<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Validator<T> {
    /// Creates a validator with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule: `check` must return true for the value to be valid.
    pub fn rule(
        mut self,
        property: &'static str,
        check: impl Fn(&T) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        self.rules.push(Rule {
            property,
            check: Box::new(check),
            message: message.into(),
        });
        self
    }

    /// Runs every applicable rule against `value`.
    pub fn validate(&self, value: &T) -> ValidationResult {
        let mut result = ValidationResult::valid();
        for rule in &self.rules {
            let already_failed = result
                .failures
                .iter()
                .any(|failure| failure.property == rule.property);
            if !already_failed && !(rule.check)(value) {
                result.add(rule.property, rule.message.clone());
            }
        }
        result
    }
}

impl<T> Default for Validator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules.len())
            .finish()
    }
}
