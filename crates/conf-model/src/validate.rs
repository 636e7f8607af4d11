//! Pluggable validation hooks
//!
//! Validators run over a fully-loaded instance: after every Load and
//! before a Save commits anything to the store. A failing validator turns
//! into [`crate::Error::Validation`] naming the rule and property.

use crate::ConfigurationObject;

/// Outcome of a failed validation, pointing at the offending property.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub property: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

/// A named validation rule over a configuration object.
pub trait Validator {
    /// The rule name reported in validation errors.
    fn name(&self) -> &str;

    /// Check the instance; return the first failure, if any.
    fn validate(&self, object: &ConfigurationObject) -> Result<(), ValidationFailure>;
}

/// Adapter turning a closure into a named [`Validator`].
pub struct FnValidator<F> {
    name: String,
    check: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&ConfigurationObject) -> Result<(), ValidationFailure>,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&ConfigurationObject) -> Result<(), ValidationFailure>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, object: &ConfigurationObject) -> Result<(), ValidationFailure> {
        (self.check)(object)
    }
}
