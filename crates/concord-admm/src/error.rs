//! Error types for concord-admm.

use concord_model::{GroundRule, GroundRuleId, TemplateId};
use thiserror::Error;

/// Result type for concord-admm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying a reasoner.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid configuration `{key}`: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    /// A rule refers to a template that was never registered.
    #[error("unknown template {0}")]
    UnknownTemplate(TemplateId),

    /// A template with this id is already registered.
    #[error("template {0} is already registered")]
    DuplicateTemplate(TemplateId),

    /// A weighted rule was grounded from a constraint template or vice versa.
    #[error("rule {rule} does not match the kind of template {template}")]
    KindMismatch {
        rule: GroundRuleId,
        template: TemplateId,
    },

    /// A weight was assigned to a constraint template.
    #[error("template {0} is a constraint and carries no weight")]
    NotWeighted(TemplateId),

    /// The rule's function has a shape the reasoner cannot optimize.
    #[error("malformed rule {rule}: {reason}")]
    MalformedRule {
        rule: Box<GroundRule>,
        reason: String,
    },

    /// Template weights must be non-negative.
    #[error("template {template} has negative weight {weight}")]
    NegativeWeight { template: TemplateId, weight: f64 },

    /// No rule with this id is held by the reasoner.
    #[error("unknown rule {0}")]
    UnknownRule(GroundRuleId),

    /// Rules or weights changed since the last `optimize()`.
    #[error("model changed since the last optimization")]
    StaleModel,

    /// A squared-hyperplane system could not be factored.
    #[error("system of size {size} is not positive definite")]
    NotPositiveDefinite { size: usize },
}

impl Error {
    pub(crate) fn malformed(rule: &GroundRule, reason: impl Into<String>) -> Self {
        Error::MalformedRule {
            rule: Box::new(rule.clone()),
            reason: reason.into(),
        }
    }
}
