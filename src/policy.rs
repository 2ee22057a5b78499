//! Failure-propagation policies.
//!
//! A [`Policy`] decides two things: whether a single observed failure ends the
//! whole computation early, and how the full set of outcomes is turned into
//! one aggregated string once every operation has reported.

use crate::error::{AggregateError, AggregateResult, WorkerError};
use crate::tracker::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Separator placed between tokens of an aggregated result.
pub const SEPARATOR: &str = ", ";

/// Policy selector without payload, used by the CLI and config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// First failure fails the aggregate
    #[default]
    FailFast,
    /// Failures are dropped from the output
    FailPartial,
    /// Failures are replaced by a fallback value
    FailSoft,
}

/// How individual failures affect the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    FailFast,
    FailPartial,
    FailSoft { fallback: String },
}

/// Reaction to one observed outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Keep waiting for the remaining operations.
    Continue,
    /// End the computation now with this failure.
    Fail(WorkerError),
}

impl Policy {
    /// Build a policy from its selector. `fallback` is only used by Fail-Soft.
    pub fn from_kind(kind: PolicyKind, fallback: impl Into<String>) -> Self {
        match kind {
            PolicyKind::FailFast => Policy::FailFast,
            PolicyKind::FailPartial => Policy::FailPartial,
            PolicyKind::FailSoft => Policy::FailSoft {
                fallback: fallback.into(),
            },
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::FailFast => PolicyKind::FailFast,
            Policy::FailPartial => PolicyKind::FailPartial,
            Policy::FailSoft { .. } => PolicyKind::FailSoft,
        }
    }

    /// Short label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Policy::FailFast => "fail-fast",
            Policy::FailPartial => "fail-partial",
            Policy::FailSoft { .. } => "fail-soft",
        }
    }

    /// React to the outcome of request element `index` as it arrives.
    pub fn observe(&self, index: usize, outcome: &Outcome) -> Verdict {
        let Outcome::Failure(err) = outcome else {
            return Verdict::Continue;
        };

        match self {
            Policy::FailFast => {
                warn!("[{}] worker {} failed: {}", self.label(), index, err);
                Verdict::Fail(err.clone())
            }
            Policy::FailPartial => {
                warn!(
                    "[{}] worker {} failed, dropping its result: {}",
                    self.label(),
                    index,
                    err
                );
                Verdict::Continue
            }
            Policy::FailSoft { fallback } => {
                warn!(
                    "[{}] worker {} failed, masking with fallback {:?}: {}",
                    self.label(),
                    index,
                    fallback,
                    err
                );
                Verdict::Continue
            }
        }
    }

    /// Combine a complete, index-ordered outcome set into the final result.
    pub fn synthesize(&self, outcomes: &[Outcome]) -> AggregateResult {
        match self {
            Policy::FailFast => {
                if let Some(err) = outcomes.iter().find_map(Outcome::error) {
                    return Err(AggregateError::Worker(err.clone()));
                }
                Ok(join(outcomes.iter().filter_map(Outcome::value)))
            }
            Policy::FailPartial => Ok(join(outcomes.iter().filter_map(Outcome::value))),
            Policy::FailSoft { fallback } => Ok(join(
                outcomes
                    .iter()
                    .map(|outcome| outcome.value().unwrap_or(fallback.as_str())),
            )),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::FailSoft { fallback } => write!(f, "{} (fallback: {})", self.label(), fallback),
            _ => write!(f, "{}", self.label()),
        }
    }
}

fn join<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.collect::<Vec<_>>().join(SEPARATOR)
}

/// Split an aggregated result back into its tokens. An empty result has none.
///
/// Tokens are trimmed, so this cannot recover values that were empty or that
/// themselves contain [`SEPARATOR`]. Count outcomes instead when that matters.
pub fn split_tokens(aggregate: &str) -> Vec<&str> {
    if aggregate.trim().is_empty() {
        return Vec::new();
    }
    aggregate.split(SEPARATOR).map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outcomes() -> Vec<Outcome> {
        vec![
            Outcome::Success("MSG-A".to_string()),
            Outcome::Failure(WorkerError::new("Microservice B Failure")),
            Outcome::Success("MSG-C".to_string()),
        ]
    }

    #[test]
    fn test_fail_fast_observe_stops_on_failure() {
        let outcomes = sample_outcomes();
        assert_eq!(Policy::FailFast.observe(0, &outcomes[0]), Verdict::Continue);
        assert_eq!(
            Policy::FailFast.observe(1, &outcomes[1]),
            Verdict::Fail(WorkerError::new("Microservice B Failure"))
        );
    }

    #[test]
    fn test_absorbing_policies_never_stop() {
        let outcomes = sample_outcomes();
        let soft = Policy::from_kind(PolicyKind::FailSoft, "FALLBACK");
        for outcome in &outcomes {
            assert_eq!(Policy::FailPartial.observe(1, outcome), Verdict::Continue);
            assert_eq!(soft.observe(1, outcome), Verdict::Continue);
        }
    }

    #[test]
    fn test_synthesize_per_policy() {
        let outcomes = sample_outcomes();

        let err = Policy::FailFast.synthesize(&outcomes).unwrap_err();
        assert_eq!(err.to_string(), "Microservice B Failure");

        assert_eq!(
            Policy::FailPartial.synthesize(&outcomes).unwrap(),
            "MSG-A, MSG-C"
        );

        let soft = Policy::FailSoft {
            fallback: "FALLBACK".to_string(),
        };
        assert_eq!(
            soft.synthesize(&outcomes).unwrap(),
            "MSG-A, FALLBACK, MSG-C"
        );
    }

    #[test]
    fn test_synthesize_empty_is_empty_string() {
        let soft = Policy::from_kind(PolicyKind::FailSoft, "FALLBACK");
        for policy in [Policy::FailFast, Policy::FailPartial, soft] {
            assert_eq!(policy.synthesize(&[]).unwrap(), "");
        }
    }

    #[test]
    fn test_kind_round_trip_and_labels() {
        let soft = Policy::from_kind(PolicyKind::FailSoft, "N/A");
        assert_eq!(soft.kind(), PolicyKind::FailSoft);
        assert_eq!(soft.label(), "fail-soft");
        assert_eq!(soft.to_string(), "fail-soft (fallback: N/A)");
        assert_eq!(Policy::from_kind(PolicyKind::FailPartial, "").to_string(), "fail-partial");
    }

    #[test]
    fn test_split_tokens() {
        assert!(split_tokens("").is_empty());
        assert_eq!(split_tokens("MSG-A, MSG-C"), vec!["MSG-A", "MSG-C"]);
        assert_eq!(split_tokens("ONE"), vec!["ONE"]);
    }

    #[test]
    fn test_policy_kind_deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: PolicyKind,
        }
        let parsed: Wrapper = toml::from_str("policy = \"fail-partial\"").unwrap();
        assert_eq!(parsed.policy, PolicyKind::FailPartial);
    }
}
