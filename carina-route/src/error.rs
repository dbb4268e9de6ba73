//! Error types for route validation and reconciliation

use std::fmt;
use std::time::Duration;

use carina_core::retry::RetryError;
use carina_core::schema::TypeError;
use thiserror::Error;

use crate::api::RemoteError;
use crate::destination::Destination;
use crate::route::{ObservedRoute, RouteOrigin};

/// Declared intent that can never become a valid route; never retried
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("exactly one destination must be set, found {}", FieldList(.found))]
    AmbiguousDestination { found: Vec<&'static str> },

    #[error("exactly one target must be set, found {}", FieldList(.found))]
    AmbiguousTarget { found: Vec<&'static str> },

    #[error("{attribute} '{value}' is not a valid CIDR: {reason}")]
    MalformedDestination {
        attribute: &'static str,
        value: String,
        reason: String,
    },

    #[error("route_table_id must not be empty")]
    MissingTableId,

    #[error("{attribute} must not be empty")]
    EmptyTargetId { attribute: &'static str },

    #[error("prefix-list destination '{0}' is read-only")]
    ReadOnlyDestination(String),

    #[error("invalid attributes: {}", ErrorList(.0))]
    InvalidAttributes(Vec<TypeError>),
}

impl ValidationError {
    pub(crate) fn malformed(
        attribute: &'static str,
        value: &str,
        reason: impl fmt::Display,
    ) -> Self {
        Self::MalformedDestination {
            attribute,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

struct FieldList<'a>(&'a [&'static str]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&self.0.join(", "))
        }
    }
}

struct ErrorList<'a>(&'a [TypeError]);

impl fmt::Display for ErrorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

/// Failure of a single reconciler step
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The entry at this destination was not created by a route reconciler
    #[error("route {destination} in {table_id} has origin {origin} and is not managed here")]
    ForeignEntryConflict {
        table_id: String,
        destination: Destination,
        origin: RouteOrigin,
    },

    #[error("route {destination} not found in {table_id}")]
    NotFound {
        table_id: String,
        destination: Destination,
    },

    /// The write was accepted but never became observable
    #[error("route {destination} in {table_id} did not converge within {timeout:?}")]
    PropagationTimeout {
        table_id: String,
        destination: Destination,
        timeout: Duration,
    },

    /// Transient remote failure that outlived the retry budget
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Transient {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("invalid import identity '{0}': expected <route_table_id>_<destination_cidr>")]
    InvalidImportIdentity(String),

    /// The entry exists but has no next hop a declaration could name
    #[error("route {destination} in {table_id} has no importable target")]
    NoImportableTarget {
        table_id: String,
        destination: Destination,
    },
}

impl RouteError {
    pub(crate) fn from_retry(operation: &'static str, err: RetryError<RemoteError>) -> Self {
        if err.transient {
            RouteError::Transient {
                operation,
                attempts: err.attempts,
                source: err.error,
            }
        } else {
            RouteError::Remote {
                operation,
                source: err.error,
            }
        }
    }

    /// Whether the caller may re-invoke the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RouteError::Transient { .. } | RouteError::PropagationTimeout { .. }
        )
    }
}

/// Failure returned from a public reconciler call, with the last route
/// snapshot read before the failure (if any) so drift can still be shown
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ReconcileError {
    #[source]
    pub error: RouteError,
    pub observed: Option<ObservedRoute>,
}

impl ReconcileError {
    pub fn new(error: RouteError, observed: Option<ObservedRoute>) -> Self {
        Self { error, observed }
    }

    pub fn kind(&self) -> &RouteError {
        &self.error
    }

    pub fn observed(&self) -> Option<&ObservedRoute> {
        self.observed.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

impl From<RouteError> for ReconcileError {
    fn from(error: RouteError) -> Self {
        Self::new(error, None)
    }
}

impl From<ValidationError> for ReconcileError {
    fn from(error: ValidationError) -> Self {
        Self::new(error.into(), None)
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_messages_list_fields() {
        let none = ValidationError::AmbiguousTarget { found: vec![] };
        assert_eq!(none.to_string(), "exactly one target must be set, found none");

        let two = ValidationError::AmbiguousDestination {
            found: vec!["destination_cidr_block", "destination_ipv6_cidr_block"],
        };
        assert_eq!(
            two.to_string(),
            "exactly one destination must be set, found destination_cidr_block, destination_ipv6_cidr_block"
        );
    }

    #[test]
    fn retry_exhaustion_maps_to_transient() {
        let err = RouteError::from_retry(
            "list routes",
            RetryError {
                error: RemoteError::Throttled("slow down".to_string()),
                attempts: 3,
                transient: true,
            },
        );
        assert!(matches!(err, RouteError::Transient { attempts: 3, .. }));
        assert!(err.is_retryable());
        assert!(matches!(&err, RouteError::Transient { source, .. } if source.is_transient()));
    }

    #[test]
    fn structural_failures_are_not_retryable() {
        let err = RouteError::from_retry(
            "create route",
            RetryError {
                error: RemoteError::TableNotFound("rtb-1".to_string()),
                attempts: 1,
                transient: false,
            },
        );
        assert!(matches!(err, RouteError::Remote { .. }));
        assert!(!err.is_retryable());

        let err = ReconcileError::from(ValidationError::MissingTableId);
        assert!(!err.is_retryable());
        assert!(err.observed().is_none());
    }
}
