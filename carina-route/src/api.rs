//! Host capability trait: the calls a routing-table service must offer

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::destination::Destination;
use crate::route::ObservedRoute;
use crate::target::Target;

/// Failure reported by the routing-table service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("route table not found: {0}")]
    TableNotFound(String),

    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("route already exists: {0}")]
    RouteAlreadyExists(String),

    /// The target exists but is not yet usable (e.g. still provisioning)
    #[error("target not ready: {0}")]
    TargetNotReady(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },
}

impl RemoteError {
    /// Whether the same call may succeed if repeated later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Throttled(_) | RemoteError::Transport(_) | RemoteError::TargetNotReady(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RemoteError::TableNotFound(_) | RemoteError::RouteNotFound(_)
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RemoteError::RouteAlreadyExists(_))
    }
}

/// Operations on a shared route table
///
/// Implementations own transport, authentication and pagination. Listing
/// returns every entry of the table, including ones this crate never wrote.
#[async_trait]
pub trait RouteTableApi: Send + Sync {
    async fn list_routes(&self, table_id: &str) -> Result<Vec<ObservedRoute>, RemoteError>;

    async fn create_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError>;

    async fn replace_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError>;

    async fn delete_route(
        &self,
        table_id: &str,
        destination: &Destination,
    ) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: RouteTableApi + ?Sized> RouteTableApi for Arc<T> {
    async fn list_routes(&self, table_id: &str) -> Result<Vec<ObservedRoute>, RemoteError> {
        (**self).list_routes(table_id).await
    }

    async fn create_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError> {
        (**self).create_route(table_id, destination, target).await
    }

    async fn replace_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError> {
        (**self).replace_route(table_id, destination, target).await
    }

    async fn delete_route(
        &self,
        table_id: &str,
        destination: &Destination,
    ) -> Result<(), RemoteError> {
        (**self).delete_route(table_id, destination).await
    }
}
