//! Provider adapter for the `route` resource type

use carina_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use carina_core::resource::{Resource, ResourceId, State};
use carina_core::schema::ResourceSchema;

use crate::api::RouteTableApi;
use crate::config::ReconcilerConfig;
use crate::error::ReconcileError;
use crate::identity::parse_import_id;
use crate::reconciler::RouteReconciler;
use crate::route::{ObservedRoute, RouteSpec};
use crate::schema::{RESOURCE_TYPE, route_schema};
use crate::selector::normalize;

pub struct RouteType;

impl ResourceType for RouteType {
    fn name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        route_schema()
    }
}

/// Manages `route` resources in tables served by `A`
///
/// `State.identifier` is the import identity of the entry.
pub struct RouteProvider<A> {
    reconciler: RouteReconciler<A>,
}

impl<A: RouteTableApi> RouteProvider<A> {
    pub fn new(api: A, config: ReconcilerConfig) -> Self {
        Self {
            reconciler: RouteReconciler::new(api, config),
        }
    }

    pub fn reconciler(&self) -> &RouteReconciler<A> {
        &self.reconciler
    }
}

fn provider_error(id: &ResourceId, err: ReconcileError) -> ProviderError {
    ProviderError::new(err.to_string())
        .for_resource(id.clone())
        .retryable(err.is_retryable())
        .with_cause(err)
}

fn route_state(id: ResourceId, spec: &RouteSpec, route: &ObservedRoute) -> State {
    State::existing(id, route.to_attributes(spec.table_id())).with_identifier(spec.identity())
}

impl<A: RouteTableApi> Provider for RouteProvider<A> {
    fn name(&self) -> &'static str {
        "route"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(RouteType)]
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            let Some(identifier) = identifier else {
                return Ok(State::not_found(id));
            };
            let (table_id, destination) =
                parse_import_id(&identifier).map_err(|e| provider_error(&id, e.into()))?;

            match self.reconciler.describe(&table_id, &destination).await {
                Ok(Some(route)) => Ok(State::existing(id, route.to_attributes(&table_id))
                    .with_identifier(identifier)),
                Ok(None) => Ok(State::not_found(id)),
                Err(e) => Err(provider_error(&id, e)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let spec =
                normalize(&resource.attributes).map_err(|e| provider_error(&resource.id, e.into()))?;
            let route = self
                .reconciler
                .reconcile(&spec)
                .await
                .map_err(|e| provider_error(&resource.id, e))?;
            Ok(route_state(resource.id, &spec, &route))
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move {
            let spec = normalize(&to.attributes).map_err(|e| provider_error(&id, e.into()))?;
            let (table_id, destination) =
                parse_import_id(&identifier).map_err(|e| provider_error(&id, e.into()))?;
            let route = self
                .reconciler
                .move_route(&table_id, &destination, &spec)
                .await
                .map_err(|e| provider_error(&id, e))?;
            Ok(route_state(id, &spec, &route))
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let (table_id, destination) =
                parse_import_id(&identifier).map_err(|e| provider_error(&id, e.into()))?;
            self.reconciler
                .delete(&table_id, &destination)
                .await
                .map_err(|e| provider_error(&id, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use carina_core::differ::{Diff, diff_with_schema};
    use carina_core::resource::Value;

    use crate::api::RemoteError;
    use crate::backends::{MemoryRouteTable, Operation};

    fn setup() -> (Arc<MemoryRouteTable>, RouteProvider<Arc<MemoryRouteTable>>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let table = Arc::new(MemoryRouteTable::new());
        table.add_table("rtb-1", "10.1.0.0/16");
        table.add_table("rtb-2", "10.2.0.0/16");
        let provider = RouteProvider::new(table.clone(), ReconcilerConfig::immediate());
        (table, provider)
    }

    fn route(pairs: &[(&str, &str)]) -> Resource {
        pairs.iter().fold(Resource::new("route", "default"), |r, (k, v)| {
            r.with_attribute(*k, Value::from(*v))
        })
    }

    #[tokio::test]
    async fn create_then_read_by_identity() {
        let (_, provider) = setup();
        let created = provider
            .create(&route(&[
                ("route_table_id", "rtb-1"),
                ("destination_cidr_block", "10.3.0.0/16"),
                ("gateway_id", "igw-1"),
            ]))
            .await
            .unwrap();
        assert_eq!(created.identifier.as_deref(), Some("rtb-1_10.3.0.0/16"));
        assert_eq!(created.attributes["state"], Value::from("active"));

        let read = provider
            .read(&created.id, created.identifier.as_deref())
            .await
            .unwrap();
        assert!(read.exists);
        assert_eq!(read.attributes, created.attributes);

        let missing = provider.read(&created.id, None).await.unwrap();
        assert!(!missing.exists);
    }

    #[tokio::test]
    async fn read_reports_no_drift_after_create() {
        let (_, provider) = setup();
        let desired = route(&[
            ("route_table_id", "rtb-1"),
            ("destination_ipv6_cidr_block", "::0/0"),
            ("egress_only_gateway_id", "eigw-1"),
        ]);
        let created = provider.create(&desired).await.unwrap();
        let current = provider
            .read(&desired.id, created.identifier.as_deref())
            .await
            .unwrap();

        // The declared spelling differs from the canonical one reported back
        let canonical = route(&[
            ("route_table_id", "rtb-1"),
            ("destination_ipv6_cidr_block", "::/0"),
            ("egress_only_gateway_id", "eigw-1"),
        ]);
        assert!(matches!(
            diff_with_schema(&canonical, &current, &route_schema()),
            Diff::NoChange(_)
        ));
    }

    #[tokio::test]
    async fn update_swaps_target_in_place() {
        let (table, provider) = setup();
        let created = provider
            .create(&route(&[
                ("route_table_id", "rtb-1"),
                ("destination_cidr_block", "10.3.0.0/16"),
                ("gateway_id", "igw-1"),
            ]))
            .await
            .unwrap();

        let to = route(&[
            ("route_table_id", "rtb-1"),
            ("destination_cidr_block", "10.3.0.0/16"),
            ("nat_gateway_id", "nat-1"),
        ]);
        assert!(matches!(
            diff_with_schema(&to, &created, &route_schema()),
            Diff::Update { .. }
        ));

        let updated = provider
            .update(&created.id, "rtb-1_10.3.0.0/16", &created, &to)
            .await
            .unwrap();
        assert_eq!(updated.attributes["nat_gateway_id"], Value::from("nat-1"));
        assert!(!updated.attributes.contains_key("gateway_id"));
        assert_eq!(table.calls().replace, 1);
        assert_eq!(table.calls().delete, 0);
    }

    #[tokio::test]
    async fn destination_change_replaces_entry() {
        let (table, provider) = setup();
        let created = provider
            .create(&route(&[
                ("route_table_id", "rtb-1"),
                ("destination_cidr_block", "10.2.0.0/16"),
                ("gateway_id", "igw-1"),
            ]))
            .await
            .unwrap();

        let to = route(&[
            ("route_table_id", "rtb-1"),
            ("destination_cidr_block", "10.3.0.0/16"),
            ("gateway_id", "igw-1"),
        ]);
        assert!(matches!(
            diff_with_schema(&to, &created, &route_schema()),
            Diff::Replace { .. }
        ));

        let moved = provider
            .update(&created.id, "rtb-1_10.2.0.0/16", &created, &to)
            .await
            .unwrap();
        assert_eq!(moved.identifier.as_deref(), Some("rtb-1_10.3.0.0/16"));
        assert_eq!(table.calls().delete, 1);
        assert_eq!(table.routes("rtb-1").len(), 2);
    }

    #[tokio::test]
    async fn delete_and_read_back() {
        let (_, provider) = setup();
        let created = provider
            .create(&route(&[
                ("route_table_id", "rtb-2"),
                ("destination_cidr_block", "0.0.0.0/0"),
                ("vpc_peering_connection_id", "pcx-1"),
            ]))
            .await
            .unwrap();
        let identifier = created.identifier.clone().unwrap();

        provider.delete(&created.id, &identifier).await.unwrap();
        let read = provider.read(&created.id, Some(&identifier)).await.unwrap();
        assert!(!read.exists);

        // Deleting twice is fine
        provider.delete(&created.id, &identifier).await.unwrap();
    }

    #[tokio::test]
    async fn errors_carry_resource_and_retryability() {
        let (table, provider) = setup();
        let err = provider
            .create(&route(&[
                ("route_table_id", "rtb-1"),
                ("destination_cidr_block", "10.3.0.0/16"),
                ("gateway_id", "igw-1"),
                ("nat_gateway_id", "nat-1"),
            ]))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("[route.default]"));
        assert!(!err.retryable);
        assert_eq!(table.calls().list, 0);

        for _ in 0..3 {
            table.inject_fault(Operation::List, RemoteError::Throttled("slow".to_string()));
        }
        let err = provider
            .read(&ResourceId::new("route", "default"), Some("rtb-1_10.3.0.0/16"))
            .await
            .unwrap_err();
        assert!(err.retryable);

        let err = provider
            .read(&ResourceId::new("route", "default"), Some("rtb-1"))
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }

    #[test]
    fn exposes_route_type() {
        let (_, provider) = setup();
        let types = provider.resource_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name(), "route");
        assert!(types[0].schema().forces_replacement("destination_cidr_block"));
    }
}
