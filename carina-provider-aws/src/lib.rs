//! Carina AWS Provider
//!
//! EC2-backed route table host for the `route` resource type.

#[macro_use]
mod convert;

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_ec2::Client as Ec2Client;
use carina_core::resource::Value;
use carina_route::config::ConfigError;
use carina_route::{
    Destination, ObservedRoute, ReconcilerConfig, RemoteError, RouteProvider, RouteTableApi,
    Target,
};

pub use convert::{classify_code, classify_gateway, route_from_ec2};

/// Route table host backed by the EC2 API
pub struct Ec2RouteTable {
    client: Ec2Client,
    region: String,
}

impl Ec2RouteTable {
    /// Create a host for `region` using the default credential chain
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Ec2Client::new(&config),
            region: region.to_string(),
        }
    }

    /// Create with a specific client (for testing)
    pub fn with_client(client: Ec2Client, region: String) -> Self {
        Self { client, region }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Build a route provider from provider configuration attributes
///
/// `region` is required, either as `ap-northeast-1` or in DSL form
/// (`aws.Region.ap_northeast_1`). Retry and polling overrides are read by
/// [`ReconcilerConfig::from_attributes`].
pub async fn provider_from_attributes(
    attributes: &HashMap<String, Value>,
) -> Result<RouteProvider<Ec2RouteTable>, ConfigError> {
    let region = match attributes.get("region") {
        Some(Value::String(s)) if !s.is_empty() => convert_region_value(s),
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "region".to_string(),
                reason: "missing required attribute".to_string(),
            });
        }
    };
    let config = ReconcilerConfig::from_attributes(attributes)?;
    log::debug!("configuring EC2 route provider in {}", region);
    Ok(RouteProvider::new(Ec2RouteTable::new(&region).await, config))
}

/// Convert region from DSL format (aws.Region.ap_northeast_1) to AWS format (ap-northeast-1)
fn convert_region_value(value: &str) -> String {
    match value.strip_prefix("aws.Region.") {
        Some(rest) => rest.replace('_', "-"),
        None => value.to_string(),
    }
}

#[async_trait]
impl RouteTableApi for Ec2RouteTable {
    async fn list_routes(&self, table_id: &str) -> Result<Vec<ObservedRoute>, RemoteError> {
        let result = self
            .client
            .describe_route_tables()
            .route_table_ids(table_id)
            .send()
            .await
            .map_err(convert::classify_sdk_error)?;

        let Some(table) = result.route_tables().first() else {
            return Err(RemoteError::TableNotFound(table_id.to_string()));
        };
        Ok(table.routes().iter().filter_map(route_from_ec2).collect())
    }

    async fn create_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError> {
        let req = self.client.create_route().route_table_id(table_id);
        let req = with_destination!(req, destination);
        let req = with_target!(req, target);

        log::debug!("CreateRoute {} {} {}", table_id, destination, target);
        req.send().await.map_err(convert::classify_sdk_error)?;
        Ok(())
    }

    async fn replace_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError> {
        let req = self.client.replace_route().route_table_id(table_id);
        let req = with_destination!(req, destination);
        let req = with_target!(req, target);

        log::debug!("ReplaceRoute {} {} {}", table_id, destination, target);
        req.send().await.map_err(convert::classify_sdk_error)?;
        Ok(())
    }

    async fn delete_route(
        &self,
        table_id: &str,
        destination: &Destination,
    ) -> Result<(), RemoteError> {
        let req = self.client.delete_route().route_table_id(table_id);
        let req = with_destination!(req, destination);

        log::debug!("DeleteRoute {} {}", table_id, destination);
        req.send().await.map_err(convert::classify_sdk_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_dsl_is_converted() {
        assert_eq!(
            convert_region_value("aws.Region.ap_northeast_1"),
            "ap-northeast-1"
        );
        assert_eq!(convert_region_value("us-west-2"), "us-west-2");
    }

    #[tokio::test]
    async fn provider_requires_region() {
        let result = provider_from_attributes(&HashMap::new()).await;
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, .. }) if key == "region"
        ));
    }
}
