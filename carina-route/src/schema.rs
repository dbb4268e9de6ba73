//! Attribute schema for the `route` resource type

use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::destination::{IPV4_ATTRIBUTE, IPV6_ATTRIBUTE, PREFIX_LIST_ATTRIBUTE};
use crate::route::{
    INSTANCE_OWNER_ATTRIBUTE, ORIGIN_ATTRIBUTE, ROUTE_TABLE_ATTRIBUTE, STATE_ATTRIBUTE,
};
use crate::target::TargetKind;

pub const RESOURCE_TYPE: &str = "route";

pub fn route_schema() -> ResourceSchema {
    let mut schema = ResourceSchema::new(RESOURCE_TYPE)
        .with_description("A single entry in a shared VPC route table")
        .attribute(
            AttributeSchema::new(ROUTE_TABLE_ATTRIBUTE, AttributeType::String)
                .required()
                .force_new()
                .with_description("The ID of the route table")
                .with_provider_name("RouteTableId"),
        )
        .attribute(
            AttributeSchema::new(IPV4_ATTRIBUTE, types::ipv4_cidr())
                .force_new()
                .with_description("The IPv4 CIDR block used for the destination match")
                .with_provider_name("DestinationCidrBlock"),
        )
        .attribute(
            AttributeSchema::new(IPV6_ATTRIBUTE, types::ipv6_cidr())
                .force_new()
                .with_description("The IPv6 CIDR block used for the destination match")
                .with_provider_name("DestinationIpv6CidrBlock"),
        )
        .attribute(
            AttributeSchema::new(PREFIX_LIST_ATTRIBUTE, AttributeType::String)
                .read_only()
                .with_provider_name("DestinationPrefixListId"),
        );

    for kind in TargetKind::ALL {
        schema = schema.attribute(
            AttributeSchema::new(kind.attribute_name(), AttributeType::String)
                .with_provider_name(provider_name(kind)),
        );
    }

    schema
        .attribute(
            AttributeSchema::new(INSTANCE_OWNER_ATTRIBUTE, AttributeType::String)
                .read_only()
                .with_provider_name("InstanceOwnerId"),
        )
        .attribute(
            AttributeSchema::new(
                ORIGIN_ATTRIBUTE,
                AttributeType::Enum(vec![
                    "CreateRoute".to_string(),
                    "CreateRouteTable".to_string(),
                    "EnableVgwRoutePropagation".to_string(),
                ]),
            )
            .read_only()
            .with_provider_name("Origin"),
        )
        .attribute(
            AttributeSchema::new(
                STATE_ATTRIBUTE,
                AttributeType::Enum(vec!["active".to_string(), "blackhole".to_string()]),
            )
            .read_only()
            .with_provider_name("State"),
        )
}

fn provider_name(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::CarrierGateway => "CarrierGatewayId",
        TargetKind::EgressOnlyInternetGateway => "EgressOnlyInternetGatewayId",
        TargetKind::InternetGateway | TargetKind::VpnGateway | TargetKind::VpcEndpoint => {
            "GatewayId"
        }
        TargetKind::Instance => "InstanceId",
        TargetKind::LocalGateway => "LocalGatewayId",
        TargetKind::NatGateway => "NatGatewayId",
        TargetKind::NetworkInterface => "NetworkInterfaceId",
        TargetKind::TransitGateway => "TransitGatewayId",
        TargetKind::VpcPeeringConnection => "VpcPeeringConnectionId",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destinations_and_table_force_replacement() {
        let schema = route_schema();
        assert!(schema.forces_replacement("route_table_id"));
        assert!(schema.forces_replacement("destination_cidr_block"));
        assert!(schema.forces_replacement("destination_ipv6_cidr_block"));
        assert!(!schema.forces_replacement("nat_gateway_id"));
    }

    #[test]
    fn projections_are_read_only() {
        let schema = route_schema();
        for name in ["destination_prefix_list_id", "instance_owner_id", "origin", "state"] {
            assert!(schema.is_read_only(name), "{name}");
        }
        for kind in TargetKind::ALL {
            assert!(!schema.is_read_only(kind.attribute_name()));
        }
    }

    #[test]
    fn shared_gateway_field() {
        let schema = route_schema();
        let name = |attr: &str| schema.attributes[attr].provider_name.clone();
        assert_eq!(name("gateway_id").as_deref(), Some("GatewayId"));
        assert_eq!(name("vpn_gateway_id").as_deref(), Some("GatewayId"));
        assert_eq!(name("vpc_endpoint_id").as_deref(), Some("GatewayId"));
    }
}
