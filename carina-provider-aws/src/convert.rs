//! Mapping between EC2 route shapes and carina-route types

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::Route;
use carina_route::{
    Destination, ObservedRoute, RemoteError, RouteOrigin, RouteState, Target, TargetOwner,
};

/// Set the destination field of a Create/Replace/DeleteRoute builder
macro_rules! with_destination {
    ($req:expr, $destination:expr) => {{
        let text = $destination.to_string();
        match $destination {
            carina_route::Destination::Ipv4Cidr(_) => $req.destination_cidr_block(text),
            carina_route::Destination::Ipv6Cidr(_) => $req.destination_ipv6_cidr_block(text),
            carina_route::Destination::PrefixList(_) => $req.destination_prefix_list_id(text),
        }
    }};
}

/// Set the single target field of a Create/ReplaceRoute builder
///
/// Internet and VPN gateways share `GatewayId`.
macro_rules! with_target {
    ($req:expr, $target:expr) => {{
        let id = $target.id().to_string();
        match $target {
            carina_route::Target::CarrierGateway(_) => $req.carrier_gateway_id(id),
            carina_route::Target::EgressOnlyInternetGateway(_) => {
                $req.egress_only_internet_gateway_id(id)
            }
            carina_route::Target::InternetGateway(_) | carina_route::Target::VpnGateway(_) => {
                $req.gateway_id(id)
            }
            carina_route::Target::Instance(_) => $req.instance_id(id),
            carina_route::Target::LocalGateway(_) => $req.local_gateway_id(id),
            carina_route::Target::NatGateway(_) => $req.nat_gateway_id(id),
            carina_route::Target::NetworkInterface(_) => $req.network_interface_id(id),
            carina_route::Target::TransitGateway(_) => $req.transit_gateway_id(id),
            carina_route::Target::VpcEndpoint(_) => $req.vpc_endpoint_id(id),
            carina_route::Target::VpcPeeringConnection(_) => $req.vpc_peering_connection_id(id),
        }
    }};
}

/// Classify an id reported in the shared `GatewayId` field by its prefix
///
/// Returns `None` for the `local` gateway and unknown prefixes.
pub fn classify_gateway(id: &str) -> Option<Target> {
    if id.starts_with("igw-") {
        Some(Target::InternetGateway(id.to_string()))
    } else if id.starts_with("vgw-") {
        Some(Target::VpnGateway(id.to_string()))
    } else if id.starts_with("vpce-") {
        Some(Target::VpcEndpoint(id.to_string()))
    } else {
        None
    }
}

/// Convert an EC2 route to an observed entry
///
/// Routes without any destination (e.g. core network entries) are skipped.
pub fn route_from_ec2(route: &Route) -> Option<ObservedRoute> {
    let destination = if let Some(cidr) = route.destination_cidr_block() {
        Destination::ipv4(cidr).ok()?
    } else if let Some(cidr) = route.destination_ipv6_cidr_block() {
        Destination::ipv6(cidr).ok()?
    } else {
        Destination::prefix_list(route.destination_prefix_list_id()?)
    };

    let owned = |id: &str| id.to_string();
    let target = route
        .carrier_gateway_id()
        .map(owned)
        .map(Target::CarrierGateway)
        .or_else(|| {
            route
                .egress_only_internet_gateway_id()
                .map(owned)
                .map(Target::EgressOnlyInternetGateway)
        })
        .or_else(|| route.gateway_id().and_then(classify_gateway))
        .or_else(|| route.instance_id().map(owned).map(Target::Instance))
        .or_else(|| {
            route
                .network_interface_id()
                .map(owned)
                .map(Target::NetworkInterface)
        })
        .or_else(|| route.local_gateway_id().map(owned).map(Target::LocalGateway))
        .or_else(|| route.nat_gateway_id().map(owned).map(Target::NatGateway))
        .or_else(|| route.transit_gateway_id().map(owned).map(Target::TransitGateway))
        .or_else(|| {
            route
                .vpc_peering_connection_id()
                .map(owned)
                .map(Target::VpcPeeringConnection)
        });

    let origin = match route.origin().map(|o| o.as_str()) {
        Some("CreateRoute") => RouteOrigin::CreateRoute,
        Some("EnableVgwRoutePropagation") => RouteOrigin::EnableVgwRoutePropagation,
        Some("CreateRouteTable") => RouteOrigin::CreateRouteTable,
        other => {
            // Unknown provenance is treated as not ours
            log::debug!("route {} has unrecognized origin {:?}", destination, other);
            RouteOrigin::CreateRouteTable
        }
    };
    let state = match route.state().map(|s| s.as_str()) {
        Some("blackhole") => RouteState::Blackhole,
        _ => RouteState::Active,
    };

    let mut observed = ObservedRoute::new(destination, target, origin, state);
    if route.instance_id().is_some() || route.network_interface_id().is_some() {
        observed = observed.with_owner(TargetOwner {
            instance_id: route.instance_id().map(owned),
            network_interface_id: route.network_interface_id().map(owned),
            owner_account_id: route.instance_owner_id().map(owned),
        });
    }
    Some(observed)
}

/// Map an EC2 error code to the host error taxonomy
pub fn classify_code(code: &str, message: &str) -> RemoteError {
    let message = message.to_string();
    match code {
        "InvalidRouteTableID.NotFound" => RemoteError::TableNotFound(message),
        "InvalidRoute.NotFound" => RemoteError::RouteNotFound(message),
        "RouteAlreadyExists" => RemoteError::RouteAlreadyExists(message),
        "RequestLimitExceeded" | "Throttling" | "ThrottlingException" => {
            RemoteError::Throttled(message)
        }
        "InternalError" | "InternalFailure" | "ServiceUnavailable" | "Unavailable" => {
            RemoteError::Transport(format!("{}: {}", code, message))
        }
        // Targets created moments ago are often not visible to the route API yet
        c if c.ends_with(".NotFound") => RemoteError::TargetNotReady(format!("{}: {}", c, message)),
        c => RemoteError::Service {
            code: c.to_string(),
            message,
        },
    }
}

pub(crate) fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    ) {
        return RemoteError::Transport(DisplayErrorContext(&err).to_string());
    }
    match err.code() {
        Some(code) => classify_code(code, err.message().unwrap_or_default()),
        None => RemoteError::Service {
            code: "Unknown".to_string(),
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{RouteOrigin as Ec2Origin, RouteState as Ec2State};
    use carina_route::AddressFamily;

    #[test]
    fn gateway_prefixes() {
        assert_eq!(
            classify_gateway("igw-1"),
            Some(Target::InternetGateway("igw-1".to_string()))
        );
        assert_eq!(
            classify_gateway("vgw-1"),
            Some(Target::VpnGateway("vgw-1".to_string()))
        );
        assert_eq!(
            classify_gateway("vpce-1"),
            Some(Target::VpcEndpoint("vpce-1".to_string()))
        );
        assert_eq!(classify_gateway("local"), None);
    }

    #[test]
    fn local_route_has_no_target() {
        let route = Route::builder()
            .destination_cidr_block("10.1.0.0/16")
            .gateway_id("local")
            .origin(Ec2Origin::CreateRouteTable)
            .state(Ec2State::Active)
            .build();

        let observed = route_from_ec2(&route).unwrap();
        assert_eq!(observed.target, None);
        assert_eq!(observed.origin, RouteOrigin::CreateRouteTable);
        assert!(!observed.is_managed());
    }

    #[test]
    fn ipv6_route_is_canonicalized() {
        let route = Route::builder()
            .destination_ipv6_cidr_block("::0/0")
            .egress_only_internet_gateway_id("eigw-1")
            .origin(Ec2Origin::CreateRoute)
            .state(Ec2State::Active)
            .build();

        let observed = route_from_ec2(&route).unwrap();
        assert_eq!(observed.destination.family(), Some(AddressFamily::Ipv6));
        assert_eq!(observed.destination.to_string(), "::/0");
        assert_eq!(
            observed.target,
            Some(Target::EgressOnlyInternetGateway("eigw-1".to_string()))
        );
    }

    #[test]
    fn interface_route_reports_owner() {
        let route = Route::builder()
            .destination_cidr_block("10.3.0.0/16")
            .instance_id("i-1")
            .instance_owner_id("123456789012")
            .network_interface_id("eni-1")
            .origin(Ec2Origin::CreateRoute)
            .state(Ec2State::Active)
            .build();

        let observed = route_from_ec2(&route).unwrap();
        assert!(observed.points_at(&Target::NetworkInterface("eni-1".to_string())));
        assert!(observed.points_at(&Target::Instance("i-1".to_string())));
        assert_eq!(
            observed.to_attributes("rtb-1")["instance_owner_id"].as_str(),
            Some("123456789012")
        );
    }

    #[test]
    fn unattached_interface_is_blackhole() {
        let route = Route::builder()
            .destination_cidr_block("10.3.0.0/16")
            .network_interface_id("eni-1")
            .origin(Ec2Origin::CreateRoute)
            .state(Ec2State::Blackhole)
            .build();

        let observed = route_from_ec2(&route).unwrap();
        assert_eq!(observed.state, RouteState::Blackhole);
        assert_eq!(
            observed.target,
            Some(Target::NetworkInterface("eni-1".to_string()))
        );
    }

    #[test]
    fn prefix_list_route_is_read_only_destination() {
        let route = Route::builder()
            .destination_prefix_list_id("pl-1")
            .gateway_id("vpce-1")
            .origin(Ec2Origin::CreateRoute)
            .state(Ec2State::Active)
            .build();

        let observed = route_from_ec2(&route).unwrap();
        assert_eq!(observed.destination, Destination::prefix_list("pl-1"));
        assert!(!observed.destination.is_cidr());
    }

    #[test]
    fn propagated_route() {
        let route = Route::builder()
            .destination_cidr_block("172.16.0.0/12")
            .gateway_id("vgw-1")
            .origin(Ec2Origin::EnableVgwRoutePropagation)
            .build();

        let observed = route_from_ec2(&route).unwrap();
        assert_eq!(observed.origin, RouteOrigin::EnableVgwRoutePropagation);
        assert_eq!(observed.target, Some(Target::VpnGateway("vgw-1".to_string())));
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            classify_code("InvalidRouteTableID.NotFound", "gone"),
            RemoteError::TableNotFound("gone".to_string())
        );
        assert!(classify_code("InvalidRoute.NotFound", "").is_not_found());
        assert!(classify_code("RouteAlreadyExists", "").is_already_exists());
        assert!(classify_code("RequestLimitExceeded", "").is_transient());
        assert!(classify_code("InvalidNatGatewayID.NotFound", "").is_transient());
        let err = classify_code("InvalidParameterValue", "bad");
        assert!(!err.is_transient());
        assert!(matches!(err, RemoteError::Service { code, .. } if code == "InvalidParameterValue"));
    }
}
