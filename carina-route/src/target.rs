//! Route targets: exactly one next hop per entry

use std::fmt;

/// The eleven kinds of next hop a route entry can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    CarrierGateway,
    EgressOnlyInternetGateway,
    InternetGateway,
    Instance,
    LocalGateway,
    NatGateway,
    NetworkInterface,
    TransitGateway,
    VpcEndpoint,
    VpcPeeringConnection,
    VpnGateway,
}

impl TargetKind {
    pub const ALL: [TargetKind; 11] = [
        TargetKind::CarrierGateway,
        TargetKind::EgressOnlyInternetGateway,
        TargetKind::InternetGateway,
        TargetKind::Instance,
        TargetKind::LocalGateway,
        TargetKind::NatGateway,
        TargetKind::NetworkInterface,
        TargetKind::TransitGateway,
        TargetKind::VpcEndpoint,
        TargetKind::VpcPeeringConnection,
        TargetKind::VpnGateway,
    ];

    /// Flat attribute carrying a target of this kind
    pub fn attribute_name(self) -> &'static str {
        match self {
            TargetKind::CarrierGateway => "carrier_gateway_id",
            TargetKind::EgressOnlyInternetGateway => "egress_only_gateway_id",
            TargetKind::InternetGateway => "gateway_id",
            TargetKind::Instance => "instance_id",
            TargetKind::LocalGateway => "local_gateway_id",
            TargetKind::NatGateway => "nat_gateway_id",
            TargetKind::NetworkInterface => "network_interface_id",
            TargetKind::TransitGateway => "transit_gateway_id",
            TargetKind::VpcEndpoint => "vpc_endpoint_id",
            TargetKind::VpcPeeringConnection => "vpc_peering_connection_id",
            TargetKind::VpnGateway => "vpn_gateway_id",
        }
    }
}

/// A resolved next hop: kind plus opaque identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    CarrierGateway(String),
    EgressOnlyInternetGateway(String),
    InternetGateway(String),
    Instance(String),
    LocalGateway(String),
    NatGateway(String),
    NetworkInterface(String),
    TransitGateway(String),
    VpcEndpoint(String),
    VpcPeeringConnection(String),
    VpnGateway(String),
}

impl Target {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        let id = id.into();
        match kind {
            TargetKind::CarrierGateway => Target::CarrierGateway(id),
            TargetKind::EgressOnlyInternetGateway => Target::EgressOnlyInternetGateway(id),
            TargetKind::InternetGateway => Target::InternetGateway(id),
            TargetKind::Instance => Target::Instance(id),
            TargetKind::LocalGateway => Target::LocalGateway(id),
            TargetKind::NatGateway => Target::NatGateway(id),
            TargetKind::NetworkInterface => Target::NetworkInterface(id),
            TargetKind::TransitGateway => Target::TransitGateway(id),
            TargetKind::VpcEndpoint => Target::VpcEndpoint(id),
            TargetKind::VpcPeeringConnection => Target::VpcPeeringConnection(id),
            TargetKind::VpnGateway => Target::VpnGateway(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::CarrierGateway(_) => TargetKind::CarrierGateway,
            Target::EgressOnlyInternetGateway(_) => TargetKind::EgressOnlyInternetGateway,
            Target::InternetGateway(_) => TargetKind::InternetGateway,
            Target::Instance(_) => TargetKind::Instance,
            Target::LocalGateway(_) => TargetKind::LocalGateway,
            Target::NatGateway(_) => TargetKind::NatGateway,
            Target::NetworkInterface(_) => TargetKind::NetworkInterface,
            Target::TransitGateway(_) => TargetKind::TransitGateway,
            Target::VpcEndpoint(_) => TargetKind::VpcEndpoint,
            Target::VpcPeeringConnection(_) => TargetKind::VpcPeeringConnection,
            Target::VpnGateway(_) => TargetKind::VpnGateway,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Target::CarrierGateway(id)
            | Target::EgressOnlyInternetGateway(id)
            | Target::InternetGateway(id)
            | Target::Instance(id)
            | Target::LocalGateway(id)
            | Target::NatGateway(id)
            | Target::NetworkInterface(id)
            | Target::TransitGateway(id)
            | Target::VpcEndpoint(id)
            | Target::VpcPeeringConnection(id)
            | Target::VpnGateway(id) => id,
        }
    }

    pub fn attribute_name(&self) -> &'static str {
        self.kind().attribute_name()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute_name(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn attribute_names_are_unique() {
        let names: HashSet<_> = TargetKind::ALL.iter().map(|k| k.attribute_name()).collect();
        assert_eq!(names.len(), TargetKind::ALL.len());
    }

    #[test]
    fn kind_and_id_round_trip() {
        for kind in TargetKind::ALL {
            let target = Target::new(kind, "id-1");
            assert_eq!(target.kind(), kind);
            assert_eq!(target.id(), "id-1");
        }
    }

    #[test]
    fn display() {
        assert_eq!(
            Target::NatGateway("nat-1".to_string()).to_string(),
            "nat_gateway_id=nat-1"
        );
    }
}
