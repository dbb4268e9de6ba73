//! Route destinations and their canonical text form

use std::fmt;

use carina_core::schema::{parse_ipv4_cidr, parse_ipv6_cidr};
use cidr::{Ipv4Cidr, Ipv6Cidr};

use crate::error::ValidationError;

pub const IPV4_ATTRIBUTE: &str = "destination_cidr_block";
pub const IPV6_ATTRIBUTE: &str = "destination_ipv6_cidr_block";
pub const PREFIX_LIST_ATTRIBUTE: &str = "destination_prefix_list_id";

/// Address family of a CIDR destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

/// The lookup key of a route entry
///
/// CIDR variants hold the parsed network, so two destinations compare equal
/// exactly when they denote the same network in the same family
/// (`::0/0` and `::/0` are the same value).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Ipv4Cidr(Ipv4Cidr),
    Ipv6Cidr(Ipv6Cidr),
    /// Derived entries (e.g. gateway endpoints); read-only
    PrefixList(String),
}

impl Destination {
    /// Parse and canonicalize an IPv4 CIDR
    pub fn ipv4(text: &str) -> Result<Self, ValidationError> {
        parse_ipv4_cidr(text)
            .map(Destination::Ipv4Cidr)
            .map_err(|reason| ValidationError::malformed(IPV4_ATTRIBUTE, text.trim(), reason))
    }

    /// Parse and canonicalize an IPv6 CIDR
    pub fn ipv6(text: &str) -> Result<Self, ValidationError> {
        parse_ipv6_cidr(text)
            .map(Destination::Ipv6Cidr)
            .map_err(|reason| ValidationError::malformed(IPV6_ATTRIBUTE, text.trim(), reason))
    }

    pub fn prefix_list(id: impl Into<String>) -> Self {
        Destination::PrefixList(id.into())
    }

    /// Parse a CIDR of either family, trying IPv6 first
    pub fn parse_cidr(text: &str) -> Option<Self> {
        Self::ipv6(text).or_else(|_| Self::ipv4(text)).ok()
    }

    pub fn family(&self) -> Option<AddressFamily> {
        match self {
            Destination::Ipv4Cidr(_) => Some(AddressFamily::Ipv4),
            Destination::Ipv6Cidr(_) => Some(AddressFamily::Ipv6),
            Destination::PrefixList(_) => None,
        }
    }

    pub fn is_cidr(&self) -> bool {
        self.family().is_some()
    }

    /// Flat attribute carrying this destination
    pub fn attribute_name(&self) -> &'static str {
        match self {
            Destination::Ipv4Cidr(_) => IPV4_ATTRIBUTE,
            Destination::Ipv6Cidr(_) => IPV6_ATTRIBUTE,
            Destination::PrefixList(_) => PREFIX_LIST_ATTRIBUTE,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Always print the prefix length, even for host routes
            Destination::Ipv4Cidr(c) => write!(f, "{}/{}", c.first_address(), c.network_length()),
            Destination::Ipv6Cidr(c) => write!(f, "{}/{}", c.first_address(), c.network_length()),
            Destination::PrefixList(id) => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv6_any_forms_are_equal() {
        let a = Destination::ipv6("::0/0").unwrap();
        let b = Destination::ipv6("::/0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "::/0");
    }

    #[test]
    fn ipv6_text_is_compressed() {
        let d = Destination::ipv6("2001:0DB8:0000:0000::/64").unwrap();
        assert_eq!(d.to_string(), "2001:db8::/64");
    }

    #[test]
    fn ipv4_canonical_text() {
        let d = Destination::ipv4(" 10.3.0.0/16 ").unwrap();
        assert_eq!(d.to_string(), "10.3.0.0/16");
        assert_eq!(d.family(), Some(AddressFamily::Ipv4));
        assert_eq!(d.attribute_name(), IPV4_ATTRIBUTE);

        let host = Destination::ipv4("10.3.0.1/32").unwrap();
        assert_eq!(host.to_string(), "10.3.0.1/32");
    }

    #[test]
    fn malformed_destinations_are_rejected() {
        for text in ["10.3.0.0", "10.3.0.0/", "10.3.0.1/16", "10.3.0.0/40", "nonsense/8"] {
            assert!(
                matches!(
                    Destination::ipv4(text),
                    Err(ValidationError::MalformedDestination { .. })
                ),
                "{text} should be malformed"
            );
        }
        assert!(Destination::ipv4("::/0").is_err());
        assert!(Destination::ipv6("10.0.0.0/8").is_err());
        assert!(Destination::ipv6("::1/200").is_err());
    }

    #[test]
    fn families_never_collide() {
        let v4 = Destination::ipv4("0.0.0.0/0").unwrap();
        let v6 = Destination::ipv6("::/0").unwrap();
        assert_ne!(v4, v6);
        assert_ne!(v4, Destination::prefix_list("0.0.0.0/0"));
    }

    #[test]
    fn parse_cidr_prefers_ipv6() {
        assert_eq!(
            Destination::parse_cidr("::/0").and_then(|d| d.family()),
            Some(AddressFamily::Ipv6)
        );
        assert_eq!(
            Destination::parse_cidr("10.3.0.0/16").and_then(|d| d.family()),
            Some(AddressFamily::Ipv4)
        );
        assert_eq!(Destination::parse_cidr("pl-12345"), None);
    }
}
