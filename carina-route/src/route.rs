//! Route entries: declared intent and observed table rows

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use carina_core::resource::Value;

use crate::destination::Destination;
use crate::error::ValidationError;
use crate::identity::format_import_id;
use crate::target::{Target, TargetKind};

pub const ROUTE_TABLE_ATTRIBUTE: &str = "route_table_id";
pub const INSTANCE_OWNER_ATTRIBUTE: &str = "instance_owner_id";
pub const ORIGIN_ATTRIBUTE: &str = "origin";
pub const STATE_ATTRIBUTE: &str = "state";

/// How an entry came to exist in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOrigin {
    /// Added by an explicit create call; the only kind this crate mutates
    CreateRoute,
    /// The table's implicit local route
    CreateRouteTable,
    /// Propagated from a virtual private gateway
    EnableVgwRoutePropagation,
}

impl RouteOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOrigin::CreateRoute => "CreateRoute",
            RouteOrigin::CreateRouteTable => "CreateRouteTable",
            RouteOrigin::EnableVgwRoutePropagation => "EnableVgwRoutePropagation",
        }
    }
}

impl fmt::Display for RouteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CreateRoute" => Ok(RouteOrigin::CreateRoute),
            "CreateRouteTable" => Ok(RouteOrigin::CreateRouteTable),
            "EnableVgwRoutePropagation" => Ok(RouteOrigin::EnableVgwRoutePropagation),
            other => Err(format!("unknown route origin '{}'", other)),
        }
    }
}

/// Reported health of an entry. Both states are valid results of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteState {
    Active,
    /// The target is gone or detached; traffic is dropped
    Blackhole,
}

impl RouteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteState::Active => "active",
            RouteState::Blackhole => "blackhole",
        }
    }
}

impl fmt::Display for RouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RouteState::Active),
            "blackhole" => Ok(RouteState::Blackhole),
            other => Err(format!("unknown route state '{}'", other)),
        }
    }
}

/// Ids reported alongside an instance or network interface next hop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOwner {
    pub instance_id: Option<String>,
    pub network_interface_id: Option<String>,
    pub owner_account_id: Option<String>,
}

/// One row of a routing table as last read from the remote side
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedRoute {
    pub destination: Destination,
    /// `None` for next hops outside the known kinds (e.g. the `local` route)
    pub target: Option<Target>,
    pub owner: Option<TargetOwner>,
    pub origin: RouteOrigin,
    pub state: RouteState,
}

impl ObservedRoute {
    pub fn new(
        destination: Destination,
        target: Option<Target>,
        origin: RouteOrigin,
        state: RouteState,
    ) -> Self {
        Self {
            destination,
            target,
            owner: None,
            origin,
            state,
        }
    }

    pub fn with_owner(mut self, owner: TargetOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Whether this entry was created by an explicit route write
    pub fn is_managed(&self) -> bool {
        self.origin == RouteOrigin::CreateRoute
    }

    /// Whether the entry forwards to `target`
    ///
    /// Instance and network interface next hops match on either reported id,
    /// since an attached interface is reported together with its instance.
    pub fn points_at(&self, target: &Target) -> bool {
        if self.target.as_ref() == Some(target) {
            return true;
        }
        let Some(owner) = &self.owner else {
            return false;
        };
        match target {
            Target::Instance(id) => owner.instance_id.as_deref() == Some(id.as_str()),
            Target::NetworkInterface(id) => {
                owner.network_interface_id.as_deref() == Some(id.as_str())
            }
            _ => false,
        }
    }

    /// Flat attribute view of this entry
    pub fn to_attributes(&self, table_id: &str) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert(ROUTE_TABLE_ATTRIBUTE.to_string(), Value::from(table_id));
        attributes.insert(
            self.destination.attribute_name().to_string(),
            Value::from(self.destination.to_string()),
        );

        if let Some(target) = &self.target {
            attributes.insert(
                target.attribute_name().to_string(),
                Value::from(target.id()),
            );
        }

        if let Some(owner) = &self.owner {
            if let Some(id) = &owner.instance_id {
                attributes.insert(
                    TargetKind::Instance.attribute_name().to_string(),
                    Value::from(id.as_str()),
                );
            }
            if let Some(id) = &owner.network_interface_id {
                attributes.insert(
                    TargetKind::NetworkInterface.attribute_name().to_string(),
                    Value::from(id.as_str()),
                );
            }
            if let Some(account) = &owner.owner_account_id {
                attributes.insert(
                    INSTANCE_OWNER_ATTRIBUTE.to_string(),
                    Value::from(account.as_str()),
                );
            }
        }

        attributes.insert(
            ORIGIN_ATTRIBUTE.to_string(),
            Value::from(self.origin.as_str()),
        );
        attributes.insert(STATE_ATTRIBUTE.to_string(), Value::from(self.state.as_str()));
        attributes
    }
}

/// Validated intent for a single entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    table_id: String,
    destination: Destination,
    target: Target,
}

impl RouteSpec {
    pub fn new(
        table_id: impl Into<String>,
        destination: Destination,
        target: Target,
    ) -> Result<Self, ValidationError> {
        let table_id = table_id.into();
        if table_id.is_empty() {
            return Err(ValidationError::MissingTableId);
        }
        if let Destination::PrefixList(id) = &destination {
            return Err(ValidationError::ReadOnlyDestination(id.clone()));
        }
        if target.id().is_empty() {
            return Err(ValidationError::EmptyTargetId {
                attribute: target.attribute_name(),
            });
        }
        Ok(Self {
            table_id,
            destination,
            target,
        })
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Import identity `<table>_<destination>`
    pub fn identity(&self) -> String {
        format_import_id(&self.table_id, &self.destination)
    }

    /// Flat attribute view of the declared intent
    pub fn to_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert(
            ROUTE_TABLE_ATTRIBUTE.to_string(),
            Value::from(self.table_id.as_str()),
        );
        attributes.insert(
            self.destination.attribute_name().to_string(),
            Value::from(self.destination.to_string()),
        );
        attributes.insert(
            self.target.attribute_name().to_string(),
            Value::from(self.target.id()),
        );
        attributes
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.table_id, self.destination, self.target)
    }
}
