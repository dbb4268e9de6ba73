//! Target selection: flat declared attributes to a validated [`RouteSpec`]

use std::collections::HashMap;

use carina_core::resource::Value;
use carina_core::schema::TypeError;

use crate::destination::{Destination, IPV4_ATTRIBUTE, IPV6_ATTRIBUTE};
use crate::error::ValidationError;
use crate::route::{ROUTE_TABLE_ATTRIBUTE, RouteSpec};
use crate::schema::route_schema;
use crate::target::{Target, TargetKind};

/// Validate a declared route and resolve its destination and target
///
/// Empty strings count as unset. The prefix-list destination is never
/// counted; supplying it is rejected by the schema as read-only.
pub fn normalize(attributes: &HashMap<String, Value>) -> Result<RouteSpec, ValidationError> {
    let destinations: Vec<&'static str> = [IPV4_ATTRIBUTE, IPV6_ATTRIBUTE]
        .into_iter()
        .filter(|name| is_set(attributes, name))
        .collect();
    let targets: Vec<TargetKind> = TargetKind::ALL
        .into_iter()
        .filter(|kind| is_set(attributes, kind.attribute_name()))
        .collect();

    let [destination_attribute] = destinations[..] else {
        return Err(ValidationError::AmbiguousDestination {
            found: destinations,
        });
    };
    let [kind] = targets[..] else {
        return Err(ValidationError::AmbiguousTarget {
            found: targets.iter().map(|k| k.attribute_name()).collect(),
        });
    };

    let table_id = string_value(attributes, ROUTE_TABLE_ATTRIBUTE)?;
    if table_id.is_empty() {
        return Err(ValidationError::MissingTableId);
    }

    let text = string_value(attributes, destination_attribute)?;
    let destination = if destination_attribute == IPV4_ATTRIBUTE {
        Destination::ipv4(text)?
    } else {
        Destination::ipv6(text)?
    };

    route_schema()
        .validate(attributes)
        .map_err(ValidationError::InvalidAttributes)?;

    let target_id = string_value(attributes, kind.attribute_name())?;
    RouteSpec::new(table_id, destination, Target::new(kind, target_id))
}

fn is_set(attributes: &HashMap<String, Value>, name: &str) -> bool {
    match attributes.get(name) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
        None => false,
    }
}

fn string_value<'a>(
    attributes: &'a HashMap<String, Value>,
    name: &str,
) -> Result<&'a str, ValidationError> {
    match attributes.get(name) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(ValidationError::InvalidAttributes(vec![
            TypeError::AttributeError {
                name: name.to_string(),
                inner: Box::new(TypeError::TypeMismatch {
                    expected: "String".to_string(),
                    got: other.type_name().to_string(),
                }),
            },
        ])),
        None => Ok(""),
    }
}
