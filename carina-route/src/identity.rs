//! Import identity `<route_table_id>_<destination_cidr>`

use crate::destination::Destination;
use crate::error::RouteError;

pub fn format_import_id(table_id: &str, destination: &Destination) -> String {
    format!("{}_{}", table_id, destination)
}

/// Split an import identity at the rightmost `_` whose suffix is a CIDR
///
/// The suffix is tried as IPv6 first, then IPv4; the returned destination is
/// canonical.
pub fn parse_import_id(raw: &str) -> Result<(String, Destination), RouteError> {
    for (idx, _) in raw.rmatch_indices('_') {
        let (table_id, suffix) = (&raw[..idx], &raw[idx + 1..]);
        if let Some(destination) = Destination::parse_cidr(suffix) {
            if table_id.is_empty() {
                break;
            }
            return Ok((table_id.to_string(), destination));
        }
    }
    Err(RouteError::InvalidImportIdentity(raw.to_string()))
}
