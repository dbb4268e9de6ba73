//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type so declared attributes
//! can be type checked before any remote call is made.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|message| TypeError::ValidationFailed { message })
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name().to_string(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is read-only")]
    ReadOnly { name: String },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Computed by the provider; never accepted as desired input
    pub read_only: bool,
    /// Changing this attribute replaces the resource instead of updating it
    pub force_new: bool,
    pub description: Option<String>,
    /// Provider-side property name (e.g., "DestinationCidrBlock" for EC2)
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            read_only: false,
            force_new: false,
            description: None,
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether a change to the named attribute forces replacement
    pub fn forces_replacement(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.force_new)
    }

    /// Whether the named attribute is computed by the provider
    pub fn is_read_only(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.read_only)
    }

    /// Validate desired resource attributes
    ///
    /// Read-only attributes are rejected when they carry a non-empty value.
    /// Unknown attributes are allowed.
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        for (name, value) in attributes {
            let Some(schema) = self.attributes.get(name) else {
                continue;
            };
            if schema.read_only {
                if !matches!(value, Value::String(s) if s.is_empty()) {
                    errors.push(TypeError::ReadOnly { name: name.clone() });
                }
                continue;
            }
            if let Err(e) = schema.attr_type.validate(value) {
                errors.push(TypeError::AttributeError {
                    name: name.clone(),
                    inner: Box::new(e),
                });
            }
        }

        // HashMap iteration order is unstable; keep reported errors deterministic
        errors.sort_by_key(|e| e.to_string());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// IPv4 CIDR block type (e.g., "10.0.0.0/16")
    pub fn ipv4_cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Ipv4Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if s.is_empty() => Ok(()),
                Value::String(s) => validate_ipv4_cidr(s),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// IPv6 CIDR block type (e.g., "2001:db8::/56")
    pub fn ipv6_cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Ipv6Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if s.is_empty() => Ok(()),
                Value::String(s) => validate_ipv6_cidr(s),
                _ => Err("Expected string".to_string()),
            },
        }
    }
}

/// Validate IPv4 CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_ipv4_cidr(cidr: &str) -> Result<(), String> {
    parse_ipv4_cidr(cidr)
        .map(|_| ())
        .map_err(|reason| format!("Invalid IPv4 CIDR '{}': {}", cidr, reason))
}

/// Validate IPv6 CIDR block format (e.g., "::/0")
pub fn validate_ipv6_cidr(cidr: &str) -> Result<(), String> {
    parse_ipv6_cidr(cidr)
        .map(|_| ())
        .map_err(|reason| format!("Invalid IPv6 CIDR '{}': {}", cidr, reason))
}

/// Parse an IPv4 CIDR block, ignoring surrounding whitespace
///
/// The prefix length is mandatory and host bits must be zero.
pub fn parse_ipv4_cidr(cidr: &str) -> Result<cidr::Ipv4Cidr, String> {
    let cidr = require_prefix(cidr)?;
    cidr::Ipv4Cidr::from_str(cidr).map_err(|e| e.to_string())
}

/// Parse an IPv6 CIDR block, ignoring surrounding whitespace
///
/// The prefix length is mandatory and host bits must be zero.
pub fn parse_ipv6_cidr(cidr: &str) -> Result<cidr::Ipv6Cidr, String> {
    let cidr = require_prefix(cidr)?;
    cidr::Ipv6Cidr::from_str(cidr).map_err(|e| e.to_string())
}

fn require_prefix(cidr: &str) -> Result<&str, String> {
    let cidr = cidr.trim();
    match cidr.split_once('/') {
        Some((_, prefix)) if !prefix.is_empty() => Ok(cidr),
        _ => Err("missing prefix length".to_string()),
    }
}
