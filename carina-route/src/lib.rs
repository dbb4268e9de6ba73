//! Carina Route
//!
//! Declarative management of one entry in a route table that other writers
//! share. A declared route is normalized into a [`RouteSpec`], then the
//! [`RouteReconciler`] drives the table towards it through a host that
//! implements [`RouteTableApi`].

pub mod api;
pub mod backends;
pub mod config;
pub mod destination;
pub mod error;
pub mod identity;
pub mod provider;
pub mod reconciler;
pub mod route;
pub mod schema;
pub mod selector;
pub mod target;

pub use api::{RemoteError, RouteTableApi};
pub use config::{PollPolicy, ReconcilerConfig};
pub use destination::{AddressFamily, Destination};
pub use error::{ReconcileError, ReconcileResult, RouteError, ValidationError};
pub use identity::{format_import_id, parse_import_id};
pub use provider::{RouteProvider, RouteType};
pub use reconciler::{Action, RouteReconciler, plan};
pub use route::{ObservedRoute, RouteOrigin, RouteSpec, RouteState, TargetOwner};
pub use selector::normalize;
pub use target::{Target, TargetKind};
