//! Route reconciler: drive one entry of a shared table to the declared target
//!
//! Every call starts from a fresh lookup. Writes are never trusted on their
//! own: after a create or replace the table is re-read until the entry is
//! observable with the desired target. Entries whose origin is not
//! `CreateRoute` are never modified.

use carina_core::retry::retry;
use tokio::time::Instant;

use crate::api::{RemoteError, RouteTableApi};
use crate::config::ReconcilerConfig;
use crate::destination::Destination;
use crate::error::{ReconcileError, ReconcileResult, RouteError, ValidationError};
use crate::identity::parse_import_id;
use crate::route::{ObservedRoute, RouteSpec};

/// What a reconcile call has to do, given the current entry
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create,
    NoOp(ObservedRoute),
    Replace(ObservedRoute),
}

/// Decide the action for `spec` against the entry found at its destination
pub fn plan(spec: &RouteSpec, observed: Option<&ObservedRoute>) -> Result<Action, RouteError> {
    let Some(route) = observed else {
        return Ok(Action::Create);
    };
    if !route.is_managed() {
        return Err(foreign(spec.table_id(), route));
    }
    if route.points_at(spec.target()) {
        Ok(Action::NoOp(route.clone()))
    } else {
        Ok(Action::Replace(route.clone()))
    }
}

/// The write a reconcile round issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Create,
    Replace,
}

impl Write {
    fn label(self) -> &'static str {
        match self {
            Write::Create => "create route",
            Write::Replace => "replace route",
        }
    }

    /// Whether `err` means the entry changed after it was looked up
    fn raced(self, err: &RemoteError) -> bool {
        match self {
            Write::Create => err.is_already_exists(),
            Write::Replace => matches!(err, RemoteError::RouteNotFound(_)),
        }
    }
}

fn foreign(table_id: &str, route: &ObservedRoute) -> RouteError {
    RouteError::ForeignEntryConflict {
        table_id: table_id.to_string(),
        destination: route.destination.clone(),
        origin: route.origin,
    }
}

pub struct RouteReconciler<A> {
    api: A,
    config: ReconcilerConfig,
}

impl<A: RouteTableApi> RouteReconciler<A> {
    pub fn new(api: A, config: ReconcilerConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Find the entry for `destination` in a full listing of the table
    ///
    /// A missing table is reported as an absent entry.
    pub async fn lookup(
        &self,
        table_id: &str,
        destination: &Destination,
    ) -> Result<Option<ObservedRoute>, RouteError> {
        let api = &self.api;
        let routes = match retry(
            &self.config.retry,
            "list routes",
            RemoteError::is_transient,
            move || api.list_routes(table_id),
        )
        .await
        {
            Ok(routes) => routes,
            Err(e) if matches!(e.error, RemoteError::TableNotFound(_)) => {
                log::debug!("route table {} not found", table_id);
                return Ok(None);
            }
            Err(e) => return Err(RouteError::from_retry("list routes", e)),
        };

        let mut matches = routes
            .into_iter()
            .filter(|route| &route.destination == destination);
        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            log::warn!(
                "route table {} lists {} entries for {}; using the first",
                table_id,
                extra + 1,
                destination
            );
        }
        Ok(first)
    }

    /// Current entry at `destination`, if any
    pub async fn describe(
        &self,
        table_id: &str,
        destination: &Destination,
    ) -> ReconcileResult<Option<ObservedRoute>> {
        Ok(self.lookup(table_id, destination).await?)
    }

    /// Create or update the entry so it forwards to the declared target
    pub async fn reconcile(&self, spec: &RouteSpec) -> ReconcileResult<ObservedRoute> {
        let table_id = spec.table_id();
        let destination = spec.destination();
        let target = spec.target();
        let api = &self.api;

        let mut snapshot: Option<ObservedRoute> = None;
        let mut rederived = false;

        loop {
            let observed = self
                .lookup(table_id, destination)
                .await
                .map_err(|e| ReconcileError::new(e, snapshot.clone()))?;
            snapshot = observed.clone();

            let action = plan(spec, observed.as_ref())
                .map_err(|e| ReconcileError::new(e, snapshot.clone()))?;

            let (write, result) = match action {
                Action::NoOp(route) => {
                    log::debug!("route {} is up to date", spec);
                    return Ok(route);
                }
                Action::Create => {
                    log::info!("creating route {}", spec);
                    let result = retry(
                        &self.config.retry,
                        "create route",
                        RemoteError::is_transient,
                        move || api.create_route(table_id, destination, target),
                    )
                    .await;
                    (Write::Create, result)
                }
                Action::Replace(route) => {
                    log::info!(
                        "replacing route {} {} (was {:?})",
                        table_id,
                        destination,
                        route.target
                    );
                    let result = retry(
                        &self.config.retry,
                        "replace route",
                        RemoteError::is_transient,
                        move || api.replace_route(table_id, destination, target),
                    )
                    .await;
                    (Write::Replace, result)
                }
            };

            match result {
                Ok(()) => break,
                // The entry changed between lookup and write; decide again from a fresh read
                Err(e) if !rederived && write.raced(&e.error) => {
                    log::info!(
                        "{} for {} raced with another writer: {}",
                        write.label(),
                        spec,
                        e.error
                    );
                    rederived = true;
                }
                Err(e) => {
                    return Err(ReconcileError::new(
                        RouteError::from_retry(write.label(), e),
                        snapshot,
                    ));
                }
            }
        }

        self.wait_for_route(spec, &mut snapshot).await
    }

    /// Re-read until the entry is visible and forwards to the declared target
    async fn wait_for_route(
        &self,
        spec: &RouteSpec,
        snapshot: &mut Option<ObservedRoute>,
    ) -> ReconcileResult<ObservedRoute> {
        let poll = &self.config.poll;
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            match self.lookup(spec.table_id(), spec.destination()).await {
                Ok(Some(route)) => {
                    // Another writer took the destination over after our write
                    if !route.is_managed() {
                        return Err(ReconcileError::new(
                            foreign(spec.table_id(), &route),
                            Some(route),
                        ));
                    }
                    if route.points_at(spec.target()) {
                        log::debug!("route {} is {} after {} polls", spec, route.state, attempt);
                        return Ok(route);
                    }
                    *snapshot = Some(route);
                }
                Ok(None) => {}
                Err(e) => return Err(ReconcileError::new(e, snapshot.clone())),
            }

            attempt += 1;
            let elapsed = started.elapsed();
            if elapsed >= poll.timeout {
                return Err(ReconcileError::new(
                    RouteError::PropagationTimeout {
                        table_id: spec.table_id().to_string(),
                        destination: spec.destination().clone(),
                        timeout: poll.timeout,
                    },
                    snapshot.clone(),
                ));
            }
            let delay = poll.interval(attempt).min(poll.timeout - elapsed);
            log::debug!("route {} not visible yet, polling again in {:?}", spec, delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Remove the entry at `destination`; an absent entry is success
    pub async fn delete(&self, table_id: &str, destination: &Destination) -> ReconcileResult<()> {
        if table_id.is_empty() {
            return Err(ValidationError::MissingTableId.into());
        }
        if let Destination::PrefixList(id) = destination {
            return Err(ValidationError::ReadOnlyDestination(id.clone()).into());
        }

        let Some(route) = self.lookup(table_id, destination).await? else {
            log::debug!("route {} {} already absent", table_id, destination);
            return Ok(());
        };
        if !route.is_managed() {
            return Err(ReconcileError::new(foreign(table_id, &route), Some(route)));
        }

        log::info!("deleting route {} {}", table_id, destination);
        let api = &self.api;
        match retry(
            &self.config.retry,
            "delete route",
            RemoteError::is_transient,
            move || api.delete_route(table_id, destination),
        )
        .await
        {
            Ok(()) => {}
            Err(e) if e.error.is_not_found() => {
                log::debug!("route {} {} was already gone", table_id, destination);
            }
            Err(e) => {
                return Err(ReconcileError::new(
                    RouteError::from_retry("delete route", e),
                    Some(route),
                ));
            }
        }

        match self.lookup(table_id, destination).await {
            Ok(None) => {}
            Ok(Some(remaining)) => log::debug!(
                "route {} {} still listed after delete (origin {})",
                table_id,
                destination,
                remaining.origin
            ),
            Err(e) => log::warn!(
                "could not confirm deletion of {} {}: {}",
                table_id,
                destination,
                e
            ),
        }
        Ok(())
    }

    /// Resolve an import identity to the intent that reproduces the entry
    pub async fn import(&self, raw: &str) -> ReconcileResult<RouteSpec> {
        let (table_id, destination) = parse_import_id(raw)?;
        let Some(route) = self.lookup(&table_id, &destination).await? else {
            return Err(RouteError::NotFound {
                table_id,
                destination,
            }
            .into());
        };
        let Some(target) = route.target.clone() else {
            return Err(ReconcileError::new(
                RouteError::NoImportableTarget {
                    table_id,
                    destination,
                },
                Some(route),
            ));
        };
        RouteSpec::new(table_id, destination, target)
            .map_err(|e| ReconcileError::new(e.into(), Some(route)))
    }

    /// Move a declared entry from `table_id`/`destination` to `to`
    ///
    /// The old entry is deleted before the new one is created. When neither
    /// table nor destination changes this is a plain reconcile.
    pub async fn move_route(
        &self,
        table_id: &str,
        destination: &Destination,
        to: &RouteSpec,
    ) -> ReconcileResult<ObservedRoute> {
        if table_id != to.table_id() || destination != to.destination() {
            self.delete(table_id, destination).await?;
        }
        self.reconcile(to).await
    }
}
