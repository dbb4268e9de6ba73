//! In-process route table host
//!
//! Models what the reconciler has to cope with on a real routing service:
//! entries it did not create, blackholed next hops, reads that lag behind
//! writes, and failures injected per operation. Every call is counted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::api::{RemoteError, RouteTableApi};
use crate::destination::Destination;
use crate::route::{ObservedRoute, RouteOrigin, RouteState, TargetOwner};
use crate::target::Target;

/// Host operation, for fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Replace,
    Delete,
}

/// Number of calls made per operation, failed ones included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub replace: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn writes(&self) -> usize {
        self.create + self.replace + self.delete
    }
}

#[derive(Debug)]
enum Scheduled {
    Insert(ObservedRoute),
    Remove(Destination),
}

#[derive(Debug, Default)]
struct Table {
    /// Authoritative entries; writes are checked against these
    routes: Vec<ObservedRoute>,
    /// What listing returns while writes are still propagating
    view: Vec<ObservedRoute>,
    /// Listings left before `view` catches up with `routes`
    lag: usize,
    after_next_list: Vec<Scheduled>,
}

impl Table {
    fn position(&self, destination: &Destination) -> Option<usize> {
        self.routes.iter().position(|r| &r.destination == destination)
    }

    fn upsert(&mut self, route: ObservedRoute) {
        match self.position(&route.destination) {
            Some(i) => self.routes[i] = route,
            None => self.routes.push(route),
        }
    }

    fn remove(&mut self, destination: &Destination) -> Option<ObservedRoute> {
        self.position(destination).map(|i| self.routes.remove(i))
    }

    fn sync(&mut self) {
        self.view = self.routes.clone();
        self.lag = 0;
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Table>,
    /// Network interface id to the instance it is attached to, if any
    interfaces: HashMap<String, Option<String>>,
    /// Instance id to its primary network interface
    instances: HashMap<String, String>,
    retired: HashSet<String>,
    propagation_delay: usize,
    faults: HashMap<Operation, VecDeque<RemoteError>>,
    calls: CallCounts,
}

impl Inner {
    fn take_fault(&mut self, operation: Operation) -> Result<(), RemoteError> {
        match self.faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn table_mut(&mut self, table_id: &str) -> Result<&mut Table, RemoteError> {
        self.tables
            .get_mut(table_id)
            .ok_or_else(|| RemoteError::TableNotFound(table_id.to_string()))
    }

    /// Resolve a next hop the way the routing service reports it
    fn resolve(
        &self,
        account_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> ObservedRoute {
        let mut state = if self.retired.contains(target.id()) {
            RouteState::Blackhole
        } else {
            RouteState::Active
        };

        let owner = match target {
            Target::NetworkInterface(eni) => {
                let instance_id = self.interfaces.get(eni).cloned().flatten();
                if instance_id.is_none() {
                    state = RouteState::Blackhole;
                }
                Some(TargetOwner {
                    instance_id,
                    network_interface_id: Some(eni.clone()),
                    owner_account_id: Some(account_id.to_string()),
                })
            }
            Target::Instance(instance) => {
                let network_interface_id = self.instances.get(instance).cloned();
                if network_interface_id.is_none() {
                    state = RouteState::Blackhole;
                }
                Some(TargetOwner {
                    instance_id: Some(instance.clone()),
                    network_interface_id,
                    owner_account_id: Some(account_id.to_string()),
                })
            }
            _ => None,
        };

        ObservedRoute {
            destination: destination.clone(),
            target: Some(target.clone()),
            owner,
            origin: RouteOrigin::CreateRoute,
            state,
        }
    }

    /// Recompute reported state after attachments or targets changed
    fn refresh(&mut self, account_id: &str) {
        let mut tables = std::mem::take(&mut self.tables);
        for table in tables.values_mut() {
            for route in table.routes.iter_mut().chain(table.view.iter_mut()) {
                if route.origin != RouteOrigin::CreateRoute {
                    continue;
                }
                if let Some(target) = route.target.clone() {
                    *route = self.resolve(account_id, &route.destination, &target);
                }
            }
        }
        self.tables = tables;
    }

    fn written(&mut self, table_id: &str) {
        let delay = self.propagation_delay;
        if let Some(table) = self.tables.get_mut(table_id) {
            if delay == 0 {
                table.sync();
            } else {
                table.lag = delay;
            }
        }
    }
}

/// Route tables held in memory
#[derive(Debug)]
pub struct MemoryRouteTable {
    account_id: String,
    inner: Mutex<Inner>,
}

impl Default for MemoryRouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRouteTable {
    pub const DEFAULT_ACCOUNT_ID: &'static str = "123456789012";

    pub fn new() -> Self {
        Self::with_account(Self::DEFAULT_ACCOUNT_ID)
    }

    /// Report `account_id` as the owner of instance and interface targets
    pub fn with_account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poisoned state is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a table with its implicit local route for `vpc_cidr`
    pub fn add_table(&self, table_id: &str, vpc_cidr: &str) {
        let mut table = Table::default();
        if let Some(local) = Destination::parse_cidr(vpc_cidr) {
            table.routes.push(ObservedRoute::new(
                local,
                None,
                RouteOrigin::CreateRouteTable,
                RouteState::Active,
            ));
        }
        table.sync();
        self.lock().tables.insert(table_id.to_string(), table);
    }

    pub fn remove_table(&self, table_id: &str) {
        self.lock().tables.remove(table_id);
    }

    /// Insert or overwrite an entry out of band, visible immediately
    pub fn insert_route(&self, table_id: &str, route: ObservedRoute) {
        let mut inner = self.lock();
        if let Some(table) = inner.tables.get_mut(table_id) {
            table.upsert(route);
            table.sync();
        }
    }

    /// Remove an entry out of band, visible immediately
    pub fn remove_route(&self, table_id: &str, destination: &Destination) {
        let mut inner = self.lock();
        if let Some(table) = inner.tables.get_mut(table_id) {
            table.remove(destination);
            table.sync();
        }
    }

    /// Insert an entry right after the next listing of `table_id` returns
    pub fn insert_route_after_next_list(&self, table_id: &str, route: ObservedRoute) {
        let mut inner = self.lock();
        if let Some(table) = inner.tables.get_mut(table_id) {
            table.after_next_list.push(Scheduled::Insert(route));
        }
    }

    /// Remove an entry right after the next listing of `table_id` returns
    pub fn remove_route_after_next_list(&self, table_id: &str, destination: &Destination) {
        let mut inner = self.lock();
        if let Some(table) = inner.tables.get_mut(table_id) {
            table
                .after_next_list
                .push(Scheduled::Remove(destination.clone()));
        }
    }

    /// Register a network interface that is not attached to any instance
    pub fn add_interface(&self, eni: &str) {
        let mut inner = self.lock();
        inner.interfaces.entry(eni.to_string()).or_insert(None);
        inner.refresh(&self.account_id);
    }

    /// Register an instance whose primary interface is `eni`
    pub fn register_instance(&self, instance_id: &str, eni: &str) {
        let mut inner = self.lock();
        inner
            .instances
            .insert(instance_id.to_string(), eni.to_string());
        inner
            .interfaces
            .insert(eni.to_string(), Some(instance_id.to_string()));
        inner.refresh(&self.account_id);
    }

    pub fn attach_interface(&self, eni: &str, instance_id: &str) {
        let mut inner = self.lock();
        inner
            .interfaces
            .insert(eni.to_string(), Some(instance_id.to_string()));
        inner.refresh(&self.account_id);
    }

    pub fn detach_interface(&self, eni: &str) {
        let mut inner = self.lock();
        inner.interfaces.insert(eni.to_string(), None);
        inner.refresh(&self.account_id);
    }

    /// Make every entry forwarding to `target_id` a blackhole
    pub fn retire_target(&self, target_id: &str) {
        let mut inner = self.lock();
        inner.retired.insert(target_id.to_string());
        inner.refresh(&self.account_id);
    }

    /// Number of listings a write stays invisible for
    pub fn set_propagation_delay(&self, listings: usize) {
        self.lock().propagation_delay = listings;
    }

    /// Fail the next call of `operation` with `error`; faults queue up
    pub fn inject_fault(&self, operation: Operation, error: RemoteError) {
        self.lock()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Authoritative entries of `table_id`, ignoring propagation lag
    pub fn routes(&self, table_id: &str) -> Vec<ObservedRoute> {
        self.lock()
            .tables
            .get(table_id)
            .map(|t| t.routes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RouteTableApi for MemoryRouteTable {
    async fn list_routes(&self, table_id: &str) -> Result<Vec<ObservedRoute>, RemoteError> {
        let mut inner = self.lock();
        inner.calls.list += 1;
        inner.take_fault(Operation::List)?;

        let table = inner.table_mut(table_id)?;
        if table.lag == 0 {
            table.sync();
        } else {
            table.lag -= 1;
        }
        let listed = table.view.clone();

        for change in std::mem::take(&mut table.after_next_list) {
            match change {
                Scheduled::Insert(route) => table.upsert(route),
                Scheduled::Remove(destination) => {
                    table.remove(&destination);
                }
            }
            table.sync();
        }
        Ok(listed)
    }

    async fn create_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.calls.create += 1;
        inner.take_fault(Operation::Create)?;

        let route = inner.resolve(&self.account_id, destination, target);
        let table = inner.table_mut(table_id)?;
        if table.position(destination).is_some() {
            return Err(RemoteError::RouteAlreadyExists(destination.to_string()));
        }
        table.routes.push(route);
        inner.written(table_id);
        Ok(())
    }

    async fn replace_route(
        &self,
        table_id: &str,
        destination: &Destination,
        target: &Target,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.calls.replace += 1;
        inner.take_fault(Operation::Replace)?;

        let route = inner.resolve(&self.account_id, destination, target);
        let table = inner.table_mut(table_id)?;
        let Some(i) = table.position(destination) else {
            return Err(RemoteError::RouteNotFound(destination.to_string()));
        };
        if table.routes[i].origin == RouteOrigin::CreateRouteTable {
            return Err(RemoteError::Service {
                code: "InvalidParameterValue".to_string(),
                message: format!("cannot replace the local route {}", destination),
            });
        }
        table.routes[i] = route;
        inner.written(table_id);
        Ok(())
    }

    async fn delete_route(
        &self,
        table_id: &str,
        destination: &Destination,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.calls.delete += 1;
        inner.take_fault(Operation::Delete)?;

        let table = inner.table_mut(table_id)?;
        match table.position(destination) {
            None => return Err(RemoteError::RouteNotFound(destination.to_string())),
            Some(i) if table.routes[i].origin == RouteOrigin::CreateRouteTable => {
                return Err(RemoteError::Service {
                    code: "InvalidParameterValue".to_string(),
                    message: format!("cannot remove the local route {}", destination),
                });
            }
            Some(_) => {
                table.remove(destination);
            }
        }
        inner.written(table_id);
        Ok(())
    }
}
