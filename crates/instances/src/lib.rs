//! # Instance Registry
//!
//! Keeps native objects and the integer ids the remote side knows them by in
//! lockstep. Callbacks resolve ids on whatever thread the native widget calls
//! them from, while teardown removes instances from another, so every
//! operation takes `&self`.
//!
//! ## Philosophy
//!
//! - **Identity, not equality**: a handle is an `Arc`, and two handles are the
//!   same instance only if they point at the same allocation.
//! - **Misses are normal**: the remote side may talk about objects the native
//!   side already dropped. Lookups return `Option`, never an error.
//! - **One lock, two maps**: both directions are updated under the same write
//!   guard, so a reader can never see half of a registration.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

#[cfg(test)]
mod tests;

/// Strong type for ids exchanged across the bridge.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BridgeId(pub u64);

impl std::fmt::Display for BridgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The id is already bound to another live instance.
    IdInUse(BridgeId),
    /// The instance is already registered under a different id.
    AlreadyRegistered(BridgeId),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdInUse(id) => write!(f, "Id already in use: {}", id),
            Self::AlreadyRegistered(id) => write!(f, "Instance already registered as {}", id),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

type AnyHandle = Arc<dyn Any + Send + Sync>;

/// Address of the allocation behind an `Arc`, with any fat-pointer metadata dropped.
fn addr_of<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle).cast::<()>() as usize
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<BridgeId, AnyHandle>,
    by_addr: HashMap<usize, BridgeId>,
    next_id: u64,
}

impl Tables {
    fn allocate(&mut self) -> BridgeId {
        // Skip ids adopted through `insert_with_id`.
        loop {
            self.next_id += 1;
            let id = BridgeId(self.next_id);
            if !self.by_id.contains_key(&id) {
                return id;
            }
        }
    }

    fn bind(&mut self, id: BridgeId, addr: usize, handle: AnyHandle) {
        self.by_id.insert(id, handle);
        self.by_addr.insert(addr, id);
    }

    fn unbind(&mut self, id: BridgeId) -> Option<AnyHandle> {
        let handle = self.by_id.remove(&id)?;
        self.by_addr.remove(&addr_of(&handle));
        Some(handle)
    }
}

/// Bidirectional map between live native instances and their bridge ids.
///
/// The registry holds a strong reference to every registered instance, so an
/// address cannot be recycled by a new allocation while its id is live.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves both maps consistent, so a panic elsewhere
    // while holding the lock does not invalidate the data.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the id of `handle`, allocating one if it is not registered yet.
    pub fn register<T: Any + Send + Sync>(&self, handle: &Arc<T>) -> BridgeId {
        let addr = addr_of(handle);
        let mut tables = self.write();
        if let Some(id) = tables.by_addr.get(&addr) {
            return *id;
        }
        let id = tables.allocate();
        tables.bind(id, addr, handle.clone());
        id
    }

    /// Adopts an instance created by the remote side under the id it chose.
    pub fn insert_with_id<T: Any + Send + Sync>(&self, handle: &Arc<T>, id: BridgeId) -> Result<()> {
        let addr = addr_of(handle);
        let mut tables = self.write();
        if let Some(existing) = tables.by_addr.get(&addr) {
            if *existing == id {
                return Ok(());
            }
            return Err(Error::AlreadyRegistered(*existing));
        }
        if tables.by_id.contains_key(&id) {
            return Err(Error::IdInUse(id));
        }
        tables.bind(id, addr, handle.clone());
        Ok(())
    }

    /// Resolves an id back to its instance.
    ///
    /// Returns `None` if the id is unknown, was removed, or names an instance
    /// of a different type.
    pub fn get<T: Any + Send + Sync>(&self, id: BridgeId) -> Option<Arc<T>> {
        let handle = self.read().by_id.get(&id)?.clone();
        handle.downcast::<T>().ok()
    }

    /// Returns the id of a registered instance.
    pub fn id_of<T: ?Sized>(&self, handle: &Arc<T>) -> Option<BridgeId> {
        self.read().by_addr.get(&addr_of(handle)).copied()
    }

    /// Removes an instance and returns the id it was registered under.
    ///
    /// `None` means the instance was never registered or is already gone, and
    /// the remote side must not be told about a disposal.
    pub fn remove<T: ?Sized>(&self, handle: &Arc<T>) -> Option<BridgeId> {
        let mut tables = self.write();
        let id = tables.by_addr.get(&addr_of(handle)).copied()?;
        tables.unbind(id);
        Some(id)
    }

    /// Removes whatever instance is bound to `id`, returning whether one was.
    pub fn remove_id(&self, id: BridgeId) -> bool {
        self.write().unbind(id).is_some()
    }

    pub fn contains(&self, id: BridgeId) -> bool {
        self.read().by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every instance. Id allocation continues from where it was, so ids
    /// handed out before the clear are not issued again.
    pub fn clear(&self) {
        let mut tables = self.write();
        tables.by_id.clear();
        tables.by_addr.clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.read();
        f.debug_struct("Registry")
            .field("len", &tables.by_id.len())
            .field("next_id", &tables.next_id)
            .finish()
    }
}
