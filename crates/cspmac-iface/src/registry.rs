use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{IfaceError, Result};
use crate::iface::Interface;

/// The stack's list of registered interfaces.
///
/// Names are matched case-insensitively and must be unique.
#[derive(Default)]
pub struct InterfaceRegistry {
    ifaces: RwLock<Vec<Arc<Interface>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interface, rejecting duplicate names.
    pub fn add(&self, iface: Arc<Interface>) -> Result<()> {
        let mut ifaces = self.write();
        if ifaces
            .iter()
            .any(|existing| existing.name().eq_ignore_ascii_case(iface.name()))
        {
            return Err(IfaceError::AlreadyRegistered(iface.name().to_string()));
        }
        debug!(iface = %iface.name(), "adding interface to registry");
        ifaces.push(iface);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Interface>> {
        self.read()
            .iter()
            .find(|iface| iface.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Interface>> {
        let mut ifaces = self.write();
        let pos = ifaces
            .iter()
            .position(|iface| iface.name().eq_ignore_ascii_case(name))?;
        Some(ifaces.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of the registered interfaces, in registration order.
    pub fn interfaces(&self) -> Vec<Arc<Interface>> {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Interface>>> {
        self.ifaces.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Interface>>> {
        self.ifaces.write().unwrap_or_else(PoisonError::into_inner)
    }
}
