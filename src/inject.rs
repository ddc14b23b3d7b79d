use alloc::{sync::Arc, vec::Vec};
use core::fmt::{self, Debug, Formatter};
use parking_lot::Mutex;

/// Slot for a dependency injected after construction.
///
/// Declared as a field and exposed to the injector with [`crate::TypeMeta::field`].
/// The injector only fills empty slots.
pub struct Inject<Dep: ?Sized> {
    slot: Mutex<Option<Arc<Dep>>>,
}

impl<Dep: ?Sized> Inject<Dep> {
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self { slot: Mutex::new(None) }
    }

    #[inline]
    #[must_use]
    pub fn new(value: Arc<Dep>) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<Arc<Dep>> {
        self.slot.lock().clone()
    }

    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    #[inline]
    pub fn set(&self, value: Arc<Dep>) {
        *self.slot.lock() = Some(value);
    }
}

impl<Dep: ?Sized> Default for Inject<Dep> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<Dep: ?Sized> Debug for Inject<Dep> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject").field("is_set", &self.is_set()).finish()
    }
}

/// Slot for every instance bound to a contract, in binding order.
pub struct InjectMany<Dep: ?Sized> {
    slot: Mutex<Option<Vec<Arc<Dep>>>>,
}

impl<Dep: ?Sized> InjectMany<Dep> {
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self { slot: Mutex::new(None) }
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Vec<Arc<Dep>> {
        self.slot.lock().clone().unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    #[inline]
    pub fn set(&self, values: Vec<Arc<Dep>>) {
        *self.slot.lock() = Some(values);
    }
}

impl<Dep: ?Sized> Default for InjectMany<Dep> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<Dep: ?Sized> Debug for InjectMany<Dep> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectMany").field("is_set", &self.is_set()).finish()
    }
}
