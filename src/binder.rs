use alloc::{boxed::Box, collections::BTreeMap, sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    binding::{Binding, BindingKind, BindingValue, Condition, Constraint, SharedBinding},
    context::InjectionContext,
    errors::{BindingErrorKind, ResolveErrorKind},
    factory::{factory_instance, InjectionFactory},
    identifier::Identifier,
    instance::Instance,
    reflection::ReflectionCache,
};

/// Called with every binding right before it's stored
pub type BeforeAddHook = Arc<dyn Fn(&Binder, &SharedBinding) -> Result<(), ResolveErrorKind> + Send + Sync>;

/// Storage of bindings indexed by contract type.
///
/// Bindings are stored when configured through a [`BindingHandle`], and stored again after each change.
#[derive(Clone)]
pub struct Binder {
    inner: Arc<BinderInner>,
}

struct BinderInner {
    reflection: Arc<dyn ReflectionCache>,
    bindings: Mutex<BTreeMap<TypeInfo, Vec<SharedBinding>>>,
    /// Instances held by stored bindings, keyed by address
    instances: Mutex<BTreeMap<usize, Instance>>,
    before_add: Mutex<Vec<BeforeAddHook>>,
}

impl Binder {
    #[must_use]
    pub fn new(reflection: Arc<dyn ReflectionCache>) -> Self {
        Self {
            inner: Arc::new(BinderInner {
                reflection,
                bindings: Mutex::new(BTreeMap::new()),
                instances: Mutex::new(BTreeMap::new()),
                before_add: Mutex::new(Vec::new()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn reflection(&self) -> &dyn ReflectionCache {
        &*self.inner.reflection
    }

    /// Starts a binding of `T` that isn't configured yet.
    /// It becomes a singleton once an instance is assigned to it.
    #[inline]
    #[must_use]
    pub fn bind<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.bind_with(TypeInfo::of::<T>(), BindingKind::Temp, Constraint::Single)
    }

    #[inline]
    #[must_use]
    pub fn bind_address<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.bind_with(TypeInfo::of::<T>(), BindingKind::Address, Constraint::Single)
    }

    #[inline]
    #[must_use]
    pub fn bind_singleton<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.bind_with(TypeInfo::of::<T>(), BindingKind::Singleton, Constraint::Single)
    }

    #[inline]
    #[must_use]
    pub fn bind_factory<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.bind_with(TypeInfo::of::<T>(), BindingKind::Factory, Constraint::Single)
    }

    #[inline]
    #[must_use]
    pub fn bind_multiton<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.bind_with(TypeInfo::of::<T>(), BindingKind::Multiton, Constraint::Multiple)
    }

    /// The binding isn't stored until it's configured through the returned handle
    #[must_use]
    pub fn bind_with(&self, type_info: TypeInfo, kind: BindingKind, constraint: Constraint) -> BindingHandle {
        BindingHandle {
            binder: self.clone(),
            binding: Arc::new(Mutex::new(Binding::new(type_info, kind, constraint))),
        }
    }

    #[inline]
    pub fn subscribe_before_add(&self, hook: BeforeAddHook) {
        self.inner.before_add.lock().push(hook);
    }

    /// Stores the binding, once per binding.
    /// A binding with an identifier replaces the other bindings of its type with an equal identifier.
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if one of the subscribers failed, the binding isn't stored in that case
    pub fn store(&self, binding: &SharedBinding) -> Result<(), BindingErrorKind> {
        let type_info = binding.lock().type_info();

        let hooks = self.inner.before_add.lock().clone();
        for hook in hooks {
            if let Err(err) = hook(self, binding) {
                let err = BindingErrorKind::Store {
                    type_info,
                    source: Box::new(err),
                };
                error!("{}", err);
                return Err(err);
            }
        }

        let identifier = binding.lock().identifier().cloned();
        let evicted = {
            let mut bindings = self.inner.bindings.lock();
            let stored = bindings.entry(type_info).or_default();

            let len = stored.len();
            if let Some(identifier) = &identifier {
                stored.retain(|other| Arc::ptr_eq(other, binding) || !other.lock().matches_identifier(Some(identifier)));
            }
            let evicted = len - stored.len();

            if !stored.iter().any(|other| Arc::ptr_eq(other, binding)) {
                stored.push(binding.clone());
            }
            evicted
        };

        if evicted > 0 {
            debug!(type_info = type_info.name, evicted, "Replaced bindings with equal identifier");
            self.refresh_instances();
        } else {
            let instances = binding.lock().instances().cloned().collect::<Vec<_>>();
            for instance in instances {
                self.track_instance(instance);
            }
        }

        debug!(type_info = type_info.name, "Binding stored");
        Ok(())
    }

    /// The binding of `type_info` with exactly this identifier
    #[must_use]
    pub fn get_binding(&self, type_info: &TypeInfo, identifier: Option<&Identifier>) -> Option<SharedBinding> {
        self.get_all_for_type(type_info)
            .into_iter()
            .find(|binding| binding.lock().matches_identifier(identifier))
    }

    /// Every binding of `type_info`, in storage order
    #[must_use]
    pub fn get_all_for_type(&self, type_info: &TypeInfo) -> Vec<SharedBinding> {
        self.inner.bindings.lock().get(type_info).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn get_by_predicate(&self, predicate: impl Fn(&Binding) -> bool) -> Vec<SharedBinding> {
        self.all().into_iter().filter(|binding| predicate(&*binding.lock())).collect()
    }

    /// Every stored binding, ordered by type and then by storage order
    #[must_use]
    pub fn all(&self) -> Vec<SharedBinding> {
        self.inner.bindings.lock().values().flatten().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.bindings.lock().values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the instance is held by one of the stored bindings
    #[must_use]
    pub fn contains_instance(&self, instance: &Instance) -> bool {
        self.inner.instances.lock().contains_key(&instance.addr())
    }

    pub(crate) fn track_instance(&self, instance: Instance) {
        self.inner.instances.lock().insert(instance.addr(), instance);
    }

    /// Removes every binding of `T`
    pub fn unbind<T: ?Sized + 'static>(&self) {
        self.unbind_type(&TypeInfo::of::<T>());
    }

    pub fn unbind_type(&self, type_info: &TypeInfo) {
        let removed = self.inner.bindings.lock().remove(type_info);
        if let Some(removed) = removed {
            debug!(type_info = type_info.name, count = removed.len(), "Unbound");
            self.refresh_instances();
        }
    }

    /// Removes the binding of `T` with exactly this identifier
    pub fn unbind_id<T: ?Sized + 'static>(&self, identifier: impl Into<Identifier>) {
        if let Some(binding) = self.get_binding(&TypeInfo::of::<T>(), Some(&identifier.into())) {
            self.remove(&binding);
        }
    }

    /// Removes the binding, doing nothing if it isn't stored
    pub fn remove(&self, binding: &SharedBinding) {
        let type_info = binding.lock().type_info();
        let removed = {
            let mut bindings = self.inner.bindings.lock();
            match bindings.get_mut(&type_info) {
                Some(stored) => {
                    let len = stored.len();
                    stored.retain(|other| !Arc::ptr_eq(other, binding));
                    let removed = len != stored.len();
                    if stored.is_empty() {
                        bindings.remove(&type_info);
                    }
                    removed
                }
                None => false,
            }
        };

        if removed {
            debug!(type_info = type_info.name, "Binding removed");
            self.refresh_instances();
        }
    }

    pub fn clear(&self) {
        let bindings = core::mem::take(&mut *self.inner.bindings.lock());
        self.inner.instances.lock().clear();
        debug!(count = bindings.values().map(Vec::len).sum::<usize>(), "Bindings cleared");
    }

    /// Rebuilds the known instances from the stored bindings
    pub(crate) fn refresh_instances(&self) {
        let instances = self
            .all()
            .iter()
            .flat_map(|binding| binding.lock().instances().cloned().collect::<Vec<_>>())
            .map(|instance| (instance.addr(), instance))
            .collect::<BTreeMap<_, _>>();
        *self.inner.instances.lock() = instances;
    }
}

/// Configures a binding and stores it after each change
#[derive(Clone)]
pub struct BindingHandle {
    binder: Binder,
    binding: SharedBinding,
}

impl BindingHandle {
    #[inline]
    #[must_use]
    pub fn binding(&self) -> &SharedBinding {
        &self.binding
    }

    /// Binds to a type instantiated by the injector
    ///
    /// # Errors
    /// - Returns [`BindingErrorKind::TypeMismatch`] if `C` isn't assignable to the binding
    /// - Returns [`BindingErrorKind::Store`] if storing failed
    pub fn to_type<C: ?Sized + 'static>(self) -> Result<Self, BindingErrorKind> {
        self.to_value(BindingValue::of_type::<C>())
    }

    /// Binds to an existing value. An unconfigured binding becomes a singleton.
    ///
    /// # Errors
    /// Same as [`Self::to_type`]
    pub fn to_instance<T: Send + Sync + 'static>(self, value: T) -> Result<Self, BindingErrorKind> {
        self.to_value(Instance::from_value(value).into())
    }

    /// # Errors
    /// Same as [`Self::to_type`]
    pub fn to_value(self, value: BindingValue) -> Result<Self, BindingErrorKind> {
        self.update(|binding, reflection| binding.to(value, reflection))
    }

    /// # Errors
    /// - Returns [`BindingErrorKind::ConstraintViolation`] if the binding has single constraint
    /// - Returns [`BindingErrorKind::TypeMismatch`] if one of the values isn't assignable to the binding
    /// - Returns [`BindingErrorKind::Store`] if storing failed
    pub fn to_values(self, values: impl IntoIterator<Item = BindingValue>) -> Result<Self, BindingErrorKind> {
        self.update(|binding, reflection| binding.to_many(values, reflection))
    }

    /// Makes the binding a factory binding that creates its instances with `factory`
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if storing failed
    pub fn to_factory<F: InjectionFactory + 'static>(self, factory: F) -> Result<Self, BindingErrorKind> {
        self.update(|binding, reflection| {
            binding.set_kind(BindingKind::Factory);
            binding.to(factory_instance(factory).into(), reflection)
        })
    }

    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if storing failed
    pub fn to_self(self) -> Result<Self, BindingErrorKind> {
        self.update(|binding, _| {
            binding.to_self();
            Ok(())
        })
    }

    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if storing failed
    pub fn as_id(self, identifier: impl Into<Identifier>) -> Result<Self, BindingErrorKind> {
        let identifier = identifier.into();
        self.update(|binding, _| {
            binding.set_identifier(Some(identifier));
            Ok(())
        })
    }

    /// Serves only requests the condition accepts
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if storing failed
    pub fn when<F>(self, condition: F) -> Result<Self, BindingErrorKind>
    where
        F: Fn(&InjectionContext) -> bool + Send + Sync + 'static,
    {
        self.with_condition(Arc::new(condition))
    }

    /// Serves only injections into members of `P`
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if storing failed
    pub fn into_parent<P: ?Sized + 'static>(self) -> Result<Self, BindingErrorKind> {
        let parent = TypeInfo::of::<P>();
        self.with_condition(Arc::new(move |context: &InjectionContext| context.parent_type == Some(parent)))
    }

    /// Serves only injections into members of this instance
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::Store`] if storing failed
    pub fn when_parent_instance(self, instance: Instance) -> Result<Self, BindingErrorKind> {
        self.with_condition(Arc::new(move |context: &InjectionContext| context.parent_instance.as_ref() == Some(&instance)))
    }

    /// Removal doesn't store the binding again, so store subscribers aren't notified
    #[must_use]
    pub fn remove_value(self, value: &BindingValue) -> Self {
        self.binding.lock().remove_value(value);
        self.binder.refresh_instances();
        self
    }

    /// Like [`Self::remove_value`], the binding isn't stored again
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::ConstraintViolation`] if the binding has single constraint
    pub fn remove_values(self, values: &[BindingValue]) -> Result<Self, BindingErrorKind> {
        let result = self.binding.lock().remove_values(values);
        if let Err(err) = result {
            error!("{}", err);
            return Err(err);
        }
        self.binder.refresh_instances();
        Ok(self)
    }

    fn with_condition(self, condition: Condition) -> Result<Self, BindingErrorKind> {
        self.update(|binding, _| {
            binding.set_condition(condition);
            Ok(())
        })
    }

    fn update<F>(self, change: F) -> Result<Self, BindingErrorKind>
    where
        F: FnOnce(&mut Binding, &dyn ReflectionCache) -> Result<(), BindingErrorKind>,
    {
        let result = change(&mut *self.binding.lock(), self.binder.reflection());
        if let Err(err) = result {
            error!("{}", err);
            return Err(err);
        }
        self.binder.store(&self.binding)?;
        Ok(self)
    }
}
