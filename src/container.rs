use alloc::{sync::Arc, vec::Vec};
use core::{any::type_name, cmp::Reverse};
use tracing::{debug, error, info_span};

use crate::{
    any::TypeInfo,
    binder::{Binder, BindingHandle},
    binding::{BindingKind, Constraint, SharedBinding},
    config::Config,
    context::InjectionContext,
    errors::{ResolveErrorKind, SetupErrorKind},
    hooks::HookFlow,
    identifier::Identifier,
    injector::{Injector, ResolveRequest},
    instance::{Instance, Resolution},
    reflection::{ReflectionInfo, TypeMeta, TypeRegistry},
    setup::BindingsSetup,
};

/// Type registry, binder and injector working together.
///
/// Cloning is cheap and clones share the same bindings.
/// Bindings are removed on [`Self::close`] or when the last clone is dropped.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: Arc<TypeRegistry>,
    binder: Binder,
    injector: Injector,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[inline]
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()), config)
    }

    /// Creates container over an existing registry, which may be shared between containers
    #[must_use]
    pub fn with_registry(registry: Arc<TypeRegistry>, config: Config) -> Self {
        let binder = Binder::new(registry.clone());
        let injector = Injector::new(binder.clone(), config);
        Self {
            inner: Arc::new(ContainerInner {
                registry,
                binder,
                injector,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    #[inline]
    #[must_use]
    pub fn binder(&self) -> &Binder {
        &self.inner.binder
    }

    #[inline]
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.inner.injector
    }

    /// Registers injection metadata of `T`
    #[inline]
    pub fn register<T: Send + Sync + 'static>(&self, meta: TypeMeta<T>) -> &Self {
        self.inner.registry.register(meta);
        self
    }

    #[inline]
    #[must_use]
    pub fn bind<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.inner.binder.bind::<T>()
    }

    #[inline]
    #[must_use]
    pub fn bind_address<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.inner.binder.bind_address::<T>()
    }

    #[inline]
    #[must_use]
    pub fn bind_singleton<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.inner.binder.bind_singleton::<T>()
    }

    #[inline]
    #[must_use]
    pub fn bind_factory<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.inner.binder.bind_factory::<T>()
    }

    #[inline]
    #[must_use]
    pub fn bind_multiton<T: ?Sized + 'static>(&self) -> BindingHandle {
        self.inner.binder.bind_multiton::<T>()
    }

    #[inline]
    #[must_use]
    pub fn bind_with(&self, type_info: TypeInfo, kind: BindingKind, constraint: Constraint) -> BindingHandle {
        self.inner.binder.bind_with(type_info, kind, constraint)
    }

    #[inline]
    pub fn unbind<T: ?Sized + 'static>(&self) {
        self.inner.binder.unbind::<T>();
    }

    #[inline]
    pub fn unbind_id<T: ?Sized + 'static>(&self, identifier: impl Into<Identifier>) {
        self.inner.binder.unbind_id::<T>(identifier);
    }

    /// # Errors
    /// See [`Injector::resolve`]
    #[inline]
    pub fn resolve<C: ?Sized + 'static>(&self) -> Result<Option<Arc<C>>, ResolveErrorKind> {
        self.inner.injector.resolve::<C>()
    }

    /// # Errors
    /// See [`Injector::resolve_id`]
    #[inline]
    pub fn resolve_id<C: ?Sized + 'static>(&self, identifier: impl Into<Identifier>) -> Result<Option<Arc<C>>, ResolveErrorKind> {
        self.inner.injector.resolve_id::<C>(identifier)
    }

    /// # Errors
    /// See [`Injector::resolve_all`]
    #[inline]
    pub fn resolve_all<C: ?Sized + 'static>(&self) -> Result<Vec<Arc<C>>, ResolveErrorKind> {
        self.inner.injector.resolve_all::<C>()
    }

    /// # Errors
    /// See [`Injector::resolve_all_id`]
    #[inline]
    pub fn resolve_all_id<C: ?Sized + 'static>(&self, identifier: impl Into<Identifier>) -> Result<Vec<Arc<C>>, ResolveErrorKind> {
        self.inner.injector.resolve_all_id::<C>(identifier)
    }

    /// # Errors
    /// See [`Injector::resolve_by_id`]
    #[inline]
    pub fn resolve_by_id(&self, identifier: impl Into<Identifier>) -> Result<Option<Instance>, ResolveErrorKind> {
        self.inner.injector.resolve_by_id(identifier)
    }

    /// # Errors
    /// See [`Injector::resolve_request`]
    #[inline]
    pub fn resolve_request(&self, request: &ResolveRequest) -> Result<Option<Resolution>, ResolveErrorKind> {
        self.inner.injector.resolve_request(request)
    }

    /// # Errors
    /// See [`Injector::inject`]
    #[inline]
    pub fn inject(&self, instance: Instance) -> Result<Instance, ResolveErrorKind> {
        self.inner.injector.inject(instance)
    }

    pub fn on_before_resolve<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Injector, &ResolveRequest, &mut Option<Resolution>) -> HookFlow + Send + Sync + 'static,
    {
        self.inner.injector.on_before_resolve(hook);
        self
    }

    pub fn on_after_resolve<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Injector, &ResolveRequest, &mut Option<Resolution>) -> HookFlow + Send + Sync + 'static,
    {
        self.inner.injector.on_after_resolve(hook);
        self
    }

    pub fn on_before_default_instantiate<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Injector, &SharedBinding, &InjectionContext) -> Option<Resolution> + Send + Sync + 'static,
    {
        self.inner.injector.on_before_default_instantiate(hook);
        self
    }

    pub fn on_after_instantiate<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Injector, &SharedBinding, Option<&Resolution>) + Send + Sync + 'static,
    {
        self.inner.injector.on_after_instantiate(hook);
        self
    }

    pub fn on_before_inject<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Injector, &mut Instance, &ReflectionInfo) + Send + Sync + 'static,
    {
        self.inner.injector.on_before_inject(hook);
        self
    }

    pub fn on_after_inject<F>(&self, hook: F) -> &Self
    where
        F: Fn(&Injector, &mut Instance, &ReflectionInfo) + Send + Sync + 'static,
    {
        self.inner.injector.on_after_inject(hook);
        self
    }

    /// # Errors
    /// Returns [`SetupErrorKind`] of the setup
    pub fn setup_bindings(&self, setup: &dyn BindingsSetup) -> Result<&Self, SetupErrorKind> {
        debug!(priority = setup.priority(), "Setting up bindings");
        if let Err(err) = setup.setup_bindings(self) {
            error!("{}", err);
            return Err(err);
        }
        Ok(self)
    }

    /// Resolves the setup through the container, instantiating it even if it isn't bound, and runs it
    ///
    /// # Errors
    /// - Returns [`SetupErrorKind::Resolve`] if the setup can't be resolved
    /// - Returns [`SetupErrorKind::Unresolved`] if a hook discarded the setup
    /// - Returns [`SetupErrorKind`] of the setup
    pub fn setup<S: BindingsSetup + Send + Sync + 'static>(&self) -> Result<&Self, SetupErrorKind> {
        let span = info_span!("setup", setup = type_name::<S>());
        let _guard = span.enter();

        let request = ResolveRequest::of::<S>().always_resolve();
        let Some(resolution) = self.inner.injector.resolve_request(&request)? else {
            let err = SetupErrorKind::Unresolved {
                type_info: TypeInfo::of::<S>(),
            };
            error!("{}", err);
            return Err(err);
        };
        let setup = resolution.single::<S>()?;

        self.setup_bindings(&*setup)
    }

    /// Runs the setups by descending priority
    ///
    /// # Errors
    /// Returns [`SetupErrorKind`] of the first failed setup, the following ones don't run
    pub fn setup_all<'a>(&self, setups: impl IntoIterator<Item = &'a dyn BindingsSetup>) -> Result<&Self, SetupErrorKind> {
        let mut setups = setups.into_iter().collect::<Vec<_>>();
        setups.sort_by_key(|setup| Reverse(setup.priority()));

        for setup in setups {
            self.setup_bindings(setup)?;
        }
        Ok(self)
    }

    /// Removes every binding, the container stays usable
    #[inline]
    pub fn close(&self) {
        self.inner.binder.clear();
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        self.binder.clear();
        debug!("Container closed on drop");
    }
}
