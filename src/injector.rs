use alloc::{boxed::Box, sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    any::{TypeInfo, TypeKey},
    binder::Binder,
    binding::{BindingKind, BindingValue, Constraint, SharedBinding},
    config::{Config, ResolutionMode},
    context::{InjectionContext, InjectionSite},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    factory::InjectionFactory,
    hooks::{HookFlow, Hooks},
    identifier::Identifier,
    instance::{Instance, InstanceArray, RcAny, Resolution},
    reflection::{AccessorInfo, Arguments, MethodInfo, ParameterInfo, ReflectionInfo},
};

/// What to resolve and where the result goes
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// Requested type, absent for requests by identifier only
    pub key: Option<TypeKey>,
    pub identifier: Option<Identifier>,
    pub site: InjectionSite,
    pub member_name: Option<&'static str>,
    /// Instance whose member is being injected
    pub parent: Option<Instance>,
    /// Instantiate the requested type when nothing is bound, whatever the resolution mode is
    pub always_resolve: bool,
}

impl ResolveRequest {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::key(TypeKey::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn array_of<T: ?Sized + 'static>() -> Self {
        Self::key(TypeKey::array_of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn key(key: TypeKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Request of every binding with this identifier, whatever their types are
    #[inline]
    #[must_use]
    pub fn by_id(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_id(mut self, identifier: impl Into<Identifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn always_resolve(mut self) -> Self {
        self.always_resolve = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn at(mut self, site: InjectionSite, member_name: &'static str, parent: Option<Instance>) -> Self {
        self.site = site;
        self.member_name = Some(member_name);
        self.parent = parent;
        self
    }

    fn is_array(&self) -> bool {
        self.key.map_or(true, |key| key.is_array)
    }

    fn type_name(&self) -> &'static str {
        self.key.map_or("<any>", |key| key.element.name)
    }
}

/// Resolves requests against the bindings of a [`Binder`], instantiating and injecting what's needed.
///
/// Instances stored into the binder are injected once, when their binding is stored.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

struct InjectorInner {
    binder: Binder,
    resolution_mode: Mutex<ResolutionMode>,
    hooks: Hooks,
}

impl Injector {
    #[must_use]
    pub fn new(binder: Binder, config: Config) -> Self {
        let injector = Self {
            inner: Arc::new(InjectorInner {
                binder,
                resolution_mode: Mutex::new(config.resolution_mode),
                hooks: Hooks::default(),
            }),
        };

        let weak = Arc::downgrade(&injector.inner);
        injector.inner.binder.subscribe_before_add(Arc::new(move |binder: &Binder, binding: &SharedBinding| {
            match weak.upgrade() {
                Some(inner) => Injector { inner }.inject_new_instances(binder, binding),
                None => Ok(()),
            }
        }));

        injector
    }

    #[inline]
    #[must_use]
    pub fn binder(&self) -> &Binder {
        &self.inner.binder
    }

    #[inline]
    #[must_use]
    pub fn resolution_mode(&self) -> ResolutionMode {
        *self.inner.resolution_mode.lock()
    }

    #[inline]
    pub fn set_resolution_mode(&self, resolution_mode: ResolutionMode) {
        *self.inner.resolution_mode.lock() = resolution_mode;
    }

    /// Runs before the lookup. Returning [`HookFlow::Stop`] ends the resolution with the current result.
    pub fn on_before_resolve<F>(&self, hook: F)
    where
        F: Fn(&Injector, &ResolveRequest, &mut Option<Resolution>) -> HookFlow + Send + Sync + 'static,
    {
        self.inner.hooks.before_resolve.push(Arc::new(hook));
    }

    /// Runs after aggregation and may replace the result. It isn't called for unmatched requests in strict mode.
    pub fn on_after_resolve<F>(&self, hook: F)
    where
        F: Fn(&Injector, &ResolveRequest, &mut Option<Resolution>) -> HookFlow + Send + Sync + 'static,
    {
        self.inner.hooks.after_resolve.push(Arc::new(hook));
    }

    pub fn on_before_default_instantiate<F>(&self, hook: F)
    where
        F: Fn(&Injector, &SharedBinding, &InjectionContext) -> Option<Resolution> + Send + Sync + 'static,
    {
        self.inner.hooks.before_default_instantiate.push(Arc::new(hook));
    }

    pub fn on_after_instantiate<F>(&self, hook: F)
    where
        F: Fn(&Injector, &SharedBinding, Option<&Resolution>) + Send + Sync + 'static,
    {
        self.inner.hooks.after_instantiate.push(Arc::new(hook));
    }

    pub fn on_before_inject<F>(&self, hook: F)
    where
        F: Fn(&Injector, &mut Instance, &ReflectionInfo) + Send + Sync + 'static,
    {
        self.inner.hooks.before_inject.push(Arc::new(hook));
    }

    pub fn on_after_inject<F>(&self, hook: F)
    where
        F: Fn(&Injector, &mut Instance, &ReflectionInfo) + Send + Sync + 'static,
    {
        self.inner.hooks.after_inject.push(Arc::new(hook));
    }

    /// Resolves `C`: a single instance, or `None` if nothing matched in strict mode
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Multiple`] if several instances were resolved
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the instance can't be viewed as `C`
    /// - Returns [`ResolveErrorKind`] of the resolution itself
    pub fn resolve<C: ?Sized + 'static>(&self) -> Result<Option<Arc<C>>, ResolveErrorKind> {
        self.resolve_single(&ResolveRequest::of::<C>())
    }

    /// # Errors
    /// Same as [`Self::resolve`]
    pub fn resolve_id<C: ?Sized + 'static>(&self, identifier: impl Into<Identifier>) -> Result<Option<Arc<C>>, ResolveErrorKind> {
        self.resolve_single(&ResolveRequest::of::<C>().with_id(identifier))
    }

    /// Resolves every instance bound to `C`, in binding order
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::IncorrectType`] if one of the instances can't be viewed as `C`
    /// - Returns [`ResolveErrorKind`] of the resolution itself
    pub fn resolve_all<C: ?Sized + 'static>(&self) -> Result<Vec<Arc<C>>, ResolveErrorKind> {
        self.resolve_many(&ResolveRequest::array_of::<C>())
    }

    /// # Errors
    /// Same as [`Self::resolve_all`]
    pub fn resolve_all_id<C: ?Sized + 'static>(&self, identifier: impl Into<Identifier>) -> Result<Vec<Arc<C>>, ResolveErrorKind> {
        self.resolve_many(&ResolveRequest::array_of::<C>().with_id(identifier))
    }

    /// Resolves the bindings with this identifier, whatever their types are, returning the first instance
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind`] of the resolution itself
    pub fn resolve_by_id(&self, identifier: impl Into<Identifier>) -> Result<Option<Instance>, ResolveErrorKind> {
        let resolution = self.resolve_request(&ResolveRequest::by_id(identifier))?;
        Ok(resolution.and_then(|resolution| resolution.first().cloned()))
    }

    /// Resolves a request.
    ///
    /// Without matching bindings, the requested type is instantiated if the resolution mode or the request allows it,
    /// otherwise `None` is returned.
    /// With several instances, or for array requests, the result is [`Resolution::Array`].
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Instantiate`] if an instance can't be created
    /// - Returns [`ResolveErrorKind::Inject`] if an instance's member can't be injected
    pub fn resolve_request(&self, request: &ResolveRequest) -> Result<Option<Resolution>, ResolveErrorKind> {
        let span = info_span!("resolve", type_name = request.type_name(), identifier = ?request.identifier);
        let _guard = span.enter();

        let mut result = None;
        if Hooks::run_resolve(&self.inner.hooks.before_resolve, self, request, &mut result) == HookFlow::Stop {
            debug!("Resolved by hook");
            return Ok(result);
        }

        let bindings = self.lookup(request);
        let mut instances = Vec::new();

        if bindings.is_empty() {
            let always_resolve = request.always_resolve || self.resolution_mode() == ResolutionMode::AlwaysResolve;
            match request.key {
                Some(key) if always_resolve => {
                    debug!("No bindings found, instantiating");
                    instances.push(self.instantiate(key.element)?);
                }
                _ => {
                    debug!("No bindings found");
                    return Ok(None);
                }
            }
        } else {
            debug!(count = bindings.len(), "Bindings found");
            for binding in &bindings {
                if let Some(resolution) = self.resolve_binding(binding, request)? {
                    instances.extend(resolution.into_instances());
                }
            }
        }

        if instances.len() == 1 && !request.is_array() {
            result = instances.pop().map(Resolution::Instance);
        } else if !instances.is_empty() {
            result = Some(Resolution::Array(InstanceArray {
                element: request.key.map(|key| key.element),
                instances,
            }));
        }

        Hooks::run_resolve(&self.inner.hooks.after_resolve, self, request, &mut result);
        Ok(result)
    }

    /// Injects the members of the instance that aren't set yet
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::Inject`] for the first member that can't be injected
    pub fn inject(&self, instance: Instance) -> Result<Instance, ResolveErrorKind> {
        let type_info = instance.type_info();
        let info = self
            .reflection_info(&type_info)
            .unwrap_or_else(|| Arc::new(ReflectionInfo::empty(type_info)));
        self.inject_with(instance, &info)
    }

    /// Creates an instance of the concrete type and injects it
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::Interface`] for trait objects
    /// - Returns [`InstantiateErrorKind::NoConstructor`] if the type has no registered constructor
    /// - Returns [`ResolveErrorKind::Inject`] if a constructor parameter or a member can't be injected
    pub fn instantiate(&self, type_info: TypeInfo) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("instantiate", type_info = type_info.name);
        let _guard = span.enter();

        if type_info.is_interface() {
            let err = ResolveErrorKind::Instantiate(InstantiateErrorKind::Interface { type_info });
            error!("{}", err);
            return Err(err);
        }

        let Some(info) = self.reflection_info(&type_info).filter(|info| info.has_constructor()) else {
            let err = ResolveErrorKind::Instantiate(InstantiateErrorKind::NoConstructor { type_info });
            error!("{}", err);
            return Err(err);
        };

        let value = self.construct(&info)?;
        let instance = Instance::from_parts(info.type_info, value, info.upcasts.clone());
        debug!("Instantiated");

        self.inject_with(instance, &info)
    }

    fn resolve_single<C: ?Sized + 'static>(&self, request: &ResolveRequest) -> Result<Option<Arc<C>>, ResolveErrorKind> {
        match self.resolve_request(request)? {
            Some(resolution) => resolution.single::<C>().map(Some).map_err(|err| {
                error!("{}", err);
                err
            }),
            None => Ok(None),
        }
    }

    fn resolve_many<C: ?Sized + 'static>(&self, request: &ResolveRequest) -> Result<Vec<Arc<C>>, ResolveErrorKind> {
        match self.resolve_request(request)? {
            Some(resolution) => resolution.all::<C>().map_err(|err| {
                error!("{}", err);
                err
            }),
            None => Ok(Vec::new()),
        }
    }

    fn reflection_info(&self, type_info: &TypeInfo) -> Option<Arc<ReflectionInfo>> {
        self.inner.binder.reflection().info(type_info)
    }

    fn lookup(&self, request: &ResolveRequest) -> Vec<SharedBinding> {
        let binder = &self.inner.binder;
        match (&request.key, &request.identifier) {
            (Some(key), Some(identifier)) => binder.get_binding(&key.element, Some(identifier)).into_iter().collect(),
            (Some(key), None) => binder.get_all_for_type(&key.element),
            (None, Some(identifier)) => binder.get_by_predicate(|binding| binding.identifier() == Some(identifier)),
            (None, None) => Vec::new(),
        }
    }

    fn resolve_binding(&self, binding: &SharedBinding, request: &ResolveRequest) -> Result<Option<Resolution>, ResolveErrorKind> {
        let (type_info, condition, matches_identifier) = {
            let binding = binding.lock();
            (
                binding.type_info(),
                binding.condition().cloned(),
                binding.matches_identifier(request.identifier.as_ref()),
            )
        };

        let context = InjectionContext {
            site: request.site,
            member_type: request.key,
            member_name: request.member_name,
            parent_type: request.parent.as_ref().map(Instance::type_info),
            parent_instance: request.parent.clone(),
            identifier: request.identifier.clone(),
            inject_type: type_info,
        };

        if let Some(condition) = condition {
            if !condition(&context) {
                debug!(type_info = type_info.name, "Binding skipped by condition");
                return Ok(None);
            }
        }
        if !matches_identifier {
            return Ok(None);
        }

        let resolution = match self.inner.hooks.run_instantiate(self, binding, &context) {
            Some(resolution) => Some(resolution),
            None => self.instantiate_binding(binding, &context)?,
        };

        self.inner.hooks.run_after_instantiate(self, binding, resolution.as_ref());
        Ok(resolution)
    }

    fn instantiate_binding(&self, binding: &SharedBinding, context: &InjectionContext) -> Result<Option<Resolution>, ResolveErrorKind> {
        let (type_info, kind, constraint, values) = {
            let binding = binding.lock();
            (binding.type_info(), binding.kind(), binding.constraint(), binding.values().to_vec())
        };

        match kind {
            BindingKind::Temp | BindingKind::Address => {
                let instances = values
                    .iter()
                    .map(|value| match value {
                        BindingValue::Type(concrete) => self.instantiate(*concrete),
                        BindingValue::Instance(instance) => Ok(instance.clone()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(match constraint {
                    Constraint::Single => instances.into_iter().next().map(Resolution::Instance),
                    Constraint::Multiple if instances.is_empty() => None,
                    Constraint::Multiple => Some(Resolution::Array(InstanceArray {
                        element: Some(type_info),
                        instances,
                    })),
                })
            }
            BindingKind::Factory => {
                let Some(value) = values.first() else {
                    return Ok(None);
                };
                let factory = self.cached(binding, 0, value)?;
                let Some(create) = factory.downcast::<dyn InjectionFactory>() else {
                    let err = ResolveErrorKind::IncorrectType {
                        expected: TypeInfo::of::<dyn InjectionFactory>(),
                        actual: factory.type_info(),
                    };
                    error!("{}", err);
                    return Err(err);
                };

                match create.create(context) {
                    Ok(instance) => {
                        debug!(type_info = type_info.name, "Created by factory");
                        Ok(Some(Resolution::Instance(instance)))
                    }
                    Err(err) => {
                        error!("{}", err);
                        Err(err.into())
                    }
                }
            }
            BindingKind::Singleton => match values.first() {
                Some(value) => Ok(Some(Resolution::Instance(self.cached(binding, 0, value)?))),
                None => Ok(None),
            },
            BindingKind::Multiton => {
                let instances = values
                    .iter()
                    .enumerate()
                    .map(|(index, value)| self.cached(binding, index, value))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Some(Resolution::Array(InstanceArray {
                    element: Some(type_info),
                    instances,
                })))
            }
        }
    }

    /// Instance of a binding's value, instantiating a type and storing the instance in its place
    fn cached(&self, binding: &SharedBinding, index: usize, value: &BindingValue) -> Result<Instance, ResolveErrorKind> {
        let concrete = match value {
            BindingValue::Instance(instance) => return Ok(instance.clone()),
            BindingValue::Type(concrete) => concrete,
        };

        let created = self.instantiate(*concrete)?;
        let promoted = binding.lock().promote(index, concrete, created.clone());
        match promoted {
            Some(instance) => {
                debug!(type_info = concrete.name, index, "Promoted");
                self.inner.binder.track_instance(instance.clone());
                Ok(instance)
            }
            None => Ok(created),
        }
    }

    fn construct(&self, info: &ReflectionInfo) -> Result<RcAny, ResolveErrorKind> {
        let type_info = info.type_info;
        let parameters = &info.constructor_parameters;

        let value = match (&info.constructor, &info.params_constructor) {
            (Some(constructor), _) if parameters.is_empty() => constructor(),
            (_, Some(constructor)) => {
                let values = self.resolve_parameters(parameters, InjectionSite::Constructor, None, |parameter| {
                    (parameter.name, type_info)
                })?;
                constructor(&Arguments::new(parameters, values))
            }
            (_, None) => Err(InstantiateErrorKind::NoConstructor { type_info }),
        };

        value.map_err(|err| {
            let err = ResolveErrorKind::Instantiate(err);
            error!("{}", err);
            err
        })
    }

    fn inject_with(&self, mut instance: Instance, info: &ReflectionInfo) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("inject", type_info = info.type_info.name);
        let _guard = span.enter();

        Hooks::run_inject(&self.inner.hooks.before_inject, self, &mut instance, info);

        for field in &info.fields {
            self.inject_accessor(&instance, field, InjectionSite::Field)?;
        }
        for property in &info.properties {
            self.inject_accessor(&instance, property, InjectionSite::Property)?;
        }
        for method in &info.methods {
            self.inject_method(&instance, method)?;
        }

        Hooks::run_inject(&self.inner.hooks.after_inject, self, &mut instance, info);

        if info.has_members() {
            debug!("Injected");
        }
        Ok(instance)
    }

    fn inject_accessor(&self, instance: &Instance, accessor: &AccessorInfo, site: InjectionSite) -> Result<(), ResolveErrorKind> {
        if (accessor.probe)(instance) {
            return Ok(());
        }

        let request = ResolveRequest {
            key: Some(accessor.key),
            identifier: accessor.identifier.clone(),
            site,
            member_name: Some(accessor.name),
            parent: Some(instance.clone()),
            always_resolve: false,
        };

        let result = match self.resolve_request(&request) {
            Ok(Some(resolution)) => (accessor.setter)(instance, &resolution),
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        result.map_err(|source| injection_error(site, accessor.name, instance.type_info(), source))
    }

    fn inject_method(&self, instance: &Instance, method: &MethodInfo) -> Result<(), ResolveErrorKind> {
        let owner = instance.type_info();
        let values = self.resolve_parameters(&method.parameters, InjectionSite::Method, Some(instance), |_| (method.name, owner))?;

        (method.invoker)(instance, &Arguments::new(&method.parameters, values))
            .map_err(|err| injection_error(InjectionSite::Method, method.name, owner, err.into()))
    }

    /// Resolves parameters in declaration order, wrapping a failure with the member `describe` returns
    fn resolve_parameters<D>(
        &self,
        parameters: &[ParameterInfo],
        site: InjectionSite,
        parent: Option<&Instance>,
        describe: D,
    ) -> Result<Vec<Option<Resolution>>, ResolveErrorKind>
    where
        D: Fn(&ParameterInfo) -> (&'static str, TypeInfo),
    {
        parameters
            .iter()
            .map(|parameter| {
                let request = ResolveRequest {
                    key: Some(parameter.key),
                    identifier: parameter.identifier.clone(),
                    site,
                    member_name: Some(parameter.name),
                    parent: parent.cloned(),
                    always_resolve: false,
                };
                self.resolve_request(&request).map_err(|source| {
                    let (member, owner) = describe(parameter);
                    injection_error(site, member, owner, source)
                })
            })
            .collect()
    }

    /// Injects instances of a binding that's about to be stored, unless the binder already holds them
    fn inject_new_instances(&self, binder: &Binder, binding: &SharedBinding) -> Result<(), ResolveErrorKind> {
        let instances = binding.lock().instances().cloned().collect::<Vec<_>>();
        for instance in instances {
            if binder.contains_instance(&instance) {
                continue;
            }
            self.inject(instance)?;
        }
        Ok(())
    }
}

fn injection_error(site: InjectionSite, member: &'static str, owner: TypeInfo, source: ResolveErrorKind) -> ResolveErrorKind {
    let err = ResolveErrorKind::Inject {
        site,
        member,
        owner,
        source: Box::new(source),
    };
    error!("{}", err);
    err
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::{format, string::{String, ToString}};

    use super::{Injector, ResolveRequest};
    use crate::{
        any::TypeInfo,
        binder::Binder,
        binding::{BindingKind, BindingValue, Constraint, SharedBinding},
        config::{Config, ResolutionMode},
        context::{InjectionContext, InjectionSite},
        errors::{InstantiateErrorKind, ResolveErrorKind},
        hooks::HookFlow,
        inject::Inject,
        instance::{Instance, Resolution},
        reflection::{Arguments, ParameterInfo, ReflectionInfo, TypeMeta, TypeRegistry},
    };

    use alloc::{sync::Arc, vec::Vec};
    use core::sync::atomic::{AtomicU8, Ordering};
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    trait Logger: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct ConsoleLogger;
    struct FileLogger;

    impl Logger for ConsoleLogger {
        fn name(&self) -> &'static str {
            "console"
        }
    }

    impl Logger for FileLogger {
        fn name(&self) -> &'static str {
            "file"
        }
    }

    struct Service {
        logger: Inject<dyn Logger>,
    }

    struct Widget;

    fn registry(constructed: Arc<AtomicU8>) -> Arc<TypeRegistry> {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(
            TypeMeta::<ConsoleLogger>::new()
                .constructor(move || {
                    constructed.fetch_add(1, Ordering::SeqCst);
                    Ok(ConsoleLogger)
                })
                .implements(|logger: Arc<ConsoleLogger>| -> Arc<dyn Logger> { logger }),
        );
        registry.register(
            TypeMeta::<FileLogger>::new()
                .constructor(|| Ok(FileLogger))
                .implements(|logger: Arc<FileLogger>| -> Arc<dyn Logger> { logger }),
        );
        registry.register(
            TypeMeta::<Service>::new()
                .constructor(|| Ok(Service { logger: Inject::empty() }))
                .field("logger", |service: &Service| &service.logger),
        );
        registry.register(TypeMeta::<Widget>::new().constructor(|| Ok(Widget)));
        registry
    }

    fn injector(config: Config) -> (Injector, Arc<AtomicU8>) {
        let constructed = Arc::new(AtomicU8::new(0));
        let injector = Injector::new(Binder::new(registry(constructed.clone())), config);
        (injector, constructed)
    }

    #[test]
    #[traced_test]
    fn test_singleton_is_cached() {
        let (injector, constructed) = injector(Config::default());
        injector
            .binder()
            .bind_singleton::<dyn Logger>()
            .to_type::<ConsoleLogger>()
            .unwrap();

        let first = injector.resolve::<dyn Logger>().unwrap().unwrap();
        let second = injector.resolve::<dyn Logger>().unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(first.name(), "console");

        let binding = injector.binder().get_binding(&TypeInfo::of::<dyn Logger>(), None).unwrap();
        let stored = binding.lock().instances().next().cloned().unwrap();
        assert!(injector.binder().contains_instance(&stored));
    }

    #[test]
    #[traced_test]
    fn test_temp_binding_is_transient() {
        let (injector, constructed) = injector(Config::default());
        injector.binder().bind::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        let first = injector.resolve::<dyn Logger>().unwrap().unwrap();
        let second = injector.resolve::<dyn Logger>().unwrap().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(constructed.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_address_binding_is_transient() {
        let (injector, constructed) = injector(Config::default());
        injector.binder().bind_address::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        let first = injector.resolve::<dyn Logger>().unwrap().unwrap();
        let second = injector.resolve::<dyn Logger>().unwrap().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(constructed.load(Ordering::SeqCst), 2);

        let binding = injector.binder().get_binding(&TypeInfo::of::<dyn Logger>(), None).unwrap();
        assert_eq!(binding.lock().values(), [BindingValue::of_type::<ConsoleLogger>()]);
    }

    #[test]
    #[traced_test]
    fn test_address_multiple_constructs_each_type() {
        let (injector, constructed) = injector(Config::strict());
        injector
            .binder()
            .bind_with(TypeInfo::of::<dyn Logger>(), BindingKind::Address, Constraint::Multiple)
            .to_values([BindingValue::of_type::<ConsoleLogger>(), BindingValue::of_type::<FileLogger>()])
            .unwrap();

        let resolution = injector.resolve_request(&ResolveRequest::of::<dyn Logger>()).unwrap();
        let Some(Resolution::Array(array)) = resolution else {
            panic!("expected array");
        };
        assert_eq!(array.element, Some(TypeInfo::of::<dyn Logger>()));
        assert_eq!(
            array.instances.iter().map(Instance::type_info).collect::<Vec<_>>(),
            [TypeInfo::of::<ConsoleLogger>(), TypeInfo::of::<FileLogger>()]
        );

        let again = injector.resolve_all::<dyn Logger>().unwrap();
        assert_eq!(again.iter().map(|logger| logger.name()).collect::<Vec<_>>(), ["console", "file"]);
        assert_eq!(constructed.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_removed_instance_drops_address_type() {
        let (injector, _) = injector(Config::strict());
        let handle = injector
            .binder()
            .bind_with(TypeInfo::of::<dyn Logger>(), BindingKind::Address, Constraint::Multiple)
            .to_values([BindingValue::of_type::<ConsoleLogger>(), BindingValue::of_type::<FileLogger>()])
            .unwrap();

        let handle = handle.remove_value(&Instance::from_value(FileLogger).into());

        assert_eq!(handle.binding().lock().values(), [BindingValue::of_type::<ConsoleLogger>()]);
        assert_eq!(injector.resolve::<dyn Logger>().unwrap().unwrap().name(), "console");
    }

    #[test]
    #[traced_test]
    fn test_multiton_fan_out() {
        let (injector, constructed) = injector(Config::default());
        let existing = Instance::from_value(FileLogger);
        injector
            .binder()
            .bind_multiton::<dyn Logger>()
            .to_values([
                BindingValue::of_type::<ConsoleLogger>(),
                existing.clone().into(),
                BindingValue::of_type::<FileLogger>(),
            ])
            .unwrap();

        let loggers = injector.resolve_all::<dyn Logger>().unwrap();
        assert_eq!(loggers.iter().map(|logger| logger.name()).collect::<Vec<_>>(), ["console", "file", "file"]);

        let binding = injector.binder().get_binding(&TypeInfo::of::<dyn Logger>(), None).unwrap();
        let values = binding.lock().values().to_vec();
        assert!(values.iter().all(|value| value.as_instance().is_some()));
        assert_eq!(values[1], BindingValue::Instance(existing));

        let again = injector.resolve_all::<dyn Logger>().unwrap();
        assert!(loggers.iter().zip(&again).all(|(first, second)| Arc::ptr_eq(first, second)));
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_identifier_matching_is_strict() {
        let (injector, _) = injector(Config::strict());
        let binder = injector.binder();
        binder.bind_address::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();
        binder.bind_address::<dyn Logger>().to_type::<FileLogger>().unwrap().as_id("file").unwrap();

        assert_eq!(injector.resolve::<dyn Logger>().unwrap().unwrap().name(), "console");
        assert_eq!(injector.resolve_id::<dyn Logger>("file").unwrap().unwrap().name(), "file");
        assert!(injector.resolve_id::<dyn Logger>("other").unwrap().is_none());
    }

    #[test]
    #[traced_test]
    fn test_several_instances_for_single_request() {
        let (injector, _) = injector(Config::default());
        injector.binder().bind_address::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();
        injector.binder().bind_address::<dyn Logger>().to_type::<FileLogger>().unwrap();

        let result = injector.resolve::<dyn Logger>();
        assert!(matches!(result, Err(ResolveErrorKind::Multiple { count: 2, .. })));
        assert_eq!(injector.resolve_all::<dyn Logger>().unwrap().len(), 2);
    }

    #[test]
    #[traced_test]
    fn test_resolve_by_id_across_types() {
        let (injector, _) = injector(Config::strict());
        injector
            .binder()
            .bind_address::<dyn Logger>()
            .to_type::<ConsoleLogger>()
            .unwrap()
            .as_id("main")
            .unwrap();
        injector.binder().bind_address::<Widget>().to_self().unwrap().as_id("main").unwrap();

        let resolution = injector.resolve_request(&ResolveRequest::by_id("main")).unwrap().unwrap();
        assert!(matches!(resolution, Resolution::Array(ref array) if array.element.is_none() && array.instances.len() == 2));
        assert!(injector.resolve_by_id("main").unwrap().is_some());
        assert!(injector.resolve_by_id("missing").unwrap().is_none());
    }

    #[test]
    #[traced_test]
    fn test_unbound_request_by_resolution_mode() {
        let (injector, _) = injector(Config::default());
        assert!(injector.resolve::<Widget>().unwrap().is_some());

        injector.set_resolution_mode(ResolutionMode::Strict);
        assert!(injector.resolve::<Widget>().unwrap().is_none());

        let forced = injector.resolve_request(&ResolveRequest::of::<Widget>().always_resolve()).unwrap();
        assert!(matches!(forced, Some(Resolution::Instance(_))));
    }

    #[test]
    #[traced_test]
    fn test_strict_miss_skips_after_resolve() {
        let (injector, _) = injector(Config::strict());
        let calls = Arc::new(AtomicU8::new(0));
        injector.on_after_resolve({
            let calls = calls.clone();
            move |_, _, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                HookFlow::Continue
            }
        });

        assert!(injector.resolve::<Widget>().unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        injector.binder().bind_address::<Widget>().to_self().unwrap();
        assert!(injector.resolve::<Widget>().unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_instantiate_errors() {
        let (injector, _) = injector(Config::default());

        let result = injector.instantiate(TypeInfo::of::<dyn Logger>());
        assert!(matches!(
            result,
            Err(ResolveErrorKind::Instantiate(InstantiateErrorKind::Interface { .. }))
        ));

        let result = injector.instantiate(TypeInfo::of::<u8>());
        assert!(matches!(
            result,
            Err(ResolveErrorKind::Instantiate(InstantiateErrorKind::NoConstructor { .. }))
        ));
    }

    #[test]
    #[traced_test]
    fn test_field_injection() {
        let (injector, _) = injector(Config::default());
        injector.binder().bind_singleton::<dyn Logger>().to_type::<FileLogger>().unwrap();

        let service = injector.resolve::<Service>().unwrap().unwrap();
        assert_eq!(service.logger.get().unwrap().name(), "file");

        let preset = Instance::from_value(Service {
            logger: Inject::new(Arc::new(ConsoleLogger)),
        });
        let preset = injector.inject(preset).unwrap();
        assert_eq!(preset.downcast_ref::<Service>().unwrap().logger.get().unwrap().name(), "console");
    }

    #[test]
    #[traced_test]
    fn test_injection_error_is_wrapped() {
        let (injector, _) = injector(Config::default());

        let result = injector.resolve::<Service>();
        let Err(ResolveErrorKind::Inject { site, member, owner, source }) = result else {
            panic!("expected injection error");
        };
        assert_eq!(site, InjectionSite::Field);
        assert_eq!(member, "logger");
        assert_eq!(owner, TypeInfo::of::<Service>());
        assert!(matches!(
            *source,
            ResolveErrorKind::Instantiate(InstantiateErrorKind::Interface { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_unresolved_member_left_empty_in_strict_mode() {
        let (injector, _) = injector(Config::strict());
        injector.binder().bind_address::<Service>().to_self().unwrap();

        let service = injector.resolve::<Service>().unwrap().unwrap();
        assert!(!service.logger.is_set());
    }

    #[test]
    #[traced_test]
    fn test_constructor_runs_before_members() {
        struct Recorded {
            logger: Mutex<Option<Arc<dyn Logger>>>,
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(Arc::new(AtomicU8::new(0)));
        registry.register(
            TypeMeta::<Recorded>::new()
                .constructor_with([ParameterInfo::of::<Widget>("widget")], {
                    let events = events.clone();
                    move |arguments: &Arguments<'_>| {
                        arguments.get::<Widget>(0)?;
                        events.lock().push("constructor");
                        Ok(Recorded { logger: Mutex::new(None) })
                    }
                })
                .property(
                    "logger",
                    |recorded: &Recorded| recorded.logger.lock().is_some(),
                    {
                        let events = events.clone();
                        move |recorded: &Recorded, logger: Arc<dyn Logger>| {
                            events.lock().push("property");
                            *recorded.logger.lock() = Some(logger);
                        }
                    },
                )
                .method("ready", [ParameterInfo::of::<dyn Logger>("logger")], {
                    let events = events.clone();
                    move |recorded: &Recorded, arguments: &Arguments<'_>| {
                        let logger = arguments.get::<dyn Logger>(0)?;
                        assert!(recorded.logger.lock().is_some());
                        assert_eq!(logger.name(), "console");
                        events.lock().push("method");
                        Ok(())
                    }
                }),
        );

        let injector = Injector::new(Binder::new(registry), Config::default());
        injector.binder().bind_singleton::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        assert!(injector.resolve::<Recorded>().unwrap().is_some());
        assert_eq!(*events.lock(), ["constructor", "property", "method"]);
    }

    #[test]
    #[traced_test]
    fn test_method_failure_is_wrapped() {
        struct Failing;

        let registry = registry(Arc::new(AtomicU8::new(0)));
        registry.register(TypeMeta::<Failing>::new().constructor(|| Ok(Failing)).method(
            "start",
            [],
            |_: &Failing, _: &Arguments<'_>| Err(InstantiateErrorKind::Custom(anyhow::anyhow!("not ready"))),
        ));
        let injector = Injector::new(Binder::new(registry), Config::default());

        let result = injector.resolve::<Failing>();
        assert!(matches!(
            result,
            Err(ResolveErrorKind::Inject {
                site: InjectionSite::Method,
                member: "start",
                ..
            })
        ));
    }

    #[test]
    #[traced_test]
    fn test_conditions_select_binding() {
        let (injector, _) = injector(Config::default());
        let binder = injector.binder();
        binder
            .bind_address::<dyn Logger>()
            .to_type::<FileLogger>()
            .unwrap()
            .into_parent::<Service>()
            .unwrap();
        binder
            .bind_address::<dyn Logger>()
            .to_type::<ConsoleLogger>()
            .unwrap()
            .when(|context| context.parent_type.is_none())
            .unwrap();

        assert_eq!(injector.resolve::<dyn Logger>().unwrap().unwrap().name(), "console");

        let service = injector.resolve::<Service>().unwrap().unwrap();
        assert_eq!(service.logger.get().unwrap().name(), "file");
    }

    #[test]
    #[traced_test]
    fn test_factory_receives_context() {
        let (injector, _) = injector(Config::default());
        let contexts = Arc::new(Mutex::new(Vec::new()));
        injector
            .binder()
            .bind_factory::<dyn Logger>()
            .to_factory({
                let contexts = contexts.clone();
                move |context: &InjectionContext| -> Result<Instance, InstantiateErrorKind> {
                    contexts.lock().push(context.clone());
                    Ok(Instance::from_value(FileLogger).with_upcast(|logger: Arc<FileLogger>| -> Arc<dyn Logger> { logger }))
                }
            })
            .unwrap();

        let service = injector.resolve::<Service>().unwrap().unwrap();
        assert_eq!(service.logger.get().unwrap().name(), "file");

        let contexts = contexts.lock();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].site, InjectionSite::Field);
        assert_eq!(contexts[0].member_name, Some("logger"));
        assert_eq!(contexts[0].parent_type, Some(TypeInfo::of::<Service>()));
        assert_eq!(contexts[0].inject_type, TypeInfo::of::<dyn Logger>());
    }

    #[test]
    #[traced_test]
    fn test_before_resolve_stops() {
        let (injector, constructed) = injector(Config::default());
        let replacement = Instance::from_value(FileLogger).with_upcast(|logger: Arc<FileLogger>| -> Arc<dyn Logger> { logger });
        injector.binder().bind_singleton::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();
        injector.on_before_resolve(move |_, request, result| {
            if request.key.is_some_and(|key| key.element == TypeInfo::of::<dyn Logger>()) {
                *result = Some(Resolution::Instance(replacement.clone()));
                return HookFlow::Stop;
            }
            HookFlow::Continue
        });

        assert_eq!(injector.resolve::<dyn Logger>().unwrap().unwrap().name(), "file");
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[traced_test]
    fn test_after_resolve_rewrites_result() {
        let (injector, _) = injector(Config::default());
        let later = Arc::new(AtomicU8::new(0));
        let replacement = Instance::from_value(FileLogger).with_upcast(|logger: Arc<FileLogger>| -> Arc<dyn Logger> { logger });
        injector.binder().bind_singleton::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        injector.on_after_resolve(move |_, request, result| {
            let element = request.key.map(|key| key.element);
            if element == Some(TypeInfo::of::<dyn Logger>()) {
                *result = Some(Resolution::Instance(replacement.clone()));
                return HookFlow::Stop;
            }
            if element == Some(TypeInfo::of::<Widget>()) {
                *result = None;
            }
            HookFlow::Continue
        });
        injector.on_after_resolve({
            let later = later.clone();
            move |_, _, _| {
                later.fetch_add(1, Ordering::SeqCst);
                HookFlow::Continue
            }
        });

        assert_eq!(injector.resolve::<dyn Logger>().unwrap().unwrap().name(), "file");
        assert_eq!(later.load(Ordering::SeqCst), 0);

        assert!(injector.resolve::<Widget>().unwrap().is_none());
        assert_eq!(later.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_inject_hooks_replace_instance() {
        let (injector, _) = injector(Config::default());
        let replacement = Instance::from_value(Widget);
        let injected = Arc::new(Mutex::new(Vec::new()));

        injector.on_before_inject({
            let replacement = replacement.clone();
            move |_, instance: &mut Instance, info: &ReflectionInfo| {
                if info.type_info() == TypeInfo::of::<Widget>() {
                    *instance = replacement.clone();
                }
            }
        });
        injector.on_after_inject({
            let injected = injected.clone();
            move |_, instance: &mut Instance, _: &ReflectionInfo| injected.lock().push(instance.clone())
        });

        let widget = injector.resolve::<Widget>().unwrap().unwrap();

        assert!(Arc::ptr_eq(&widget, &replacement.downcast::<Widget>().unwrap()));
        assert_eq!(*injected.lock(), [replacement]);
    }

    #[test]
    #[traced_test]
    fn test_instantiate_hooks() {
        let (injector, constructed) = injector(Config::default());
        let observed = Arc::new(AtomicU8::new(0));
        injector.binder().bind_singleton::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        injector.on_before_default_instantiate(|_, _: &SharedBinding, context| {
            (context.site == InjectionSite::Field).then(|| {
                Resolution::Instance(Instance::from_value(FileLogger).with_upcast(|logger: Arc<FileLogger>| -> Arc<dyn Logger> { logger }))
            })
        });
        injector.on_after_instantiate({
            let observed = observed.clone();
            move |_, _, resolution| {
                assert!(resolution.is_some());
                observed.fetch_add(1, Ordering::SeqCst);
            }
        });

        let service = injector.resolve::<Service>().unwrap().unwrap();
        assert_eq!(service.logger.get().unwrap().name(), "file");
        assert_eq!(constructed.load(Ordering::SeqCst), 0);

        assert_eq!(injector.resolve::<dyn Logger>().unwrap().unwrap().name(), "console");
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_stored_instance_injected_once() {
        let (injector, _) = injector(Config::default());
        let injected = Arc::new(AtomicU8::new(0));
        injector.on_after_inject({
            let injected = injected.clone();
            move |_, instance: &mut Instance, _: &ReflectionInfo| {
                if instance.type_info() == TypeInfo::of::<Service>() {
                    injected.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        injector.binder().bind_singleton::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        let handle = injector
            .binder()
            .bind::<Service>()
            .to_instance(Service { logger: Inject::empty() })
            .unwrap();
        handle.as_id("main").unwrap();
        assert_eq!(injected.load(Ordering::SeqCst), 1);

        let service = injector.resolve_id::<Service>("main").unwrap().unwrap();
        assert_eq!(service.logger.get().unwrap().name(), "console");
        assert_eq!(injected.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_array_request_for_single_binding() {
        let (injector, _) = injector(Config::default());
        injector.binder().bind_singleton::<dyn Logger>().to_type::<ConsoleLogger>().unwrap();

        let resolution = injector.resolve_request(&ResolveRequest::array_of::<dyn Logger>()).unwrap();
        let Some(Resolution::Array(array)) = resolution else {
            panic!("expected array");
        };
        assert_eq!(array.element, Some(TypeInfo::of::<dyn Logger>()));
        assert_eq!(array.instances.len(), 1);
        assert_eq!(array.instances[0].type_info(), TypeInfo::of::<ConsoleLogger>());
    }
}
