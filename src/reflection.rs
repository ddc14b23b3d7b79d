use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::{TypeInfo, TypeKey},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    identifier::Identifier,
    inject::{Inject, InjectMany},
    instance::{Instance, RcAny, Resolution, Upcasts},
};

pub(crate) type Constructor = Arc<dyn Fn() -> Result<RcAny, InstantiateErrorKind> + Send + Sync>;
pub(crate) type ParamsConstructor = Arc<dyn Fn(&Arguments<'_>) -> Result<RcAny, InstantiateErrorKind> + Send + Sync>;
pub(crate) type Probe = Arc<dyn Fn(&Instance) -> bool + Send + Sync>;
pub(crate) type Setter = Arc<dyn Fn(&Instance, &Resolution) -> Result<(), ResolveErrorKind> + Send + Sync>;
pub(crate) type Invoker = Arc<dyn Fn(&Instance, &Arguments<'_>) -> Result<(), InstantiateErrorKind> + Send + Sync>;

/// Source of injection metadata for types.
///
/// The injector never looks at an instance's real type beyond what this cache reports.
pub trait ReflectionCache: Send + Sync {
    fn info(&self, type_info: &TypeInfo) -> Option<Arc<ReflectionInfo>>;

    /// Whether a value of `concrete` type can be bound to `contract`
    #[must_use]
    fn is_assignable(&self, contract: &TypeInfo, concrete: &TypeInfo) -> bool {
        contract == concrete || self.info(concrete).is_some_and(|info| info.upcasts.contains(contract))
    }
}

/// A constructor or method parameter
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    pub key: TypeKey,
    pub name: &'static str,
    pub identifier: Option<Identifier>,
}

impl ParameterInfo {
    #[inline]
    #[must_use]
    pub fn of<Dep: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            key: TypeKey::of::<Dep>(),
            name,
            identifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn array_of<Dep: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            key: TypeKey::array_of::<Dep>(),
            name,
            identifier: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_id(mut self, identifier: impl Into<Identifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

/// An injectable field or property
#[derive(Clone)]
pub struct AccessorInfo {
    pub key: TypeKey,
    pub name: &'static str,
    pub identifier: Option<Identifier>,
    pub(crate) probe: Probe,
    pub(crate) setter: Setter,
}

impl Debug for AccessorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorInfo")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

/// A method called with resolved arguments after construction
#[derive(Clone)]
pub struct MethodInfo {
    pub name: &'static str,
    pub parameters: Vec<ParameterInfo>,
    pub(crate) invoker: Invoker,
}

impl Debug for MethodInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Cached injection metadata of one concrete type
#[derive(Clone)]
pub struct ReflectionInfo {
    pub(crate) type_info: TypeInfo,
    pub(crate) constructor: Option<Constructor>,
    pub(crate) params_constructor: Option<ParamsConstructor>,
    pub(crate) constructor_parameters: Vec<ParameterInfo>,
    pub(crate) fields: Vec<AccessorInfo>,
    pub(crate) properties: Vec<AccessorInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) upcasts: Arc<Upcasts>,
}

impl ReflectionInfo {
    /// Metadata of a type without constructors or injectable members
    #[must_use]
    pub fn empty(type_info: TypeInfo) -> Self {
        Self {
            type_info,
            constructor: None,
            params_constructor: None,
            constructor_parameters: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            upcasts: Arc::new(Upcasts::default()),
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some() || self.params_constructor.is_some()
    }

    #[inline]
    #[must_use]
    pub fn constructor_parameters(&self) -> &[ParameterInfo] {
        &self.constructor_parameters
    }

    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[AccessorInfo] {
        &self.fields
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[AccessorInfo] {
        &self.properties
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    #[inline]
    #[must_use]
    pub fn upcasts(&self) -> &Upcasts {
        &self.upcasts
    }

    #[inline]
    #[must_use]
    pub fn has_members(&self) -> bool {
        !(self.fields.is_empty() && self.properties.is_empty() && self.methods.is_empty())
    }
}

impl Debug for ReflectionInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionInfo")
            .field("type_info", &self.type_info.name)
            .field("has_constructor", &self.has_constructor())
            .field("constructor_parameters", &self.constructor_parameters)
            .field("fields", &self.fields)
            .field("properties", &self.properties)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// Resolved values of constructor or method parameters, in declaration order
pub struct Arguments<'a> {
    parameters: &'a [ParameterInfo],
    values: Vec<Option<Resolution>>,
}

impl<'a> Arguments<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(parameters: &'a [ParameterInfo], values: Vec<Option<Resolution>>) -> Self {
        Self { parameters, values }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn resolution(&self, index: usize) -> Option<&Resolution> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if nothing was resolved for the parameter
    /// - Returns [`InstantiateErrorKind::IncorrectArgument`] if the value can't be viewed as `Dep`
    /// - Returns [`InstantiateErrorKind::AmbiguousArgument`] if several values were resolved
    pub fn get<Dep: ?Sized + 'static>(&self, index: usize) -> Result<Arc<Dep>, InstantiateErrorKind> {
        self.get_optional(index)?.ok_or_else(|| self.missing::<Dep>(index))
    }

    /// # Errors
    /// Same as [`Self::get`], except that a missing value is `Ok(None)`
    pub fn get_optional<Dep: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<Dep>>, InstantiateErrorKind> {
        let Some(resolution) = self.resolution(index) else {
            return Ok(None);
        };
        let name = self.name(index);
        match resolution {
            Resolution::Instance(instance) => self.cast(index, instance).map(Some),
            Resolution::Array(array) => match array.instances.as_slice() {
                [] => Ok(None),
                [instance] => self.cast(index, instance).map(Some),
                instances => Err(InstantiateErrorKind::AmbiguousArgument {
                    index,
                    name,
                    count: instances.len(),
                }),
            },
        }
    }

    /// Every resolved value of the parameter, empty if nothing was resolved
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::IncorrectArgument`] if one of the values can't be viewed as `Dep`
    pub fn get_all<Dep: ?Sized + 'static>(&self, index: usize) -> Result<Vec<Arc<Dep>>, InstantiateErrorKind> {
        match self.resolution(index) {
            None => Ok(Vec::new()),
            Some(resolution) => resolution
                .clone()
                .into_instances()
                .iter()
                .map(|instance| self.cast(index, instance))
                .collect(),
        }
    }

    fn name(&self, index: usize) -> &'static str {
        self.parameters.get(index).map_or("<unknown>", |parameter| parameter.name)
    }

    fn missing<Dep: ?Sized + 'static>(&self, index: usize) -> InstantiateErrorKind {
        InstantiateErrorKind::MissingArgument {
            index,
            name: self.name(index),
            key: self
                .parameters
                .get(index)
                .map_or_else(TypeKey::of::<Dep>, |parameter| parameter.key),
        }
    }

    fn cast<Dep: ?Sized + 'static>(&self, index: usize, instance: &Instance) -> Result<Arc<Dep>, InstantiateErrorKind> {
        instance.downcast::<Dep>().ok_or_else(|| InstantiateErrorKind::IncorrectArgument {
            index,
            name: self.name(index),
            expected: TypeInfo::of::<Dep>(),
            actual: instance.type_info(),
        })
    }
}

/// Builder of [`ReflectionInfo`] for a concrete type `T`.
///
/// # Examples
/// ```rust
/// use bindery::{Inject, ParameterInfo, TypeMeta, TypeRegistry};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {}
///
/// struct ConsoleLogger;
///
/// impl Logger for ConsoleLogger {}
///
/// struct Service {
///     logger: Arc<dyn Logger>,
///     audit: Inject<dyn Logger>,
/// }
///
/// let registry = TypeRegistry::new();
/// registry.register(
///     TypeMeta::<ConsoleLogger>::new()
///         .constructor(|| Ok(ConsoleLogger))
///         .implements(|logger: Arc<ConsoleLogger>| -> Arc<dyn Logger> { logger }),
/// );
/// registry.register(
///     TypeMeta::<Service>::new()
///         .constructor_with([ParameterInfo::of::<dyn Logger>("logger")], |args| {
///             Ok(Service {
///                 logger: args.get(0)?,
///                 audit: Inject::empty(),
///             })
///         })
///         .field("audit", |service: &Service| &service.audit),
/// );
/// ```
pub struct TypeMeta<T> {
    info: ReflectionInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Default for TypeMeta<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> TypeMeta<T> {
    #[must_use]
    pub fn new() -> Self {
        let mut info = ReflectionInfo::empty(TypeInfo::of::<T>());
        info.upcasts = Arc::new(Upcasts::of::<T>());
        Self {
            info,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.info.constructor = Some(Arc::new(move || constructor().map(|value| Arc::new(value) as RcAny)));
        self
    }

    #[must_use]
    pub fn constructor_with<F>(mut self, parameters: impl IntoIterator<Item = ParameterInfo>, constructor: F) -> Self
    where
        F: Fn(&Arguments<'_>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.info.constructor_parameters = parameters.into_iter().collect();
        self.info.params_constructor = Some(Arc::new(move |arguments: &Arguments<'_>| {
            constructor(arguments).map(|value| Arc::new(value) as RcAny)
        }));
        self
    }

    #[must_use]
    pub fn field<Dep>(self, name: &'static str, accessor: fn(&T) -> &Inject<Dep>) -> Self
    where
        Dep: ?Sized + 'static,
    {
        self.field_inner(name, None, accessor)
    }

    #[must_use]
    pub fn field_with_id<Dep>(self, name: &'static str, identifier: impl Into<Identifier>, accessor: fn(&T) -> &Inject<Dep>) -> Self
    where
        Dep: ?Sized + 'static,
    {
        self.field_inner(name, Some(identifier.into()), accessor)
    }

    /// Field receiving every instance resolved for `Dep`
    #[must_use]
    pub fn field_many<Dep>(mut self, name: &'static str, accessor: fn(&T) -> &InjectMany<Dep>) -> Self
    where
        Dep: ?Sized + 'static,
    {
        self.info.fields.push(AccessorInfo {
            key: TypeKey::array_of::<Dep>(),
            name,
            identifier: None,
            probe: Arc::new(move |instance: &Instance| instance.downcast_ref::<T>().map_or(true, |owner| accessor(owner).is_set())),
            setter: Arc::new(move |instance: &Instance, resolution: &Resolution| {
                let owner = owner::<T>(instance)?;
                accessor(owner).set(resolution.all::<Dep>()?);
                Ok(())
            }),
        });
        self
    }

    /// Property written through `setter` whenever `is_set` reports it empty
    #[must_use]
    pub fn property<Dep, G, S>(self, name: &'static str, is_set: G, setter: S) -> Self
    where
        Dep: ?Sized + 'static,
        G: Fn(&T) -> bool + Send + Sync + 'static,
        S: Fn(&T, Arc<Dep>) + Send + Sync + 'static,
    {
        self.property_inner(name, None, is_set, setter)
    }

    #[must_use]
    pub fn property_with_id<Dep, G, S>(self, name: &'static str, identifier: impl Into<Identifier>, is_set: G, setter: S) -> Self
    where
        Dep: ?Sized + 'static,
        G: Fn(&T) -> bool + Send + Sync + 'static,
        S: Fn(&T, Arc<Dep>) + Send + Sync + 'static,
    {
        self.property_inner(name, Some(identifier.into()), is_set, setter)
    }

    #[must_use]
    pub fn method<F>(mut self, name: &'static str, parameters: impl IntoIterator<Item = ParameterInfo>, method: F) -> Self
    where
        F: Fn(&T, &Arguments<'_>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.info.methods.push(MethodInfo {
            name,
            parameters: parameters.into_iter().collect(),
            invoker: Arc::new(move |instance: &Instance, arguments: &Arguments<'_>| {
                let owner = instance
                    .downcast_ref::<T>()
                    .ok_or_else(|| InstantiateErrorKind::IncorrectInstance {
                        expected: TypeInfo::of::<T>(),
                        actual: instance.type_info(),
                    })?;
                method(owner, arguments)
            }),
        });
        self
    }

    /// Declares that `T` can be bound to and resolved as `C`
    #[must_use]
    pub fn implements<C>(mut self, upcast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + 'static,
    {
        Arc::make_mut(&mut self.info.upcasts).insert(upcast);
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> ReflectionInfo {
        self.info
    }

    fn field_inner<Dep>(mut self, name: &'static str, identifier: Option<Identifier>, accessor: fn(&T) -> &Inject<Dep>) -> Self
    where
        Dep: ?Sized + 'static,
    {
        self.info.fields.push(AccessorInfo {
            key: TypeKey::of::<Dep>(),
            name,
            identifier,
            probe: Arc::new(move |instance: &Instance| instance.downcast_ref::<T>().map_or(true, |owner| accessor(owner).is_set())),
            setter: Arc::new(move |instance: &Instance, resolution: &Resolution| {
                let owner = owner::<T>(instance)?;
                accessor(owner).set(resolution.single::<Dep>()?);
                Ok(())
            }),
        });
        self
    }

    fn property_inner<Dep, G, S>(mut self, name: &'static str, identifier: Option<Identifier>, is_set: G, setter: S) -> Self
    where
        Dep: ?Sized + 'static,
        G: Fn(&T) -> bool + Send + Sync + 'static,
        S: Fn(&T, Arc<Dep>) + Send + Sync + 'static,
    {
        self.info.properties.push(AccessorInfo {
            key: TypeKey::of::<Dep>(),
            name,
            identifier,
            probe: Arc::new(move |instance: &Instance| instance.downcast_ref::<T>().map_or(true, &is_set)),
            setter: Arc::new(move |instance: &Instance, resolution: &Resolution| {
                let owner = owner::<T>(instance)?;
                setter(owner, resolution.single::<Dep>()?);
                Ok(())
            }),
        });
        self
    }
}

fn owner<T: 'static>(instance: &Instance) -> Result<&T, ResolveErrorKind> {
    instance.downcast_ref::<T>().ok_or_else(|| ResolveErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
        actual: instance.type_info(),
    })
}

/// In-memory [`ReflectionCache`] filled with [`TypeMeta`] descriptors
#[derive(Default)]
pub struct TypeRegistry {
    infos: Mutex<BTreeMap<TypeInfo, Arc<ReflectionInfo>>>,
}

impl TypeRegistry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metadata of `T`, returning the replaced one if any
    pub fn register<T: Send + Sync + 'static>(&self, meta: TypeMeta<T>) -> Option<Arc<ReflectionInfo>> {
        self.insert(meta.build())
    }

    pub fn insert(&self, info: ReflectionInfo) -> Option<Arc<ReflectionInfo>> {
        debug!(type_info = info.type_info.name, "Registered");
        self.infos.lock().insert(info.type_info, Arc::new(info))
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: &TypeInfo) -> bool {
        self.infos.lock().contains_key(type_info)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.lock().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.lock().is_empty()
    }
}

impl ReflectionCache for TypeRegistry {
    fn info(&self, type_info: &TypeInfo) -> Option<Arc<ReflectionInfo>> {
        self.infos.lock().get(type_info).cloned()
    }
}
