use alloc::{boxed::Box, collections::BTreeMap, sync::Arc, vec, vec::Vec};
use core::{
    any::Any,
    fmt::{self, Debug, Formatter},
};

use crate::{any::TypeInfo, errors::ResolveErrorKind};

pub(crate) type RcAny = Arc<dyn Any + Send + Sync>;

type UpcastFn = Arc<dyn Fn(&RcAny) -> Option<Box<dyn Any>> + Send + Sync>;

/// Conversions of one concrete type into the contracts it satisfies.
///
/// Each entry takes the erased `Arc<T>` and returns a boxed `Arc<C>`.
/// The identity conversion is always present.
#[derive(Clone, Default)]
pub struct Upcasts {
    casts: BTreeMap<TypeInfo, UpcastFn>,
}

impl Upcasts {
    #[must_use]
    pub fn of<T: Send + Sync + 'static>() -> Self {
        let mut upcasts = Self::default();
        upcasts.insert::<T, T>(|value| value);
        upcasts
    }

    pub fn insert<T, C>(&mut self, upcast: fn(Arc<T>) -> Arc<C>)
    where
        T: Send + Sync + 'static,
        C: ?Sized + 'static,
    {
        self.casts.insert(
            TypeInfo::of::<C>(),
            Arc::new(move |value: &RcAny| {
                let value = value.clone().downcast::<T>().ok()?;
                Some(Box::new(upcast(value)) as Box<dyn Any>)
            }),
        );
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, contract: &TypeInfo) -> bool {
        self.casts.contains_key(contract)
    }

    /// Adds the entries of `other` missing from `self`.
    pub fn merge(&mut self, other: &Upcasts) {
        for (contract, cast) in &other.casts {
            self.casts.entry(*contract).or_insert_with(|| cast.clone());
        }
    }

    fn cast<C: ?Sized + 'static>(&self, value: &RcAny) -> Option<Arc<C>> {
        let cast = self.casts.get(&TypeInfo::of::<C>())?;
        cast(value).and_then(|boxed| boxed.downcast::<Arc<C>>().ok()).map(|boxed| *boxed)
    }
}

/// A shared, type-erased object produced or stored by the container.
///
/// Two instances are equal when they point to the same object.
#[derive(Clone)]
pub struct Instance {
    type_info: TypeInfo,
    value: RcAny,
    upcasts: Arc<Upcasts>,
}

impl Instance {
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            value,
            upcasts: Arc::new(Upcasts::of::<T>()),
        }
    }

    #[inline]
    #[must_use]
    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_parts(type_info: TypeInfo, value: RcAny, upcasts: Arc<Upcasts>) -> Self {
        Self {
            type_info,
            value,
            upcasts,
        }
    }

    /// Declares that this instance can also be viewed as `C`.
    #[must_use]
    pub fn with_upcast<T, C>(mut self, upcast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        T: Send + Sync + 'static,
        C: ?Sized + 'static,
    {
        Arc::make_mut(&mut self.upcasts).insert(upcast);
        self
    }

    #[must_use]
    pub(crate) fn with_upcasts_from(mut self, upcasts: &Upcasts) -> Self {
        Arc::make_mut(&mut self.upcasts).merge(upcasts);
        self
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn can_cast(&self, contract: &TypeInfo) -> bool {
        self.upcasts.contains(contract)
    }

    /// Views the instance as `C`, which is either its concrete type or one of its registered contracts.
    #[inline]
    #[must_use]
    pub fn downcast<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        self.upcasts.cast(&self.value)
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    #[inline]
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.value).cast::<()>() as usize
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Instance {}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_info.name)
            .field("ptr", &Arc::as_ptr(&self.value).cast::<()>())
            .finish()
    }
}

/// Several instances resolved for one request, in binding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceArray {
    /// Requested element type, absent for requests by identifier only.
    pub element: Option<TypeInfo>,
    pub instances: Vec<Instance>,
}

/// Result of a resolution: a single instance or an array of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Instance(Instance),
    Array(InstanceArray),
}

impl Resolution {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Resolution::Instance(_) => 1,
            Resolution::Array(array) => array.instances.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn first(&self) -> Option<&Instance> {
        match self {
            Resolution::Instance(instance) => Some(instance),
            Resolution::Array(array) => array.instances.first(),
        }
    }

    #[must_use]
    pub fn into_instances(self) -> Vec<Instance> {
        match self {
            Resolution::Instance(instance) => vec![instance],
            Resolution::Array(array) => array.instances,
        }
    }

    /// Views a single instance as `C`.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Multiple`] if the resolution holds several instances
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the instance can't be viewed as `C`
    pub fn single<C: ?Sized + 'static>(&self) -> Result<Arc<C>, ResolveErrorKind> {
        match self {
            Resolution::Instance(instance) => cast(instance),
            Resolution::Array(array) => match array.instances.as_slice() {
                [instance] => cast(instance),
                instances => Err(ResolveErrorKind::Multiple {
                    type_info: TypeInfo::of::<C>(),
                    count: instances.len(),
                }),
            },
        }
    }

    /// Views every instance as `C`.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] on the first instance that can't be viewed as `C`
    pub fn all<C: ?Sized + 'static>(&self) -> Result<Vec<Arc<C>>, ResolveErrorKind> {
        match self {
            Resolution::Instance(instance) => Ok(vec![cast(instance)?]),
            Resolution::Array(array) => array.instances.iter().map(cast).collect(),
        }
    }
}

fn cast<C: ?Sized + 'static>(instance: &Instance) -> Result<Arc<C>, ResolveErrorKind> {
    instance.downcast::<C>().ok_or_else(|| ResolveErrorKind::IncorrectType {
        expected: TypeInfo::of::<C>(),
        actual: instance.type_info(),
    })
}
