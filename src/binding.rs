use alloc::{sync::Arc, vec, vec::Vec};
use core::fmt::{self, Debug, Formatter};
use parking_lot::Mutex;

use crate::{
    any::TypeInfo,
    context::InjectionContext,
    errors::BindingErrorKind,
    factory::InjectionFactory,
    identifier::Identifier,
    instance::Instance,
    reflection::ReflectionCache,
};

/// How and when a binding produces its instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Not configured yet. Type values are instantiated on every resolution,
    /// the first instance value turns the binding into [`BindingKind::Singleton`].
    Temp,
    /// New instance of the bound type on every resolution, never cached
    Address,
    /// Instances are created by the bound [`InjectionFactory`]
    Factory,
    /// One instance, created on first resolution and cached onto the binding
    Singleton,
    /// Every value is instantiated on first resolution and cached in place
    Multiton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// The binding holds one value, assigning a new one replaces it
    Single,
    /// The binding holds an ordered list of distinct values
    Multiple,
}

/// A value stored in a binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingValue {
    /// A type that is still to be instantiated
    Type(TypeInfo),
    Instance(Instance),
}

impl BindingValue {
    #[inline]
    #[must_use]
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeInfo::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        match self {
            BindingValue::Type(type_info) => *type_info,
            BindingValue::Instance(instance) => instance.type_info(),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            BindingValue::Type(_) => None,
            BindingValue::Instance(instance) => Some(instance),
        }
    }
}

impl From<Instance> for BindingValue {
    fn from(instance: Instance) -> Self {
        Self::Instance(instance)
    }
}

impl From<TypeInfo> for BindingValue {
    fn from(type_info: TypeInfo) -> Self {
        Self::Type(type_info)
    }
}

pub type Condition = Arc<dyn Fn(&InjectionContext) -> bool + Send + Sync>;

pub type SharedBinding = Arc<Mutex<Binding>>;

/// Rule mapping a contract type (and an optional identifier) to the values producing its instances
pub struct Binding {
    type_info: TypeInfo,
    kind: BindingKind,
    constraint: Constraint,
    values: Vec<BindingValue>,
    identifier: Option<Identifier>,
    condition: Option<Condition>,
}

impl Binding {
    #[must_use]
    pub fn new(type_info: TypeInfo, kind: BindingKind, constraint: Constraint) -> Self {
        Self {
            type_info,
            kind,
            constraint,
            values: Vec::new(),
            identifier: None,
            condition: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[BindingValue] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&BindingValue> {
        self.values.first()
    }

    #[inline]
    #[must_use]
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.values.iter().filter_map(BindingValue::as_instance)
    }

    #[inline]
    pub fn set_kind(&mut self, kind: BindingKind) {
        self.kind = kind;
    }

    #[inline]
    pub fn set_constraint(&mut self, constraint: Constraint) {
        self.constraint = constraint;
    }

    #[inline]
    pub fn set_identifier(&mut self, identifier: Option<Identifier>) {
        self.identifier = identifier;
    }

    #[inline]
    pub fn set_condition(&mut self, condition: Condition) {
        self.condition = Some(condition);
    }

    /// Binds the contract type to itself. There's only one contract type, so the constraint becomes single.
    pub fn to_self(&mut self) {
        self.constraint = Constraint::Single;
        self.values = vec![BindingValue::Type(self.type_info)];
    }

    /// Assigns a value: replaces the current one for [`Constraint::Single`], appends it if absent for [`Constraint::Multiple`].
    ///
    /// # Errors
    /// Returns [`BindingErrorKind::TypeMismatch`] if the value isn't assignable to this binding
    pub fn to(&mut self, value: BindingValue, reflection: &dyn ReflectionCache) -> Result<(), BindingErrorKind> {
        let value = adopt(value, reflection);

        let (kind, constraint) = match (self.kind, &value) {
            (BindingKind::Temp, BindingValue::Instance(_)) => (BindingKind::Singleton, Constraint::Single),
            (kind, _) => (kind, self.constraint),
        };
        self.check(kind, &value, reflection)?;

        self.kind = kind;
        self.constraint = constraint;
        match constraint {
            Constraint::Single => self.values = vec![value],
            Constraint::Multiple => self.add_value(value),
        }
        Ok(())
    }

    /// Appends several values. Nothing is assigned if one of them is rejected.
    ///
    /// # Errors
    /// - Returns [`BindingErrorKind::ConstraintViolation`] if the binding has single constraint
    /// - Returns [`BindingErrorKind::TypeMismatch`] if one of the values isn't assignable to this binding
    pub fn to_many(&mut self, values: impl IntoIterator<Item = BindingValue>, reflection: &dyn ReflectionCache) -> Result<(), BindingErrorKind> {
        self.require_multiple("to_many")?;

        let values = values.into_iter().map(|value| adopt(value, reflection)).collect::<Vec<_>>();
        for value in &values {
            self.check(self.kind, value, reflection)?;
        }
        for value in values {
            self.add_value(value);
        }
        Ok(())
    }

    /// Removes a value, doing nothing if it's absent.
    ///
    /// Removing an instance from a multiple [`BindingKind::Temp`] or [`BindingKind::Address`] binding
    /// also removes the entry of its type.
    pub fn remove_value(&mut self, value: &BindingValue) {
        match self.constraint {
            Constraint::Single => {
                if self.values.first() == Some(value) {
                    self.values.clear();
                }
            }
            Constraint::Multiple => {
                if let (BindingKind::Temp | BindingKind::Address, BindingValue::Instance(instance)) = (self.kind, value) {
                    let type_value = BindingValue::Type(instance.type_info());
                    self.values.retain(|stored| *stored != type_value);
                }
                self.values.retain(|stored| stored != value);
            }
        }
    }

    /// # Errors
    /// Returns [`BindingErrorKind::ConstraintViolation`] if the binding has single constraint
    pub fn remove_values(&mut self, values: &[BindingValue]) -> Result<(), BindingErrorKind> {
        self.require_multiple("remove_values")?;

        for value in values {
            self.remove_value(value);
        }
        Ok(())
    }

    /// Whether the binding may serve a request with the given identifier.
    /// Both have to be absent, or both present and equal.
    #[inline]
    #[must_use]
    pub fn matches_identifier(&self, requested: Option<&Identifier>) -> bool {
        self.identifier.as_ref() == requested
    }

    /// Replaces the `expected` type stored at `index` with its instance, returning the stored instance.
    /// If an instance is already there, it's kept and returned.
    /// Returns `None` if the slot holds another type or is gone.
    pub(crate) fn promote(&mut self, index: usize, expected: &TypeInfo, instance: Instance) -> Option<Instance> {
        let slot = self.values.get_mut(index)?;
        if let BindingValue::Instance(existing) = slot {
            return Some(existing.clone());
        }
        if *slot != BindingValue::Type(*expected) {
            return None;
        }
        *slot = BindingValue::Instance(instance.clone());
        Some(instance)
    }

    fn add_value(&mut self, value: BindingValue) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    fn require_multiple(&self, operation: &'static str) -> Result<(), BindingErrorKind> {
        match self.constraint {
            Constraint::Multiple => Ok(()),
            Constraint::Single => Err(BindingErrorKind::ConstraintViolation {
                operation,
                type_info: self.type_info,
            }),
        }
    }

    /// Type references have to be constructible, so trait objects are rejected whatever the kind is
    fn check(&self, kind: BindingKind, value: &BindingValue, reflection: &dyn ReflectionCache) -> Result<(), BindingErrorKind> {
        let expected = match kind {
            BindingKind::Factory => TypeInfo::of::<dyn InjectionFactory>(),
            _ => self.type_info,
        };
        let passes = match (kind, value) {
            (BindingKind::Address, BindingValue::Instance(_)) => false,
            (_, BindingValue::Type(type_info)) => !type_info.is_interface() && reflection.is_assignable(&expected, type_info),
            (_, BindingValue::Instance(instance)) => instance.can_cast(&expected),
        };

        if passes {
            Ok(())
        } else {
            Err(BindingErrorKind::TypeMismatch {
                expected,
                actual: value.type_info(),
            })
        }
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("type_info", &self.type_info.name)
            .field("kind", &self.kind)
            .field("constraint", &self.constraint)
            .field("values", &self.values)
            .field("identifier", &self.identifier)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

/// Instances bound by the user learn the contracts registered for their type
fn adopt(value: BindingValue, reflection: &dyn ReflectionCache) -> BindingValue {
    match value {
        BindingValue::Instance(instance) => match reflection.info(&instance.type_info()) {
            Some(info) => BindingValue::Instance(instance.with_upcasts_from(info.upcasts())),
            None => BindingValue::Instance(instance),
        },
        value @ BindingValue::Type(_) => value,
    }
}
