use alloc::sync::Arc;

use crate::{context::InjectionContext, errors::InstantiateErrorKind, instance::Instance};

/// Creates instances for a [`crate::BindingKind::Factory`] binding.
///
/// Implemented for closures taking the injection context, so a closure can be bound directly
/// with [`crate::BindingHandle::to_factory`].
pub trait InjectionFactory: Send + Sync {
    /// # Errors
    /// Returns [`InstantiateErrorKind`] if the instance can't be created
    fn create(&self, context: &InjectionContext) -> Result<Instance, InstantiateErrorKind>;
}

impl<F> InjectionFactory for F
where
    F: Fn(&InjectionContext) -> Result<Instance, InstantiateErrorKind> + Send + Sync,
{
    #[inline]
    fn create(&self, context: &InjectionContext) -> Result<Instance, InstantiateErrorKind> {
        self(context)
    }
}

/// Wraps a factory into an instance that can be viewed as `dyn InjectionFactory`
#[must_use]
pub(crate) fn factory_instance<F: InjectionFactory + 'static>(factory: F) -> Instance {
    Instance::from_value(factory).with_upcast(|factory: Arc<F>| -> Arc<dyn InjectionFactory> { factory })
}
