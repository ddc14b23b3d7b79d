use crate::{container::Container, errors::SetupErrorKind};

/// Group of bindings configured together.
///
/// Setups passed to [`Container::setup_all`] run by descending priority,
/// setups with equal priority run in the given order.
///
/// # Examples
/// ```rust
/// use bindery::{BindingsSetup, Container, SetupErrorKind, TypeMeta};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {}
///
/// struct SystemClock;
///
/// impl Clock for SystemClock {}
///
/// struct ClockSetup;
///
/// impl BindingsSetup for ClockSetup {
///     fn setup_bindings(&self, container: &Container) -> Result<(), SetupErrorKind> {
///         container.register(
///             TypeMeta::<SystemClock>::new()
///                 .constructor(|| Ok(SystemClock))
///                 .implements(|clock: Arc<SystemClock>| -> Arc<dyn Clock> { clock }),
///         );
///         container.bind_singleton::<dyn Clock>().to_type::<SystemClock>()?;
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container.setup_bindings(&ClockSetup).unwrap();
/// assert!(container.resolve::<dyn Clock>().unwrap().is_some());
/// ```
pub trait BindingsSetup {
    #[inline]
    fn priority(&self) -> i32 {
        0
    }

    /// # Errors
    /// Returns [`SetupErrorKind`] if one of the bindings can't be configured
    fn setup_bindings(&self, container: &Container) -> Result<(), SetupErrorKind>;
}
