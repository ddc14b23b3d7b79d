/// Policy for requests that match no binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// Instantiate the requested type directly
    #[default]
    AlwaysResolve,
    /// Return nothing
    Strict,
}

/// Config for an injector
/// ## Fields
/// - `resolution_mode`:
///   What to do with a request that matches no binding.
///
///   A request can still force instantiation with [`crate::ResolveRequest::always_resolve`],
///   whatever the mode is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    pub resolution_mode: ResolutionMode,
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            resolution_mode: ResolutionMode::Strict,
        }
    }
}
