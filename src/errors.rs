mod binding;
mod instantiate;
mod resolve;
mod setup;

pub use binding::BindingErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;
pub use setup::SetupErrorKind;
