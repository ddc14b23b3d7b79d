use super::{BindingErrorKind, ResolveErrorKind};
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum SetupErrorKind {
    #[error(transparent)]
    Binding(#[from] BindingErrorKind),
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
    #[error("Bindings setup `{type_info}` wasn't resolved")]
    Unresolved { type_info: TypeInfo },
}
