use alloc::boxed::Box;

use super::ResolveErrorKind;
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum BindingErrorKind {
    #[error("Value of type `{actual}` isn't assignable to binding of `{expected}`")]
    TypeMismatch { expected: TypeInfo, actual: TypeInfo },
    #[error("Operation `{operation}` requires multiple constraint, but binding of `{type_info}` has single constraint")]
    ConstraintViolation {
        operation: &'static str,
        type_info: TypeInfo,
    },
    #[error("Binding of `{type_info}` was rejected by the store: {source}")]
    Store {
        type_info: TypeInfo,
        #[source]
        source: Box<ResolveErrorKind>,
    },
}
