use crate::any::{TypeInfo, TypeKey};

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Type `{type_info}` is an interface and can't be instantiated without a concrete binding")]
    Interface { type_info: TypeInfo },
    #[error("No constructors found for type `{type_info}`")]
    NoConstructor { type_info: TypeInfo },
    #[error("Argument `{name}` (#{index}) of type `{key}` wasn't resolved")]
    MissingArgument { index: usize, name: &'static str, key: TypeKey },
    #[error("Argument `{name}` (#{index}) expects a single value, but {count} were resolved")]
    AmbiguousArgument { index: usize, name: &'static str, count: usize },
    #[error("Incorrect argument `{name}` (#{index}). Actual: `{actual}`, expected: `{expected}`")]
    IncorrectArgument {
        index: usize,
        name: &'static str,
        expected: TypeInfo,
        actual: TypeInfo,
    },
    #[error("Incorrect instance type. Actual: `{actual}`, expected: `{expected}`")]
    IncorrectInstance { expected: TypeInfo, actual: TypeInfo },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
