use alloc::boxed::Box;

use super::InstantiateErrorKind;
use crate::{any::TypeInfo, context::InjectionSite};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error(transparent)]
    Instantiate(#[from] InstantiateErrorKind),
    #[error("Unable to inject on {site} `{member}` at object `{owner}`. Caused by: {source}")]
    Inject {
        site: InjectionSite,
        member: &'static str,
        owner: TypeInfo,
        #[source]
        source: Box<ResolveErrorKind>,
    },
    #[error("Incorrect resolved type. Actual: `{actual}`, expected: `{expected}`")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error("Expected a single instance of `{type_info}`, but {count} were resolved")]
    Multiple { type_info: TypeInfo, count: usize },
}
