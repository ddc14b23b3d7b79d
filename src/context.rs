use core::fmt::{self, Display, Formatter};

use crate::{
    any::{TypeInfo, TypeKey},
    identifier::Identifier,
    instance::Instance,
};

/// Kind of member a dependency is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InjectionSite {
    #[default]
    None,
    Constructor,
    Field,
    Property,
    Method,
}

impl Display for InjectionSite {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InjectionSite::None => "none",
            InjectionSite::Constructor => "constructor",
            InjectionSite::Field => "field",
            InjectionSite::Property => "property",
            InjectionSite::Method => "method",
        })
    }
}

/// Describes a single resolution attempt against a binding.
/// Passed to binding conditions and factories, never stored.
#[derive(Debug, Clone)]
pub struct InjectionContext {
    pub site: InjectionSite,
    pub member_type: Option<TypeKey>,
    pub member_name: Option<&'static str>,
    pub parent_type: Option<TypeInfo>,
    pub parent_instance: Option<Instance>,
    pub identifier: Option<Identifier>,
    /// Contract type of the binding being evaluated
    pub inject_type: TypeInfo,
}
