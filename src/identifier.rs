use alloc::{borrow::Cow, string::String};
use core::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Opaque key used to tell apart several bindings of the same contract type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    Name(Cow<'static, str>),
    Index(i64),
    Type(TypeInfo),
}

impl Identifier {
    #[inline]
    #[must_use]
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeInfo::of::<T>())
    }
}

impl From<&'static str> for Identifier {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

impl From<i64> for Identifier {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<TypeInfo> for Identifier {
    fn from(type_info: TypeInfo) -> Self {
        Self::Type(type_info)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Name(name) => write!(f, "\"{name}\""),
            Identifier::Index(index) => write!(f, "#{index}"),
            Identifier::Type(type_info) => write!(f, "<{type_info}>"),
        }
    }
}
