#![no_std]

extern crate alloc;

pub(crate) mod any;
pub(crate) mod binder;
pub(crate) mod binding;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod errors;
pub(crate) mod factory;
pub(crate) mod hooks;
pub(crate) mod identifier;
pub(crate) mod inject;
pub(crate) mod injector;
pub(crate) mod instance;
pub(crate) mod reflection;
pub(crate) mod setup;

pub use any::{TypeInfo, TypeKey};
pub use binder::{BeforeAddHook, Binder, BindingHandle};
pub use binding::{Binding, BindingKind, BindingValue, Condition, Constraint, SharedBinding};
pub use config::{Config, ResolutionMode};
pub use container::Container;
pub use context::{InjectionContext, InjectionSite};
pub use errors::{BindingErrorKind, InstantiateErrorKind, ResolveErrorKind, SetupErrorKind};
pub use factory::InjectionFactory;
pub use hooks::{AfterInstantiateHook, HookFlow, InjectHook, InstantiateHook, ResolveHook};
pub use identifier::Identifier;
pub use inject::{Inject, InjectMany};
pub use injector::{Injector, ResolveRequest};
pub use instance::{Instance, InstanceArray, Resolution, Upcasts};
pub use reflection::{AccessorInfo, Arguments, MethodInfo, ParameterInfo, ReflectionCache, ReflectionInfo, TypeMeta, TypeRegistry};
pub use setup::BindingsSetup;
