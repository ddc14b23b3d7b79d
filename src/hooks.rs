use alloc::{sync::Arc, vec::Vec};
use parking_lot::Mutex;

use crate::{
    binding::SharedBinding,
    context::InjectionContext,
    injector::{Injector, ResolveRequest},
    instance::{Instance, Resolution},
    reflection::ReflectionInfo,
};

/// Whether the remaining hooks of the same extension point run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Stop,
}

/// Runs around a resolution and may set its result.
/// Returning [`HookFlow::Stop`] skips the remaining hooks and ends the resolution with the current result.
pub type ResolveHook = Arc<dyn Fn(&Injector, &ResolveRequest, &mut Option<Resolution>) -> HookFlow + Send + Sync>;
/// Replaces the default instantiation of a binding's value, the first hook returning `Some` wins
pub type InstantiateHook = Arc<dyn Fn(&Injector, &SharedBinding, &InjectionContext) -> Option<Resolution> + Send + Sync>;
pub type AfterInstantiateHook = Arc<dyn Fn(&Injector, &SharedBinding, Option<&Resolution>) + Send + Sync>;
pub type InjectHook = Arc<dyn Fn(&Injector, &mut Instance, &ReflectionInfo) + Send + Sync>;

/// Registered extension points of an injector.
///
/// Hooks are called in registration order.
/// Each list is copied before calling, so a hook may register other hooks or resolve recursively.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) before_resolve: HookList<ResolveHook>,
    pub(crate) after_resolve: HookList<ResolveHook>,
    pub(crate) before_default_instantiate: HookList<InstantiateHook>,
    pub(crate) after_instantiate: HookList<AfterInstantiateHook>,
    pub(crate) before_inject: HookList<InjectHook>,
    pub(crate) after_inject: HookList<InjectHook>,
}

pub(crate) struct HookList<H> {
    hooks: Mutex<Vec<H>>,
}

impl<H> Default for HookList<H> {
    fn default() -> Self {
        Self {
            hooks: Mutex::new(Vec::new()),
        }
    }
}

impl<H: Clone> HookList<H> {
    #[inline]
    pub(crate) fn push(&self, hook: H) {
        self.hooks.lock().push(hook);
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Vec<H> {
        self.hooks.lock().clone()
    }
}

impl Hooks {
    pub(crate) fn run_resolve(
        hooks: &HookList<ResolveHook>,
        injector: &Injector,
        request: &ResolveRequest,
        result: &mut Option<Resolution>,
    ) -> HookFlow {
        for hook in hooks.snapshot() {
            if hook(injector, request, result) == HookFlow::Stop {
                return HookFlow::Stop;
            }
        }
        HookFlow::Continue
    }

    pub(crate) fn run_instantiate(&self, injector: &Injector, binding: &SharedBinding, context: &InjectionContext) -> Option<Resolution> {
        self.before_default_instantiate
            .snapshot()
            .into_iter()
            .find_map(|hook| hook(injector, binding, context))
    }

    pub(crate) fn run_after_instantiate(&self, injector: &Injector, binding: &SharedBinding, resolution: Option<&Resolution>) {
        for hook in self.after_instantiate.snapshot() {
            hook(injector, binding, resolution);
        }
    }

    pub(crate) fn run_inject(hooks: &HookList<InjectHook>, injector: &Injector, instance: &mut Instance, info: &ReflectionInfo) {
        for hook in hooks.snapshot() {
            hook(injector, instance, info);
        }
    }
}
