#![allow(dead_code)]

use bindery::{Config, Container, ParameterInfo, TypeMeta};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA(Arc<CAAAA>);
struct CAAAA(Arc<CAAAAA>);
struct CAAAAA;

fn register_chain(container: &Container) {
    container
        .register(TypeMeta::<CAAAAA>::new().constructor(|| Ok(CAAAAA)))
        .register(
            TypeMeta::<CAAAA>::new().constructor_with([ParameterInfo::of::<CAAAAA>("caaaaa")], |args| Ok(CAAAA(args.get(0)?))),
        )
        .register(TypeMeta::<CAAA>::new().constructor_with([ParameterInfo::of::<CAAAA>("caaaa")], |args| Ok(CAAA(args.get(0)?))))
        .register(TypeMeta::<CAA>::new().constructor_with([ParameterInfo::of::<CAAA>("caaa")], |args| Ok(CAA(args.get(0)?))))
        .register(TypeMeta::<CA>::new().constructor_with([ParameterInfo::of::<CAA>("caa")], |args| Ok(CA(args.get(0)?))))
        .register(TypeMeta::<C>::new().constructor_with([ParameterInfo::of::<CA>("ca")], |args| Ok(C(args.get(0)?))))
        .register(TypeMeta::<B>::new().constructor(|| Ok(B(2))))
        .register(TypeMeta::<A>::new().constructor_with(
            [ParameterInfo::of::<B>("b"), ParameterInfo::of::<C>("c")],
            |args| Ok(A(args.get(0)?, args.get(1)?)),
        ));
}

#[inline]
fn container_new_with_bindings() -> Container {
    let container = Container::new();
    register_chain(&container);
    container.bind_singleton::<B>().to_self().unwrap();
    container.bind_address::<A>().to_self().unwrap();
    container
}

#[inline]
fn container_resolve(container: &Container) {
    let _ = container.resolve::<A>().unwrap();
}

#[inline]
fn container_resolve_and_close(container: &Container) {
    container.bind_singleton::<A>().to_self().unwrap();
    let _ = container.resolve::<A>().unwrap();

    container.close();
}

fn criterion_benchmark(c: &mut Criterion) {
    let unbound = Container::with_config(Config::default());
    register_chain(&unbound);

    let singletons = Container::new();
    register_chain(&singletons);
    for binding in [
        singletons.bind_singleton::<CAAAAA>(),
        singletons.bind_singleton::<CAAAA>(),
        singletons.bind_singleton::<CAAA>(),
        singletons.bind_singleton::<CAA>(),
        singletons.bind_singleton::<CA>(),
        singletons.bind_singleton::<C>(),
        singletons.bind_singleton::<B>(),
        singletons.bind_singleton::<A>(),
    ] {
        binding.to_self().unwrap();
    }

    c.bench_function("container_new_with_bindings", |b| b.iter(container_new_with_bindings))
        .bench_function("container_resolve_unbound", |b| b.iter(|| container_resolve(&unbound)))
        .bench_function("container_resolve_singletons", |b| b.iter(|| container_resolve(&singletons)))
        .bench_function("container_resolve_and_close", |b| {
            let container = Container::new();
            register_chain(&container);
            b.iter(|| container_resolve_and_close(&container))
        });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
