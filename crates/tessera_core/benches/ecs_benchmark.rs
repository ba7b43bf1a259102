//! # ECS Structural Benchmark
//!
//! Measures the cost of structural operations:
//! - Creating and destroying entities
//! - Attaching and detaching 32 to 256 component types on one entity
//! - Looking up one component on every entity
//!
//! Run with: `cargo bench --package tessera_core --bench ecs_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::{Component, EntityId, World};

/// Entity counts swept by the per-entity benchmarks.
const COUNTS: [usize; 4] = [1 << 10, 1 << 13, 1 << 15, 1 << 17];

/// Component counts swept by the add/remove benchmarks.
const COMPONENT_COUNTS: [usize; 4] = [32, 64, 128, 256];

#[derive(Clone, Copy, Debug)]
struct Foo<const N: usize>(i32);

impl<const N: usize> Component for Foo<N> {}

type Op = fn(&mut World, EntityId);

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn add<const N: usize>(world: &mut World, entity: EntityId) {
    world.add(entity, Foo::<N>(N as i32)).unwrap();
}

fn remove<const N: usize>(world: &mut World, entity: EntityId) {
    world.remove::<Foo<N>>(entity).unwrap();
}

/// One adder per distinct component type, `Foo<0>` first.
const ADDERS: [Op; 256] = [
    add::<0>, add::<1>, add::<2>, add::<3>, add::<4>, add::<5>, add::<6>, add::<7>,
    add::<8>, add::<9>, add::<10>, add::<11>, add::<12>, add::<13>, add::<14>, add::<15>,
    add::<16>, add::<17>, add::<18>, add::<19>, add::<20>, add::<21>, add::<22>, add::<23>,
    add::<24>, add::<25>, add::<26>, add::<27>, add::<28>, add::<29>, add::<30>, add::<31>,
    add::<32>, add::<33>, add::<34>, add::<35>, add::<36>, add::<37>, add::<38>, add::<39>,
    add::<40>, add::<41>, add::<42>, add::<43>, add::<44>, add::<45>, add::<46>, add::<47>,
    add::<48>, add::<49>, add::<50>, add::<51>, add::<52>, add::<53>, add::<54>, add::<55>,
    add::<56>, add::<57>, add::<58>, add::<59>, add::<60>, add::<61>, add::<62>, add::<63>,
    add::<64>, add::<65>, add::<66>, add::<67>, add::<68>, add::<69>, add::<70>, add::<71>,
    add::<72>, add::<73>, add::<74>, add::<75>, add::<76>, add::<77>, add::<78>, add::<79>,
    add::<80>, add::<81>, add::<82>, add::<83>, add::<84>, add::<85>, add::<86>, add::<87>,
    add::<88>, add::<89>, add::<90>, add::<91>, add::<92>, add::<93>, add::<94>, add::<95>,
    add::<96>, add::<97>, add::<98>, add::<99>, add::<100>, add::<101>, add::<102>, add::<103>,
    add::<104>, add::<105>, add::<106>, add::<107>, add::<108>, add::<109>, add::<110>, add::<111>,
    add::<112>, add::<113>, add::<114>, add::<115>, add::<116>, add::<117>, add::<118>, add::<119>,
    add::<120>, add::<121>, add::<122>, add::<123>, add::<124>, add::<125>, add::<126>, add::<127>,
    add::<128>, add::<129>, add::<130>, add::<131>, add::<132>, add::<133>, add::<134>, add::<135>,
    add::<136>, add::<137>, add::<138>, add::<139>, add::<140>, add::<141>, add::<142>, add::<143>,
    add::<144>, add::<145>, add::<146>, add::<147>, add::<148>, add::<149>, add::<150>, add::<151>,
    add::<152>, add::<153>, add::<154>, add::<155>, add::<156>, add::<157>, add::<158>, add::<159>,
    add::<160>, add::<161>, add::<162>, add::<163>, add::<164>, add::<165>, add::<166>, add::<167>,
    add::<168>, add::<169>, add::<170>, add::<171>, add::<172>, add::<173>, add::<174>, add::<175>,
    add::<176>, add::<177>, add::<178>, add::<179>, add::<180>, add::<181>, add::<182>, add::<183>,
    add::<184>, add::<185>, add::<186>, add::<187>, add::<188>, add::<189>, add::<190>, add::<191>,
    add::<192>, add::<193>, add::<194>, add::<195>, add::<196>, add::<197>, add::<198>, add::<199>,
    add::<200>, add::<201>, add::<202>, add::<203>, add::<204>, add::<205>, add::<206>, add::<207>,
    add::<208>, add::<209>, add::<210>, add::<211>, add::<212>, add::<213>, add::<214>, add::<215>,
    add::<216>, add::<217>, add::<218>, add::<219>, add::<220>, add::<221>, add::<222>, add::<223>,
    add::<224>, add::<225>, add::<226>, add::<227>, add::<228>, add::<229>, add::<230>, add::<231>,
    add::<232>, add::<233>, add::<234>, add::<235>, add::<236>, add::<237>, add::<238>, add::<239>,
    add::<240>, add::<241>, add::<242>, add::<243>, add::<244>, add::<245>, add::<246>, add::<247>,
    add::<248>, add::<249>, add::<250>, add::<251>, add::<252>, add::<253>, add::<254>, add::<255>,
];

/// One remover per distinct component type, `Foo<0>` first.
const REMOVERS: [Op; 256] = [
    remove::<0>, remove::<1>, remove::<2>, remove::<3>, remove::<4>, remove::<5>, remove::<6>, remove::<7>,
    remove::<8>, remove::<9>, remove::<10>, remove::<11>, remove::<12>, remove::<13>, remove::<14>, remove::<15>,
    remove::<16>, remove::<17>, remove::<18>, remove::<19>, remove::<20>, remove::<21>, remove::<22>, remove::<23>,
    remove::<24>, remove::<25>, remove::<26>, remove::<27>, remove::<28>, remove::<29>, remove::<30>, remove::<31>,
    remove::<32>, remove::<33>, remove::<34>, remove::<35>, remove::<36>, remove::<37>, remove::<38>, remove::<39>,
    remove::<40>, remove::<41>, remove::<42>, remove::<43>, remove::<44>, remove::<45>, remove::<46>, remove::<47>,
    remove::<48>, remove::<49>, remove::<50>, remove::<51>, remove::<52>, remove::<53>, remove::<54>, remove::<55>,
    remove::<56>, remove::<57>, remove::<58>, remove::<59>, remove::<60>, remove::<61>, remove::<62>, remove::<63>,
    remove::<64>, remove::<65>, remove::<66>, remove::<67>, remove::<68>, remove::<69>, remove::<70>, remove::<71>,
    remove::<72>, remove::<73>, remove::<74>, remove::<75>, remove::<76>, remove::<77>, remove::<78>, remove::<79>,
    remove::<80>, remove::<81>, remove::<82>, remove::<83>, remove::<84>, remove::<85>, remove::<86>, remove::<87>,
    remove::<88>, remove::<89>, remove::<90>, remove::<91>, remove::<92>, remove::<93>, remove::<94>, remove::<95>,
    remove::<96>, remove::<97>, remove::<98>, remove::<99>, remove::<100>, remove::<101>, remove::<102>, remove::<103>,
    remove::<104>, remove::<105>, remove::<106>, remove::<107>, remove::<108>, remove::<109>, remove::<110>, remove::<111>,
    remove::<112>, remove::<113>, remove::<114>, remove::<115>, remove::<116>, remove::<117>, remove::<118>, remove::<119>,
    remove::<120>, remove::<121>, remove::<122>, remove::<123>, remove::<124>, remove::<125>, remove::<126>, remove::<127>,
    remove::<128>, remove::<129>, remove::<130>, remove::<131>, remove::<132>, remove::<133>, remove::<134>, remove::<135>,
    remove::<136>, remove::<137>, remove::<138>, remove::<139>, remove::<140>, remove::<141>, remove::<142>, remove::<143>,
    remove::<144>, remove::<145>, remove::<146>, remove::<147>, remove::<148>, remove::<149>, remove::<150>, remove::<151>,
    remove::<152>, remove::<153>, remove::<154>, remove::<155>, remove::<156>, remove::<157>, remove::<158>, remove::<159>,
    remove::<160>, remove::<161>, remove::<162>, remove::<163>, remove::<164>, remove::<165>, remove::<166>, remove::<167>,
    remove::<168>, remove::<169>, remove::<170>, remove::<171>, remove::<172>, remove::<173>, remove::<174>, remove::<175>,
    remove::<176>, remove::<177>, remove::<178>, remove::<179>, remove::<180>, remove::<181>, remove::<182>, remove::<183>,
    remove::<184>, remove::<185>, remove::<186>, remove::<187>, remove::<188>, remove::<189>, remove::<190>, remove::<191>,
    remove::<192>, remove::<193>, remove::<194>, remove::<195>, remove::<196>, remove::<197>, remove::<198>, remove::<199>,
    remove::<200>, remove::<201>, remove::<202>, remove::<203>, remove::<204>, remove::<205>, remove::<206>, remove::<207>,
    remove::<208>, remove::<209>, remove::<210>, remove::<211>, remove::<212>, remove::<213>, remove::<214>, remove::<215>,
    remove::<216>, remove::<217>, remove::<218>, remove::<219>, remove::<220>, remove::<221>, remove::<222>, remove::<223>,
    remove::<224>, remove::<225>, remove::<226>, remove::<227>, remove::<228>, remove::<229>, remove::<230>, remove::<231>,
    remove::<232>, remove::<233>, remove::<234>, remove::<235>, remove::<236>, remove::<237>, remove::<238>, remove::<239>,
    remove::<240>, remove::<241>, remove::<242>, remove::<243>, remove::<244>, remove::<245>, remove::<246>, remove::<247>,
    remove::<248>, remove::<249>, remove::<250>, remove::<251>, remove::<252>, remove::<253>, remove::<254>, remove::<255>,
];

/// Benchmark: create N entities and commit them.
fn bench_create_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_entities");

    for count in COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new();
                for _ in 0..count {
                    black_box(world.create_entity());
                }
                world.refresh();
                world.alive_count()
            });
        });
    }

    group.finish();
}

/// Benchmark: create N entities with one component, then destroy them all.
fn bench_destroy_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("destroy_entities");

    for count in COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new();
                let mut entities = Vec::with_capacity(count);
                for _ in 0..count {
                    let entity = world.create_entity();
                    world.add(entity, Foo::<0>(0)).unwrap();
                    entities.push(entity);
                }
                world.refresh();
                for entity in entities {
                    world.destroy_entity(entity).unwrap();
                }
                world.refresh();
                world.alive_count()
            });
        });
    }

    group.finish();
}

/// Benchmark: attach N distinct component types to a single entity.
fn bench_add_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_components");

    for count in COMPONENT_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new();
                let entity = world.create_entity();
                for add in &ADDERS[..count] {
                    add(&mut world, entity);
                }
                world.refresh();
                world.component_count()
            });
        });
    }

    group.finish();
}

/// Benchmark: attach then detach N distinct component types.
fn bench_remove_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_components");

    for count in COMPONENT_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new();
                let entity = world.create_entity();
                for add in &ADDERS[..count] {
                    add(&mut world, entity);
                }
                world.refresh();
                for remove in &REMOVERS[..count] {
                    remove(&mut world, entity);
                }
                world.refresh();
                world.density::<Foo<0>>()
            });
        });
    }

    group.finish();
}

/// Benchmark: fetch one component from each of N entities.
fn bench_get_component(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_component");

    for count in COUNTS {
        let mut world = World::new();
        let entities: Vec<EntityId> = (0..count)
            .map(|_| {
                let entity = world.create_entity();
                world.add(entity, Foo::<0>(1)).unwrap();
                entity
            })
            .collect();
        world.refresh();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut sum = 0i64;
                for &entity in &entities {
                    sum += i64::from(world.get::<Foo<0>>(entity).unwrap().0);
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_entities,
    bench_destroy_entities,
    bench_add_components,
    bench_remove_components,
    bench_get_component,
);

criterion_main!(benches);
