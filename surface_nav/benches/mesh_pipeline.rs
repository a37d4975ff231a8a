//! Measure the sample -> mesh -> graph -> search pipeline.
//!
//! The scene is a floor with a ball resting on it, sampled in a 64^3 grid.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use surface_nav::field::ScalarField;
use surface_nav::marching_cubes::MarchingCubesBuilder;
use surface_nav::sampler::{HalfSpaceSampler, SphereSampler, UnionSampler, sample_box};
use surface_nav::surface_graph::SurfaceGraphBuilder;
use surface_nav::types::{Aabb, Vec3};
use surface_nav::{NavConfig, SurfaceNavigationSystem};

const VOXEL: f32 = 5.0;

fn scene() -> UnionSampler {
    UnionSampler::new()
        .with(HalfSpaceSampler::floor(-60.0))
        .with(SphereSampler::new(Vec3::new(20.0, -40.0, 0.0), 45.0))
}

fn sampled_scene() -> ScalarField {
    let bounds = Aabb::from_center_extent(Vec3::ZERO, Vec3::splat(160.0));
    sample_box(&scene(), &bounds, VOXEL, true)
}

fn bench_sampling(c: &mut Criterion) {
    let sampler = scene();
    let bounds = Aabb::from_center_extent(Vec3::ZERO, Vec3::splat(160.0));
    let mut group = c.benchmark_group("sampling");
    group.bench_function("sequential", |b| {
        b.iter(|| sample_box(black_box(&sampler), &bounds, VOXEL, false))
    });
    group.bench_function("parallel", |b| {
        b.iter(|| sample_box(black_box(&sampler), &bounds, VOXEL, true))
    });
    group.finish();
}

fn bench_meshing(c: &mut Criterion) {
    let field = sampled_scene();
    let mut group = c.benchmark_group("meshing");
    group.bench_function("dedup_with_boundary", |b| {
        b.iter(|| {
            MarchingCubesBuilder::from_field(black_box(&field), 0.5)
                .build()
                .map(|m| m.triangle_count())
        })
    });
    group.bench_function("no_dedup", |b| {
        b.iter(|| {
            MarchingCubesBuilder::from_field(black_box(&field), 0.5)
                .with_remove_duplicate_vertices(false)
                .build()
                .map(|m| m.triangle_count())
        })
    });
    group.finish();
}

fn bench_edge_graph(c: &mut Criterion) {
    let field = sampled_scene();
    let local = SurfaceGraphBuilder::from_field(&field, 0.5).build_local_data();
    c.bench_function("edge_graph_build", |b| {
        b.iter(|| SurfaceGraphBuilder::from_field(black_box(&field), 0.5).build_graph())
    });
    if let Ok(local) = local {
        let from = Vec3::new(-150.0, -57.5, -150.0);
        let to = Vec3::new(150.0, -57.5, 150.0);
        c.bench_function("edge_graph_search", |b| {
            b.iter(|| local.find_path_between(black_box(from), black_box(to), true))
        });
    }
}

fn bench_celled_system(c: &mut Criterion) {
    let volume = Aabb::new(Vec3::new(-240.0, -90.0, -240.0), Vec3::new(240.0, 90.0, 240.0));
    let config = NavConfig::default();
    c.bench_function("celled_build", |b| {
        b.iter(|| {
            let mut system = SurfaceNavigationSystem::new(&config, scene());
            system.add_volume(black_box(volume));
            system.nav_data().node_count()
        })
    });

    let mut system = SurfaceNavigationSystem::new(&config, scene());
    system.add_volume(volume);
    let from = Vec3::new(-220.0, -50.0, -220.0);
    let to = Vec3::new(220.0, -50.0, 220.0);
    c.bench_function("celled_search", |b| {
        b.iter(|| system.find_path(black_box(from), black_box(to)))
    });
}

criterion_group!(
    benches,
    bench_sampling,
    bench_meshing,
    bench_edge_graph,
    bench_celled_system
);
criterion_main!(benches);
