//! Performance benchmarks for trailmap-lib
//!
//! Run with: cargo bench --package trailmap-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gpx::{Gpx, Track, TrackSegment, Waypoint};
use std::future::Future;
use trailmap_lib::resample::{DEFAULT_MAX_SEGMENT_KM, resample};
use trailmap_lib::{
    Coordinate, ElevationSource, LayerRegistry, LayerSynchronizer, ProfileBuilder, ProfileConfig,
    ProfileStats, path_from_gpx,
};
use trailmap_lib::layers::{BasemapStyle, InMemoryEngine, ids};

/// Generate a wiggly GPX track with the specified number of points around Mount Mansfield
fn generate_gpx_track(num_points: usize, span_deg: f64) -> Gpx {
    let mut gpx = Gpx::default();
    let mut track = Track::default();
    let mut segment = TrackSegment::default();

    for i in 0..num_points {
        let t = i as f64 / num_points as f64;
        let lat = 44.50 + t * span_deg + (t * 50.0).sin() * 0.001;
        let lon = -72.85 + t * span_deg + (t * 30.0).cos() * 0.001;
        segment.points.push(Waypoint::new(geo::Point::new(lon, lat)));
    }

    track.segments.push(segment);
    gpx.tracks.push(track);
    gpx
}

/// Answers immediately with a plausible candidate set derived from latitude
struct SyntheticTerrain;

impl ElevationSource for SyntheticTerrain {
    fn candidates(
        &self,
        coordinate: Coordinate,
        _radius_m: f64,
        _limit: usize,
    ) -> impl Future<Output = trailmap_lib::Result<Vec<f64>>> + Send {
        let base = 400.0 + (coordinate.lat - 44.5) * 10_000.0;
        async move { Ok(vec![base - 10.0, base, base + 10.0, 99_999.0]) }
    }
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");

    for &points in &[100usize, 1_000, 10_000] {
        let path = path_from_gpx(&generate_gpx_track(points, 0.05));
        group.throughput(Throughput::Elements(points as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points), &path, |b, path| {
            b.iter(|| resample(path, DEFAULT_MAX_SEGMENT_KM));
        });
    }

    group.finish();
}

fn bench_profile(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile");
    group.sample_size(20);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .unwrap();
    let builder = ProfileBuilder::new(SyntheticTerrain, ProfileConfig::default());

    // ~8 km trail digitized with 200 vertices
    let path = path_from_gpx(&generate_gpx_track(200, 0.05));
    let resampled = resample(&path, DEFAULT_MAX_SEGMENT_KM).len();

    group.throughput(Throughput::Elements(resampled as u64));
    group.bench_function("build_8km", |b| {
        b.iter(|| runtime.block_on(builder.build(&path)));
    });

    let profile = runtime.block_on(builder.build(&path));
    group.bench_function("stats", |b| {
        b.iter(|| ProfileStats::from_profile(&profile));
    });

    group.finish();
}

fn bench_style_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("layers");

    group.bench_function("swap_and_restore", |b| {
        let mut sync = LayerSynchronizer::new(LayerRegistry::default(), BasemapStyle::Dark);
        let mut engine = InMemoryEngine::new();
        sync.start(&mut engine).unwrap();
        engine.finish_style_load();
        sync.on_style_loaded(&mut engine).unwrap();
        sync.toggle(&mut engine, ids::CONTOURS, false).unwrap();

        let styles = [BasemapStyle::Outdoors, BasemapStyle::Satellite, BasemapStyle::Dark];
        let mut next = 0;
        b.iter(|| {
            sync.begin_style_swap(&mut engine, styles[next % styles.len()]).unwrap();
            engine.finish_style_load();
            sync.on_style_loaded(&mut engine).unwrap();
            next += 1;
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_resample, bench_profile, bench_style_swap);

criterion_main!(benches);
