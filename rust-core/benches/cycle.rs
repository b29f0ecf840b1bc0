use std::f64::consts::PI;
use std::time::{Duration, SystemTime};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fft_instance::channel::ScanKind;
use fft_instance::config::EngineConfig;
use fft_instance::instance::InstanceRegistry;
use fft_instance::spectrum::{analysis, SampleBuffer, TransformEngine, WindowType};

fn sine(n: usize) -> Vec<f64> {
    (0..n).map(|i| (2.0 * PI * 50.0 * i as f64 / 1024.0).sin()).collect()
}

fn bench_engine_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_cycle");
    for n in [256usize, 1024, 4096, 16384] {
        let samples = sine(n);
        let mut engine = TransformEngine::new();
        engine.set_sample_freq(1024.0);
        engine.set_window_type(WindowType::Hann);

        group.bench_with_input(BenchmarkId::from_parameter(n), &samples, |b, samples| {
            b.iter(|| {
                engine.set_input(SampleBuffer::from_slice(black_box(samples)));
                engine.apply_window();
                engine.replan();
                engine.transform().unwrap();
                black_box(analysis::magnitude_db(engine.output()));
            })
        });
    }
    group.finish();
}

fn bench_triggered_cycle(c: &mut Criterion) {
    let registry = InstanceRegistry::new(EngineConfig {
        workers: 1,
        ..EngineConfig::default()
    })
    .unwrap();
    let input = registry.connect("wave", "bench input-real trigger=yes").unwrap();
    let magn = registry.connect("magn", "bench output-magn").unwrap();
    let ready = registry.find("bench").unwrap().subscribe(ScanKind::Value);
    let samples = sine(1024);

    c.bench_function("triggered_cycle_1024", |b| {
        b.iter(|| {
            input.write_samples(black_box(&samples), SystemTime::now()).unwrap();
            ready.recv_timeout(Duration::from_secs(1)).unwrap();
            black_box(magn.read_array(513).unwrap());
        })
    });
}

criterion_group!(benches, bench_engine_cycle, bench_triggered_cycle);
criterion_main!(benches);
