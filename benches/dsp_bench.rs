//! Benchmarks for the siren's DSP primitives and the full engine block.
//!
//! The engine must render a block in well under its wall-clock duration on
//! a Pi Zero 2; these benches are the desktop-side early warning.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use dubsiren::dsp::delay::TapeDelay;
use dubsiren::dsp::filter::LowPassFilter;
use dubsiren::dsp::oscillator::{Oscillator, Waveform};
use dubsiren::dsp::reverb::ChamberReverb;
use dubsiren::engine::SirenEngine;
use dubsiren::EngineConfig;

const SR: f32 = 48_000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Saw,
            Waveform::Triangle,
        ] {
            let mut osc = Oscillator::new(SR);
            osc.set_waveform(waveform);
            osc.set_frequency(440.0);
            group.bench_with_input(
                BenchmarkId::new(waveform.name(), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        osc.render(black_box(&mut buffer));
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.5f32; size];
        let mut filter = LowPassFilter::new(SR);
        filter.set_cutoff(1_200.0);
        filter.set_resonance(0.6);

        group.bench_with_input(BenchmarkId::new("lowpass", size), &size, |b, _| {
            b.iter(|| {
                filter.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.5f32; size];
        let mut delay = TapeDelay::new(SR, 2.0);
        delay.set_delay_time(0.3);
        delay.set_feedback(0.6);
        delay.set_dry_wet(0.5);

        group.bench_with_input(BenchmarkId::new("tape", size), &size, |b, _| {
            b.iter(|| {
                delay.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

fn bench_reverb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/reverb");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.5f32; size];
        let mut reverb = ChamberReverb::new(SR);
        reverb.set_size(0.7);
        reverb.set_dry_wet(0.4);

        group.bench_with_input(BenchmarkId::new("chamber", size), &size, |b, _| {
            b.iter(|| {
                reverb.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    for &size in BLOCK_SIZES {
        let mut engine = SirenEngine::new(EngineConfig {
            sample_rate: SR as u32,
            block_size: size,
        });
        let controls = engine.controls();
        controls.set_lfo_depth(0.5);
        controls.set_delay_mix(0.4);
        controls.set_reverb_mix(0.4);
        controls.trigger();

        let mut out = vec![0.0f32; size * 2];
        group.bench_with_input(BenchmarkId::new("process", size), &size, |b, _| {
            b.iter(|| {
                engine.process(black_box(&mut out));
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_oscillator,
    bench_filter,
    bench_delay,
    bench_reverb,
    bench_engine
);
criterion_main!(benches);
