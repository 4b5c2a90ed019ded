//! Criterion benchmarks for the scan conversion hot path.
//!
//! The transfer worker runs `Pipeline::process_input` once per bulk stage,
//! so its per-sample cost bounds the sustainable scan rate.
//!
//! Run with: cargo bench --bench scan_pipeline

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uldaq::calibration::{CalCoef, CustomScale};
use uldaq::range::Range;
use uldaq::scan::{AnalogConversion, ChannelConversion, CjcSource, Pipeline, SampleFormat, ScanInfo, TcConversion};
use uldaq::types::{FunctionType, TcType, TempScale};

const CHANNELS: usize = 8;

struct FixedCjc;

impl CjcSource for FixedCjc {
    fn read_cjc_temps(&self) -> uldaq::Result<Vec<f64>> {
        Ok(vec![23.5, 23.5])
    }
}

fn analog(format: SampleFormat, range: Range) -> AnalogConversion {
    AnalogConversion {
        cal: CalCoef::new(1.0002, -3.5),
        scale: range.eu_scale(),
        custom: CustomScale::IDENTITY,
        format,
        calibrate: true,
        scale_data: true,
    }
}

fn stage(samples: usize) -> Vec<u8> {
    (0..samples as u32)
        .flat_map(|i| (0x1_0000 + (i * 37) % 0x2_0000).to_le_bytes())
        .collect()
}

/// Unsigned 18-bit voltage samples, the USB-1808 input format.
fn voltage_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_voltage");
    let conv = ChannelConversion::Analog(analog(SampleFormat::Unsigned { bits: 18 }, Range::Bip10Volts));

    for samples in [512usize, 8 * 1024, 64 * 1024] {
        let bytes = stage(samples);
        let mut buffer = vec![0.0f64; samples];
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::new("process_input", samples), &samples, |b, _| {
            b.iter(|| {
                let mut pipeline = Pipeline::new(vec![conv; CHANNELS]);
                let mut info = ScanInfo::new(FunctionType::Ai, CHANNELS, samples / CHANNELS, 4, false);
                pipeline.process_input::<u32, f64, _>(&mut info, black_box(&bytes), &mut buffer, |_, raw| raw)
            });
        });
    }
    group.finish();
}

/// Signed 24-bit thermocouple samples with CJC compensation.
fn thermocouple_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_thermocouple");
    let conv = ChannelConversion::Thermocouple(TcConversion {
        analog: analog(SampleFormat::Signed { bits: 24 }, Range::BipPt078Volts),
        tc_type: TcType::K,
        cjc_slot: 0,
        otd: true,
        temp_scale: TempScale::Celsius,
    });
    let samples = 4096;
    let bytes: Vec<u8> = (0..samples as u32).flat_map(|i| (i * 113).to_le_bytes()).collect();
    let mut buffer = vec![0.0f64; samples];

    group.throughput(Throughput::Elements(samples as u64));
    group.bench_function("process_input", |b| {
        b.iter(|| {
            let mut pipeline = Pipeline::new(vec![conv; CHANNELS]).with_cjc(Arc::new(FixedCjc), 1024);
            let mut info = ScanInfo::new(FunctionType::Ai, CHANNELS, samples / CHANNELS, 4, false);
            pipeline.process_input::<u32, f64, _>(&mut info, black_box(&bytes), &mut buffer, |_, raw| {
                raw & 0x00FF_FFFF
            })
        });
    });
    group.finish();
}

/// 16-bit output words from engineering values.
fn voltage_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_output");
    let conv = ChannelConversion::Analog(analog(SampleFormat::Unsigned { bits: 16 }, Range::Bip10Volts));
    let samples = 8 * 1024;
    let values: Vec<f64> = (0..samples).map(|i| (i as f64 / samples as f64) * 20.0 - 10.0).collect();
    let mut out = vec![0u8; samples * 2];

    group.throughput(Throughput::Elements(samples as u64));
    group.bench_function("process_output", |b| {
        b.iter(|| {
            let mut pipeline = Pipeline::new(vec![conv; 2]);
            let mut info = ScanInfo::new(FunctionType::Ao, 2, samples / 2, 2, false);
            pipeline.process_output::<u16, f64>(&mut info, black_box(&mut out), &values)
        });
    });
    group.finish();
}

criterion_group!(benches, voltage_input, thermocouple_input, voltage_output);
criterion_main!(benches);
