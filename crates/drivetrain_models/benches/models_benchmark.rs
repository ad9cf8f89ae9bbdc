//! # Model Tick Benchmark
//!
//! One tick of each subsystem model. The three together must stay far
//! below the 16.6 ms tick period.
//!
//! Run with: `cargo bench --package drivetrain_models`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use drivetrain_core::{ControlParams, EngineParams, FuelParams, TransmissionParams};
use drivetrain_models::{
    ControlInput, DriverControls, EngineModel, FuelInput, FuelModel, KinematicState,
    SteerIntent, TransmissionInput, TransmissionModel,
};

fn bench_engine_step(c: &mut Criterion) {
    let model = EngineModel::new(EngineParams::default());
    let params = ControlParams::default();
    let mut controls = DriverControls {
        engine_on: true,
        ..DriverControls::new()
    };
    let input = ControlInput::ACCELERATE.steering(SteerIntent::Right);
    let prior = KinematicState {
        speed: 12.0,
        fuel: 80.0,
        gear: 3,
        heading: 0.4,
        x: 100.0,
        y: -20.0,
    };

    c.bench_function("engine_step", |b| {
        b.iter(|| {
            controls.apply(black_box(&input), prior.speed, prior.fuel, &params);
            black_box(model.step(black_box(&prior), &controls, black_box(0.016)))
        });
    });
}

fn bench_transmission_decide(c: &mut Criterion) {
    let mut model = TransmissionModel::new(TransmissionParams::default());
    let input = TransmissionInput {
        speed: 15.0,
        gear: 3,
        rpm: 3800.0,
        reverse: false,
        throttle: 0.6,
    };
    let mut now = Duration::ZERO;

    c.bench_function("transmission_decide", |b| {
        b.iter(|| {
            now += Duration::from_millis(17);
            black_box(model.decide(black_box(&input), now))
        });
    });
}

fn bench_fuel_integrate(c: &mut Criterion) {
    let model = FuelModel::new(FuelParams::default());
    let input = FuelInput {
        throttle: 0.6,
        speed: 15.0,
        rpm: 3800,
        power: 60_000.0,
        current_fuel: 55.0,
    };

    c.bench_function("fuel_integrate", |b| {
        b.iter(|| black_box(model.integrate(black_box(&input))));
    });
}

criterion_group!(
    benches,
    bench_engine_step,
    bench_transmission_decide,
    bench_fuel_integrate
);
criterion_main!(benches);
