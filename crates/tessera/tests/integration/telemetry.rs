//! Stage transitions and timings observed from outside the layer.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tessera::{
    CodecRegistry, CompressionLayer, LayerConfig, Residency, SimulatedAccelerator, Stage,
    TelemetryConfig, TelemetrySink, TransferManager,
};

use super::activations;

#[derive(Clone, Default)]
struct Transitions(Arc<Mutex<Vec<(Stage, Stage)>>>);

impl Transitions {
    fn take(&self) -> Vec<(Stage, Stage)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl TelemetrySink for Transitions {
    fn on_transition(&mut self, from: Stage, to: Stage, _at: Instant) {
        self.0.lock().unwrap().push((from, to));
    }
}

fn noop_config() -> LayerConfig {
    LayerConfig::new("noop_encoder", "noop_decoder").with_capacities(1024, 1024)
}

#[test]
fn test_host_call_skips_transfer_stages() {
    let seen = Transitions::default();
    let mut layer = CompressionLayer::new(noop_config())
        .unwrap()
        .with_sink(Box::new(seen.clone()));

    layer.forward(&activations(&[1, 3, 4, 4], 0)).unwrap();
    assert_eq!(
        seen.take(),
        vec![
            (Stage::Idle, Stage::Encode),
            (Stage::Encode, Stage::Decode),
            (Stage::Decode, Stage::Idle),
        ]
    );
}

#[test]
fn test_device_call_visits_every_stage() {
    let accel = SimulatedAccelerator::new();
    let seen = Transitions::default();
    let config = noop_config().with_output_residency(Residency::Accelerator);
    let transfer = TransferManager::with_accelerator(Arc::new(accel.clone()));
    let mut layer = CompressionLayer::with_parts(config, CodecRegistry::global(), transfer)
        .unwrap()
        .with_sink(Box::new(seen.clone()));

    let device = TransferManager::with_accelerator(Arc::new(accel))
        .convert(&activations(&[1, 3, 4, 4], 1), Residency::Accelerator)
        .unwrap();
    layer.forward(&device).unwrap();

    assert_eq!(
        seen.take(),
        vec![
            (Stage::Idle, Stage::TransferIn),
            (Stage::TransferIn, Stage::Encode),
            (Stage::Encode, Stage::Decode),
            (Stage::Decode, Stage::TransferOut),
            (Stage::TransferOut, Stage::Idle),
        ]
    );
}

#[test]
fn test_failure_returns_to_idle() {
    let seen = Transitions::default();
    let config = LayerConfig::new("noop_encoder", "noop_decoder").with_capacities(8, 1024);
    let mut layer = CompressionLayer::new(config)
        .unwrap()
        .with_sink(Box::new(seen.clone()));

    assert!(layer.forward(&activations(&[1, 3, 4, 4], 2)).is_err());
    assert_eq!(
        seen.take(),
        vec![(Stage::Idle, Stage::Encode), (Stage::Encode, Stage::Idle)]
    );
    assert_eq!(layer.state(), Stage::Idle);
}

#[test]
fn test_timings_recorded_per_successful_call() {
    let config = noop_config().with_telemetry(TelemetryConfig::timings());
    let mut layer = CompressionLayer::new(config).unwrap();

    for seed in 0..3 {
        layer.forward(&activations(&[1, 3, 4, 4], seed)).unwrap();
    }
    assert!(layer.forward(&activations(&[1, 3, 16, 16], 0)).is_err());
    assert_eq!(layer.call_timings().len(), 3);

    let t = layer.call_timings()[0];
    assert!(t.total >= t.encode);
    assert!(t.transfer_in.is_zero() && t.transfer_out.is_zero());

    layer.reset();
    assert!(layer.call_timings().is_empty());
}

#[test]
fn test_telemetry_does_not_change_results() {
    let input = activations(&[1, 4, 8, 8], 3);
    let build = |telemetry: TelemetryConfig| {
        let config = LayerConfig::new("quantize_encoder", "quantize_decoder")
            .with_encoder_params(tessera_core::CodecConfig::new().with("bits", 3))
            .with_capacities(2048, 2048)
            .with_telemetry(telemetry);
        CompressionLayer::new(config).unwrap()
    };

    let mut plain = build(TelemetryConfig::disabled());
    let mut timed = build(TelemetryConfig::timings());
    let mut traced = build(TelemetryConfig::tracing());

    let a = plain.forward(&input).unwrap();
    let b = timed.forward(&input).unwrap();
    let c = traced.forward(&input).unwrap();
    assert_eq!(a.host_bytes(), b.host_bytes());
    assert_eq!(a.host_bytes(), c.host_bytes());
    assert_eq!(plain.compressed_sizes(), timed.compressed_sizes());
    assert!(plain.call_timings().is_empty());
    assert!(traced.call_timings().is_empty());
}
