//! Host/accelerator placement of inputs and outputs.

use std::sync::Arc;

use tessera::{
    CodecRegistry, CompressionLayer, Error, LayerConfig, Residency, SimulatedAccelerator, Stage,
    Tensor, TransferManager,
};

use super::activations;

fn layer_on(accel: &SimulatedAccelerator, output: Residency, capacity: usize) -> CompressionLayer {
    let config = LayerConfig::new("lz4_encoder", "lz4_decoder")
        .with_capacities(capacity * 2, capacity)
        .with_output_residency(output);
    let transfer = TransferManager::with_accelerator(Arc::new(accel.clone()));
    CompressionLayer::with_parts(config, CodecRegistry::global(), transfer).unwrap()
}

fn to_device(accel: &SimulatedAccelerator, tensor: &Tensor) -> Tensor {
    TransferManager::with_accelerator(Arc::new(accel.clone()))
        .convert(tensor, Residency::Accelerator)
        .unwrap()
}

fn to_host(accel: &SimulatedAccelerator, tensor: &Tensor) -> Tensor {
    TransferManager::with_accelerator(Arc::new(accel.clone()))
        .convert(tensor, Residency::Host)
        .unwrap()
}

#[test]
fn test_host_to_host_never_transfers() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Host, 1024);

    for seed in 0..4 {
        let output = layer.forward(&activations(&[1, 4, 8, 8], seed)).unwrap();
        assert_eq!(output.residency(), Residency::Host);
    }
    assert_eq!(layer.transfer_stats().total_transfers(), 0);
    assert_eq!(accel.live_allocations(), 0);
}

#[test]
fn test_accelerator_input_host_output() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Host, 1024);
    let host = activations(&[1, 4, 8, 8], 1);
    let device = to_device(&accel, &host);

    let output = layer.forward(&device).unwrap();
    assert_eq!(output.residency(), Residency::Host);
    assert_eq!(output.host_bytes(), host.host_bytes());

    let stats = layer.transfer_stats();
    assert_eq!(stats.to_host, 1);
    assert_eq!(stats.to_accelerator, 0);
    assert_eq!(stats.bytes_to_host, 1024);
}

#[test]
fn test_accelerator_roundtrip() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Accelerator, 1024);
    let host = activations(&[1, 4, 8, 8], 2);
    let device = to_device(&accel, &host);

    let output = layer.forward(&device).unwrap();
    assert_eq!(output.residency(), Residency::Accelerator);
    assert_eq!(output.layout(), host.layout());
    assert_eq!(to_host(&accel, &output).host_bytes(), host.host_bytes());

    let stats = layer.transfer_stats();
    assert_eq!((stats.to_host, stats.to_accelerator), (1, 1));
}

#[test]
fn test_host_input_accelerator_output() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Accelerator, 1024);
    let host = activations(&[1, 4, 8, 8], 3);

    let output = layer.forward(&host).unwrap();
    assert_eq!(output.residency(), Residency::Accelerator);
    assert_eq!(to_host(&accel, &output).host_bytes(), host.host_bytes());
    assert_eq!(layer.transfer_stats().to_host, 0);
    assert_eq!(layer.transfer_stats().to_accelerator, 1);
}

#[test]
fn test_forward_into_reuses_device_output() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Accelerator, 1024);
    let first = activations(&[1, 4, 8, 8], 4);
    let second = activations(&[1, 4, 8, 8], 5);

    let mut output = layer.forward(&first).unwrap();
    assert_eq!(accel.live_allocations(), 1);

    layer.forward_into(&second, &mut output).unwrap();
    assert_eq!(accel.live_allocations(), 1);
    assert_eq!(to_host(&accel, &output).host_bytes(), second.host_bytes());
}

#[test]
fn test_forward_allocates_per_call() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Accelerator, 1024);
    let input = activations(&[1, 4, 8, 8], 6);

    let a = layer.forward(&input).unwrap();
    let b = layer.forward(&input).unwrap();
    assert_eq!(accel.live_allocations(), 2);

    drop((a, b));
    assert_eq!(accel.live_allocations(), 0);
}

#[test]
fn test_failed_copy_aborts_call() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Host, 1024);
    let device = to_device(&accel, &activations(&[1, 4, 8, 8], 6));

    accel.fail_copies(true);
    let err = layer.forward(&device).unwrap_err();
    assert!(matches!(err, Error::DeviceTransfer { .. }));
    assert!(layer.compressed_sizes().is_empty());
    assert_eq!(layer.state(), Stage::Idle);

    accel.fail_copies(false);
    layer.forward(&device).unwrap();
    assert_eq!(layer.compressed_sizes().len(), 1);
}

#[test]
fn test_device_input_larger_than_staging() {
    let accel = SimulatedAccelerator::new();
    let mut layer = layer_on(&accel, Residency::Host, 512);
    let device = to_device(&accel, &activations(&[1, 4, 8, 8], 7));

    let err = layer.forward(&device).unwrap_err();
    assert!(matches!(
        err,
        Error::BufferOverflow {
            required: 1024,
            capacity: 512
        }
    ));
    assert_eq!(layer.transfer_stats().total_transfers(), 0);
}
