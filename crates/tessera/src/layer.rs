//! The compression layer.
//!
//! [`CompressionLayer`] runs one tensor through transfer-in, encode, decode
//! and transfer-out, records the payload size, and hands back a tensor with
//! the input's shape and dtype. For gradient purposes the whole layer is the
//! identity.
//!
//! # Example
//!
//! ```ignore
//! use tessera::{CompressionLayer, LayerConfig};
//! use tessera_core::{CodecConfig, Tensor};
//!
//! let config = LayerConfig::new("quantize_encoder", "quantize_decoder")
//!     .with_encoder_params(CodecConfig::new().with("bits", 4))
//!     .sized_for(activations.layout())?;
//! let mut layer = CompressionLayer::new(config)?;
//!
//! let reconstructed = layer.forward(&activations)?;
//! println!("payload: {:?}", layer.compressed_sizes());
//! ```

use std::fmt;

use tessera_core::{
    Error, HostTensor, Residency, Result, SizeLog, Tensor, TensorLayout, TransferStats,
};
use tracing::{debug, info, warn};

use crate::autograd::{NodeId, Tape};
use crate::config::LayerConfig;
use crate::registry::CodecRegistry;
use crate::stage::{DecodeStage, EncodeStage};
use crate::telemetry::{CallTimings, Stage, Telemetry, TelemetrySink};
use crate::transfer::TransferManager;

/// Compress-then-decompress layer with preallocated buffers.
///
/// Not reentrant: `forward` takes `&mut self`. Use one layer per worker.
pub struct CompressionLayer {
    config: LayerConfig,
    encode: EncodeStage,
    decode: DecodeStage,
    transfer: TransferManager,
    sizes: SizeLog,
    telemetry: Telemetry,
}

impl CompressionLayer {
    /// Build a host-only layer from the global codec registry.
    pub fn new(config: LayerConfig) -> Result<Self> {
        Self::with_parts(config, CodecRegistry::global(), TransferManager::host_only())
    }

    /// Build a layer with an explicit registry and transfer manager.
    pub fn with_parts(
        config: LayerConfig,
        registry: &CodecRegistry,
        transfer: TransferManager,
    ) -> Result<Self> {
        config.check()?;
        let pair = registry.resolve(
            &config.encoder_name,
            &config.encoder_params,
            &config.decoder_name,
            &config.decoder_params,
        )?;

        if config.output_residency == Residency::Accelerator && !transfer.has_accelerator() {
            warn!(
                "output residency is accelerator but no accelerator is attached; \
                 every forward call will fail"
            );
        }

        info!(
            encoder = %config.encoder_name,
            decoder = %config.decoder_name,
            encode_capacity = config.encode_buffer_capacity,
            decode_capacity = config.decode_buffer_capacity,
            output = %config.output_residency,
            "compression layer ready"
        );

        Ok(CompressionLayer {
            encode: EncodeStage::new(pair.encoder, config.encode_buffer_capacity),
            decode: DecodeStage::new(pair.decoder, config.decode_buffer_capacity),
            telemetry: Telemetry::new(config.telemetry),
            transfer,
            sizes: SizeLog::new(),
            config,
        })
    }

    /// Attach a telemetry observer. Attached sinks are notified even when
    /// built-in telemetry is disabled.
    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry.add_sink(sink);
        self
    }

    /// Compress and decompress `input`, returning a new tensor at the
    /// configured output residency.
    ///
    /// Every call allocates the output; with an accelerator target that is a
    /// fresh device allocation per call. Hot loops should hold an output
    /// tensor and call [`forward_into`](Self::forward_into) instead.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.run(input, |transfer, bytes, layout, target| {
            transfer.materialize(bytes, layout, target)
        })
    }

    /// Like [`forward`](Self::forward), writing into `output`. The output's
    /// allocation is reused when its layout and residency already match.
    pub fn forward_into(&mut self, input: &Tensor, output: &mut Tensor) -> Result<()> {
        self.run(input, |transfer, bytes, layout, target| {
            transfer.move_out(bytes, layout, target, output)
        })
    }

    /// Like [`forward`](Self::forward), also recording the straight-through
    /// backward rule on `tape`. `input_node` is `input`'s node on the tape.
    pub fn forward_traced(
        &mut self,
        tape: &mut Tape,
        input: &Tensor,
        input_node: NodeId,
    ) -> Result<(Tensor, NodeId)> {
        let node_layout = tape
            .layout(input_node)
            .ok_or_else(|| Error::codec("tape", format!("unknown node {}", input_node.index())))?;
        if node_layout.numel() != input.numel() {
            return Err(Error::shape_mismatch(node_layout.numel(), input.numel()));
        }

        let output = self.forward(input)?;
        let payload = EncodeStage::record_backward(tape, input_node, input.layout());
        let node = DecodeStage::record_backward(tape, payload, output.layout());
        Ok((output, node))
    }

    fn run<R>(
        &mut self,
        input: &Tensor,
        finish: impl FnOnce(&mut TransferManager, &[u8], &TensorLayout, Residency) -> Result<R>,
    ) -> Result<R> {
        if input.byte_len() > self.decode.capacity() {
            return Err(Error::buffer_overflow(
                input.byte_len(),
                self.decode.capacity(),
            ));
        }

        match self.run_stages(input, finish) {
            Ok((output, payload_len)) => {
                self.telemetry.finish();
                self.sizes.record(payload_len);
                Ok(output)
            }
            Err(e) => {
                debug!(
                    stage = %self.telemetry.state(),
                    category = e.category(),
                    error = %e,
                    "forward failed"
                );
                self.telemetry.abort();
                Err(e)
            }
        }
    }

    fn run_stages<R>(
        &mut self,
        input: &Tensor,
        finish: impl FnOnce(&mut TransferManager, &[u8], &TensorLayout, Residency) -> Result<R>,
    ) -> Result<(R, usize)> {
        let layout = input.layout();
        let target = self.config.output_residency;

        if input.residency() != Residency::Host {
            self.telemetry.transition(Stage::TransferIn);
        }
        let host = self.transfer.move_in(input, self.decode.staging())?;

        self.telemetry.transition(Stage::Encode);
        let payload = self.encode.encode(HostTensor::new(layout, host)?)?;

        self.telemetry.transition(Stage::Decode);
        let decoded = self.decode.decode(self.encode.payload(payload)?, layout)?;

        if target != Residency::Host {
            self.telemetry.transition(Stage::TransferOut);
        }
        let output = finish(&mut self.transfer, decoded, layout, target)?;
        Ok((output, payload.len))
    }

    /// Payload sizes of every successful call since construction or the last
    /// [`reset`](Self::reset), oldest first.
    pub fn compressed_sizes(&self) -> &[usize] {
        self.sizes.as_slice()
    }

    pub fn size_log(&self) -> &SizeLog {
        &self.sizes
    }

    /// Clear the size log and recorded timings. Buffers and codecs are kept.
    pub fn reset(&mut self) {
        self.sizes.clear();
        self.telemetry.clear();
    }

    pub fn transfer_stats(&self) -> TransferStats {
        self.transfer.stats()
    }

    /// Stage timings of successful calls; empty unless timing telemetry is
    /// enabled.
    pub fn call_timings(&self) -> &[CallTimings] {
        self.telemetry.call_timings()
    }

    /// Current stage. Always [`Stage::Idle`] between calls.
    pub fn state(&self) -> Stage {
        self.telemetry.state()
    }

    pub fn encode_capacity(&self) -> usize {
        self.encode.capacity()
    }

    pub fn decode_capacity(&self) -> usize {
        self.decode.capacity()
    }

    pub fn output_residency(&self) -> Residency {
        self.config.output_residency
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Whether the output is always bit-identical to the input: both halves
    /// are lossless and belong to the same codec (`foo_encoder` with
    /// `foo_decoder`).
    pub fn is_lossless(&self) -> bool {
        let encoder = self.encode.encoder();
        let decoder = self.decode.decoder();
        encoder.is_lossless()
            && decoder.is_lossless()
            && codec_stem(encoder.name(), "_encoder") == codec_stem(decoder.name(), "_decoder")
    }
}

fn codec_stem<'a>(name: &'a str, suffix: &str) -> &'a str {
    name.strip_suffix(suffix).unwrap_or(name)
}

impl fmt::Debug for CompressionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionLayer")
            .field("encode", &self.encode)
            .field("decode", &self.decode)
            .field("transfer", &self.transfer)
            .field("calls", &self.sizes.len())
            .field("telemetry", &self.telemetry)
            .finish()
    }
}
