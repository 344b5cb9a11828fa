//! Encode and decode stages.
//!
//! Each stage pairs a codec with the scratch buffer it writes into. Forward
//! passes run the codec; backward passes are recorded on a [`Tape`] as
//! [`StraightThrough`] nodes, so the gradient w.r.t. a stage's input is the
//! gradient w.r.t. its output regardless of what the codec did.

use std::fmt;

use tessera_core::{Error, HostTensor, Result, TensorDecoder, TensorEncoder, TensorLayout};
use tracing::trace;

use crate::autograd::{NodeId, StraightThrough, Tape};
use crate::scratch::ScratchBuffer;

/// Location of an encoded payload inside the encode buffer.
///
/// Only valid until the next encode on the same stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedPayload {
    pub offset: usize,
    pub len: usize,
}

/// Encoder plus its output buffer.
pub struct EncodeStage {
    encoder: Box<dyn TensorEncoder>,
    buffer: ScratchBuffer,
}

impl EncodeStage {
    pub fn new(encoder: Box<dyn TensorEncoder>, capacity: usize) -> Self {
        EncodeStage {
            encoder,
            buffer: ScratchBuffer::new(capacity),
        }
    }

    pub fn encoder(&self) -> &dyn TensorEncoder {
        self.encoder.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Encode `input` into the stage buffer.
    pub fn encode(&mut self, input: HostTensor<'_>) -> Result<CompressedPayload> {
        let written = self.encoder.encode(input, self.buffer.as_mut_slice())?;
        self.buffer.ensure_fits(written)?;
        trace!(
            codec = self.encoder.name(),
            input_bytes = input.data.len(),
            payload_bytes = written,
            "encoded"
        );
        Ok(CompressedPayload {
            offset: 0,
            len: written,
        })
    }

    /// Bytes of `payload`.
    pub fn payload(&self, payload: CompressedPayload) -> Result<&[u8]> {
        self.buffer.range(payload.offset, payload.len)
    }

    /// Record the backward rule for an encode of `input`.
    pub fn record_backward(tape: &mut Tape, input: NodeId, layout: &TensorLayout) -> NodeId {
        tape.record(layout.clone(), Box::new(StraightThrough::new("encode", input)))
    }
}

impl fmt::Debug for EncodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeStage")
            .field("encoder", &self.encoder.name())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Decoder plus its output buffer.
///
/// The buffer doubles as host staging for accelerator inputs: a staged input
/// is dead once encode has returned, before decode writes anything.
pub struct DecodeStage {
    decoder: Box<dyn TensorDecoder>,
    buffer: ScratchBuffer,
}

impl DecodeStage {
    pub fn new(decoder: Box<dyn TensorDecoder>, capacity: usize) -> Self {
        DecodeStage {
            decoder,
            buffer: ScratchBuffer::new(capacity),
        }
    }

    pub fn decoder(&self) -> &dyn TensorDecoder {
        self.decoder.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// The buffer, for staging inputs before encode.
    pub fn staging(&mut self) -> &mut ScratchBuffer {
        &mut self.buffer
    }

    /// Decode `payload` into the stage buffer and return the reconstructed
    /// bytes. The decoder must produce exactly `layout.byte_len()` bytes.
    pub fn decode(&mut self, payload: &[u8], layout: &TensorLayout) -> Result<&[u8]> {
        let written = self
            .decoder
            .decode(payload, layout, self.buffer.as_mut_slice())?;
        self.buffer.ensure_fits(written)?;
        if written != layout.byte_len() {
            return Err(Error::shape_mismatch(layout.byte_len(), written));
        }
        trace!(
            codec = self.decoder.name(),
            payload_bytes = payload.len(),
            output_bytes = written,
            "decoded"
        );
        self.buffer.prefix(written)
    }

    /// Record the backward rule for a decode whose payload came from `input`.
    pub fn record_backward(tape: &mut Tape, input: NodeId, layout: &TensorLayout) -> NodeId {
        tape.record(layout.clone(), Box::new(StraightThrough::new("decode", input)))
    }
}

impl fmt::Debug for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeStage")
            .field("decoder", &self.decoder.name())
            .field("capacity", &self.capacity())
            .finish()
    }
}
