//! Codec lookup by name.
//!
//! The registry maps codec names to factories plus the parameters each codec
//! accepts. Configuration is validated here, once, when a layer is built.
//! The process-wide registry returned by [`CodecRegistry::global`] holds the
//! built-in codecs and is never mutated after it is first touched; codecs
//! implemented elsewhere (JPEG, H.264, ...) go into a registry built with
//! [`CodecRegistry::with_builtin`] and [`register_encoder`](CodecRegistry::register_encoder).

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tessera_codecs::{
    Lz4Decoder, Lz4Encoder, NoopDecoder, NoopEncoder, QuantizeDecoder, QuantizeEncoder,
    SwizzleDecoder, SwizzleEncoder, LZ4_DECODER, LZ4_ENCODER, NOOP_DECODER, NOOP_ENCODER,
    QUANTIZE_DECODER, QUANTIZE_ENCODER, SWIZZLE_DECODER, SWIZZLE_ENCODER,
};
use tessera_core::{
    validate, CodecConfig, Error, ParamSpec, Result, TensorDecoder, TensorEncoder,
};
use tracing::debug;

/// Builds an encoder from an already validated config.
pub type EncoderFactory = fn(&CodecConfig) -> Result<Box<dyn TensorEncoder>>;

/// Builds a decoder from an already validated config.
pub type DecoderFactory = fn(&CodecConfig) -> Result<Box<dyn TensorDecoder>>;

#[derive(Clone, Copy)]
struct Entry<F> {
    params: &'static [ParamSpec],
    build: F,
}

/// A constructed encoder/decoder pair.
pub struct CodecPair {
    pub encoder: Box<dyn TensorEncoder>,
    pub decoder: Box<dyn TensorDecoder>,
}

impl fmt::Debug for CodecPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecPair")
            .field("encoder", &self.encoder.name())
            .field("decoder", &self.decoder.name())
            .finish()
    }
}

/// Name → codec factory table.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    encoders: HashMap<String, Entry<EncoderFactory>>,
    decoders: HashMap<String, Entry<DecoderFactory>>,
}

impl CodecRegistry {
    /// Create a registry with no codecs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in codecs.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register_encoder(NOOP_ENCODER, NoopEncoder::PARAMS, |_| {
                Ok(Box::new(NoopEncoder))
            })
            .register_decoder(NOOP_DECODER, NoopDecoder::PARAMS, |_| {
                Ok(Box::new(NoopDecoder))
            })
            .register_encoder(SWIZZLE_ENCODER, SwizzleEncoder::PARAMS, |_| {
                Ok(Box::new(SwizzleEncoder))
            })
            .register_decoder(SWIZZLE_DECODER, SwizzleDecoder::PARAMS, |_| {
                Ok(Box::new(SwizzleDecoder))
            })
            .register_encoder(QUANTIZE_ENCODER, QuantizeEncoder::PARAMS, |config| {
                let bits = config.int_or("bits", 0);
                let bits = u8::try_from(bits).map_err(|_| {
                    Error::invalid_config(QUANTIZE_ENCODER, format!("bits {} out of range", bits))
                })?;
                Ok(Box::new(QuantizeEncoder::new(bits)?))
            })
            .register_decoder(QUANTIZE_DECODER, QuantizeDecoder::PARAMS, |_| {
                Ok(Box::new(QuantizeDecoder))
            })
            .register_encoder(LZ4_ENCODER, Lz4Encoder::PARAMS, |_| Ok(Box::new(Lz4Encoder)))
            .register_decoder(LZ4_DECODER, Lz4Decoder::PARAMS, |_| Ok(Box::new(Lz4Decoder)));
        registry
    }

    /// The process-wide registry of built-in codecs.
    pub fn global() -> &'static CodecRegistry {
        static GLOBAL: OnceLock<CodecRegistry> = OnceLock::new();
        GLOBAL.get_or_init(CodecRegistry::with_builtin)
    }

    /// Register (or replace) an encoder.
    pub fn register_encoder(
        &mut self,
        name: impl Into<String>,
        params: &'static [ParamSpec],
        build: EncoderFactory,
    ) -> &mut Self {
        self.encoders.insert(name.into(), Entry { params, build });
        self
    }

    /// Register (or replace) a decoder.
    pub fn register_decoder(
        &mut self,
        name: impl Into<String>,
        params: &'static [ParamSpec],
        build: DecoderFactory,
    ) -> &mut Self {
        self.decoders.insert(name.into(), Entry { params, build });
        self
    }

    /// Validate `config` and construct the named encoder.
    pub fn build_encoder(&self, name: &str, config: &CodecConfig) -> Result<Box<dyn TensorEncoder>> {
        let entry = self
            .encoders
            .get(name)
            .ok_or_else(|| Error::unknown_codec(name))?;
        validate(name, entry.params, config)?;
        debug!(codec = name, params = config.len(), "constructing encoder");
        (entry.build)(config)
    }

    /// Validate `config` and construct the named decoder.
    pub fn build_decoder(&self, name: &str, config: &CodecConfig) -> Result<Box<dyn TensorDecoder>> {
        let entry = self
            .decoders
            .get(name)
            .ok_or_else(|| Error::unknown_codec(name))?;
        validate(name, entry.params, config)?;
        debug!(codec = name, params = config.len(), "constructing decoder");
        (entry.build)(config)
    }

    /// Construct an encoder/decoder pair.
    pub fn resolve(
        &self,
        encoder_name: &str,
        encoder_config: &CodecConfig,
        decoder_name: &str,
        decoder_config: &CodecConfig,
    ) -> Result<CodecPair> {
        Ok(CodecPair {
            encoder: self.build_encoder(encoder_name, encoder_config)?,
            decoder: self.build_decoder(decoder_name, decoder_config)?,
        })
    }

    /// Parameters accepted by an encoder.
    pub fn encoder_params(&self, name: &str) -> Option<&'static [ParamSpec]> {
        self.encoders.get(name).map(|e| e.params)
    }

    /// Parameters accepted by a decoder.
    pub fn decoder_params(&self, name: &str) -> Option<&'static [ParamSpec]> {
        self.decoders.get(name).map(|e| e.params)
    }

    /// Registered encoder names, sorted.
    pub fn encoder_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.encoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered decoder names, sorted.
    pub fn decoder_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("encoders", &self.encoder_names())
            .field("decoders", &self.decoder_names())
            .finish()
    }
}
