//! Layer configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tessera_core::{CodecConfig, Error, Residency, Result, TensorLayout};

use crate::registry::CodecRegistry;
use crate::telemetry::TelemetryConfig;

/// Everything needed to build a [`CompressionLayer`](crate::CompressionLayer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Registered encoder name
    pub encoder_name: String,

    /// Encoder parameters
    #[serde(default)]
    pub encoder_params: CodecConfig,

    /// Registered decoder name
    pub decoder_name: String,

    /// Decoder parameters
    #[serde(default)]
    pub decoder_params: CodecConfig,

    /// Capacity of the payload buffer (bytes)
    #[serde(default = "default_buffer_capacity")]
    pub encode_buffer_capacity: usize,

    /// Capacity of the reconstruction buffer (bytes). Also bounds the input
    /// size, since device inputs are staged here.
    #[serde(default = "default_buffer_capacity")]
    pub decode_buffer_capacity: usize,

    /// Where outputs are placed
    #[serde(default)]
    pub output_residency: Residency,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl LayerConfig {
    /// Config for an encoder/decoder pair with no parameters and default
    /// capacities.
    pub fn new(encoder_name: impl Into<String>, decoder_name: impl Into<String>) -> Self {
        LayerConfig {
            encoder_name: encoder_name.into(),
            encoder_params: CodecConfig::new(),
            decoder_name: decoder_name.into(),
            decoder_params: CodecConfig::new(),
            encode_buffer_capacity: default_buffer_capacity(),
            decode_buffer_capacity: default_buffer_capacity(),
            output_residency: Residency::Host,
            telemetry: TelemetryConfig::default(),
        }
    }

    pub fn with_encoder_params(mut self, params: CodecConfig) -> Self {
        self.encoder_params = params;
        self
    }

    pub fn with_decoder_params(mut self, params: CodecConfig) -> Self {
        self.decoder_params = params;
        self
    }

    pub fn with_capacities(mut self, encode: usize, decode: usize) -> Self {
        self.encode_buffer_capacity = encode;
        self.decode_buffer_capacity = decode;
        self
    }

    pub fn with_output_residency(mut self, residency: Residency) -> Self {
        self.output_residency = residency;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Size both buffers for tensors of `layout`, using the encoder's worst
    /// case from the global registry.
    pub fn sized_for(self, layout: &TensorLayout) -> Result<Self> {
        self.sized_for_in(CodecRegistry::global(), layout)
    }

    /// Like [`sized_for`](Self::sized_for) with an explicit registry.
    pub fn sized_for_in(mut self, registry: &CodecRegistry, layout: &TensorLayout) -> Result<Self> {
        let byte_len = layout.checked_byte_len()?;
        let encoder = registry.build_encoder(&self.encoder_name, &self.encoder_params)?;
        self.encode_buffer_capacity = encoder.max_encoded_size(layout);
        self.decode_buffer_capacity = byte_len;
        Ok(self)
    }

    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LayerConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject configs that could never run.
    pub fn check(&self) -> Result<()> {
        if self.encode_buffer_capacity == 0 {
            return Err(Error::invalid_config(
                &self.encoder_name,
                "encode_buffer_capacity must be positive",
            ));
        }
        if self.decode_buffer_capacity == 0 {
            return Err(Error::invalid_config(
                &self.decoder_name,
                "decode_buffer_capacity must be positive",
            ));
        }
        Ok(())
    }
}

fn default_buffer_capacity() -> usize {
    4 * 1024 * 1024 // 4MB
}
