//! PCM16 helpers for relaying browser microphone audio to the live model.

use anyhow::Result;
use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Rate the browser captures microphone audio at.
pub const BROWSER_CAPTURE_SAMPLE_RATE: f64 = 24000.0;
/// Rate the live model expects for input audio. Its spoken output is 24 kHz
/// and is forwarded to the browser untouched.
pub const LIVE_INPUT_SAMPLE_RATE: f64 = 16000.0;

const CHUNK_SIZE: usize = 480;

/// Decodes little-endian PCM16 bytes into samples normalized to [-1.0, 1.0].
///
/// A trailing odd byte is ignored.
pub fn pcm16_le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect()
}

/// Encodes samples as base64 little-endian PCM16, clamping out-of-range values.
pub fn f32_to_pcm16_base64(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|&s| {
            let v = (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Converts browser-rate PCM16 into model-rate PCM16.
///
/// The resampler works on fixed-size chunks, so samples that do not fill a
/// chunk are held back until the next call. A frame that ends mid-sample
/// leaves its last byte to start the next frame.
pub struct InputResampler {
    resampler: FastFixedIn<f32>,
    pending: Vec<f32>,
    split_byte: Option<u8>,
}

impl InputResampler {
    pub fn new(from_rate: f64, to_rate: f64) -> Result<Self> {
        let resampler = FastFixedIn::<f32>::new(
            to_rate / from_rate,
            1.0,
            PolynomialDegree::Cubic,
            CHUNK_SIZE,
            1,
        )?;
        Ok(Self {
            resampler,
            pending: Vec::new(),
            split_byte: None,
        })
    }

    /// The browser-to-model resampler.
    pub fn for_live_input() -> Result<Self> {
        Self::new(BROWSER_CAPTURE_SAMPLE_RATE, LIVE_INPUT_SAMPLE_RATE)
    }

    /// Resamples a frame of PCM16 bytes. Returns `None` when not enough
    /// audio has been buffered to produce output yet.
    pub fn process(&mut self, pcm16: &[u8]) -> Result<Option<String>> {
        let mut bytes = pcm16;
        if let Some(low) = self.split_byte.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    self.pending.push(i16::from_le_bytes([low, high]) as f32 / 32768.0);
                    bytes = rest;
                }
                None => self.split_byte = Some(low),
            }
        }
        if bytes.len() % 2 == 1 {
            self.split_byte = bytes.last().copied();
            bytes = &bytes[..bytes.len() - 1];
        }
        self.pending.extend(pcm16_le_to_f32(bytes));

        let mut out = Vec::new();
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            let resampled = self.resampler.process(&[chunk], None)?;
            out.extend_from_slice(&resampled[0]);
        }

        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(f32_to_pcm16_base64(&out)))
        }
    }

    /// Samples waiting for a full chunk.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}
