//! Scan configuration
//!
//! A ScanConfig describes one paced acquisition: the channel
//! window, gain range, wiring, pacer rate and sample budget.
//! Configs are loaded from json on the client side and travel
//! to the board daemon in the compact bytestream form.

use std::fmt;
use std::fs::read_to_string;
use std::path::Path;

use crate::constants::{AD_CHANNELS,
                       DEFAULT_FREQ,
                       MAX_AD_FREQ,
                       MAX_COUNT,
                       Wiring};
use crate::errors::{DaqError,
                    SerializationError};
use crate::gains::Gain;
use crate::serialization::{Serialization,
                           parse_bool,
                           parse_u8,
                           parse_u16,
                           parse_u32};

/// Conversion pacing for a scan
#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PacerSource {
  /// one conversion per software trigger
  SoftConvert,
  /// external pacer, falling edge
  ExternalFalling,
  /// external pacer, rising edge
  ExternalRising,
  /// the onboard 8254 cascade
  Internal,
}

impl PacerSource {

  pub fn from_code(code : u8) -> Result<PacerSource, DaqError> {
    match code {
      0 => Ok(PacerSource::SoftConvert),
      1 => Ok(PacerSource::ExternalFalling),
      2 => Ok(PacerSource::ExternalRising),
      3 => Ok(PacerSource::Internal),
      _ => Err(DaqError::InvalidCommand),
    }
  }

  pub fn code(&self) -> u8 {
    match self {
      PacerSource::SoftConvert     => 0,
      PacerSource::ExternalFalling => 1,
      PacerSource::ExternalRising  => 2,
      PacerSource::Internal        => 3,
    }
  }
}

impl Default for PacerSource {
  fn default() -> PacerSource {
    PacerSource::Internal
  }
}

#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanConfig {
  /// first channel of the scan window
  pub chan_lo    : u8,
  /// last channel of the scan window (inclusive)
  pub chan_hi    : u8,
  pub gain       : Gain,
  pub wiring     : Wiring,
  /// what drives the conversions, older config files without
  /// the field keep the onboard pacer
  #[serde(default)]
  pub pacer_source : PacerSource,
  /// requested pacer rate [Hz], internal pacing only
  pub pacer_hz   : u32,
  /// total number of samples, 0 runs until stopped
  pub count      : u32,
  /// rearm the trigger after every conversion
  pub burst_mode : bool,
}

impl ScanConfig {

  pub fn new() -> ScanConfig {
    ScanConfig {
      chan_lo    : 0,
      chan_hi    : 0,
      gain       : Gain::Bip10V,
      wiring     : Wiring::SingleEnded,
      pacer_source : PacerSource::Internal,
      pacer_hz   : DEFAULT_FREQ,
      count      : 0,
      burst_mode : false,
    }
  }

  /// Number of channels in the scan window
  pub fn nchan(&self) -> u32 {
    (self.chan_hi as u32 + 1).saturating_sub(self.chan_lo as u32)
  }

  /// Reject configs the hardware cannot honor.
  ///
  /// count == 0 means continuous acquisition and is exempt
  /// from the sample budget.
  pub fn validate(&self) -> Result<(), DaqError> {
    let limit = self.wiring.nchannels() as u8;
    if self.chan_lo >= limit || self.chan_hi >= limit || self.chan_lo > self.chan_hi {
      error!("Invalid channel window {}..={} for {} channels!", self.chan_lo, self.chan_hi, limit);
      return Err(DaqError::BadChannel);
    }
    if self.count > MAX_COUNT {
      return Err(DaqError::BadCount);
    }
    // external and soft pacing run at whatever rate the
    // source delivers, only the 8254 has a speed contract
    if self.pacer_source == PacerSource::Internal
       && (self.pacer_hz == 0
           || self.pacer_hz as u64 * self.nchan() as u64 > MAX_AD_FREQ as u64) {
      error!("Aggregate rate {} Hz over {} channels exceeds {} Hz!",
             self.pacer_hz, self.nchan(), MAX_AD_FREQ);
      return Err(DaqError::BadSpeed);
    }
    Ok(())
  }

  pub fn from_file(path : &Path) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    let content = read_to_string(path)?;
    let cfg : ScanConfig = serde_json::from_str(&content)?;
    info!("Loaded scan config from {}", path.display());
    Ok(cfg)
  }
}

impl Serialization for ScanConfig {
  const HEAD : u16   = 0xAAAA;
  const TAIL : u16   = 0x5555;
  // HEAD + 2 chan + gain code + wiring + source + 2 u32 + bool + TAIL
  const SIZE : usize = 19;

  fn from_bytestream(stream : &[u8], pos : &mut usize)
    -> Result<ScanConfig, SerializationError> {
    if stream.len() < *pos + ScanConfig::SIZE {
      return Err(SerializationError::StreamTooShort);
    }
    if parse_u16(stream, pos) != ScanConfig::HEAD {
      return Err(SerializationError::HeadInvalid);
    }
    let mut cfg = ScanConfig::new();
    cfg.chan_lo = parse_u8(stream, pos);
    cfg.chan_hi = parse_u8(stream, pos);
    let gain_code = parse_u16(stream, pos);
    cfg.gain    = Gain::from_code(gain_code)
                  .map_err(|_| SerializationError::ValueNotFound)?;
    cfg.wiring  = match parse_u8(stream, pos) {
      0 => Wiring::Differential,
      1 => Wiring::SingleEnded,
      _ => return Err(SerializationError::ValueNotFound),
    };
    cfg.pacer_source = PacerSource::from_code(parse_u8(stream, pos))
                       .map_err(|_| SerializationError::ValueNotFound)?;
    cfg.pacer_hz   = parse_u32 (stream, pos);
    cfg.count      = parse_u32 (stream, pos);
    cfg.burst_mode = parse_bool(stream, pos);
    if parse_u16(stream, pos) != ScanConfig::TAIL {
      return Err(SerializationError::TailInvalid);
    }
    Ok(cfg)
  }

  fn to_bytestream(&self) -> Vec<u8> {
    let mut stream = Vec::<u8>::with_capacity(ScanConfig::SIZE);
    stream.extend_from_slice(&ScanConfig::HEAD.to_le_bytes());
    stream.push(self.chan_lo);
    stream.push(self.chan_hi);
    stream.extend_from_slice(&self.gain.mux_bits().to_le_bytes());
    stream.push(match self.wiring {
      Wiring::Differential => 0,
      Wiring::SingleEnded  => 1,
    });
    stream.push(self.pacer_source.code());
    stream.extend_from_slice(&self.pacer_hz.to_le_bytes());
    stream.extend_from_slice(&self.count.to_le_bytes());
    stream.push(u8::from(self.burst_mode));
    stream.extend_from_slice(&ScanConfig::TAIL.to_le_bytes());
    stream
  }
}

impl Default for ScanConfig {
  fn default() -> ScanConfig {
    ScanConfig::new()
  }
}

impl fmt::Display for ScanConfig {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<ScanConfig: ch {}..={} {} {:?} {} Hz count {}>",
           self.chan_lo, self.chan_hi, self.gain, self.wiring,
           self.pacer_hz, self.count)
  }
}

#[cfg(test)]
mod test_config {
  use super::*;

  #[test]
  fn test_bytestream_roundtrip() {
    let mut cfg = ScanConfig::new();
    cfg.chan_lo    = 2;
    cfg.chan_hi    = 5;
    cfg.gain       = Gain::Bip2Pt5V;
    cfg.pacer_source = PacerSource::ExternalRising;
    cfg.pacer_hz   = 20_000;
    cfg.count      = 4096;
    cfg.burst_mode = true;
    let bytes = cfg.to_bytestream();
    assert_eq!(bytes.len(), ScanConfig::SIZE);
    let mut pos = 0;
    let restored = ScanConfig::from_bytestream(&bytes, &mut pos).unwrap();
    assert_eq!(restored, cfg);
  }

  #[test]
  fn test_validate_channel_window() {
    let mut cfg = ScanConfig::new();
    cfg.chan_lo = 4;
    cfg.chan_hi = 2;
    assert_eq!(cfg.validate().unwrap_err(), DaqError::BadChannel);
    cfg.chan_lo = 0;
    cfg.chan_hi = AD_CHANNELS as u8;
    assert_eq!(cfg.validate().unwrap_err(), DaqError::BadChannel);
    // channel 8 exists single ended but not differential
    cfg.chan_hi = 8;
    cfg.wiring  = Wiring::Differential;
    assert_eq!(cfg.validate().unwrap_err(), DaqError::BadChannel);
  }

  #[test]
  fn test_validate_aggregate_rate() {
    let mut cfg = ScanConfig::new();
    cfg.chan_hi  = 1;
    cfg.pacer_hz = MAX_AD_FREQ;
    // 2 channels at the single channel maximum is too fast
    assert_eq!(cfg.validate().unwrap_err(), DaqError::BadSpeed);
    cfg.pacer_hz = MAX_AD_FREQ / 2;
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn test_validate_rate_internal_only() {
    // the speed contract binds the onboard pacer, an external
    // clock runs at whatever the source delivers
    let mut cfg = ScanConfig::new();
    cfg.chan_hi      = 1;
    cfg.pacer_hz     = MAX_AD_FREQ;
    cfg.pacer_source = PacerSource::ExternalFalling;
    assert!(cfg.validate().is_ok());
    cfg.pacer_source = PacerSource::Internal;
    assert_eq!(cfg.validate().unwrap_err(), DaqError::BadSpeed);
  }

  #[test]
  fn test_validate_count() {
    let mut cfg = ScanConfig::new();
    cfg.count = MAX_COUNT + 1;
    assert_eq!(cfg.validate().unwrap_err(), DaqError::BadCount);
    // continuous mode is exempt from the budget
    cfg.count = 0;
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn test_json_roundtrip() {
    let cfg  = ScanConfig::new();
    let text = serde_json::to_string(&cfg).unwrap();
    let back : ScanConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, cfg);
  }
}
