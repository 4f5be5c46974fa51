//! Programmable input/output gain ranges
//!
//! The numeric codes double as the bit patterns for the ADC
//! mux/control register (GS0/GS1 select the span, UNIBIP
//! selects unipolar operation), so `mux_bits` can be OR'ed
//! into the register verbatim.

use std::fmt;

use crate::errors::DaqError;

pub const BP_10_00V : u16 = 0x00 << 8;  // +/- 10V
pub const BP_5_00V  : u16 = 0x01 << 8;  // +/-  5V
pub const BP_2_50V  : u16 = 0x02 << 8;  // +/-  2.5V
pub const BP_1_25V  : u16 = 0x03 << 8;  // +/-  1.25V
pub const UP_10_00V : u16 = 0x08 << 8;  // 0 - 10V
pub const UP_5_00V  : u16 = 0x09 << 8;  // 0 - 5V
pub const UP_2_50V  : u16 = 0x0a << 8;  // 0 - 2.5V
pub const UP_1_25V  : u16 = 0x0b << 8;  // 0 - 1.25V

/// The eight programmable input voltage spans
#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Gain {
  Bip10V,
  Bip5V,
  Bip2Pt5V,
  Bip1Pt25V,
  Uni10V,
  Uni5V,
  Uni2Pt5V,
  Uni1Pt25V,
}

impl Gain {

  /// Validate a raw range code. Everything that is not one of
  /// the eight published codes is a BadGain.
  pub fn from_code(code : u16) -> Result<Gain, DaqError> {
    match code {
      BP_10_00V => Ok(Gain::Bip10V),
      BP_5_00V  => Ok(Gain::Bip5V),
      BP_2_50V  => Ok(Gain::Bip2Pt5V),
      BP_1_25V  => Ok(Gain::Bip1Pt25V),
      UP_10_00V => Ok(Gain::Uni10V),
      UP_5_00V  => Ok(Gain::Uni5V),
      UP_2_50V  => Ok(Gain::Uni2Pt5V),
      UP_1_25V  => Ok(Gain::Uni1Pt25V),
      _         => Err(DaqError::BadGain),
    }
  }

  /// Bit pattern for the ADC mux/control register
  pub fn mux_bits(&self) -> u16 {
    match self {
      Gain::Bip10V    => BP_10_00V,
      Gain::Bip5V     => BP_5_00V,
      Gain::Bip2Pt5V  => BP_2_50V,
      Gain::Bip1Pt25V => BP_1_25V,
      Gain::Uni10V    => UP_10_00V,
      Gain::Uni5V     => UP_5_00V,
      Gain::Uni2Pt5V  => UP_2_50V,
      Gain::Uni1Pt25V => UP_1_25V,
    }
  }

  /// Row in the calibration coefficient tables
  pub fn table_index(&self) -> usize {
    match self {
      Gain::Bip10V    => 0,
      Gain::Bip5V     => 1,
      Gain::Bip2Pt5V  => 2,
      Gain::Bip1Pt25V => 3,
      Gain::Uni10V    => 4,
      Gain::Uni5V     => 5,
      Gain::Uni2Pt5V  => 6,
      Gain::Uni1Pt25V => 7,
    }
  }

  /// Full scale span in volts, for display purposes
  pub fn span_volts(&self) -> f32 {
    match self {
      Gain::Bip10V    => 20.0,
      Gain::Bip5V     => 10.0,
      Gain::Bip2Pt5V  => 5.0,
      Gain::Bip1Pt25V => 2.5,
      Gain::Uni10V    => 10.0,
      Gain::Uni5V     => 5.0,
      Gain::Uni2Pt5V  => 2.5,
      Gain::Uni1Pt25V => 1.25,
    }
  }
}

impl fmt::Display for Gain {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let label = match self {
      Gain::Bip10V    => "+/-10V",
      Gain::Bip5V     => "+/-5V",
      Gain::Bip2Pt5V  => "+/-2.5V",
      Gain::Bip1Pt25V => "+/-1.25V",
      Gain::Uni10V    => "0-10V",
      Gain::Uni5V     => "0-5V",
      Gain::Uni2Pt5V  => "0-2.5V",
      Gain::Uni1Pt25V => "0-1.25V",
    };
    write!(f, "<Gain: {}>", label)
  }
}

/// Output ranges of the two DAC channels
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DacGain {
  Bip5V,
  Bip10V,
  Uni5V,
  Uni10V,
}

impl DacGain {

  pub fn from_code(code : u16) -> Result<DacGain, DaqError> {
    match code {
      0 => Ok(DacGain::Bip5V),
      1 => Ok(DacGain::Bip10V),
      2 => Ok(DacGain::Uni5V),
      3 => Ok(DacGain::Uni10V),
      _ => Err(DaqError::BadGain),
    }
  }

  pub fn code(&self) -> u16 {
    match self {
      DacGain::Bip5V  => 0,
      DacGain::Bip10V => 1,
      DacGain::Uni5V  => 2,
      DacGain::Uni10V => 3,
    }
  }

  /// Range select bits for the DAC control register. DAC0
  /// uses bits 8/9, DAC1 bits 10/11.
  pub fn control_bits(&self, channel : usize) -> u16 {
    let code = match self {
      DacGain::Bip5V  => 0u16,
      DacGain::Bip10V => 1,
      DacGain::Uni5V  => 2,
      DacGain::Uni10V => 3,
    };
    if channel == 0 {
      code << 8
    } else {
      code << 10
    }
  }
}
