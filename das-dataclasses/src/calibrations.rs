//! Per-channel calibration correction
//!
//! Every board persists a factory programmed coefficient block
//! (NVRAM on the PCI boards, calibration memory on the
//! Bluetooth variants) holding one linear correction pair
//! (slope, offset) per gain range and channel, separately for
//! differential and single ended wiring. The block is read
//! once at attach time; the resulting table is immutable and
//! shared read-only by all scan operations.
//!
//! Block layout (little endian f32 pairs, slope first):
//!
//! * 0x000  differential table, NGAINS x 8 channels
//! * 0x200  single ended table,  NGAINS x 16 channels
//! * 0x600  total block size

use std::fmt;

use crate::constants::{AD_CHANNELS,
                       AD_CHANNELS_DIFF,
                       NGAINS,
                       Wiring};
use crate::errors::DaqError;
use crate::gains::Gain;
use crate::serialization::parse_f32;

/// Byte offset of the differential coefficient table
pub const DIFF_COEFF_OFFSET : usize = 0x000;
/// Byte offset of the single ended coefficient table
pub const SE_COEFF_OFFSET   : usize = 0x200;
/// Size of the complete coefficient block in bytes
pub const COEFF_BLOCK_SIZE  : usize = 0x600;

#[derive(Debug, Copy, Clone)]
pub struct CalibrationTable {
  pub slopes_diff  : [[f32; AD_CHANNELS_DIFF]; NGAINS],
  pub offsets_diff : [[f32; AD_CHANNELS_DIFF]; NGAINS],
  pub slopes_se    : [[f32; AD_CHANNELS]; NGAINS],
  pub offsets_se   : [[f32; AD_CHANNELS]; NGAINS],
}

impl CalibrationTable {

  /// An identity table (slope 1, offset 0), used before
  /// coefficients are loaded and by boards without NVRAM.
  pub fn new() -> CalibrationTable {
    CalibrationTable {
      slopes_diff  : [[1.0; AD_CHANNELS_DIFF]; NGAINS],
      offsets_diff : [[0.0; AD_CHANNELS_DIFF]; NGAINS],
      slopes_se    : [[1.0; AD_CHANNELS]; NGAINS],
      offsets_se   : [[0.0; AD_CHANNELS]; NGAINS],
    }
  }

  /// Parse the persisted coefficient block.
  ///
  /// Fails with CalibrationFormat if the block is absent or
  /// shorter than the fixed layout requires.
  pub fn from_coefficient_block(block : &[u8]) -> Result<CalibrationTable, DaqError> {
    if block.len() < COEFF_BLOCK_SIZE {
      error!("Coefficient block has {} bytes, expected at least {}!", block.len(), COEFF_BLOCK_SIZE);
      return Err(DaqError::CalibrationFormat);
    }
    let mut table = CalibrationTable::new();
    let mut pos   = DIFF_COEFF_OFFSET;
    for range in 0..NGAINS {
      for ch in 0..AD_CHANNELS_DIFF {
        table.slopes_diff [range][ch] = parse_f32(block, &mut pos);
        table.offsets_diff[range][ch] = parse_f32(block, &mut pos);
      }
    }
    pos = SE_COEFF_OFFSET;
    for range in 0..NGAINS {
      for ch in 0..AD_CHANNELS {
        table.slopes_se [range][ch] = parse_f32(block, &mut pos);
        table.offsets_se[range][ch] = parse_f32(block, &mut pos);
      }
    }
    debug!("Loaded calibration coefficients for {} ranges", NGAINS);
    Ok(table)
  }

  /// Apply the linear correction to a raw sample.
  ///
  /// The result is rounded but deliberately NOT clamped to the
  /// 16 bit input domain - callers have to treat it as an
  /// engineering-unit intermediate, not a requantized sample.
  pub fn correct(&self,
                 raw     : u16,
                 range   : Gain,
                 channel : usize,
                 wiring  : Wiring) -> f64 {
    let idx = range.table_index();
    let (slope, offset) = match wiring {
      Wiring::Differential => {
        (self.slopes_diff [idx][channel % AD_CHANNELS_DIFF],
         self.offsets_diff[idx][channel % AD_CHANNELS_DIFF])
      }
      Wiring::SingleEnded => {
        (self.slopes_se [idx][channel % AD_CHANNELS],
         self.offsets_se[idx][channel % AD_CHANNELS])
      }
    };
    (raw as f64 * slope as f64 + offset as f64).round()
  }

  /// Serialize back into the persisted block layout
  pub fn to_coefficient_block(&self) -> Vec<u8> {
    let mut block = vec![0u8; COEFF_BLOCK_SIZE];
    let mut pos   = DIFF_COEFF_OFFSET;
    for range in 0..NGAINS {
      for ch in 0..AD_CHANNELS_DIFF {
        block[pos..pos+4].copy_from_slice(&self.slopes_diff[range][ch].to_le_bytes());
        block[pos+4..pos+8].copy_from_slice(&self.offsets_diff[range][ch].to_le_bytes());
        pos += 8;
      }
    }
    pos = SE_COEFF_OFFSET;
    for range in 0..NGAINS {
      for ch in 0..AD_CHANNELS {
        block[pos..pos+4].copy_from_slice(&self.slopes_se[range][ch].to_le_bytes());
        block[pos+4..pos+8].copy_from_slice(&self.offsets_se[range][ch].to_le_bytes());
        pos += 8;
      }
    }
    block
  }
}

impl Default for CalibrationTable {
  fn default() -> CalibrationTable {
    CalibrationTable::new()
  }
}

impl fmt::Display for CalibrationTable {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<CalibrationTable: {} ranges, {} DE + {} SE channels>",
           NGAINS, AD_CHANNELS_DIFF, AD_CHANNELS)
  }
}

#[cfg(test)]
mod test_calibrations {
  use super::*;

  fn example_table() -> CalibrationTable {
    let mut table = CalibrationTable::new();
    table.slopes_se [0][0] = 1.25;
    table.offsets_se[0][0] = -12.0;
    table.slopes_diff [3][5] = 0.75;
    table.offsets_diff[3][5] = 40.0;
    table
  }

  #[test]
  fn test_block_roundtrip() {
    let table = example_table();
    let block = table.to_coefficient_block();
    assert_eq!(block.len(), COEFF_BLOCK_SIZE);
    let restored = CalibrationTable::from_coefficient_block(&block).unwrap();
    assert_eq!(restored.slopes_se[0][0],  1.25);
    assert_eq!(restored.offsets_se[0][0], -12.0);
    assert_eq!(restored.slopes_diff[3][5], 0.75);
  }

  #[test]
  fn test_short_block_rejected() {
    let block = vec![0u8; COEFF_BLOCK_SIZE - 1];
    assert_eq!(CalibrationTable::from_coefficient_block(&block).unwrap_err(),
               DaqError::CalibrationFormat);
  }

  #[test]
  fn test_correct_is_pure() {
    let table = example_table();
    let a = table.correct(1000, Gain::Bip10V, 0, Wiring::SingleEnded);
    let b = table.correct(1000, Gain::Bip10V, 0, Wiring::SingleEnded);
    assert_eq!(a, b);
    assert_eq!(a, (1000.0f64*1.25 - 12.0).round());
  }

  #[test]
  fn test_correct_monotonic_for_positive_slope() {
    let table = example_table();
    let mut last = f64::MIN;
    for raw in (0..u16::MAX).step_by(123) {
      let value = table.correct(raw, Gain::Bip10V, 0, Wiring::SingleEnded);
      assert!(value >= last);
      last = value;
    }
  }

  #[test]
  fn test_correct_not_clamped() {
    let mut table = CalibrationTable::new();
    table.slopes_se[0][2]  = 1.5;
    table.offsets_se[0][2] = 100.0;
    let value = table.correct(u16::MAX, Gain::Bip10V, 2, Wiring::SingleEnded);
    assert!(value > u16::MAX as f64);
  }
}
