//! Pacer clock programming
//!
//! Conversion pacing comes from a 10 MHz reference divided
//! down by two cascaded 16 bit counters of the 8254. The
//! requested rate rarely factors exactly, so the divisor is
//! split into the pair of counter values with the smallest
//! rate error and the actually achieved rate is reported back.

use das_dataclasses::constants::{MAX_AD_FREQ,
                                 MAX_DA_FREQ,
                                 REFERENCE_CLOCK_HZ};
use das_dataclasses::errors::DaqError;

use crate::board::BoardState;
use crate::memory::RegWindow;
use crate::registers::{C1,
                       C2,
                       COUNTERA_1_DATA,
                       COUNTERA_2_DATA,
                       COUNTERA_CTRL,
                       COUNTERB_1_DATA,
                       COUNTERB_2_DATA,
                       COUNTERB_CTRL,
                       LSBFIRST,
                       MODE2};

/// Smallest value an 8254 counter accepts in rate generator
/// mode (a divisor of 1 never produces output pulses)
pub const MIN_CTR : u32 = 2;
pub const MAX_CTR : u32 = 65535;

/// Outcome of programming a pacer cascade
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProgrammedRate {
  pub requested_hz : u32,
  /// rate the counter pair actually produces
  pub actual_hz    : u32,
  pub ctr1         : u16,
  pub ctr2         : u16,
}

/// Split a divisor into two counter values minimizing the
/// rate error. Both factors are bounded to 2..=65535.
pub fn factor_divisor(divisor : u32) -> (u16, u16) {
  let mut best      = (MIN_CTR, MIN_CTR);
  let mut best_err  = u64::MAX;
  let mut c1        = MIN_CTR;
  while c1 <= MAX_CTR && c1 * c1 <= divisor.max(MIN_CTR * MIN_CTR) {
    // round to the nearest second factor, then probe the
    // neighbors since rounding can overshoot
    let mid = ((divisor as u64 + (c1 as u64)/2) / c1 as u64)
      .min(MAX_CTR as u64) as u32;
    for c2 in [mid.saturating_sub(1), mid, mid + 1] {
      let c2 = c2.clamp(MIN_CTR, MAX_CTR);
      let product = (c1 as u64) * (c2 as u64);
      let err = product.abs_diff(divisor as u64);
      if err < best_err {
        best_err = err;
        best     = (c1, c2);
      }
    }
    c1 += 1;
  }
  (best.0 as u16, best.1 as u16)
}

fn programmed(requested_hz : u32, ctr1 : u16, ctr2 : u16) -> ProgrammedRate {
  let divisor = ctr1 as u64 * ctr2 as u64;
  ProgrammedRate {
    requested_hz : requested_hz,
    actual_hz    : ((REFERENCE_CLOCK_HZ as u64 + divisor/2) / divisor) as u32,
    ctr1         : ctr1,
    ctr2         : ctr2,
  }
}

/// Program the ADC pacer cascade (8254 "A", counters 1 and 2)
pub fn program_adc_pacer(state : &mut BoardState, hz : u32)
  -> Result<ProgrammedRate, DaqError> {
  if hz == 0 || hz > MAX_AD_FREQ {
    error!("ADC pacer target {} Hz out of range!", hz);
    return Err(DaqError::BadSpeed);
  }
  let divisor      = REFERENCE_CLOCK_HZ / hz;
  let (ctr1, ctr2) = factor_divisor(divisor);
  state.bus.write_byte(RegWindow::Counter, COUNTERA_CTRL, C1 | MODE2 | LSBFIRST)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERA_1_DATA, (ctr1 & 0xff) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERA_1_DATA, (ctr1 >> 8) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERA_CTRL, C2 | MODE2 | LSBFIRST)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERA_2_DATA, (ctr2 & 0xff) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERA_2_DATA, (ctr2 >> 8) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  let rate = programmed(hz, ctr1, ctr2);
  state.adc_freq = rate.actual_hz;
  state.adc_ctr  = (ctr1, ctr2);
  info!("ADC pacer: requested {} Hz, programmed {} Hz ({} x {})",
        hz, rate.actual_hz, ctr1, ctr2);
  Ok(rate)
}

/// Program the DAC pacer cascade (8254 "B", counters 1 and 2)
pub fn program_dac_pacer(state : &mut BoardState, hz : u32)
  -> Result<ProgrammedRate, DaqError> {
  if hz == 0 || hz > MAX_DA_FREQ {
    error!("DAC pacer target {} Hz out of range!", hz);
    return Err(DaqError::BadSpeed);
  }
  let divisor      = REFERENCE_CLOCK_HZ / hz;
  let (ctr1, ctr2) = factor_divisor(divisor);
  state.bus.write_byte(RegWindow::Counter, COUNTERB_CTRL, C1 | MODE2 | LSBFIRST)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERB_1_DATA, (ctr1 & 0xff) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERB_1_DATA, (ctr1 >> 8) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERB_CTRL, C2 | MODE2 | LSBFIRST)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERB_2_DATA, (ctr2 & 0xff) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  state.bus.write_byte(RegWindow::Counter, COUNTERB_2_DATA, (ctr2 >> 8) as u8)
    .map_err(|_| DaqError::BadSpeed)?;
  let rate = programmed(hz, ctr1, ctr2);
  state.dac_freq = rate.actual_hz;
  state.dac_ctr  = (ctr1, ctr2);
  info!("DAC pacer: requested {} Hz, programmed {} Hz ({} x {})",
        hz, rate.actual_hz, ctr1, ctr2);
  Ok(rate)
}

#[cfg(test)]
mod test_pacer {
  use super::*;
  use crate::sim::SimBus;

  #[test]
  fn test_factor_exact() {
    // 10 MHz / 1 kHz = 10000 = 100 * 100
    let (c1, c2) = factor_divisor(10_000);
    assert_eq!(c1 as u32 * c2 as u32, 10_000);
  }

  #[test]
  fn test_factor_bounds() {
    for divisor in [4u32, 50, 127, 65_536, 4_999_999, u32::MAX] {
      let (c1, c2) = factor_divisor(divisor);
      assert!(c1 >= MIN_CTR as u16);
      assert!(c2 >= MIN_CTR as u16);
    }
  }

  #[test]
  fn test_factor_prime_close() {
    // 4999999 is prime, the best pair has to get close
    let (c1, c2) = factor_divisor(4_999_999);
    let product = c1 as u64 * c2 as u64;
    let err = product.abs_diff(4_999_999);
    assert!(err as f64 / 4_999_999.0 < 1e-4);
  }

  #[test]
  fn test_program_rejects_out_of_range() {
    let sim = SimBus::new();
    let mut state = BoardState::new(Box::new(sim));
    assert_eq!(program_adc_pacer(&mut state, 0).unwrap_err(),
               DaqError::BadSpeed);
    assert_eq!(program_adc_pacer(&mut state, MAX_AD_FREQ + 1).unwrap_err(),
               DaqError::BadSpeed);
    assert_eq!(program_dac_pacer(&mut state, MAX_DA_FREQ + 1).unwrap_err(),
               DaqError::BadSpeed);
  }

  #[test]
  fn test_program_writes_cascade() {
    let sim = SimBus::new();
    let mut state = BoardState::new(Box::new(sim.clone()));
    let rate = program_adc_pacer(&mut state, 1000).unwrap();
    assert_eq!(rate.actual_hz, 1000);
    assert_eq!(rate.ctr1 as u32 * rate.ctr2 as u32, 10_000);
    // 2 control bytes + 2 LSB/MSB pairs
    assert_eq!(sim.counter_writes().len(), 6);
    assert_eq!(state.adc_freq, 1000);
  }

  #[test]
  fn test_actual_rate_reported_for_inexact_target() {
    let sim = SimBus::new();
    let mut state = BoardState::new(Box::new(sim));
    // 10 MHz / 9973 Hz does not divide evenly
    let rate = program_adc_pacer(&mut state, 9_973).unwrap();
    let ratio = rate.actual_hz as f64 / 9_973.0;
    assert!((ratio - 1.0).abs() < 1e-3);
  }
}
