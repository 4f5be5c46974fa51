//! The paced acquisition state machine
//!
//! A scan walks Idle -> Armed -> Running and ends in Stopped
//! (all requested samples delivered, or stopped by the
//! client) or Overrun (the FIFO filled before software kept
//! up). A finished scan has to be reset before it can be
//! armed again, so a client can never silently splice two
//! runs into one sample stream.
//!
//! All transitions here run in process context under the
//! board mutex. The transitions out of Running happen in
//! interrupt context, see the irq module.

use std::fmt;

use das_dataclasses::config::{PacerSource,
                              ScanConfig};
use das_dataclasses::constants::Wiring;
use das_dataclasses::errors::DaqError;

use crate::board::{pacer_mux_bits,
                   Board};
use crate::memory::RegWindow;
use crate::pacer;
use crate::registers::*;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ScanState {
  Idle,
  Armed,
  Running,
  Stopped,
  Overrun,
}

impl fmt::Display for ScanState {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<ScanState: {:?}>", self)
  }
}

/// Scan bookkeeping behind the board mutex
pub struct ScanStatus {
  pub state     : ScanState,
  pub config    : ScanConfig,
  /// samples drained from the FIFO so far
  pub acquired  : u32,
  pub buffer    : Vec<u16>,
  pub spurious  : u32,
  pub overruns  : u32,
}

impl ScanStatus {

  pub fn new() -> ScanStatus {
    ScanStatus {
      state     : ScanState::Idle,
      config    : ScanConfig::new(),
      acquired  : 0,
      buffer    : Vec::<u16>::new(),
      spurious  : 0,
      overruns  : 0,
    }
  }

  /// true while the interrupt path may still deliver samples
  pub fn is_active(&self) -> bool {
    matches!(self.state, ScanState::Armed | ScanState::Running)
  }

  /// Samples still owed to the client, None for continuous
  pub fn remaining(&self) -> Option<u32> {
    if self.config.count == 0 {
      return None;
    }
    Some(self.config.count.saturating_sub(self.acquired))
  }
}

impl Default for ScanStatus {
  fn default() -> ScanStatus {
    ScanStatus::new()
  }
}

/// Validate and latch a scan configuration.
///
/// Only allowed while Idle; the pacer is programmed here so
/// the achieved rate is known before arming.
pub fn configure(board : &Board, cfg : &ScanConfig) -> Result<ScanConfig, DaqError> {
  cfg.validate()?;
  let mut state = board.state.lock().unwrap();
  match state.scan.state {
    ScanState::Idle    => (),
    ScanState::Overrun => {
      warn!("Rejecting configure, last scan overran");
      return Err(DaqError::FifoOverrun);
    }
    other => {
      warn!("Rejecting configure, scan is {}", other);
      return Err(DaqError::DeviceBusy);
    }
  }
  let mut latched = *cfg;
  // only the onboard cascade needs counter programming
  if cfg.pacer_source == PacerSource::Internal {
    let rate = pacer::program_adc_pacer(&mut state, cfg.pacer_hz)?;
    latched.pacer_hz = rate.actual_hz;
  }
  state.scan.config = latched;
  debug!("Latched {}", latched);
  Ok(latched)
}

/// Program mux and trigger registers and enable interrupts.
/// Idle -> Armed. Conversions do not start yet.
pub fn arm(board : &Board) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  match state.scan.state {
    ScanState::Idle    => (),
    ScanState::Overrun => {
      warn!("Rejecting arm, last scan overran");
      return Err(DaqError::FifoOverrun);
    }
    other => {
      warn!("Rejecting arm, scan is {}", other);
      return Err(DaqError::DeviceBusy);
    }
  }
  let cfg = state.scan.config;
  // scan window in the low byte, hi chan in the upper nibble
  let mut mux = ((cfg.chan_hi as u16) << 4) | cfg.chan_lo as u16;
  mux |= cfg.gain.mux_bits();
  if cfg.wiring == Wiring::SingleEnded {
    mux |= SEDIFF;
  }
  mux |= pacer_mux_bits(cfg.pacer_source);
  state.bus.write(RegWindow::Control, MUX_REG, mux)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.mux_shadow = mux;

  // drop stale conversions and clear every latch
  state.bus.write(RegWindow::AdcData, ADC_DATA_REG, 0)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.bus.write(RegWindow::Control, IRQ_REG, EOACL | INTCL | ADFLCL)
    .map_err(|_| DaqError::InvalidCommand)?;

  // half-full and end-of-acquisition interrupts
  let irq = INTE | EOAIE | INT0;
  state.bus.write(RegWindow::Control, IRQ_REG, irq)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.irq_shadow = irq;

  let mut trig = C0SRC;
  if cfg.burst_mode {
    trig |= BURSTE;
  }
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;

  state.scan.acquired = 0;
  state.scan.buffer.clear();
  state.scan.state = ScanState::Armed;
  info!("Armed: {}", cfg);
  Ok(())
}

/// Release the trigger. Armed -> Running, conversions start
/// on the next pacer edge.
pub fn start(board : &Board) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  if state.scan.state != ScanState::Armed {
    warn!("Rejecting start, scan is {}", state.scan.state);
    return Err(DaqError::InvalidCommand);
  }
  let trig = state.trig_shadow | TGEN;
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  state.scan.state = ScanState::Running;
  info!("Scan running at {} Hz", state.adc_freq);
  Ok(())
}

/// Halt conversions. Accepted in every state; samples already
/// drained stay readable. Waiting readers get woken so they
/// can observe the final state.
pub fn stop(board : &Board) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  let trig = state.trig_shadow & !TGEN;
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  state.bus.write(RegWindow::Control, IRQ_REG, 0)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.irq_shadow = 0;
  // a stop acknowledges an overrun as well, the run is over
  // either way and only reset leads back to Idle
  state.scan.state = ScanState::Stopped;
  info!("Scan stopped with {} samples acquired", state.scan.acquired);
  drop(state);
  board.cvar.notify_all();
  Ok(())
}

/// Return to Idle: disable interrupts, flush the FIFO and
/// drop buffered samples. Required after Stopped or Overrun
/// before the next arm.
pub fn reset(board : &Board) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  let trig = state.trig_shadow & !TGEN;
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  state.bus.write(RegWindow::Control, IRQ_REG, EOACL | INTCL | ADFLCL)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.irq_shadow = 0;
  state.bus.write(RegWindow::AdcData, ADC_DATA_REG, 0)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.scan.acquired = 0;
  state.scan.buffer.clear();
  state.scan.state = ScanState::Idle;
  debug!("Scan reset to Idle");
  drop(state);
  board.cvar.notify_all();
  Ok(())
}
