//! Client facing API
//!
//! The command dispatcher maps a decoded CommandFrame onto
//! the typed control/scan/pacer operations, and the blocking
//! sample read parks callers on the board condvar until the
//! interrupt path delivered data.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime,
             Utc};

use das_dataclasses::commands::{BoardCommand,
                                CommandFrame};
use das_dataclasses::constants::{MAX_COUNT,
                                 Wiring};
use das_dataclasses::errors::DaqError;

use crate::board::{Board,
                   Registry,
                   Subdevice};
use crate::control;
use crate::memory::RegWindow;
use crate::pacer;
use crate::registers::IRQ_REG;
use crate::scan::{self,
                  ScanState};

/// Result of a blocking sample read. Samples come out
/// calibration corrected, in counts.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
  /// samples delivered, more may follow
  Samples(Vec<f64>),
  /// the last samples of a finished scan (possibly empty)
  EndOfScan(Vec<f64>),
  /// the scan overran, nothing to read until reset
  Overrun,
  /// nothing arrived within the timeout
  Timeout,
}

/// Block until samples are available, the scan ends, or the
/// timeout expires.
///
/// Raw FIFO words are mapped through the board calibration
/// table on the way out; the channel of each sample follows
/// from its position in the scan window round-robin.
///
/// Timing out is an expected outcome for slow scans and
/// deliberately not an error.
pub fn read_samples(board : &Board, max : usize, timeout : Duration)
  -> Result<ReadOutcome, DaqError> {
  let mut state = board.state.lock().unwrap();
  loop {
    if state.scan.state == ScanState::Overrun {
      return Ok(ReadOutcome::Overrun);
    }
    if !state.scan.buffer.is_empty() {
      let n     = max.min(state.scan.buffer.len());
      let cfg   = state.scan.config;
      let nchan = cfg.nchan() as usize;
      // index of the oldest buffered sample within the scan
      let start = state.scan.acquired as usize - state.scan.buffer.len();
      let raw : Vec<u16> = state.scan.buffer.drain(..n).collect();
      let samples : Vec<f64> = raw.iter().enumerate()
        .map(|(k, &word)| {
          let channel = cfg.chan_lo as usize + (start + k) % nchan;
          state.calib.correct(word, cfg.gain, channel, cfg.wiring)
        })
        .collect();
      if state.scan.state == ScanState::Stopped && state.scan.buffer.is_empty() {
        return Ok(ReadOutcome::EndOfScan(samples));
      }
      return Ok(ReadOutcome::Samples(samples));
    }
    if state.scan.state == ScanState::Stopped {
      return Ok(ReadOutcome::EndOfScan(Vec::<f64>::new()));
    }
    let (next, result) = board.cvar.wait_timeout(state, timeout).unwrap();
    state = next;
    if result.timed_out() {
      trace!("Read timed out after {:?}", timeout);
      return Ok(ReadOutcome::Timeout);
    }
  }
}

/// Point-in-time view of one board for status queries
#[derive(Debug, Copy, Clone)]
pub struct BoardStatus {
  pub scan_state : ScanState,
  pub requested  : u32,
  pub acquired   : u32,
  pub buffered   : usize,
  /// achieved (not requested) pacer rate
  pub actual_hz  : u32,
  pub spurious   : u32,
  pub overruns   : u32,
  /// raw latched interrupt/status register
  pub irq_status : u16,
  pub queried_at : DateTime<Utc>,
}

impl fmt::Display for BoardStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<BoardStatus: {} {}/{} samples, {} buffered, {} Hz, {} spurious, {} overruns, irq {:04x} [{}]>",
           self.scan_state, self.acquired, self.requested, self.buffered,
           self.actual_hz, self.spurious, self.overruns, self.irq_status,
           self.queried_at)
  }
}

pub fn status(board : &Board) -> BoardStatus {
  let mut state = board.state.lock().unwrap();
  let irq_status = state.bus.read(RegWindow::Control, IRQ_REG).unwrap_or(0);
  BoardStatus {
    scan_state : state.scan.state,
    requested  : state.scan.config.count,
    acquired   : state.scan.acquired,
    buffered   : state.scan.buffer.len(),
    actual_hz  : state.adc_freq,
    spurious   : state.scan.spurious,
    overruns   : state.scan.overruns,
    irq_status : irq_status,
    queried_at : Utc::now(),
  }
}

fn adc_channel(sub : Subdevice) -> Result<u8, DaqError> {
  match sub {
    Subdevice::AdcChannel(ch) => Ok(ch),
    _ => Err(DaqError::BadChannel),
  }
}

fn dac_channel(sub : Subdevice) -> Result<u8, DaqError> {
  match sub {
    Subdevice::DacChannel(ch) => Ok(ch),
    _ => Err(DaqError::BadChannel),
  }
}

fn dio_port(sub : Subdevice) -> Result<u8, DaqError> {
  match sub {
    Subdevice::DioPort(p) => Ok(p),
    _ => Err(DaqError::BadChannel),
  }
}

/// Execute one framed command, returning the 32 bit reply
/// value (0 for commands without one).
pub fn execute(registry : &Registry, frame : &CommandFrame) -> Result<u32, DaqError> {
  let (board, sub) = registry.resolve(frame.minor)?;
  let cmd = frame.command();
  debug!("Executing {} on {}", cmd, sub);
  match cmd {
    BoardCommand::AdcSetGains(v) => {
      control::set_adc_gain(&board, adc_channel(sub)?, v as u16)?;
      Ok(0)
    }
    BoardCommand::AdcGetGains => {
      let ch = adc_channel(sub)?;
      let state = board.state.lock().unwrap();
      Ok(state.adc_chan[ch as usize].gain.mux_bits() as u32)
    }
    BoardCommand::AdcSetPacerFreq(v) => {
      adc_channel(sub)?;
      let mut state = board.state.lock().unwrap();
      if state.scan.is_active() {
        return Err(DaqError::DeviceBusy);
      }
      let rate = pacer::program_adc_pacer(&mut state, v)?;
      Ok(rate.actual_hz)
    }
    BoardCommand::AdcGetPacerFreq => {
      Ok(board.state.lock().unwrap().adc_freq)
    }
    BoardCommand::AdcStartPacer => {
      adc_channel(sub)?;
      scan::start(&board)?;
      Ok(0)
    }
    BoardCommand::AdcStopPacer => {
      scan::stop(&board)?;
      Ok(0)
    }
    BoardCommand::AdcCounter0(v) => {
      control::set_counter0_source(&board, v != 0)?;
      Ok(0)
    }
    BoardCommand::AdcDioPreset(v) => {
      control::dio_preset(&board, v)?;
      Ok(0)
    }
    BoardCommand::AdcSetTrigger(v) => {
      control::set_trigger(&board, v as u16)?;
      Ok(0)
    }
    BoardCommand::AdcSetMuxLow(v) => {
      control::set_mux_low(&board, adc_channel(sub)?, v as u8)?;
      Ok(0)
    }
    BoardCommand::AdcSetMuxHigh(v) => {
      control::set_mux_high(&board, adc_channel(sub)?, v as u8)?;
      Ok(0)
    }
    BoardCommand::AdcGetChanMuxReg => {
      Ok(control::get_chan_mux_reg(&board) as u32)
    }
    BoardCommand::AdcSetFrontEnd(v) => {
      let mut state = board.state.lock().unwrap();
      if state.scan.is_active() {
        return Err(DaqError::DeviceBusy);
      }
      state.scan.config.wiring = if v != 0 { Wiring::SingleEnded }
                                 else      { Wiring::Differential };
      Ok(0)
    }
    BoardCommand::AdcBurstMode(v) => {
      let mut state = board.state.lock().unwrap();
      if state.scan.is_active() {
        return Err(DaqError::DeviceBusy);
      }
      state.scan.config.burst_mode = v != 0;
      Ok(0)
    }
    BoardCommand::AdcPretrig(v) => {
      control::set_pretrig(&board, adc_channel(sub)?, v as u16, false)?;
      Ok(0)
    }
    BoardCommand::DioSetMode(v) => {
      control::dio_set_mode(&board, dio_port(sub)?, v as u8)?;
      Ok(0)
    }
    BoardCommand::DioSetDirection(v) => {
      control::dio_set_direction(&board, dio_port(sub)?, v != 0)?;
      Ok(0)
    }
    BoardCommand::DacSetGains(v) => {
      control::set_dac_gains(&board, v)?;
      Ok(0)
    }
    BoardCommand::DacGetGains => {
      Ok(control::get_dac_gains(&board))
    }
    BoardCommand::DacSetPacerFreq(v) => {
      dac_channel(sub)?;
      let mut state = board.state.lock().unwrap();
      let rate = pacer::program_dac_pacer(&mut state, v)?;
      Ok(rate.actual_hz)
    }
    BoardCommand::DacGetPacerFreq => {
      Ok(board.state.lock().unwrap().dac_freq)
    }
    BoardCommand::DacStopPacer => {
      control::stop_dac_pacer(&board)?;
      Ok(0)
    }
    BoardCommand::DacRecycle(v) => {
      control::set_dac_recycle(&board, dac_channel(sub)?, v != 0)?;
      Ok(0)
    }
    BoardCommand::DacSetChanLow(v) => {
      control::set_dac_threshold(&board, dac_channel(sub)?, v as u16, false)?;
      Ok(0)
    }
    BoardCommand::DacSetChanHigh(v) => {
      control::set_dac_threshold(&board, dac_channel(sub)?, v as u16, true)?;
      Ok(0)
    }
    BoardCommand::DacSetSimultaneous(v) => {
      dac_channel(sub)?;
      control::set_dac_simultaneous(&board, v != 0)?;
      Ok(0)
    }
    BoardCommand::GetBufSize => {
      Ok(MAX_COUNT)
    }
    BoardCommand::Unknown => {
      warn!("Unknown command code {}!", frame.command_code);
      Err(DaqError::InvalidCommand)
    }
  }
}
