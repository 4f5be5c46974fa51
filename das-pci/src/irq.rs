//! Interrupt servicing
//!
//! On hardware the board raises one interrupt line for all
//! sources; the service routine reads the latched status,
//! drains the FIFO and acknowledges with write-to-clear bits.
//! Here the body runs under the board mutex from a dedicated
//! service thread, identical in effect.
//!
//! Ordering invariants:
//! * an overrun beats everything, the run is declared lost
//!   before any further draining
//! * when EOA and half-full are latched together the FIFO is
//!   drained completely BEFORE the scan is declared done, so
//!   the tail of the acquisition is never lost

use das_dataclasses::constants::HALF_FIFO;
use das_dataclasses::errors::DaqError;

use crate::board::{Board,
                   BoardState};
use crate::memory::RegWindow;
use crate::registers::*;
use crate::scan::ScanState;

/// What one interrupt service pass did
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum IrqAck {
  /// half-full service, FIFO partially drained
  Serviced(usize),
  /// acquisition complete, scan is Stopped
  EndOfAcquisition(usize),
  /// FIFO overran, run lost
  Overrun,
  /// interrupt without any work to do
  Spurious,
}

fn drain(state : &mut BoardState, cap : usize) -> Result<usize, DaqError> {
  let mut n = 0usize;
  while n < cap {
    let status = state.bus.read(RegWindow::Control, IRQ_REG)
      .map_err(|_| DaqError::InvalidCommand)?;
    if status & ADNE == 0 {
      break;
    }
    let sample = state.bus.read(RegWindow::AdcData, ADC_DATA_REG)
      .map_err(|_| DaqError::InvalidCommand)?;
    state.scan.buffer.push(sample);
    state.scan.acquired += 1;
    n += 1;
  }
  Ok(n)
}

/// The interrupt service body.
pub fn service_interrupt(board : &Board) -> Result<IrqAck, DaqError> {
  let mut state = board.state.lock().unwrap();
  let status = state.bus.read(RegWindow::Control, IRQ_REG)
    .map_err(|_| DaqError::InvalidCommand)?;

  if !state.scan.is_active() {
    state.scan.spurious += 1;
    let ack = state.irq_shadow | INTCL | EOACL;
    state.bus.write(RegWindow::Control, IRQ_REG, ack)
      .map_err(|_| DaqError::InvalidCommand)?;
    trace!("Spurious interrupt, status {:04x}", status);
    return Ok(IrqAck::Spurious);
  }

  if status & LADFUL != 0 {
    // data already lost in hardware, the partial run is
    // unusable
    state.scan.state = ScanState::Overrun;
    state.scan.overruns += 1;
    state.scan.buffer.clear();
    let trig = state.trig_shadow & !TGEN;
    state.bus.write(RegWindow::Control, TRIG_REG, trig)
      .map_err(|_| DaqError::InvalidCommand)?;
    state.trig_shadow = trig;
    state.bus.write(RegWindow::Control, IRQ_REG, EOACL | INTCL | ADFLCL)
      .map_err(|_| DaqError::InvalidCommand)?;
    state.irq_shadow = 0;
    state.bus.write(RegWindow::AdcData, ADC_DATA_REG, 0)
      .map_err(|_| DaqError::InvalidCommand)?;
    error!("ADC FIFO overrun, scan aborted after {} samples", state.scan.acquired);
    drop(state);
    board.cvar.notify_all();
    return Ok(IrqAck::Overrun);
  }

  if status & (EOAI | ADHFI | ADNE) == 0 {
    state.scan.spurious += 1;
    let ack = state.irq_shadow | INTCL;
    state.bus.write(RegWindow::Control, IRQ_REG, ack)
      .map_err(|_| DaqError::InvalidCommand)?;
    trace!("Spurious interrupt, status {:04x}", status);
    return Ok(IrqAck::Spurious);
  }

  let eoa = status & EOAI != 0;
  // a half-full service drains at most half the FIFO, the
  // final service takes whatever is left
  let mut cap = if eoa { usize::MAX } else { HALF_FIFO };
  if let Some(remaining) = state.scan.remaining() {
    cap = cap.min(remaining as usize);
  }
  let drained = drain(&mut state, cap)?;

  let complete = eoa || state.scan.remaining() == Some(0);
  if complete {
    state.scan.state = ScanState::Stopped;
    let trig = state.trig_shadow & !TGEN;
    state.bus.write(RegWindow::Control, TRIG_REG, trig)
      .map_err(|_| DaqError::InvalidCommand)?;
    state.trig_shadow = trig;
    state.bus.write(RegWindow::Control, IRQ_REG, EOACL | INTCL | ADFLCL)
      .map_err(|_| DaqError::InvalidCommand)?;
    state.irq_shadow = 0;
    info!("Acquisition complete, {} samples", state.scan.acquired);
    drop(state);
    board.cvar.notify_all();
    return Ok(IrqAck::EndOfAcquisition(drained));
  }

  let ack = state.irq_shadow | INTCL;
  state.bus.write(RegWindow::Control, IRQ_REG, ack)
    .map_err(|_| DaqError::InvalidCommand)?;
  trace!("Serviced half-full, drained {} samples", drained);
  drop(state);
  board.cvar.notify_all();
  Ok(IrqAck::Serviced(drained))
}

#[cfg(test)]
mod test_irq {
  use super::*;
  use crate::scan;
  use crate::sim::SimBus;
  use das_dataclasses::config::ScanConfig;
  use das_dataclasses::constants::FIFO_SIZE;

  fn running_board(count : u32) -> (Board, SimBus) {
    let sim   = SimBus::new();
    let board = Board::new(Box::new(sim.clone()));
    let mut cfg = ScanConfig::new();
    cfg.chan_hi  = 3;
    cfg.pacer_hz = 1000;
    cfg.count    = count;
    scan::configure(&board, &cfg).unwrap();
    scan::arm(&board).unwrap();
    scan::start(&board).unwrap();
    (board, sim)
  }

  #[test]
  fn test_half_full_drains_half_fifo() {
    let (board, sim) = running_board(0);
    let samples : Vec<u16> = (0..400u16).collect();
    sim.push_samples(&samples);
    let ack = service_interrupt(&board).unwrap();
    assert_eq!(ack, IrqAck::Serviced(HALF_FIFO));
    let state = board.state.lock().unwrap();
    assert_eq!(state.scan.acquired, HALF_FIFO as u32);
    assert_eq!(state.scan.buffer[0], 0);
    assert_eq!(state.scan.state, ScanState::Running);
  }

  #[test]
  fn test_drain_capped_at_requested_count() {
    let (board, sim) = running_board(10);
    sim.push_samples(&(0..300u16).collect::<Vec<u16>>());
    let ack = service_interrupt(&board).unwrap();
    // cap reached means the scan is complete
    assert_eq!(ack, IrqAck::EndOfAcquisition(10));
    let state = board.state.lock().unwrap();
    assert_eq!(state.scan.acquired, 10);
    assert_eq!(state.scan.state, ScanState::Stopped);
  }

  #[test]
  fn test_eoa_drains_before_completion() {
    let (board, sim) = running_board(0);
    sim.push_samples(&[7u16; 42]);
    sim.latch(EOAI);
    let ack = service_interrupt(&board).unwrap();
    assert_eq!(ack, IrqAck::EndOfAcquisition(42));
    let state = board.state.lock().unwrap();
    assert_eq!(state.scan.acquired, 42);
    assert_eq!(state.scan.state, ScanState::Stopped);
    assert_eq!(sim.fifo_len(), 0);
  }

  #[test]
  fn test_overrun_aborts_run() {
    let (board, sim) = running_board(0);
    sim.push_samples(&vec![1u16; FIFO_SIZE + 10]);
    let ack = service_interrupt(&board).unwrap();
    assert_eq!(ack, IrqAck::Overrun);
    let state = board.state.lock().unwrap();
    assert_eq!(state.scan.state, ScanState::Overrun);
    assert_eq!(state.scan.overruns, 1);
    assert!(state.scan.buffer.is_empty());
    // hardware FIFO flushed as well
    assert_eq!(sim.fifo_len(), 0);
  }

  #[test]
  fn test_spurious_counted() {
    let sim   = SimBus::new();
    let board = Board::new(Box::new(sim.clone()));
    assert_eq!(service_interrupt(&board).unwrap(), IrqAck::Spurious);
    assert_eq!(board.state.lock().unwrap().scan.spurious, 1);
  }

  #[test]
  fn test_overrun_then_reset_and_rearm() {
    let (board, sim) = running_board(0);
    sim.push_samples(&vec![1u16; FIFO_SIZE + 1]);
    service_interrupt(&board).unwrap();
    assert_eq!(scan::arm(&board).unwrap_err(), DaqError::FifoOverrun);
    scan::reset(&board).unwrap();
    scan::arm(&board).unwrap();
    assert_eq!(board.state.lock().unwrap().scan.state, ScanState::Armed);
  }

  #[test]
  fn test_idle_interrupt_acknowledged_with_shadow() {
    // empty FIFO while running, the ack must reuse the armed
    // interrupt shadow so EOA stays enabled
    let (board, sim) = running_board(0);
    let shadow = board.state.lock().unwrap().irq_shadow;
    assert_ne!(shadow & INTE, 0);
    assert_eq!(service_interrupt(&board).unwrap(), IrqAck::Spurious);
    assert_eq!(sim.irq_ctrl() & (INTE | EOAIE), shadow & (INTE | EOAIE));
    let state = board.state.lock().unwrap();
    assert_eq!(state.scan.spurious, 1);
    assert_eq!(state.scan.state, ScanState::Running);
  }
}
