//! A simulated board behind the RegisterBus trait
//!
//! Models the parts of the hardware the acquisition engine
//! observes: the ADC FIFO, the latched interrupt status bits
//! with their write-to-clear behavior and plain storage for
//! the remaining registers. Tests hold a cloned handle and
//! inject samples/latch bits while the engine owns the bus.

use std::collections::VecDeque;
use std::sync::{Arc,
                Mutex};

use crate::memory::{RegWindow,
                    RegisterBus,
                    RegisterError};
use crate::registers::*;

use das_dataclasses::constants::FIFO_SIZE;

struct SimInner {
  fifo           : VecDeque<u16>,
  /// samples delivered by software paced conversions
  soft_samples   : VecDeque<u16>,
  /// latched read-side bits of IRQ_REG
  irq_status     : u16,
  /// last written IRQ_REG value (enable bits)
  irq_ctrl       : u16,
  mux            : u16,
  trig           : u16,
  calibrate      : u16,
  dac_ctrl       : u16,
  dac_data       : [u16; 2],
  counter_bytes  : Vec<(u32, u8)>,
  dio_bytes      : [u8; 4],
  amcc_dwords    : Vec<(u32, u32)>,
  fifo_cleared   : u32,
}

/// Clonable handle, all clones talk to the same board.
#[derive(Clone)]
pub struct SimBus {
  inner : Arc<Mutex<SimInner>>,
}

impl SimBus {

  pub fn new() -> SimBus {
    SimBus {
      inner : Arc::new(Mutex::new(SimInner {
        fifo          : VecDeque::<u16>::with_capacity(FIFO_SIZE),
        soft_samples  : VecDeque::<u16>::new(),
        irq_status    : 0,
        irq_ctrl      : 0,
        mux           : 0,
        trig          : 0,
        calibrate     : 0,
        dac_ctrl      : 0,
        dac_data      : [0; 2],
        counter_bytes : Vec::<(u32, u8)>::new(),
        dio_bytes     : [0; 4],
        amcc_dwords   : Vec::<(u32, u32)>::new(),
        fifo_cleared  : 0,
      })),
    }
  }

  /// Push converted samples into the FIFO. Samples beyond the
  /// FIFO depth are dropped and the overrun latch is raised,
  /// like the hardware does.
  pub fn push_samples(&self, samples : &[u16]) {
    let mut inner = self.inner.lock().unwrap();
    for &s in samples {
      if inner.fifo.len() >= FIFO_SIZE {
        inner.irq_status |= LADFUL;
        break;
      }
      inner.fifo.push_back(s);
    }
    if inner.fifo.len() >= FIFO_SIZE/2 {
      inner.irq_status |= ADHFI | INT;
    }
  }

  /// Queue samples for software paced conversions. Each mux
  /// write in soft convert mode delivers the next one.
  pub fn preload_conversions(&self, samples : &[u16]) {
    let mut inner = self.inner.lock().unwrap();
    inner.soft_samples.extend(samples.iter().copied());
  }

  /// Raise latched status bits (EOAI, ADHFI, LADFUL, ...)
  pub fn latch(&self, bits : u16) {
    self.inner.lock().unwrap().irq_status |= bits;
  }

  pub fn fifo_len(&self) -> usize {
    self.inner.lock().unwrap().fifo.len()
  }

  pub fn fifo_clear_count(&self) -> u32 {
    self.inner.lock().unwrap().fifo_cleared
  }

  /// Last written IRQ_REG control value
  pub fn irq_ctrl(&self) -> u16 {
    self.inner.lock().unwrap().irq_ctrl
  }

  pub fn mux_reg(&self) -> u16 {
    self.inner.lock().unwrap().mux
  }

  pub fn trig_reg(&self) -> u16 {
    self.inner.lock().unwrap().trig
  }

  pub fn dac_data(&self, channel : usize) -> u16 {
    self.inner.lock().unwrap().dac_data[channel]
  }

  /// Byte writes seen on the counter window, in order
  pub fn counter_writes(&self) -> Vec<(u32, u8)> {
    self.inner.lock().unwrap().counter_bytes.clone()
  }

  /// Dword writes seen on the AMCC bridge window, in order
  pub fn amcc_writes(&self) -> Vec<(u32, u32)> {
    self.inner.lock().unwrap().amcc_dwords.clone()
  }
}

impl Default for SimBus {
  fn default() -> SimBus {
    SimBus::new()
  }
}

impl RegisterBus for SimBus {

  fn read(&mut self, window : RegWindow, addr : u32) -> Result<u16, RegisterError> {
    let mut inner = self.inner.lock().unwrap();
    match window {
      RegWindow::Control => {
        match addr {
          IRQ_REG => {
            let mut status = inner.irq_status;
            if !inner.fifo.is_empty() {
              status |= ADNE;
            }
            Ok(status)
          }
          MUX_REG  => Ok(inner.mux | EOC),
          TRIG_REG => Ok(inner.trig),
          DAC_REG  => Ok(inner.dac_ctrl),
          _        => Ok(0),
        }
      }
      RegWindow::AdcData => {
        // a read pops the FIFO, an empty FIFO reads as 0
        Ok(inner.fifo.pop_front().unwrap_or(0))
      }
      RegWindow::DacData => {
        let chan = (addr / 2) as usize;
        Ok(*inner.dac_data.get(chan).unwrap_or(&0))
      }
      _ => Ok(0),
    }
  }

  fn write(&mut self, window : RegWindow, addr : u32, value : u16) -> Result<(), RegisterError> {
    let mut inner = self.inner.lock().unwrap();
    match window {
      RegWindow::Control => {
        match addr {
          IRQ_REG => {
            // write-clear bits act, enable bits persist
            if value & EOACL  != 0 {
              inner.irq_status &= !EOAI;
            }
            if value & INTCL  != 0 {
              inner.irq_status &= !(INT | ADHFI);
            }
            if value & ADFLCL != 0 {
              inner.irq_status &= !LADFUL;
            }
            inner.irq_ctrl = value & !(EOACL | INTCL | ADFLCL | DAHFCL | DAEMCL);
          }
          MUX_REG       => {
            inner.mux = value;
            // soft paced mode converts on the mux write
            if value & (ADPS0 | ADPS1) == 0 {
              if let Some(s) = inner.soft_samples.pop_front() {
                if inner.fifo.len() < FIFO_SIZE {
                  inner.fifo.push_back(s);
                }
              }
            }
          }
          TRIG_REG      => inner.trig      = value,
          CALIBRATE_REG => inner.calibrate = value,
          DAC_REG       => inner.dac_ctrl  = value,
          _ => (),
        }
      }
      RegWindow::AdcData => {
        inner.fifo.clear();
        inner.fifo_cleared += 1;
      }
      RegWindow::DacData => {
        let chan = (addr / 2) as usize;
        if chan < 2 {
          inner.dac_data[chan] = value;
        }
      }
      _ => (),
    }
    Ok(())
  }

  fn read_byte(&mut self, window : RegWindow, addr : u32) -> Result<u8, RegisterError> {
    let inner = self.inner.lock().unwrap();
    match window {
      RegWindow::Counter => {
        match addr {
          DIO_PORTA..=DIO_CNTRL_REG => {
            Ok(inner.dio_bytes[(addr - DIO_PORTA) as usize])
          }
          _ => Ok(0),
        }
      }
      _ => Ok(0),
    }
  }

  fn write_byte(&mut self, window : RegWindow, addr : u32, value : u8) -> Result<(), RegisterError> {
    let mut inner = self.inner.lock().unwrap();
    if window == RegWindow::Counter {
      match addr {
        DIO_PORTA..=DIO_CNTRL_REG => {
          inner.dio_bytes[(addr - DIO_PORTA) as usize] = value;
        }
        _ => {
          inner.counter_bytes.push((addr, value));
        }
      }
    }
    Ok(())
  }

  fn write_dword(&mut self, window : RegWindow, addr : u32, value : u32) -> Result<(), RegisterError> {
    let mut inner = self.inner.lock().unwrap();
    if window == RegWindow::Amcc {
      inner.amcc_dwords.push((addr, value));
    }
    Ok(())
  }
}

#[cfg(test)]
mod test_sim {
  use super::*;

  #[test]
  fn test_fifo_pop_and_clear() {
    let sim = SimBus::new();
    sim.push_samples(&[10, 20, 30]);
    let mut bus = sim.clone();
    assert_eq!(bus.read(RegWindow::AdcData, ADC_DATA_REG).unwrap(), 10);
    assert_eq!(bus.read(RegWindow::AdcData, ADC_DATA_REG).unwrap(), 20);
    assert_eq!(sim.fifo_len(), 1);
    bus.write(RegWindow::AdcData, ADC_DATA_REG, 0).unwrap();
    assert_eq!(sim.fifo_len(), 0);
  }

  #[test]
  fn test_write_clear_latches() {
    let sim = SimBus::new();
    sim.latch(EOAI | LADFUL);
    let mut bus = sim.clone();
    let status = bus.read(RegWindow::Control, IRQ_REG).unwrap();
    assert_ne!(status & EOAI, 0);
    assert_ne!(status & LADFUL, 0);
    bus.write(RegWindow::Control, IRQ_REG, EOACL).unwrap();
    let status = bus.read(RegWindow::Control, IRQ_REG).unwrap();
    assert_eq!(status & EOAI, 0);
    // LADFUL needs its own clear bit
    assert_ne!(status & LADFUL, 0);
    bus.write(RegWindow::Control, IRQ_REG, ADFLCL).unwrap();
    assert_eq!(bus.read(RegWindow::Control, IRQ_REG).unwrap() & LADFUL, 0);
  }

  #[test]
  fn test_soft_conversion_on_mux_write() {
    let sim = SimBus::new();
    sim.preload_conversions(&[0x0042]);
    let mut bus = sim.clone();
    // paced mode does not convert
    bus.write(RegWindow::Control, MUX_REG, ADPS0 | ADPS1).unwrap();
    assert_eq!(sim.fifo_len(), 0);
    bus.write(RegWindow::Control, MUX_REG, 0x22).unwrap();
    assert_eq!(bus.read(RegWindow::AdcData, ADC_DATA_REG).unwrap(), 0x0042);
  }

  #[test]
  fn test_overrun_on_overfill() {
    let sim = SimBus::new();
    let samples = vec![1u16; FIFO_SIZE + 1];
    sim.push_samples(&samples);
    let mut bus = sim.clone();
    assert_ne!(bus.read(RegWindow::Control, IRQ_REG).unwrap() & LADFUL, 0);
    assert_eq!(sim.fifo_len(), FIFO_SIZE);
  }
}
