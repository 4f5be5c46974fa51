//! Typed access to the non-scan board functions
//!
//! Single software paced conversions, the two DAC outputs,
//! the 8255 digital ports and the open/close bookkeeping for
//! every subdevice. The paced acquisition engine lives in the
//! scan/irq modules, everything here completes synchronously.

use das_dataclasses::config::PacerSource;
use das_dataclasses::constants::{DA_CHANNELS,
                                 DIO_PORTS,
                                 Wiring};
use das_dataclasses::errors::DaqError;
use das_dataclasses::gains::{DacGain,
                             Gain};

use crate::board::{pacer_mux_bits,
                   Board,
                   Subdevice};
use crate::memory::RegWindow;
use crate::registers::*;

/// Poll budget for a software paced conversion
const EOC_RETRIES : u32 = 10_000;

/// 8255 mode set marker bit in the control byte
pub const DIO_MODE_SET : u8 = 0x80;

/// One-time bring-up after attach: route the add-on interrupt
/// through the AMCC bridge to PCI INTA and clear every latch
/// left over from the previous driver instance.
pub fn init_board(board : &Board) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  state.bus.write_dword(RegWindow::Amcc, INTCSR_ADDR, INTCSR_DWORD)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.bus.write_dword(RegWindow::Amcc, BMCSR_ADDR, BMCSR_DWORD)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.bus.write(RegWindow::Control, IRQ_REG, EOACL | INTCL | ADFLCL)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.irq_shadow = 0;
  state.bus.write(RegWindow::AdcData, ADC_DATA_REG, 0)
    .map_err(|_| DaqError::InvalidCommand)?;
  info!("Board initialized, interrupt routing enabled");
  Ok(())
}

/// Mark a subdevice open. A second open of the same
/// subdevice fails until it was closed again.
pub fn open_subdevice(board : &Board, sub : Subdevice) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  let open = match sub {
    Subdevice::AdcChannel(ch) => &mut state.adc_chan[ch as usize].open,
    Subdevice::DacChannel(ch) => &mut state.dac_chan[ch as usize].open,
    Subdevice::DioPort(p)     => &mut state.dio_chan[p as usize].open,
  };
  if *open {
    warn!("{} already open!", sub);
    return Err(DaqError::DeviceBusy);
  }
  *open = true;
  debug!("Opened {}", sub);
  Ok(())
}

pub fn close_subdevice(board : &Board, sub : Subdevice) {
  let mut state = board.state.lock().unwrap();
  match sub {
    Subdevice::AdcChannel(ch) => state.adc_chan[ch as usize].open = false,
    Subdevice::DacChannel(ch) => state.dac_chan[ch as usize].open = false,
    Subdevice::DioPort(p)     => state.dio_chan[p as usize].open  = false,
  }
  debug!("Closed {}", sub);
}

/// One software paced conversion on a single channel.
///
/// Returns the raw 16 bit sample. Calibration correction is
/// applied by the caller where wanted.
pub fn ain(board : &Board, channel : u8, gain : Gain, wiring : Wiring)
  -> Result<u16, DaqError> {
  if channel as usize >= wiring.nchannels() {
    return Err(DaqError::BadChannel);
  }
  let mut state = board.state.lock().unwrap();
  if state.scan.is_active() {
    return Err(DaqError::DeviceBusy);
  }
  let mut mux = ((channel as u16) << 4) | channel as u16;
  mux |= gain.mux_bits();
  if wiring == Wiring::SingleEnded {
    mux |= SEDIFF;
  }
  mux |= pacer_mux_bits(PacerSource::SoftConvert);
  // flush stale conversions, then writing the mux register
  // kicks off the conversion in software paced mode
  state.bus.write(RegWindow::AdcData, ADC_DATA_REG, 0)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.bus.write(RegWindow::Control, MUX_REG, mux)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.mux_shadow = mux;
  let mut retries = EOC_RETRIES;
  loop {
    let status = state.bus.read(RegWindow::Control, MUX_REG)
      .map_err(|_| DaqError::InvalidCommand)?;
    if status & EOC != 0 {
      break;
    }
    retries -= 1;
    if retries == 0 {
      error!("Conversion on channel {} never completed!", channel);
      return Err(DaqError::InvalidCommand);
    }
  }
  let sample = state.bus.read(RegWindow::AdcData, ADC_DATA_REG)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.adc_chan[channel as usize].gain = gain;
  Ok(sample)
}

/// Latch gain and scan window for a channel without touching
/// the hardware, the values get programmed at arm time.
pub fn set_adc_gain(board : &Board, channel : u8, code : u16) -> Result<(), DaqError> {
  let gain = Gain::from_code(code)?;
  let mut state = board.state.lock().unwrap();
  state.adc_chan[channel as usize].gain = gain;
  Ok(())
}

pub fn set_mux_low(board : &Board, channel : u8, low : u8) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  if low as usize >= state.adc_chan.len() {
    return Err(DaqError::BadChannel);
  }
  state.adc_chan[channel as usize].low_chan = low;
  Ok(())
}

pub fn set_mux_high(board : &Board, channel : u8, high : u8) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  if high as usize >= state.adc_chan.len() {
    return Err(DaqError::BadChannel);
  }
  state.adc_chan[channel as usize].hi_chan = high;
  Ok(())
}

/// Snapshot of the mux/control shadow, for clients that want
/// to verify what the hardware was last programmed with
pub fn get_chan_mux_reg(board : &Board) -> u16 {
  board.state.lock().unwrap().mux_shadow
}

/// Program trigger source/polarity bits, preserving the
/// engine-owned enable bits
pub fn set_trigger(board : &Board, bits : u16) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  let keep = state.trig_shadow & (TGEN | BURSTE | PRTRG | C0SRC);
  let trig = keep | (bits & (TS0 | TS1 | TGPOL | TGSEL));
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  Ok(())
}

/// Arm pretrigger mode with the given residual count.
/// FFM0 starts the residual counter immediately instead of
/// arming it on the next half-full.
pub fn set_pretrig(board : &Board, channel : u8, count : u16, immediate : bool)
  -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  if state.scan.is_active() {
    return Err(DaqError::DeviceBusy);
  }
  state.adc_chan[channel as usize].pretrig_count = count;
  let mut trig = state.trig_shadow | PRTRG | ARM;
  if immediate {
    trig |= FFM0;
  }
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  debug!("Pretrigger armed, residual count {}", count);
  Ok(())
}

/// Route counter 0 to the internal 10 MHz reference or the
/// external clock pin
pub fn set_counter0_source(board : &Board, internal : bool) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  let mut trig = state.trig_shadow;
  if internal {
    trig |= C0SRC;
  }
  else {
    trig &= !C0SRC;
  }
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  Ok(())
}

//========== DAC =============

/// Write one output sample. In simultaneous mode the write to
/// channel 0 is held until channel 1 arrives, then both data
/// words hit the hardware back to back.
pub fn aout(board : &Board, channel : u8, value : u16) -> Result<(), DaqError> {
  if channel as usize >= DA_CHANNELS {
    return Err(DaqError::BadChannel);
  }
  let mut state = board.state.lock().unwrap();
  let ctrl = state.dac_shadow | DACEN;
  state.bus.write(RegWindow::Control, DAC_REG, ctrl)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.dac_shadow = ctrl;
  if state.dac_simultaneous && channel == 0 {
    state.dac_held = Some(value);
    state.dac_chan[0].value = value;
    return Ok(());
  }
  if channel == 1 {
    if let Some(held) = state.dac_held.take() {
      state.bus.write(RegWindow::DacData, DAC0_DATA_REG, held)
        .map_err(|_| DaqError::InvalidCommand)?;
    }
  }
  let reg = if channel == 0 { DAC0_DATA_REG } else { DAC1_DATA_REG };
  state.bus.write(RegWindow::DacData, reg, value)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.dac_chan[channel as usize].value = value;
  Ok(())
}

/// Program both output ranges at once from a packed code
/// (channel 0 in the low byte, channel 1 in the high byte)
pub fn set_dac_gains(board : &Board, packed : u32) -> Result<(), DaqError> {
  let g0 = DacGain::from_code((packed & 0xff) as u16)?;
  let g1 = DacGain::from_code(((packed >> 8) & 0xff) as u16)?;
  let mut state = board.state.lock().unwrap();
  let mut ctrl = state.dac_shadow & !(DAC0R0 | DAC0R1 | DAC1R0 | DAC1R1);
  ctrl |= g0.control_bits(0);
  ctrl |= g1.control_bits(1);
  state.bus.write(RegWindow::Control, DAC_REG, ctrl)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.dac_shadow = ctrl;
  state.dac_chan[0].gain = g0;
  state.dac_chan[1].gain = g1;
  Ok(())
}

pub fn get_dac_gains(board : &Board) -> u32 {
  let state = board.state.lock().unwrap();
  state.dac_chan[0].gain.code() as u32
    | ((state.dac_chan[1].gain.code() as u32) << 8)
}

/// Switch simultaneous update mode. Turning it off releases
/// a held channel 0 word immediately.
pub fn set_dac_simultaneous(board : &Board, on : bool) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  state.dac_simultaneous = on;
  if !on {
    if let Some(held) = state.dac_held.take() {
      state.bus.write(RegWindow::DacData, DAC0_DATA_REG, held)
        .map_err(|_| DaqError::InvalidCommand)?;
    }
  }
  Ok(())
}

pub fn set_dac_recycle(board : &Board, channel : u8, on : bool) -> Result<(), DaqError> {
  if channel as usize >= DA_CHANNELS {
    return Err(DaqError::BadChannel);
  }
  board.state.lock().unwrap().dac_chan[channel as usize].recycle = on;
  Ok(())
}

/// Comparator thresholds for the high speed DAC modes
pub fn set_dac_threshold(board : &Board, channel : u8, threshold : u16, high : bool)
  -> Result<(), DaqError> {
  if channel as usize >= DA_CHANNELS {
    return Err(DaqError::BadChannel);
  }
  let mut state = board.state.lock().unwrap();
  state.dac_chan[channel as usize].threshold = threshold;
  // comparator enables live in the trigger register
  let mut trig = state.trig_shadow;
  if high {
    trig |= CHI_EN;
  }
  else {
    trig |= CLO_EN;
  }
  state.bus.write(RegWindow::Control, TRIG_REG, trig)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.trig_shadow = trig;
  Ok(())
}

pub fn stop_dac_pacer(board : &Board) -> Result<(), DaqError> {
  let mut state = board.state.lock().unwrap();
  let ctrl = state.dac_shadow & !START;
  state.bus.write(RegWindow::Control, DAC_REG, ctrl)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.dac_shadow = ctrl;
  Ok(())
}

//========== DIO =============

/// Program the 8255 mode for one port. Takes effect on the
/// next direction programming.
pub fn dio_set_mode(board : &Board, port : u8, mode : u8) -> Result<(), DaqError> {
  if port as usize >= DIO_PORTS || mode > 2 {
    return Err(DaqError::InvalidCommand);
  }
  board.state.lock().unwrap().dio_chan[port as usize].mode = mode;
  Ok(())
}

/// Program the direction of one port and rewrite the 8255
/// control byte built from all three port records.
pub fn dio_set_direction(board : &Board, port : u8, input : bool) -> Result<(), DaqError> {
  if port as usize >= DIO_PORTS {
    return Err(DaqError::InvalidCommand);
  }
  let mut state = board.state.lock().unwrap();
  state.dio_chan[port as usize].direction = u8::from(input);
  // control byte: mode set | A dir (bit 4) | B dir (bit 1)
  // | C upper (bit 3) | C lower (bit 0)
  let mut ctrl = DIO_MODE_SET;
  ctrl |= (state.dio_chan[0].mode & 0x3) << 5;
  if state.dio_chan[0].direction != 0 {
    ctrl |= 0x10;
  }
  if state.dio_chan[1].direction != 0 {
    ctrl |= 0x02;
  }
  if state.dio_chan[2].direction != 0 {
    ctrl |= 0x09;
  }
  state.bus.write_byte(RegWindow::Counter, DIO_CNTRL_REG, ctrl)
    .map_err(|_| DaqError::InvalidCommand)?;
  Ok(())
}

pub fn dio_write(board : &Board, port : u8, value : u8) -> Result<(), DaqError> {
  if port as usize >= DIO_PORTS {
    return Err(DaqError::BadChannel);
  }
  let mut state = board.state.lock().unwrap();
  state.bus.write_byte(RegWindow::Counter, DIO_PORTA + port as u32, value)
    .map_err(|_| DaqError::InvalidCommand)?;
  state.dio_chan[port as usize].value = value;
  Ok(())
}

pub fn dio_read(board : &Board, port : u8) -> Result<u8, DaqError> {
  if port as usize >= DIO_PORTS {
    return Err(DaqError::BadChannel);
  }
  let mut state = board.state.lock().unwrap();
  state.bus.read_byte(RegWindow::Counter, DIO_PORTA + port as u32)
    .map_err(|_| DaqError::InvalidCommand)
}

/// Preset all three ports in one call, port A in the low
/// byte, then B, then C
pub fn dio_preset(board : &Board, packed : u32) -> Result<(), DaqError> {
  for port in 0..DIO_PORTS as u8 {
    dio_write(board, port, ((packed >> (8*port)) & 0xff) as u8)?;
  }
  Ok(())
}

#[cfg(test)]
mod test_control {
  use super::*;
  use crate::sim::SimBus;

  fn test_board() -> (Board, SimBus) {
    let sim = SimBus::new();
    (Board::new(Box::new(sim.clone())), sim)
  }

  #[test]
  fn test_double_open_rejected() {
    let (board, _) = test_board();
    let sub = Subdevice::AdcChannel(3);
    open_subdevice(&board, sub).unwrap();
    assert_eq!(open_subdevice(&board, sub).unwrap_err(), DaqError::DeviceBusy);
    close_subdevice(&board, sub);
    open_subdevice(&board, sub).unwrap();
  }

  #[test]
  fn test_ain_pops_one_sample() {
    let (board, sim) = test_board();
    sim.preload_conversions(&[0x8123]);
    let sample = ain(&board, 2, Gain::Bip10V, Wiring::SingleEnded).unwrap();
    assert_eq!(sample, 0x8123);
    // mux window collapsed to the single channel
    assert_eq!(sim.mux_reg() & 0xff, 0x22);
  }

  #[test]
  fn test_ain_bad_channel() {
    let (board, _) = test_board();
    assert_eq!(ain(&board, 8, Gain::Bip10V, Wiring::Differential).unwrap_err(),
               DaqError::BadChannel);
  }

  #[test]
  fn test_aout_writes_channel() {
    let (board, sim) = test_board();
    aout(&board, 1, 0x0fff).unwrap();
    assert_eq!(sim.dac_data(1), 0x0fff);
    assert_eq!(aout(&board, 2, 0).unwrap_err(), DaqError::BadChannel);
  }

  #[test]
  fn test_aout_simultaneous_holds_channel0() {
    let (board, sim) = test_board();
    set_dac_simultaneous(&board, true).unwrap();
    aout(&board, 0, 0x0aaa).unwrap();
    // nothing on the wire until channel 1 releases the pair
    assert_eq!(sim.dac_data(0), 0);
    aout(&board, 1, 0x0bbb).unwrap();
    assert_eq!(sim.dac_data(0), 0x0aaa);
    assert_eq!(sim.dac_data(1), 0x0bbb);
  }

  #[test]
  fn test_dac_simultaneous_off_releases_held() {
    let (board, sim) = test_board();
    set_dac_simultaneous(&board, true).unwrap();
    aout(&board, 0, 0x0123).unwrap();
    assert_eq!(sim.dac_data(0), 0);
    set_dac_simultaneous(&board, false).unwrap();
    assert_eq!(sim.dac_data(0), 0x0123);
  }

  #[test]
  fn test_init_board_programs_bridge() {
    let (board, sim) = test_board();
    init_board(&board).unwrap();
    let writes = sim.amcc_writes();
    assert_eq!(writes, vec![(INTCSR_ADDR, INTCSR_DWORD),
                            (BMCSR_ADDR,  BMCSR_DWORD)]);
    // stale conversions flushed as part of bring-up
    assert_eq!(sim.fifo_clear_count(), 1);
  }

  #[test]
  fn test_dio_roundtrip() {
    let (board, _) = test_board();
    dio_set_direction(&board, 0, false).unwrap();
    dio_write(&board, 0, 0xa5).unwrap();
    assert_eq!(dio_read(&board, 0).unwrap(), 0xa5);
  }

  #[test]
  fn test_dio_preset_spreads_bytes() {
    let (board, _) = test_board();
    dio_preset(&board, 0x00_03_02_01).unwrap();
    assert_eq!(dio_read(&board, 0).unwrap(), 1);
    assert_eq!(dio_read(&board, 1).unwrap(), 2);
    assert_eq!(dio_read(&board, 2).unwrap(), 3);
  }
}
