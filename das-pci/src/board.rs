//! Per-board runtime state
//!
//! One Board per physical card. The state behind the mutex is
//! shared between the interrupt service path and the client
//! facing control path; the condvar wakes blocked readers when
//! the interrupt path delivered samples or ended the scan.
//!
//! Clients address subdevices through the minor number:
//! bits [7:5] select the board, bits [4:0] the function
//! (0-15 ADC channel, 16-17 DAC channel, 18-20 DIO port).

use std::fmt;
use std::sync::{Arc,
                Condvar,
                Mutex};

use das_dataclasses::calibrations::CalibrationTable;
use das_dataclasses::constants::{AD_CHANNELS,
                                 DA_CHANNELS,
                                 DEFAULT_FREQ,
                                 DIO_PORTS};
use das_dataclasses::config::PacerSource;
use das_dataclasses::errors::DaqError;
use das_dataclasses::gains::{DacGain,
                             Gain};

use crate::memory::RegisterBus;
use crate::registers::{ADPS0,
                       ADPS1};
use crate::scan::ScanStatus;

/// Highest function ordinal that decodes to an ADC channel
pub const MINOR_ADC_MAX : u8 = 15;
/// Function ordinals of the two DAC channels
pub const MINOR_DAC_LO  : u8 = 16;
pub const MINOR_DAC_HI  : u8 = 17;
/// Function ordinals of the three DIO ports
pub const MINOR_DIO_LO  : u8 = 18;
pub const MINOR_DIO_HI  : u8 = 20;

/// ADPS bits for the mux/control register
pub fn pacer_mux_bits(source : PacerSource) -> u16 {
  match source {
    PacerSource::SoftConvert     => 0,
    PacerSource::ExternalFalling => ADPS0,
    PacerSource::ExternalRising  => ADPS1,
    PacerSource::Internal        => ADPS0 | ADPS1,
  }
}

#[derive(Debug, Copy, Clone)]
pub struct AdcChanRec {
  pub open          : bool,
  pub count         : u32,
  pub pretrig_count : u16,
  pub gain          : Gain,
  pub low_chan      : u8,
  pub hi_chan       : u8,
  pub pacer_source  : PacerSource,
}

impl AdcChanRec {
  pub fn new() -> AdcChanRec {
    AdcChanRec {
      open          : false,
      count         : 0,
      pretrig_count : 0,
      gain          : Gain::Bip10V,
      low_chan      : 0,
      hi_chan       : 0,
      pacer_source  : PacerSource::Internal,
    }
  }
}

#[derive(Debug, Copy, Clone)]
pub struct DacChanRec {
  pub open      : bool,
  /// 0 = one shot, continuous otherwise
  pub recycle   : bool,
  pub count     : u32,
  pub value     : u16,
  pub gain      : DacGain,
  pub threshold : u16,
}

impl DacChanRec {
  pub fn new() -> DacChanRec {
    DacChanRec {
      open      : false,
      recycle   : false,
      count     : 0,
      value     : 0,
      gain      : DacGain::Bip10V,
      threshold : 0,
    }
  }
}

#[derive(Debug, Copy, Clone)]
pub struct DioChanRec {
  pub open      : bool,
  /// 8255 mode (0 basic, 1 strobed, 2 bidirectional)
  pub mode      : u8,
  pub direction : u8,
  pub value     : u8,
}

impl DioChanRec {
  pub fn new() -> DioChanRec {
    DioChanRec {
      open      : false,
      mode      : 0,
      direction : 0,
      value     : 0,
    }
  }
}

/// Everything the mutex protects, shadow registers included.
///
/// The write-only control registers cannot be read back, so
/// every write goes through the shadows kept here.
pub struct BoardState {
  pub bus          : Box<dyn RegisterBus>,
  pub irq_shadow   : u16,
  pub mux_shadow   : u16,
  pub trig_shadow  : u16,
  pub dac_shadow   : u16,
  pub dac_simultaneous : bool,
  /// channel 0 word held back while simultaneous update is on
  pub dac_held     : Option<u16>,
  /// actual (not requested) pacer rates after factorization
  pub adc_freq     : u32,
  pub dac_freq     : u32,
  pub adc_ctr      : (u16, u16),
  pub dac_ctr      : (u16, u16),
  pub adc_chan     : [AdcChanRec; AD_CHANNELS],
  pub dac_chan     : [DacChanRec; DA_CHANNELS],
  pub dio_chan     : [DioChanRec; DIO_PORTS],
  pub calib        : CalibrationTable,
  pub scan         : ScanStatus,
}

impl BoardState {
  pub fn new(bus : Box<dyn RegisterBus>) -> BoardState {
    BoardState {
      bus          : bus,
      irq_shadow   : 0,
      mux_shadow   : 0,
      trig_shadow  : 0,
      dac_shadow   : 0,
      dac_simultaneous : false,
      dac_held     : None,
      adc_freq     : DEFAULT_FREQ,
      dac_freq     : DEFAULT_FREQ,
      adc_ctr      : (0, 0),
      dac_ctr      : (0, 0),
      adc_chan     : [AdcChanRec::new(); AD_CHANNELS],
      dac_chan     : [DacChanRec::new(); DA_CHANNELS],
      dio_chan     : [DioChanRec::new(); DIO_PORTS],
      calib        : CalibrationTable::new(),
      scan         : ScanStatus::new(),
    }
  }
}

pub struct Board {
  pub state : Mutex<BoardState>,
  pub cvar  : Condvar,
}

impl Board {
  pub fn new(bus : Box<dyn RegisterBus>) -> Board {
    Board {
      state : Mutex::new(BoardState::new(bus)),
      cvar  : Condvar::new(),
    }
  }

  /// Replace the correction table, normally once at attach
  /// from the coefficient block.
  pub fn install_calibration(&self, table : CalibrationTable) {
    let mut state = self.state.lock().unwrap();
    state.calib = table;
    info!("Calibration table installed");
  }
}

/// One function of one board, as decoded from a minor number
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Subdevice {
  AdcChannel(u8),
  DacChannel(u8),
  DioPort(u8),
}

impl fmt::Display for Subdevice {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Subdevice::AdcChannel(ch) => write!(f, "<Subdevice: ADC ch {}>", ch),
      Subdevice::DacChannel(ch) => write!(f, "<Subdevice: DAC ch {}>", ch),
      Subdevice::DioPort(p)     => write!(f, "<Subdevice: DIO port {}>", p),
    }
  }
}

/// Split a minor number into board index and subdevice
pub fn decode_minor(minor : u8) -> Result<(usize, Subdevice), DaqError> {
  let board    = (minor >> 5) as usize;
  let function = minor & 0x1f;
  let sub = match function {
    0..=MINOR_ADC_MAX           => Subdevice::AdcChannel(function),
    MINOR_DAC_LO..=MINOR_DAC_HI => Subdevice::DacChannel(function - MINOR_DAC_LO),
    MINOR_DIO_LO..=MINOR_DIO_HI => Subdevice::DioPort(function - MINOR_DIO_LO),
    _ => {
      error!("Minor {} decodes to unassigned function {}!", minor, function);
      return Err(DaqError::BadChannel);
    }
  };
  Ok((board, sub))
}

/// All boards found at attach time
pub struct Registry {
  boards : Vec<Arc<Board>>,
}

impl Registry {

  pub fn new() -> Registry {
    Registry {
      boards : Vec::<Arc<Board>>::new(),
    }
  }

  pub fn attach(&mut self, board : Board) -> usize {
    self.boards.push(Arc::new(board));
    info!("Attached board {}", self.boards.len() - 1);
    self.boards.len() - 1
  }

  pub fn get(&self, idx : usize) -> Result<Arc<Board>, DaqError> {
    self.boards.get(idx)
      .cloned()
      .ok_or(DaqError::BadChannel)
  }

  /// Resolve a minor number to its board and subdevice
  pub fn resolve(&self, minor : u8) -> Result<(Arc<Board>, Subdevice), DaqError> {
    let (idx, sub) = decode_minor(minor)?;
    Ok((self.get(idx)?, sub))
  }

  pub fn len(&self) -> usize {
    self.boards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boards.is_empty()
  }
}

impl Default for Registry {
  fn default() -> Registry {
    Registry::new()
  }
}
