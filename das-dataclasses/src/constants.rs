//! Board geometry and timing constants shared by all
//! members of the DAS board family.

/// Analog input channels in single ended wiring
pub const AD_CHANNELS   : usize = 16;
/// Analog input channels in differential wiring
pub const AD_CHANNELS_DIFF : usize = 8;
/// Analog output channels
pub const DA_CHANNELS   : usize = 2;
/// 8255 style digital I/O ports (A, B, C)
pub const DIO_PORTS     : usize = 3;

/// Depth of the onboard ADC FIFO in samples
pub const FIFO_SIZE     : usize = 512;
/// Samples drained per half-full interrupt
pub const HALF_FIFO     : usize = FIFO_SIZE/2;
/// Largest bounded sample request the FIFO can be drained
/// for without risking an overrun at full pacer speed
pub const MAX_COUNT     : u32   = 16384;

/// The internal oscillator feeding the pacer counter cascade
pub const REFERENCE_CLOCK_HZ : u32 = 10_000_000;
/// Fastest supported ADC pacer rate
pub const MAX_AD_FREQ   : u32 = 200_000;
/// Fastest supported DAC pacer rate
pub const MAX_DA_FREQ   : u32 = 100_000;
/// Pacer rate applied when no frequency was ever programmed
pub const DEFAULT_FREQ  : u32 = 1000;

/// Number of programmable input gain ranges
pub const NGAINS        : usize = 8;

/// Input wiring of the analog front end. The mux either
/// pairs channels (8 differential inputs) or references
/// all 16 inputs against analog ground.
#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Wiring {
  Differential,
  SingleEnded,
}

impl Wiring {
  /// Number of input channels available in this wiring
  pub fn nchannels(&self) -> usize {
    match self {
      Wiring::Differential => AD_CHANNELS_DIFF,
      Wiring::SingleEnded  => AD_CHANNELS,
    }
  }
}
