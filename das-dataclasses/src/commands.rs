//! The board control command set
//!
//! Every configuration operation a client can request from a
//! board maps to one command ordinal. The ordinals are wire
//! format - clients encode them into a CommandFrame and the
//! board side decodes them back, so their numeric values are
//! fixed and must never be reassigned.

use std::fmt;

use crate::serialization::{Serialization,
                           parse_u8,
                           parse_u16,
                           parse_u32};
use crate::errors::SerializationError;

pub const CMD_ADC_SET_GAINS        : u8 =  1;
pub const CMD_ADC_GET_GAINS        : u8 =  2;
pub const CMD_ADC_SET_PACER_FREQ   : u8 =  3;
pub const CMD_ADC_GET_PACER_FREQ   : u8 =  4;
pub const CMD_ADC_START_PACER      : u8 =  5;
pub const CMD_ADC_STOP_PACER      : u8 =  6;
pub const CMD_ADC_COUNTER0         : u8 =  7;
pub const CMD_ADC_DIO_PRESET       : u8 =  8;
pub const CMD_ADC_SET_TRIGGER      : u8 =  9;
pub const CMD_ADC_SET_MUX_LOW      : u8 = 10;
pub const CMD_ADC_SET_MUX_HIGH     : u8 = 11;
pub const CMD_ADC_GET_CHAN_MUX_REG : u8 = 12;
pub const CMD_ADC_SET_FRONT_END    : u8 = 13;
pub const CMD_ADC_BURST_MODE       : u8 = 14;
pub const CMD_ADC_PRETRIG          : u8 = 15;
pub const CMD_DIO_SET_MODE         : u8 = 16;
pub const CMD_DIO_SET_DIRECTION    : u8 = 17;
pub const CMD_DAC_SET_GAINS        : u8 = 18;
pub const CMD_DAC_GET_GAINS        : u8 = 19;
pub const CMD_DAC_SET_PACER_FREQ   : u8 = 20;
pub const CMD_DAC_GET_PACER_FREQ   : u8 = 21;
pub const CMD_DAC_STOP_PACER       : u8 = 22;
pub const CMD_DAC_RECYCLE          : u8 = 23;
pub const CMD_DAC_SET_CLO          : u8 = 24;
pub const CMD_DAC_SET_CHI          : u8 = 25;
pub const CMD_DAC_SET_SIMULTANEOUS : u8 = 26;
pub const CMD_GET_BUF_SIZE         : u8 = 27;
/// Highest assigned ordinal, everything above is rejected
pub const CMD_MAXNR                : u8 = 27;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BoardCommand {
  AdcSetGains(u32),
  AdcGetGains,
  AdcSetPacerFreq(u32),
  AdcGetPacerFreq,
  AdcStartPacer,
  AdcStopPacer,
  AdcCounter0(u32),
  AdcDioPreset(u32),
  AdcSetTrigger(u32),
  AdcSetMuxLow(u32),
  AdcSetMuxHigh(u32),
  AdcGetChanMuxReg,
  AdcSetFrontEnd(u32),
  AdcBurstMode(u32),
  AdcPretrig(u32),
  DioSetMode(u32),
  DioSetDirection(u32),
  DacSetGains(u32),
  DacGetGains,
  DacSetPacerFreq(u32),
  DacGetPacerFreq,
  DacStopPacer,
  DacRecycle(u32),
  DacSetChanLow(u32),
  DacSetChanHigh(u32),
  DacSetSimultaneous(u32),
  GetBufSize,
  Unknown
}

impl BoardCommand {

  pub fn from_command_code(cc : u8, value : u32) -> BoardCommand {
    match cc {
      CMD_ADC_SET_GAINS        => BoardCommand::AdcSetGains        (value),
      CMD_ADC_GET_GAINS        => BoardCommand::AdcGetGains               ,
      CMD_ADC_SET_PACER_FREQ   => BoardCommand::AdcSetPacerFreq    (value),
      CMD_ADC_GET_PACER_FREQ   => BoardCommand::AdcGetPacerFreq           ,
      CMD_ADC_START_PACER      => BoardCommand::AdcStartPacer             ,
      CMD_ADC_STOP_PACER       => BoardCommand::AdcStopPacer              ,
      CMD_ADC_COUNTER0         => BoardCommand::AdcCounter0        (value),
      CMD_ADC_DIO_PRESET       => BoardCommand::AdcDioPreset       (value),
      CMD_ADC_SET_TRIGGER      => BoardCommand::AdcSetTrigger      (value),
      CMD_ADC_SET_MUX_LOW      => BoardCommand::AdcSetMuxLow       (value),
      CMD_ADC_SET_MUX_HIGH     => BoardCommand::AdcSetMuxHigh      (value),
      CMD_ADC_GET_CHAN_MUX_REG => BoardCommand::AdcGetChanMuxReg          ,
      CMD_ADC_SET_FRONT_END    => BoardCommand::AdcSetFrontEnd     (value),
      CMD_ADC_BURST_MODE       => BoardCommand::AdcBurstMode       (value),
      CMD_ADC_PRETRIG          => BoardCommand::AdcPretrig         (value),
      CMD_DIO_SET_MODE         => BoardCommand::DioSetMode         (value),
      CMD_DIO_SET_DIRECTION    => BoardCommand::DioSetDirection    (value),
      CMD_DAC_SET_GAINS        => BoardCommand::DacSetGains        (value),
      CMD_DAC_GET_GAINS        => BoardCommand::DacGetGains               ,
      CMD_DAC_SET_PACER_FREQ   => BoardCommand::DacSetPacerFreq    (value),
      CMD_DAC_GET_PACER_FREQ   => BoardCommand::DacGetPacerFreq           ,
      CMD_DAC_STOP_PACER       => BoardCommand::DacStopPacer              ,
      CMD_DAC_RECYCLE          => BoardCommand::DacRecycle         (value),
      CMD_DAC_SET_CLO          => BoardCommand::DacSetChanLow      (value),
      CMD_DAC_SET_CHI          => BoardCommand::DacSetChanHigh     (value),
      CMD_DAC_SET_SIMULTANEOUS => BoardCommand::DacSetSimultaneous (value),
      CMD_GET_BUF_SIZE         => BoardCommand::GetBufSize                ,
      _                        => BoardCommand::Unknown                   ,
    }
  }

  pub fn to_command_code(cmd : &BoardCommand) -> Option<u8> {
    match cmd {
      BoardCommand::AdcSetGains        (_) => Some(CMD_ADC_SET_GAINS       ),
      BoardCommand::AdcGetGains            => Some(CMD_ADC_GET_GAINS       ),
      BoardCommand::AdcSetPacerFreq    (_) => Some(CMD_ADC_SET_PACER_FREQ  ),
      BoardCommand::AdcGetPacerFreq        => Some(CMD_ADC_GET_PACER_FREQ  ),
      BoardCommand::AdcStartPacer          => Some(CMD_ADC_START_PACER     ),
      BoardCommand::AdcStopPacer           => Some(CMD_ADC_STOP_PACER      ),
      BoardCommand::AdcCounter0        (_) => Some(CMD_ADC_COUNTER0        ),
      BoardCommand::AdcDioPreset       (_) => Some(CMD_ADC_DIO_PRESET      ),
      BoardCommand::AdcSetTrigger      (_) => Some(CMD_ADC_SET_TRIGGER     ),
      BoardCommand::AdcSetMuxLow       (_) => Some(CMD_ADC_SET_MUX_LOW     ),
      BoardCommand::AdcSetMuxHigh      (_) => Some(CMD_ADC_SET_MUX_HIGH    ),
      BoardCommand::AdcGetChanMuxReg       => Some(CMD_ADC_GET_CHAN_MUX_REG),
      BoardCommand::AdcSetFrontEnd     (_) => Some(CMD_ADC_SET_FRONT_END   ),
      BoardCommand::AdcBurstMode       (_) => Some(CMD_ADC_BURST_MODE      ),
      BoardCommand::AdcPretrig         (_) => Some(CMD_ADC_PRETRIG         ),
      BoardCommand::DioSetMode         (_) => Some(CMD_DIO_SET_MODE        ),
      BoardCommand::DioSetDirection    (_) => Some(CMD_DIO_SET_DIRECTION   ),
      BoardCommand::DacSetGains        (_) => Some(CMD_DAC_SET_GAINS       ),
      BoardCommand::DacGetGains            => Some(CMD_DAC_GET_GAINS       ),
      BoardCommand::DacSetPacerFreq    (_) => Some(CMD_DAC_SET_PACER_FREQ  ),
      BoardCommand::DacGetPacerFreq        => Some(CMD_DAC_GET_PACER_FREQ  ),
      BoardCommand::DacStopPacer           => Some(CMD_DAC_STOP_PACER      ),
      BoardCommand::DacRecycle         (_) => Some(CMD_DAC_RECYCLE         ),
      BoardCommand::DacSetChanLow      (_) => Some(CMD_DAC_SET_CLO         ),
      BoardCommand::DacSetChanHigh     (_) => Some(CMD_DAC_SET_CHI         ),
      BoardCommand::DacSetSimultaneous (_) => Some(CMD_DAC_SET_SIMULTANEOUS),
      BoardCommand::GetBufSize             => Some(CMD_GET_BUF_SIZE        ),
      BoardCommand::Unknown                => None,
    }
  }

  /// The 32 bit payload carried by the command, 0 for
  /// commands without one.
  pub fn value(&self) -> u32 {
    match self {
      BoardCommand::AdcSetGains        (v)
      | BoardCommand::AdcSetPacerFreq    (v)
      | BoardCommand::AdcCounter0        (v)
      | BoardCommand::AdcDioPreset       (v)
      | BoardCommand::AdcSetTrigger      (v)
      | BoardCommand::AdcSetMuxLow       (v)
      | BoardCommand::AdcSetMuxHigh      (v)
      | BoardCommand::AdcSetFrontEnd     (v)
      | BoardCommand::AdcBurstMode       (v)
      | BoardCommand::AdcPretrig         (v)
      | BoardCommand::DioSetMode         (v)
      | BoardCommand::DioSetDirection    (v)
      | BoardCommand::DacSetGains        (v)
      | BoardCommand::DacSetPacerFreq    (v)
      | BoardCommand::DacRecycle         (v)
      | BoardCommand::DacSetChanLow      (v)
      | BoardCommand::DacSetChanHigh     (v)
      | BoardCommand::DacSetSimultaneous (v) => *v,
      _ => 0,
    }
  }
}

impl fmt::Display for BoardCommand {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<BoardCommand: {:?}>", self)
  }
}

/// A framed command as it travels over a transport.
///
/// Carries the command ordinal together with the addressed
/// subdevice (minor number on the PCI side, frame address on
/// the Bluetooth side) and the 32 bit argument.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CommandFrame {
  pub minor        : u8,
  pub command_code : u8,
  pub value        : u32,
}

impl CommandFrame {

  pub fn new(minor : u8, cmd : &BoardCommand) -> Option<CommandFrame> {
    let cc = BoardCommand::to_command_code(cmd)?;
    Some(CommandFrame {
      minor        : minor,
      command_code : cc,
      value        : cmd.value(),
    })
  }

  pub fn command(&self) -> BoardCommand {
    BoardCommand::from_command_code(self.command_code, self.value)
  }
}

impl Serialization for CommandFrame {
  const HEAD : u16   = 0xAAAA;
  const TAIL : u16   = 0x5555;
  // HEAD + minor + cc + value + TAIL
  const SIZE : usize = 10;

  fn from_bytestream(stream : &[u8], pos : &mut usize)
    -> Result<CommandFrame, SerializationError> {
    if stream.len() < *pos + CommandFrame::SIZE {
      return Err(SerializationError::StreamTooShort);
    }
    if parse_u16(stream, pos) != CommandFrame::HEAD {
      return Err(SerializationError::HeadInvalid);
    }
    let frame = CommandFrame {
      minor        : parse_u8 (stream, pos),
      command_code : parse_u8 (stream, pos),
      value        : parse_u32(stream, pos),
    };
    if parse_u16(stream, pos) != CommandFrame::TAIL {
      return Err(SerializationError::TailInvalid);
    }
    Ok(frame)
  }

  fn to_bytestream(&self) -> Vec<u8> {
    let mut stream = Vec::<u8>::with_capacity(CommandFrame::SIZE);
    stream.extend_from_slice(&CommandFrame::HEAD.to_le_bytes());
    stream.push(self.minor);
    stream.push(self.command_code);
    stream.extend_from_slice(&self.value.to_le_bytes());
    stream.extend_from_slice(&CommandFrame::TAIL.to_le_bytes());
    stream
  }
}

impl fmt::Display for CommandFrame {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<CommandFrame: minor {} cmd {} value {}>",
           self.minor, self.command_code, self.value)
  }
}

#[cfg(test)]
mod test_commands {
  use super::*;

  #[test]
  fn test_command_code_roundtrip() {
    for cc in 1..=CMD_MAXNR {
      let cmd = BoardCommand::from_command_code(cc, 42);
      assert_ne!(cmd, BoardCommand::Unknown);
      assert_eq!(BoardCommand::to_command_code(&cmd), Some(cc));
    }
  }

  #[test]
  fn test_unknown_code() {
    assert_eq!(BoardCommand::from_command_code(CMD_MAXNR + 1, 0),
               BoardCommand::Unknown);
    assert_eq!(BoardCommand::from_command_code(0, 0),
               BoardCommand::Unknown);
    assert_eq!(BoardCommand::to_command_code(&BoardCommand::Unknown), None);
  }

  #[test]
  fn test_frame_roundtrip() {
    let cmd   = BoardCommand::AdcSetPacerFreq(100_000);
    let frame = CommandFrame::new(3, &cmd).unwrap();
    let bytes = frame.to_bytestream();
    assert_eq!(bytes.len(), CommandFrame::SIZE);
    let mut pos = 0;
    let restored = CommandFrame::from_bytestream(&bytes, &mut pos).unwrap();
    assert_eq!(restored, frame);
    assert_eq!(restored.command(), cmd);
  }

  #[test]
  fn test_frame_bad_tail() {
    let frame = CommandFrame::new(0, &BoardCommand::AdcStartPacer).unwrap();
    let mut bytes = frame.to_bytestream();
    let n = bytes.len();
    bytes[n-1] = 0xff;
    let mut pos = 0;
    assert_eq!(CommandFrame::from_bytestream(&bytes, &mut pos).unwrap_err(),
               SerializationError::TailInvalid);
  }
}
