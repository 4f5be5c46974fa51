//! Error taxonomy for the DAS drivers
//!
//! Configuration time errors are returned synchronously to the
//! caller and never leave a scan partially armed. `FifoOverrun`
//! is the only error originating in interrupt context; it is
//! surfaced on the next status query or pending read.

use std::error::Error;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DaqError {
  /// Channel or minor number decodes out of range
  BadChannel,
  /// Requested sample count exceeds the safe FIFO bound
  BadCount,
  /// Unsupported gain/range code
  BadGain,
  /// Pacer target outside the hardware bounds
  BadSpeed,
  /// Channel already open, or a scan is already active
  DeviceBusy,
  /// The FIFO filled before software drained it; the
  /// in-flight run is lost
  FifoOverrun,
  /// Persisted calibration coefficients missing or short
  CalibrationFormat,
  /// Unrecognized control request
  InvalidCommand,
}

impl fmt::Display for DaqError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let etype = match self {
      DaqError::BadChannel        => "BadChannel",
      DaqError::BadCount          => "BadCount",
      DaqError::BadGain           => "BadGain",
      DaqError::BadSpeed          => "BadSpeed",
      DaqError::DeviceBusy        => "DeviceBusy",
      DaqError::FifoOverrun       => "FifoOverrun",
      DaqError::CalibrationFormat => "CalibrationFormat",
      DaqError::InvalidCommand    => "InvalidCommand",
    };
    write!(f, "<DaqError: {}>", etype)
  }
}

impl Error for DaqError {
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SerializationError {
  TailInvalid,
  HeadInvalid,
  StreamTooShort,
  ValueNotFound,
  WrongByteSize,
}

impl fmt::Display for SerializationError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let etype = match self {
      SerializationError::TailInvalid    => "TailInvalid",
      SerializationError::HeadInvalid    => "HeadInvalid",
      SerializationError::StreamTooShort => "StreamTooShort",
      SerializationError::ValueNotFound  => "ValueNotFound",
      SerializationError::WrongByteSize  => "WrongByteSize",
    };
    write!(f, "<SerializationError: {}>", etype)
  }
}

impl Error for SerializationError {
}
