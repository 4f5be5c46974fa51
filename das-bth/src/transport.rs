//! Frame codec for the Bluetooth link
//!
//! Every exchange is one request frame answered by one
//! response frame:
//!
//! request   [frame_id, command, ndata, data..., checksum]
//! response  [frame_id, status,  ndata, data..., checksum]
//!
//! The checksum is the additive 8 bit sum over all preceding
//! bytes. The device echoes the frame id; the dispatcher
//! verifies the echo so a stale reply from an earlier,
//! timed-out request can never be taken for the current one.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Bytes of framing around the payload
pub const FRAME_OVERHEAD : usize = 4;
/// Response status byte of a successfully executed command
pub const STATUS_OK      : u8 = 0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BthError {
  ShortFrame,
  ChecksumMismatch,
  FrameIdMismatch,
  /// nonzero status byte from the device
  DeviceStatus(u8),
  LinkFail,
}

impl fmt::Display for BthError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let etype = match self {
      BthError::ShortFrame       => String::from("ShortFrame"),
      BthError::ChecksumMismatch => String::from("ChecksumMismatch"),
      BthError::FrameIdMismatch  => String::from("FrameIdMismatch"),
      BthError::DeviceStatus(s)  => format!("DeviceStatus({})", s),
      BthError::LinkFail         => String::from("LinkFail"),
    };
    write!(f, "<BthError: {}>", etype)
  }
}

impl Error for BthError {
}

/// The serial-profile link. receive returning None means the
/// timeout expired with no reply, which is a normal outcome
/// on a radio link and not an error.
pub trait Transport : Send {
  fn send(&mut self, frame : &[u8]) -> Result<(), BthError>;
  fn receive(&mut self, timeout : Duration) -> Result<Option<Vec<u8>>, BthError>;
}

/// Additive 8 bit checksum, wrapping
pub fn checksum(bytes : &[u8]) -> u8 {
  bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Builds request frames and validates responses. Owns the
/// rolling frame id.
pub struct FrameCodec {
  frame_id : u8,
}

impl FrameCodec {

  pub fn new() -> FrameCodec {
    FrameCodec {
      frame_id : 0,
    }
  }

  /// Encode the next request. Rolls the frame id and returns
  /// it together with the wire bytes.
  pub fn encode_request(&mut self, command : u8, data : &[u8]) -> (u8, Vec<u8>) {
    let id = self.frame_id;
    self.frame_id = self.frame_id.wrapping_add(1);
    let mut frame = Vec::<u8>::with_capacity(FRAME_OVERHEAD + data.len());
    frame.push(id);
    frame.push(command);
    frame.push(data.len() as u8);
    frame.extend_from_slice(data);
    frame.push(checksum(&frame));
    (id, frame)
  }

  /// Validate a response frame against the request's id and
  /// peel it down to the payload.
  pub fn decode_response(raw : &[u8], expected_id : u8) -> Result<Vec<u8>, BthError> {
    if raw.len() < FRAME_OVERHEAD {
      return Err(BthError::ShortFrame);
    }
    let n = raw.len();
    if checksum(&raw[..n-1]) != raw[n-1] {
      warn!("Response checksum mismatch!");
      return Err(BthError::ChecksumMismatch);
    }
    if raw[0] != expected_id {
      warn!("Expected frame id {}, got {}!", expected_id, raw[0]);
      return Err(BthError::FrameIdMismatch);
    }
    if raw[1] != STATUS_OK {
      return Err(BthError::DeviceStatus(raw[1]));
    }
    let ndata = raw[2] as usize;
    if n != FRAME_OVERHEAD + ndata {
      return Err(BthError::ShortFrame);
    }
    Ok(raw[3..3+ndata].to_vec())
  }
}

impl Default for FrameCodec {
  fn default() -> FrameCodec {
    FrameCodec::new()
  }
}

#[cfg(test)]
mod test_transport {
  use super::*;

  fn fake_response(id : u8, status : u8, data : &[u8]) -> Vec<u8> {
    let mut frame = vec![id, status, data.len() as u8];
    frame.extend_from_slice(data);
    frame.push(checksum(&frame));
    frame
  }

  #[test]
  fn test_frame_id_rolls() {
    let mut codec = FrameCodec::new();
    let (id0, _) = codec.encode_request(0x10, &[]);
    let (id1, _) = codec.encode_request(0x10, &[]);
    assert_eq!(id0, 0);
    assert_eq!(id1, 1);
    codec.frame_id = 255;
    let (id_last, _) = codec.encode_request(0x10, &[]);
    let (id_wrap, _) = codec.encode_request(0x10, &[]);
    assert_eq!(id_last, 255);
    assert_eq!(id_wrap, 0);
  }

  #[test]
  fn test_request_checksum_covers_frame() {
    let mut codec = FrameCodec::new();
    let (_, frame) = codec.encode_request(0x10, &[0xab, 0xcd]);
    let n = frame.len();
    assert_eq!(checksum(&frame[..n-1]), frame[n-1]);
  }

  #[test]
  fn test_response_roundtrip() {
    let payload = FrameCodec::decode_response(&fake_response(7, STATUS_OK, &[1, 2, 3]), 7)
      .unwrap();
    assert_eq!(payload, vec![1, 2, 3]);
  }

  #[test]
  fn test_corrupted_checksum_detected() {
    let mut frame = fake_response(7, STATUS_OK, &[1, 2, 3]);
    frame[3] ^= 0xff;
    assert_eq!(FrameCodec::decode_response(&frame, 7).unwrap_err(),
               BthError::ChecksumMismatch);
  }

  #[test]
  fn test_stale_frame_id_rejected() {
    let frame = fake_response(6, STATUS_OK, &[]);
    assert_eq!(FrameCodec::decode_response(&frame, 7).unwrap_err(),
               BthError::FrameIdMismatch);
  }

  #[test]
  fn test_device_error_status_surfaced() {
    let frame = fake_response(7, 3, &[]);
    assert_eq!(FrameCodec::decode_response(&frame, 7).unwrap_err(),
               BthError::DeviceStatus(3));
  }

  #[test]
  fn test_short_frame_rejected() {
    assert_eq!(FrameCodec::decode_response(&[1, 0], 1).unwrap_err(),
               BthError::ShortFrame);
  }
}
