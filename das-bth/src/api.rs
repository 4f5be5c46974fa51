//! The device handle for Bluetooth attached boards
//!
//! Every operation is one frame exchange. The firmware owns
//! the acquisition engine, so scans are started and stopped
//! by command and the host mostly interprets replies:
//! status words, version numbers, raw samples and the
//! persisted calibration block.

use std::time::Duration;

use das_dataclasses::calibrations::{CalibrationTable,
                                    COEFF_BLOCK_SIZE};
use das_dataclasses::config::ScanConfig;
use das_dataclasses::constants::Wiring;
use das_dataclasses::gains::Gain;
use das_dataclasses::serialization::{parse_u16,
                                     Serialization};

use crate::transport::{BthError,
                       FrameCodec,
                       Transport};

// command bytes understood by the firmware
pub const CMD_DIN             : u8 = 0x01;
pub const CMD_DOUT            : u8 = 0x02;
pub const CMD_AIN             : u8 = 0x10;
pub const CMD_AIN_SCAN_START  : u8 = 0x11;
pub const CMD_AIN_SCAN_STOP   : u8 = 0x12;
pub const CMD_AIN_SCAN_CLEAR  : u8 = 0x15;
pub const CMD_CAL_MEM_READ    : u8 = 0x30;
pub const CMD_BLINK_LED       : u8 = 0x41;
pub const CMD_RESET           : u8 = 0x42;
pub const CMD_STATUS          : u8 = 0x44;
pub const CMD_SERIAL          : u8 = 0x48;
pub const CMD_FIRMWARE_VER    : u8 = 0x49;
pub const CMD_RADIO_VER       : u8 = 0x4a;

/// Calibration memory reads are chunked to keep frames small
const CAL_CHUNK : usize = 32;

/// Default reply deadline. Radio links are slow, a missed
/// deadline is reported as None, never as an error.
pub const DEFAULT_TIMEOUT : Duration = Duration::from_millis(1000);

pub struct BthDevice<T : Transport> {
  transport : T,
  codec     : FrameCodec,
  timeout   : Duration,
  pub calib : CalibrationTable,
}

impl<T : Transport> BthDevice<T> {

  pub fn new(transport : T) -> BthDevice<T> {
    BthDevice {
      transport : transport,
      codec     : FrameCodec::new(),
      timeout   : DEFAULT_TIMEOUT,
      calib     : CalibrationTable::new(),
    }
  }

  pub fn set_timeout(&mut self, timeout : Duration) {
    self.timeout = timeout;
  }

  /// One request/response exchange. None means the device
  /// did not answer within the deadline.
  fn transact(&mut self, command : u8, data : &[u8])
    -> Result<Option<Vec<u8>>, BthError> {
    let (id, frame) = self.codec.encode_request(command, data);
    self.transport.send(&frame)?;
    match self.transport.receive(self.timeout)? {
      None      => {
        debug!("Command {:#04x} timed out", command);
        Ok(None)
      }
      Some(raw) => Ok(Some(FrameCodec::decode_response(&raw, id)?)),
    }
  }

  fn expect_u16(payload : Vec<u8>) -> Result<u16, BthError> {
    if payload.len() < 2 {
      return Err(BthError::ShortFrame);
    }
    let mut pos = 0;
    Ok(parse_u16(&payload, &mut pos))
  }

  pub fn status(&mut self) -> Result<Option<u16>, BthError> {
    match self.transact(CMD_STATUS, &[])? {
      None          => Ok(None),
      Some(payload) => Ok(Some(Self::expect_u16(payload)?)),
    }
  }

  pub fn firmware_version(&mut self) -> Result<Option<u16>, BthError> {
    match self.transact(CMD_FIRMWARE_VER, &[])? {
      None          => Ok(None),
      Some(payload) => Ok(Some(Self::expect_u16(payload)?)),
    }
  }

  pub fn radio_version(&mut self) -> Result<Option<u16>, BthError> {
    match self.transact(CMD_RADIO_VER, &[])? {
      None          => Ok(None),
      Some(payload) => Ok(Some(Self::expect_u16(payload)?)),
    }
  }

  pub fn serial_number(&mut self) -> Result<Option<String>, BthError> {
    match self.transact(CMD_SERIAL, &[])? {
      None          => Ok(None),
      Some(payload) => {
        Ok(Some(String::from_utf8_lossy(&payload).trim_end_matches('\0').to_string()))
      }
    }
  }

  pub fn blink(&mut self, count : u8) -> Result<Option<()>, BthError> {
    Ok(self.transact(CMD_BLINK_LED, &[count])?.map(|_| ()))
  }

  pub fn reset(&mut self) -> Result<Option<()>, BthError> {
    Ok(self.transact(CMD_RESET, &[])?.map(|_| ()))
  }

  /// One conversion, raw 12/16 bit sample
  pub fn ain(&mut self, channel : u8, gain : Gain, wiring : Wiring)
    -> Result<Option<u16>, BthError> {
    let mode = match wiring {
      Wiring::Differential => 0u8,
      Wiring::SingleEnded  => 1u8,
    };
    let data = [channel, gain.table_index() as u8, mode];
    match self.transact(CMD_AIN, &data)? {
      None          => Ok(None),
      Some(payload) => Ok(Some(Self::expect_u16(payload)?)),
    }
  }

  /// One conversion with the calibration correction applied
  pub fn ain_corrected(&mut self, channel : u8, gain : Gain, wiring : Wiring)
    -> Result<Option<f64>, BthError> {
    match self.ain(channel, gain, wiring)? {
      None      => Ok(None),
      Some(raw) => {
        Ok(Some(self.calib.correct(raw, gain, channel as usize, wiring)))
      }
    }
  }

  /// Hand a scan configuration to the firmware and start the
  /// paced acquisition there.
  pub fn ain_scan_start(&mut self, cfg : &ScanConfig) -> Result<Option<()>, BthError> {
    Ok(self.transact(CMD_AIN_SCAN_START, &cfg.to_bytestream())?.map(|_| ()))
  }

  pub fn ain_scan_stop(&mut self) -> Result<Option<()>, BthError> {
    Ok(self.transact(CMD_AIN_SCAN_STOP, &[])?.map(|_| ()))
  }

  pub fn ain_scan_clear_fifo(&mut self) -> Result<Option<()>, BthError> {
    Ok(self.transact(CMD_AIN_SCAN_CLEAR, &[])?.map(|_| ()))
  }

  pub fn din(&mut self, port : u8) -> Result<Option<u8>, BthError> {
    match self.transact(CMD_DIN, &[port])? {
      None          => Ok(None),
      Some(payload) => {
        payload.first().copied().map(Some).ok_or(BthError::ShortFrame)
      }
    }
  }

  pub fn dout(&mut self, port : u8, value : u8) -> Result<Option<()>, BthError> {
    Ok(self.transact(CMD_DOUT, &[port, value])?.map(|_| ()))
  }

  /// Download the persisted coefficient block chunk by chunk
  /// and install the parsed table on this handle.
  ///
  /// A timeout mid-download leaves the previous table in
  /// place.
  pub fn load_calibration(&mut self) -> Result<Option<CalibrationTable>, BthError> {
    let mut block = Vec::<u8>::with_capacity(COEFF_BLOCK_SIZE);
    while block.len() < COEFF_BLOCK_SIZE {
      let addr  = block.len() as u16;
      let count = CAL_CHUNK.min(COEFF_BLOCK_SIZE - block.len()) as u8;
      let data  = [(addr & 0xff) as u8, (addr >> 8) as u8, count];
      match self.transact(CMD_CAL_MEM_READ, &data)? {
        None          => return Ok(None),
        Some(payload) => {
          if payload.len() != count as usize {
            return Err(BthError::ShortFrame);
          }
          block.extend_from_slice(&payload);
        }
      }
    }
    let table = CalibrationTable::from_coefficient_block(&block)
      .map_err(|_| BthError::ShortFrame)?;
    self.calib = table;
    info!("Installed calibration table from device memory");
    Ok(Some(table))
  }
}

#[cfg(test)]
mod test_api {
  use super::*;
  use crate::transport::{checksum,
                         STATUS_OK};

  /// Scripted firmware behind a loopback link
  struct MockDevice {
    reply        : Option<Vec<u8>>,
    dio          : [u8; 3],
    cal_block    : Vec<u8>,
    drop_replies : bool,
    corrupt      : bool,
  }

  impl MockDevice {
    fn new() -> MockDevice {
      let mut table = CalibrationTable::new();
      table.slopes_se [0][0] = 2.0;
      table.offsets_se[0][0] = -100.0;
      MockDevice {
        reply        : None,
        dio          : [0; 3],
        cal_block    : table.to_coefficient_block(),
        drop_replies : false,
        corrupt      : false,
      }
    }

    fn respond(&self, id : u8, data : &[u8]) -> Vec<u8> {
      let mut frame = vec![id, STATUS_OK, data.len() as u8];
      frame.extend_from_slice(data);
      frame.push(checksum(&frame));
      frame
    }
  }

  impl Transport for MockDevice {
    fn send(&mut self, frame : &[u8]) -> Result<(), BthError> {
      assert!(frame.len() >= 4);
      let n = frame.len();
      assert_eq!(checksum(&frame[..n-1]), frame[n-1]);
      let id   = frame[0];
      let cmd  = frame[1];
      let data = &frame[3..n-1];
      let payload : Vec<u8> = match cmd {
        CMD_STATUS       => vec![0x02, 0x01],
        CMD_FIRMWARE_VER => vec![0x23, 0x01],  // 1.23 in BCD
        CMD_RADIO_VER    => vec![0x57, 0x02],
        CMD_SERIAL       => b"01A2B3C4".to_vec(),
        CMD_BLINK_LED | CMD_RESET
        | CMD_AIN_SCAN_START | CMD_AIN_SCAN_STOP
        | CMD_AIN_SCAN_CLEAR => vec![],
        CMD_AIN => {
          // deterministic pseudo sample from the request
          let raw = 0x0800u16 + (data[0] as u16) * 3;
          raw.to_le_bytes().to_vec()
        }
        CMD_DIN  => vec![self.dio[data[0] as usize]],
        CMD_DOUT => {
          self.dio[data[0] as usize] = data[1];
          vec![]
        }
        CMD_CAL_MEM_READ => {
          let addr  = data[0] as usize | ((data[1] as usize) << 8);
          let count = data[2] as usize;
          self.cal_block[addr..addr+count].to_vec()
        }
        _ => panic!("mock got unknown command {:#04x}", cmd),
      };
      if self.drop_replies {
        self.reply = None;
      }
      else {
        let mut frame = self.respond(id, &payload);
        if self.corrupt {
          let n = frame.len();
          frame[n-1] ^= 0xff;
        }
        self.reply = Some(frame);
      }
      Ok(())
    }

    fn receive(&mut self, _timeout : Duration) -> Result<Option<Vec<u8>>, BthError> {
      Ok(self.reply.take())
    }
  }

  #[test]
  fn test_version_queries() {
    let mut dev = BthDevice::new(MockDevice::new());
    assert_eq!(dev.firmware_version().unwrap(), Some(0x0123));
    assert_eq!(dev.radio_version().unwrap(), Some(0x0257));
    assert_eq!(dev.status().unwrap(), Some(0x0102));
    assert_eq!(dev.serial_number().unwrap(), Some(String::from("01A2B3C4")));
  }

  #[test]
  fn test_ain_applies_calibration() {
    let mut dev = BthDevice::new(MockDevice::new());
    dev.load_calibration().unwrap().unwrap();
    let raw = dev.ain(0, Gain::Bip10V, Wiring::SingleEnded).unwrap().unwrap();
    assert_eq!(raw, 0x0800);
    let corrected = dev.ain_corrected(0, Gain::Bip10V, Wiring::SingleEnded)
      .unwrap().unwrap();
    assert_eq!(corrected, (0x0800 as f64 * 2.0 - 100.0).round());
  }

  #[test]
  fn test_dio_roundtrip() {
    let mut dev = BthDevice::new(MockDevice::new());
    dev.dout(1, 0x5a).unwrap().unwrap();
    assert_eq!(dev.din(1).unwrap(), Some(0x5a));
    assert_eq!(dev.din(0).unwrap(), Some(0));
  }

  #[test]
  fn test_scan_commands_acknowledge() {
    let mut dev = BthDevice::new(MockDevice::new());
    let cfg = ScanConfig::new();
    assert_eq!(dev.ain_scan_start(&cfg).unwrap(), Some(()));
    assert_eq!(dev.ain_scan_stop().unwrap(), Some(()));
    assert_eq!(dev.ain_scan_clear_fifo().unwrap(), Some(()));
  }

  #[test]
  fn test_timeout_is_not_an_error() {
    let mut mock = MockDevice::new();
    mock.drop_replies = true;
    let mut dev = BthDevice::new(mock);
    assert_eq!(dev.status().unwrap(), None);
    // a mid-download timeout keeps the old (identity) table
    assert!(dev.load_calibration().unwrap().is_none());
    assert_eq!(dev.calib.slopes_se[0][0], 1.0);
  }

  #[test]
  fn test_corrupted_reply_is_an_error() {
    let mut mock = MockDevice::new();
    mock.corrupt = true;
    let mut dev = BthDevice::new(mock);
    assert_eq!(dev.status().unwrap_err(), BthError::ChecksumMismatch);
  }

  #[test]
  fn test_frame_ids_advance_per_exchange() {
    let mut dev = BthDevice::new(MockDevice::new());
    for _ in 0..300 {
      // crossing the u8 wrap must not confuse the pairing
      assert!(dev.status().unwrap().is_some());
    }
  }
}
