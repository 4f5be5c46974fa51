//! Serialization/deserialization helpers
//!
//! Fixed-layout little endian encoding with u16 head/tail
//! markers. Used for command frames on the Bluetooth link and
//! for persisting scan configurations in binary form.

// re-export
pub use crate::errors::SerializationError;

/// Convert a vector of u16 into a vector of u8
///
/// Useful when serializing raw sample buffers.
pub fn u16_to_u8(vec_u16 : &[u16]) -> Vec<u8> {
  vec_u16.iter()
    .flat_map(|&n| n.to_le_bytes().to_vec())
    .collect()
}

/// Restore a vector of u16 from a vector of u8
///
/// Two consecutive u8 get interpreted as one (LE) u16.
pub fn u8_to_u16(vec_u8 : &[u8]) -> Vec<u16> {
  vec_u8.chunks_exact(2)
    .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
    .collect()
}

/// Flatten a vector of f64 into a vector of u8 (LE)
pub fn f64_to_u8(vec_f64 : &[f64]) -> Vec<u8> {
  vec_f64.iter()
    .flat_map(|&n| n.to_le_bytes().to_vec())
    .collect()
}

pub fn parse_u8(bs : &[u8], pos : &mut usize) -> u8 {
  let value = bs[*pos];
  *pos += 1;
  value
}

pub fn parse_u16(bs : &[u8], pos : &mut usize) -> u16 {
  let value = u16::from_le_bytes([bs[*pos], bs[*pos+1]]);
  *pos += 2;
  value
}

pub fn parse_u32(bs : &[u8], pos : &mut usize) -> u32 {
  let value = u32::from_le_bytes([bs[*pos],   bs[*pos+1],
                                  bs[*pos+2], bs[*pos+3]]);
  *pos += 4;
  value
}

pub fn parse_f32(bs : &[u8], pos : &mut usize) -> f32 {
  let value = f32::from_le_bytes([bs[*pos],   bs[*pos+1],
                                  bs[*pos+2], bs[*pos+3]]);
  *pos += 4;
  value
}

pub fn parse_f64(bs : &[u8], pos : &mut usize) -> f64 {
  let value = f64::from_le_bytes([bs[*pos],   bs[*pos+1],
                                  bs[*pos+2], bs[*pos+3],
                                  bs[*pos+4], bs[*pos+5],
                                  bs[*pos+6], bs[*pos+7]]);
  *pos += 8;
  value
}

pub fn parse_bool(bs : &[u8], pos : &mut usize) -> bool {
  let value = bs[*pos];
  *pos += 1;
  value > 0
}

/// Encode/decode structs to Vec::<u8> to persist them or send
/// them over the Bluetooth link
pub trait Serialization {

  const HEAD : u16;
  const TAIL : u16;
  /// Serialized size in bytes INCLUDING the 4 bytes for head
  /// and tail markers. 0 for variable sized structs.
  const SIZE : usize = 0;

  /// Decode a serializable from a bytestream
  fn from_bytestream(bytestream : &[u8],
                     pos        : &mut usize)
    -> Result<Self, SerializationError>
    where Self : Sized;

  /// Encode a serializable to a bytestream
  fn to_bytestream(&self) -> Vec<u8>;
}

/// Search for a certain marker of type `u16` in a bytestream
pub fn search_for_u16(number : u16, bytestream : &[u8], start_pos : usize)
  -> Result<usize, SerializationError> {
  if bytestream.len() < 2 {
    error!("Stream empty or too short!");
    return Err(SerializationError::StreamTooShort);
  }
  if start_pos > bytestream.len() - 2 {
    error!("Start position {} beyond stream capacity {}!", start_pos, bytestream.len() - 2);
    return Err(SerializationError::StreamTooShort);
  }
  for n in start_pos..bytestream.len() - 1 {
    let two_bytes = [bytestream[n], bytestream[n + 1]];
    if u16::from_le_bytes(two_bytes) == number {
      trace!("Found {number} at {n}");
      return Ok(n);
    }
  }
  warn!("Can not find {} in bytestream [{}:{}]!", number, start_pos, bytestream.len());
  Err(SerializationError::ValueNotFound)
}

#[cfg(test)]
mod test_serialization {
  use crate::serialization::{search_for_u16,
                             f64_to_u8,
                             u16_to_u8,
                             u8_to_u16,
                             parse_u16,
                             parse_f32};

  #[test]
  fn test_u16_to_u8_size_doubled() {
    let size = 1000usize;
    let data = vec![42u16;size];
    let data_u8 = u16_to_u8(data.as_slice());
    assert_eq!(data_u8.len(), 2*size);
    let restored = u8_to_u16(data_u8.as_slice());
    assert_eq!(restored, data);
  }

  #[test]
  fn test_f64_to_u8_le_layout() {
    let data = vec![1.5f64, -2.0];
    let bytes = f64_to_u8(&data);
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[0..8], &1.5f64.to_le_bytes());
    assert_eq!(&bytes[8..16], &(-2.0f64).to_le_bytes());
  }

  #[test]
  fn test_search_for_2_bytemarker() {
    let mut bytestream = vec![1,2,3,0xAA, 0xAA, 5, 7];
    let mut pos = search_for_u16(0xAAAA, &bytestream, 0).unwrap();
    assert_eq!(pos, 3);

    bytestream = vec![0xaa,0xaa,3,244, 16, 32, 0xAA, 0xFF, 5, 7];
    pos = search_for_u16(0xaaaa, &bytestream, 0).unwrap();
    assert_eq!(pos, 0);

    bytestream = vec![1,2,3];
    assert!(search_for_u16(0xaaaa, &bytestream, 0).is_err());
  }

  #[test]
  fn test_parse_helpers_advance_pos() {
    let mut bs = Vec::<u8>::new();
    bs.extend_from_slice(&4711u16.to_le_bytes());
    bs.extend_from_slice(&(-1.5f32).to_le_bytes());
    let mut pos = 0usize;
    assert_eq!(parse_u16(&bs, &mut pos), 4711);
    assert_eq!(parse_f32(&bs, &mut pos), -1.5);
    assert_eq!(pos, 6);
  }
}
