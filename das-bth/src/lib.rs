//! Command dispatcher for the Bluetooth attached DAS boards
//!
//! These boards run the acquisition engine in firmware; the
//! host side frames commands over a serial-profile link and
//! interprets the replies. The link itself (rfcomm socket,
//! serial port, a loopback in the tests) stays behind the
//! Transport trait.

pub mod api;
pub mod transport;

#[macro_use] extern crate log;
