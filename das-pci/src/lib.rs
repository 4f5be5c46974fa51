//! Acquisition engine for the PCI attached DAS boards
//!
//! The engine drives the board through five mapped BAR
//! windows: paced analog input scans through the onboard
//! FIFO, single conversions, the two DAC outputs and the
//! 8255 digital ports. All register traffic goes through the
//! RegisterBus seam, so the whole engine runs unmodified
//! against the simulated board in the tests.

pub mod api;
pub mod board;
pub mod control;
pub mod irq;
pub mod memory;
pub mod pacer;
pub mod registers;
pub mod scan;
pub mod sim;
pub mod threads;

extern crate crossbeam_channel;

#[macro_use] extern crate log;
