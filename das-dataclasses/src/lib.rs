//! Shared dataclasses for the DAS board family
//!
//! Everything in here is transport agnostic. Both the PCI
//! driver (das-pci) and the Bluetooth attached variants
//! (das-bth) pull their command codes, calibration handling,
//! error taxonomy and serialization helpers from this crate.

pub mod calibrations;
pub mod commands;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gains;
pub mod serialization;

#[macro_use] extern crate log;
