//! Mapped register access for the BAR windows
//!
//! The five BAR windows of the board get mapped through the
//! sysfs resource files. All register traffic funnels through
//! the RegisterBus trait so the acquisition engine stays
//! agnostic of whether it talks to mapped hardware or to the
//! simulated board used in the tests.

extern crate memmap;

use std::error::Error;
use std::fmt;
use std::fs::OpenOptions;
use std::ptr;

use memmap::MmapMut;

/// Length mapped per BAR window. The real windows are
/// smaller, one page is the mmap granularity anyway.
pub const WINDOW_LEN : usize = 4096;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RegisterError {
  MMapFail,
  AddressOutOfRange,
  Unknown,
}

impl fmt::Display for RegisterError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let etype = match self {
      RegisterError::MMapFail          => "MMapFail",
      RegisterError::AddressOutOfRange => "AddressOutOfRange",
      RegisterError::Unknown           => "Unknown",
    };
    write!(f, "<RegisterError: {}>", etype)
  }
}

impl Error for RegisterError {
}

/// The five BAR windows of the board
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RegWindow {
  /// AMCC PCI controller
  Amcc,
  /// IRQ/mux/trigger/calibrate/DAC control block
  Control,
  /// ADC data FIFO
  AdcData,
  /// 8254 cascades and 8255 DIO
  Counter,
  /// DAC data FIFO
  DacData,
}

impl RegWindow {
  pub fn index(&self) -> usize {
    match self {
      RegWindow::Amcc    => 0,
      RegWindow::Control => 1,
      RegWindow::AdcData => 2,
      RegWindow::Counter => 3,
      RegWindow::DacData => 4,
    }
  }
}

/// Word/byte access to the board registers.
///
/// Reads take &mut self since reading can have side effects
/// on real hardware (popping the ADC FIFO, clearing latches).
pub trait RegisterBus : Send {
  fn read(&mut self,  window : RegWindow, addr : u32) -> Result<u16, RegisterError>;
  fn write(&mut self, window : RegWindow, addr : u32, value : u16) -> Result<(), RegisterError>;
  fn read_byte(&mut self,  window : RegWindow, addr : u32) -> Result<u8, RegisterError>;
  fn write_byte(&mut self, window : RegWindow, addr : u32, value : u8) -> Result<(), RegisterError>;
  fn write_dword(&mut self, window : RegWindow, addr : u32, value : u32) -> Result<(), RegisterError>;
}

/// The BAR windows of one physical board, mapped r/w.
pub struct MmioWindows {
  maps : [MmapMut; 5],
}

impl MmioWindows {

  /// Map all five windows from the sysfs resource files of
  /// the given PCI device, e.g.
  /// /sys/bus/pci/devices/0000:03:00.0/resource0 .. resource4
  pub fn for_device(sysfs_path : &str) -> Result<MmioWindows, Box<dyn Error>> {
    let mut maps = Vec::<MmapMut>::with_capacity(5);
    for bar in 0..5 {
      let path = format!("{}/resource{}", sysfs_path, bar);
      let file = OpenOptions::new()
                 .read(true)
                 .write(true)
                 .open(&path)?;
      let map  = unsafe {
        memmap::MmapOptions::new()
          .len(WINDOW_LEN)
          .map_mut(&file)?
      };
      debug!("Mapped {} ({} bytes)", path, WINDOW_LEN);
      maps.push(map);
    }
    let maps : [MmapMut; 5] = maps.try_into()
      .map_err(|_| RegisterError::MMapFail)?;
    info!("Mapped all BAR windows of {}", sysfs_path);
    Ok(MmioWindows { maps })
  }

  fn slot(&mut self, window : RegWindow, addr : u32, width : usize)
    -> Result<*mut u8, RegisterError> {
    if addr as usize + width > WINDOW_LEN {
      error!("Address {:x} beyond window {:?}!", addr, window);
      return Err(RegisterError::AddressOutOfRange);
    }
    let base = self.maps[window.index()].as_mut_ptr();
    Ok(unsafe { base.add(addr as usize) })
  }
}

impl RegisterBus for MmioWindows {

  fn read(&mut self, window : RegWindow, addr : u32) -> Result<u16, RegisterError> {
    let p = self.slot(window, addr, 2)?;
    Ok(unsafe { ptr::read_volatile(p as *mut u16) })
  }

  fn write(&mut self, window : RegWindow, addr : u32, value : u16) -> Result<(), RegisterError> {
    let p = self.slot(window, addr, 2)?;
    unsafe { ptr::write_volatile(p as *mut u16, value); }
    Ok(())
  }

  fn read_byte(&mut self, window : RegWindow, addr : u32) -> Result<u8, RegisterError> {
    let p = self.slot(window, addr, 1)?;
    Ok(unsafe { ptr::read_volatile(p) })
  }

  fn write_byte(&mut self, window : RegWindow, addr : u32, value : u8) -> Result<(), RegisterError> {
    let p = self.slot(window, addr, 1)?;
    unsafe { ptr::write_volatile(p, value); }
    Ok(())
  }

  fn write_dword(&mut self, window : RegWindow, addr : u32, value : u32) -> Result<(), RegisterError> {
    let p = self.slot(window, addr, 4)?;
    unsafe { ptr::write_volatile(p as *mut u32, value); }
    Ok(())
  }
}
