//! Interrupt service thread
//!
//! Stands in for the hardware interrupt line: polls the
//! latched status register at a fixed cadence and runs the
//! service body whenever there is work. The cadence bounds
//! the service latency, at 200 kHz aggregate rate the FIFO
//! takes ~1.3 ms from half-full to overrun, so we poll well
//! below that.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::board::Board;
use crate::irq::{service_interrupt,
                 IrqAck};
use crate::memory::RegWindow;
use crate::registers::{ADHFI,
                       ADNE,
                       EOAI,
                       IRQ_REG,
                       LADFUL};

/// Poll cadence of the service loop
pub const SERVICE_INTERVAL : Duration = Duration::from_micros(500);

/// Run the interrupt service loop until the shutdown channel
/// fires.
pub fn irq_service(board    : Arc<Board>,
                   shutdown : Receiver<bool>) {
  info!("Interrupt service thread started");
  loop {
    if let Ok(_) = shutdown.try_recv() {
      info!("Interrupt service thread shutting down");
      break;
    }
    // service only when the board actually asserted a
    // condition, a bare poll is not an interrupt
    let pending = {
      let mut state = board.state.lock().unwrap();
      state.scan.is_active()
        && match state.bus.read(RegWindow::Control, IRQ_REG) {
             Ok(status) => status & (LADFUL | EOAI | ADHFI | ADNE) != 0,
             Err(_)     => false,
           }
    };
    if pending {
      match service_interrupt(&board) {
        Ok(IrqAck::Spurious) => (),
        Ok(ack)  => {
          trace!("Service pass: {:?}", ack);
        }
        Err(err) => {
          error!("Interrupt service failed! {}", err);
        }
      }
    }
    thread::sleep(SERVICE_INTERVAL);
  }
}
