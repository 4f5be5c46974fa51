//! Command responder thread
//!
//! Decodes framed commands arriving as raw bytestreams,
//! executes them against the board registry and ships the
//! reply value (or error) back.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver,
                        Sender};

use das_dataclasses::commands::CommandFrame;
use das_dataclasses::errors::DaqError;
use das_dataclasses::serialization::Serialization;

use crate::api::execute;
use crate::board::Registry;

/// Outcome of one executed command frame
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CommandReply {
  pub frame  : CommandFrame,
  pub result : Result<u32, DaqError>,
}

const RECV_TIMEOUT : Duration = Duration::from_millis(250);

/// Serve commands until the shutdown channel fires.
pub fn cmd_responder(registry : Arc<Registry>,
                     frames   : Receiver<Vec<u8>>,
                     replies  : Sender<CommandReply>,
                     shutdown : Receiver<bool>) {
  info!("Command responder started");
  loop {
    if let Ok(_) = shutdown.try_recv() {
      info!("Command responder shutting down");
      break;
    }
    let bytes = match frames.recv_timeout(RECV_TIMEOUT) {
      Ok(bytes) => bytes,
      Err(_)    => continue,
    };
    let mut pos = 0;
    let frame = match CommandFrame::from_bytestream(&bytes, &mut pos) {
      Ok(frame) => frame,
      Err(err)  => {
        error!("Received garbled command frame! {}", err);
        continue;
      }
    };
    let result = execute(&registry, &frame);
    match &result {
      Ok(value) => debug!("{} -> {}", frame, value),
      Err(err)  => warn!("{} failed! {}", frame, err),
    }
    if replies.send(CommandReply { frame, result }).is_err() {
      warn!("Reply channel closed, shutting down");
      break;
    }
  }
}

#[cfg(test)]
mod test_cmd_responder {
  use super::*;
  use std::thread;

  use crossbeam_channel::unbounded;

  use das_dataclasses::commands::BoardCommand;

  use crate::board::Board;
  use crate::sim::SimBus;

  #[test]
  fn test_responder_executes_and_replies() {
    let mut registry = Registry::new();
    registry.attach(Board::new(Box::new(SimBus::new())));
    let registry = Arc::new(registry);
    let (frame_tx, frame_rx)   = unbounded::<Vec<u8>>();
    let (reply_tx, reply_rx)   = unbounded::<CommandReply>();
    let (stop_tx, stop_rx)     = unbounded::<bool>();
    let handle = thread::spawn(move || {
      cmd_responder(registry, frame_rx, reply_tx, stop_rx);
    });
    let frame = CommandFrame::new(0, &BoardCommand::AdcSetPacerFreq(2000)).unwrap();
    frame_tx.send(frame.to_bytestream()).unwrap();
    let reply = reply_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(reply.frame, frame);
    assert_eq!(reply.result, Ok(2000));
    stop_tx.send(true).unwrap();
    handle.join().unwrap();
  }
}
