//! Run control thread
//!
//! Waits for scan configurations, walks each one through
//! configure/arm/start, pumps the drained samples out to the
//! sink channel and resets the board once the scan finished.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver,
                        Sender};
use indicatif::{ProgressBar,
                ProgressStyle};

use das_dataclasses::config::ScanConfig;

use crate::api::{read_samples,
                 ReadOutcome};
use crate::board::Board;
use crate::scan;

/// How long one blocking read waits before the loop checks
/// for shutdown again
pub const READ_TIMEOUT : Duration = Duration::from_millis(250);

/// Batch size of one read
pub const READ_CHUNK : usize = 256;

fn progress_for(cfg : &ScanConfig, show : bool) -> ProgressBar {
  if !show || cfg.count == 0 {
    return ProgressBar::hidden();
  }
  let bar = ProgressBar::new(cfg.count as u64);
  bar.set_style(ProgressStyle::with_template(
    "acquiring {bar:40.green/grey} {pos}/{len} samples")
    .unwrap_or(ProgressStyle::default_bar()));
  bar
}

/// Run scans until the shutdown channel fires.
pub fn runner(board         : Arc<Board>,
              configs       : Receiver<ScanConfig>,
              sample_sink   : Sender<Vec<f64>>,
              shutdown      : Receiver<bool>,
              show_progress : bool) {
  info!("Runner thread started");
  'main : loop {
    if let Ok(_) = shutdown.try_recv() {
      break;
    }
    let cfg = match configs.recv_timeout(READ_TIMEOUT) {
      Ok(cfg) => cfg,
      Err(_)  => continue,
    };
    let latched = match scan::configure(&board, &cfg) {
      Ok(latched) => latched,
      Err(err) => {
        error!("Can not configure scan! {}", err);
        continue;
      }
    };
    if let Err(err) = scan::arm(&board).and_then(|_| scan::start(&board)) {
      error!("Can not start scan! {}", err);
      continue;
    }
    info!("Scan started: {}", latched);
    let bar = progress_for(&latched, show_progress);
    loop {
      if let Ok(_) = shutdown.try_recv() {
        if let Err(err) = scan::stop(&board) {
          error!("Can not stop scan on shutdown! {}", err);
        }
        bar.abandon();
        break 'main;
      }
      match read_samples(&board, READ_CHUNK, READ_TIMEOUT) {
        Ok(ReadOutcome::Samples(samples)) => {
          bar.inc(samples.len() as u64);
          if sample_sink.send(samples).is_err() {
            warn!("Sample sink closed, stopping scan");
            break;
          }
        }
        Ok(ReadOutcome::EndOfScan(samples)) => {
          bar.inc(samples.len() as u64);
          if !samples.is_empty() {
            if sample_sink.send(samples).is_err() {
              warn!("Sample sink closed");
            }
          }
          bar.finish();
          info!("Scan complete");
          break;
        }
        Ok(ReadOutcome::Overrun) => {
          bar.abandon();
          error!("Scan lost to a FIFO overrun!");
          break;
        }
        Ok(ReadOutcome::Timeout) => (),
        Err(err) => {
          error!("Sample read failed! {}", err);
          break;
        }
      }
    }
    if let Err(err) = scan::reset(&board) {
      error!("Can not reset board after scan! {}", err);
    }
  }
  info!("Runner thread shutting down");
}
