//! End-to-end acquisition against the simulated board:
//! the interrupt service thread drains the FIFO while a
//! client blocks on reads, exactly like the daemon wires
//! things up.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;

use das_dataclasses::config::ScanConfig;
use das_dataclasses::constants::{FIFO_SIZE,
                                 MAX_AD_FREQ};
use das_dataclasses::errors::DaqError;

use das_pci::api::{read_samples,
                   status,
                   ReadOutcome};
use das_pci::board::{Board,
                     Subdevice};
use das_pci::control;
use das_pci::registers::EOAI;
use das_pci::scan::{self,
                    ScanState};
use das_pci::sim::SimBus;
use das_pci::threads::irq_service;

fn board_with_service(sim : &SimBus)
  -> (Arc<Board>, crossbeam_channel::Sender<bool>, thread::JoinHandle<()>) {
  let board = Arc::new(Board::new(Box::new(sim.clone())));
  let (stop_tx, stop_rx) = unbounded::<bool>();
  let service_board = Arc::clone(&board);
  let handle = thread::spawn(move || { irq_service(service_board, stop_rx); });
  (board, stop_tx, handle)
}

#[test]
fn bounded_scan_delivers_exactly_requested_count() {
  let sim = SimBus::new();
  let (board, stop, handle) = board_with_service(&sim);

  let mut cfg = ScanConfig::new();
  cfg.chan_hi  = 3;
  cfg.pacer_hz = 10_000;
  cfg.count    = 20;
  scan::configure(&board, &cfg).unwrap();
  scan::arm(&board).unwrap();
  scan::start(&board).unwrap();

  // the "hardware" converts more than requested, the engine
  // must stop at the configured count
  sim.push_samples(&(0..100u16).collect::<Vec<u16>>());

  let mut acquired = Vec::<f64>::new();
  loop {
    match read_samples(&board, 64, Duration::from_secs(5)).unwrap() {
      ReadOutcome::Samples(mut s)   => acquired.append(&mut s),
      ReadOutcome::EndOfScan(mut s) => {
        acquired.append(&mut s);
        break;
      }
      other => panic!("unexpected outcome {:?}", other),
    }
  }
  assert_eq!(acquired, (0..20).map(f64::from).collect::<Vec<f64>>());
  assert_eq!(status(&board).scan_state, ScanState::Stopped);

  stop.send(true).unwrap();
  handle.join().unwrap();
}

#[test]
fn continuous_scan_runs_until_stopped() {
  let sim = SimBus::new();
  let (board, stop, handle) = board_with_service(&sim);

  let cfg = ScanConfig::new();  // count 0 = continuous
  scan::configure(&board, &cfg).unwrap();
  scan::arm(&board).unwrap();
  scan::start(&board).unwrap();

  sim.push_samples(&[11, 22, 33]);
  match read_samples(&board, 16, Duration::from_secs(5)).unwrap() {
    ReadOutcome::Samples(s) => assert_eq!(s, vec![11.0, 22.0, 33.0]),
    other => panic!("unexpected outcome {:?}", other),
  }
  // still running, more samples welcome
  assert_eq!(status(&board).scan_state, ScanState::Running);

  scan::stop(&board).unwrap();
  assert_eq!(read_samples(&board, 16, Duration::from_millis(100)).unwrap(),
             ReadOutcome::EndOfScan(vec![]));

  stop.send(true).unwrap();
  handle.join().unwrap();
}

#[test]
fn overspeed_config_rejected_without_touching_state() {
  let sim   = SimBus::new();
  let board = Board::new(Box::new(sim));
  let mut cfg = ScanConfig::new();
  cfg.pacer_hz = MAX_AD_FREQ + 1;
  assert_eq!(scan::configure(&board, &cfg).unwrap_err(), DaqError::BadSpeed);
  assert_eq!(status(&board).scan_state, ScanState::Idle);
  // the board stays armable with a sane config
  scan::configure(&board, &ScanConfig::new()).unwrap();
  scan::arm(&board).unwrap();
}

#[test]
fn double_open_of_a_channel_is_busy() {
  let sim   = SimBus::new();
  let board = Board::new(Box::new(sim));
  control::open_subdevice(&board, Subdevice::AdcChannel(0)).unwrap();
  assert_eq!(control::open_subdevice(&board, Subdevice::AdcChannel(0)).unwrap_err(),
             DaqError::DeviceBusy);
  // other subdevices are unaffected
  control::open_subdevice(&board, Subdevice::AdcChannel(1)).unwrap();
  control::open_subdevice(&board, Subdevice::DacChannel(0)).unwrap();
}

#[test]
fn overrun_recovery_needs_reset() {
  let sim = SimBus::new();
  let (board, stop, handle) = board_with_service(&sim);

  let cfg = ScanConfig::new();
  scan::configure(&board, &cfg).unwrap();
  scan::arm(&board).unwrap();
  scan::start(&board).unwrap();

  sim.push_samples(&vec![1u16; FIFO_SIZE + 1]);
  assert_eq!(read_samples(&board, 64, Duration::from_secs(5)).unwrap(),
             ReadOutcome::Overrun);
  let stat = status(&board);
  assert_eq!(stat.scan_state, ScanState::Overrun);
  assert_eq!(stat.overruns, 1);

  // arm stays refused until the client acknowledges with reset
  assert_eq!(scan::arm(&board).unwrap_err(), DaqError::FifoOverrun);
  scan::reset(&board).unwrap();
  scan::arm(&board).unwrap();
  scan::start(&board).unwrap();
  sim.push_samples(&[5, 6, 7]);
  sim.latch(EOAI);
  match read_samples(&board, 16, Duration::from_secs(5)).unwrap() {
    ReadOutcome::EndOfScan(s) | ReadOutcome::Samples(s) => assert_eq!(s, vec![5.0, 6.0, 7.0]),
    other => panic!("unexpected outcome {:?}", other),
  }

  stop.send(true).unwrap();
  handle.join().unwrap();
}
