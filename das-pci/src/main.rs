//! Acquisition daemon for the PCI attached DAS boards
//!
//! Maps the board, spawns the interrupt service and run
//! control threads and streams acquired samples to disk.
//! With --simulate the daemon runs against the simulated
//! board instead of mapped hardware, feeding it a synthetic
//! ramp at the configured pacer rate.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool,
                        Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use crossbeam_channel::unbounded;

#[macro_use] extern crate log;

use das_dataclasses::calibrations::CalibrationTable;
use das_dataclasses::config::ScanConfig;
use das_dataclasses::serialization::f64_to_u8;

use das_pci::board::Board;
use das_pci::control;
use das_pci::memory::MmioWindows;
use das_pci::registers::EOAI;
use das_pci::sim::SimBus;
use das_pci::threads::{irq_service,
                       runner};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// sysfs path of the board, e.g.
  /// /sys/bus/pci/devices/0000:03:00.0
  #[arg(short, long, default_value_t = String::from(""))]
  device : String,
  /// Run against the simulated board instead of hardware
  #[arg(long, default_value_t = false)]
  simulate : bool,
  /// Scan configuration (json)
  #[arg(short, long)]
  config : PathBuf,
  /// Calibration coefficient block as read from NVRAM.
  /// Without it samples pass through uncorrected.
  #[arg(long)]
  calibration : Option<PathBuf>,
  /// Write corrected samples to this file (LE f64)
  #[arg(short, long, default_value = "samples.dat")]
  output : PathBuf,
  /// Show a progress bar while acquiring
  #[arg(long, default_value_t = false)]
  show_progress : bool,
}

fn main() {
  env_logger::init();
  let args = Args::parse();

  println!("{}", "**********************************".bright_blue().bold());
  println!("{}", "*  DAS acquisition daemon (PCI)  *".bright_blue().bold());
  println!("{}", "**********************************".bright_blue().bold());

  let cfg = match ScanConfig::from_file(&args.config) {
    Ok(cfg)  => cfg,
    Err(err) => {
      error!("Can not load scan config! {}", err);
      std::process::exit(1);
    }
  };

  let sim_handle : Option<SimBus>;
  let board = if args.simulate {
    let sim = SimBus::new();
    sim_handle = Some(sim.clone());
    info!("Running against the simulated board");
    Arc::new(Board::new(Box::new(sim)))
  }
  else {
    if args.device.is_empty() {
      error!("Either --device or --simulate is required!");
      std::process::exit(1);
    }
    sim_handle = None;
    match MmioWindows::for_device(&args.device) {
      Ok(windows) => Arc::new(Board::new(Box::new(windows))),
      Err(err) => {
        error!("Can not map {}! {}", args.device, err);
        std::process::exit(1);
      }
    }
  };
  if let Err(err) = control::init_board(&board) {
    error!("Can not initialize board! {}", err);
    std::process::exit(1);
  }
  if let Some(path) = &args.calibration {
    let table = std::fs::read(path)
      .map_err(|err| err.to_string())
      .and_then(|block| CalibrationTable::from_coefficient_block(&block)
                        .map_err(|err| err.to_string()));
    match table {
      Ok(table) => board.install_calibration(table),
      Err(err)  => {
        error!("Can not load calibration from {}! {}", path.display(), err);
        std::process::exit(1);
      }
    }
  }
  let terminate = Arc::new(AtomicBool::new(false));
  for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
    if let Err(err) = signal_hook::flag::register(sig, Arc::clone(&terminate)) {
      error!("Can not register signal handler! {}", err);
    }
  }

  let (cfg_tx, cfg_rx)       = unbounded::<ScanConfig>();
  let (sample_tx, sample_rx) = unbounded::<Vec<f64>>();
  let (stop_irq_tx, stop_irq_rx) = unbounded::<bool>();
  let (stop_run_tx, stop_run_rx) = unbounded::<bool>();

  let irq_board = Arc::clone(&board);
  let irq_thread = thread::Builder::new()
    .name("irq-service".to_string())
    .spawn(move || { irq_service(irq_board, stop_irq_rx); })
    .expect("can not spawn irq service thread");

  let run_board = Arc::clone(&board);
  let show = args.show_progress;
  let run_thread = thread::Builder::new()
    .name("runner".to_string())
    .spawn(move || { runner(run_board, cfg_rx, sample_tx, stop_run_rx, show); })
    .expect("can not spawn runner thread");

  // with the simulated board, feed the FIFO a ramp at the
  // configured rate and end the scan like the pacer would
  if let Some(sim) = sim_handle {
    let total    = cfg.count;
    let pacer_hz = cfg.pacer_hz.max(1);
    thread::spawn(move || {
      let mut produced = 0u32;
      let chunk = 32u32;
      loop {
        if total != 0 && produced >= total {
          sim.latch(EOAI);
          break;
        }
        let samples : Vec<u16> = (produced..produced + chunk)
          .map(|n| (n & 0xffff) as u16)
          .collect();
        sim.push_samples(&samples);
        produced += chunk;
        thread::sleep(Duration::from_micros(1_000_000 * chunk as u64 / pacer_hz as u64));
      }
    });
  }

  if let Err(err) = cfg_tx.send(cfg) {
    error!("Can not dispatch scan config! {}", err);
  }

  let mut out = match File::create(&args.output) {
    Ok(f)    => f,
    Err(err) => {
      error!("Can not open {}! {}", args.output.display(), err);
      std::process::exit(1);
    }
  };
  let mut written = 0usize;
  loop {
    if terminate.load(Ordering::Relaxed) {
      println!("{}", "Received termination request!".red().bold());
      break;
    }
    match sample_rx.recv_timeout(Duration::from_millis(250)) {
      Ok(samples) => {
        written += samples.len();
        if let Err(err) = out.write_all(&f64_to_u8(&samples)) {
          error!("Can not write samples! {}", err);
          break;
        }
      }
      Err(_) => {
        // runner went idle after a bounded scan finished
        if cfg.count != 0 && written >= cfg.count as usize {
          break;
        }
      }
    }
  }
  info!("Wrote {} samples to {}", written, args.output.display());

  stop_run_tx.send(true).ok();
  stop_irq_tx.send(true).ok();
  run_thread.join().ok();
  irq_thread.join().ok();
  println!("{}", "Shutdown complete, goodbye!".green().bold());
}
