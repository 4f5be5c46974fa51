//! The daemon's worker threads

pub mod cmd_responder;
pub mod irq_service;
pub mod runner;

pub use cmd_responder::cmd_responder;
pub use irq_service::irq_service;
pub use runner::runner;
