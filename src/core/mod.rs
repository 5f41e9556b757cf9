//! Core engine: tickers, dispatch workers, result observers and status server

pub mod http;
pub mod observer;
pub mod runtime;
pub mod scheduler;

pub use observer::{spawn_observers, OutcomeTotals, TotalsSnapshot};
pub use runtime::{DispatchConfig, WorkerPool};
pub use scheduler::{JobScheduler, TickerKind};
