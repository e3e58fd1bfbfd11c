//! Media Doctor Storage
//!
//! Persistence ports with in-process and file-backed implementations.

pub mod activity;
pub mod ad;
mod file;
pub mod option;
pub mod payment;

pub use activity::{ActivityStore, JsonlActivityStore, MemoryActivityStore};
pub use ad::{AdStore, JsonFileAdStore, MemoryAdStore};
pub use option::{JsonFileOptionStore, MemoryOptionStore, OptionStore};
pub use payment::{JsonlPaymentStore, MemoryPaymentStore, PaymentStore};
