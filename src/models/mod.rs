//! Media Doctor Models
//!
//! Data structures for the activity log, payment ledger, ads and media.

pub mod activity;
pub mod ad;
pub mod media;
pub mod payment;

pub use activity::*;
pub use ad::*;
pub use media::*;
pub use payment::*;
