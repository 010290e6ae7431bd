#![deny(missing_docs)]
//! The two expression sublanguages used by the graph execution engine:
//! JSONata-like for data transformation, JSON-Logic-like for conditional
//! routing, and the four history-access functions shared between them.

pub mod history;
pub mod jsonata;
pub mod jsonlogic;

pub use history::{HistoryView, NoHistory};
