//! Session management
//!
//! Page lifecycle around a collection run.

pub mod page;

pub use page::PageSession;
