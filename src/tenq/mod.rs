//! The 10Q fixed-width transaction format, used to submit collection
//! transactions to Prisme.

pub mod error;
pub mod layout;
pub mod reader;
pub mod writer;

pub use error::FieldError;
pub use layout::{RecordKind, Slot};
pub use writer::{Transaction, TransactionWriter, TransactionWriterBuilder, LINE_SEPARATOR};
