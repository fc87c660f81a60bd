//! Writing, reading and delivering 10Q collection transaction files for
//! Prisme, including the legal due date rules the files depend on, plus the
//! G68 payout and G69 posting interfaces.

#[cfg(test)]
mod testutil;

pub mod batch;
pub mod config;
pub mod dates;
pub mod encoding;
pub mod filespec;
pub mod prisme;
pub mod tenq;
pub mod transport;
