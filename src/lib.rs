//! Serial sensor logger.
//!
//! Bytes from a serial device are assembled into newline-delimited numeric
//! readings ([`sensors`]), every reading is appended to a plain-text raw log,
//! hourly and daily averages are rolled up as the wall clock crosses hour and
//! day boundaries, and all logs are periodically pruned by record age
//! ([`storage`]). [`sampling`] ties it together in a single-threaded polling
//! loop.

pub mod clock;
pub mod config;
pub mod sampling;
pub mod sensors;
pub mod storage;
