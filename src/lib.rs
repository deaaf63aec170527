//! Chunked signature scanning and artifact extraction over large binary
//! sources. The scanner streams fixed-size windows with a small boundary
//! carry, tracks open carve candidates across windows, and materializes
//! closed carves into validated output files. Companion passes extract
//! printable strings (ASCII / UTF-16LE) and match indicators of compromise
//! in them. Jobs checkpoint after every chunk and can resume mid-source.

pub mod checkpoint;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod evidence;
pub mod events;
pub mod extract;
pub mod ioc;
pub mod job;
pub mod logging;
pub mod registry;
pub mod report;
pub mod scan;
pub mod strings;
pub mod validate;
