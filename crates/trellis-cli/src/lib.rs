//! trellis CLI library.
//!
//! This module exposes the server client, the interactive session machinery
//! and the archive transform used by the `trellis` binary.

pub mod archive;
pub mod client;
pub mod error;
pub mod process;
pub mod resize;
pub mod session;
pub mod terminal;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
