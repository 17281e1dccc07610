//! Export core modules shared by the client and its CLI.

#[cfg(feature = "excel")]
pub mod excel_core;
