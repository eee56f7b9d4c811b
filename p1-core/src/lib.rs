//! Core types and utilities for DSMR P1 telegram acquisition
//!
//! This crate provides the error type shared by every layer and the OBIS
//! code type used to declare which telegram lines carry which quantity.

pub mod error;
pub mod obis_code;

pub use error::{P1Error, P1Result};
pub use obis_code::ObisCode;
