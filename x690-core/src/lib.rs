//! Core types and utilities for X.690 BER/DER processing
//!
//! This crate provides the error taxonomy, the plain value datatypes wrapped
//! by the ASN.1 node model, and the immutable object-identifier name registry
//! used throughout the codec.

pub mod datatypes;
pub mod error;
pub mod oid_registry;

pub use datatypes::{Asn1Integer, BitString, ObjectIdentifier};
pub use error::{Asn1Error, Asn1Result};
pub use oid_registry::OidRegistry;
