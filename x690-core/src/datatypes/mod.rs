//! Value datatypes wrapped by the ASN.1 node model
//!
//! These are plain data containers with their representation invariants;
//! the wire encoding rules for them live in the codec crate.

pub mod bit_string;
pub mod integer;
pub mod object_identifier;

pub use bit_string::BitString;
pub use integer::Asn1Integer;
pub use object_identifier::ObjectIdentifier;
