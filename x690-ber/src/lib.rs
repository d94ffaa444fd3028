//! BER/DER codec for ASN.1 values
//!
//! This crate implements the ITU-T X.690 Basic Encoding Rules and the
//! Distinguished Encoding Rules subset: the tag/length wire codec, a bounded
//! reader chain for definite and indefinite content regions, the in-memory
//! node model, a recursive decoder, streaming generators that emit
//! indefinite-length encodings without buffering full content, and lazy
//! parsers for single-pass traversal of large nested structures.
//!
//! # Usage Example
//!
//! ```rust
//! use x690_ber::decode;
//!
//! let node = decode(&[0x02, 0x02, 0x03, 0xE9])?;
//! assert_eq!(node.as_integer()?.to_i64()?, 1001);
//! assert_eq!(node.encode(), vec![0x02, 0x02, 0x03, 0xE9]);
//! # Ok::<(), x690_ber::Asn1Error>(())
//! ```

pub mod decoder;
pub mod dump;
pub mod encoder;
pub mod generator;
pub mod node;
pub mod parser;
pub mod reader;
pub mod types;

pub use decoder::{decode, decode_stream, Asn1Reader};
pub use dump::{dump, dump_with_registry};
pub use encoder::DerEncoder;
pub use generator::{
    BerOctetStringGenerator, BerSequenceGenerator, DerSequenceGenerator, OctetWriter,
};
pub use node::{ApplicationSpecific, Asn1Node, TaggedPayload, TaggedValue};
pub use parser::{
    open_sequence_parser, open_set_parser, Asn1SequenceParser, Asn1SetParser, Asn1StreamParser,
    ConstructedOctetStream, LazyTagged, LazyValue,
};
pub use reader::ReaderStack;
pub use types::{Length, Tag, TagClass};
pub use x690_core::{Asn1Error, Asn1Integer, Asn1Result, BitString, ObjectIdentifier};
