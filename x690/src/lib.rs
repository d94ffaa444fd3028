//! X.690 BER/DER codec - main entry point
//!
//! Re-exports the public surface of the member crates: the value datatypes
//! and error taxonomy from `x690-core` and the codec (decoder, node model,
//! streaming generators, lazy parsers) from `x690-ber`.

pub use x690_core::{Asn1Error, Asn1Integer, Asn1Result, BitString, ObjectIdentifier, OidRegistry};

pub use x690_ber::{
    decode, decode_stream, dump, dump_with_registry, open_sequence_parser, open_set_parser,
    ApplicationSpecific, Asn1Node, Asn1Reader, Asn1SequenceParser, Asn1SetParser,
    Asn1StreamParser, BerOctetStringGenerator, BerSequenceGenerator, ConstructedOctetStream,
    DerEncoder, DerSequenceGenerator, LazyTagged, LazyValue, Length, OctetWriter, ReaderStack,
    Tag, TagClass, TaggedPayload, TaggedValue,
};
