//! BER decoder building the in-memory node model
//!
//! One call decodes one top-level value: the tag and length are read through
//! the bounded reader chain, a frame is pushed for the content region, and
//! the matching node variant is built, recursing for constructed values.
//! Unknown tags are tolerated and decode to [`Asn1Node::Unknown`] carrying
//! their raw contents; any malformed framing is a typed error, never a
//! partial value.

use crate::node::{latin1_to_string, ApplicationSpecific, Asn1Node, TaggedValue};
use crate::reader::{ReaderStack, DEFAULT_MAX_DEPTH};
use crate::types::{read_tag_and_length, universal, Length, Tag, TagClass};
use log::{debug, trace};
use std::io::{Cursor, Read};
use x690_core::{Asn1Error, Asn1Integer, Asn1Result, BitString, ObjectIdentifier};

/// Decode one value from a complete byte buffer.
///
/// The whole buffer must be consumed; trailing bytes are rejected. Use
/// [`decode_stream`] or [`Asn1Reader`] for sources that carry further data.
///
/// # Errors
///
/// Any of the decode error taxonomy, or `UnexpectedTag` for trailing bytes.
pub fn decode(data: &[u8]) -> Asn1Result<Asn1Node> {
    let mut reader = Asn1Reader::new(Cursor::new(data));
    let node = reader
        .read_node()?
        .ok_or_else(|| Asn1Error::TruncatedInput("empty input".to_string()))?;
    let consumed = reader.into_inner().position() as usize;
    if consumed < data.len() {
        return Err(Asn1Error::UnexpectedTag(format!(
            "{} trailing byte(s) after top-level value",
            data.len() - consumed
        )));
    }
    Ok(node)
}

/// Decode one value from a byte source, leaving any following data unread.
///
/// # Errors
///
/// Any of the decode error taxonomy; an empty source is `TruncatedInput`.
pub fn decode_stream<R: Read>(reader: R) -> Asn1Result<Asn1Node> {
    Asn1Reader::new(reader)
        .read_node()?
        .ok_or_else(|| Asn1Error::TruncatedInput("empty input".to_string()))
}

/// Reader of consecutive top-level values from one byte source.
pub struct Asn1Reader<R> {
    stack: ReaderStack<R>,
}

impl<R: Read> Asn1Reader<R> {
    /// Create a reader with the default nesting limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_depth(reader, DEFAULT_MAX_DEPTH)
    }

    /// Create a reader with an explicit nesting limit.
    pub fn with_max_depth(reader: R, max_depth: usize) -> Self {
        Self {
            stack: ReaderStack::with_max_depth(reader, max_depth),
        }
    }

    /// Read the next top-level value, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn read_node(&mut self) -> Asn1Result<Option<Asn1Node>> {
        read_node_on(&mut self.stack)
    }

    /// Consume the reader, returning the base source.
    pub fn into_inner(self) -> R {
        self.stack.into_inner()
    }
}

/// Read the next value from the current region of the stack.
pub(crate) fn read_node_on<R: Read>(stack: &mut ReaderStack<R>) -> Asn1Result<Option<Asn1Node>> {
    let Some((tag, length)) = read_tag_and_length(stack)? else {
        return Ok(None);
    };
    Ok(Some(read_value_on(stack, tag, length)?))
}

/// Read one value's content region, with header already consumed.
pub(crate) fn read_value_on<R: Read>(
    stack: &mut ReaderStack<R>,
    tag: Tag,
    length: Length,
) -> Asn1Result<Asn1Node> {
    trace!(
        "decoding {:?} with {:?} at depth {}",
        tag,
        length,
        stack.depth()
    );

    push_region(stack, tag, length)?;
    let node = if tag.is_constructed() {
        read_constructed(stack, tag)?
    } else {
        read_primitive(stack, tag)?
    };
    stack.pop_frame()?;
    Ok(node)
}

/// Open the content region of a value as a frame on the stack.
pub(crate) fn push_region<R: Read>(
    stack: &mut ReaderStack<R>,
    tag: Tag,
    length: Length,
) -> Asn1Result<()> {
    match length {
        Length::Definite(n) => stack.push_definite(n),
        Length::Indefinite => {
            if !tag.is_constructed() {
                return Err(Asn1Error::MalformedLength(
                    "indefinite length on a primitive value".to_string(),
                ));
            }
            stack.push_indefinite()
        }
    }
}

fn read_constructed<R: Read>(stack: &mut ReaderStack<R>, tag: Tag) -> Asn1Result<Asn1Node> {
    match tag.class() {
        TagClass::Universal => match tag.number() {
            universal::SEQUENCE => Ok(Asn1Node::Sequence(read_children(stack)?)),
            universal::SET => Ok(Asn1Node::Set(read_children(stack)?)),
            universal::OCTET_STRING => read_chunked_octets(stack),
            universal::BIT_STRING => read_chunked_bits(stack),
            universal::BOOLEAN
            | universal::INTEGER
            | universal::NULL
            | universal::OBJECT_IDENTIFIER
            | universal::ENUMERATED => Err(Asn1Error::UnknownConstruction(format!(
                "constructed encoding of universal tag {}",
                tag.number()
            ))),
            number => {
                debug!("tolerating unknown constructed universal tag {}", number);
                Ok(Asn1Node::Unknown {
                    tag,
                    contents: stack.to_array()?,
                })
            }
        },
        TagClass::ContextSpecific => {
            let children = read_children(stack)?;
            Ok(Asn1Node::Tagged(TaggedValue::from_decoded_children(
                tag.number(),
                children,
            )))
        }
        TagClass::Application => Ok(Asn1Node::ApplicationSpecific(ApplicationSpecific::new(
            tag.number(),
            true,
            stack.to_array()?,
        ))),
        TagClass::Private => {
            debug!("tolerating private-class tag {}", tag.number());
            Ok(Asn1Node::Unknown {
                tag,
                contents: stack.to_array()?,
            })
        }
    }
}

fn read_children<R: Read>(stack: &mut ReaderStack<R>) -> Asn1Result<Vec<Asn1Node>> {
    let mut children = Vec::new();
    while let Some(child) = read_node_on(stack)? {
        children.push(child);
    }
    Ok(children)
}

/// A constructed OCTET STRING is the concatenation of its fragments; the
/// chunk boundaries the producer chose are not part of the value.
fn read_chunked_octets<R: Read>(stack: &mut ReaderStack<R>) -> Asn1Result<Asn1Node> {
    let mut data = Vec::new();
    for fragment in read_children(stack)? {
        match fragment {
            Asn1Node::OctetString(chunk) => data.extend_from_slice(&chunk),
            other => {
                return Err(Asn1Error::UnexpectedTag(format!(
                    "constructed OCTET STRING fragment is {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Asn1Node::OctetString(data))
}

/// A constructed BIT STRING concatenates its fragments; only the final
/// fragment may leave bits unused.
fn read_chunked_bits<R: Read>(stack: &mut ReaderStack<R>) -> Asn1Result<Asn1Node> {
    let mut bytes = Vec::new();
    let mut num_bits = 0usize;
    for fragment in read_children(stack)? {
        match fragment {
            Asn1Node::BitString(chunk) => {
                if num_bits % 8 != 0 {
                    return Err(Asn1Error::InvalidValue(
                        "only the final BIT STRING fragment may have unused bits".to_string(),
                    ));
                }
                bytes.extend_from_slice(chunk.as_bytes());
                num_bits += chunk.num_bits();
            }
            other => {
                return Err(Asn1Error::UnexpectedTag(format!(
                    "constructed BIT STRING fragment is {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Asn1Node::BitString(BitString::new(bytes, num_bits)?))
}

fn read_primitive<R: Read>(stack: &mut ReaderStack<R>, tag: Tag) -> Asn1Result<Asn1Node> {
    let contents = stack.to_array()?;
    match tag.class() {
        TagClass::Universal => build_universal(tag, contents),
        TagClass::ContextSpecific => Ok(Asn1Node::Tagged(TaggedValue::implicit_raw(
            tag.number(),
            false,
            contents,
        ))),
        TagClass::Application => Ok(Asn1Node::ApplicationSpecific(ApplicationSpecific::new(
            tag.number(),
            false,
            contents,
        ))),
        TagClass::Private => Ok(Asn1Node::Unknown { tag, contents }),
    }
}

fn build_universal(tag: Tag, contents: Vec<u8>) -> Asn1Result<Asn1Node> {
    match tag.number() {
        universal::BOOLEAN => {
            if contents.len() != 1 {
                return Err(Asn1Error::InvalidValue(format!(
                    "BOOLEAN content must be one octet, got {}",
                    contents.len()
                )));
            }
            // BER: any non-zero octet is true
            Ok(Asn1Node::Boolean(contents[0] != 0))
        }
        universal::INTEGER => Ok(Asn1Node::Integer(Asn1Integer::from_be_bytes(contents)?)),
        universal::BIT_STRING => {
            let Some((&unused, data)) = contents.split_first() else {
                return Err(Asn1Error::InvalidValue(
                    "BIT STRING content must hold the unused-bits octet".to_string(),
                ));
            };
            if unused > 7 {
                return Err(Asn1Error::InvalidValue(format!(
                    "BIT STRING unused bits must be 0-7, got {}",
                    unused
                )));
            }
            if data.is_empty() && unused != 0 {
                return Err(Asn1Error::InvalidValue(
                    "empty BIT STRING cannot have unused bits".to_string(),
                ));
            }
            let num_bits = data.len() * 8 - unused as usize;
            Ok(Asn1Node::BitString(BitString::new(data.to_vec(), num_bits)?))
        }
        universal::OCTET_STRING => Ok(Asn1Node::OctetString(contents)),
        universal::NULL => {
            if !contents.is_empty() {
                return Err(Asn1Error::InvalidValue(format!(
                    "NULL content must be empty, got {} octet(s)",
                    contents.len()
                )));
            }
            Ok(Asn1Node::Null)
        }
        universal::OBJECT_IDENTIFIER => Ok(Asn1Node::ObjectIdentifier(
            ObjectIdentifier::from_content_octets(&contents)?,
        )),
        universal::ENUMERATED => Ok(Asn1Node::Enumerated(Asn1Integer::from_be_bytes(contents)?)),
        universal::UTF8_STRING => {
            let text = String::from_utf8(contents).map_err(|e| {
                Asn1Error::InvalidValue(format!("UTF8String content is not UTF-8: {}", e))
            })?;
            Ok(Asn1Node::Utf8String(text))
        }
        universal::NUMERIC_STRING => Ok(Asn1Node::NumericString(latin1_to_string(&contents))),
        universal::PRINTABLE_STRING => Ok(Asn1Node::PrintableString(latin1_to_string(&contents))),
        universal::T61_STRING => Ok(Asn1Node::T61String(latin1_to_string(&contents))),
        universal::IA5_STRING => Ok(Asn1Node::Ia5String(latin1_to_string(&contents))),
        universal::VISIBLE_STRING => Ok(Asn1Node::VisibleString(latin1_to_string(&contents))),
        universal::GENERAL_STRING => Ok(Asn1Node::GeneralString(latin1_to_string(&contents))),
        universal::BMP_STRING => {
            if contents.len() % 2 != 0 {
                return Err(Asn1Error::InvalidValue(
                    "BMPString content must be an even number of octets".to_string(),
                ));
            }
            let units: Vec<u16> = contents
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            let text = String::from_utf16(&units).map_err(|e| {
                Asn1Error::InvalidValue(format!("BMPString content is not UTF-16: {}", e))
            })?;
            Ok(Asn1Node::BmpString(text))
        }
        universal::UNIVERSAL_STRING => Ok(Asn1Node::UniversalString(contents)),
        universal::UTC_TIME => Ok(Asn1Node::UtcTime(latin1_to_string(&contents))),
        universal::GENERALIZED_TIME => Ok(Asn1Node::GeneralizedTime(latin1_to_string(&contents))),
        universal::SEQUENCE | universal::SET => Err(Asn1Error::UnknownConstruction(format!(
            "primitive encoding of universal tag {}",
            tag.number()
        ))),
        number => {
            debug!("tolerating unknown primitive universal tag {}", number);
            Ok(Asn1Node::Unknown { tag, contents })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TaggedPayload;

    #[test]
    fn test_decode_integer_1001() {
        let node = decode(&[0x02, 0x02, 0x03, 0xE9]).unwrap();
        assert_eq!(node.as_integer().unwrap().to_i64().unwrap(), 1001);
        assert_eq!(node.encode(), vec![0x02, 0x02, 0x03, 0xE9]);
    }

    #[test]
    fn test_decode_indefinite_sequence_to_der() {
        // BER indefinite sequence of BOOLEAN true and OCTET STRING DE AD
        let ber = [0x30, 0x80, 0x01, 0x01, 0xFF, 0x04, 0x02, 0xDE, 0xAD, 0x00, 0x00];
        let node = decode(&ber).unwrap();
        let children = node.as_sequence().unwrap();
        assert_eq!(children.len(), 2);
        assert!(children[0].as_boolean().unwrap());
        assert_eq!(children[1].as_octet_string().unwrap(), &[0xDE, 0xAD]);

        // DER re-encoding is definite length, no trailing octets
        assert_eq!(
            node.encode(),
            vec![0x30, 0x07, 0x01, 0x01, 0xFF, 0x04, 0x02, 0xDE, 0xAD]
        );
    }

    #[test]
    fn test_nested_indefinite_closure() {
        // Sequence { Sequence { Boolean true } } with both regions indefinite
        let ber = [
            0x30, 0x80, 0x30, 0x80, 0x01, 0x01, 0xFF, 0x00, 0x00, 0x00, 0x00,
        ];
        let node = decode(&ber).unwrap();
        let outer = node.as_sequence().unwrap();
        assert_eq!(outer.len(), 1);
        let inner = outer[0].as_sequence().unwrap();
        assert_eq!(inner.len(), 1);
        assert!(inner[0].as_boolean().unwrap());
    }

    #[test]
    fn test_dropped_terminator_is_truncated() {
        // As above with the outer terminator missing
        let ber = [0x30, 0x80, 0x30, 0x80, 0x01, 0x01, 0xFF, 0x00, 0x00];
        let err = decode(&ber).unwrap_err();
        assert!(matches!(err, Asn1Error::TruncatedInput(_)));
    }

    #[test]
    fn test_chunked_octet_string() {
        // Constructed indefinite OCTET STRING of fragments DE AD and BE EF
        let ber = [
            0x24, 0x80, 0x04, 0x02, 0xDE, 0xAD, 0x04, 0x02, 0xBE, 0xEF, 0x00, 0x00,
        ];
        let node = decode(&ber).unwrap();
        assert_eq!(node.as_octet_string().unwrap(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        // DER form is the primitive unchunked string
        assert_eq!(node.encode(), vec![0x04, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_chunk_invariance() {
        let content: Vec<u8> = (0u8..=200).collect();
        for chunk_size in [1usize, 7, 64, 201] {
            let mut ber = vec![0x24, 0x80];
            for chunk in content.chunks(chunk_size) {
                ber.push(0x04);
                ber.extend_from_slice(&Length::Definite(chunk.len()).encode());
                ber.extend_from_slice(chunk);
            }
            ber.extend_from_slice(&[0x00, 0x00]);
            let node = decode(&ber).unwrap();
            assert_eq!(
                node.as_octet_string().unwrap(),
                content.as_slice(),
                "chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_explicit_tag_round_trip() {
        let original = Asn1Node::from(1001i64);
        let wrapped = Asn1Node::Tagged(TaggedValue::explicit(5, original.clone()));
        let decoded = decode(&wrapped.encode()).unwrap();
        let tagged = decoded.as_tagged().unwrap();
        assert_eq!(tagged.tag_no(), 5);
        assert!(tagged.is_explicit());
        assert_eq!(tagged.inner_explicit().unwrap(), &original);
    }

    #[test]
    fn test_implicit_tag_keeps_content_only() {
        let wrapped = Asn1Node::Tagged(TaggedValue::implicit(
            3,
            Asn1Node::OctetString(vec![0xAA, 0xBB]),
        ));
        let decoded = decode(&wrapped.encode()).unwrap();
        let tagged = decoded.as_tagged().unwrap();
        assert_eq!(tagged.tag_no(), 3);
        assert!(!tagged.is_explicit());
        // The original universal tag is gone; only the content octets remain
        match tagged.payload() {
            TaggedPayload::Raw {
                constructed,
                contents,
            } => {
                assert!(!constructed);
                assert_eq!(contents, &[0xAA, 0xBB]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
        let reinterpreted = tagged.interpret_as(universal::OCTET_STRING).unwrap();
        assert_eq!(reinterpreted.as_octet_string().unwrap(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_unknown_tag_preserved() {
        // Universal tag 13 is unassigned here; contents survive re-encoding
        let input = [0x0D, 0x03, 0x01, 0x02, 0x03];
        let node = decode(&input).unwrap();
        assert!(matches!(node, Asn1Node::Unknown { .. }));
        assert_eq!(node.encode(), input.to_vec());
    }

    #[test]
    fn test_constructed_null_rejected() {
        let err = decode(&[0x25, 0x00]).unwrap_err();
        assert!(matches!(err, Asn1Error::UnknownConstruction(_)));
    }

    #[test]
    fn test_primitive_sequence_rejected() {
        let err = decode(&[0x10, 0x00]).unwrap_err();
        assert!(matches!(err, Asn1Error::UnknownConstruction(_)));
    }

    #[test]
    fn test_indefinite_primitive_rejected() {
        let err = decode(&[0x04, 0x80, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Asn1Error::MalformedLength(_)));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err = decode(&[0x05, 0x00, 0xFF]).unwrap_err();
        assert!(matches!(err, Asn1Error::UnexpectedTag(_)));
    }

    #[test]
    fn test_decode_stream_leaves_trailing() {
        let node = decode_stream(&[0x05, 0x00, 0x02, 0x01, 0x07][..]).unwrap();
        assert_eq!(node, Asn1Node::Null);
    }

    #[test]
    fn test_multiple_top_level_values() {
        let mut reader = Asn1Reader::new(Cursor::new(vec![0x05, 0x00, 0x02, 0x01, 0x07]));
        assert_eq!(reader.read_node().unwrap(), Some(Asn1Node::Null));
        assert_eq!(reader.read_node().unwrap(), Some(Asn1Node::from(7i64)));
        assert_eq!(reader.read_node().unwrap(), None);
    }

    #[test]
    fn test_nesting_limit() {
        // 40 nested indefinite sequences against a limit of 16
        let mut ber = Vec::new();
        for _ in 0..40 {
            ber.extend_from_slice(&[0x30, 0x80]);
        }
        ber.extend_from_slice(&[0x02, 0x01, 0x01]);
        for _ in 0..40 {
            ber.extend_from_slice(&[0x00, 0x00]);
        }
        let mut reader = Asn1Reader::with_max_depth(Cursor::new(ber), 16);
        let err = reader.read_node().unwrap_err();
        assert!(matches!(err, Asn1Error::NestingTooDeep(16)));
    }

    #[test]
    fn test_truncated_definite_content() {
        let err = decode(&[0x04, 0x05, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, Asn1Error::TruncatedInput(_)));
    }

    #[test]
    fn test_boolean_ber_lenient_der_canonical() {
        // Any non-zero octet decodes as true and re-encodes as FF
        let node = decode(&[0x01, 0x01, 0x07]).unwrap();
        assert!(node.as_boolean().unwrap());
        assert_eq!(node.encode(), vec![0x01, 0x01, 0xFF]);
    }

    #[test]
    fn test_round_trip_all_variants() {
        let oid = ObjectIdentifier::from_string("1.2.840.113549.1.7.1").unwrap();
        let nodes = vec![
            Asn1Node::Boolean(true),
            Asn1Node::from(-129i64),
            Asn1Node::BitString(BitString::from_bytes(vec![0xAB, 0xCD])),
            Asn1Node::OctetString(vec![1, 2, 3]),
            Asn1Node::Null,
            Asn1Node::ObjectIdentifier(oid),
            Asn1Node::Enumerated(Asn1Integer::from_i64(4)),
            Asn1Node::Utf8String("héllo".to_string()),
            Asn1Node::PrintableString("Test".to_string()),
            Asn1Node::Ia5String("a@b.example".to_string()),
            Asn1Node::BmpString("证书".to_string()),
            Asn1Node::UtcTime("260807120000Z".to_string()),
            Asn1Node::GeneralizedTime("20260807120000Z".to_string()),
            Asn1Node::Sequence(vec![Asn1Node::Null, Asn1Node::from(5i64)]),
            Asn1Node::Set(vec![Asn1Node::Boolean(false), Asn1Node::from(9i64)]),
            Asn1Node::Tagged(TaggedValue::explicit(2, Asn1Node::Null)),
            Asn1Node::ApplicationSpecific(ApplicationSpecific::from_node(
                1,
                &Asn1Node::from(3i64),
            )),
        ];
        for node in nodes {
            let decoded = decode(&node.encode()).unwrap();
            assert_eq!(decoded, node, "{}", node.type_name());
        }
    }
}
