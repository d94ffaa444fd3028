//! In-memory node model for ASN.1 values
//!
//! One closed enum covers every supported universal and derived type; the
//! decoder builds nodes from bytes and application code builds them for
//! encoding. Nodes are immutable once constructed. Equality and hashing are
//! defined on the canonical DER encoding: two nodes are equal exactly when
//! their encodings are byte-identical, which is what set and map lookups
//! over decoded values (certificate attributes, bag attributes) rely on.

use crate::decoder;
use crate::encoder::DerEncoder;
use crate::types::{universal, Tag};
use std::hash::{Hash, Hasher};
use std::io::Write;
use x690_core::{Asn1Error, Asn1Integer, Asn1Result, BitString, ObjectIdentifier};

/// A decoded ASN.1 value.
#[derive(Debug, Clone)]
pub enum Asn1Node {
    /// BOOLEAN
    Boolean(bool),
    /// INTEGER, arbitrary precision
    Integer(Asn1Integer),
    /// BIT STRING
    BitString(BitString),
    /// OCTET STRING; chunked encodings decode to the concatenated content
    OctetString(Vec<u8>),
    /// NULL
    Null,
    /// OBJECT IDENTIFIER
    ObjectIdentifier(ObjectIdentifier),
    /// ENUMERATED
    Enumerated(Asn1Integer),
    /// UTF8String
    Utf8String(String),
    /// NumericString
    NumericString(String),
    /// PrintableString
    PrintableString(String),
    /// T61String (Latin-1 interpretation)
    T61String(String),
    /// IA5String
    Ia5String(String),
    /// VisibleString
    VisibleString(String),
    /// GeneralString
    GeneralString(String),
    /// BMPString (UTF-16BE on the wire)
    BmpString(String),
    /// UniversalString, kept as raw content octets
    UniversalString(Vec<u8>),
    /// UTCTime
    UtcTime(String),
    /// GeneralizedTime
    GeneralizedTime(String),
    /// SEQUENCE / SEQUENCE OF
    Sequence(Vec<Asn1Node>),
    /// SET / SET OF
    Set(Vec<Asn1Node>),
    /// Context-specific tagged value
    Tagged(TaggedValue),
    /// Application-class value with uninterpreted contents
    ApplicationSpecific(ApplicationSpecific),
    /// Unsupported tag, kept as raw content octets so that re-encoding
    /// reproduces the input
    Unknown {
        /// The tag as read from the input
        tag: Tag,
        /// Raw content octets
        contents: Vec<u8>,
    },
}

impl Asn1Node {
    /// Encode the node under DER.
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = DerEncoder::new();
        self.encode_into(&mut enc);
        enc.into_bytes()
    }

    /// Write the DER encoding of the node to a sink.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn encode_to<W: Write>(&self, sink: &mut W) -> Asn1Result<()> {
        sink.write_all(&self.encode())?;
        Ok(())
    }

    pub(crate) fn encode_into(&self, enc: &mut DerEncoder) {
        let (tag, contents) = self.der_parts();
        enc.write_encoded(tag, &contents);
    }

    /// The DER tag and content octets of this node.
    fn der_parts(&self) -> (Tag, Vec<u8>) {
        match self {
            Asn1Node::Boolean(value) => (
                Tag::universal(false, universal::BOOLEAN),
                vec![if *value { 0xFF } else { 0x00 }],
            ),
            Asn1Node::Integer(value) => (
                Tag::universal(false, universal::INTEGER),
                value.as_bytes().to_vec(),
            ),
            Asn1Node::BitString(value) => {
                let mut contents = vec![value.unused_bits()];
                contents.extend_from_slice(value.as_bytes());
                (Tag::universal(false, universal::BIT_STRING), contents)
            }
            Asn1Node::OctetString(value) => {
                (Tag::universal(false, universal::OCTET_STRING), value.clone())
            }
            Asn1Node::Null => (Tag::universal(false, universal::NULL), Vec::new()),
            Asn1Node::ObjectIdentifier(value) => (
                Tag::universal(false, universal::OBJECT_IDENTIFIER),
                value.content_octets(),
            ),
            Asn1Node::Enumerated(value) => (
                Tag::universal(false, universal::ENUMERATED),
                value.as_bytes().to_vec(),
            ),
            Asn1Node::Utf8String(value) => (
                Tag::universal(false, universal::UTF8_STRING),
                value.as_bytes().to_vec(),
            ),
            Asn1Node::NumericString(value) => (
                Tag::universal(false, universal::NUMERIC_STRING),
                string_to_latin1(value),
            ),
            Asn1Node::PrintableString(value) => (
                Tag::universal(false, universal::PRINTABLE_STRING),
                string_to_latin1(value),
            ),
            Asn1Node::T61String(value) => (
                Tag::universal(false, universal::T61_STRING),
                string_to_latin1(value),
            ),
            Asn1Node::Ia5String(value) => (
                Tag::universal(false, universal::IA5_STRING),
                string_to_latin1(value),
            ),
            Asn1Node::VisibleString(value) => (
                Tag::universal(false, universal::VISIBLE_STRING),
                string_to_latin1(value),
            ),
            Asn1Node::GeneralString(value) => (
                Tag::universal(false, universal::GENERAL_STRING),
                string_to_latin1(value),
            ),
            Asn1Node::BmpString(value) => {
                let mut contents = Vec::with_capacity(value.len() * 2);
                for unit in value.encode_utf16() {
                    contents.extend_from_slice(&unit.to_be_bytes());
                }
                (Tag::universal(false, universal::BMP_STRING), contents)
            }
            Asn1Node::UniversalString(value) => (
                Tag::universal(false, universal::UNIVERSAL_STRING),
                value.clone(),
            ),
            Asn1Node::UtcTime(value) => (
                Tag::universal(false, universal::UTC_TIME),
                string_to_latin1(value),
            ),
            Asn1Node::GeneralizedTime(value) => (
                Tag::universal(false, universal::GENERALIZED_TIME),
                string_to_latin1(value),
            ),
            Asn1Node::Sequence(children) => {
                let mut contents = Vec::new();
                for child in children {
                    contents.extend_from_slice(&child.encode());
                }
                (Tag::universal(true, universal::SEQUENCE), contents)
            }
            Asn1Node::Set(children) => {
                // DER orders SET elements by their encodings
                let mut encodings: Vec<Vec<u8>> =
                    children.iter().map(|child| child.encode()).collect();
                encodings.sort();
                let contents = encodings.concat();
                (Tag::universal(true, universal::SET), contents)
            }
            Asn1Node::Tagged(value) => value.der_parts(),
            Asn1Node::ApplicationSpecific(value) => (
                Tag::application(value.is_constructed(), value.tag_no()),
                value.contents().to_vec(),
            ),
            Asn1Node::Unknown { tag, contents } => (*tag, contents.clone()),
        }
    }

    /// A short name of the variant, for error messages and dumps.
    pub fn type_name(&self) -> &'static str {
        match self {
            Asn1Node::Boolean(_) => "BOOLEAN",
            Asn1Node::Integer(_) => "INTEGER",
            Asn1Node::BitString(_) => "BIT STRING",
            Asn1Node::OctetString(_) => "OCTET STRING",
            Asn1Node::Null => "NULL",
            Asn1Node::ObjectIdentifier(_) => "OBJECT IDENTIFIER",
            Asn1Node::Enumerated(_) => "ENUMERATED",
            Asn1Node::Utf8String(_) => "UTF8String",
            Asn1Node::NumericString(_) => "NumericString",
            Asn1Node::PrintableString(_) => "PrintableString",
            Asn1Node::T61String(_) => "T61String",
            Asn1Node::Ia5String(_) => "IA5String",
            Asn1Node::VisibleString(_) => "VisibleString",
            Asn1Node::GeneralString(_) => "GeneralString",
            Asn1Node::BmpString(_) => "BMPString",
            Asn1Node::UniversalString(_) => "UniversalString",
            Asn1Node::UtcTime(_) => "UTCTime",
            Asn1Node::GeneralizedTime(_) => "GeneralizedTime",
            Asn1Node::Sequence(_) => "SEQUENCE",
            Asn1Node::Set(_) => "SET",
            Asn1Node::Tagged(_) => "Tagged",
            Asn1Node::ApplicationSpecific(_) => "ApplicationSpecific",
            Asn1Node::Unknown { .. } => "Unknown",
        }
    }

    /// The universal tag number of this variant, if it has one.
    pub(crate) fn universal_number(&self) -> Option<u32> {
        let number = match self {
            Asn1Node::Boolean(_) => universal::BOOLEAN,
            Asn1Node::Integer(_) => universal::INTEGER,
            Asn1Node::BitString(_) => universal::BIT_STRING,
            Asn1Node::OctetString(_) => universal::OCTET_STRING,
            Asn1Node::Null => universal::NULL,
            Asn1Node::ObjectIdentifier(_) => universal::OBJECT_IDENTIFIER,
            Asn1Node::Enumerated(_) => universal::ENUMERATED,
            Asn1Node::Utf8String(_) => universal::UTF8_STRING,
            Asn1Node::NumericString(_) => universal::NUMERIC_STRING,
            Asn1Node::PrintableString(_) => universal::PRINTABLE_STRING,
            Asn1Node::T61String(_) => universal::T61_STRING,
            Asn1Node::Ia5String(_) => universal::IA5_STRING,
            Asn1Node::VisibleString(_) => universal::VISIBLE_STRING,
            Asn1Node::GeneralString(_) => universal::GENERAL_STRING,
            Asn1Node::BmpString(_) => universal::BMP_STRING,
            Asn1Node::UniversalString(_) => universal::UNIVERSAL_STRING,
            Asn1Node::UtcTime(_) => universal::UTC_TIME,
            Asn1Node::GeneralizedTime(_) => universal::GENERALIZED_TIME,
            Asn1Node::Sequence(_) => universal::SEQUENCE,
            Asn1Node::Set(_) => universal::SET,
            _ => return None,
        };
        Some(number)
    }

    /// View as a SEQUENCE element list.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not a SEQUENCE.
    pub fn as_sequence(&self) -> Asn1Result<&[Asn1Node]> {
        match self {
            Asn1Node::Sequence(children) => Ok(children),
            other => Err(unexpected("SEQUENCE", other)),
        }
    }

    /// View as a SET element list.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not a SET.
    pub fn as_set(&self) -> Asn1Result<&[Asn1Node]> {
        match self {
            Asn1Node::Set(children) => Ok(children),
            other => Err(unexpected("SET", other)),
        }
    }

    /// View as an INTEGER.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not an INTEGER.
    pub fn as_integer(&self) -> Asn1Result<&Asn1Integer> {
        match self {
            Asn1Node::Integer(value) => Ok(value),
            other => Err(unexpected("INTEGER", other)),
        }
    }

    /// View as an OCTET STRING.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not an OCTET STRING.
    pub fn as_octet_string(&self) -> Asn1Result<&[u8]> {
        match self {
            Asn1Node::OctetString(value) => Ok(value),
            other => Err(unexpected("OCTET STRING", other)),
        }
    }

    /// View as an OBJECT IDENTIFIER.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not an OBJECT IDENTIFIER.
    pub fn as_object_identifier(&self) -> Asn1Result<&ObjectIdentifier> {
        match self {
            Asn1Node::ObjectIdentifier(value) => Ok(value),
            other => Err(unexpected("OBJECT IDENTIFIER", other)),
        }
    }

    /// View as a BOOLEAN.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not a BOOLEAN.
    pub fn as_boolean(&self) -> Asn1Result<bool> {
        match self {
            Asn1Node::Boolean(value) => Ok(*value),
            other => Err(unexpected("BOOLEAN", other)),
        }
    }

    /// View as a tagged value.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the node is not context-specific tagged.
    pub fn as_tagged(&self) -> Asn1Result<&TaggedValue> {
        match self {
            Asn1Node::Tagged(value) => Ok(value),
            other => Err(unexpected("tagged value", other)),
        }
    }

    /// The text of any character-string variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Asn1Node::Utf8String(s)
            | Asn1Node::NumericString(s)
            | Asn1Node::PrintableString(s)
            | Asn1Node::T61String(s)
            | Asn1Node::Ia5String(s)
            | Asn1Node::VisibleString(s)
            | Asn1Node::GeneralString(s)
            | Asn1Node::BmpString(s)
            | Asn1Node::UtcTime(s)
            | Asn1Node::GeneralizedTime(s) => Some(s),
            _ => None,
        }
    }
}

fn unexpected(wanted: &str, found: &Asn1Node) -> Asn1Error {
    Asn1Error::UnexpectedTag(format!("expected {}, found {}", wanted, found.type_name()))
}

impl PartialEq for Asn1Node {
    fn eq(&self, other: &Self) -> bool {
        self.encode() == other.encode()
    }
}

impl Eq for Asn1Node {}

impl Hash for Asn1Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encode().hash(state);
    }
}

impl From<bool> for Asn1Node {
    fn from(value: bool) -> Self {
        Asn1Node::Boolean(value)
    }
}

impl From<i64> for Asn1Node {
    fn from(value: i64) -> Self {
        Asn1Node::Integer(Asn1Integer::from_i64(value))
    }
}

impl From<Asn1Integer> for Asn1Node {
    fn from(value: Asn1Integer) -> Self {
        Asn1Node::Integer(value)
    }
}

impl From<BitString> for Asn1Node {
    fn from(value: BitString) -> Self {
        Asn1Node::BitString(value)
    }
}

impl From<ObjectIdentifier> for Asn1Node {
    fn from(value: ObjectIdentifier) -> Self {
        Asn1Node::ObjectIdentifier(value)
    }
}

/// A context-specific tagged value: `[n] EXPLICIT inner` wraps the inner
/// value's full encoding in a new constructed tag, `[n] IMPLICIT inner`
/// replaces the inner value's own tag while keeping its constructed bit.
///
/// Implicitly tagged values read from the wire carry raw content octets;
/// the believed inner type is supplied later through
/// [`TaggedValue::interpret_as`], since the wire alone cannot say what an
/// implicit tag hides.
#[derive(Debug, Clone)]
pub struct TaggedValue {
    tag_no: u32,
    explicit: bool,
    payload: TaggedPayload,
}

/// Payload of a tagged value.
#[derive(Debug, Clone)]
pub enum TaggedPayload {
    /// A resolved inner node
    Parsed(Box<Asn1Node>),
    /// Raw content octets of an implicitly tagged value
    Raw {
        /// Constructed bit of the original tag octet
        constructed: bool,
        /// Raw content octets
        contents: Vec<u8>,
    },
}

impl TaggedValue {
    /// Create an explicitly tagged value.
    pub fn explicit(tag_no: u32, inner: Asn1Node) -> Self {
        Self {
            tag_no,
            explicit: true,
            payload: TaggedPayload::Parsed(Box::new(inner)),
        }
    }

    /// Create an implicitly tagged value.
    pub fn implicit(tag_no: u32, inner: Asn1Node) -> Self {
        Self {
            tag_no,
            explicit: false,
            payload: TaggedPayload::Parsed(Box::new(inner)),
        }
    }

    pub(crate) fn implicit_raw(tag_no: u32, constructed: bool, contents: Vec<u8>) -> Self {
        Self {
            tag_no,
            explicit: false,
            payload: TaggedPayload::Raw {
                constructed,
                contents,
            },
        }
    }

    /// Assemble a tagged value from the children of a constructed
    /// context-specific region. A single child reads as explicit tagging;
    /// any other count means the tag was implicit over a SEQUENCE.
    pub(crate) fn from_decoded_children(tag_no: u32, mut children: Vec<Asn1Node>) -> Self {
        if children.len() == 1 {
            let only = children.remove(0);
            Self::explicit(tag_no, only)
        } else {
            Self::implicit(tag_no, Asn1Node::Sequence(children))
        }
    }

    /// The context tag number.
    pub fn tag_no(&self) -> u32 {
        self.tag_no
    }

    /// Whether the value was tagged explicitly.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// The payload of the tagged value.
    pub fn payload(&self) -> &TaggedPayload {
        &self.payload
    }

    /// The inner value of an explicitly tagged value.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` for an implicitly tagged value; its inner
    /// type must be supplied through [`TaggedValue::interpret_as`].
    pub fn inner_explicit(&self) -> Asn1Result<&Asn1Node> {
        match (&self.payload, self.explicit) {
            (TaggedPayload::Parsed(inner), true) => Ok(inner),
            _ => Err(Asn1Error::UnexpectedTag(format!(
                "tag [{}] is implicit, inner value is not self-describing",
                self.tag_no
            ))),
        }
    }

    /// Reinterpret the payload under a believed universal tag number.
    ///
    /// For raw implicit content this re-frames the octets under the given
    /// tag and decodes them; for a resolved payload the believed tag must
    /// agree with what was decoded.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` if the content cannot be read as the
    /// requested type.
    pub fn interpret_as(&self, number: u32) -> Asn1Result<Asn1Node> {
        match &self.payload {
            TaggedPayload::Raw {
                constructed,
                contents,
            } => {
                let mut enc = DerEncoder::with_capacity(contents.len() + 8);
                enc.write_encoded(Tag::universal(*constructed, number), contents);
                decoder::decode(enc.as_bytes()).map_err(|e| {
                    Asn1Error::UnexpectedTag(format!(
                        "content of tag [{}] is not a valid universal tag {}: {}",
                        self.tag_no, number, e
                    ))
                })
            }
            TaggedPayload::Parsed(inner) => {
                if self.explicit {
                    if inner.universal_number() == Some(number) {
                        return Ok((**inner).clone());
                    }
                    return Err(Asn1Error::UnexpectedTag(format!(
                        "tag [{}] holds {}, not universal tag {}",
                        self.tag_no,
                        inner.type_name(),
                        number
                    )));
                }
                // Implicit over decoded children: the element list can be
                // re-read as a SEQUENCE or a SET
                match (&**inner, number) {
                    (Asn1Node::Sequence(_), universal::SEQUENCE) => Ok((**inner).clone()),
                    (Asn1Node::Sequence(children), universal::SET) => {
                        Ok(Asn1Node::Set(children.clone()))
                    }
                    _ => Err(Asn1Error::UnexpectedTag(format!(
                        "tag [{}] holds {}, not universal tag {}",
                        self.tag_no,
                        inner.type_name(),
                        number
                    ))),
                }
            }
        }
    }

    fn der_parts(&self) -> (Tag, Vec<u8>) {
        match &self.payload {
            TaggedPayload::Raw {
                constructed,
                contents,
            } => (
                Tag::context_specific(*constructed, self.tag_no),
                contents.clone(),
            ),
            TaggedPayload::Parsed(inner) => {
                if self.explicit {
                    (Tag::context_specific(true, self.tag_no), inner.encode())
                } else {
                    let (inner_tag, contents) = inner.der_parts();
                    (
                        Tag::context_specific(inner_tag.is_constructed(), self.tag_no),
                        contents,
                    )
                }
            }
        }
    }
}

/// An application-class value holding its content octets uninterpreted.
#[derive(Debug, Clone)]
pub struct ApplicationSpecific {
    tag_no: u32,
    constructed: bool,
    contents: Vec<u8>,
}

impl ApplicationSpecific {
    /// Create from raw content octets.
    pub fn new(tag_no: u32, constructed: bool, contents: Vec<u8>) -> Self {
        Self {
            tag_no,
            constructed,
            contents,
        }
    }

    /// Create from an inner node; the contents become the node's full
    /// encoding and the value is constructed.
    pub fn from_node(tag_no: u32, inner: &Asn1Node) -> Self {
        Self {
            tag_no,
            constructed: true,
            contents: inner.encode(),
        }
    }

    /// The application tag number.
    pub fn tag_no(&self) -> u32 {
        self.tag_no
    }

    /// Whether the value is constructed.
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// The raw content octets.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Decode the held content octets as one ASN.1 value.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` if the contents are not a well-formed value.
    pub fn inner(&self) -> Asn1Result<Asn1Node> {
        decoder::decode(&self.contents).map_err(|e| {
            Asn1Error::UnexpectedTag(format!(
                "contents of application tag [{}] do not parse: {}",
                self.tag_no, e
            ))
        })
    }
}

impl From<ApplicationSpecific> for Asn1Node {
    fn from(value: ApplicationSpecific) -> Self {
        Asn1Node::ApplicationSpecific(value)
    }
}

impl From<TaggedValue> for Asn1Node {
    fn from(value: TaggedValue) -> Self {
        Asn1Node::Tagged(value)
    }
}

pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn string_to_latin1(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u8).collect()
}
