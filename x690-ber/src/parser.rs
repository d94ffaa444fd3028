//! Lazy element-at-a-time parsers
//!
//! Where the decoder materializes a whole structure, these parsers pull one
//! element per call from the bounded reader chain, so a large nested value
//! (a CMS enveloped payload, a big certificate bag) can be walked in a
//! single pass without holding it in memory. Primitive elements come back as
//! finished nodes; constructed elements come back as nested parsers or as a
//! byte stream over octet-string fragments.
//!
//! A nested parser borrows its parent exclusively, so siblings cannot be
//! interleaved; dropping a nested parser before its region is finished is
//! fine, the parent drains the leftovers before reading the next element.

use crate::decoder::{push_region, read_node_on, read_value_on};
use crate::node::{Asn1Node, TaggedValue};
use crate::reader::{ReaderStack, DEFAULT_MAX_DEPTH};
use crate::types::{read_tag_and_length, universal, Length, Tag, TagClass};
use std::io::{self, Read};
use x690_core::{Asn1Error, Asn1Result};

/// One element produced by a lazy parser.
pub enum LazyValue<'p, R: Read> {
    /// A fully materialized value
    Node(Asn1Node),
    /// A nested SEQUENCE, traversed element by element
    Sequence(Asn1SequenceParser<'p, R>),
    /// A nested SET, traversed element by element
    Set(Asn1SetParser<'p, R>),
    /// A constructed OCTET STRING, read as one logical byte stream
    OctetStream(ConstructedOctetStream<'p, R>),
    /// A constructed context-specific tagged value, undecoded
    Tagged(LazyTagged<'p, R>),
}

impl<R: Read> LazyValue<'_, R> {
    /// Materialize this element completely.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn into_node(self) -> Asn1Result<Asn1Node> {
        match self {
            LazyValue::Node(node) => Ok(node),
            LazyValue::Sequence(mut parser) => {
                let mut children = Vec::new();
                while let Some(child) = parser.read_object()? {
                    children.push(child.into_node()?);
                }
                Ok(Asn1Node::Sequence(children))
            }
            LazyValue::Set(mut parser) => {
                let mut children = Vec::new();
                while let Some(child) = parser.read_object()? {
                    children.push(child.into_node()?);
                }
                Ok(Asn1Node::Set(children))
            }
            LazyValue::OctetStream(stream) => stream.into_node(),
            LazyValue::Tagged(tagged) => tagged.into_node(),
        }
    }
}

enum StackRef<'a, R: Read> {
    Owned(ReaderStack<R>),
    Borrowed(&'a mut ReaderStack<R>),
}

impl<R: Read> StackRef<'_, R> {
    fn get(&mut self) -> &mut ReaderStack<R> {
        match self {
            StackRef::Owned(stack) => stack,
            StackRef::Borrowed(stack) => stack,
        }
    }
}

/// Shared element-walk over one open region.
struct Elements<'a, R: Read> {
    stack: StackRef<'a, R>,
    region_depth: usize,
    done: bool,
}

impl<R: Read> Elements<'_, R> {
    fn read_object(&mut self) -> Asn1Result<Option<LazyValue<'_, R>>> {
        if self.done {
            return Ok(None);
        }
        let region_depth = self.region_depth;
        let stack = self.stack.get();

        // Close out whatever an abandoned child element left open
        while stack.depth() > region_depth {
            stack.pop_frame()?;
        }

        let Some((tag, length)) = read_tag_and_length(stack)? else {
            stack.pop_frame()?;
            self.done = true;
            return Ok(None);
        };
        build_lazy(stack, tag, length).map(Some)
    }
}

fn build_lazy<'p, R: Read>(
    stack: &'p mut ReaderStack<R>,
    tag: Tag,
    length: Length,
) -> Asn1Result<LazyValue<'p, R>> {
    if tag.is_constructed() {
        match (tag.class(), tag.number()) {
            (TagClass::Universal, universal::SEQUENCE) => {
                push_region(stack, tag, length)?;
                let region_depth = stack.depth();
                Ok(LazyValue::Sequence(Asn1SequenceParser(Elements {
                    stack: StackRef::Borrowed(stack),
                    region_depth,
                    done: false,
                })))
            }
            (TagClass::Universal, universal::SET) => {
                push_region(stack, tag, length)?;
                let region_depth = stack.depth();
                Ok(LazyValue::Set(Asn1SetParser(Elements {
                    stack: StackRef::Borrowed(stack),
                    region_depth,
                    done: false,
                })))
            }
            (TagClass::Universal, universal::OCTET_STRING) => {
                push_region(stack, tag, length)?;
                let region_depth = stack.depth();
                Ok(LazyValue::OctetStream(ConstructedOctetStream {
                    stack,
                    region_depth,
                    in_primitive: false,
                    done: false,
                }))
            }
            (TagClass::ContextSpecific, tag_no) => {
                push_region(stack, tag, length)?;
                let region_depth = stack.depth();
                Ok(LazyValue::Tagged(LazyTagged {
                    stack,
                    region_depth,
                    tag_no,
                }))
            }
            _ => Ok(LazyValue::Node(read_value_on(stack, tag, length)?)),
        }
    } else {
        Ok(LazyValue::Node(read_value_on(stack, tag, length)?))
    }
}

/// Lazy parser over the elements of a SEQUENCE.
pub struct Asn1SequenceParser<'a, R: Read>(Elements<'a, R>);

impl<R: Read> std::fmt::Debug for Asn1SequenceParser<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asn1SequenceParser").finish_non_exhaustive()
    }
}

impl<R: Read> Asn1SequenceParser<'_, R> {
    /// Read the next element, or `None` when the sequence is exhausted.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn read_object(&mut self) -> Asn1Result<Option<LazyValue<'_, R>>> {
        self.0.read_object()
    }
}

/// Lazy parser over the elements of a SET.
pub struct Asn1SetParser<'a, R: Read>(Elements<'a, R>);

impl<R: Read> Asn1SetParser<'_, R> {
    /// Read the next element, or `None` when the set is exhausted.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn read_object(&mut self) -> Asn1Result<Option<LazyValue<'_, R>>> {
        self.0.read_object()
    }
}

/// A constructed context-specific tagged value whose content region has not
/// been decoded. The wire does not say what an implicit tag hides, so the
/// caller states how to read it, the way a CMS reader pulls
/// `[0] IMPLICIT SET` recipient infos or an explicit version wrapper.
pub struct LazyTagged<'a, R: Read> {
    stack: &'a mut ReaderStack<R>,
    region_depth: usize,
    tag_no: u32,
}

impl<'a, R: Read> LazyTagged<'a, R> {
    /// The context tag number.
    pub fn tag_no(&self) -> u32 {
        self.tag_no
    }

    /// Read the content as implicitly tagged SEQUENCE elements.
    pub fn sequence_parser(self) -> Asn1SequenceParser<'a, R> {
        Asn1SequenceParser(Elements {
            region_depth: self.region_depth,
            stack: StackRef::Borrowed(self.stack),
            done: false,
        })
    }

    /// Read the content as implicitly tagged SET elements.
    pub fn set_parser(self) -> Asn1SetParser<'a, R> {
        Asn1SetParser(Elements {
            region_depth: self.region_depth,
            stack: StackRef::Borrowed(self.stack),
            done: false,
        })
    }

    /// Read the content as an implicitly tagged constructed OCTET STRING.
    pub fn octet_stream(self) -> ConstructedOctetStream<'a, R> {
        ConstructedOctetStream {
            stack: self.stack,
            region_depth: self.region_depth,
            in_primitive: false,
            done: false,
        }
    }

    /// Read the single inner value of an explicitly tagged region.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when the region is empty; any decode error
    /// from the inner value.
    pub fn explicit_value(self) -> Asn1Result<Asn1Node> {
        let stack = self.stack;
        let node = read_node_on(stack)?.ok_or_else(|| {
            Asn1Error::UnexpectedTag(format!(
                "tag [{}] region is empty, no explicit inner value",
                self.tag_no
            ))
        })?;
        while stack.depth() >= self.region_depth {
            stack.pop_frame()?;
        }
        Ok(node)
    }

    /// Materialize the whole tagged value.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn into_node(self) -> Asn1Result<Asn1Node> {
        let stack = self.stack;
        let mut children = Vec::new();
        while let Some(child) = read_node_on(stack)? {
            children.push(child);
        }
        stack.pop_frame()?;
        Ok(Asn1Node::Tagged(TaggedValue::from_decoded_children(
            self.tag_no,
            children,
        )))
    }
}

/// One logical byte stream over the fragments of a constructed OCTET STRING.
///
/// Fragment boundaries, and nested constructed fragments, are crossed
/// transparently; end of stream is the end of the enclosing region.
pub struct ConstructedOctetStream<'a, R: Read> {
    stack: &'a mut ReaderStack<R>,
    region_depth: usize,
    in_primitive: bool,
    done: bool,
}

impl<R: Read> ConstructedOctetStream<'_, R> {
    /// Read the next content byte, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedTag` when a fragment is not an OCTET STRING; any
    /// framing error from the chain.
    pub fn read_byte(&mut self) -> Asn1Result<Option<u8>> {
        loop {
            if self.done {
                return Ok(None);
            }
            if self.in_primitive {
                match self.stack.read_byte()? {
                    Some(byte) => return Ok(Some(byte)),
                    None => {
                        self.stack.pop_frame()?;
                        self.in_primitive = false;
                        continue;
                    }
                }
            }
            match read_tag_and_length(self.stack)? {
                Some((tag, length)) => {
                    if tag.class() != TagClass::Universal
                        || tag.number() != universal::OCTET_STRING
                    {
                        return Err(Asn1Error::UnexpectedTag(format!(
                            "constructed OCTET STRING fragment has tag {:?}",
                            tag
                        )));
                    }
                    push_region(self.stack, tag, length)?;
                    if !tag.is_constructed() {
                        self.in_primitive = true;
                    }
                }
                None => {
                    self.stack.pop_frame()?;
                    if self.stack.depth() < self.region_depth {
                        self.done = true;
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Drain the stream into an OCTET STRING node.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn into_node(mut self) -> Asn1Result<Asn1Node> {
        let mut data = Vec::new();
        while let Some(byte) = self.read_byte()? {
            data.push(byte);
        }
        Ok(Asn1Node::OctetString(data))
    }
}

impl<R: Read> Read for ConstructedOctetStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_byte().map_err(to_io_error)? {
                Some(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                None => break,
            }
        }
        Ok(filled)
    }
}

fn to_io_error(error: Asn1Error) -> io::Error {
    match error {
        Asn1Error::Io(inner) => inner,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Reader of consecutive top-level elements, each delivered lazily.
pub struct Asn1StreamParser<R: Read> {
    stack: ReaderStack<R>,
}

impl<R: Read> Asn1StreamParser<R> {
    /// Create a parser with the default nesting limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_depth(reader, DEFAULT_MAX_DEPTH)
    }

    /// Create a parser with an explicit nesting limit.
    pub fn with_max_depth(reader: R, max_depth: usize) -> Self {
        Self {
            stack: ReaderStack::with_max_depth(reader, max_depth),
        }
    }

    /// Read the next top-level element, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Any of the decode error taxonomy.
    pub fn read_object(&mut self) -> Asn1Result<Option<LazyValue<'_, R>>> {
        while self.stack.depth() > 0 {
            self.stack.pop_frame()?;
        }
        let Some((tag, length)) = read_tag_and_length(&mut self.stack)? else {
            return Ok(None);
        };
        build_lazy(&mut self.stack, tag, length).map(Some)
    }

    /// Consume the parser, returning the base source.
    pub fn into_inner(self) -> R {
        self.stack.into_inner()
    }
}

fn open_region<R: Read>(reader: R, number: u32) -> Asn1Result<Elements<'static, R>> {
    let mut stack = ReaderStack::new(reader);
    let Some((tag, length)) = read_tag_and_length(&mut stack)? else {
        return Err(Asn1Error::TruncatedInput("empty input".to_string()));
    };
    if !(tag.is_constructed() && tag.class() == TagClass::Universal && tag.number() == number) {
        return Err(Asn1Error::UnexpectedTag(format!(
            "expected constructed universal tag {}, found {:?}",
            number, tag
        )));
    }
    push_region(&mut stack, tag, length)?;
    let region_depth = stack.depth();
    Ok(Elements {
        stack: StackRef::Owned(stack),
        region_depth,
        done: false,
    })
}

/// Open a lazy parser over the elements of a top-level SEQUENCE.
///
/// # Errors
///
/// Returns `UnexpectedTag` when the input does not start with a constructed
/// SEQUENCE; any framing error from the header.
pub fn open_sequence_parser<R: Read>(reader: R) -> Asn1Result<Asn1SequenceParser<'static, R>> {
    Ok(Asn1SequenceParser(open_region(reader, universal::SEQUENCE)?))
}

/// Open a lazy parser over the elements of a top-level SET.
///
/// # Errors
///
/// Returns `UnexpectedTag` when the input does not start with a constructed
/// SET; any framing error from the header.
pub fn open_set_parser<R: Read>(reader: R) -> Asn1Result<Asn1SetParser<'static, R>> {
    Ok(Asn1SetParser(open_region(reader, universal::SET)?))
}
