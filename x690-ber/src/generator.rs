//! Streaming BER and DER generators
//!
//! The BER generators write their header immediately and stream content as
//! it becomes available, closing the indefinite-length region with the
//! end-of-contents octets; nothing is buffered beyond one chunk. The DER
//! sequence generator is the definite-length counterpart and must buffer its
//! content, since the header carries the content length.
//!
//! Closing is part of the value's lifetime: `close()` is the checked path,
//! and dropping an unclosed generator writes its terminator best-effort so
//! an early return cannot leave a region open.

use crate::encoder::DerEncoder;
use crate::node::Asn1Node;
use crate::types::{universal, Tag, INDEFINITE_LENGTH_OCTET};
use bytes::BytesMut;
use std::io::{self, Write};
use x690_core::{Asn1Error, Asn1Result};

/// Shared framing core of the BER generators: writes indefinite headers for
/// the untagged, explicitly tagged and implicitly tagged cases, and the
/// matching end-of-contents octets (doubled when explicitly tagged, closing
/// the wrapper region too).
pub struct BerGenerator<W: Write> {
    out: W,
    tagged: Option<(u32, bool)>,
}

impl<W: Write> BerGenerator<W> {
    fn untagged(out: W) -> Self {
        Self { out, tagged: None }
    }

    fn tagged(out: W, tag_no: u32, explicit: bool) -> Self {
        Self {
            out,
            tagged: Some((tag_no, explicit)),
        }
    }

    /// The raw sink, for writing pre-encoded content or nesting generators.
    pub fn raw_output(&mut self) -> &mut W {
        &mut self.out
    }

    fn write_hdr(&mut self, tag: Tag) -> Asn1Result<()> {
        self.out.write_all(&tag.encode())?;
        self.out.write_all(&[INDEFINITE_LENGTH_OCTET])?;
        Ok(())
    }

    fn write_ber_header(&mut self, tag: Tag) -> Asn1Result<()> {
        match self.tagged {
            None => self.write_hdr(tag),
            Some((tag_no, true)) => {
                self.write_hdr(Tag::context_specific(true, tag_no))?;
                self.write_hdr(tag)
            }
            Some((tag_no, false)) => {
                self.write_hdr(Tag::context_specific(tag.is_constructed(), tag_no))
            }
        }
    }

    fn write_ber_end(&mut self) -> Asn1Result<()> {
        self.out.write_all(&[0x00, 0x00])?;
        if let Some((_, true)) = self.tagged {
            self.out.write_all(&[0x00, 0x00])?;
        }
        Ok(())
    }
}

/// Streaming generator for an indefinite-length SEQUENCE.
///
/// The header goes out on construction; each [`add_object`] writes one
/// fully-encoded child immediately.
///
/// [`add_object`]: BerSequenceGenerator::add_object
pub struct BerSequenceGenerator<W: Write> {
    framing: BerGenerator<W>,
    closed: bool,
}

impl<W: Write> BerSequenceGenerator<W> {
    /// Open an untagged SEQUENCE on the sink.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn new(out: W) -> Asn1Result<Self> {
        Self::build(BerGenerator::untagged(out))
    }

    /// Open a SEQUENCE under a context tag.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn new_tagged(out: W, tag_no: u32, explicit: bool) -> Asn1Result<Self> {
        Self::build(BerGenerator::tagged(out, tag_no, explicit))
    }

    fn build(mut framing: BerGenerator<W>) -> Asn1Result<Self> {
        framing.write_ber_header(Tag::universal(true, universal::SEQUENCE))?;
        Ok(Self { framing, closed: false })
    }

    /// The raw sink, for nesting another generator inside this sequence.
    pub fn raw_output(&mut self) -> &mut W {
        self.framing.raw_output()
    }

    /// Write one child value.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn add_object(&mut self, node: &Asn1Node) -> Asn1Result<()> {
        self.framing.raw_output().write_all(&node.encode())?;
        Ok(())
    }

    /// Write the end-of-contents octets and release the sink.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn close(mut self) -> Asn1Result<()> {
        self.closed = true;
        self.framing.write_ber_end()
    }
}

impl<W: Write> Drop for BerSequenceGenerator<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.framing.write_ber_end();
        }
    }
}

/// Streaming generator for an indefinite-length constructed OCTET STRING.
///
/// Content arrives through an [`OctetWriter`], which frames it into
/// definite-length primitive fragments; a compliant reader sees the
/// concatenated content, never the fragment boundaries.
pub struct BerOctetStringGenerator<W: Write> {
    framing: BerGenerator<W>,
    closed: bool,
}

impl<W: Write> BerOctetStringGenerator<W> {
    /// Open an untagged constructed OCTET STRING on the sink.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn new(out: W) -> Asn1Result<Self> {
        Self::build(BerGenerator::untagged(out))
    }

    /// Open a constructed OCTET STRING under a context tag.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn new_tagged(out: W, tag_no: u32, explicit: bool) -> Asn1Result<Self> {
        Self::build(BerGenerator::tagged(out, tag_no, explicit))
    }

    fn build(mut framing: BerGenerator<W>) -> Asn1Result<Self> {
        framing.write_ber_header(Tag::universal(true, universal::OCTET_STRING))?;
        Ok(Self { framing, closed: false })
    }

    /// A writer that frames every `write` call as one fragment.
    pub fn octet_writer(&mut self) -> OctetWriter<'_, W> {
        OctetWriter {
            framing: &mut self.framing,
            buf: None,
            chunk_size: 0,
        }
    }

    /// A writer that accumulates content and emits fragments of
    /// `chunk_size` bytes, trading memory for fewer, larger fragments.
    pub fn buffered_octet_writer(&mut self, chunk_size: usize) -> OctetWriter<'_, W> {
        let chunk_size = chunk_size.max(1);
        OctetWriter {
            framing: &mut self.framing,
            buf: Some(BytesMut::with_capacity(chunk_size)),
            chunk_size,
        }
    }

    /// Write the end-of-contents octets and release the sink.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn close(mut self) -> Asn1Result<()> {
        self.closed = true;
        self.framing.write_ber_end()
    }
}

impl<W: Write> Drop for BerOctetStringGenerator<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.framing.write_ber_end();
        }
    }
}

/// Output sink of a [`BerOctetStringGenerator`].
///
/// Call [`finish`] when done writing so a buffered partial fragment reaches
/// the sink on the checked path; dropping flushes it best-effort.
///
/// [`finish`]: OctetWriter::finish
pub struct OctetWriter<'a, W: Write> {
    framing: &'a mut BerGenerator<W>,
    buf: Option<BytesMut>,
    chunk_size: usize,
}

impl<W: Write> OctetWriter<'_, W> {
    fn emit_chunk(framing: &mut BerGenerator<W>, chunk: &[u8]) -> io::Result<()> {
        let mut enc = DerEncoder::with_capacity(chunk.len() + 8);
        enc.write_encoded(Tag::universal(false, universal::OCTET_STRING), chunk);
        framing.raw_output().write_all(enc.as_bytes())
    }

    fn flush_partial(&mut self) -> io::Result<()> {
        if let Some(buf) = self.buf.take() {
            if !buf.is_empty() {
                Self::emit_chunk(self.framing, &buf)?;
            }
        }
        Ok(())
    }

    /// Emit any buffered partial fragment.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn finish(mut self) -> Asn1Result<()> {
        self.flush_partial().map_err(Asn1Error::from)
    }
}

impl<W: Write> Write for OctetWriter<'_, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.buf {
            None => {
                if !data.is_empty() {
                    Self::emit_chunk(self.framing, data)?;
                }
                Ok(data.len())
            }
            Some(buf) => {
                let mut rest = data;
                while !rest.is_empty() {
                    let space = self.chunk_size - buf.len();
                    let take = space.min(rest.len());
                    buf.extend_from_slice(&rest[..take]);
                    rest = &rest[take..];
                    if buf.len() == self.chunk_size {
                        Self::emit_chunk(self.framing, buf)?;
                        buf.clear();
                    }
                }
                Ok(data.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.framing.raw_output().flush()
    }
}

impl<W: Write> Drop for OctetWriter<'_, W> {
    fn drop(&mut self) {
        let _ = self.flush_partial();
    }
}

/// Definite-length SEQUENCE generator.
///
/// Children are buffered until [`close`], which writes the tag, the minimal
/// definite length and the content in one piece; DER framing cannot go out
/// before the content length is known.
///
/// [`close`]: DerSequenceGenerator::close
pub struct DerSequenceGenerator<W: Write> {
    out: W,
    buf: Vec<u8>,
    tagged: Option<(u32, bool)>,
    closed: bool,
}

impl<W: Write> DerSequenceGenerator<W> {
    /// Open an untagged SEQUENCE.
    pub fn new(out: W) -> Self {
        Self {
            out,
            buf: Vec::new(),
            tagged: None,
            closed: false,
        }
    }

    /// Open a SEQUENCE under a context tag.
    pub fn new_tagged(out: W, tag_no: u32, explicit: bool) -> Self {
        Self {
            out,
            buf: Vec::new(),
            tagged: Some((tag_no, explicit)),
            closed: false,
        }
    }

    /// Buffer one child value.
    pub fn add_object(&mut self, node: &Asn1Node) {
        self.buf.extend_from_slice(&node.encode());
    }

    fn close_internal(&mut self) -> Asn1Result<()> {
        let mut enc = DerEncoder::with_capacity(self.buf.len() + 16);
        match self.tagged {
            None => enc.write_encoded(Tag::universal(true, universal::SEQUENCE), &self.buf),
            Some((tag_no, false)) => {
                enc.write_encoded(Tag::context_specific(true, tag_no), &self.buf);
            }
            Some((tag_no, true)) => {
                let mut inner = DerEncoder::with_capacity(self.buf.len() + 8);
                inner.write_encoded(Tag::universal(true, universal::SEQUENCE), &self.buf);
                enc.write_encoded(Tag::context_specific(true, tag_no), inner.as_bytes());
            }
        }
        self.out.write_all(enc.as_bytes())?;
        Ok(())
    }

    /// Write the framed sequence to the sink.
    ///
    /// # Errors
    ///
    /// Propagates sink I/O errors unchanged.
    pub fn close(mut self) -> Asn1Result<()> {
        self.closed = true;
        self.close_internal()
    }
}

impl<W: Write> Drop for DerSequenceGenerator<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close_internal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::node::TaggedValue;

    #[test]
    fn test_sequence_generator_output() {
        let mut out = Vec::new();
        let mut generator = BerSequenceGenerator::new(&mut out).unwrap();
        generator.add_object(&Asn1Node::Boolean(true)).unwrap();
        generator.add_object(&Asn1Node::OctetString(vec![0xDE, 0xAD]))
            .unwrap();
        generator.close().unwrap();

        assert_eq!(
            out,
            vec![0x30, 0x80, 0x01, 0x01, 0xFF, 0x04, 0x02, 0xDE, 0xAD, 0x00, 0x00]
        );
        let node = decode(&out).unwrap();
        assert_eq!(node.as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_sequence_generator_explicit_tag_doubles_end() {
        let mut out = Vec::new();
        let generator = BerSequenceGenerator::new_tagged(&mut out, 2, true).unwrap();
        generator.close().unwrap();

        assert_eq!(
            out,
            vec![0xA2, 0x80, 0x30, 0x80, 0x00, 0x00, 0x00, 0x00]
        );
        let node = decode(&out).unwrap();
        let tagged = node.as_tagged().unwrap();
        assert_eq!(tagged.tag_no(), 2);
        assert_eq!(tagged.inner_explicit().unwrap(), &Asn1Node::Sequence(vec![]));
    }

    #[test]
    fn test_sequence_generator_implicit_tag() {
        let mut out = Vec::new();
        let mut generator = BerSequenceGenerator::new_tagged(&mut out, 2, false).unwrap();
        generator.add_object(&Asn1Node::Null).unwrap();
        generator.close().unwrap();

        assert_eq!(out, vec![0xA2, 0x80, 0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_sequence_generator_drop_writes_end() {
        let mut out = Vec::new();
        {
            let mut generator = BerSequenceGenerator::new(&mut out).unwrap();
            generator.add_object(&Asn1Node::Null).unwrap();
            // dropped without close()
        }
        assert_eq!(out, vec![0x30, 0x80, 0x05, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_nested_generators_share_sink() {
        let mut out = Vec::new();
        let mut outer = BerSequenceGenerator::new(&mut out).unwrap();
        {
            let mut inner = BerSequenceGenerator::new(outer.raw_output()).unwrap();
            inner.add_object(&Asn1Node::Null).unwrap();
            inner.close().unwrap();
        }
        outer.close().unwrap();

        let node = decode(&out).unwrap();
        assert_eq!(
            node,
            Asn1Node::Sequence(vec![Asn1Node::Sequence(vec![Asn1Node::Null])])
        );
    }

    #[test]
    fn test_octet_writer_chunk_per_write() {
        let mut out = Vec::new();
        let mut generator = BerOctetStringGenerator::new(&mut out).unwrap();
        {
            let mut writer = generator.octet_writer();
            writer.write_all(&[0xDE, 0xAD]).unwrap();
            writer.write_all(&[0xBE]).unwrap();
            writer.finish().unwrap();
        }
        generator.close().unwrap();

        assert_eq!(
            out,
            vec![0x24, 0x80, 0x04, 0x02, 0xDE, 0xAD, 0x04, 0x01, 0xBE, 0x00, 0x00]
        );
        let node = decode(&out).unwrap();
        assert_eq!(node.as_octet_string().unwrap(), &[0xDE, 0xAD, 0xBE]);
    }

    #[test]
    fn test_buffered_octet_writer_chunking() {
        let content: Vec<u8> = (1..=8).collect();
        let mut out = Vec::new();
        let mut generator = BerOctetStringGenerator::new(&mut out).unwrap();
        {
            let mut writer = generator.buffered_octet_writer(3);
            writer.write_all(&content).unwrap();
            writer.finish().unwrap();
        }
        generator.close().unwrap();

        assert_eq!(
            out,
            vec![
                0x24, 0x80, 0x04, 0x03, 1, 2, 3, 0x04, 0x03, 4, 5, 6, 0x04, 0x02, 7, 8, 0x00,
                0x00
            ]
        );
        let node = decode(&out).unwrap();
        assert_eq!(node.as_octet_string().unwrap(), content.as_slice());
    }

    #[test]
    fn test_buffered_octet_writer_content_invariant() {
        // The decoded content never depends on the chunk size
        let content: Vec<u8> = (0u8..=255).collect();
        for chunk_size in [1usize, 10, 100, 1000] {
            let mut out = Vec::new();
            let mut generator = BerOctetStringGenerator::new(&mut out).unwrap();
            {
                let mut writer = generator.buffered_octet_writer(chunk_size);
                writer.write_all(&content).unwrap();
                writer.finish().unwrap();
            }
            generator.close().unwrap();
            let node = decode(&out).unwrap();
            assert_eq!(
                node.as_octet_string().unwrap(),
                content.as_slice(),
                "chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_der_sequence_generator_matches_node_encoding() {
        let mut out = Vec::new();
        let mut generator = DerSequenceGenerator::new(&mut out);
        generator.add_object(&Asn1Node::Boolean(true));
        generator.add_object(&Asn1Node::OctetString(vec![0xDE, 0xAD]));
        generator.close().unwrap();

        let expected = Asn1Node::Sequence(vec![
            Asn1Node::Boolean(true),
            Asn1Node::OctetString(vec![0xDE, 0xAD]),
        ])
        .encode();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_der_sequence_generator_explicit_tag() {
        let mut out = Vec::new();
        let mut generator = DerSequenceGenerator::new_tagged(&mut out, 5, true);
        generator.add_object(&Asn1Node::Null);
        generator.close().unwrap();

        let expected = Asn1Node::Tagged(TaggedValue::explicit(
            5,
            Asn1Node::Sequence(vec![Asn1Node::Null]),
        ))
        .encode();
        assert_eq!(out, expected);
    }
}
