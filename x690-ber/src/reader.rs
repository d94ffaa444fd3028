//! Bounded reader chain for definite and indefinite content regions
//!
//! The chain is a stack of limit frames over one base byte source. A
//! definite frame stops after its byte count; an indefinite frame holds a
//! two-octet lookahead window and consumes the `00 00` end-of-contents
//! marker. Nested regions share the base source, so closing an inner region
//! re-arms end-of-contents detection on the region beneath it; while a child
//! header or content region is open, the region beneath is disarmed so that
//! zero octets inside the child can never terminate it.

use std::io::Read;
use x690_core::{Asn1Error, Asn1Result};

/// Default limit on nested content regions.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Frame {
    Definite {
        remaining: usize,
    },
    Indefinite {
        b1: u8,
        b2: u8,
        eof_on_00: bool,
        exhausted: bool,
    },
}

/// Stack of length-limit frames over a base byte source.
///
/// All reads route through the top frame down to the base source. One frame
/// is pushed per content region being decoded and popped once the region is
/// consumed; the stack is scoped to a single decode call.
#[derive(Debug)]
pub struct ReaderStack<R> {
    base: R,
    frames: Vec<Frame>,
    max_depth: usize,
}

impl<R: Read> ReaderStack<R> {
    /// Create a stack over a base source with the default depth limit.
    pub fn new(base: R) -> Self {
        Self::with_max_depth(base, DEFAULT_MAX_DEPTH)
    }

    /// Create a stack over a base source with an explicit depth limit.
    pub fn with_max_depth(base: R, max_depth: usize) -> Self {
        Self {
            base,
            frames: Vec::new(),
            max_depth,
        }
    }

    /// The number of open content regions.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Consume the stack, returning the base source.
    pub fn into_inner(self) -> R {
        self.base
    }

    /// Open a definite-length region of exactly `length` content bytes.
    ///
    /// # Errors
    ///
    /// Returns `NestingTooDeep` when the depth limit is reached.
    pub fn push_definite(&mut self, length: usize) -> Asn1Result<()> {
        self.check_depth()?;
        self.frames.push(Frame::Definite { remaining: length });
        Ok(())
    }

    /// Open an indefinite-length region, reading the two lookahead octets.
    ///
    /// # Errors
    ///
    /// Returns `NestingTooDeep` when the depth limit is reached and
    /// `TruncatedInput` if not even the two octets of an end-of-contents
    /// marker are available.
    pub fn push_indefinite(&mut self) -> Asn1Result<()> {
        self.check_depth()?;
        let (Some(b1), Some(b2)) = (self.read_byte()?, self.read_byte()?) else {
            return Err(Asn1Error::TruncatedInput(
                "indefinite-length content ended before end-of-contents marker".to_string(),
            ));
        };
        self.frames.push(Frame::Indefinite {
            b1,
            b2,
            eof_on_00: true,
            exhausted: false,
        });
        Ok(())
    }

    /// Arm or disarm end-of-contents detection on the top indefinite frame.
    ///
    /// No-op when the top frame is not an indefinite region.
    pub fn set_eof_on_00(&mut self, on: bool) {
        if let Some(Frame::Indefinite { eof_on_00, .. }) = self.frames.last_mut() {
            *eof_on_00 = on;
        }
    }

    /// Read one byte through the top region.
    ///
    /// Returns `Ok(None)` when the top region is exhausted: its definite
    /// count is spent, or its end-of-contents marker was consumed. At the
    /// base (no open region), `Ok(None)` is end of input.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` when an enclosing region or the base source
    /// ends while content is still owed.
    pub fn read_byte(&mut self) -> Asn1Result<Option<u8>> {
        self.read_at(self.frames.len())
    }

    fn read_at(&mut self, level: usize) -> Asn1Result<Option<u8>> {
        if level == 0 {
            return self.read_base();
        }
        let idx = level - 1;

        match self.frames[idx] {
            Frame::Definite { remaining } => {
                if remaining == 0 {
                    self.arm_below(idx);
                    return Ok(None);
                }
                if let Frame::Definite { remaining } = &mut self.frames[idx] {
                    *remaining -= 1;
                }
                match self.read_at(idx)? {
                    Some(byte) => Ok(Some(byte)),
                    None => Err(Asn1Error::TruncatedInput(format!(
                        "input ended with {} content byte(s) still owed",
                        remaining
                    ))),
                }
            }
            Frame::Indefinite {
                b1,
                b2,
                eof_on_00,
                exhausted,
            } => {
                if exhausted {
                    return Ok(None);
                }
                if eof_on_00 && b1 == 0x00 && b2 == 0x00 {
                    if let Frame::Indefinite { exhausted, .. } = &mut self.frames[idx] {
                        *exhausted = true;
                    }
                    self.arm_below(idx);
                    return Ok(None);
                }
                let Some(fresh) = self.read_at(idx)? else {
                    if let Frame::Indefinite { exhausted, .. } = &mut self.frames[idx] {
                        *exhausted = true;
                    }
                    return Err(Asn1Error::TruncatedInput(
                        "indefinite-length content ended before end-of-contents marker"
                            .to_string(),
                    ));
                };
                if let Frame::Indefinite { b1: w1, b2: w2, .. } = &mut self.frames[idx] {
                    *w1 = b2;
                    *w2 = fresh;
                }
                Ok(Some(b1))
            }
        }
    }

    fn read_base(&mut self) -> Asn1Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.base.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Re-arm the indefinite frame directly beneath frame `idx`, if any.
    fn arm_below(&mut self, idx: usize) {
        if idx == 0 {
            return;
        }
        if let Frame::Indefinite { eof_on_00, .. } = &mut self.frames[idx - 1] {
            *eof_on_00 = true;
        }
    }

    /// Fill `buf` exactly from the top region.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if the region ends first.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Asn1Result<()> {
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.read_byte()? {
                Some(byte) => *slot = byte,
                None => {
                    return Err(Asn1Error::TruncatedInput(format!(
                        "content region ended after {} of {} byte(s)",
                        i,
                        buf.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Read the rest of the top region into an owned buffer.
    pub fn to_array(&mut self) -> Asn1Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(byte) = self.read_byte()? {
            out.push(byte);
        }
        Ok(out)
    }

    /// Close the top region: drain whatever content is left, pop the frame,
    /// and re-arm end-of-contents detection on the region beneath.
    pub fn pop_frame(&mut self) -> Asn1Result<()> {
        debug_assert!(!self.frames.is_empty(), "pop_frame on an empty stack");
        while self.read_byte()?.is_some() {}
        self.frames.pop();
        self.set_eof_on_00(true);
        Ok(())
    }

    fn check_depth(&self) -> Asn1Result<()> {
        if self.frames.len() >= self.max_depth {
            return Err(Asn1Error::NestingTooDeep(self.max_depth));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stack(data: &[u8]) -> ReaderStack<Cursor<Vec<u8>>> {
        ReaderStack::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn test_definite_region_limit() {
        let mut s = stack(&[1, 2, 3, 4, 5]);
        s.push_definite(3).unwrap();
        assert_eq!(s.to_array().unwrap(), vec![1, 2, 3]);
        assert_eq!(s.read_byte().unwrap(), None);
        s.pop_frame().unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(4));
    }

    #[test]
    fn test_definite_region_truncated() {
        let mut s = stack(&[1, 2, 3]);
        s.push_definite(5).unwrap();
        let err = s.to_array().unwrap_err();
        assert!(matches!(err, Asn1Error::TruncatedInput(_)));
    }

    #[test]
    fn test_indefinite_terminator_consumed() {
        let mut s = stack(&[0xAA, 0xBB, 0x00, 0x00, 0xCC]);
        s.push_indefinite().unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(0xAA));
        assert_eq!(s.read_byte().unwrap(), Some(0xBB));
        assert_eq!(s.read_byte().unwrap(), None);
        s.pop_frame().unwrap();
        // The two zero octets are gone, the next byte follows them
        assert_eq!(s.read_byte().unwrap(), Some(0xCC));
    }

    #[test]
    fn test_indefinite_zeroes_pass_while_disarmed() {
        let mut s = stack(&[0x00, 0x00, 0xAA, 0x00, 0x00]);
        s.push_indefinite().unwrap();
        s.set_eof_on_00(false);
        assert_eq!(s.read_byte().unwrap(), Some(0x00));
        assert_eq!(s.read_byte().unwrap(), Some(0x00));
        assert_eq!(s.read_byte().unwrap(), Some(0xAA));
        s.set_eof_on_00(true);
        assert_eq!(s.read_byte().unwrap(), None);
    }

    #[test]
    fn test_indefinite_missing_terminator() {
        let mut s = stack(&[0xAA, 0xBB, 0xCC]);
        s.push_indefinite().unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(0xAA));
        let err = s.to_array().unwrap_err();
        assert!(matches!(err, Asn1Error::TruncatedInput(_)));
    }

    #[test]
    fn test_indefinite_too_short_for_marker() {
        let mut s = stack(&[0xAA]);
        let err = s.push_indefinite().unwrap_err();
        assert!(matches!(err, Asn1Error::TruncatedInput(_)));
    }

    #[test]
    fn test_definite_inside_indefinite_rearms() {
        let mut s = stack(&[0x01, 0x02, 0x00, 0x00]);
        s.push_indefinite().unwrap();
        // A child header was read: detection off while its content passes
        s.set_eof_on_00(false);
        s.push_definite(2).unwrap();
        assert_eq!(s.to_array().unwrap(), vec![0x01, 0x02]);
        s.pop_frame().unwrap();
        // Closing the child re-armed the outer region
        assert_eq!(s.read_byte().unwrap(), None);
        s.pop_frame().unwrap();
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn test_nested_indefinite_terminators() {
        // Inner region 0xAA terminated by 00 00, then the outer terminator
        let mut s = stack(&[0xAA, 0x00, 0x00, 0x00, 0x00]);
        s.push_indefinite().unwrap();
        s.set_eof_on_00(false);
        s.push_indefinite().unwrap();
        assert_eq!(s.read_byte().unwrap(), Some(0xAA));
        assert_eq!(s.read_byte().unwrap(), None);
        s.pop_frame().unwrap();
        assert_eq!(s.read_byte().unwrap(), None);
        s.pop_frame().unwrap();
    }

    #[test]
    fn test_depth_limit() {
        let mut s = ReaderStack::with_max_depth(Cursor::new(vec![0u8; 16]), 2);
        s.push_definite(8).unwrap();
        s.push_definite(4).unwrap();
        let err = s.push_definite(2).unwrap_err();
        assert!(matches!(err, Asn1Error::NestingTooDeep(2)));
    }

    #[test]
    fn test_read_exact() {
        let mut s = stack(&[1, 2, 3]);
        s.push_definite(2).unwrap();
        let mut buf = [0u8; 2];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);

        let mut long = [0u8; 4];
        s.pop_frame().unwrap();
        let err = s.read_exact(&mut long).unwrap_err();
        assert!(matches!(err, Asn1Error::TruncatedInput(_)));
    }
}
