//! Object identifier type for ASN.1 OBJECT IDENTIFIER values

use crate::error::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OBJECT IDENTIFIER value, a sequence of unsigned arcs.
///
/// An identifier has at least two arcs; the first arc is 0, 1 or 2, and the
/// second arc is below 40 when the first is 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    arcs: Vec<u64>,
}

impl ObjectIdentifier {
    /// Create a new object identifier from its arcs.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two arcs are given, the first arc is
    /// above 2, or the second arc is 40 or more under a first arc of 0 or 1.
    pub fn new(arcs: Vec<u64>) -> Asn1Result<Self> {
        if arcs.len() < 2 {
            return Err(Asn1Error::InvalidValue(
                "object identifier must have at least 2 arcs".to_string(),
            ));
        }
        if arcs[0] > 2 {
            return Err(Asn1Error::InvalidValue(format!(
                "object identifier root arc must be 0, 1 or 2, got {}",
                arcs[0]
            )));
        }
        if arcs[0] < 2 && arcs[1] >= 40 {
            return Err(Asn1Error::InvalidValue(format!(
                "object identifier second arc must be below 40 under root {}, got {}",
                arcs[0], arcs[1]
            )));
        }
        Ok(Self { arcs })
    }

    /// Parse an object identifier from dotted notation, e.g. `"1.2.840.113549"`.
    ///
    /// # Errors
    ///
    /// Returns an error if a component is not an unsigned integer or the arc
    /// constraints of [`ObjectIdentifier::new`] are violated.
    pub fn from_string(s: &str) -> Asn1Result<Self> {
        let mut arcs = Vec::new();
        for part in s.split('.') {
            let arc = part.parse::<u64>().map_err(|_| {
                Asn1Error::InvalidValue(format!("invalid object identifier arc: {:?}", part))
            })?;
            arcs.push(arc);
        }
        Self::new(arcs)
    }

    /// Get the arcs of the identifier.
    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }

    /// Encode the identifier into X.690 content octets.
    ///
    /// The first two arcs are packed into one subidentifier (`40 * X + Y`);
    /// every subidentifier is emitted in base-128 with the continuation bit
    /// set on all but its last octet.
    pub fn content_octets(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_subidentifier(&mut out, 40 * self.arcs[0] + self.arcs[1]);
        for &arc in &self.arcs[2..] {
            write_subidentifier(&mut out, arc);
        }
        out
    }

    /// Decode an identifier from X.690 content octets.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is empty, a subidentifier starts with
    /// the padding octet `0x80`, a subidentifier is unterminated, or an arc
    /// overflows 64 bits.
    pub fn from_content_octets(content: &[u8]) -> Asn1Result<Self> {
        if content.is_empty() {
            return Err(Asn1Error::InvalidValue(
                "object identifier content must not be empty".to_string(),
            ));
        }

        let mut subidentifiers = Vec::new();
        let mut value = 0u64;
        let mut in_progress = false;
        for &byte in content {
            if !in_progress && byte == 0x80 {
                return Err(Asn1Error::InvalidValue(
                    "object identifier subidentifier has leading 0x80 padding".to_string(),
                ));
            }
            in_progress = true;
            value = value
                .checked_mul(128)
                .and_then(|v| v.checked_add((byte & 0x7F) as u64))
                .ok_or_else(|| {
                    Asn1Error::InvalidValue("object identifier arc overflow".to_string())
                })?;
            if byte & 0x80 == 0 {
                subidentifiers.push(value);
                value = 0;
                in_progress = false;
            }
        }
        if in_progress {
            return Err(Asn1Error::InvalidValue(
                "object identifier subidentifier is unterminated".to_string(),
            ));
        }

        let first = subidentifiers[0];
        let mut arcs = Vec::with_capacity(subidentifiers.len() + 1);
        if first < 40 {
            arcs.push(0);
            arcs.push(first);
        } else if first < 80 {
            arcs.push(1);
            arcs.push(first - 40);
        } else {
            arcs.push(2);
            arcs.push(first - 80);
        }
        arcs.extend_from_slice(&subidentifiers[1..]);
        Self::new(arcs)
    }
}

fn write_subidentifier(out: &mut Vec<u8>, value: u64) {
    let mut stack = [0u8; 10];
    let mut count = 0;
    let mut temp = value;
    loop {
        stack[count] = (temp & 0x7F) as u8;
        count += 1;
        temp >>= 7;
        if temp == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(stack[i] | continuation);
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Asn1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let oid = ObjectIdentifier::from_string("1.2.840.113549").unwrap();
        assert_eq!(oid.arcs(), &[1, 2, 840, 113549]);
        assert_eq!(oid.to_string(), "1.2.840.113549");
    }

    #[test]
    fn test_arc_constraints() {
        assert!(ObjectIdentifier::new(vec![1]).is_err());
        assert!(ObjectIdentifier::new(vec![3, 1]).is_err());
        assert!(ObjectIdentifier::new(vec![0, 40]).is_err());
        assert!(ObjectIdentifier::new(vec![2, 100]).is_ok());
    }

    #[test]
    fn test_content_octets_rsa() {
        // rsaEncryption
        let oid = ObjectIdentifier::from_string("1.2.840.113549.1.1.1").unwrap();
        assert_eq!(
            oid.content_octets(),
            vec![0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01]
        );
    }

    #[test]
    fn test_content_round_trip() {
        for s in ["0.0", "1.2.840.113549.1.7.2", "2.5.4.3", "2.999.1", "1.3.132.0.10"] {
            let oid = ObjectIdentifier::from_string(s).unwrap();
            let back = ObjectIdentifier::from_content_octets(&oid.content_octets()).unwrap();
            assert_eq!(oid, back, "{}", s);
        }
    }

    #[test]
    fn test_leading_padding_rejected() {
        // 0x80 as the first octet of a subidentifier is forbidden padding
        assert!(ObjectIdentifier::from_content_octets(&[0x80, 0x01]).is_err());
        assert!(ObjectIdentifier::from_content_octets(&[0x2A, 0x80, 0x01]).is_err());
    }

    #[test]
    fn test_unterminated_arc_rejected() {
        assert!(ObjectIdentifier::from_content_octets(&[0x2A, 0x86]).is_err());
        assert!(ObjectIdentifier::from_content_octets(&[]).is_err());
    }

    #[test]
    fn test_bad_string() {
        assert!(ObjectIdentifier::from_string("1.two.3").is_err());
        assert!(ObjectIdentifier::from_string("").is_err());
    }
}
