//! Arbitrary-precision integer type for ASN.1 INTEGER and ENUMERATED values

use crate::error::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signed integer of arbitrary precision, stored as the big-endian
/// two's-complement content octets of its encoding.
///
/// Decoded values keep their content octets exactly as received, including a
/// non-minimal form a permissive BER producer may have used; two values are
/// equal only if their content octets are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asn1Integer {
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
}

impl Asn1Integer {
    /// Construct from content octets (big-endian two's complement).
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is empty; an INTEGER encoding always has
    /// at least one content octet.
    pub fn from_be_bytes(bytes: Vec<u8>) -> Asn1Result<Self> {
        if bytes.is_empty() {
            return Err(Asn1Error::InvalidValue(
                "integer content must not be empty".to_string(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Construct from an `i64`, using the minimal two's-complement form.
    pub fn from_i64(value: i64) -> Self {
        if value == 0 {
            return Self { bytes: vec![0] };
        }

        let mut bytes = Vec::new();
        if value < 0 {
            let mut temp = value;
            while temp != -1 {
                bytes.push((temp & 0xFF) as u8);
                temp >>= 8;
            }
            // Keep the sign bit set in the most significant byte
            if bytes.is_empty() || (bytes[bytes.len() - 1] & 0x80) == 0 {
                bytes.push(0xFF);
            }
        } else {
            let mut temp = value;
            while temp > 0 {
                bytes.push((temp & 0xFF) as u8);
                temp >>= 8;
            }
            // A set high bit would read as negative, prepend a zero byte
            if (bytes[bytes.len() - 1] & 0x80) != 0 {
                bytes.push(0x00);
            }
        }

        bytes.reverse();
        Self { bytes }
    }

    /// Get the content octets (big-endian two's complement).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to `i64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not fit in 64 bits.
    pub fn to_i64(&self) -> Asn1Result<i64> {
        if self.bytes.len() > 8 {
            return Err(Asn1Error::InvalidValue(format!(
                "integer too large for i64: {} bytes (max 8)",
                self.bytes.len()
            )));
        }

        let is_negative = (self.bytes[0] & 0x80) != 0;
        let mut value = 0i64;
        for &byte in &self.bytes {
            value = (value << 8) | (byte as i64);
        }

        if is_negative {
            let shift = 64 - self.bytes.len() * 8;
            value = (value << shift) >> shift;
        }

        Ok(value)
    }

    /// Whether the value is negative.
    pub fn is_negative(&self) -> bool {
        (self.bytes[0] & 0x80) != 0
    }

    /// Whether the content octets are in the minimal (DER) form.
    pub fn is_minimal(&self) -> bool {
        if self.bytes.len() < 2 {
            return true;
        }
        // First nine bits must not be all zeros or all ones
        !((self.bytes[0] == 0x00 && self.bytes[1] & 0x80 == 0)
            || (self.bytes[0] == 0xFF && self.bytes[1] & 0x80 != 0))
    }
}

impl From<i64> for Asn1Integer {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl fmt::Display for Asn1Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_i64() {
            Ok(v) => write!(f, "{}", v),
            Err(_) => {
                write!(f, "0x")?;
                for byte in &self.bytes {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_i64_minimal() {
        assert_eq!(Asn1Integer::from_i64(0).as_bytes(), &[0x00]);
        assert_eq!(Asn1Integer::from_i64(127).as_bytes(), &[0x7F]);
        assert_eq!(Asn1Integer::from_i64(128).as_bytes(), &[0x00, 0x80]);
        assert_eq!(Asn1Integer::from_i64(1001).as_bytes(), &[0x03, 0xE9]);
        assert_eq!(Asn1Integer::from_i64(-1).as_bytes(), &[0xFF]);
        assert_eq!(Asn1Integer::from_i64(-128).as_bytes(), &[0x80]);
        assert_eq!(Asn1Integer::from_i64(-129).as_bytes(), &[0xFF, 0x7F]);
    }

    #[test]
    fn test_to_i64_round_trip() {
        for v in [0i64, 1, -1, 127, 128, -128, -129, 1001, i64::MAX, i64::MIN] {
            assert_eq!(Asn1Integer::from_i64(v).to_i64().unwrap(), v);
        }
    }

    #[test]
    fn test_sign_extension() {
        let n = Asn1Integer::from_be_bytes(vec![0xFF, 0x7F]).unwrap();
        assert_eq!(n.to_i64().unwrap(), -129);
        assert!(n.is_negative());
    }

    #[test]
    fn test_too_large_for_i64() {
        let n = Asn1Integer::from_be_bytes(vec![0x01; 9]).unwrap();
        assert!(n.to_i64().is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(Asn1Integer::from_be_bytes(vec![]).is_err());
    }

    #[test]
    fn test_minimal_detection() {
        assert!(Asn1Integer::from_i64(5).is_minimal());
        assert!(!Asn1Integer::from_be_bytes(vec![0x00, 0x05]).unwrap().is_minimal());
        assert!(!Asn1Integer::from_be_bytes(vec![0xFF, 0xFF]).unwrap().is_minimal());
        // 0x00 0x80 is the minimal form of 128
        assert!(Asn1Integer::from_be_bytes(vec![0x00, 0x80]).unwrap().is_minimal());
    }
}
