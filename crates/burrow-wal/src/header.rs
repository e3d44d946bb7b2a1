//! Fragment header codec.
//!
//! Each logical record is stored as one or more fragments; every fragment is
//! preceded by a fixed 17-byte header carrying the payload length, the
//! fragment's role, and the id of the segment the record lives in. All
//! fields are little-endian.

/// Encoded size of a fragment header in bytes.
pub const HEADER_SIZE: usize = 17;

/// Role of a fragment in reassembling its logical record.
///
/// A record's fragment sequence is either a single `Full` or
/// `First, Middle*, Last`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FragmentKind {
    First = 1,
    Middle = 2,
    Last = 3,
    Full = 4,
}

impl FragmentKind {
    /// Decode a kind byte. Unknown values read as `None`; recovery turns
    /// that into a malformed-fragment error with position context.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::First),
            2 => Some(Self::Middle),
            3 => Some(Self::Last),
            4 => Some(Self::Full),
            _ => None,
        }
    }
}

/// Header preceding every fragment payload inside a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Number of payload bytes following this header.
    pub payload_size: u64,
    /// Role of the fragment within its record.
    pub kind: FragmentKind,
    /// Segment the record lives in; all fragments of one record agree.
    pub segment_id: u64,
}

impl FragmentHeader {
    pub fn new(payload_size: u64, kind: FragmentKind, segment_id: u64) -> Self {
        Self {
            payload_size,
            kind,
            segment_id,
        }
    }

    /// Serialize to the 17-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..8].copy_from_slice(&self.payload_size.to_le_bytes());
        bytes[8] = self.kind as u8;
        bytes[9..].copy_from_slice(&self.segment_id.to_le_bytes());
        bytes
    }

    /// Parse the 17-byte wire form; `None` for an unknown kind byte.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Option<Self> {
        let mut payload_size = [0u8; 8];
        payload_size.copy_from_slice(&bytes[..8]);
        let mut segment_id = [0u8; 8];
        segment_id.copy_from_slice(&bytes[9..]);

        Some(Self {
            payload_size: u64::from_le_bytes(payload_size),
            kind: FragmentKind::from_u8(bytes[8])?,
            segment_id: u64::from_le_bytes(segment_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        for kind in [
            FragmentKind::First,
            FragmentKind::Middle,
            FragmentKind::Last,
            FragmentKind::Full,
        ] {
            let header = FragmentHeader::new(12_345, kind, 7);
            let decoded = FragmentHeader::decode(&header.encode()).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test]
    fn wire_layout_is_little_endian_in_field_order() {
        let header = FragmentHeader::new(0x0102, FragmentKind::Full, 0x0304);
        let bytes = header.encode();

        assert_eq!(&bytes[..8], &0x0102u64.to_le_bytes());
        assert_eq!(bytes[8], 4);
        assert_eq!(&bytes[9..], &0x0304u64.to_le_bytes());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut bytes = FragmentHeader::new(1, FragmentKind::Full, 1).encode();
        bytes[8] = 9;
        assert!(FragmentHeader::decode(&bytes).is_none());
        assert!(FragmentKind::from_u8(0).is_none());
        assert!(FragmentKind::from_u8(5).is_none());
    }
}
