//! Frame encoding and journal scanning.
//!
//! Every frame is laid out as:
//!
//! ```text
//! | magic (4) | payload len u32 LE (4) | crc32 u32 LE (4) | payload (len) |
//! ```

use crate::error::{StorageError, StorageResult};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"SRJ1";

/// Size of the fixed frame header.
pub const FRAME_HEADER_SIZE: usize = 12;

/// One intact frame read back from a journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Offset of the frame header.
    pub offset: u64,
    /// The payload bytes.
    pub payload: Vec<u8>,
}

/// A damaged frame at the end of the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TornTail {
    /// Offset where the damaged frame starts.
    pub offset: u64,
    /// What was wrong with it.
    pub reason: String,
}

/// Result of scanning a journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalScan {
    /// Intact frames, in append order.
    pub frames: Vec<Frame>,
    /// Number of bytes covered by intact frames.
    pub valid_len: u64,
    /// Damaged trailing frame, if any.
    pub torn_tail: Option<TornTail>,
}

impl JournalScan {
    /// Returns true if the journal ended cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.torn_tail.is_none()
    }
}

/// Encodes a payload into a complete frame.
///
/// # Errors
///
/// Returns [`StorageError::PayloadTooLarge`] if the payload length does not
/// fit in a `u32`.
pub fn encode_frame(payload: &[u8]) -> StorageResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| StorageError::PayloadTooLarge { len: payload.len() })?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&FRAME_MAGIC);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&compute_crc32(payload).to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Scans raw journal bytes into frames.
///
/// Damage confined to the last frame is reported as a torn tail. Damage
/// followed by more data is corruption.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] for a bad magic or checksum anywhere
/// but the final frame.
pub fn scan_frames(bytes: &[u8]) -> StorageResult<JournalScan> {
    let mut scan = JournalScan::default();
    let total = bytes.len();
    let mut pos = 0usize;

    while pos < total {
        let offset = pos as u64;
        let remaining = total - pos;

        if remaining < FRAME_HEADER_SIZE {
            scan.torn_tail = Some(TornTail {
                offset,
                reason: format!("partial header: {remaining} of {FRAME_HEADER_SIZE} bytes"),
            });
            break;
        }

        let header = &bytes[pos..pos + FRAME_HEADER_SIZE];
        if header[0..4] != FRAME_MAGIC {
            return Err(StorageError::corrupted(
                offset,
                format!("bad magic {:?}", &header[0..4]),
            ));
        }

        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let expected_crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        let body_start = pos + FRAME_HEADER_SIZE;
        if len > total - body_start {
            scan.torn_tail = Some(TornTail {
                offset,
                reason: format!(
                    "short payload: {} of {} bytes",
                    total - body_start,
                    len
                ),
            });
            break;
        }

        let payload = &bytes[body_start..body_start + len];
        let actual_crc = compute_crc32(payload);
        if actual_crc != expected_crc {
            let end = body_start + len;
            if end == total {
                scan.torn_tail = Some(TornTail {
                    offset,
                    reason: format!(
                        "checksum mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
                    ),
                });
                break;
            }
            return Err(StorageError::corrupted(
                offset,
                format!("checksum mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"),
            ));
        }

        scan.frames.push(Frame {
            offset,
            payload: payload.to_vec(),
        });
        pos = body_start + len;
        scan.valid_len = pos as u64;
    }

    Ok(scan)
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn journal_of(payloads: &[&[u8]]) -> Vec<u8> {
        payloads
            .iter()
            .flat_map(|p| encode_frame(p).unwrap())
            .collect()
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn empty_journal_is_clean() {
        let scan = scan_frames(&[]).unwrap();
        assert!(scan.frames.is_empty());
        assert!(scan.is_clean());
        assert_eq!(scan.valid_len, 0);
    }

    #[test]
    fn frames_come_back_in_order() {
        let bytes = journal_of(&[b"one", b"", b"three"]);
        let scan = scan_frames(&bytes).unwrap();

        assert_eq!(scan.frames.len(), 3);
        assert_eq!(scan.frames[0].payload, b"one");
        assert_eq!(scan.frames[1].payload, b"");
        assert_eq!(scan.frames[2].payload, b"three");
        assert_eq!(scan.frames[1].offset, (FRAME_HEADER_SIZE + 3) as u64);
        assert_eq!(scan.valid_len, bytes.len() as u64);
    }

    #[test]
    fn partial_header_is_torn_tail() {
        let mut bytes = journal_of(&[b"kept"]);
        let kept_len = bytes.len() as u64;
        bytes.extend_from_slice(&FRAME_MAGIC[..3]);

        let scan = scan_frames(&bytes).unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert_eq!(scan.valid_len, kept_len);
        assert_eq!(scan.torn_tail.unwrap().offset, kept_len);
    }

    #[test]
    fn short_payload_is_torn_tail() {
        let mut bytes = journal_of(&[b"kept", b"cut short"]);
        bytes.truncate(bytes.len() - 4);

        let scan = scan_frames(&bytes).unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert!(scan.torn_tail.unwrap().reason.contains("short payload"));
    }

    #[test]
    fn bad_checksum_on_last_frame_is_torn_tail() {
        let mut bytes = journal_of(&[b"kept", b"flipped"]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let scan = scan_frames(&bytes).unwrap();
        assert_eq!(scan.frames.len(), 1);
        assert!(scan.torn_tail.unwrap().reason.contains("checksum"));
    }

    #[test]
    fn bad_checksum_mid_journal_is_corruption() {
        let mut bytes = journal_of(&[b"first", b"second"]);
        bytes[FRAME_HEADER_SIZE] ^= 0xFF;

        let result = scan_frames(&bytes);
        assert!(matches!(result, Err(StorageError::Corrupted { offset: 0, .. })));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = journal_of(&[b"first"]);
        bytes[0] = b'X';

        let result = scan_frames(&bytes);
        assert!(matches!(result, Err(StorageError::Corrupted { .. })));
    }

    proptest! {
        #[test]
        fn any_truncation_keeps_a_prefix(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
            cut in 0usize..1024,
        ) {
            let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
            let bytes = journal_of(&refs);
            let cut = cut.min(bytes.len());

            let scan = scan_frames(&bytes[..cut]).unwrap();
            prop_assert!(scan.frames.len() <= payloads.len());
            for (frame, payload) in scan.frames.iter().zip(payloads.iter()) {
                prop_assert_eq!(&frame.payload, payload);
            }
            prop_assert!(scan.valid_len <= cut as u64);
        }
    }
}
