//! Topaz (NFC Forum Type 1 Tag, Innovision Jewel) framing: reader commands
//! may arrive as up to nine 7-bit fragments; adjacent reader fragments
//! whose combined length is <=16 bytes are merged into one logical frame,
//! except WUPA/REQA (spec §4.2, reused by the trace engine's merge pass —
//! spec §4.8 step 2).

pub const WUPA: u8 = 0x40;
pub const REQA: u8 = 0x01;
pub const RID: u8 = 0x78;
pub const RALL: u8 = 0x00;
pub const READ8: u8 = 0x01;
pub const WRITE_E: u8 = 0x53;
pub const WRITE_NE: u8 = 0x1A;

const MERGE_LIMIT_BYTES: usize = 16;
const MAX_FRAGMENTS: usize = 9;

/// One raw reader fragment as it arrives off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderFragment {
    pub bytes: Vec<u8>,
    pub is_wupa_or_reqa: bool,
}

/// Greedily merges a run of adjacent reader fragments into logical frames.
/// WUPA/REQA fragments are never merged with anything (spec: "not for
/// WUPA/REQA"); everything else merges while the running total stays
/// `<= 16` bytes and the fragment count stays within `MAX_FRAGMENTS`.
pub fn merge_reader_fragments(fragments: &[ReaderFragment]) -> Vec<Vec<u8>> {
    let mut merged = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut current_fragment_count = 0usize;

    let flush = |current: &mut Vec<u8>, merged: &mut Vec<Vec<u8>>, count: &mut usize| {
        if !current.is_empty() {
            merged.push(std::mem::take(current));
        }
        *count = 0;
    };

    for frag in fragments {
        if frag.is_wupa_or_reqa {
            flush(&mut current, &mut merged, &mut current_fragment_count);
            merged.push(frag.bytes.clone());
            continue;
        }
        let would_be_len = current.len() + frag.bytes.len();
        if would_be_len > MERGE_LIMIT_BYTES || current_fragment_count >= MAX_FRAGMENTS {
            flush(&mut current, &mut merged, &mut current_fragment_count);
        }
        current.extend_from_slice(&frag.bytes);
        current_fragment_count += 1;
    }
    flush(&mut current, &mut merged, &mut current_fragment_count);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(bytes: &[u8]) -> ReaderFragment {
        ReaderFragment {
            bytes: bytes.to_vec(),
            is_wupa_or_reqa: false,
        }
    }

    #[test]
    fn adjacent_small_fragments_merge() {
        let fragments = vec![frag(&[0x01]), frag(&[0x02]), frag(&[0x03])];
        let merged = merge_reader_fragments(&fragments);
        assert_eq!(merged, vec![vec![0x01, 0x02, 0x03]]);
    }

    #[test]
    fn merge_stops_at_16_bytes() {
        let fragments: Vec<_> = (0u8..20).map(|b| frag(&[b])).collect();
        let merged = merge_reader_fragments(&fragments);
        assert_eq!(merged[0].len(), 16.min(9)); // also bounded by fragment count
    }

    #[test]
    fn wupa_reqa_never_merge() {
        let fragments = vec![
            frag(&[0x01]),
            ReaderFragment {
                bytes: vec![WUPA],
                is_wupa_or_reqa: true,
            },
            frag(&[0x02]),
        ];
        let merged = merge_reader_fragments(&fragments);
        assert_eq!(merged, vec![vec![0x01], vec![WUPA], vec![0x02]]);
    }
}
