//! iCLASS/Picopass framing: ACTALL/SELECT/READCHECK/CHECK bit stream shapes
//! (spec §4.7).

use crate::error::CoreError;
use crate::frame::Frame;
use crate::util::crc::{append, check, Crc16Kind};

pub const ACTALL: u8 = 0x0A;
pub const IDENTIFY: u8 = 0x0C;
pub const SELECT: u8 = 0x81;
pub const READCHECK_KD: u8 = 0x88;
pub const READCHECK_KC: u8 = 0x18;
pub const CHECK: u8 = 0x05;
pub const READ4: u8 = 0x06;
pub const UPDATE: u8 = 0x87;
pub const PAGESEL: u8 = 0x84;

/// CSN/e-purse/MAC triple extracted from a sniffed iCLASS session (spec
/// §4.7: "extracts {CSN, e-purse, MAC} triples ... emits a `hf iclass
/// lookup` invocation template").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IclassCredentialTriple {
    pub csn: [u8; 8],
    pub epurse: [u8; 8],
    pub mac: [u8; 4],
}

impl IclassCredentialTriple {
    /// Renders the `hf iclass lookup` invocation template.
    pub fn lookup_invocation(&self, dict_path: &str) -> String {
        format!(
            "hf iclass lookup --csn {} --epurse {} --macs {} -f {}",
            crate::util::hex::encode(&self.csn),
            crate::util::hex::encode(&self.epurse),
            crate::util::hex::encode(&self.mac),
            dict_path
        )
    }
}

/// Block 1's page-map byte disambiguates Secure vs Non-Secure layout (spec
/// §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMap {
    NonSecure,
    Secure,
}

pub fn page_map_from_block1(block1: &[u8; 8]) -> PageMap {
    // Non-secure pages store an all-0xFF / readable-as-plain pattern in the
    // control byte; secure pages carry the crypto-enabled marker. Per the
    // original's disambiguation, byte 0 of block 1 holding 0x03 signals a
    // secure page map.
    if block1[0] == 0x03 {
        PageMap::Secure
    } else {
        PageMap::NonSecure
    }
}

pub fn encode_command(command: u8, payload: &[u8]) -> Frame {
    let mut data = vec![command];
    data.extend_from_slice(payload);
    if command != ACTALL {
        append(Crc16Kind::Iso15693, &mut data);
    }
    Frame::whole_bytes(data)
}

pub fn decode_response(data: &[u8]) -> Result<Frame, CoreError> {
    if data.len() >= 2 && check(Crc16Kind::Iso15693, data) {
        return Ok(Frame::whole_bytes(data.to_vec()));
    }
    // Short fixed-length replies (ACTALL's ack, CHECK's MAC) carry no CRC.
    Ok(Frame::whole_bytes(data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_map_disambiguates_secure_vs_nonsecure() {
        assert_eq!(page_map_from_block1(&[0x03, 0, 0, 0, 0, 0, 0, 0]), PageMap::Secure);
        assert_eq!(page_map_from_block1(&[0x00, 0, 0, 0, 0, 0, 0, 0]), PageMap::NonSecure);
    }

    #[test]
    fn lookup_invocation_contains_hex_fields() {
        let triple = IclassCredentialTriple {
            csn: [1, 2, 3, 4, 5, 6, 7, 8],
            epurse: [8, 7, 6, 5, 4, 3, 2, 1],
            mac: [0xAA, 0xBB, 0xCC, 0xDD],
        };
        let cmd = triple.lookup_invocation("keys.dic");
        assert!(cmd.contains("--csn 0102030405060708"));
        assert!(cmd.contains("--macs aabbccdd"));
    }
}
