//! ISO/IEC 15693 framing: flag byte (datarate/subcarrier/inventory/slot/
//! addressed/option bits), 8-byte low-endian UID addressing, CRC-15693
//! trailer (spec §4.2, §4.6).

use crate::error::CoreError;
use crate::frame::Frame;
use crate::util::crc::{append, check, Crc16Kind};

pub mod flag {
    pub const SUBCARRIER_DUAL: u8 = 1 << 0;
    pub const DATA_RATE_HIGH: u8 = 1 << 1;
    pub const INVENTORY: u8 = 1 << 2;
    pub const PROTOCOL_EXTENSION: u8 = 1 << 3;
    /// Meaning of bit 4 depends on `INVENTORY`: AFI-present when inventory,
    /// addressed-mode otherwise.
    pub const AFI_PRESENT_OR_ADDRESSED: u8 = 1 << 4;
    /// Meaning of bit 5 depends on `INVENTORY`: 16-slot selection vs option.
    pub const NB_SLOTS_OR_SELECT: u8 = 1 << 5;
    pub const OPTION: u8 = 1 << 6;
}

pub const CMD_INVENTORY: u8 = 0x01;
pub const CMD_READ_SINGLE_BLOCK: u8 = 0x20;
pub const CMD_WRITE_SINGLE_BLOCK: u8 = 0x21;
pub const CMD_GET_SYSTEM_INFO: u8 = 0x2B;

/// Builds an addressed request: flags, command, 8-byte low-endian UID, then
/// whatever command-specific bytes the caller supplies, with CRC-15693
/// appended.
pub fn encode_addressed_request(flags: u8, command: u8, uid: [u8; 8], extra: &[u8]) -> Frame {
    let mut data = Vec::with_capacity(2 + 8 + extra.len() + 2);
    data.push(flags | flag::AFI_PRESENT_OR_ADDRESSED);
    data.push(command);
    let mut uid_le = uid;
    uid_le.reverse(); // UID is transmitted low-endian; stored high-to-low here
    data.extend_from_slice(&uid_le);
    data.extend_from_slice(extra);
    append(Crc16Kind::Iso15693, &mut data);
    Frame::whole_bytes(data)
}

/// Builds a non-addressed (broadcast) request: flags, command, then
/// command-specific bytes, CRC-15693 appended.
pub fn encode_unaddressed_request(flags: u8, command: u8, extra: &[u8]) -> Frame {
    let mut data = Vec::with_capacity(2 + extra.len() + 2);
    data.push(flags & !flag::AFI_PRESENT_OR_ADDRESSED);
    data.push(command);
    data.extend_from_slice(extra);
    append(Crc16Kind::Iso15693, &mut data);
    Frame::whole_bytes(data)
}

pub fn decode_frame(data: &[u8]) -> Result<Frame, CoreError> {
    if data.len() < 2 || !check(Crc16Kind::Iso15693, data) {
        return Err(CoreError::CrcFail);
    }
    Ok(Frame::whole_bytes(data.to_vec()))
}

/// Inventory reply is 12 bytes: flags/DSFID byte, 8-byte UID, CRC (spec
/// §4.6: "expect 12-byte reply (DSFID+UID+CRC)").
pub fn decode_inventory_reply(data: &[u8]) -> Result<(u8, [u8; 8]), CoreError> {
    let frame = decode_frame(data)?;
    if frame.data.len() != 12 {
        return Err(CoreError::WrongLength {
            got: frame.data.len(),
            expected: 12,
        });
    }
    let dsfid = frame.data[0];
    let mut uid = [0u8; 8];
    uid.copy_from_slice(&frame.data[1..9]);
    uid.reverse(); // back to high-to-low storage order
    Ok((dsfid, uid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressed_request_roundtrips() {
        let uid = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let f = encode_addressed_request(flag::DATA_RATE_HIGH, CMD_READ_SINGLE_BLOCK, uid, &[0x00]);
        assert!(decode_frame(&f.data).is_ok());
        assert_eq!(f.data[1], CMD_READ_SINGLE_BLOCK);
    }

    #[test]
    fn inventory_reply_shape() {
        let mut data = vec![0x00u8, 1, 2, 3, 4, 5, 6, 7, 8];
        append(Crc16Kind::Iso15693, &mut data);
        let (dsfid, uid) = decode_inventory_reply(&data).unwrap();
        assert_eq!(dsfid, 0x00);
        assert_eq!(uid, [8, 7, 6, 5, 4, 3, 2, 1]);
    }
}
