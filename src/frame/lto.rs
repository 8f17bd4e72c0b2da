//! LTO-CM (LEGO Dimensions-style) framing: reuses `iso14a`'s WUPA/select
//! primitives plus its own block-read continuation shape (spec §4.7):
//! `WUPA -> select-SN (0x93 0x20) -> select (0x93 0x70 + UID + CRC)`,
//! verify SAK `0x0A`. Block read is `0x30 blk` then `0x80` continuation to
//! fetch bytes 16..31. Block write is `0xA0 blk` then two 16-byte
//! CRC-framed chunks, each expecting a `0x0A` ACK.

use crate::error::CoreError;
use crate::frame::iso14a;
use crate::frame::Frame;
use crate::util::crc::{append, check, Crc16Kind};

pub const SELECT_SN: [u8; 2] = [0x93, 0x20];
pub const SELECT: u8 = 0x93;
pub const EXPECTED_SAK: u8 = 0x0A;
pub const READ_CONTINUATION: u8 = 0x80;
pub const ACK: u8 = 0x0A;

pub fn encode_select(uid: [u8; 4]) -> Frame {
    let mut data = vec![SELECT, 0x70];
    data.extend_from_slice(&uid);
    append(Crc16Kind::Iso14443A, &mut data);
    Frame::whole_bytes(data)
}

pub fn encode_read_block(block: u8) -> Frame {
    iso14a::encode_standard_frame(&[0x30, block])
}

pub fn encode_read_continuation() -> Frame {
    iso14a::encode_bare_frame(&[READ_CONTINUATION])
}

pub fn encode_write_block(block: u8) -> Frame {
    iso14a::encode_standard_frame(&[0xA0, block])
}

pub fn encode_write_chunk(chunk: &[u8; 16]) -> Frame {
    let mut data = chunk.to_vec();
    append(Crc16Kind::Iso14443A, &mut data);
    Frame::whole_bytes(data)
}

pub fn verify_sak(sak: u8) -> Result<(), CoreError> {
    if sak != EXPECTED_SAK {
        return Err(CoreError::UnexpectedOpcode {
            got: sak as u16,
            expected: EXPECTED_SAK as u16,
        });
    }
    Ok(())
}

/// Card capacity (in 16-byte blocks) from the type-info byte (spec §4.7):
/// `0x01 -> 101`, `0x02 -> 95`, `0x03 -> 255`.
pub fn block_count_from_type_info(type_info: u8) -> Result<u32, CoreError> {
    match type_info {
        0x01 => Ok(101),
        0x02 => Ok(95),
        0x03 => Ok(255),
        other => Err(CoreError::UnsupportedMode(format!(
            "unknown LTO-CM type-info byte {:#04x}",
            other
        ))),
    }
}

pub fn check_read_page(data: &[u8]) -> Result<Frame, CoreError> {
    if data.len() < 2 || !check(Crc16Kind::Iso14443A, data) {
        return Err(CoreError::CrcFail);
    }
    Ok(Frame::whole_bytes(data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sak_is_verified() {
        assert!(verify_sak(EXPECTED_SAK).is_ok());
        assert!(verify_sak(0x00).is_err());
    }

    #[test]
    fn type_info_maps_to_block_counts() {
        assert_eq!(block_count_from_type_info(0x01).unwrap(), 101);
        assert_eq!(block_count_from_type_info(0x02).unwrap(), 95);
        assert_eq!(block_count_from_type_info(0x03).unwrap(), 255);
        assert!(block_count_from_type_info(0x99).is_err());
    }

    #[test]
    fn write_chunk_has_crc() {
        let f = encode_write_chunk(&[0u8; 16]);
        assert_eq!(f.data.len(), 18);
    }
}
