//! ISO/IEC 14443-B framing: fixed SOF/EOF, clean 8-bit bytes (no per-byte
//! parity), CRC-16-B trailer. Ground truth: `include/iso14b.h` (command
//! flag bits, ETU/SSP timing conversion macros).

use crate::error::CoreError;
use crate::frame::Frame;
use crate::util::crc::{append, check, Crc16Kind};

pub const REQB: u8 = 0x05;
pub const ATTRIB: u8 = 0x1D;

/// `iso14b_command_t` flag bits from `include/iso14b.h`.
pub mod flags {
    pub const CONNECT: u16 = 1 << 0;
    pub const DISCONNECT: u16 = 1 << 1;
    pub const APDU: u16 = 1 << 2;
    pub const RAW: u16 = 1 << 3;
    pub const REQUEST_TRIGGER: u16 = 1 << 4;
    pub const APPEND_CRC: u16 = 1 << 5;
    pub const SELECT_STD: u16 = 1 << 6;
    pub const SELECT_SR: u16 = 1 << 7;
    pub const SET_TIMEOUT: u16 = 1 << 8;
    pub const SEND_CHAINING: u16 = 1 << 9;
    pub const SELECT_CTS: u16 = 1 << 10;
    pub const CLEARTRACE: u16 = 1 << 11;
}

/// `ETU_TO_SSP`/`SSP_TO_ETU`/`US_TO_SSP`/`SSP_TO_US` conversions.
pub fn etu_to_ssp(etu: u32) -> u32 {
    etu * 32
}

pub fn ssp_to_etu(ssp: u32) -> u32 {
    ssp / 32
}

pub fn us_to_ssp(us: f64) -> u32 {
    (us * 3.39) as u32
}

pub fn ssp_to_us(ssp: u32) -> u32 {
    (ssp as f64 / 3.39) as u32
}

pub fn encode_frame(payload: &[u8]) -> Frame {
    let mut data = payload.to_vec();
    append(Crc16Kind::Iso14443B, &mut data);
    Frame::whole_bytes(data)
}

pub fn decode_frame(data: &[u8]) -> Result<Frame, CoreError> {
    if data.len() < 2 || !check(Crc16Kind::Iso14443B, data) {
        return Err(CoreError::CrcFail);
    }
    Ok(Frame::whole_bytes(data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrips() {
        let f = encode_frame(&[REQB, 0x00, 0x00]);
        assert!(decode_frame(&f.data).is_ok());
    }

    #[test]
    fn etu_ssp_roundtrip() {
        assert_eq!(ssp_to_etu(etu_to_ssp(100)), 100);
    }
}
