//! FeliCa framing: a single length-prefixed packet, CRC-16/FeliCa trailer.

use crate::error::CoreError;
use crate::frame::Frame;
use crate::util::crc::{append, check, Crc16Kind};

pub const CMD_POLLING: u8 = 0x00;
pub const CMD_REQUEST_SERVICE: u8 = 0x02;
pub const CMD_READ_WITHOUT_ENCRYPTION: u8 = 0x06;
pub const CMD_WRITE_WITHOUT_ENCRYPTION: u8 = 0x08;

/// Wraps `payload` in FeliCa's length-prefixed packet shape: `[len+1,
/// ...payload, crc_hi, crc_lo]` where `len` counts the payload only.
pub fn encode_packet(payload: &[u8]) -> Frame {
    let mut data = Vec::with_capacity(1 + payload.len() + 2);
    data.push((payload.len() + 1) as u8);
    data.extend_from_slice(payload);
    append(Crc16Kind::Felica, &mut data);
    Frame::whole_bytes(data)
}

pub fn decode_packet(data: &[u8]) -> Result<Frame, CoreError> {
    if data.is_empty() {
        return Err(CoreError::WrongLength { got: 0, expected: 3 });
    }
    let declared_len = data[0] as usize;
    if declared_len + 2 != data.len() {
        return Err(CoreError::WrongLength {
            got: data.len(),
            expected: declared_len + 2,
        });
    }
    if !check(Crc16Kind::Felica, data) {
        return Err(CoreError::CrcFail);
    }
    Ok(Frame::whole_bytes(data[1..data.len() - 2].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_roundtrips() {
        let f = encode_packet(&[CMD_POLLING, 0xFF, 0xFF, 0x00, 0x00]);
        let decoded = decode_packet(&f.data).unwrap();
        assert_eq!(decoded.data, vec![CMD_POLLING, 0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn packet_rejects_bad_crc() {
        let mut f = encode_packet(&[CMD_POLLING]);
        let last = f.data.len() - 1;
        f.data[last] ^= 0xFF;
        assert!(decode_packet(&f.data).is_err());
    }
}
