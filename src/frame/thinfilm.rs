//! NFC-barcode (Thinfilm) framing: a fixed single-frame shape — the tag
//! replies to a single read command with its full payload in one frame, no
//! chaining or continuation (spec §4.2).

use crate::error::CoreError;
use crate::frame::Frame;

pub const READ_ALL: u8 = 0x01;
/// Thinfilm tags carry a fixed 120-bit (15-byte) payload.
pub const PAYLOAD_LEN: usize = 15;

pub fn encode_read_all() -> Frame {
    Frame::whole_bytes(vec![READ_ALL])
}

pub fn decode_payload(data: &[u8]) -> Result<Frame, CoreError> {
    if data.len() != PAYLOAD_LEN {
        return Err(CoreError::WrongLength {
            got: data.len(),
            expected: PAYLOAD_LEN,
        });
    }
    Ok(Frame::whole_bytes(data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_payload() {
        assert!(decode_payload(&[0u8; 10]).is_err());
        assert!(decode_payload(&[0u8; PAYLOAD_LEN]).is_ok());
    }
}
