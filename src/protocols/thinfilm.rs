//! Thinfilm (NFC Barcode) session: single-frame full-payload read, no
//! selection handshake beyond the bare read-all command (spec §4.2).
//!
//! Ground truth: `client/src/cmdhfthinfilm.c`'s `CmdHfThinFilmInfo` — the
//! entire interaction is one request/reply pair, framed by
//! `frame::thinfilm`.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::thinfilm as frame;
use crate::link::{opcode, Link};

/// Reads a Thinfilm tag's fixed 15-byte payload in a single exchange; there
/// is no multi-state session to model (spec §4.2: "fixed single-frame
/// shape").
pub fn read_tag(link: &mut dyn Link, timeout: Duration) -> Result<[u8; frame::PAYLOAD_LEN], CoreError> {
    let request = frame::encode_read_all();
    link.send(opcode::ISO14443A_RAW, [0, 0, 0], &request.data)?;
    let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
    let decoded = frame::decode_payload(&reply.data)?;
    let mut payload = [0u8; frame::PAYLOAD_LEN];
    payload.copy_from_slice(&decoded.data);
    Ok(payload)
}
