//! iCLASS/Picopass: selection sequence, CSN/ePurse/key-C/key-D model, and
//! page-map disambiguation (spec §4.7).
//!
//! Ground truth: `client/src/cmdhficlass.h` (`get_pagemap`,
//! `check_known_default`, `GenerateMacFrom` — the `CSN`/`CCNR` naming this
//! module's [`Session`] mirrors) and `frame::iclass`'s command byte
//! constants for `ACTALL`/`SELECT`/`READCHECK`/`CHECK`.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::iclass::{self as iclass_frame, IclassCredentialTriple, PageMap};
use crate::link::{opcode, Link};

pub struct Idle;
pub struct Selected {
    pub csn: [u8; 8],
}
pub struct Checked {
    pub csn: [u8; 8],
    pub epurse: [u8; 8],
}

pub struct IclassSession<S> {
    state: S,
}

impl IclassSession<Idle> {
    pub fn new() -> Self {
        IclassSession { state: Idle }
    }

    /// `ACTALL -> SELECT(CSN)` (spec §4.7).
    pub fn select(
        self,
        link: &mut dyn Link,
        timeout: Duration,
    ) -> Result<IclassSession<Selected>, CoreError> {
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[iclass_frame::ACTALL])?;
        link.wait(opcode::ISO14443A_RAW, timeout)?;
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[iclass_frame::SELECT])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.data.len() != 8 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 8,
            });
        }
        let mut csn = [0u8; 8];
        csn.copy_from_slice(&reply.data);
        Ok(IclassSession {
            state: Selected { csn },
        })
    }
}

impl Default for IclassSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl IclassSession<Selected> {
    /// `READCHECK(e-purse)` against key-D (the common default) or key-C.
    pub fn read_check(
        self,
        link: &mut dyn Link,
        use_key_c: bool,
        timeout: Duration,
    ) -> Result<IclassSession<Checked>, CoreError> {
        let cmd = if use_key_c {
            iclass_frame::READCHECK_KC
        } else {
            iclass_frame::READCHECK_KD
        };
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[cmd])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.data.len() != 8 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 8,
            });
        }
        let mut epurse = [0u8; 8];
        epurse.copy_from_slice(&reply.data);
        Ok(IclassSession {
            state: Checked {
                csn: self.state.csn,
                epurse,
            },
        })
    }
}

impl IclassSession<Checked> {
    /// `CHECK` sends the reader's MAC and expects the card's to validate;
    /// this models the request/response shape, not the MAC computation
    /// itself (spec.md's "no general-purpose cryptographic library"
    /// Non-goal — MAC generation is `GenerateMacFrom`'s job, external here).
    pub fn check(
        &mut self,
        link: &mut dyn Link,
        reader_mac: [u8; 4],
        timeout: Duration,
    ) -> Result<[u8; 4], CoreError> {
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &reader_mac)?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.data.len() != 4 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 4,
            });
        }
        let mut tag_mac = [0u8; 4];
        tag_mac.copy_from_slice(&reply.data);
        Ok(tag_mac)
    }

    pub fn into_credential_triple(self, mac: [u8; 4]) -> IclassCredentialTriple {
        IclassCredentialTriple {
            csn: self.state.csn,
            epurse: self.state.epurse,
            mac,
        }
    }
}

/// Disambiguates Secure vs Non-Secure page-map layout from block 1's
/// control byte (`get_pagemap`).
pub fn page_map(block1: &[u8; 8]) -> PageMap {
    iclass_frame::page_map_from_block1(block1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeviceReply, FakeLink};

    #[test]
    fn select_readcheck_check_sequence() {
        let csn = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let epurse = [8u8, 7, 6, 5, 4, 3, 2, 1];
        let tag_mac = [0xAAu8, 0xBB, 0xCC, 0xDD];

        let mut link = FakeLink::new()
            .expect(opcode::ISO14443A_RAW, DeviceReply::ok(opcode::ISO14443A_RAW))
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: csn.to_vec(),
                },
            )
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: epurse.to_vec(),
                },
            )
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: tag_mac.to_vec(),
                },
            );

        let selected = IclassSession::new().select(&mut link, Duration::from_millis(500)).unwrap();
        let mut checked = selected.read_check(&mut link, false, Duration::from_millis(500)).unwrap();
        let mac = checked.check(&mut link, [0u8; 4], Duration::from_millis(500)).unwrap();
        assert_eq!(mac, tag_mac);

        let triple = checked.into_credential_triple(mac);
        assert_eq!(triple.csn, csn);
        assert_eq!(triple.epurse, epurse);
        assert_eq!(
            triple.lookup_invocation("iclass_default_keys.dic"),
            "hf iclass lookup --csn 0102030405060708 --epurse 0807060504030201 --macs aabbccdd -f iclass_default_keys.dic"
        );
    }

    #[test]
    fn page_map_delegates_to_frame_helper() {
        assert_eq!(page_map(&[0x03, 0, 0, 0, 0, 0, 0, 0]), PageMap::Secure);
    }
}
