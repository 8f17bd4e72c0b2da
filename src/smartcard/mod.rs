//! ISO/IEC 7816-3 contact smartcard bridge (spec §4.10/§2 item 10): ATR
//! parsing, TA1-derived Fi/Di/clock-rate conversion table, and the T=0
//! raw-exchange retry rules shared with `apdu`'s contactless T=CL branch.
//!
//! Ground truth: `client/src/cmdsmartcard.c`'s `GetATRTA1`/`DiArray`/
//! `FiArray`/`FArray` tables and `client/src/iso7816/iso7816core.c`'s
//! `Iso7816ExchangeEx` status-word handling (the `0x61 XX`/`0x6C XX` retry
//! rule it shares with the T=CL path in `apdu::apply_sw_retry_rule`).

use crate::error::CoreError;

/// `TA1`'s low nibble selects a baud-rate-adjustment divisor `Di`; entries
/// marked RFU in the original table are `0` (meaning "reserved, do not
/// use").
const DI_TABLE: [u32; 16] = [0, 1, 2, 4, 8, 16, 32, 64, 12, 20, 0, 0, 0, 0, 0, 0];

/// `TA1`'s high nibble selects a clock-rate-conversion factor `Fi`.
const FI_TABLE: [u32; 16] = [
    372, 372, 558, 744, 1116, 1488, 1860, 0, 0, 512, 768, 1024, 1536, 2048, 0, 0,
];

/// `TA1`'s high nibble also selects the card's maximum operating
/// frequency in MHz.
const F_MAX_MHZ: [f64; 16] = [4.0, 5.0, 6.0, 8.0, 12.0, 16.0, 20.0, 0.0, 0.0, 5.0, 7.5, 10.0, 15.0, 20.0, 0.0, 0.0];

/// Default `TA1` when the ATR carries none: `0x11` (`Fi=372, Di=1,
/// fmax=5 MHz`), per `GetATRTA1`'s documented fallback.
pub const DEFAULT_TA1: u8 = 0x11;

/// A parsed ATR: just enough structure to drive clock negotiation. Full
/// interface-byte-group walking (`PrintATR`'s TA2/TB.../TD-chain decode)
/// is display-only and stays out of this core per spec.md's "device
/// byte-stream layout" framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr {
    pub ts: u8,
    pub t0: u8,
    pub ta1: Option<u8>,
}

/// Parses the leading `TS`/`T0`/`TA1` bytes of a raw ATR. `TA1` is present
/// only when `T0`'s bit 4 (`0x10`) is set (`GetATRTA1`).
pub fn parse_atr(raw: &[u8]) -> Result<Atr, CoreError> {
    if raw.len() < 2 {
        return Err(CoreError::WrongLength {
            got: raw.len(),
            expected: 2,
        });
    }
    let ts = raw[0];
    let t0 = raw[1];
    let ta1 = if t0 & 0x10 != 0 {
        raw.get(2).copied()
    } else {
        None
    };
    Ok(Atr { ts, t0, ta1 })
}

impl Atr {
    fn ta1_or_default(&self) -> u8 {
        self.ta1.unwrap_or(DEFAULT_TA1)
    }

    pub fn di(&self) -> u32 {
        DI_TABLE[(self.ta1_or_default() & 0x0F) as usize]
    }

    pub fn fi(&self) -> u32 {
        FI_TABLE[(self.ta1_or_default() >> 4) as usize]
    }

    pub fn f_max_mhz(&self) -> f64 {
        F_MAX_MHZ[(self.ta1_or_default() >> 4) as usize]
    }

    /// Cycles per ETU (`Fi / Di`); `None` when either factor is RFU (`0`).
    pub fn cycles_per_etu(&self) -> Option<u32> {
        let (fi, di) = (self.fi(), self.di());
        if fi == 0 || di == 0 {
            None
        } else {
            Some(fi / di)
        }
    }

    /// Bit rate at the card's negotiated max frequency (`F * 1e6 / (Fi/Di)`).
    pub fn bits_per_second_at_fmax(&self) -> Option<f64> {
        let cpetu = self.cycles_per_etu()?;
        Some(self.f_max_mhz() * 1_000_000.0 / cpetu as f64)
    }
}

/// T=0 status-word outcome after stripping the trailing two SW bytes
/// (`Iso7816ExchangeEx`'s post-exchange handling, shared with `apdu`'s
/// T=CL `apply_sw_retry_rule`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum T0Outcome {
    Ok(Vec<u8>),
    /// `61 XX`: more data available via `GET RESPONSE`, `XX` bytes.
    MoreData(u8),
    /// `6C XX`: reissue the same command with `Le = XX`.
    WrongLe(u8),
    Error(u16),
}

/// Splits `response` into data + status word and classifies the T=0 retry
/// rule.
pub fn classify_t0_response(response: &[u8]) -> Result<T0Outcome, CoreError> {
    if response.len() < 2 {
        return Err(CoreError::WrongLength {
            got: response.len(),
            expected: 2,
        });
    }
    let split = response.len() - 2;
    let sw = u16::from_be_bytes([response[split], response[split + 1]]);
    let data = response[..split].to_vec();
    match sw >> 8 {
        0x61 => Ok(T0Outcome::MoreData((sw & 0xFF) as u8)),
        0x6C => Ok(T0Outcome::WrongLe((sw & 0xFF) as u8)),
        0x90 if sw == 0x9000 => Ok(T0Outcome::Ok(data)),
        _ => Ok(T0Outcome::Error(sw)),
    }
}

/// Per-chunk CRC framing for a firmware upload (spec §4.10: "firmware-
/// upload per-chunk CRC framing"), reusing the CCITT-false CRC the
/// bootloader protocol shares with `util::crc`.
pub fn frame_upload_chunk(chunk: &[u8]) -> Vec<u8> {
    let mut out = chunk.to_vec();
    crate::util::crc::append(crate::util::crc::Crc16Kind::CcittFalse, &mut out);
    out
}
