//! Minimal hex encode/decode used by the dump-file readers (`.eml`/`.mct`/
//! JSON `blocks` map). No external hex crate is pulled in for this — it is a
//! handful of lines and every other ambient concern (errors, serde, CRC) is
//! already grounded on the teacher/pack's actual dependency choices.

use crate::error::CoreError;

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

pub fn decode(s: &str) -> Result<Vec<u8>, CoreError> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Err(CoreError::MalformedDump(format!(
            "odd-length hex string: {}",
            s
        )));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| CoreError::MalformedDump(format!("bad hex byte at offset {}", i)))
        })
        .collect()
}
