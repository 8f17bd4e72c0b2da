//! Multi-protocol HF (13.56 MHz) contactless-card protocol and
//! cryptanalysis core: wire framing, host↔device transport, per-card-family
//! state machines, CRYPTO-1 attacks, trace annotation, and dump file
//! handling for a Proxmark3-class reader. No UI, no device driver, no
//! general-purpose crypto library — those are explicitly out of scope
//! (see each module's doc comment and DESIGN.md's Non-goals section).

#![allow(dead_code)]

pub mod apdu;
pub mod attack;
pub mod crypto1;
pub mod dict;
pub mod dump;
pub mod error;
pub mod frame;
pub mod link;
pub mod protocols;
pub mod session;
pub mod smartcard;
pub mod trace;
pub mod util;

pub use error::{CoreError, ExitCode};
pub use link::Link;
pub use session::{Protocol, Session};
