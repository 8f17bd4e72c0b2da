//! Ambient per-interaction state (spec §9: "group them in an explicit
//! Session value threaded through calls").
//!
//! The original keeps the active protocol tag, the negotiated APDU frame
//! length, a debug level and the device-owned trace buffer as module
//! statics (`iso14a_pcb_blocknum`, `apdu_frame_length`, etc. scattered across
//! `cmdhficlass.c`/`iso7816core.c`/`cmdtrace.c`). This port collects them
//! into one `Session` value instead, matching the teacher's own
//! `WizardMachine` idea of "hold interaction state in one struct the caller
//! owns" (`state.rs`) rather than process globals.

use std::time::Duration;

/// Tagged protocol variant, spec §9's suggested `Protocol::{...}` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Iso14a,
    Iso14b,
    Iso15,
    IClass,
    Legic,
    Topaz,
    Felica,
    Lto,
    Thinfilm,
    Mfc,
    Mfp,
    Mfdes,
    Seos,
    CryptoRf,
    Raw,
}

/// Default per-command timeout (spec §5 "Timeouts": "default 2500 ms").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLevel {
    Off,
    Error,
    Info,
    Full,
}

/// Groups the state the original's goto-laden C keeps in module statics:
/// active protocol, negotiated APDU frame length, a per-call timeout
/// override, debug verbosity, and the device-owned trace buffer once it has
/// been downloaded to the host.
pub struct Session {
    pub active_protocol: Option<Protocol>,
    pub apdu_frame_length: usize,
    pub timeout: Duration,
    pub debug_level: DebugLevel,
    pub trace_buffer: Vec<u8>,
    /// Cooperative-cancellation flag sampled between loop iterations (spec
    /// §5: "user Ctrl-C sets a keyboard-pressed flag ... the loop issues a
    /// BREAK_LOOP"). Set by the CLI adaptor, read by long-running drivers
    /// (dictionary check, AFI brute, hardnested).
    pub break_requested: bool,
}

impl Session {
    pub fn new() -> Self {
        Session {
            active_protocol: None,
            apdu_frame_length: 0,
            timeout: DEFAULT_TIMEOUT,
            debug_level: DebugLevel::Off,
            trace_buffer: Vec::new(),
            break_requested: false,
        }
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Spec §5 cancellation contract: call between loop iterations of any
    /// long-running driver; `true` means the caller must issue `BREAK_LOOP`
    /// to the device and drop the field.
    pub fn should_break(&self) -> bool {
        self.break_requested
    }

    pub fn request_break(&mut self) {
        self.break_requested = true;
    }

    pub fn reset_break(&mut self) {
        self.break_requested = false;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    timeout: Option<Duration>,
    debug_level: Option<DebugLevel>,
}

impl SessionBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = Some(level);
        self
    }

    pub fn build(self) -> Session {
        let mut session = Session::new();
        if let Some(t) = self.timeout {
            session.timeout = t;
        }
        if let Some(d) = self.debug_level {
            session.debug_level = d;
        }
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_has_default_timeout() {
        let s = Session::new();
        assert_eq!(s.timeout, DEFAULT_TIMEOUT);
        assert!(s.active_protocol.is_none());
    }

    #[test]
    fn builder_overrides_timeout_and_debug_level() {
        let s = Session::builder()
            .timeout(Duration::from_millis(100))
            .debug_level(DebugLevel::Full)
            .build();
        assert_eq!(s.timeout, Duration::from_millis(100));
        assert_eq!(s.debug_level, DebugLevel::Full);
    }

    #[test]
    fn break_flag_round_trips() {
        let mut s = Session::new();
        assert!(!s.should_break());
        s.request_break();
        assert!(s.should_break());
        s.reset_break();
        assert!(!s.should_break());
    }
}
