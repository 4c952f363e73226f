//! Callbacks invoked by the terminal input parser.
//!
//! [`Parser::write`](crate::Parser::write) walks a byte stream and
//! translates it into higher-level terminal events, handing each off to a
//! [`Callbacks`] implementation supplied by the caller. Implementations
//! mutate the screen/grid model, update UI state, or do whatever else the
//! embedding terminal needs; none of that belongs in the parser itself.
//!
//! Every hook returns a `bool` indicating whether it handled the event.
//! `false` is not an error: the parser logs the event as unhandled (via
//! the `log` crate) and continues. A hook left at its default
//! implementation always reports "unhandled", so callers only need to
//! implement the events they actually care about.
use crate::csi::CsiArg;

/// A fragment of an OSC or DCS string body.
///
/// OSC/DCS payloads can span multiple `write()` calls (arbitrary
/// fragmentation) and can also be split mid-call by an interleaved C0
/// control or NUL/DEL byte. `bytes` borrows directly from the input slice
/// passed to `write` (no copy is made), so a fragment's lifetime never
/// outlives that call. Implementations that need to retain the payload
/// must copy it out during the callback.
#[derive(Debug, Clone, Copy)]
pub struct StringFragment<'a> {
    pub bytes: &'a [u8],
    /// True for the first fragment of a given OSC/DCS string.
    pub initial: bool,
    /// True for the fragment that carries the string terminator.
    pub is_final: bool,
}

/// Consumer-facing interface for terminal events emitted by the parser.
///
/// Each method corresponds to a class of escape sequence or printable run
/// recognized while decoding a byte stream. All methods have a default
/// no-op implementation reporting "unhandled", except [`text`](Self::text)
/// whose default declines to consume anything (forcing the parser to
/// step one byte at a time, effectively dropping undispatched text).
pub trait Callbacks {
    /// A printable run in `NORMAL` state. `bytes` starts at the first
    /// printable byte and extends to the end of the input buffer still
    /// available this call; the return value is how many bytes were
    /// consumed. Returning more than `bytes.len()` is a caller bug and is
    /// clamped by the parser to `bytes.len()`.
    fn text(&mut self, bytes: &[u8]) -> usize {
        let _ = bytes;
        0
    }

    /// A single C0 control (other than NUL/DEL/CAN/SUB/ESC, or BEL used
    /// as a string terminator) or an unmapped C1 control.
    fn control(&mut self, byte: u8) -> bool {
        let _ = byte;
        false
    }

    /// `ESC` followed by intermediates and a final byte (0x30-0x7e),
    /// outside of CSI/OSC/DCS. `sequence` is the intermediates followed
    /// by the final byte, in order; it does not include the ESC itself.
    fn escape(&mut self, sequence: &[u8]) -> bool {
        let _ = sequence;
        false
    }

    /// A completed CSI sequence. `leader` is `None` when no private
    /// marker byte (0x3c-0x3f) was present; `intermediates` is `None`
    /// when empty.
    fn csi(
        &mut self,
        leader: Option<&[u8]>,
        args: &[CsiArg],
        intermediates: Option<&[u8]>,
        final_byte: u8,
    ) -> bool {
        let _ = (leader, args, intermediates, final_byte);
        false
    }

    /// One fragment of an OSC string. `command` is `-1` when no digits
    /// preceded the first `;` (or there was no `;` at all).
    fn osc(&mut self, command: i32, fragment: StringFragment<'_>) -> bool {
        let _ = (command, fragment);
        false
    }

    /// One non-empty fragment of a DCS string. `command` is the
    /// intermediate+final bytes that preceded the string body (excluding
    /// the string body itself).
    fn dcs(&mut self, command: &[u8], fragment: StringFragment<'_>) -> bool {
        let _ = (command, fragment);
        false
    }
}
