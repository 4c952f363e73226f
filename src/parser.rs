//! The streaming byte-sequence decoder.
//!
//! [`Parser::write`] is the single entry point: it accepts an arbitrarily
//! fragmented byte stream (any call may stop mid-sequence; all state
//! persists on `self` across calls) and dispatches recognized events to a
//! [`Callbacks`] implementation. It performs no internal allocation (all
//! accumulators below are fixed-capacity inline buffers), and OSC/DCS
//! string bodies are represented as borrows into the caller's own input
//! slice rather than copied, so a fragment never outlives the `write`
//! call that produced it.
use crate::callbacks::{Callbacks, StringFragment};
use crate::csi::Csi;
use crate::state::State;

/// Minimum capacity for the escape/CSI intermediate-byte buffer.
pub const INTERMED_MAX: usize = 8;

/// Minimum capacity for the DCS command-prefix buffer (the intermediate
/// and final bytes preceding the string body).
pub const DCS_COMMAND_MAX: usize = 16;

#[derive(Debug)]
struct Intermediates {
    items: [u8; INTERMED_MAX],
    len: usize,
}

impl Default for Intermediates {
    fn default() -> Self {
        Self { items: [0; INTERMED_MAX], len: 0 }
    }
}

impl Intermediates {
    fn clear(&mut self) {
        self.len = 0;
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn len(&self) -> usize {
        self.len
    }

    /// Clamped at `INTERMED_MAX`; excess bytes of the same class are
    /// dropped until the sequence closes (explicit policy, not an error).
    fn push(&mut self, byte: u8) {
        if self.len < INTERMED_MAX {
            self.items[self.len] = byte;
            self.len += 1;
        }
    }

    fn as_slice(&self) -> &[u8] {
        &self.items[..self.len]
    }

    fn as_option(&self) -> Option<&[u8]> {
        if self.len == 0 { None } else { Some(self.as_slice()) }
    }
}

/// A streaming parser for the VT100/xterm-compatible control-sequence
/// grammar (ECMA-48/ISO 2022 framing plus OSC and DCS string sequences).
///
/// All state is owned here; the only configuration knob is
/// [`set_utf8_mode`](Self::set_utf8_mode), which controls whether
/// 0x80-0x9F are classified as C1 controls (8-bit terminals) or treated
/// as ordinary bytes for a UTF-8 decoder layered above this parser to
/// handle (text runs pass through raw either way, this parser never
/// decodes UTF-8 itself).
#[derive(Debug)]
pub struct Parser {
    state: State,
    in_esc: bool,
    intermed: Intermediates,
    csi: Csi,
    osc_command: i32,
    dcs_command: [u8; DCS_COMMAND_MAX],
    dcs_commandlen: usize,
    string_initial: bool,
    utf8_mode: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            state: State::default(),
            in_esc: false,
            intermed: Intermediates::default(),
            csi: Csi::default(),
            osc_command: -1,
            dcs_command: [0; DCS_COMMAND_MAX],
            dcs_commandlen: 0,
            string_initial: false,
            utf8_mode: false,
        }
    }
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether bytes 0x80-0x9F are treated as C1 controls (`false`,
    /// the default) or left for a UTF-8 decoding layer above this parser
    /// (`true`). The legacy two-byte `ESC X` form of a C1 control is
    /// always recognized regardless of this setting.
    pub fn set_utf8_mode(&mut self, enabled: bool) {
        self.utf8_mode = enabled;
    }

    #[must_use]
    pub fn utf8_mode(&self) -> bool {
        self.utf8_mode
    }

    /// Feeds a chunk of bytes through the parser, dispatching recognized
    /// events to `callbacks`. Always consumes the entire span; the
    /// return value is always equal to `bytes.len()`.
    pub fn write(&mut self, bytes: &[u8], callbacks: &mut impl Callbacks) -> usize {
        let len = bytes.len();
        let mut pos = 0usize;
        let mut string_start: Option<usize> = if self.state.is_string() { Some(0) } else { None };

        while pos < len {
            let mut c = bytes[pos];

            // NUL, DEL: inside a string, flush and skip; otherwise ignore.
            if c == 0x00 || c == 0x7f {
                if self.state.is_string() {
                    if let Some(start) = string_start {
                        self.emit_fragment(callbacks, &bytes[start..pos], false);
                    }
                    string_start = Some(pos + 1);
                }
                pos += 1;
                continue;
            }

            // CAN, SUB: cancel any in-flight sequence, no event fired for it.
            if c == 0x18 || c == 0x1a {
                self.in_esc = false;
                self.state = State::Normal;
                string_start = None;
                pos += 1;
                continue;
            }

            // ESC.
            if c == 0x1b {
                self.intermed.clear();
                if !self.state.is_string() {
                    self.state = State::Normal;
                }
                self.in_esc = true;
                pos += 1;
                continue;
            }

            // BEL doubling as ST inside a string falls through to the
            // string-state handler below instead of being treated as a
            // plain C0 control.
            let bel_as_st = c == 0x07 && self.state.is_string();

            if !bel_as_st && c < 0x20 {
                if self.state.is_string() {
                    if let Some(start) = string_start {
                        self.emit_fragment(callbacks, &bytes[start..pos], false);
                    }
                }
                self.do_control(callbacks, c);
                if self.state.is_string() {
                    string_start = Some(pos + 1);
                }
                pos += 1;
                continue;
            }

            let mut c1_allowed = !self.utf8_mode;
            let mut string_len = string_start.map(|start| pos - start);

            if self.in_esc {
                let in_string = self.state.is_string();
                // Hoist ESC X (0x40 <= X < 0x60) to its C1 equivalent,
                // unless we're mid-string where only ESC \ (ST) counts.
                if self.intermed.is_empty() && (0x40..0x60).contains(&c) && (!in_string || c == 0x5c) {
                    c += 0x40;
                    c1_allowed = true;
                    if let Some(remaining) = string_len.as_mut() {
                        *remaining = remaining.saturating_sub(1);
                    }
                    self.in_esc = false;
                } else {
                    // Not a valid two-byte C1: abandon whatever string was
                    // anchored and fall through to NORMAL's escape handling
                    // with `in_esc` still set and `c` unmodified.
                    string_start = None;
                    string_len = None;
                    self.state = State::Normal;
                }
            }

            let advance =
                self.dispatch(bytes, pos, c, c1_allowed, &mut string_start, string_len, callbacks);
            pos += advance.max(1);
        }

        if let Some(start) = string_start {
            self.emit_fragment(callbacks, &bytes[start..len], false);
        }

        len
    }

    /// Dispatches a single (possibly re-dispatched) byte through the
    /// CSI/OSC/DCS sub-machines and NORMAL state. Returns how many input
    /// bytes the caller should advance past (always 1 except for the
    /// NORMAL text path, which reports back how much of the printable
    /// run the `text` callback consumed).
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &mut self,
        bytes: &[u8],
        pos: usize,
        mut c: u8,
        c1_allowed: bool,
        string_start: &mut Option<usize>,
        mut string_len: Option<usize>,
        callbacks: &mut impl Callbacks,
    ) -> usize {
        loop {
            match self.state {
                State::CsiLeader => {
                    if (0x3c..=0x3f).contains(&c) {
                        self.csi.push_leader(c);
                        return 1;
                    }
                    self.csi.start_args();
                    self.state = State::CsiArgs;
                    continue;
                }

                State::CsiArgs => {
                    if c.is_ascii_digit() {
                        self.csi.digit(u32::from(c - b'0'));
                        return 1;
                    }
                    if c == b':' {
                        self.csi.mark_has_more();
                        c = b';';
                    }
                    if c == b';' {
                        self.csi.next_arg();
                        return 1;
                    }
                    self.csi.finish_args();
                    self.intermed.clear();
                    self.state = State::CsiIntermed;
                    continue;
                }

                State::CsiIntermed => {
                    if (0x20..=0x2f).contains(&c) {
                        self.intermed.push(c);
                        return 1;
                    }
                    // unreachable: a fresh ESC is intercepted in `write`'s
                    // top-level dispatch before it ever reaches here.
                    if (0x40..=0x7e).contains(&c) {
                        self.csi_dispatch(callbacks, c);
                    } else {
                        log::trace!("vtparse: abandoned CSI before final byte {c:#04x}");
                    }
                    self.state = State::Normal;
                    return 1;
                }

                State::OscCommand => {
                    if c.is_ascii_digit() {
                        let digit = i32::from(c - b'0');
                        self.osc_command =
                            if self.osc_command < 0 { digit } else { self.osc_command * 10 + digit };
                        return 1;
                    }
                    if c == b';' {
                        self.state = State::Osc;
                        *string_start = Some(pos + 1);
                        return 1;
                    }
                    *string_start = Some(pos);
                    string_len = Some(0);
                    self.state = State::Osc;
                    continue;
                }

                State::DcsCommand => {
                    if self.dcs_commandlen < DCS_COMMAND_MAX {
                        self.dcs_command[self.dcs_commandlen] = c;
                        self.dcs_commandlen += 1;
                    }
                    if (0x40..=0x7e).contains(&c) {
                        *string_start = Some(pos + 1);
                        self.state = State::Dcs;
                    }
                    return 1;
                }

                State::Osc | State::Dcs => {
                    if c == 0x07 || (c1_allowed && c == 0x9c) {
                        let start = string_start.take().unwrap_or(pos);
                        let end = start + string_len.unwrap_or(0);
                        self.emit_fragment(callbacks, &bytes[start..end], true);
                        self.state = State::Normal;
                    }
                    return 1;
                }

                State::Normal => {
                    if self.in_esc {
                        if (0x20..=0x2f).contains(&c) {
                            self.intermed.push(c);
                        } else if (0x30..0x7f).contains(&c) {
                            self.esc_dispatch(callbacks, c);
                            self.in_esc = false;
                        } else {
                            log::trace!("vtparse: unhandled byte {c:#04x} mid-escape");
                        }
                        return 1;
                    }

                    if c1_allowed && (0x80..0xa0).contains(&c) {
                        match c {
                            0x90 => {
                                self.string_initial = true;
                                self.dcs_commandlen = 0;
                                self.state = State::DcsCommand;
                            }
                            0x9b => {
                                self.csi.reset_leader();
                                self.state = State::CsiLeader;
                            }
                            0x9d => {
                                self.osc_command = -1;
                                self.string_initial = true;
                                self.state = State::OscCommand;
                            }
                            other => self.do_control(callbacks, other),
                        }
                        return 1;
                    }

                    let remaining = &bytes[pos..];
                    let mut eaten = callbacks.text(remaining);
                    if eaten == 0 {
                        log::debug!("vtparse: text callback consumed no bytes; forcing progress");
                        eaten = 1;
                    } else if eaten > remaining.len() {
                        log::debug!(
                            "vtparse: text callback reported eating past the buffer; clamping"
                        );
                        eaten = remaining.len();
                    }
                    return eaten;
                }
            }
        }
    }

    fn do_control(&self, callbacks: &mut impl Callbacks, byte: u8) {
        if !callbacks.control(byte) {
            log::debug!("vtparse: unhandled control {byte:#04x}");
        }
    }

    fn esc_dispatch(&mut self, callbacks: &mut impl Callbacks, final_byte: u8) {
        let mut seq = [0u8; INTERMED_MAX + 1];
        let n = self.intermed.len();
        seq[..n].copy_from_slice(self.intermed.as_slice());
        seq[n] = final_byte;
        if !callbacks.escape(&seq[..=n]) {
            log::debug!("vtparse: unhandled escape ESC {final_byte:#04x}");
        }
    }

    fn csi_dispatch(&mut self, callbacks: &mut impl Callbacks, final_byte: u8) {
        let handled = callbacks.csi(
            self.csi.leader(),
            self.csi.args(),
            self.intermed.as_option(),
            final_byte,
        );
        if !handled {
            log::debug!("vtparse: unhandled CSI {final_byte:#04x}");
        }
        self.csi.clear();
    }

    fn emit_fragment(&mut self, callbacks: &mut impl Callbacks, slice: &[u8], is_final: bool) {
        let fragment = StringFragment { bytes: slice, initial: self.string_initial, is_final };

        let handled = match self.state {
            State::Osc => callbacks.osc(self.osc_command, fragment),
            State::Dcs => {
                if slice.is_empty() {
                    true
                } else {
                    callbacks.dcs(&self.dcs_command[..self.dcs_commandlen], fragment)
                }
            }
            _ => false,
        };

        if !handled {
            log::debug!("vtparse: unhandled string fragment in state {:?}", self.state);
        }

        self.string_initial = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csi::CsiArg;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Text(Vec<u8>),
        Control(u8),
        Escape(Vec<u8>),
        Csi { leader: Option<Vec<u8>>, args: Vec<CsiArg>, intermed: Option<Vec<u8>>, final_byte: u8 },
        Osc { command: i32, bytes: Vec<u8>, initial: bool, is_final: bool },
        Dcs { command: Vec<u8>, bytes: Vec<u8>, initial: bool, is_final: bool },
    }

    #[derive(Default)]
    struct Collector {
        events: Vec<Event>,
    }

    /// Finds the end of a printable run the way a real consumer (e.g. a
    /// UTF-8-aware screen writer) would: scan until the next byte that
    /// would trigger control/escape handling.
    fn text_run_len(bytes: &[u8]) -> usize {
        bytes.iter().position(|&b| b < 0x20 || b == 0x7f).unwrap_or(bytes.len())
    }

    impl Callbacks for Collector {
        fn text(&mut self, bytes: &[u8]) -> usize {
            let n = text_run_len(bytes);
            if n > 0 {
                self.events.push(Event::Text(bytes[..n].to_vec()));
            }
            n
        }

        fn control(&mut self, byte: u8) -> bool {
            self.events.push(Event::Control(byte));
            true
        }

        fn escape(&mut self, sequence: &[u8]) -> bool {
            self.events.push(Event::Escape(sequence.to_vec()));
            true
        }

        fn csi(
            &mut self,
            leader: Option<&[u8]>,
            args: &[CsiArg],
            intermediates: Option<&[u8]>,
            final_byte: u8,
        ) -> bool {
            self.events.push(Event::Csi {
                leader: leader.map(<[u8]>::to_vec),
                args: args.to_vec(),
                intermed: intermediates.map(<[u8]>::to_vec),
                final_byte,
            });
            true
        }

        fn osc(&mut self, command: i32, fragment: StringFragment<'_>) -> bool {
            self.events.push(Event::Osc {
                command,
                bytes: fragment.bytes.to_vec(),
                initial: fragment.initial,
                is_final: fragment.is_final,
            });
            true
        }

        fn dcs(&mut self, command: &[u8], fragment: StringFragment<'_>) -> bool {
            self.events.push(Event::Dcs {
                command: command.to_vec(),
                bytes: fragment.bytes.to_vec(),
                initial: fragment.initial,
                is_final: fragment.is_final,
            });
            true
        }
    }

    fn parse(bytes: &[u8]) -> Vec<Event> {
        let mut parser = Parser::new();
        let mut collector = Collector::default();
        parser.write(bytes, &mut collector);
        collector.events
    }

    fn arg(v: u32) -> CsiArg {
        CsiArg { value: Some(v), has_more: false }
    }

    fn missing() -> CsiArg {
        CsiArg { value: None, has_more: false }
    }

    #[test]
    fn csi_with_two_args() {
        assert_eq!(
            parse(b"\x1b[1;2H"),
            vec![Event::Csi { leader: None, args: vec![arg(1), arg(2)], intermed: None, final_byte: b'H' }]
        );
    }

    #[test]
    fn csi_with_missing_leading_arg() {
        assert_eq!(
            parse(b"\x1b[;5H"),
            vec![Event::Csi { leader: None, args: vec![missing(), arg(5)], intermed: None, final_byte: b'H' }]
        );
    }

    #[test]
    fn csi_colon_sets_has_more() {
        assert_eq!(
            parse(b"\x1b[4:3m"),
            vec![Event::Csi {
                leader: None,
                args: vec![CsiArg { value: Some(4), has_more: true }, arg(3)],
                intermed: None,
                final_byte: b'm',
            }]
        );
    }

    #[test]
    fn osc_terminated_by_bel() {
        assert_eq!(
            parse(b"\x1b]0;hi\x07"),
            vec![Event::Osc { command: 0, bytes: b"hi".to_vec(), initial: true, is_final: true }]
        );
    }

    #[test]
    fn osc_split_across_writes() {
        let mut parser = Parser::new();
        let mut collector = Collector::default();
        parser.write(b"\x1b]0;h", &mut collector);
        parser.write(b"i\x1b\\", &mut collector);
        assert_eq!(
            collector.events,
            vec![
                Event::Osc { command: 0, bytes: b"h".to_vec(), initial: true, is_final: false },
                Event::Osc { command: 0, bytes: b"i".to_vec(), initial: false, is_final: true },
            ]
        );
    }

    #[test]
    fn escape_between_text_runs() {
        assert_eq!(
            parse(b"A\x1bcB"),
            vec![
                Event::Text(b"A".to_vec()),
                Event::Escape(b"c".to_vec()),
                Event::Text(b"B".to_vec()),
            ]
        );
    }

    #[test]
    fn csi_large_arg_does_not_overflow() {
        assert_eq!(
            parse(b"\x1b[999999m"),
            vec![Event::Csi { leader: None, args: vec![arg(999_999)], intermed: None, final_byte: b'm' }]
        );
    }

    #[test]
    fn osc_split_by_nul() {
        assert_eq!(
            parse(b"\x1b]2;x\x00y\x07"),
            vec![
                Event::Osc { command: 2, bytes: b"x".to_vec(), initial: true, is_final: false },
                Event::Osc { command: 2, bytes: b"y".to_vec(), initial: false, is_final: true },
            ]
        );
    }

    #[test]
    fn dcs_hook_and_passthrough() {
        // The trailing ESC \ is consumed as ST (the in_esc hoist rewrites
        // \ to its C1 equivalent 0x9c before the string-state arm sees
        // it), so no escape callback fires for it.
        assert_eq!(
            parse(b"\x1bP1000phello\x1b\\"),
            vec![Event::Dcs { command: b"1000p".to_vec(), bytes: b"hello".to_vec(), initial: true, is_final: true }]
        );
    }

    #[test]
    fn dcs_empty_fragment_not_emitted() {
        // An immediately-terminated DCS produces no `dcs` event at all
        // (mirrors the `if(len && ...)` guard in the original C source),
        // and the ESC \ that terminates it is consumed as ST, not as an
        // escape, so this parses to no events whatsoever.
        assert_eq!(parse(b"\x1bPq\x1b\\"), vec![]);
    }

    #[test]
    fn csi_leader_is_surfaced() {
        assert_eq!(
            parse(b"\x1b[?1l"),
            vec![Event::Csi {
                leader: Some(b"?".to_vec()),
                args: vec![arg(1)],
                intermed: None,
                final_byte: b'l',
            }]
        );
    }

    #[test]
    fn can_abandons_in_flight_csi() {
        assert_eq!(parse(b"\x1b[1;2\x18m"), vec![Event::Text(b"m".to_vec())]);
    }

    #[test]
    fn esc_abandons_in_flight_csi_then_dispatches_fresh() {
        assert_eq!(parse(b"\x1b[1;2\x1bc"), vec![Event::Escape(b"c".to_vec())]);
    }

    #[test]
    fn c1_eight_bit_csi() {
        let mut parser = Parser::new();
        parser.set_utf8_mode(false);
        let mut collector = Collector::default();
        parser.write(b"\x9b1;2H", &mut collector);
        assert_eq!(
            collector.events,
            vec![Event::Csi { leader: None, args: vec![arg(1), arg(2)], intermed: None, final_byte: b'H' }]
        );
    }

    #[test]
    fn utf8_mode_disables_eight_bit_c1() {
        let mut parser = Parser::new();
        parser.set_utf8_mode(true);
        let mut collector = Collector::default();
        parser.write(b"\x9b", &mut collector);
        // 0x9b is no longer a C1 introducer; it falls through to `text`.
        assert_eq!(collector.events, vec![Event::Text(vec![0x9b])]);
    }

    #[test]
    fn leader_overflow_is_clamped_not_erroring() {
        let input: Vec<u8> =
            b"\x1b[".iter().copied().chain(std::iter::repeat(b'<').take(64)).chain([b'm']).collect();
        let events = parse(&input);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Csi { leader: Some(leader), .. } => {
                assert_eq!(leader.len(), crate::csi::CSI_LEADER_MAX - 1);
            }
            other => panic!("expected a clamped CSI leader, got {other:?}"),
        }
    }

    #[test]
    fn args_overflow_is_clamped_not_erroring() {
        // CSI_ARGS_MAX - 1 separators, each bumping argi by one, then one
        // extra that must be absorbed without panicking or growing past
        // capacity.
        let mut input = Vec::from(*b"\x1b[");
        for _ in 0..(crate::csi::CSI_ARGS_MAX + 4) {
            input.extend_from_slice(b"1;");
        }
        input.push(b'm');
        let events = parse(&input);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Csi { args, .. } => {
                assert!(args.len() <= crate::csi::CSI_ARGS_MAX);
            }
            other => panic!("expected a clamped CSI args list, got {other:?}"),
        }
    }

    #[test]
    fn intermediates_overflow_is_clamped_not_erroring() {
        let input: Vec<u8> =
            b"\x1b".iter().copied().chain(std::iter::repeat(b'#').take(32)).chain([b'8']).collect();
        assert_eq!(parse(&input), vec![Event::Escape(vec![b'#'; INTERMED_MAX].into_iter().chain([b'8']).collect())]);
    }

    #[test]
    fn dcs_command_overflow_is_clamped_not_erroring() {
        let mut input = Vec::from(*b"\x1bP");
        input.extend(std::iter::repeat(b'0').take(DCS_COMMAND_MAX + 8));
        input.push(b'p');
        input.extend_from_slice(b"hi\x1b\\");
        let events = parse(&input);
        match &events[0] {
            Event::Dcs { command, .. } => assert_eq!(command.len(), DCS_COMMAND_MAX),
            other => panic!("expected a clamped DCS command, got {other:?}"),
        }
    }

    #[test]
    fn fragmentation_invariance_for_osc() {
        let input: &[u8] = b"\x1b]52;clipboard data here\x07";

        for split in 0..=input.len() {
            let mut parser = Parser::new();
            let mut collector = Collector::default();
            parser.write(&input[..split], &mut collector);
            parser.write(&input[split..], &mut collector);

            let mut merged: Vec<u8> = Vec::new();
            let mut command = None;
            let mut saw_final = false;
            for event in &collector.events {
                if let Event::Osc { command: c, bytes, is_final, .. } = event {
                    command = Some(*c);
                    merged.extend_from_slice(bytes);
                    saw_final = *is_final;
                }
            }

            assert!(saw_final, "split at {split} never terminated the OSC string");
            assert_eq!(command, Some(52));
            assert_eq!(merged, b"clipboard data here".to_vec());
        }
    }
}
