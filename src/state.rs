/// Syntactic context the parser is currently in.
///
/// Transverse to this is `Parser`'s own `in_esc` flag: an ESC byte can be
/// seen while in any of these states and is resolved (promoted to a C1
/// control, folded into an escape sequence, or abandoned) before the
/// state-specific handling below runs.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    #[default]
    Normal,
    CsiLeader,
    CsiArgs,
    CsiIntermed,
    OscCommand,
    Osc,
    DcsCommand,
    Dcs,
}

impl State {
    /// True while accumulating an OSC/DCS string body, i.e. the states in
    /// which a byte range of the input is anchored for zero-copy fragment
    /// emission.
    #[inline]
    pub(crate) fn is_string(self) -> bool {
        matches!(self, State::Osc | State::Dcs)
    }
}
