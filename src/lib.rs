mod callbacks;
mod csi;
mod parser;
mod state;

pub use callbacks::{Callbacks, StringFragment};
pub use csi::{CsiArg, CSI_ARGS_MAX, CSI_LEADER_MAX};
pub use parser::{Parser, DCS_COMMAND_MAX, INTERMED_MAX};
