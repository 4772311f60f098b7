//! Board command decoding.

use crate::error::AfcError;

pub const CMD_SET_HOME: u16 = 0x5100;
pub const CMD_SELECT_AUTO: u16 = 0x5181;
pub const CMD_SELECT_MANUAL: u16 = 0x5182;
pub const CMD_SET_MANUAL_TARGET: u16 = 0x5183;
pub const CMD_NUDGE_MANUAL_TARGET: u16 = 0x5184;

/// A command record as delivered by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCommand {
    pub index: u16,
    pub words: [u16; 4],
}

impl BoardCommand {
    pub fn new(index: u16, words: [u16; 4]) -> Self {
        Self { index, words }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nudge {
    Up(u16),
    Down(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the home position and mark the board configured.
    SetHome(u16),
    SelectAuto,
    SelectManual,
    SetManualTarget(u16),
    NudgeManualTarget(Nudge),
}

impl TryFrom<BoardCommand> for Command {
    type Error = AfcError;

    fn try_from(c: BoardCommand) -> Result<Self, Self::Error> {
        let [w0, w1, _, _] = c.words;
        Ok(match c.index {
            CMD_SET_HOME => Self::SetHome(w0),
            CMD_SELECT_AUTO => Self::SelectAuto,
            CMD_SELECT_MANUAL => Self::SelectManual,
            CMD_SET_MANUAL_TARGET => Self::SetManualTarget(w0),
            CMD_NUDGE_MANUAL_TARGET if w1 != 0 => Self::NudgeManualTarget(Nudge::Down(w0)),
            CMD_NUDGE_MANUAL_TARGET => Self::NudgeManualTarget(Nudge::Up(w0)),
            other => return Err(AfcError::UnknownCommand(other)),
        })
    }
}

impl From<Command> for BoardCommand {
    fn from(c: Command) -> Self {
        match c {
            Command::SetHome(p) => Self::new(CMD_SET_HOME, [p, 0, 0, 0]),
            Command::SelectAuto => Self::new(CMD_SELECT_AUTO, [0; 4]),
            Command::SelectManual => Self::new(CMD_SELECT_MANUAL, [0; 4]),
            Command::SetManualTarget(p) => Self::new(CMD_SET_MANUAL_TARGET, [p, 0, 0, 0]),
            Command::NudgeManualTarget(Nudge::Up(d)) => {
                Self::new(CMD_NUDGE_MANUAL_TARGET, [d, 0, 0, 0])
            }
            Command::NudgeManualTarget(Nudge::Down(d)) => {
                Self::new(CMD_NUDGE_MANUAL_TARGET, [d, 1, 0, 0])
            }
        }
    }
}
