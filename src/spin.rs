//! The cube spin switch behind the "Toggle Cube Spin" button.

pub const LABEL_ON: &str = "Toggle Cube Spin (On)";
pub const LABEL_OFF: &str = "Toggle Cube Spin (Off)";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpinToggle {
    spinning: bool,
}

impl SpinToggle {
    pub fn new(spinning: bool) -> Self {
        Self { spinning }
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    /// Flip the flag and return the label describing the new state.
    pub fn toggle(&mut self) -> &'static str {
        self.spinning = !self.spinning;
        self.label()
    }

    pub fn label(&self) -> &'static str {
        if self.spinning { LABEL_ON } else { LABEL_OFF }
    }
}

impl Default for SpinToggle {
    fn default() -> Self {
        Self::new(true)
    }
}
