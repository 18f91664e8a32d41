/// What the first byte of a write asks the LED to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    On,
    Off,
}

impl LedCommand {
    /// `'1'` turns the LED on, `'0'` turns it off. Anything else is not a command.
    pub fn parse(byte: u8) -> Option<LedCommand> {
        match byte {
            b'1' => Some(LedCommand::On),
            b'0' => Some(LedCommand::Off),
            _ => None,
        }
    }

    pub fn level(self) -> bool {
        self == LedCommand::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ascii_digits_zero_and_one_are_commands() {
        assert_eq!(LedCommand::parse(b'1'), Some(LedCommand::On));
        assert_eq!(LedCommand::parse(b'0'), Some(LedCommand::Off));
        for byte in [b'2', b'X', b' ', b'\n', 0, 1] {
            assert_eq!(LedCommand::parse(byte), None);
        }
        assert!(LedCommand::On.level());
        assert!(!LedCommand::Off.level());
    }
}
