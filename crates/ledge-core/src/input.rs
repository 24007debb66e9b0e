//! Player input.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Jump,
    /// Let go of a rope.
    Release,
    Restart,
}

impl Key {
    pub const ALL: [Key; 7] = [
        Key::Left,
        Key::Right,
        Key::Up,
        Key::Down,
        Key::Jump,
        Key::Release,
        Key::Restart,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Single-letter code used by input scripts.
    pub fn code(self) -> char {
        match self {
            Key::Left => 'L',
            Key::Right => 'R',
            Key::Up => 'U',
            Key::Down => 'D',
            Key::Jump => 'J',
            Key::Release => 'E',
            Key::Restart => 'X',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.code() == code.to_ascii_uppercase())
    }
}

/// Anything that can answer "is this key held right now".
pub trait InputSource {
    fn is_down(&self, key: Key) -> bool;
}

/// Held keys as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyState {
    bits: u8,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: &[Key]) -> Self {
        keys.iter().fold(Self::new(), |state, &key| state.with(key))
    }

    #[must_use]
    pub fn with(mut self, key: Key) -> Self {
        self.press(key);
        self
    }

    pub fn press(&mut self, key: Key) {
        self.bits |= key.bit();
    }

    pub fn release(&mut self, key: Key) {
        self.bits &= !key.bit();
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }
}

impl InputSource for KeyState {
    fn is_down(&self, key: Key) -> bool {
        self.bits & key.bit() != 0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("bad script step {0:?}, expected KEYS:TICKS")]
    Malformed(String),
    #[error("unknown key {0:?} in script")]
    UnknownKey(char),
}

/// A sequence of held-key spans, written as `KEYS:TICKS` separated by commas.
///
/// `RJ:10,-:30` holds Right and Jump for ten ticks then nothing for thirty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputScript {
    steps: Vec<(KeyState, u32)>,
}

impl InputScript {
    pub fn total_ticks(&self) -> u64 {
        self.steps.iter().map(|&(_, ticks)| u64::from(ticks)).sum()
    }

    /// Expands into one key state per tick.
    pub fn frames(&self) -> impl Iterator<Item = KeyState> + '_ {
        self.steps
            .iter()
            .flat_map(|&(keys, ticks)| std::iter::repeat_n(keys, ticks as usize))
    }
}

impl FromStr for InputScript {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        for step in s.split(',').map(str::trim).filter(|step| !step.is_empty()) {
            let (keys, ticks) = step
                .split_once(':')
                .ok_or_else(|| ScriptError::Malformed(step.to_owned()))?;
            let ticks: u32 = ticks
                .trim()
                .parse()
                .map_err(|_| ScriptError::Malformed(step.to_owned()))?;
            let mut state = KeyState::new();
            for code in keys.trim().chars().filter(|&c| c != '-') {
                state.press(Key::from_code(code).ok_or(ScriptError::UnknownKey(code))?);
            }
            steps.push((state, ticks));
        }
        Ok(Self { steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state_press_release() {
        let mut state = KeyState::from_keys(&[Key::Left, Key::Jump]);
        assert!(state.is_down(Key::Left));
        assert!(state.is_down(Key::Jump));
        assert!(!state.is_down(Key::Right));

        state.release(Key::Left);
        assert!(!state.is_down(Key::Left));
        state.release(Key::Jump);
        assert!(state.is_empty());
    }

    #[test]
    fn test_key_codes_roundtrip() {
        for key in Key::ALL {
            assert_eq!(Key::from_code(key.code()), Some(key));
        }
        assert_eq!(Key::from_code('r'), Some(Key::Right));
        assert_eq!(Key::from_code('?'), None);
    }

    #[test]
    fn test_script_parse_and_expand() {
        let script: InputScript = "RJ:2, -:3,L:1".parse().unwrap();
        assert_eq!(script.total_ticks(), 6);

        let frames: Vec<KeyState> = script.frames().collect();
        assert_eq!(frames.len(), 6);
        assert!(frames[0].is_down(Key::Right) && frames[0].is_down(Key::Jump));
        assert!(frames[2].is_empty());
        assert!(frames[5].is_down(Key::Left));
    }

    #[test]
    fn test_script_errors() {
        assert_eq!(
            "R10".parse::<InputScript>(),
            Err(ScriptError::Malformed("R10".to_owned()))
        );
        assert_eq!(
            "Q:4".parse::<InputScript>(),
            Err(ScriptError::UnknownKey('Q'))
        );
    }
}
