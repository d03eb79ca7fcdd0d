//! PIN candidate normalization.
//!
//! A candidate only ever holds ASCII digits and never grows past
//! [`PIN_LENGTH`].  Both input surfaces (free text and the keypad) go
//! through here.

pub const PIN_LENGTH: usize = 6;

/// Strip everything that is not a digit and truncate to [`PIN_LENGTH`].
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(PIN_LENGTH)
        .collect()
}

/// The code being typed for the current challenge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PinEntry {
    digits: String,
}

impl PinEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole candidate with the normalized form of `raw`.
    pub fn replace(&mut self, raw: &str) {
        self.digits = normalize(raw);
    }

    /// Append one keypad digit. Non-digits and input past a full candidate
    /// are ignored; returns whether the digit was taken.
    pub fn push_digit(&mut self, digit: char) -> bool {
        if !digit.is_ascii_digit() || self.is_complete() {
            return false;
        }
        self.digits.push(digit);
        true
    }

    pub fn delete_last(&mut self) {
        self.digits.pop();
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == PIN_LENGTH
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }
}
