//! Rolling-buffer normalizer for chunked terminal output.
//!
//! Escape sequences arrive split at arbitrary chunk boundaries, so every
//! `feed` strips the whole accumulated buffer rather than the new fragment.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default buffer cap, in characters.
pub const DEFAULT_BUFFER_MAX_CHARS: usize = 2_000;

/// Complete escape sequences and stray control bytes.
static ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[^A-Za-z~\x1b]*[A-Za-z~]",   // CSI, any parameter style
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)", // OSC ending with BEL or ST
        r"|\x1b[()][A-Za-z0-9]",               // charset selection
        r"|\x1b[=>78MDEc]",                    // keypad mode, save/restore, index
        r"|[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]",  // control bytes except \t \n \r
    ))
    .expect("Invalid escape regex")
});

/// An escape sequence cut off by the end of the buffer.
static INCOMPLETE_TAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b(?:\[[^A-Za-z~\x1b]*|\][^\x07\x1b]*\x1b?|[()])?\z")
        .expect("Invalid incomplete escape regex")
});

/// Remove escape sequences and control bytes from `text`.
pub fn strip_escapes(text: &str) -> String {
    ESCAPE_REGEX.replace_all(text, "").into_owned()
}

#[derive(Debug, Clone)]
pub struct ActivityTextNormalizer {
    buffer: String,
    max_chars: usize,
}

impl Default for ActivityTextNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_MAX_CHARS)
    }
}

impl ActivityTextNormalizer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            max_chars: max_chars.max(1),
        }
    }

    /// Append a raw fragment and return the normalized buffer.
    ///
    /// A sequence still incomplete at the end of the buffer stays buffered
    /// but is left out of the result until its terminator arrives.
    pub fn feed(&mut self, fragment: &str) -> String {
        self.buffer.push_str(fragment);
        self.trim_front();

        let visible = match INCOMPLETE_TAIL_REGEX.find(&self.buffer) {
            Some(tail) => &self.buffer[..tail.start()],
            None => self.buffer.as_str(),
        };
        strip_escapes(visible)
    }

    /// Drop buffered text after a confident classification. An incomplete
    /// trailing escape sequence is kept so its remainder still strips.
    pub fn clear(&mut self) {
        let keep = INCOMPLETE_TAIL_REGEX
            .find(&self.buffer)
            .map(|tail| tail.start())
            .unwrap_or(self.buffer.len());
        self.buffer.drain(..keep);
    }

    /// Start over for a new process, releasing the buffer's memory.
    pub fn reset(&mut self) {
        self.buffer = String::new();
    }

    /// Raw buffered text, escapes included.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn trim_front(&mut self) {
        let len = self.buffer.chars().count();
        if len <= self.max_chars {
            return;
        }
        if let Some((cut, _)) = self.buffer.char_indices().nth(len - self.max_chars) {
            self.buffer.drain(..cut);
        }
    }
}
