/// Single-slot change detector for normalized plate text.
///
/// Emits when the text is non-empty and differs from the last accepted text.
/// A -> B -> A emits three times; only immediate repeats are suppressed.
#[derive(Debug, Default)]
pub struct EventDebouncer {
    last_text: String,
}

impl EventDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    /// Returns true (and records `text`) when it should be reported.
    pub fn should_emit(&mut self, text: &str) -> bool {
        if text.is_empty() || text == self.last_text {
            return false;
        }
        self.last_text.clear();
        self.last_text.push_str(text);
        true
    }
}
