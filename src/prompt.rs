/// Canned instructions offered under the prompt bar.
pub const SUGGESTIONS: &[&str] = &[
    "Make it look like a vintage photo",
    "Remove the background",
    "Add a cyberpunk neon effect",
    "Turn this into a pencil sketch",
];

/// A trimmed, non-empty edit instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
