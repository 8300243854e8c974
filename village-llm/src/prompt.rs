//! Prompt templates for village generation calls.
//!
//! Every prompt is a plain `{key}` template rendered by [`render_template`].
//! Values are substituted in a single pass, so text quoted from another NPC
//! that happens to contain `{name}` is left alone.

use std::fmt;
use std::str::FromStr;

/// Opening line of a conversation between two NPCs.
pub const SPEAK: &str = "You are {name}, a {personality}.
You're talking to {other_name}, a {other_personality}, about {topic}.
Say something brief (5-10 words) to start the conversation.
{name}:";

/// Reply to something another NPC just said.
pub const REACT: &str = "You are {name}, a {personality}.
{other_name} just said: \"{statement}\"
Respond briefly (5-10 words).
{name}:";

/// Solo action or thought at the NPC's current location.
pub const ACT: &str = "You are {name}, a {personality}.
You are at the {location}.
Describe a brief action or thought in 5-10 words.
{name}:";

/// Interactive reply to a user, with the NPC's bounded memory context.
pub const RESPOND: &str = "You are {name}, a {personality}.
Backstory: {backstory}
Current mood: {mood}

Recent memories:
{short_term}

Long-term memories (summarized):
{long_term}

Interaction with User:
User: {user_input}
{name}:";

/// Collapses a batch of short-term memories into one long-term entry.
pub const SUMMARIZE: &str = "Summarize the following memories in a concise paragraph:
{memories}
Summary:";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value. Unknown keys and
/// unmatched braces are copied through unchanged.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Start a conversation.
    Speak,
    /// React to a statement.
    React,
    /// Solo action.
    Act,
    /// Interactive reply to a user.
    Respond,
    /// Memory summarisation.
    Summarize,
}

impl PromptId {
    /// The built-in template text.
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Self::Speak => SPEAK,
            Self::React => REACT,
            Self::Act => ACT,
            Self::Respond => RESPOND,
            Self::Summarize => SUMMARIZE,
        }
    }

    /// Render this template with `vars`.
    #[must_use]
    pub fn render(self, vars: &[(&str, &str)]) -> String {
        render_template(self.template(), vars)
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[
            Self::Speak,
            Self::React,
            Self::Act,
            Self::Respond,
            Self::Summarize,
        ]
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Speak => "speak",
            Self::React => "react",
            Self::Act => "act",
            Self::Respond => "respond",
            Self::Summarize => "summarize",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speak" => Ok(Self::Speak),
            "react" => Ok(Self::React),
            "act" => Ok(Self::Act),
            "respond" => Ok(Self::Respond),
            "summarize" => Ok(Self::Summarize),
            _ => Err(format!("unknown prompt id: '{s}'")),
        }
    }
}
