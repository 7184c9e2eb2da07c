//! Topic-relevance verdicts produced by the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way judgment of whether a question belongs to the active topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Matches,
    DoesNotMatch,
    Unclear,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Matches, Verdict::DoesNotMatch, Verdict::Unclear];

    /// The literal token the classifier model is asked to reply with.
    pub fn token(self) -> &'static str {
        match self {
            Verdict::Matches => "matches",
            Verdict::DoesNotMatch => "does_not_match",
            Verdict::Unclear => "unclear",
        }
    }

    /// Map raw model output onto a verdict.
    ///
    /// The output is trimmed and lower-cased and must equal one of the three
    /// tokens exactly. Anything else collapses to [`Verdict::Unclear`].
    pub fn from_model_output(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        Verdict::ALL
            .into_iter()
            .find(|v| v.token() == normalized)
            .unwrap_or(Verdict::Unclear)
    }

    /// Whether the question may be sent to the knowledge base.
    pub fn is_match(self) -> bool {
        matches!(self, Verdict::Matches)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
