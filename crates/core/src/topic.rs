//! The fixed set of subject areas the assistant answers questions about.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A subject domain the assistant is scoped to.
///
/// The set is closed: adding a topic means adding a variant here, and every
/// `match` over topics (refusal messages, UI listings) will fail to compile
/// until it handles the new one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    #[default]
    #[serde(rename = "uipath")]
    UiPath,
    Worksoft,
    HrPolicies,
}

impl Topic {
    /// Every topic, in the order they are presented to the user.
    pub const ALL: [Topic; 3] = [Topic::UiPath, Topic::Worksoft, Topic::HrPolicies];

    /// Human-readable name, as shown in the UI and embedded in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Topic::UiPath => "UiPath",
            Topic::Worksoft => "Worksoft",
            Topic::HrPolicies => "HR Policies",
        }
    }

    /// Stable identifier used in URLs and config keys.
    pub fn slug(self) -> &'static str {
        match self {
            Topic::UiPath => "uipath",
            Topic::Worksoft => "worksoft",
            Topic::HrPolicies => "hr_policies",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Topic {
    type Err = Error;

    /// Accepts either the slug or the display name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| {
                t.slug().eq_ignore_ascii_case(needle) || t.display_name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| Error::UnknownTopic(s.to_string()))
    }
}
