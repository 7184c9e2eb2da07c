//! The Knowdesk question-answering core.
//!
//! Every question goes through a **classify → resolve** cycle:
//!
//! 1. **Classify** the question against the active topic
//!    ([`TopicClassifier`], one call to the text generator)
//! 2. **Resolve** a reply ([`AnswerResolver`]): on-topic questions are
//!    answered from the knowledge base, everything else gets a refusal
//! 3. **Record** both turns in the session's log for the pinned topic
//!
//! [`TurnPipeline`] ties the steps together over a [`SessionState`] or a
//! shared [`SessionHandle`].

pub mod classifier;
pub mod pipeline;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use classifier::TopicClassifier;
pub use pipeline::{TurnPipeline, TurnRecord};
pub use resolver::AnswerResolver;
pub use session::{SessionHandle, SessionState};
