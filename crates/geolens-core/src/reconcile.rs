//! Rebuilds prompt/response analysis records from a flat message log.
//!
//! Each user message anchors one record. The first assistant message after it
//! (before the next user message) is its response; messages of any other role
//! in between are skipped. Assistant messages past the first one are dropped
//! from the record. That last rule is kept as-is for compatibility with logs
//! produced by earlier versions and is reported through
//! [`ReconciliationAmbiguity::DroppedAssistantMessage`] instead of being
//! folded into the response.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

use crate::session::{AnalysisResult, Message, Role};
use crate::types::MessageId;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationAmbiguity {
    #[error("user message at index {index} has no id")]
    MissingMessageId { index: usize },

    #[error("user message id {id} appears more than once")]
    DuplicateMessageId { id: MessageId },

    #[error("assistant message at index {index} dropped; {user_id} already has a response")]
    DroppedAssistantMessage { user_id: MessageId, index: usize },

    #[error("prompt {user_id} was followed by another prompt before any response")]
    UnansweredPrompt { user_id: MessageId },
}

/// Outcome of looking forward from one user anchor.
struct Pairing {
    result: AnalysisResult,
    resume_at: usize,
}

fn pair_from(messages: &[Message], anchor: usize) -> Pairing {
    let user = &messages[anchor];
    let prompt = user.text();

    let mut cursor = anchor + 1;
    while let Some(message) = messages.get(cursor) {
        match message.role {
            Role::Assistant => {
                return Pairing {
                    result: AnalysisResult {
                        id: user.id.clone(),
                        prompt,
                        response: message.parts.clone(),
                        error_message: None,
                        is_completed: true,
                    },
                    resume_at: cursor + 1,
                };
            }
            // The next prompt starts its own record; do not skip it.
            Role::User => break,
            Role::System | Role::Tool => cursor += 1,
        }
    }

    Pairing {
        result: AnalysisResult {
            id: user.id.clone(),
            prompt,
            response: Vec::new(),
            error_message: None,
            is_completed: false,
        },
        resume_at: cursor,
    }
}

/// Derive analysis records from `messages`, in log order. Never fails.
pub fn reconcile(messages: &[Message]) -> Vec<AnalysisResult> {
    for ambiguity in find_ambiguities(messages) {
        warn!(target: "reconcile", %ambiguity, "Ambiguous message log");
    }

    let mut results = Vec::new();
    let mut i = 0;
    while i < messages.len() {
        if !messages[i].is_user() {
            i += 1;
            continue;
        }
        let pairing = pair_from(messages, i);
        results.push(pairing.result);
        i = pairing.resume_at;
    }
    results
}

/// Like [`reconcile`], carrying `error_message` forward from any previously
/// committed record with the same id. Every other field comes from the log.
pub fn reconcile_with_existing(
    messages: &[Message],
    existing: &[AnalysisResult],
) -> Vec<AnalysisResult> {
    let previous_errors: HashMap<&MessageId, &String> = existing
        .iter()
        .filter_map(|r| r.error_message.as_ref().map(|e| (&r.id, e)))
        .collect();

    reconcile(messages)
        .into_iter()
        .map(|mut result| {
            if let Some(error) = previous_errors.get(&result.id) {
                result.error_message = Some((*error).clone());
            }
            result
        })
        .collect()
}

/// Record anchored at the most recent user message, if there is one.
pub fn latest_result(messages: &[Message]) -> Option<AnalysisResult> {
    let anchor = messages.iter().rposition(Message::is_user)?;
    Some(pair_from(messages, anchor).result)
}

/// Structural oddities in `messages` that reconciliation tolerates.
pub fn find_ambiguities(messages: &[Message]) -> Vec<ReconciliationAmbiguity> {
    let mut found = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut answered: Option<MessageId> = None;
    let mut awaiting: Option<MessageId> = None;

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::User => {
                if message.id.is_absent() {
                    found.push(ReconciliationAmbiguity::MissingMessageId { index });
                } else if !seen_ids.insert(message.id.clone()) {
                    found.push(ReconciliationAmbiguity::DuplicateMessageId {
                        id: message.id.clone(),
                    });
                }
                if let Some(user_id) = awaiting.take() {
                    found.push(ReconciliationAmbiguity::UnansweredPrompt { user_id });
                }
                answered = None;
                awaiting = Some(message.id.clone());
            }
            Role::Assistant => {
                if let Some(user_id) = awaiting.take() {
                    answered = Some(user_id);
                } else if let Some(user_id) = &answered {
                    found.push(ReconciliationAmbiguity::DroppedAssistantMessage {
                        user_id: user_id.clone(),
                        index,
                    });
                }
            }
            Role::System | Role::Tool => {}
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MessagePart;

    fn user(id: &str, text: &str) -> Message {
        Message::user(text).with_id(id)
    }

    fn assistant(id: &str, text: &str) -> Message {
        Message::assistant(vec![MessagePart::text(text)]).with_id(id)
    }

    fn system(id: &str) -> Message {
        Message::new(Role::System, vec![MessagePart::text("context")]).with_id(id)
    }

    #[test]
    fn pairs_prompt_with_response() {
        let log = vec![
            user("u1", "classify my data"),
            assistant("a1", "done, breaks=[1,2,3]"),
        ];
        let results = reconcile(&log);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "u1");
        assert_eq!(results[0].prompt, "classify my data");
        assert_eq!(
            results[0].response,
            vec![MessagePart::text("done, breaks=[1,2,3]")]
        );
        assert!(results[0].is_completed);
    }

    #[test]
    fn unanswered_prompt_does_not_swallow_next_prompt() {
        let results = reconcile(&[user("u1", "Q1"), user("u2", "Q2")]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.as_str(), "u1");
        assert!(!results[0].is_completed);
        assert!(results[0].response.is_empty());
        assert_eq!(results[1].id.as_str(), "u2");
        assert!(!results[1].is_completed);
    }

    #[test]
    fn other_roles_between_anchors_are_skipped() {
        let log = vec![user("u1", "Q1"), system("s1"), assistant("a1", "A1")];
        let results = reconcile(&log);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_completed);
    }

    #[test]
    fn only_first_assistant_is_used() {
        let log = vec![
            user("u1", "Q1"),
            assistant("a1", "first"),
            assistant("a2", "second"),
            user("u2", "Q2"),
            assistant("a3", "third"),
        ];
        let results = reconcile(&log);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].response, vec![MessagePart::text("first")]);
        assert_eq!(results[1].response, vec![MessagePart::text("third")]);
        assert_eq!(
            find_ambiguities(&log),
            vec![ReconciliationAmbiguity::DroppedAssistantMessage {
                user_id: MessageId::from("u1"),
                index: 2,
            }]
        );
    }

    #[test]
    fn leading_assistant_messages_are_ignored() {
        let results = reconcile(&[assistant("a0", "hello"), user("u1", "Q1")]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "u1");
        assert!(!results[0].is_completed);
    }

    #[test]
    fn missing_user_id_yields_absent_record_id() {
        let log = vec![user("", "Q"), assistant("a1", "A")];
        let results = reconcile(&log);
        assert!(results[0].id.is_absent());
        assert_eq!(
            find_ambiguities(&log),
            vec![ReconciliationAmbiguity::MissingMessageId { index: 0 }]
        );
    }

    #[test]
    fn duplicate_and_unanswered_prompts_are_flagged() {
        let log = vec![user("u1", "Q1"), user("u1", "Q1 again")];
        assert_eq!(
            find_ambiguities(&log),
            vec![
                ReconciliationAmbiguity::DuplicateMessageId {
                    id: MessageId::from("u1")
                },
                ReconciliationAmbiguity::UnansweredPrompt {
                    user_id: MessageId::from("u1")
                },
            ]
        );
    }

    #[test]
    fn existing_error_message_carries_forward() {
        let log = vec![user("u1", "Q1"), assistant("a1", "A1"), user("u2", "Q2")];
        let existing = vec![AnalysisResult {
            id: MessageId::from("u2"),
            prompt: "stale prompt".into(),
            response: vec![MessagePart::text("stale")],
            error_message: Some("rate limited".into()),
            is_completed: true,
        }];

        let results = reconcile_with_existing(&log, &existing);
        assert_eq!(results[0].error_message, None);
        assert_eq!(results[1].error_message.as_deref(), Some("rate limited"));
        assert_eq!(results[1].prompt, "Q2");
        assert!(results[1].response.is_empty());
        assert!(!results[1].is_completed);
    }

    #[test]
    fn latest_result_uses_last_prompt() {
        let log = vec![user("u1", "Q1"), assistant("a1", "A1"), user("u2", "Q2")];
        let latest = latest_result(&log).unwrap();
        assert_eq!(latest.id.as_str(), "u2");
        assert!(!latest.is_completed);
        assert!(latest_result(&[assistant("a1", "A1")]).is_none());
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(reconcile(&[]).is_empty());
        assert!(find_ambiguities(&[]).is_empty());
    }
}
