use crate::session::{Message, MessagePart, ToolInvocationState};
use crate::transport::DeltaEvent;

/// Folds delta events into the assistant message being streamed.
#[derive(Debug, Clone)]
pub struct ResponseAccumulator {
    message: Message,
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self {
            message: Message::assistant(Vec::new()),
        }
    }

    /// Apply one non-terminal delta. Terminal events change nothing and
    /// return `false`.
    pub fn apply(&mut self, event: &DeltaEvent) -> bool {
        let parts = &mut self.message.parts;
        match event {
            DeltaEvent::TextDelta { text } => {
                match parts.last_mut() {
                    Some(MessagePart::Text { text: existing }) => existing.push_str(text),
                    _ => parts.push(MessagePart::text(text.clone())),
                }
                true
            }
            DeltaEvent::ToolCallStart {
                tool_call_id,
                tool_name,
                args,
            } => {
                parts.push(MessagePart::ToolInvocation {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                    args: args.clone(),
                    state: ToolInvocationState::Call,
                    result: None,
                });
                true
            }
            DeltaEvent::ToolCallResult {
                tool_call_id,
                result,
                is_error,
            } => {
                let next_state = if *is_error {
                    ToolInvocationState::Error
                } else {
                    ToolInvocationState::Result
                };
                let existing = parts.iter_mut().rev().find_map(|part| match part {
                    MessagePart::ToolInvocation {
                        tool_call_id: id,
                        state,
                        result,
                        ..
                    } if id == tool_call_id => Some((state, result)),
                    _ => None,
                });
                match existing {
                    Some((state, slot)) => {
                        *state = next_state;
                        *slot = Some(result.clone());
                    }
                    // Result without a start: keep it rather than lose it.
                    None => parts.push(MessagePart::ToolInvocation {
                        tool_call_id: tool_call_id.clone(),
                        tool_name: String::new(),
                        args: serde_json::Value::Null,
                        state: next_state,
                        result: Some(result.clone()),
                    }),
                }
                true
            }
            DeltaEvent::StreamEnd | DeltaEvent::StreamError { .. } => false,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    pub fn is_empty(&self) -> bool {
        self.message.parts.is_empty()
    }
}
