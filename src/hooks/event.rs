//! Wire types for the host runtime's hook protocol.
//!
//! One JSON object arrives on stdin per invocation; one JSON object goes back on
//! stdout. Field names follow the host's conventions (`snake_case` in,
//! `camelCase` out).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle events, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    PreCompact,
    SessionEnd,
}

impl HookEvent {
    pub const ALL: [HookEvent; 6] = [
        Self::SessionStart,
        Self::UserPromptSubmit,
        Self::PreToolUse,
        Self::PostToolUse,
        Self::PreCompact,
        Self::SessionEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PreCompact => "PreCompact",
            Self::SessionEnd => "SessionEnd",
        }
    }

    /// Events whose response can allow or deny the pending action.
    pub fn is_gating(&self) -> bool {
        matches!(self, Self::PreToolUse)
    }

    /// Events where the host accepts `additionalContext`. For the others,
    /// context is delivered as a system message.
    pub fn accepts_context(&self) -> bool {
        matches!(
            self,
            Self::SessionStart | Self::UserPromptSubmit | Self::PreToolUse | Self::PostToolUse
        )
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown hook event: {s}"))
    }
}

/// One event as delivered by the host. Event-specific fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub hook_event_name: String,
    pub session_id: String,
    pub cwd: Option<String>,
    pub prompt: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_response: Option<Value>,
    /// `manual` or `auto` for compaction.
    pub trigger: Option<String>,
    /// Why the session ended.
    pub reason: Option<String>,
    /// `startup`, `resume`, `clear` or `compact` for session start.
    pub source: Option<String>,
}

impl HookInput {
    pub fn event(&self) -> Option<HookEvent> {
        self.hook_event_name.parse().ok()
    }

    /// `tool_input.file_path` (or `notebook_path`) for file-editing tools.
    pub fn target_file(&self) -> Option<&str> {
        let input = self.tool_input.as_ref()?;
        input
            .get("file_path")
            .or_else(|| input.get("notebook_path"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// Response written to stdout. An empty response is `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
}

impl HookOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.system_message.is_none() && self.hook_specific_output.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tool_event() {
        let input: HookInput = serde_json::from_value(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "abc",
            "cwd": "/work/alpha",
            "tool_name": "Write",
            "tool_input": {"file_path": "src/lib.rs", "content": "x"},
            "transcript_path": "/tmp/t.jsonl"
        }))
        .unwrap();
        assert_eq!(input.event(), Some(HookEvent::PreToolUse));
        assert_eq!(input.target_file(), Some("src/lib.rs"));
    }

    #[test]
    fn unknown_event_name_is_not_an_event() {
        let input: HookInput =
            serde_json::from_value(json!({"hook_event_name": "Notification", "session_id": "a"}))
                .unwrap();
        assert_eq!(input.event(), None);
    }

    #[test]
    fn empty_output_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&HookOutput::empty()).unwrap(), "{}");
    }

    #[test]
    fn deny_output_uses_host_field_names() {
        let output = HookOutput {
            system_message: None,
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: "PreToolUse".into(),
                additional_context: None,
                permission_decision: Some(Decision::Deny),
                permission_decision_reason: Some("generated file".into()),
            }),
        };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"hookSpecificOutput": {
                "hookEventName": "PreToolUse",
                "permissionDecision": "deny",
                "permissionDecisionReason": "generated file"
            }})
        );
    }
}
