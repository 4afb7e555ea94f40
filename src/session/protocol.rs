//! Wire format of the editor's WebSocket API.
//!
//! Inbound, the editor relays user data messages; only those tagged for the
//! copilot are commands. Outbound, every action becomes one `add_action`
//! command.

use crate::core::turnpoints::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message name carrying user data relayed by the editor.
pub const USER_DATA_NAME: &str = "user_data_01";

/// Source tag of messages addressed to us.
pub const COMMAND_SOURCE: &str = "copilot";

/// Outbound command name.
pub const ADD_ACTION_NAME: &str = "add_action";

/// A recognized remote command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Start {
        start_ms: f64,
        channel: Option<u32>,
    },
    Stop,
    Exit,
}

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    _kind: Value,
    name: String,
    data: InboundData,
}

#[derive(Debug, Deserialize)]
struct InboundData {
    source: String,
    message: CommandMessage,
}

#[derive(Debug, Deserialize)]
struct CommandMessage {
    action: String,
    /// Seconds
    #[serde(rename = "startPosition")]
    start_position: Option<f64>,
    #[serde(rename = "scriptIdx")]
    script_idx: Option<u32>,
}

/// Parse an inbound text frame into a command.
///
/// Anything that is not a well-formed copilot command yields `None`.
pub fn parse_command(text: &str) -> Option<ControlCommand> {
    let envelope: InboundEnvelope = serde_json::from_str(text).ok()?;
    if envelope.name != USER_DATA_NAME || envelope.data.source != COMMAND_SOURCE {
        return None;
    }

    let message = envelope.data.message;
    match message.action.as_str() {
        "start" => Some(ControlCommand::Start {
            start_ms: message.start_position.unwrap_or(0.0) * 1000.0,
            channel: message.script_idx,
        }),
        "stop" => Some(ControlCommand::Stop),
        "exit" => Some(ControlCommand::Exit),
        _ => None,
    }
}

/// Outbound command envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub data: ActionPayload,
    #[serde(rename = "scriptIndex", skip_serializing_if = "Option::is_none", default)]
    pub script_index: Option<u32>,
}

/// Position payload of `add_action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    /// Seconds
    pub at: f64,
    pub pos: i32,
}

impl From<&Action> for OutboundCommand {
    fn from(action: &Action) -> Self {
        Self {
            kind: "command".to_string(),
            name: ADD_ACTION_NAME.to_string(),
            data: ActionPayload {
                at: action.at_secs(),
                pos: action.position,
            },
            script_index: action.channel,
        }
    }
}

/// Serialize an action as an `add_action` command.
pub fn encode_action(action: &Action) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundCommand::from(action))
}

/// Parse an `add_action` command back into an action.
pub fn decode_action(text: &str) -> Option<Action> {
    let command: OutboundCommand = serde_json::from_str(text).ok()?;
    if command.name != ADD_ACTION_NAME {
        return None;
    }
    Some(Action::new(
        command.data.at * 1000.0,
        command.data.pos,
        command.script_index,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(message: Value) -> String {
        json!({
            "type": "event",
            "name": "user_data_01",
            "data": { "source": "copilot", "message": message }
        })
        .to_string()
    }

    #[test]
    fn test_parse_start() {
        let text = command(json!({ "action": "start", "startPosition": 12.5, "scriptIdx": 2 }));
        assert_eq!(
            parse_command(&text),
            Some(ControlCommand::Start {
                start_ms: 12_500.0,
                channel: Some(2)
            })
        );
    }

    #[test]
    fn test_parse_start_defaults() {
        let text = command(json!({ "action": "start" }));
        assert_eq!(
            parse_command(&text),
            Some(ControlCommand::Start {
                start_ms: 0.0,
                channel: None
            })
        );
    }

    #[test]
    fn test_parse_stop_and_exit() {
        assert_eq!(
            parse_command(&command(json!({ "action": "stop" }))),
            Some(ControlCommand::Stop)
        );
        assert_eq!(
            parse_command(&command(json!({ "action": "exit" }))),
            Some(ControlCommand::Exit)
        );
    }

    #[test]
    fn test_rejects_malformed_and_foreign() {
        assert_eq!(parse_command("not json"), None);
        assert_eq!(parse_command("[1, 2]"), None);
        assert_eq!(parse_command(&command(json!({ "action": "dance" }))), None);
        assert_eq!(parse_command(&command(json!({ "startPosition": 1 }))), None);

        let missing_type = json!({
            "name": "user_data_01",
            "data": { "source": "copilot", "message": { "action": "stop" } }
        });
        assert_eq!(parse_command(&missing_type.to_string()), None);

        let wrong_name = json!({
            "type": "event",
            "name": "user_data_02",
            "data": { "source": "copilot", "message": { "action": "stop" } }
        });
        assert_eq!(parse_command(&wrong_name.to_string()), None);

        let wrong_source = json!({
            "type": "event",
            "name": "user_data_01",
            "data": { "source": "someone", "message": { "action": "stop" } }
        });
        assert_eq!(parse_command(&wrong_source.to_string()), None);
    }

    #[test]
    fn test_encode_shape() {
        let text = encode_action(&Action::new(1500.0, 42, Some(3))).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "command");
        assert_eq!(value["name"], "add_action");
        assert_eq!(value["data"]["at"], 1.5);
        assert_eq!(value["data"]["pos"], 42);
        assert_eq!(value["scriptIndex"], 3);

        let text = encode_action(&Action::new(1500.0, 42, None)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("scriptIndex").is_none());
    }

    #[test]
    fn test_encode_decode() {
        let text = encode_action(&Action::new(1500.0, 42, None)).unwrap();
        let action = decode_action(&text).unwrap();
        assert_eq!((action.at_secs(), action.position), (1.5, 42));
    }
}
