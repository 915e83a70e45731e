//! Parser for vendor structured tool calls.
//!
//! Converges on the same [`ParsedResponse`] shape as the tagged-text path:
//! a fixed name→shape table, point coordinates expanded to small boxes, and
//! a dedicated `think` tool captured as the sequence-level rationale.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::{Action, BoxCoords, ParsedAction, ParsedResponse, ScrollDirection};
use crate::parser::split_keys;

/// One tool invocation as reported by a provider, already decoupled from any
/// vendor wire format. `arguments` may be a JSON object or a string that
/// still needs decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

fn coord(args: &Value, key: &str) -> Option<i64> {
    args[key]
        .as_i64()
        .or_else(|| args[key].as_f64().map(|v| v.round() as i64))
}

fn point_box(args: &Value, x_key: &str, y_key: &str) -> Option<BoxCoords> {
    match (coord(args, x_key), coord(args, y_key)) {
        (Some(x), Some(y)) => Some(BoxCoords::around_point(x, y)),
        _ => None,
    }
}

/// Parse an ordered list of tool calls.
///
/// One surviving call yields `Single`, two or more yield `Sequence`.
/// Calls with undecodable arguments or unrecognized names are dropped; an
/// empty or fully-unrecognized list yields `Single`/`Unknown`.
pub fn parse_tool_calls(calls: &[ToolInvocation]) -> ParsedResponse {
    let mut steps: Vec<ParsedAction> = Vec::new();
    let mut think: Option<String> = None;

    for call in calls {
        let args = match &call.arguments {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v) => v,
                Err(_) => continue,
            },
            other => other.clone(),
        };

        let action = match call.name.as_str() {
            "click" | "double_click" | "right_click" => {
                let target = args["target"].as_str().map(str::to_string);
                let region = point_box(&args, "x", "y");
                match call.name.as_str() {
                    "click" => Action::Click { target, region },
                    "double_click" => Action::DoubleClick { target, region },
                    _ => Action::RightClick { target, region },
                }
            }
            "type" => Action::Type {
                text: args["text"].as_str().unwrap_or("").to_string(),
            },
            "hotkey" => Action::Hotkey {
                keys: split_keys(args["keys"].as_str().unwrap_or("")),
            },
            "scroll" => Action::Scroll {
                direction: ScrollDirection::parse(args["direction"].as_str().unwrap_or("down")),
                amount: args["amount"].as_i64().unwrap_or(3).max(1),
            },
            "drag" => Action::Drag {
                from: point_box(&args, "from_x", "from_y"),
                to: point_box(&args, "to_x", "to_y"),
            },
            "wait" => Action::Wait {
                seconds: args["seconds"].as_f64().unwrap_or(1.0).max(0.0),
            },
            "done" => Action::Done {
                reason: args["reason"].as_str().map(str::to_string),
            },
            // Rationale-only tool: captured as the sequence-level think,
            // never emitted as a step.
            "think" => {
                think = args["reasoning"].as_str().map(str::to_string);
                continue;
            }
            _ => continue,
        };

        steps.push(ParsedAction::bare(action));
    }

    if steps.is_empty() {
        return ParsedResponse::unknown(format!("{calls:?}"));
    }

    if steps.len() == 1 {
        let mut action = steps.remove(0);
        action.think = think;
        return ParsedResponse::Single { action };
    }

    ParsedResponse::Sequence { think, steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_click_point_becomes_small_box() {
        let calls = [ToolInvocation::new(
            "click",
            json!({"target": "ok button", "x": 500, "y": 500}),
        )];
        match parse_tool_calls(&calls) {
            ParsedResponse::Single { action } => {
                assert_eq!(
                    action.action,
                    Action::Click {
                        target: Some("ok button".into()),
                        region: Some(BoxCoords::new(495, 495, 505, 505)),
                    }
                );
            }
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn two_calls_become_a_sequence() {
        let calls = [
            ToolInvocation::new("click", json!({"x": 100, "y": 200})),
            ToolInvocation::new("type", json!({"text": "hello"})),
        ];
        match parse_tool_calls(&calls) {
            ParsedResponse::Sequence { steps, .. } => assert_eq!(steps.len(), 2),
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn think_call_is_captured_not_emitted() {
        let calls = [
            ToolInvocation::new("think", json!({"reasoning": "the field is focused"})),
            ToolInvocation::new("type", json!({"text": "query"})),
        ];
        match parse_tool_calls(&calls) {
            ParsedResponse::Single { action } => {
                assert_eq!(action.think.as_deref(), Some("the field is focused"));
                assert_eq!(
                    action.action,
                    Action::Type {
                        text: "query".into()
                    }
                );
            }
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn string_arguments_are_decoded() {
        let calls = [ToolInvocation::new(
            "hotkey",
            Value::String(r#"{"keys": "ctrl+s"}"#.into()),
        )];
        match parse_tool_calls(&calls) {
            ParsedResponse::Single { action } => assert_eq!(
                action.action,
                Action::Hotkey {
                    keys: vec!["ctrl".into(), "s".into()]
                }
            ),
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn empty_or_unrecognized_list_is_unknown() {
        assert!(matches!(
            parse_tool_calls(&[]),
            ParsedResponse::Single { action } if action.action.is_unknown()
        ));
        let calls = [
            ToolInvocation::new("levitate", json!({})),
            ToolInvocation::new("click", Value::String("not json".into())),
        ];
        assert!(matches!(
            parse_tool_calls(&calls),
            ParsedResponse::Single { action } if action.action.is_unknown()
        ));
    }

    #[test]
    fn drag_points_become_boxes() {
        let calls = [ToolInvocation::new(
            "drag",
            json!({"from_x": 10, "from_y": 10, "to_x": 990, "to_y": 990}),
        )];
        match parse_tool_calls(&calls) {
            ParsedResponse::Single { action } => assert_eq!(
                action.action,
                Action::Drag {
                    from: Some(BoxCoords::new(5, 5, 15, 15)),
                    to: Some(BoxCoords::new(985, 985, 995, 995)),
                }
            ),
            other => panic!("expected single, got {other:?}"),
        }
    }
}
