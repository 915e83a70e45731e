//! OpenAI-format tool definitions advertised to tool-call providers.
//!
//! Argument shapes mirror what the tool-call parser expects: point
//! coordinates on a 0-1000 virtual grid, hotkeys as one `+`-joined string.

use serde_json::{json, Value};

fn tool(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

fn point_params(extra: &[(&str, Value)]) -> Value {
    let mut properties = json!({
        "target": {
            "type": "string",
            "description": "Short description of the UI element"
        },
        "x": {
            "type": "integer",
            "description": "X coordinate, 0-1000 virtual grid"
        },
        "y": {
            "type": "integer",
            "description": "Y coordinate, 0-1000 virtual grid"
        },
    });
    for (key, value) in extra {
        properties[key] = value.clone();
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["x", "y"],
    })
}

/// The full tool set, in a fixed order.
pub fn action_tools() -> Vec<Value> {
    vec![
        tool("click", "Left-click at a point on the screen", point_params(&[])),
        tool(
            "double_click",
            "Double left-click at a point on the screen",
            point_params(&[]),
        ),
        tool(
            "right_click",
            "Right-click at a point on the screen",
            point_params(&[]),
        ),
        tool(
            "type",
            "Type text into the focused element",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Text to type"}
                },
                "required": ["text"],
            }),
        ),
        tool(
            "hotkey",
            "Press a keyboard shortcut",
            json!({
                "type": "object",
                "properties": {
                    "keys": {
                        "type": "string",
                        "description": "Keys joined with '+', e.g. 'ctrl+s'"
                    }
                },
                "required": ["keys"],
            }),
        ),
        tool(
            "scroll",
            "Scroll the screen",
            json!({
                "type": "object",
                "properties": {
                    "direction": {
                        "type": "string",
                        "enum": ["up", "down", "left", "right"]
                    },
                    "amount": {
                        "type": "integer",
                        "description": "Scroll ticks, default 3"
                    }
                },
                "required": ["direction"],
            }),
        ),
        tool(
            "drag",
            "Press at one point and release at another",
            json!({
                "type": "object",
                "properties": {
                    "from_x": {"type": "integer"},
                    "from_y": {"type": "integer"},
                    "to_x": {"type": "integer"},
                    "to_y": {"type": "integer"},
                },
                "required": ["from_x", "from_y", "to_x", "to_y"],
            }),
        ),
        tool(
            "wait",
            "Wait without acting, e.g. for a page to load",
            json!({
                "type": "object",
                "properties": {
                    "seconds": {"type": "number", "description": "Seconds to wait, default 1"}
                },
                "required": [],
            }),
        ),
        tool(
            "done",
            "Declare the goal accomplished and stop",
            json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "What was accomplished"}
                },
                "required": [],
            }),
        ),
        tool(
            "think",
            "Record reasoning about the screen before acting. Performs no action",
            json!({
                "type": "object",
                "properties": {
                    "reasoning": {"type": "string"}
                },
                "required": ["reasoning"],
            }),
        ),
    ]
}
