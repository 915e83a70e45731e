//! Parser for pseudo-XML tagged model output.
//!
//! Models under load truncate, skip closing tags and drop parentheses, so
//! every extraction has a tolerant fallback tier.

use regex::Regex;

use crate::action::{
    Action, BoxCoords, ParsedAction, ParsedResponse, ScrollDirection, DEFAULT_SCROLL_AMOUNT,
    DEFAULT_WAIT_SECONDS,
};
use crate::parser::split_keys;

/// Extract the content of `<tag>…</tag>`.
///
/// If no closing tag is present, takes the first line after the opening tag
/// and strips anything from a stray `<` onward, so a missing closing tag
/// cannot bleed into the next field.
fn extract_tag(text: &str, tag: &str) -> Option<String> {
    if let Ok(closed) = Regex::new(&format!(r"(?s)<{tag}>(.*?)</{tag}>")) {
        if let Some(caps) = closed.captures(text) {
            let content = caps[1].trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
            return None;
        }
    }

    let open = Regex::new(&format!(r"(?s)<{tag}>\s*(.*)")).ok()?;
    let caps = open.captures(text)?;
    let first_line = caps[1].trim().lines().next().unwrap_or("").trim();
    let content = match first_line.find('<') {
        Some(i) => first_line[..i].trim(),
        None => first_line,
    };
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

/// Extract box coordinates following a `<box>` tag.
///
/// Strict tier matches the documented `(x1,y1),(x2,y2)` format; the fallback
/// accepts any four integers after the opening tag regardless of punctuation.
fn extract_box(text: &str) -> Option<BoxCoords> {
    if let Ok(strict) = Regex::new(r"<box>\((\d+),(\d+)\),\((\d+),(\d+)\)</box>") {
        if let Some(caps) = strict.captures(text) {
            return box_from_captures(&caps);
        }
    }
    let loose = Regex::new(r"<box>[^\d]*(\d+)\D+(\d+)\D+(\d+)\D+(\d+)").ok()?;
    let caps = loose.captures(text)?;
    box_from_captures(&caps)
}

fn box_from_captures(caps: &regex::Captures<'_>) -> Option<BoxCoords> {
    Some(BoxCoords::new(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
        caps[4].parse().ok()?,
    ))
}

/// Parse one tagged action block. Unrecognized or missing `<action>` values
/// yield `Unknown` carrying the original input.
pub fn parse_action(text: &str) -> ParsedAction {
    let Some(name) = extract_tag(text, "action") else {
        return ParsedAction::bare(Action::Unknown {
            raw: text.to_string(),
        });
    };
    let think = extract_tag(text, "think");

    let action = match name.as_str() {
        "click" | "double_click" | "right_click" => {
            let target = extract_tag(text, "target");
            let region = extract_box(text);
            match name.as_str() {
                "click" => Action::Click { target, region },
                "double_click" => Action::DoubleClick { target, region },
                _ => Action::RightClick { target, region },
            }
        }
        "type" => Action::Type {
            text: extract_tag(text, "text").unwrap_or_default(),
        },
        "hotkey" => Action::Hotkey {
            keys: split_keys(&extract_tag(text, "keys").unwrap_or_default()),
        },
        "scroll" => Action::Scroll {
            direction: extract_tag(text, "direction")
                .map(|d| ScrollDirection::parse(&d))
                .unwrap_or(ScrollDirection::Down),
            amount: extract_tag(text, "amount")
                .and_then(|a| a.trim().parse::<i64>().ok())
                .unwrap_or(DEFAULT_SCROLL_AMOUNT)
                .max(1),
        },
        "drag" => Action::Drag {
            from: drag_box(text, "from"),
            to: drag_box(text, "to"),
        },
        "wait" => Action::Wait {
            seconds: extract_tag(text, "seconds")
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(DEFAULT_WAIT_SECONDS)
                .max(0.0),
        },
        "done" => Action::Done {
            reason: extract_tag(text, "reason"),
        },
        _ => {
            return ParsedAction::bare(Action::Unknown {
                raw: text.to_string(),
            })
        }
    };

    ParsedAction { action, think }
}

/// Box inside a `<from>` / `<to>` wrapper, tolerating a missing closing tag
/// on the wrapper itself.
fn drag_box(text: &str, wrapper: &str) -> Option<BoxCoords> {
    if let Ok(closed) = Regex::new(&format!(r"(?s)<{wrapper}>(.*?)</{wrapper}>")) {
        if let Some(m) = closed.find(text) {
            return extract_box(m.as_str());
        }
    }
    let open = Regex::new(&format!(r"(?s)<{wrapper}>(.*)")).ok()?;
    let m = open.find(text)?;
    extract_box(m.as_str())
}

/// Parse a full model response: a `<sequence>` of `<step>` blocks when
/// present, otherwise a single action.
///
/// Steps that parse to `Unknown` are silently dropped; if no step survives,
/// the whole input is re-parsed as a single action.
pub fn parse_response(text: &str) -> ParsedResponse {
    if let Ok(seq_re) = Regex::new(r"(?s)<sequence>(.*?)</sequence>") {
        if let Some(caps) = seq_re.captures(text) {
            let think = extract_tag(text, "think");
            let mut steps = Vec::new();
            if let Ok(step_re) = Regex::new(r"(?s)<step>(.*?)</step>") {
                for step in step_re.captures_iter(&caps[1]) {
                    let parsed = parse_action(&step[1]);
                    if !parsed.action.is_unknown() {
                        steps.push(parsed);
                    }
                }
            }
            if !steps.is_empty() {
                return ParsedResponse::Sequence { think, steps };
            }
        }
    }

    ParsedResponse::Single {
        action: parse_action(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(resp: ParsedResponse) -> ParsedAction {
        match resp {
            ParsedResponse::Single { action } => action,
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[test]
    fn parses_click_with_target_and_box() {
        let text = "<think>the button is top right</think>\n\
                    <action>click</action>\n\
                    <target>settings gear</target>\n\
                    <box>(910,20),(960,60)</box>";
        let parsed = single(parse_response(text));
        assert_eq!(
            parsed.action,
            Action::Click {
                target: Some("settings gear".into()),
                region: Some(BoxCoords::new(910, 20, 960, 60)),
            }
        );
        assert_eq!(parsed.think.as_deref(), Some("the button is top right"));
    }

    #[test]
    fn parses_double_and_right_click() {
        let dbl = single(parse_response(
            "<action>double_click</action><target>file</target><box>(1,2),(3,4)</box>",
        ));
        assert!(matches!(dbl.action, Action::DoubleClick { .. }));
        let right = single(parse_response("<action>right_click</action>"));
        assert_eq!(
            right.action,
            Action::RightClick {
                target: None,
                region: None
            }
        );
    }

    #[test]
    fn parses_type_action() {
        let parsed = single(parse_response(
            "<action>type</action>\n<text>hello world</text>",
        ));
        assert_eq!(
            parsed.action,
            Action::Type {
                text: "hello world".into()
            }
        );
    }

    #[test]
    fn parses_hotkey_preserving_key_order() {
        let parsed = single(parse_response(
            "<action>hotkey</action><keys>ctrl+shift+s</keys>",
        ));
        assert_eq!(
            parsed.action,
            Action::Hotkey {
                keys: vec!["ctrl".into(), "shift".into(), "s".into()]
            }
        );
    }

    #[test]
    fn parses_scroll_with_defaults() {
        let explicit = single(parse_response(
            "<action>scroll</action><direction>up</direction><amount>5</amount>",
        ));
        assert_eq!(
            explicit.action,
            Action::Scroll {
                direction: ScrollDirection::Up,
                amount: 5
            }
        );
        let defaulted = single(parse_response("<action>scroll</action>"));
        assert_eq!(
            defaulted.action,
            Action::Scroll {
                direction: ScrollDirection::Down,
                amount: 3
            }
        );
        let garbage_amount = single(parse_response(
            "<action>scroll</action><direction>left</direction><amount>lots</amount>",
        ));
        assert_eq!(
            garbage_amount.action,
            Action::Scroll {
                direction: ScrollDirection::Left,
                amount: 3
            }
        );
    }

    #[test]
    fn parses_drag_with_from_to_boxes() {
        let text = "<action>drag</action>\n\
                    <from><box>(100,100),(120,120)</box></from>\n\
                    <to><box>(500,500),(520,520)</box></to>";
        let parsed = single(parse_response(text));
        assert_eq!(
            parsed.action,
            Action::Drag {
                from: Some(BoxCoords::new(100, 100, 120, 120)),
                to: Some(BoxCoords::new(500, 500, 520, 520)),
            }
        );
    }

    #[test]
    fn parses_wait_and_done() {
        let wait = single(parse_response("<action>wait</action><seconds>2.5</seconds>"));
        assert_eq!(wait.action, Action::Wait { seconds: 2.5 });
        let wait_default = single(parse_response("<action>wait</action>"));
        assert_eq!(wait_default.action, Action::Wait { seconds: 1.0 });
        let done = single(parse_response(
            "<action>done</action><reason>notepad is open</reason>",
        ));
        assert_eq!(
            done.action,
            Action::Done {
                reason: Some("notepad is open".into())
            }
        );
    }

    #[test]
    fn unclosed_tag_takes_first_line_only() {
        let text = "<action>click\n<target>submit button\n<box>(10,10),(20,20)</box>";
        let parsed = single(parse_response(text));
        assert_eq!(
            parsed.action,
            Action::Click {
                target: Some("submit button".into()),
                region: Some(BoxCoords::new(10, 10, 20, 20)),
            }
        );
    }

    #[test]
    fn box_without_parentheses_still_parses() {
        let text = "<action>click</action><box>10, 20, 30, 40</box>";
        let parsed = single(parse_response(text));
        assert_eq!(
            parsed.action,
            Action::Click {
                target: None,
                region: Some(BoxCoords::new(10, 20, 30, 40)),
            }
        );
    }

    #[test]
    fn garbled_input_never_fails() {
        for text in [
            "",
            "no tags at all",
            "<action></action>",
            "<action>teleport</action>",
            "<box>(1,2),(3,4)</box>",
            "<<<>>>",
        ] {
            let parsed = single(parse_response(text));
            assert!(
                parsed.action.is_unknown(),
                "expected unknown for {text:?}, got {:?}",
                parsed.action
            );
        }
    }

    #[test]
    fn sequence_keeps_valid_steps_in_order() {
        let text = "<think>open the search box and query</think>\n\
                    <sequence>\n\
                    <step><action>click</action><box>(1,1),(2,2)</box></step>\n\
                    <step>this step is garbage</step>\n\
                    <step><action>type</action><text>rust</text></step>\n\
                    <step><action>hotkey</action><keys>enter</keys></step>\n\
                    </sequence>";
        match parse_response(text) {
            ParsedResponse::Sequence { think, steps } => {
                assert_eq!(think.as_deref(), Some("open the search box and query"));
                assert_eq!(steps.len(), 3);
                assert!(matches!(steps[0].action, Action::Click { .. }));
                assert!(matches!(steps[1].action, Action::Type { .. }));
                assert!(matches!(steps[2].action, Action::Hotkey { .. }));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn sequence_with_no_valid_steps_falls_back_to_single() {
        let text = "<sequence><step>junk</step><step>more junk</step></sequence>";
        let parsed = single(parse_response(text));
        assert!(parsed.action.is_unknown());
    }
}
