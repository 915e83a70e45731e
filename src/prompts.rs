//! Prompt assembly: the system prompt describing the action vocabulary and
//! the per-step user context (goal + transcript + stagnation warning).

use crate::llm::provider::ParseMode;

const CORE_PROMPT: &str = "\
You are an autonomous computer-use agent. You can see the user's screen and \
control their mouse and keyboard to accomplish a goal.

On each turn you will receive a screenshot of the current screen and a log of \
your previous actions. Use the action log to track progress and avoid repeating \
failed actions. Decide the best next action (or a short sequence of blind-safe \
actions) to take toward the goal, then output it in the format described below.

## Available actions

### click — left-click on a UI element
<think>your reasoning</think>
<action>click</action>
<target>description of element</target>
<box>(x1,y1),(x2,y2)</box>

### double_click / right_click — same shape as click
<action>double_click</action> or <action>right_click</action>

### type — type text at the current cursor position
<action>type</action>
<text>the text to type</text>

### hotkey — press a keyboard shortcut
<action>hotkey</action>
<keys>ctrl+c</keys>

### scroll — scroll the mouse wheel
<action>scroll</action>
<direction>down</direction>
<amount>3</amount>

### drag — drag from one point to another
<action>drag</action>
<from><box>(x1,y1),(x2,y2)</box></from>
<to><box>(x1,y1),(x2,y2)</box></to>

### wait — pause before the next action
<action>wait</action>
<seconds>2</seconds>

### done — the goal has been accomplished
<action>done</action>
<reason>explain why the task is complete</reason>

## Sequencing

You may output a SINGLE action OR a SEQUENCE of actions.

Use a sequence when the follow-up actions do NOT depend on new visual state — \
for example, clicking a text field, typing a query, and pressing Enter. These \
blind-safe chains save time because no screenshot is taken between steps.

Do NOT sequence actions where a later step depends on seeing the result of an \
earlier one (e.g. clicking a dropdown then selecting an option — you need to \
see the menu first).

### Sequence of actions
<think>your reasoning for the full sequence</think>
<sequence>
<step>
<action>click</action>
<target>description</target>
<box>(x1,y1),(x2,y2)</box>
</step>
<step>
<action>type</action>
<text>hello world</text>
</step>
</sequence>

## Rules
- Output exactly ONE action or ONE sequence per turn.
- Always include <think> before your action/sequence to explain your reasoning.
- Write a detailed <target> description that includes the element's visual \
appearance, label/text, and location on screen.
{coordinate_instructions}\
- For hotkey, separate keys with + (e.g. ctrl+shift+s, alt+f4, enter).
- Only use sequences for blind-safe chains. When in doubt, use a single action.
- If your previous action did not change the screen, do NOT repeat it. Try a \
fundamentally different approach (different action type, different element, or \
a keyboard shortcut). Check the action log for \"[screen unchanged]\" annotations.
- Do not explain anything outside the XML tags.
";

const XML_BOX_INSTRUCTIONS: &str = "\
- For click/double_click/right_click/drag, you MUST include <box> coordinates \
normalized to 0-1000.\n";

const TOOL_USE_INSTRUCTIONS: &str = "\
- For click/double_click/right_click/drag, provide the x and y coordinates \
as integers from 0-1000, where (0,0) is top-left and (1000,1000) is \
bottom-right.\n";

/// Build the system prompt, with coordinate instructions matching how the
/// selected provider reports locations.
pub fn build_system_prompt(mode: ParseMode) -> String {
    let coord = match mode {
        ParseMode::Tagged => XML_BOX_INSTRUCTIONS,
        ParseMode::ToolCall => TOOL_USE_INSTRUCTIONS,
    };
    CORE_PROMPT.replace("{coordinate_instructions}", coord)
}

/// Build the per-step user message: goal, transcript of prior outcomes, and
/// the stagnation warning when the screen has stopped responding.
pub fn build_user_context(goal: &str, transcript: &[String], unchanged_count: u32) -> String {
    let mut text = format!("Goal: {goal}");

    if !transcript.is_empty() {
        text.push_str("\n\nCompleted actions:\n");
        text.push_str(&transcript.join("\n"));
    }

    if unchanged_count >= 2 {
        text.push_str(&format!(
            "\n\nWARNING: The screen has NOT changed for {unchanged_count} \
             consecutive actions. Your recent actions had no visible effect. \
             You MUST try a completely different approach — for example:\n\
             - Use double_click instead of click\n\
             - Try a keyboard shortcut (e.g. Enter to confirm, Space to toggle)\n\
             - Click a different UI element\n\
             - Scroll to reveal new elements\n\
             Do NOT repeat the same action again."
        ));
    }

    text.push_str("\n\nHere is the current screenshot. What is your next action?");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_selects_coordinate_instructions() {
        let tagged = build_system_prompt(ParseMode::Tagged);
        assert!(tagged.contains("MUST include <box>"));
        let tool = build_system_prompt(ParseMode::ToolCall);
        assert!(tool.contains("x and y coordinates"));
        assert!(!tool.contains("{coordinate_instructions}"));
    }

    #[test]
    fn user_context_includes_transcript_and_warning() {
        let transcript = vec!["Step 1: click on 'icon' at (10, 10)".to_string()];
        let plain = build_user_context("open notepad", &transcript, 0);
        assert!(plain.contains("Goal: open notepad"));
        assert!(plain.contains("Completed actions:"));
        assert!(!plain.contains("WARNING"));

        let warned = build_user_context("open notepad", &transcript, 2);
        assert!(warned.contains("NOT changed for 2 consecutive actions"));
    }
}
