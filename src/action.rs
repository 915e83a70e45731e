//! Canonical action vocabulary shared by the parser, the step engine and
//! the executor. Pure data; the only behavior is coordinate conversion.

use serde::{Deserialize, Serialize};

/// A rectangle in the model's normalized 0–1000 coordinate space.
///
/// The parser stores whatever integers the model produced, including
/// degenerate boxes (x1 == x2). Values are clamped when converted to
/// physical pixels, not at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCoords {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoxCoords {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Small synthetic box around a point, used when a provider returns
    /// `(x, y)` coordinates instead of a rectangle.
    pub fn around_point(x: i64, y: i64) -> Self {
        Self {
            x1: (x - 5).max(0),
            y1: (y - 5).max(0),
            x2: (x + 5).min(1000),
            y2: (y + 5).min(1000),
        }
    }

    /// Center of the box in physical pixels for a screen of the given size.
    /// Each coordinate is clamped into 0..=1000 first.
    pub fn center(&self, width: u32, height: u32) -> (i32, i32) {
        let cl = |v: i64| v.clamp(0, 1000);
        let x1 = cl(self.x1) * width as i64 / 1000;
        let y1 = cl(self.y1) * height as i64 / 1000;
        let x2 = cl(self.x2) * width as i64 / 1000;
        let y2 = cl(self.y2) * height as i64 / 1000;
        (((x1 + x2) / 2) as i32, ((y1 + y2) / 2) as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Lenient parse; anything unrecognized scrolls down, matching the
    /// executor's historical default.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Self::Up,
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Down,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

pub const DEFAULT_SCROLL_AMOUNT: i64 = 3;
pub const DEFAULT_WAIT_SECONDS: f64 = 1.0;

/// One atomic agent operation.
///
/// Optional fields stay optional here even when execution requires them;
/// the executor reports the missing piece as an `ERROR:` result instead of
/// the parser rejecting the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Click {
        target: Option<String>,
        region: Option<BoxCoords>,
    },
    DoubleClick {
        target: Option<String>,
        region: Option<BoxCoords>,
    },
    RightClick {
        target: Option<String>,
        region: Option<BoxCoords>,
    },
    Type {
        text: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    Scroll {
        direction: ScrollDirection,
        amount: i64,
    },
    Drag {
        from: Option<BoxCoords>,
        to: Option<BoxCoords>,
    },
    Wait {
        seconds: f64,
    },
    Done {
        reason: Option<String>,
    },
    /// The parser could not identify an action tag. Never executed; always
    /// surfaced as a recoverable condition.
    Unknown {
        raw: String,
    },
}

impl Action {
    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::DoubleClick { .. } => "double_click",
            Action::RightClick { .. } => "right_click",
            Action::Type { .. } => "type",
            Action::Hotkey { .. } => "hotkey",
            Action::Scroll { .. } => "scroll",
            Action::Drag { .. } => "drag",
            Action::Wait { .. } => "wait",
            Action::Done { .. } => "done",
            Action::Unknown { .. } => "unknown",
        }
    }
}

/// An action plus the free-text rationale the model attached to it, when any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedAction {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub think: Option<String>,
}

impl ParsedAction {
    pub fn bare(action: Action) -> Self {
        Self {
            action,
            think: None,
        }
    }
}

/// Canonical result of response normalization: either one action or an
/// ordered sequence meant to execute without re-observation in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedResponse {
    Single {
        action: ParsedAction,
    },
    Sequence {
        #[serde(skip_serializing_if = "Option::is_none")]
        think: Option<String>,
        steps: Vec<ParsedAction>,
    },
}

impl ParsedResponse {
    /// The rationale carried by this response, wherever it landed.
    pub fn think(&self) -> Option<&str> {
        match self {
            ParsedResponse::Single { action } => action.think.as_deref(),
            ParsedResponse::Sequence { think, .. } => think.as_deref(),
        }
    }

    pub fn unknown(raw: impl Into<String>) -> Self {
        ParsedResponse::Single {
            action: ParsedAction::bare(Action::Unknown { raw: raw.into() }),
        }
    }
}
