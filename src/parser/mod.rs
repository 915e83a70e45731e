//! Response normalization: free-form model output in, [`ParsedResponse`] out.
//!
//! Both entry points are pure functions. Model output is unreliable by
//! nature, so the parsers here are deliberately lenient: unclosed tags are
//! truncated at the first line, unparseable sequence steps are dropped, and
//! anything unidentifiable degrades to `Unknown` instead of an error.
//!
//! [`ParsedResponse`]: crate::action::ParsedResponse

pub mod tagged;
pub mod tool_call;

pub use tagged::parse_response;
pub use tool_call::{parse_tool_calls, ToolInvocation};

/// `"ctrl+shift+s"` → `["ctrl", "shift", "s"]`, order preserved.
pub(crate) fn split_keys(raw: &str) -> Vec<String> {
    raw.split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keys_preserves_order_and_trims() {
        assert_eq!(split_keys("ctrl + shift+s"), vec!["ctrl", "shift", "s"]);
        assert!(split_keys("").is_empty());
    }
}
