//! Trims framing noise from captured shell output.
//!
//! The captured text usually starts with leftovers of the previous prompt and
//! the echoed command line. Everything before the first line that echoes the
//! first command is dropped; the text preceding the command on that line is
//! reported as the prompt. Nothing here parses command semantics.

use log::debug;

use crate::device::{CursorLeftSanitizer, OutputSanitizer};

/// Visual backspace: a space erased by `\b`, emitted by pagers.
const SPACE_BACKSPACE: &str = " \u{8}";

/// Captured output after framing noise has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredOutput {
    pub text: String,
    /// Text preceding the echoed command, e.g. `<HUAWEI>` or `sw1#`.
    /// `None` when the command was never echoed.
    pub prompt: Option<String>,
}

/// Filters with the default sanitizer and returns only the text.
pub fn filter_result(raw: &str, first_command: &str) -> String {
    filter_output(raw, first_command, &CursorLeftSanitizer).text
}

/// Keeps every line from the first echo of `first_command` onwards.
///
/// Each kept line is terminated with `\n`. When no line contains
/// `first_command`, `raw` is returned unchanged, including any control
/// sequences. The detected prompt is not removed from later lines.
pub fn filter_output(
    raw: &str,
    first_command: &str,
    sanitizer: &dyn OutputSanitizer,
) -> FilteredOutput {
    let mut text = String::with_capacity(raw.len());
    let mut prompt: Option<String> = None;

    for line in raw.split('\n') {
        let line = sanitizer.sanitize_line(&line.replace(SPACE_BACKSPACE, ""));

        if prompt.is_none() {
            let Some(pos) = line.find(first_command) else {
                continue;
            };
            let found = line[..pos].replace('\r', "").trim().to_string();
            debug!("Found prompt '{}'", found);
            prompt = Some(found);
        }

        text.push_str(&line);
        text.push('\n');
    }

    match prompt {
        Some(prompt) => FilteredOutput {
            text,
            prompt: Some(prompt),
        },
        None => FilteredOutput {
            text: raw.to_string(),
            prompt: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_lines_from_echoed_command() {
        let raw = "Info: last login\nsw1>disp version\nHuawei VRP\nsw1>";
        let out = filter_output(raw, "disp version", &CursorLeftSanitizer);

        assert_eq!(out.text, "sw1>disp version\nHuawei VRP\nsw1>\n");
        assert_eq!(out.prompt.as_deref(), Some("sw1>"));
    }

    #[test]
    fn prompt_is_recorded_but_not_stripped() {
        let raw = "sw1>disp version\nHuawei ...\nsw1>";
        let filtered = filter_result(raw, "disp version");

        assert!(filtered.starts_with("sw1>disp version\n"));
        assert!(filtered.contains("Huawei ...\n"));
        assert!(filtered.ends_with("sw1>\n"));
    }

    #[test]
    fn returns_raw_when_command_absent() {
        let raw = "garbage \u{8}\r\nmore \u{1b}[1D text\n<sw>";
        assert_eq!(filter_result(raw, "display clock"), raw);
        assert_eq!(filter_result("", "display clock"), "");
    }

    #[test]
    fn strips_backspace_and_cursor_left() {
        let raw = "<FW>display cur | inc ip\r\n ip address 10.0.0.1 \u{1b}[1D\n  ---- More ---- \u{8} \u{8}done";
        let out = filter_output(raw, "display cur", &CursorLeftSanitizer);

        assert_eq!(out.prompt.as_deref(), Some("<FW>"));
        assert_eq!(
            out.text,
            "<FW>display cur | inc ip\r\n ip address 10.0.0.1\n  ---- More ----done\n"
        );
    }

    #[test]
    fn prompt_trims_carriage_returns_and_spaces() {
        let raw = "\r\r  [~R1] show clock\n10:00";
        let out = filter_output(raw, "show clock", &CursorLeftSanitizer);
        assert_eq!(out.prompt.as_deref(), Some("[~R1]"));
    }

    #[test]
    fn only_first_match_sets_prompt() {
        let raw = "R1#show ip\nR1#show ip\n";
        let out = filter_output(raw, "show ip", &CursorLeftSanitizer);
        assert_eq!(out.prompt.as_deref(), Some("R1#"));
        assert_eq!(out.text, "R1#show ip\nR1#show ip\n\n");
    }
}
