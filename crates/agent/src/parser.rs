//! Output parser — interprets raw model text.
//!
//! The model service is plain text in, plain text out, so tool calling is a
//! text convention: a JSON object with a `"tool"` key, either as the entire
//! reply or inside a single ```json fence. Anything else is a final answer.
//! `<thinking>…</thinking>` blocks are stripped into a separate trace.
//!
//! Parsing never fails the loop: a formatting slip from the model degrades
//! to treating the whole text as the answer, so the user is never left
//! without output.

use murmur_core::tool::ToolCall;

/// What one model response turned out to be.
#[derive(Debug)]
pub enum Parsed {
    /// The model wants a tool executed.
    ToolCall(ToolCall),

    /// The model is done; this is the final answer.
    Answer {
        answer: String,
        thinking: Option<String>,
    },
}

/// Parse one raw model response.
pub fn parse(raw: &str) -> Parsed {
    let (text, thinking) = split_thinking(raw);
    let candidate = text.trim();

    if let Some(call) = tool_call_from(candidate) {
        return Parsed::ToolCall(call);
    }

    Parsed::Answer {
        answer: candidate.to_string(),
        thinking,
    }
}

/// Strip `<thinking>…</thinking>` blocks out of the text.
///
/// Multiple blocks are joined with blank lines. An unterminated open tag is
/// left in place — better to show the user odd text than to eat half the
/// answer.
fn split_thinking(raw: &str) -> (String, Option<String>) {
    const OPEN: &str = "<thinking>";
    const CLOSE: &str = "</thinking>";

    let mut rest = raw;
    let mut text = String::new();
    let mut traces: Vec<String> = Vec::new();

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        text.push_str(&rest[..start]);
        traces.push(after_open[..end].trim().to_string());
        rest = &after_open[end + CLOSE.len()..];
    }
    text.push_str(rest);

    let thinking = if traces.is_empty() {
        None
    } else {
        Some(traces.join("\n\n"))
    };
    (text, thinking)
}

/// Recognize a single well-formed tool-call encoding, or nothing.
fn tool_call_from(candidate: &str) -> Option<ToolCall> {
    // The entire reply is the JSON object.
    if candidate.starts_with('{') {
        return tool_call_from_json(candidate);
    }

    // Exactly one fenced block holding the object. Two candidate calls in
    // one reply is ambiguous — no partial states, treat as a final answer.
    let fenced: Vec<&str> = fenced_blocks(candidate).collect();
    match fenced.as_slice() {
        [one] => tool_call_from_json(one.trim()),
        _ => None,
    }
}

fn tool_call_from_json(text: &str) -> Option<ToolCall> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let tool = value.get("tool")?.as_str()?.to_string();

    let arguments = match value.get("arguments") {
        None => serde_json::json!({}),
        Some(args) if args.is_object() => args.clone(),
        // A non-object arguments field is not a well-formed encoding.
        Some(_) => return None,
    };

    Some(ToolCall::new(tool, arguments))
}

/// Iterate the contents of ``` fences (with or without a language tag).
fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let start = rest.find("```")?;
        let after = &rest[start + 3..];
        // Skip the language tag line, if any
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        let end = body.find("```")?;
        let block = &body[..end];
        rest = &body[end + 3..];
        Some(block)
    })
}

/// Find the first balanced JSON object embedded in free text and parse it.
///
/// Used by the classifier, whose model replies are asked to contain a JSON
/// verdict but often come wrapped in prose.
pub fn first_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&text[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_an_answer() {
        match parse("The capital of France is Paris.") {
            Parsed::Answer { answer, thinking } => {
                assert_eq!(answer, "The capital of France is Paris.");
                assert!(thinking.is_none());
            }
            _ => panic!("expected answer"),
        }
    }

    #[test]
    fn bare_json_object_is_a_tool_call() {
        match parse(r#"{"tool": "calculator", "arguments": {"expression": "2+2"}}"#) {
            Parsed::ToolCall(call) => {
                assert_eq!(call.tool, "calculator");
                assert_eq!(call.arguments["expression"], "2+2");
                assert!(!call.call_id.is_empty());
            }
            _ => panic!("expected tool call"),
        }
    }

    #[test]
    fn fenced_tool_call_recognized() {
        let raw = "Let me check.\n```json\n{\"tool\": \"current_time\"}\n```";
        match parse(raw) {
            Parsed::ToolCall(call) => {
                assert_eq!(call.tool, "current_time");
                assert_eq!(call.arguments, serde_json::json!({}));
            }
            _ => panic!("expected tool call"),
        }
    }

    #[test]
    fn two_fenced_calls_is_ambiguous() {
        let raw = "```json\n{\"tool\": \"a\"}\n```\nand\n```json\n{\"tool\": \"b\"}\n```";
        assert!(matches!(parse(raw), Parsed::Answer { .. }));
    }

    #[test]
    fn malformed_json_degrades_to_answer() {
        let raw = r#"{"tool": "calculator", "arguments": "#;
        match parse(raw) {
            Parsed::Answer { answer, .. } => assert_eq!(answer, raw.trim()),
            _ => panic!("expected answer"),
        }
    }

    #[test]
    fn non_object_arguments_degrades_to_answer() {
        let raw = r#"{"tool": "calculator", "arguments": "2+2"}"#;
        assert!(matches!(parse(raw), Parsed::Answer { .. }));
    }

    #[test]
    fn json_without_tool_key_is_an_answer() {
        let raw = r#"{"result": 42}"#;
        assert!(matches!(parse(raw), Parsed::Answer { .. }));
    }

    #[test]
    fn thinking_block_extracted() {
        let raw = "<thinking>They want math done.</thinking>The answer is 4.";
        match parse(raw) {
            Parsed::Answer { answer, thinking } => {
                assert_eq!(answer, "The answer is 4.");
                assert_eq!(thinking.as_deref(), Some("They want math done."));
            }
            _ => panic!("expected answer"),
        }
    }

    #[test]
    fn thinking_then_tool_call() {
        let raw = "<thinking>Need the clock.</thinking>{\"tool\": \"current_time\"}";
        assert!(matches!(parse(raw), Parsed::ToolCall(_)));
    }

    #[test]
    fn unterminated_thinking_left_alone() {
        let raw = "<thinking>never closed";
        match parse(raw) {
            Parsed::Answer { answer, thinking } => {
                assert_eq!(answer, raw);
                assert!(thinking.is_none());
            }
            _ => panic!("expected answer"),
        }
    }

    #[test]
    fn first_json_object_in_prose() {
        let text = r#"Sure — here's my verdict: {"kind": "task", "acknowledgment": "On it!"} hope that helps"#;
        let value = first_json_object(text).unwrap();
        assert_eq!(value["kind"], "task");
    }

    #[test]
    fn first_json_object_handles_nested_braces_and_strings() {
        let text = r#"{"a": {"b": "contains } brace"}, "c": 1}"#;
        let value = first_json_object(text).unwrap();
        assert_eq!(value["c"], 1);
    }

    #[test]
    fn first_json_object_none_when_absent() {
        assert!(first_json_object("no json here").is_none());
    }
}
