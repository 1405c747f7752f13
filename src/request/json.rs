//! JSON body text handling

/// Remove `//` line comments and `/* */` block comments outside string
/// literals. Everything else, placeholders included, is kept verbatim.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_and_block_comments() {
        let input = "{\n  // who\n  \"name\": \"x\", /* inline */ \"n\": 1\n}";
        let stripped = strip_comments(input);
        let parsed: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(parsed, serde_json::json!({"name": "x", "n": 1}));
    }

    #[test]
    fn test_comment_markers_inside_strings_kept() {
        let input = r#"{"url": "http://host/a", "note": "a /* b */ \" // c"}"#;
        assert_eq!(strip_comments(input), input);
    }

    #[test]
    fn test_placeholders_untouched() {
        let input = "{\"id\": {{id}} // numeric\n}";
        assert_eq!(strip_comments(input), "{\"id\": {{id}} \n}");
    }
}
