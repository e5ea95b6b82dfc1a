//! Lenient readers for model output.

/// Drops a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// The outermost `{...}` span, if any.
pub fn object_slice(text: &str) -> Option<&str> {
    let text = strip_code_fences(text);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Rewrites a Python dict literal (`{'a': 'b', 'c': None}`) as JSON.
///
/// Single-quoted strings become double-quoted, and `None`, `True` and
/// `False` outside strings become their JSON spellings. Text that is already
/// JSON passes through unchanged.
pub fn python_literal_to_json(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match quote {
            Some(delimiter) => match ch {
                '\\' => match chars.next() {
                    Some('\'') => output.push('\''),
                    Some(escaped) => {
                        output.push('\\');
                        output.push(escaped);
                    }
                    None => output.push('\\'),
                },
                '"' if delimiter == '\'' => output.push_str("\\\""),
                c if c == delimiter => {
                    output.push('"');
                    quote = None;
                }
                c => output.push(c),
            },
            None => match ch {
                '\'' | '"' => {
                    output.push('"');
                    quote = Some(ch);
                }
                c if c.is_ascii_alphabetic() => {
                    let mut word = String::from(c);
                    while let Some(next) = chars.peek().copied().filter(char::is_ascii_alphanumeric) {
                        word.push(next);
                        chars.next();
                    }
                    output.push_str(match word.as_str() {
                        "None" => "null",
                        "True" => "true",
                        "False" => "false",
                        other => other,
                    });
                }
                c => output.push(c),
            },
        }
    }

    output
}

/// Normalises a one-word answer: trims whitespace, quotes, backticks and a trailing period.
pub fn bare_answer(text: &str) -> &str {
    strip_code_fences(text).trim().trim_matches(|c: char| matches!(c, '\'' | '"' | '`' | '.')).trim()
}
