//! Literal blocks: extraction and escape normalization
//!
//! A literal is written between braces, `{...}`. The block may contain the DSL's
//! own meta-characters as long as they sit inside a character class, and balanced
//! braces (regex counted repetition such as `[0-9]{2}`):
//!
//! ```text
//! {[{}|]}          a class holding '{', '}' and '|'
//! {[0-9]{2}}       two digits
//! {\}}             a lone closing brace
//! ```
//!
//! An unescaped `{` outside a class opens a nested pair, so `{a{b}` is unclosed
//! and a lone opening brace has to be written `\{`.
//!
//! The extracted text is then normalized into a regex fragment by
//! [`normalize_literal`].

/// Scan a `{...}` block at the start of `text`.
///
/// Returns the raw inner text and the byte offset just past the closing brace,
/// or `None` if `text` does not start with `{` or the block is never closed.
/// A `}` only closes the block when it is unescaped, outside any `[...]` class,
/// and not balancing an inner `{`.
pub(crate) fn scan_block(text: &str) -> Option<(&str, usize)> {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, '{')) => {}
        _ => return None,
    }

    let mut escaped = false;
    let mut in_class = false;
    let mut depth = 0usize;
    for (i, c) in chars {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => in_class = true,
            ']' => in_class = false,
            '{' if !in_class => depth += 1,
            '}' if !in_class => {
                if depth == 0 {
                    return Some((&text[1..i], i + 1));
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Turn the raw text of a literal block into a safe regex fragment.
///
/// Single left-to-right pass tracking whether the previous character was an
/// unconsumed backslash and whether we are inside a `[...]` class.
///
/// Outside a class:
/// - `\[`, `\]` stay escaped brackets, a stray `]` gets escaped
/// - `\n`, `\t` stay newline/tab escapes
/// - `\uXXXX` (exactly four hex digits) passes through; any other `\u` becomes a
///   literal backslash followed by `u`
/// - every other escape passes through unchanged
///
/// Inside a class:
/// - `\\`, `\[`, `\]`, `\^`, `\n`, `\t`, a nested `[` and a non-leading `^`
///   become `\uXXXX` escapes
/// - a leading `^` keeps its negation meaning, `-` keeps its range meaning
/// - `\uXXXX` passes through
///
/// A trailing lone backslash becomes an escaped backslash.
pub(crate) fn normalize_literal(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut escaped = false;
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if escaped {
            escaped = false;
            match c {
                'u' => {
                    if let Some(hex) = four_hex_digits(&chars[i + 1..]) {
                        out.push_str("\\u");
                        out.push_str(&hex);
                        i += 5;
                        continue;
                    }
                    if in_class {
                        push_code_point(&mut out, '\\');
                        out.push('u');
                    } else {
                        out.push_str("\\\\u");
                    }
                }
                'n' if in_class => push_code_point(&mut out, '\n'),
                't' if in_class => push_code_point(&mut out, '\t'),
                '\\' | '[' | ']' | '^' if in_class => push_code_point(&mut out, c),
                _ => {
                    out.push('\\');
                    out.push(c);
                }
            }
            i += 1;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '[' if in_class => push_code_point(&mut out, '['),
            '[' => {
                in_class = true;
                out.push('[');
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            ']' => out.push_str("\\]"),
            '^' if in_class => push_code_point(&mut out, '^'),
            _ => out.push(c),
        }
        i += 1;
    }

    if escaped {
        out.push_str("\\\\");
    }
    out
}

fn four_hex_digits(chars: &[char]) -> Option<String> {
    let digits = chars.get(..4)?;
    if digits.iter().all(char::is_ascii_hexdigit) {
        Some(digits.iter().collect())
    } else {
        None
    }
}

fn push_code_point(out: &mut String, c: char) {
    out.push_str(&format!("\\u{:04X}", c as u32));
}
