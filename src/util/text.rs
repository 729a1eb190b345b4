use std::borrow::Cow;

/// Collapses every run of Unicode whitespace into a single ASCII space and
/// trims both ends.
///
/// Feed documents indent their text content freely and HTML fragments
/// break lines mid-sentence, so extracted text is normalized before it
/// reaches a [`Feed`](crate::feed::Feed).
///
/// Returns `Cow::Borrowed` when the input is already normalized.
///
/// # Examples
///
/// ```
/// use rss_extractor::util::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("Hello World"), "Hello World");
/// assert_eq!(collapse_whitespace("\n  Hello\n\n  World \t"), "Hello World");
/// assert_eq!(collapse_whitespace("   "), "");
/// ```
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();

    // Fast path: no leading/trailing whitespace and no run other than a single ' '
    let mut prev_space = false;
    let already_clean = trimmed.len() == s.len()
        && trimmed.chars().all(|c| {
            let ok = if c.is_whitespace() {
                c == ' ' && !prev_space
            } else {
                true
            };
            prev_space = c.is_whitespace();
            ok
        });
    if already_clean {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(trimmed.len());
    for word in trimmed.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences from text.
///
/// Feed titles and descriptions are attacker-controlled and end up printed
/// by the CLI, so escape sequences are removed before text is stored.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (terminal byte 0x40-0x7E)
/// - ANSI OSC sequences: `\x1b]` ... (until BEL 0x07 or ST `\x1b\\`)
/// - Bare ESC (0x1b) not followed by `[` or `]`
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    if !bytes.iter().any(|&b| is_stripped_byte(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == 0x1b {
            match bytes.get(i + 1) {
                Some(b'[') => {
                    // CSI: skip parameter/intermediate bytes through the final byte
                    i += 2;
                    while i < len {
                        let c = bytes[i];
                        i += 1;
                        if (0x40..=0x7e).contains(&c) {
                            break;
                        }
                    }
                }
                Some(b']') => {
                    // OSC: skip until BEL or ST
                    i += 2;
                    while i < len {
                        if bytes[i] == 0x07 {
                            i += 1;
                            break;
                        }
                        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        } else if is_stripped_byte(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && !is_stripped_byte(bytes[i]) {
                i += 1;
            }
            // SAFETY: we only break on ASCII control bytes, which cannot appear
            // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

fn is_stripped_byte(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d)
}
