const MAX_STEM_CHARS: usize = 120;

/// Makes a user-supplied output name safe to use as a Windows file stem.
///
/// Forbidden characters become `_`, runs of `_` collapse, surrounding dots and
/// spaces are trimmed and reserved device names get a trailing `_`. Returns
/// `None` when nothing usable is left.
pub fn sanitize_file_stem(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    if cleaned.is_empty() {
        return None;
    }

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    if let Some((idx, _)) = compacted.char_indices().nth(MAX_STEM_CHARS) {
        compacted.truncate(idx);
        let kept = compacted.trim_end_matches(&['_', ' ', '.'][..]).len();
        compacted.truncate(kept);
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    Some(compacted)
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
