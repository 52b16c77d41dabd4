fn byte_pos(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// Splits text into chunks of at most `max_len` characters, preferring line
/// breaks, then spaces.
pub(super) fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max_len {
        let boundary = byte_pos(remaining, max_len);
        let head = &remaining[..boundary];
        let split_at = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .map(|i| i + 1)
            .filter(|&i| i > 1)
            .unwrap_or(boundary);

        let chunk = remaining[..split_at].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = &remaining[split_at..];
    }

    if !remaining.trim().is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}
