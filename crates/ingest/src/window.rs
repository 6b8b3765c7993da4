//! Fixed-size overlapping line windows.

use repolens_core::Chunk;

/// Half-open `(start, end)` line ranges (0-based) covering `line_count` lines.
///
/// Consecutive windows share `overlap` lines. Windowing stops at the first
/// window that reaches the last line, so the final window may be shorter.
pub fn line_windows(line_count: usize, window: usize, overlap: usize) -> Vec<(usize, usize)> {
    if line_count == 0 || window == 0 {
        return Vec::new();
    }
    let step = window.saturating_sub(overlap).max(1);

    let mut ranges = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(line_count);
        ranges.push((start, end));
        if end >= line_count {
            break;
        }
        start += step;
    }
    ranges
}

/// Split text into lines, dropping the empty tail a trailing newline leaves.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// Window `text` into generic chunks.
///
/// `line_offset` shifts the reported 1-based spans, so sub-chunks of a
/// construct keep file-relative line numbers. Blank windows are skipped.
pub fn window_chunks(
    file_path: &str,
    text: &str,
    language: &str,
    window: usize,
    overlap: usize,
    line_offset: usize,
) -> Vec<Chunk> {
    let lines = split_lines(text);
    line_windows(lines.len(), window, overlap)
        .into_iter()
        .filter_map(|(start, end)| {
            let content = lines[start..end].join("\n");
            if content.trim().is_empty() {
                return None;
            }
            Some(Chunk::window(
                file_path,
                content,
                line_offset + start + 1,
                line_offset + end,
                language,
            ))
        })
        .collect()
}
