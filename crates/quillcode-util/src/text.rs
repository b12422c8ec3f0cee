//! Text helpers.

/// Truncate command/tool output to a maximum length, keeping the head and
/// tail and marking the elision.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_string();
    }

    // Keep 60% head, 40% tail. Split on char boundaries.
    let head_len = max_chars * 6 / 10;
    let tail_len = max_chars - head_len;

    let head_end = floor_char_boundary(output, head_len);
    let tail_start = ceil_char_boundary(output, output.len() - tail_len);

    let omitted = output[head_end..tail_start].lines().count();
    format!(
        "{}\n... [{} lines omitted] ...\n{}",
        &output[..head_end],
        omitted,
        &output[tail_start..]
    )
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
