//! Leading `*` / `#` list markers -> Markdown list items.
//!
//! Each line is rewritten on its own; nesting depth comes only from the number
//! of leading markers. Ordered items always use the literal `1.` and rely on
//! the Markdown renderer for numbering.

fn marker_run(line: &str, marker: char) -> usize {
    line.chars().take_while(|&c| c == marker).count()
}

fn list_item(line: &str, marker: char, bullet: &str) -> String {
    let depth = marker_run(line, marker);
    // marker chars are ASCII, so depth is also the byte offset.
    let content = line[depth..].trim();
    format!("{}{}{}", "  ".repeat(depth - 1), bullet, content)
}

fn convert_line(line: &str) -> String {
    // already a Markdown heading, leave it for what comes after.
    if line.starts_with("# ") {
        return line.to_string();
    }

    if line.starts_with('*') {
        list_item(line, '*', "- ")
    } else if line.starts_with('#') {
        list_item(line, '#', "1. ")
    } else {
        line.to_string()
    }
}

pub fn convert_lists(text: &str) -> String {
    let out: Vec<String> = text.lines().map(convert_line).collect();
    super::join_lines(&out, text.ends_with('\n'))
}
