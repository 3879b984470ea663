/* -----------------------------
 * Table conversion
 * ----------------------------- */

// NOTE: this covers the flat "wikitable" shape only: one cell per line (or
// several joined with `!!` / `||`), single-line cell content, no nesting.
// Lines inside a table that are not cell or row markers are skipped.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Mode {
    Header,
    #[default]
    Data,
}

#[derive(Debug, Default)]
struct TableBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    current_row: Vec<String>,
    mode: Mode,
}

impl TableBuilder {
    fn flush_row(&mut self) {
        if self.current_row.is_empty() {
            return;
        }
        let row = std::mem::take(&mut self.current_row);
        match self.mode {
            Mode::Header => self.header.extend(row),
            Mode::Data => self.rows.push(row),
        }
    }

    /// Feeds one trimmed line from inside the table body.
    fn push_line(&mut self, trimmed: &str) {
        // captions and blank lines carry nothing we render.
        if trimmed.is_empty() || trimmed.starts_with("|+") {
            return;
        }

        if let Some(cells) = trimmed.strip_prefix('!') {
            // header cells finish a pending data row.
            if self.mode == Mode::Data {
                self.flush_row();
            }
            self.mode = Mode::Header;
            self.current_row.extend(split_multi_cells(cells, "!!"));
            return;
        }

        if trimmed.starts_with("|-") {
            self.flush_row();
            self.mode = Mode::Data;
            return;
        }

        if let Some(cells) = trimmed.strip_prefix('|') {
            if self.mode == Mode::Header {
                self.flush_row();
                self.mode = Mode::Data;
            }
            self.current_row.extend(split_multi_cells(cells, "||"));
        }

        // anything else is table/row attribute text.
    }

    fn finish(mut self) -> Vec<String> {
        self.flush_row();
        render_markdown_table(self.header, self.rows)
    }
}

fn split_multi_cells(cell_line: &str, sep: &str) -> Vec<String> {
    cell_line
        .split(sep)
        .map(|part| cell_content(part).to_string())
        .collect()
}

fn cell_content(segment: &str) -> &str {
    // MediaWiki cell syntax:
    //   | attr1 attr2 | content
    // only treat the first unquoted '|' as a separator when the left side looks
    // like attributes, so link markup such as `[[Page|Label]]` stays intact.
    if let Some((left, right)) = split_once_unquoted(segment, '|')
        && left.contains('=')
        && !left.contains('[')
        && !left.contains('{')
    {
        return right.trim();
    }
    segment.trim()
}

fn split_once_unquoted(s: &str, needle: char) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => {
                let (a, b) = s.split_at(i);
                let b = &b[needle.len_utf8()..];
                return Some((a, b));
            }
            _ => {}
        }
    }
    None
}

/// Renders a header and data rows as Markdown table lines.
///
/// Without a header the first data row is promoted, and its width sets the
/// column count. Every other row is padded with empty cells or truncated to
/// that width. Returns no lines when there is nothing to render.
pub fn render_markdown_table(mut header: Vec<String>, mut rows: Vec<Vec<String>>) -> Vec<String> {
    if header.is_empty() {
        if rows.is_empty() {
            return Vec::new();
        }
        header = rows.remove(0);
    }

    let col_count = header.len();
    if col_count == 0 {
        return Vec::new();
    }

    for row in rows.iter_mut() {
        row.resize(col_count, String::new());
    }

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(render_markdown_row(&header));
    out.push(render_markdown_row(&vec!["---"; col_count]));
    for row in &rows {
        out.push(render_markdown_row(row));
    }
    out
}

fn render_markdown_row<S: AsRef<str>>(row: &[S]) -> String {
    let cells: Vec<&str> = row.iter().map(AsRef::as_ref).collect();
    format!("| {} |", cells.join(" | "))
}

/// Replaces each `{| ... |}` block with a Markdown table.
pub fn convert_tables(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut table: Option<TableBuilder> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        match table.as_mut() {
            None if trimmed.starts_with("{|") => table = Some(TableBuilder::default()),
            None => out.push(line.to_string()),
            Some(builder) if trimmed.starts_with("|}") => {
                out.extend(std::mem::take(builder).finish());
                table = None;
            }
            Some(builder) => builder.push_line(trimmed),
        }
    }

    // unclosed table: render what we have.
    if let Some(builder) = table.take() {
        out.extend(builder.finish());
    }

    super::join_lines(&out, text.ends_with('\n'))
}
