//! §4.4 table renderer (C5): serializes an [`ExtractedTable`]'s cell grid to
//! plain text, markdown, or HTML.

use crate::model::{CellKind, ExtractedTable, TableCell};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRenderMode {
    Plain,
    Markdown,
    Html,
}

/// Build a `row_count × col_count` grid of cell contents, placing each
/// cell's content at its top-left coordinate and leaving spanned-over slots
/// empty (best-effort; span information is not repeated into covered cells).
fn build_grid(table: &ExtractedTable) -> Vec<Vec<&str>> {
    let mut grid = vec![vec![""; table.col_count]; table.row_count];
    for cell in &table.cells {
        if cell.row < table.row_count && cell.col < table.col_count {
            grid[cell.row][cell.col] = cell.content.as_str();
        }
    }
    grid
}

fn is_header(cell: &TableCell) -> bool {
    matches!(cell.kind, CellKind::ColumnHeader | CellKind::RowHeader)
}

fn render_plain(table: &ExtractedTable) -> String {
    let grid = build_grid(table);
    if grid.is_empty() {
        return String::new();
    }
    let col_widths: Vec<usize> = (0..table.col_count)
        .map(|c| {
            grid.iter()
                .map(|row| row[c].len())
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect();

    let separator = |out: &mut String| {
        out.push('+');
        for w in &col_widths {
            let _ = write!(out, "{}+", "-".repeat(w + 2));
        }
        out.push('\n');
    };

    let mut out = String::new();
    separator(&mut out);
    for (r, row) in grid.iter().enumerate() {
        out.push('|');
        for (c, cell) in row.iter().enumerate() {
            let _ = write!(out, " {:<width$} |", cell, width = col_widths[c]);
        }
        out.push('\n');
        if r == 0 {
            separator(&mut out);
        }
    }
    separator(&mut out);
    out.pop();
    out
}

fn render_markdown(table: &ExtractedTable) -> String {
    let grid = build_grid(table);
    if grid.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    let row_line = |row: &[&str], out: &mut String| {
        out.push('|');
        for cell in row {
            let _ = write!(out, " {} |", cell.replace('|', "\\|"));
        }
        out.push('\n');
    };
    row_line(&grid[0], &mut out);
    out.push('|');
    for _ in 0..table.col_count {
        out.push_str(" --- |");
    }
    out.push('\n');
    for row in grid.iter().skip(1) {
        row_line(row, &mut out);
    }
    out.pop();
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_html(table: &ExtractedTable) -> String {
    let mut rows: Vec<Vec<&TableCell>> = vec![Vec::new(); table.row_count];
    for cell in &table.cells {
        if cell.row < table.row_count {
            rows[cell.row].push(cell);
        }
    }
    for row in &mut rows {
        row.sort_by_key(|c| c.col);
    }

    let mut out = String::from("<table>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let tag = if is_header(cell) { "th" } else { "td" };
            let mut attrs = String::new();
            if cell.col_span > 1 {
                let _ = write!(attrs, " colSpan=\"{}\"", cell.col_span);
            }
            if cell.row_span > 1 {
                let _ = write!(attrs, " rowSpan=\"{}\"", cell.row_span);
            }
            let _ = write!(out, "<{tag}{attrs}>{}</{tag}>", escape_html(&cell.content));
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    out
}

/// Render `table` in the requested mode, prepending the caption (if present)
/// separated by a blank line.
pub fn render_table(table: &ExtractedTable, mode: TableRenderMode) -> String {
    let body = match mode {
        TableRenderMode::Plain => render_plain(table),
        TableRenderMode::Markdown => render_markdown(table),
        TableRenderMode::Html => render_html(table),
    };
    match table.caption.as_deref() {
        Some(caption) if !caption.is_empty() => format!("{caption}\n\n{body}"),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ExtractedTable {
        ExtractedTable {
            table_id: "table_0".into(),
            source_index: 0,
            pages: vec![0],
            cells: vec![
                TableCell { row: 0, col: 0, row_span: 1, col_span: 1, content: "Name".into(), kind: CellKind::ColumnHeader },
                TableCell { row: 0, col: 1, row_span: 1, col_span: 1, content: "Score".into(), kind: CellKind::ColumnHeader },
                TableCell { row: 1, col: 0, row_span: 1, col_span: 1, content: "Alice".into(), kind: CellKind::Content },
                TableCell { row: 1, col: 1, row_span: 1, col_span: 1, content: "92".into(), kind: CellKind::Content },
            ],
            row_count: 2,
            col_count: 2,
            bbox: None,
            caption: None,
            rendered_text: None,
            summary: None,
        }
    }

    #[test]
    fn markdown_has_header_separator() {
        let rendered = render_table(&sample_table(), TableRenderMode::Markdown);
        assert!(rendered.contains("| Name | Score |"));
        assert!(rendered.contains("| --- | --- |"));
        assert!(rendered.contains("| Alice | 92 |"));
    }

    #[test]
    fn html_marks_header_cells_as_th() {
        let rendered = render_table(&sample_table(), TableRenderMode::Html);
        assert!(rendered.contains("<th>Name</th>"));
        assert!(rendered.contains("<td>Alice</td>"));
    }

    #[test]
    fn plain_pads_columns_to_floor_of_three() {
        let rendered = render_table(&sample_table(), TableRenderMode::Plain);
        assert!(rendered.starts_with("+---"));
        assert!(rendered.contains("| Alice |"));
    }

    #[test]
    fn caption_prepended_with_blank_line() {
        let mut table = sample_table();
        table.caption = Some("Table 1: Scores".into());
        let rendered = render_table(&table, TableRenderMode::Markdown);
        assert!(rendered.starts_with("Table 1: Scores\n\n"));
    }
}
