//! Plain-text tables for uniform rows.
//!
//! ```text
//! Priority   Sum
//! #################
//! Critical   3
//! High       2
//! ```
//!
//! Columns are left-aligned and padded by [`COLUMN_PADDING`]. A column is as
//! wide as its widest cell or header, capped at [`MAX_COLUMN_WIDTH`]; longer
//! cells are truncated.

/// Widest a column may get, in characters.
pub const MAX_COLUMN_WIDTH: usize = 60;

/// Spaces added after every column's content width.
pub const COLUMN_PADDING: usize = 2;

/// A value that renders as one table row.
pub trait TableRow {
  /// Column headers, in column order.
  fn headers() -> &'static [&'static str];

  /// Cell texts, one per header.
  fn cells(&self) -> Vec<String>;
}

/// Renders `rows` as a table. An empty slice renders the header and rule only.
pub fn render<T: TableRow>(rows: &[T]) -> String {
  let headers = T::headers();
  let cells: Vec<Vec<String>> = rows.iter().map(TableRow::cells).collect();

  let widths: Vec<usize> = headers
    .iter()
    .enumerate()
    .map(|(column, header)| {
      cells
        .iter()
        .filter_map(|row| row.get(column))
        .map(|cell| cell.chars().count())
        .fold(header.chars().count(), usize::max)
        .min(MAX_COLUMN_WIDTH)
    })
    .collect();

  let mut out = String::new();
  push_row(&mut out, &widths, headers.iter().copied());
  let rule: usize = widths.iter().map(|width| width + 1 + COLUMN_PADDING).sum();
  out.push_str(&"#".repeat(rule));
  out.push('\n');
  for row in &cells {
    push_row(&mut out, &widths, row.iter().map(String::as_str));
  }
  out
}

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
  for (width, cell) in widths.iter().zip(cells) {
    let cell: String = cell.chars().take(MAX_COLUMN_WIDTH).collect();
    out.push_str(&format!("{:<pad$} ", cell, pad = width + COLUMN_PADDING));
  }
  out.push('\n');
}
