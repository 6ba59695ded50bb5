//! Minimal reader for the comma-separated postal code files.
//!
//! Handles a header row, optional double-quote wrapping (with `""` as an
//! escaped quote), a leading UTF-8 BOM and CRLF line endings. Fields never
//! span lines in the datasets we load.

/// A parsed CSV file: header names plus data rows.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Parse file contents. The first non-empty line is the header.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let mut lines = contents
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let headers = lines
            .next()
            .map(|line| {
                split_record(line)
                    .into_iter()
                    .map(|h| h.trim().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = lines.map(split_record).collect();

        Self { headers, rows }
    }

    /// Index of a header column (exact, after trimming).
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Data rows in file order.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Split one line into fields.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}
