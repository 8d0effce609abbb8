//! Titled tables for `gmo info`

use prettytable::{Cell, Row, Table, format};

/// Horizontal alignment of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

impl Align {
    fn spec(self) -> &'static str {
        match self {
            Align::Left => "l",
            Align::Right => "r",
        }
    }
}

/// A table printed under a `=== Title ===` heading
pub struct SectionTable {
    title: &'static str,
    aligns: Vec<Align>,
    table: Table,
}

impl SectionTable {
    pub fn new(title: &'static str, columns: &[(&str, Align)]) -> Self {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(Row::new(
            columns
                .iter()
                .map(|(name, align)| Cell::new(name).style_spec(&format!("b{}", align.spec())))
                .collect(),
        ));
        Self {
            title,
            aligns: columns.iter().map(|&(_, align)| align).collect(),
            table,
        }
    }

    /// Append a row; cells beyond the declared columns are left aligned
    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let cells = cells
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let align = self.aligns.get(i).copied().unwrap_or(Align::Left);
                Cell::new(&value.to_string()).style_spec(align.spec())
            })
            .collect();
        self.table.add_row(Row::new(cells));
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Heading and table, or nothing when no rows were added
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("\n=== {} ===\n{}", self.title, self.table)
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
