use std::io::{self, Write};

use serde::Serialize;

use crate::{
    config::{Column, RowSet},
    preferences::{DisplayPreferences, DivisionMode},
    timing::{format_value, DurationTable},
};

pub const COLUMN_WIDTH: usize = 15;

/// One formatted line of the timing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingRow {
    pub note: &'static str,
    pub cells: Vec<String>,
}

/// Everything a front-end needs to show the timing table for one tempo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingReport {
    pub bpm: f64,
    pub round_outputs: bool,
    pub division_mode: DivisionMode,
    pub columns: Vec<&'static str>,
    pub rows: Vec<TimingRow>,
}

impl TimingReport {
    /// Format `table` under the current preferences.
    ///
    /// The division mode scales the whole table first; each column's
    /// multiplier is then applied per cell.
    pub fn build(
        table: &DurationTable,
        prefs: &DisplayPreferences,
        rows: RowSet,
        columns: &[Column],
    ) -> Self {
        let scaled = table.scaled(prefs.division_mode.divisor());

        let rows = rows
            .notes()
            .iter()
            .map(|&note| {
                let ms = scaled.get(note);
                TimingRow {
                    note: note.label(),
                    cells: columns
                        .iter()
                        .map(|column| format_value(column.apply(ms), prefs.round_outputs))
                        .collect(),
                }
            })
            .collect();

        Self {
            bpm: table.bpm,
            round_outputs: prefs.round_outputs,
            division_mode: prefs.division_mode,
            columns: columns.iter().map(|column| column.header()).collect(),
            rows,
        }
    }

    pub fn header_line(&self) -> String {
        let mut line = pad("Note");
        for header in &self.columns {
            line.push_str(&pad(header));
        }
        line.trim_end().to_string()
    }

    pub fn row_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.rows.iter().map(|row| {
            let mut line = pad(row.note);
            for cell in &row.cells {
                line.push_str(&pad(cell));
            }
            line.trim_end().to_string()
        })
    }

    /// Plain aligned text, one row per line.
    pub fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "BPM: {}", self.bpm)?;
        if self.division_mode != DivisionMode::None {
            writeln!(out, "Division: {}", self.division_mode)?;
        }
        writeln!(out)?;
        writeln!(out, "{}", self.header_line())?;
        for line in self.row_lines() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

// `{:<width$}` pads by char count, which keeps "μs" cells aligned.
fn pad(text: &str) -> String {
    format!("{text:<COLUMN_WIDTH$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(prefs: DisplayPreferences, rows: RowSet, columns: &[Column]) -> TimingReport {
        let table = DurationTable::compute(120.0).unwrap();
        TimingReport::build(&table, &prefs, rows, columns)
    }

    #[test]
    fn standard_rows_at_120_bpm() {
        let report = report(DisplayPreferences::default(), RowSet::Standard, &[Column::Time]);

        let notes: Vec<&str> = report.rows.iter().map(|row| row.note).collect();
        assert_eq!(notes, ["1", "1/2", "1/4", "1/8", "1/16", "1/32", "1/64", "1/128"]);

        let cells: Vec<&str> = report.rows.iter().map(|row| row.cells[0].as_str()).collect();
        assert_eq!(
            cells,
            ["2.0 s", "1.0 s", "500 ms", "250 ms", "125 ms", "63 ms", "31 ms", "16 ms"]
        );
    }

    #[test]
    fn extended_rows_reach_1024th() {
        let report = report(DisplayPreferences::default(), RowSet::Extended, &[Column::Time]);
        assert_eq!(report.rows.len(), 11);
        assert_eq!(report.rows[10].note, "1/1024");
        assert_eq!(report.rows[10].cells[0], "2 ms");
    }

    #[test]
    fn division_mode_scales_every_row() {
        let prefs = DisplayPreferences {
            division_mode: DivisionMode::Divide1000,
            ..DisplayPreferences::default()
        };
        let report = report(prefs, RowSet::Standard, &[Column::Time]);

        assert_eq!(report.rows[0].cells[0], "2 ms");
        // 0.5 ms rounds half away from zero into the millisecond bucket
        assert_eq!(report.rows[2].cells[0], "1 ms");
        assert_eq!(report.rows[3].cells[0], "250 μs");
    }

    #[test]
    fn unrounded_cells_have_three_decimals() {
        let prefs = DisplayPreferences {
            round_outputs: false,
            ..DisplayPreferences::default()
        };
        let report = report(prefs, RowSet::Standard, &[Column::Time, Column::Tenth]);

        assert_eq!(report.columns, ["Time", "1/10th"]);
        assert_eq!(report.rows[2].cells, ["500.000 ms", "50.000 ms"]);
        assert_eq!(report.rows[5].cells, ["62.500 ms", "6.250 ms"]);
    }

    #[test]
    fn writes_aligned_text() {
        let report = report(DisplayPreferences::default(), RowSet::Standard, &[Column::Time]);
        let mut out = Vec::new();
        report.write_text(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "BPM: 120");
        assert_eq!(lines[2], "Note           Time");
        assert_eq!(lines[5], "1/4            500 ms");
    }

    #[test]
    fn serializes_to_json() {
        let report = report(DisplayPreferences::default(), RowSet::Standard, &[Column::Time]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["bpm"], 120.0);
        assert_eq!(json["division_mode"], "none");
        assert_eq!(json["rows"][2]["note"], "1/4");
        assert_eq!(json["rows"][2]["cells"][0], "500 ms");
    }
}
