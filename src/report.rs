//! Console reports: a separator line followed by a JSON rendering.

use std::io::Write;

use serde::Serialize;

/// Line printed before each report.
pub const SEPARATOR: &str = "---";

/// JSON layout of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Style {
    #[default]
    Pretty,
    Compact,
}

/// Write `value` as one report section.
pub fn write_section<W, T>(out: &mut W, value: &T, style: Style) -> std::io::Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    writeln!(out, "{}", SEPARATOR)?;
    match style {
        Style::Pretty => serde_json::to_writer_pretty(&mut *out, value)?,
        Style::Compact => serde_json::to_writer(&mut *out, value)?,
    }
    writeln!(out)?;
    out.flush()
}
