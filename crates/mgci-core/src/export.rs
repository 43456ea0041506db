//! Write report tables to a multi-sheet `.xlsx` workbook.

use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use tracing::info;

use crate::error::{Error, Result};
use crate::report::{Cell, ReportTable};

/// Extra characters added to the widest value of each column.
const WIDTH_PADDING: usize = 4;

/// Width of every column: widest rendered header or value, plus padding.
pub fn column_widths(table: &ReportTable) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let widest = table
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.to_string().chars().count())
                .max()
                .unwrap_or(0);
            widest.max(header.chars().count()) + WIDTH_PADDING
        })
        .collect()
}

fn is_observation_column(header: &str) -> bool {
    header.contains("OBS")
}

/// Write `tables` to `destination`, one sheet each, replacing any existing file.
pub fn export(tables: &[ReportTable], destination: &Path) -> Result<()> {
    write_workbook(tables, destination).map_err(|source| Error::Export {
        path: destination.to_path_buf(),
        source,
    })?;
    info!(path = %destination.display(), sheets = tables.len(), "report exported");
    Ok(())
}

fn write_workbook(tables: &[ReportTable], destination: &Path) -> std::result::Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let right = Format::new().set_align(FormatAlign::Right);
    let plain = Format::new();

    for table in tables {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&table.name)?;

        for (col, (header, width)) in table.columns.iter().zip(column_widths(table)).enumerate() {
            let col = col as u16;
            let format = if is_observation_column(header) { &right } else { &plain };
            sheet.write_string_with_format(0, col, header, format)?;
            sheet.set_column_width(col, width as f64)?;

            for (r, row) in table.rows.iter().enumerate() {
                let r = r as u32 + 1;
                match row.get(col as usize) {
                    Some(Cell::Int(v)) => sheet.write_number_with_format(r, col, *v as f64, format)?,
                    Some(Cell::Number(v)) => sheet.write_number_with_format(r, col, *v, format)?,
                    Some(Cell::Text(s)) => sheet.write_string_with_format(r, col, s, format)?,
                    None => continue,
                };
            }
        }
    }

    workbook.save(destination)
}
