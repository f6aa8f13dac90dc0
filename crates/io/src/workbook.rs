// Workbook reading via calamine (xlsx, xlsm, xlsb, xls, ods)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use cellcast_core::CellValue;

use crate::loader::Rows;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read one sheet. Positions are absolute: a used range starting at C4
/// comes back with three blank rows and columns in front of it.
pub fn read_sheet(path: &Path, sheet: &str) -> Result<Rows, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| format!("Failed to open workbook: {}", e))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(format!("Sheet '{}' not found", sheet));
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet, e))?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let (start_row, start_col) = (start_row as usize, start_col as usize);

    let mut rows: Rows = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut values = Vec::with_capacity(start_col + row.len());
        values.resize(start_col, CellValue::empty());
        values.extend(row.iter().map(convert));
        rows.push(values);
    }
    Ok(rows)
}

fn convert(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::empty(),
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Int(n) => CellValue::Int(*n),
        Data::Float(n) => CellValue::from_float(*n),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::text(e.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) => CellValue::text(dt.format(DATETIME_FORMAT).to_string()),
            None => CellValue::from_float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}
