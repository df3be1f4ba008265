//! In-memory workbook and its on-disk form.
//!
//! A workbook on disk is a directory with one UTF-8 CSV file per sheet,
//! named `<sheet>.csv`, header row first.

use std::fs;
use std::path::Path;

use crate::error::{ExchangeError, ExchangeResult};

const SHEET_EXTENSION: &str = "csv";

/// One named table of text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Position of a header, ignoring surrounding space and ASCII case.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(header.trim()))
    }

    /// Rows as keyed records. Line numbers are 1-based, header on line 1.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().enumerate().map(move |(i, cells)| Record {
            sheet: self,
            cells,
            line: i + 2,
        })
    }
}

/// One data row, addressed by header.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    sheet: &'a Sheet,
    cells: &'a [String],
    line: usize,
}

impl<'a> Record<'a> {
    /// Trimmed cell under `header`; empty when the column or cell is absent.
    pub fn get(&self, header: &str) -> &'a str {
        self.sheet
            .column(header)
            .and_then(|i| self.cells.get(i))
            .map(|c| c.trim())
            .unwrap_or("")
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// An ordered set of sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet, replacing any sheet of the same name.
    pub fn add_sheet(&mut self, sheet: Sheet) {
        match self.sheets.iter_mut().find(|s| s.name == sheet.name) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Names from `required` that this workbook lacks.
    pub fn missing_sheets(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.sheet(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// `sheet: header` for each `(sheet, header)` pair whose sheet exists but
    /// lacks the header. Absent sheets are reported by [`Self::missing_sheets`].
    pub fn missing_columns(&self, required: &[(&str, &str)]) -> Vec<String> {
        required
            .iter()
            .filter(|(sheet, header)| {
                self.sheet(sheet)
                    .is_some_and(|s| s.column(header).is_none())
            })
            .map(|(sheet, header)| format!("{sheet}: {header}"))
            .collect()
    }

    /// Read every `*.csv` file of `dir` as a sheet named after the file stem.
    pub fn read_dir(dir: &Path) -> ExchangeResult<Self> {
        if !dir.is_dir() {
            return Err(ExchangeError::Source {
                path: dir.to_path_buf(),
                reason: "not a workbook directory".to_string(),
            });
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ExchangeError::io(dir, e))? {
            let path = entry.map_err(|e| ExchangeError::io(dir, e))?.path();
            let is_sheet = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SHEET_EXTENSION));
            if path.is_file() && is_sheet {
                paths.push(path);
            }
        }
        paths.sort();

        let mut workbook = Self::new();
        for path in paths {
            workbook.add_sheet(read_sheet(&path)?);
        }
        tracing::debug!(
            path = %dir.display(),
            sheets = ?workbook.sheet_names().collect::<Vec<_>>(),
            "workbook read"
        );
        Ok(workbook)
    }

    /// Write every sheet into `dir`, creating it when needed.
    pub fn write_dir(&self, dir: &Path) -> ExchangeResult<()> {
        fs::create_dir_all(dir).map_err(|e| ExchangeError::io(dir, e))?;
        for sheet in &self.sheets {
            write_sheet(&dir.join(format!("{}.{SHEET_EXTENSION}", sheet.name)), sheet)?;
        }
        Ok(())
    }
}

fn read_sheet(path: &Path) -> ExchangeResult<Sheet> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExchangeError::csv(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExchangeError::csv(path, e))?
        .iter()
        .enumerate()
        // Spreadsheet tools prepend a byte-order mark to UTF-8 exports.
        .map(|(i, h)| if i == 0 { h.trim_start_matches('\u{feff}') } else { h })
        .map(str::to_string)
        .collect();

    let mut sheet = Sheet {
        name,
        headers,
        rows: Vec::new(),
    };
    for record in reader.records() {
        let record = record.map_err(|e| ExchangeError::csv(path, e))?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        sheet.push_row(cells);
    }
    Ok(sheet)
}

fn write_sheet(path: &Path, sheet: &Sheet) -> ExchangeResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExchangeError::csv(path, e))?;
    writer
        .write_record(&sheet.headers)
        .map_err(|e| ExchangeError::csv(path, e))?;
    for row in &sheet.rows {
        writer
            .write_record(row)
            .map_err(|e| ExchangeError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ExchangeError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_addressed_by_header() {
        let mut sheet = Sheet::new("Clientes", &["Nome", "Telefone"]);
        sheet.push_row(vec!["  Ana ".into(), "1234".into()]);
        sheet.push_row(vec!["Bia".into()]);

        let records: Vec<Record<'_>> = sheet.records().collect();
        assert_eq!(records[0].get("nome"), "Ana");
        assert_eq!(records[0].line(), 2);
        assert_eq!(records[1].get("Telefone"), "");
        assert_eq!(records[1].get("Email"), "");
    }

    #[test]
    fn directory_round_trip_keeps_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut workbook = Workbook::new();
        let mut sheet = Sheet::new("Produtos", &["Nome", "Preço de Custo"]);
        sheet.push_row(vec!["Sutiã, renda".into(), "12.5".into()]);
        workbook.add_sheet(sheet);
        workbook.add_sheet(Sheet::new("Clientes", &["Nome"]));

        workbook.write_dir(dir.path()).unwrap();
        let back = Workbook::read_dir(dir.path()).unwrap();

        let produtos = back.sheet("Produtos").unwrap();
        assert_eq!(produtos.rows(), &[vec!["Sutiã, renda".to_string(), "12.5".to_string()]]);
        assert!(back.sheet("Clientes").unwrap().is_empty());
    }

    #[test]
    fn byte_order_mark_and_blank_lines_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Clientes.csv"), "\u{feff}Nome,Email\nAna,a@x\n,\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let workbook = Workbook::read_dir(dir.path()).unwrap();

        let clientes = workbook.sheet("Clientes").unwrap();
        assert_eq!(clientes.column("Nome"), Some(0));
        assert_eq!(clientes.len(), 1);
        assert_eq!(workbook.sheet_names().count(), 1);
    }

    #[test]
    fn missing_directory_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workbook::read_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ExchangeError::Source { .. }));
    }

    #[test]
    fn missing_sheets_are_listed_in_order() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("Clientes", &["Nome"]));
        assert_eq!(
            workbook.missing_sheets(&["Produtos", "Clientes", "Pedidos"]),
            ["Produtos", "Pedidos"]
        );
    }

    #[test]
    fn missing_key_columns_ignore_case_and_absent_sheets() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("Produtos", &["Produto"]));
        workbook.add_sheet(Sheet::new("Clientes", &[" nome "]));
        assert_eq!(
            workbook.missing_columns(&[("Produtos", "Nome"), ("Clientes", "Nome"), ("Pedidos", "ID do Pedido")]),
            ["Produtos: Nome"]
        );
    }
}
