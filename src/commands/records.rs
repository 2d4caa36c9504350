use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Range, Reader, open_workbook_auto};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::model::{IdentityKey, PersonRecord, SkipReason};
use crate::report::Reporter;
use crate::util::{digits_only, file_name_string, list_files_sorted, title_case};

const COLUMN_FIRST_NAME: usize = 0;
const COLUMN_LAST_NAME: usize = 1;
const COLUMN_ZIP_CODE: usize = 8;
const COLUMN_TAX_ID: usize = 9;
const COLUMN_SOURCE_FILENAME: usize = 39;
const MIN_COLUMNS: usize = COLUMN_SOURCE_FILENAME + 1;

const RECORD_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<PersonRecord>,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_read: usize,
    pub rows_rejected: usize,
}

pub fn load_records(people_dir: &Path, reporter: &dyn Reporter) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    let files = match list_files_sorted(people_dir, &RECORD_EXTENSIONS) {
        Ok(files) => files,
        Err(err) => {
            warn!(
                people_dir = %people_dir.display(),
                error = %err,
                "record directory unreadable; no records loaded"
            );
            return loaded;
        }
    };

    let mut unique: IndexMap<IdentityKey, PersonRecord> = IndexMap::new();
    for path in files {
        let name = file_name_string(&path);
        let rows = match read_rows(&path) {
            Ok(rows) => rows,
            Err(err) => {
                loaded.files_failed += 1;
                reporter.skipped(&name, &SkipReason::UnreadableDocument(format!("{err:#}")));
                continue;
            }
        };

        loaded.files_loaded += 1;
        loaded.rows_read += rows.len();
        for row in rows {
            match record_from_row(&row) {
                Some(record) => {
                    unique.insert(record.identity_key(), record);
                }
                None => loaded.rows_rejected += 1,
            }
        }
        debug!(file = %name, unique = unique.len(), "loaded record file");
    }

    loaded.records = unique.into_values().collect();
    info!(
        people_dir = %people_dir.display(),
        records = loaded.records.len(),
        rows_rejected = loaded.rows_rejected,
        "loaded unique person records"
    );
    loaded
}

pub fn record_from_row(row: &[String]) -> Option<PersonRecord> {
    if row.len() < MIN_COLUMNS {
        return None;
    }

    let field = |column: usize| row[column].trim().to_string();
    Some(PersonRecord {
        first_name: title_case(&field(COLUMN_FIRST_NAME)),
        last_name: title_case(&field(COLUMN_LAST_NAME)),
        zip_code: field(COLUMN_ZIP_CODE),
        tax_id: digits_only(&field(COLUMN_TAX_ID)),
        source_filename: field(COLUMN_SOURCE_FILENAME),
    })
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_csv_rows(path),
        _ => read_sheet_rows(path),
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to parse {}", path.display()))?;
        rows.push(record.iter().map(ToOwned::to_owned).collect());
    }
    Ok(rows)
}

fn read_sheet_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", path.display()))?
        .with_context(|| format!("failed to read first worksheet of {}", path.display()))?;

    Ok(rows_from_range(&range))
}

fn rows_from_range(range: &Range<Data>) -> Vec<Vec<String>> {
    let leading_columns = range
        .start()
        .map(|(_, column)| column as usize)
        .unwrap_or_default();

    range
        .rows()
        .map(|row| {
            let mut cells = vec![String::new(); leading_columns];
            cells.extend(row.iter().map(cell_to_string));
            cells
        })
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => {
            if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                value.to_string()
            }
        }
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.to_string(),
        Data::DateTimeIso(value) => value.clone(),
        Data::DurationIso(value) => value.clone(),
        Data::Error(err) => format!("#ERR:{err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::io::Write;

    use zip::CompressionMethod;
    use zip::write::{SimpleFileOptions, ZipWriter};

    use super::*;
    use crate::report::RecordingReporter;

    const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

    fn column_name(mut index: usize) -> String {
        let mut name = String::new();
        loop {
            name.insert(0, char::from(b'A' + (index % 26) as u8));
            if index < 26 {
                return name;
            }
            index = index / 26 - 1;
        }
    }

    fn cell_xml(reference: &str, value: &str) -> String {
        if !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit()) {
            format!(r#"<c r="{reference}"><v>{value}</v></c>"#)
        } else {
            format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#)
        }
    }

    fn write_xlsx(path: &Path, rows: &[Vec<(usize, &str)>]) {
        let mut sheet_rows = String::new();
        for (row_index, cells) in rows.iter().enumerate() {
            let row_number = row_index + 1;
            sheet_rows.push_str(&format!(r#"<row r="{row_number}">"#));
            for (column, value) in cells {
                let reference = format!("{}{row_number}", column_name(*column));
                sheet_rows.push_str(&cell_xml(&reference, value));
            }
            sheet_rows.push_str("</row>");
        }

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#
                    .to_string(),
            ),
            (
                "_rels/.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PACKAGE_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{SHEET_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PACKAGE_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{SHEET_NS}"><sheetData>{sheet_rows}</sheetData></worksheet>"#
                ),
            ),
        ];

        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn sheet_row<'a>(
        first: &'a str,
        last: &'a str,
        zip: &'a str,
        tax_id: &'a str,
        filename: &'a str,
    ) -> Vec<(usize, &'a str)> {
        [
            (COLUMN_FIRST_NAME, first),
            (COLUMN_LAST_NAME, last),
            (COLUMN_ZIP_CODE, zip),
            (COLUMN_TAX_ID, tax_id),
            (COLUMN_SOURCE_FILENAME, filename),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }

    fn csv_row(first: &str, last: &str, zip: &str, tax_id: &str, filename: &str) -> String {
        let mut cells = vec![String::new(); MIN_COLUMNS];
        cells[COLUMN_FIRST_NAME] = first.to_string();
        cells[COLUMN_LAST_NAME] = last.to_string();
        cells[COLUMN_ZIP_CODE] = zip.to_string();
        cells[COLUMN_TAX_ID] = tax_id.to_string();
        cells[COLUMN_SOURCE_FILENAME] = filename.to_string();
        cells.join(",")
    }

    #[test]
    fn record_from_row_normalizes_fields() {
        let row: Vec<String> = csv_row("  jane ", "DOE-SMITH", " 02139 ", "123-45-6789", " f1.pdf ")
            .split(',')
            .map(ToOwned::to_owned)
            .collect();

        let record = record_from_row(&row).unwrap();
        assert_eq!(record.first_name, "Jane");
        assert_eq!(record.last_name, "Doe-Smith");
        assert_eq!(record.zip_code, "02139");
        assert_eq!(record.tax_id, "123456789");
        assert_eq!(record.source_filename, "f1.pdf");
    }

    #[test]
    fn record_from_row_rejects_short_rows() {
        let row = vec![String::from("x"); MIN_COLUMNS - 1];
        assert!(record_from_row(&row).is_none());
    }

    #[test]
    fn duplicate_rows_across_files_collapse_to_one_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.csv"),
            format!(
                "{}\n{}\n",
                csv_row("jane", "doe", "02139", "123-45-6789", "first.pdf"),
                csv_row("john", "roe", "10001", "987654321", "roe.pdf"),
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("b.CSV"),
            format!(
                "{}\nshort,row\n",
                csv_row("JANE", "Doe", "02139", "123456789", "second.pdf")
            ),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let reporter = RecordingReporter::default();
        let loaded = load_records(dir.path(), &reporter);

        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.files_loaded, 2);
        assert_eq!(loaded.rows_rejected, 1);
        assert_eq!(loaded.records[0].first_name, "Jane");
        assert_eq!(loaded.records[0].source_filename, "second.pdf");
        assert_eq!(loaded.records[1].last_name, "Roe");
    }

    #[test]
    fn unreadable_workbook_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xlsx"), b"not a workbook").unwrap();
        fs::write(
            dir.path().join("b.csv"),
            csv_row("ann", "lee", "60601", "111-22-3333", "lee.pdf"),
        )
        .unwrap();

        let reporter = RecordingReporter::default();
        let loaded = load_records(dir.path(), &reporter);

        assert_eq!(loaded.files_failed, 1);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(reporter.skip_kinds(), vec!["unreadable_document"]);
    }

    #[test]
    fn workbook_rows_load_from_fixed_columns() {
        let dir = tempfile::tempdir().unwrap();
        write_xlsx(
            &dir.path().join("people.xlsx"),
            &[
                sheet_row("jane", "DOE", "60601", "123-45-6789", "doe.pdf"),
                sheet_row("john", "roe", "10001", "987654321", "roe.pdf"),
            ],
        );

        let reporter = RecordingReporter::default();
        let loaded = load_records(dir.path(), &reporter);

        assert_eq!(loaded.files_loaded, 1);
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(
            loaded.records[0],
            PersonRecord {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                zip_code: "60601".to_string(),
                tax_id: "123456789".to_string(),
                source_filename: "doe.pdf".to_string(),
            }
        );
        assert_eq!(loaded.records[1].tax_id, "987654321");
        assert!(reporter.skip_kinds().is_empty());
    }

    #[test]
    fn workbook_with_empty_first_column_keeps_positions() {
        let dir = tempfile::tempdir().unwrap();
        let mut row = sheet_row("", "doe", "60601", "123-45-6789", "doe.pdf");
        row.push((MIN_COLUMNS, "extra"));
        write_xlsx(&dir.path().join("people.xlsx"), &[row]);

        let loaded = load_records(dir.path(), &RecordingReporter::default());

        assert_eq!(loaded.records.len(), 1);
        let record = &loaded.records[0];
        assert_eq!(record.first_name, "");
        assert_eq!(record.last_name, "Doe");
        assert_eq!(record.zip_code, "60601");
        assert_eq!(record.tax_id, "123456789");
        assert_eq!(record.source_filename, "doe.pdf");
    }

    #[test]
    fn range_rows_are_padded_to_column_a() {
        let mut range = Range::new((0, 2), (0, 3));
        range.set_value((0, 2), Data::String("c".to_string()));
        range.set_value((0, 3), Data::Float(4.0));

        assert_eq!(rows_from_range(&range), vec![vec!["", "", "c", "4"]]);
    }

    #[test]
    fn float_cells_without_fraction_render_as_integers() {
        assert_eq!(cell_to_string(&Data::Float(2139.0)), "2139");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }
}
