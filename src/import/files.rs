//! File adapters that turn CSV or JSON exports into an [`ImportBatch`].

use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};

use super::{Category, ImportBatch};
use crate::error::{Error, Result};

/// Reads a CSV file whose header row uses the payload field names
/// (`mes_ano`, `unidade_codigo`, ...) into one category of a batch.
pub fn load_csv(path: &Path, category: Category) -> Result<ImportBatch> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    batch_from_csv(reader, category)
}

pub fn load_json(path: &Path) -> Result<ImportBatch> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn batch_from_csv<R: Read>(mut reader: csv::Reader<R>, category: Category) -> Result<ImportBatch> {
    let headers = reader.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(Error::InvalidInput("CSV file has no header row".to_string()));
    }
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let mut object = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            // Blank cells mean "not provided", not an empty value.
            if header.is_empty() || cell.is_empty() {
                continue;
            }
            object.insert(header.to_string(), Value::String(cell.to_string()));
        }
        if !object.is_empty() {
            rows.push(Value::Object(object));
        }
    }

    let mut batch = ImportBatch::default();
    batch.set_rows(category, rows);
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::records::CategoryRecords;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn csv_rows_become_category_objects() {
        let data = "mes_ano,unidade_codigo,atendente_email,orcamentos_registrados,orcamentos_convertidos,nps\n\
                    2025-01, A1 ,x@e.com,1000,400,\n\
                    ,,,,,\n\
                    2025-02,A1,y@e.com,\"1,200.00\",600,80\n";
        let batch = batch_from_csv(reader(data), Category::AttendantMetrics).unwrap();
        let rows = batch.rows(Category::AttendantMetrics).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["unidade_codigo"], "A1");
        assert!(rows[0].get("nps").is_none());

        match CategoryRecords::parse(Category::AttendantMetrics, rows).unwrap() {
            CategoryRecords::AttendantMetrics(parsed) => {
                assert_eq!(parsed[1].budgets_registered, Some(1200.0));
                assert_eq!(parsed[1].nps_score, Some(80));
            }
            other => panic!("unexpected category {other:?}"),
        }
    }

    #[test]
    fn missing_header_is_rejected() {
        let result = batch_from_csv(reader(""), Category::Units);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn other_categories_stay_absent() {
        let batch = batch_from_csv(reader("nome,codigo\nCentro,C1\n"), Category::Units).unwrap();
        assert_eq!(batch.total_rows(), 1);
        assert!(batch.attendants.is_none());
    }
}
