//! Fingerprint CSV handling: combining PaDEL outputs and selecting model features.

use std::collections::HashMap;
use std::path::Path;

use cholinease_common::error::{CholinEaseError, Result};
use tracing::{debug, info};

use crate::smiles::SmilesBatch;

/// Column PaDEL writes the molecule name into.
pub const NAME_COLUMN: &str = "Name";

pub const COMBINED_FILE: &str = "Combined_PubChem_CDK_Klekota_app_data.csv";

/// A descriptor table as read from PaDEL: one row per molecule, cells kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorTable {
    columns: Vec<String>,
    names: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DescriptorTable {
    /// Build a table from a header (including `Name`) and rows.
    pub fn new(header: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        let name_idx = header
            .iter()
            .position(|h| h == NAME_COLUMN)
            .ok_or_else(|| CholinEaseError::Descriptor(format!("no '{}' column in descriptor output", NAME_COLUMN)))?;

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != name_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut names = Vec::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for (line, record) in records.into_iter().enumerate() {
            if record.len() != header.len() {
                return Err(CholinEaseError::Descriptor(format!(
                    "row {} has {} cells, expected {}",
                    line + 1,
                    record.len(),
                    header.len()
                )));
            }
            let mut cells = record;
            names.push(cells.remove(name_idx));
            rows.push(cells);
        }

        Ok(Self { columns, names, rows })
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CholinEaseError::DescriptorFileNotFound(path.to_path_buf()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let header = reader.headers()?.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            records.push(record.iter().map(|s| s.to_string()).collect());
        }
        debug!("Read {} rows x {} columns from {:?}", records.len(), header.len(), path);
        Self::new(header, records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Concatenate tables column-wise. Rows are matched on molecule name and
    /// keep the first table's order; repeated column names get `.1`, `.2`, ... suffixes.
    pub fn combine(tables: &[DescriptorTable]) -> Result<Self> {
        let (first, rest) = tables
            .split_first()
            .ok_or_else(|| CholinEaseError::Descriptor("no descriptor tables to combine".into()))?;

        let mut columns = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for table in tables {
            for col in &table.columns {
                columns.push(dedup_column(col, &mut seen));
            }
        }

        let indexes: Vec<HashMap<&str, usize>> = rest
            .iter()
            .map(|t| t.names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect())
            .collect();

        let mut rows = Vec::with_capacity(first.rows.len());
        for (name, row) in first.names.iter().zip(&first.rows) {
            let mut combined = row.clone();
            for (table, index) in rest.iter().zip(&indexes) {
                let i = index.get(name.as_str()).ok_or_else(|| {
                    CholinEaseError::Descriptor(format!("molecule '{}' missing from one of the fingerprint outputs", name))
                })?;
                combined.extend(table.rows[*i].iter().cloned());
            }
            rows.push(combined);
        }

        for table in rest {
            if table.rows.len() != first.rows.len() {
                return Err(CholinEaseError::Descriptor(format!(
                    "fingerprint outputs disagree on molecule count ({} vs {})",
                    first.rows.len(),
                    table.rows.len()
                )));
            }
        }

        info!("Combined {} tables into {} columns", tables.len(), columns.len());
        Ok(Self {
            columns,
            names: first.names.clone(),
            rows,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec![NAME_COLUMN.to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;
        for (name, row) in self.names.iter().zip(&self.rows) {
            writer.write_field(name)?;
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Pick `features` in order and put rows back into batch order.
    pub fn select(&self, features: &FeatureList, batch: &SmilesBatch) -> Result<FeatureMatrix> {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let column_idx = features
            .names()
            .iter()
            .map(|f| {
                positions
                    .get(f.as_str())
                    .copied()
                    .ok_or_else(|| CholinEaseError::MissingFeature(f.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ordered: Vec<Option<Vec<f64>>> = vec![None; batch.len()];
        for (name, row) in self.names.iter().zip(&self.rows) {
            let slot = batch.position(name).ok_or_else(|| {
                CholinEaseError::Descriptor(format!("unexpected molecule '{}' in descriptor output", name))
            })?;
            let values = column_idx
                .iter()
                .map(|&c| parse_cell(&row[c], name, &self.columns[c]))
                .collect::<Result<Vec<_>>>()?;
            ordered[slot] = Some(values);
        }

        let rows = ordered
            .into_iter()
            .zip(batch.compounds())
            .map(|(row, compound)| {
                row.ok_or_else(|| {
                    CholinEaseError::Descriptor(format!(
                        "no descriptors produced for {} ({})",
                        compound.smiles, compound.id
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureMatrix {
            features: features.names().to_vec(),
            rows,
        })
    }
}

fn dedup_column(col: &str, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(col.to_string()).or_insert(0);
    let name = if *count == 0 {
        col.to_string()
    } else {
        format!("{}.{}", col, count)
    };
    *count += 1;
    name
}

fn parse_cell(cell: &str, molecule: &str, column: &str) -> Result<f64> {
    let trimmed = cell.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            CholinEaseError::Descriptor(format!(
                "invalid value '{}' for {} in column {}",
                trimmed, molecule, column
            ))
        })
}

/// Ordered descriptor columns the model expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureList {
    names: Vec<String>,
}

impl FeatureList {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Read the header row of the reference descriptor CSV.
    pub fn from_reference_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CholinEaseError::DescriptorFileNotFound(path.to_path_buf()));
        }
        let mut reader = csv::Reader::from_path(path)?;
        let names: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if names.is_empty() {
            return Err(CholinEaseError::Descriptor(format!("reference file {:?} has no columns", path)));
        }
        info!("Loaded {} reference features from {:?}", names.len(), path);
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Dense numeric input for the model, rows in batch order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    features: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(features: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { features, rows }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.features.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> DescriptorTable {
        DescriptorTable::new(
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_combine_matches_rows_by_name() {
        let pubchem = table(&["Name", "PubchemFP0", "PubchemFP1"], &[&["mol_1", "1", "0"], &["mol_2", "0", "1"]]);
        let kr = table(&["Name", "KRFP1"], &[&["mol_2", "1"], &["mol_1", "0"]]);

        let combined = DescriptorTable::combine(&[pubchem, kr]).unwrap();
        assert_eq!(combined.columns(), &["PubchemFP0", "PubchemFP1", "KRFP1"]);
        assert_eq!(combined.names(), &["mol_1", "mol_2"]);
        assert_eq!(combined.row_count(), 2);
        assert_eq!(combined.rows[0], vec!["1", "0", "0"]);
        assert_eq!(combined.rows[1], vec!["0", "1", "1"]);
    }

    #[test]
    fn test_combine_renames_duplicate_columns() {
        let a = table(&["Name", "FP1"], &[&["mol_1", "1"]]);
        let b = table(&["Name", "FP1"], &[&["mol_1", "0"]]);
        let c = table(&["Name", "FP1"], &[&["mol_1", "1"]]);
        let combined = DescriptorTable::combine(&[a, b, c]).unwrap();
        assert_eq!(combined.columns(), &["FP1", "FP1.1", "FP1.2"]);
    }

    #[test]
    fn test_combine_missing_molecule_fails() {
        let a = table(&["Name", "FP1"], &[&["mol_1", "1"], &["mol_2", "1"]]);
        let b = table(&["Name", "KRFP1"], &[&["mol_1", "0"]]);
        let err = DescriptorTable::combine(&[a, b]).unwrap_err();
        assert!(err.to_string().contains("mol_2"));
    }

    #[test]
    fn test_select_orders_features_and_rows() {
        let batch = SmilesBatch::from_smiles(vec!["CCO", "CCN"], 100).unwrap();
        let t = table(&["Name", "A", "B", "C"], &[&["mol_2", "1", "2", "3"], &["mol_1", "4", "5", "6"]]);
        let features = FeatureList::new(vec!["C".into(), "A".into()]);

        let matrix = t.select(&features, &batch).unwrap();
        assert_eq!(matrix.rows(), &[vec![6.0, 4.0], vec![3.0, 1.0]]);
        assert_eq!(matrix.width(), 2);
        assert_eq!(matrix.features(), &["C".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_select_missing_feature() {
        let batch = SmilesBatch::from_smiles(vec!["CCO"], 100).unwrap();
        let t = table(&["Name", "A"], &[&["mol_1", "1"]]);
        let err = t.select(&FeatureList::new(vec!["KRFP4860".into()]), &batch).unwrap_err();
        assert!(matches!(err, CholinEaseError::MissingFeature(f) if f == "KRFP4860"));
    }

    #[test]
    fn test_select_rejects_blank_cell() {
        let batch = SmilesBatch::from_smiles(vec!["CCO"], 100).unwrap();
        let t = table(&["Name", "A"], &[&["mol_1", ""]]);
        let err = t.select(&FeatureList::new(vec!["A".into()]), &batch).unwrap_err();
        assert!(err.to_string().contains("column A"));
    }

    #[test]
    fn test_select_reports_molecule_without_descriptors() {
        let batch = SmilesBatch::from_smiles(vec!["CCO", "not-a-smiles"], 100).unwrap();
        let t = table(&["Name", "A"], &[&["mol_1", "1"]]);
        let err = t.select(&FeatureList::new(vec!["A".into()]), &batch).unwrap_err();
        assert!(err.to_string().contains("not-a-smiles"));
    }

    #[test]
    fn test_csv_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COMBINED_FILE);
        let t = table(&["Name", "A", "B"], &[&["mol_1", "1", "0"]]);
        t.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Name,A,B\nmol_1,1,0\n");
        assert_eq!(DescriptorTable::read_csv(&path).unwrap(), t);
    }

    #[test]
    fn test_reference_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.csv");
        std::fs::write(&path, "PubchemFP12,KRFP3,FP7\n0,1,1\n").unwrap();
        let features = FeatureList::from_reference_csv(&path).unwrap();
        assert_eq!(features.names(), &["PubchemFP12", "KRFP3", "FP7"]);

        let err = FeatureList::from_reference_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.is_file_error());
    }
}
