//! Collection of user-supplied SMILES strings into a batch for PaDEL.

use std::path::Path;

use cholinease_common::error::{CholinEaseError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const EMPTY_INPUT_MESSAGE: &str = "Please enter SMILES strings to start the prediction!";
pub const NO_COMPOUNDS_MESSAGE: &str = "Please enter at least one SMILES notation.";

/// One compound of a batch. `id` is the molecule name PaDEL reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compound {
    pub id: String,
    pub smiles: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmilesBatch {
    compounds: Vec<Compound>,
    /// Number of entries dropped because the batch hit its size cap
    truncated: usize,
}

impl SmilesBatch {
    /// Parse one SMILES per line. Blank lines are skipped and anything after
    /// the first whitespace on a line is ignored.
    pub fn parse(text: &str, max_compounds: usize) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CholinEaseError::InvalidInput(EMPTY_INPUT_MESSAGE.to_string()));
        }

        let lines = text
            .split('\n')
            .filter_map(|line| line.split_whitespace().next());

        Self::from_smiles(lines, max_compounds)
    }

    pub fn from_smiles<I, S>(smiles: I, max_compounds: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compounds = Vec::new();
        let mut truncated = 0;

        for s in smiles {
            let s = s.as_ref().trim();
            if s.is_empty() {
                continue;
            }
            if compounds.len() >= max_compounds {
                truncated += 1;
                continue;
            }
            compounds.push(Compound {
                id: format!("mol_{}", compounds.len() + 1),
                smiles: s.to_string(),
            });
        }

        if compounds.is_empty() {
            return Err(CholinEaseError::InvalidInput(NO_COMPOUNDS_MESSAGE.to_string()));
        }

        debug!("Collected {} compounds ({} truncated)", compounds.len(), truncated);
        Ok(Self { compounds, truncated })
    }

    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    pub fn truncated(&self) -> usize {
        self.truncated
    }

    /// Position of a compound id within the batch.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.compounds.iter().position(|c| c.id == id)
    }

    /// Render as a PaDEL .smi file: `SMILES<TAB>name` per line.
    pub fn to_smi(&self) -> String {
        self.compounds
            .iter()
            .map(|c| format!("{}\t{}", c.smiles, c.id))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn write_smi(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.to_smi()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_per_line() {
        let batch = SmilesBatch::parse("C1CCCCC1\nCC(=O)O\r\nO=C(C)O\n", 100).unwrap();
        let smiles: Vec<&str> = batch.compounds().iter().map(|c| c.smiles.as_str()).collect();
        assert_eq!(smiles, vec!["C1CCCCC1", "CC(=O)O", "O=C(C)O"]);
        assert_eq!(batch.compounds()[2].id, "mol_3");
        assert_eq!(batch.truncated(), 0);
    }

    #[test]
    fn test_blank_lines_and_names_are_dropped() {
        let batch = SmilesBatch::parse("  CCO ethanol\n\n   \nc1ccccc1\tbenzene", 100).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.compounds()[0].smiles, "CCO");
        assert_eq!(batch.compounds()[1].smiles, "c1ccccc1");
        assert_eq!(batch.compounds()[1].id, "mol_2");
    }

    #[test]
    fn test_empty_input_warns() {
        let err = SmilesBatch::parse("   \n  ", 100).unwrap_err();
        assert_eq!(err.to_string(), format!("Invalid input: {}", EMPTY_INPUT_MESSAGE));
    }

    #[test]
    fn test_cap_truncates() {
        let text = (0..105).map(|i| "C".repeat(i + 1)).collect::<Vec<_>>().join("\n");
        let batch = SmilesBatch::parse(&text, 100).unwrap();
        assert_eq!(batch.len(), 100);
        assert_eq!(batch.truncated(), 5);
        assert_eq!(batch.compounds()[99].smiles, "C".repeat(100));
    }

    #[test]
    fn test_from_smiles_rejects_all_blank() {
        let err = SmilesBatch::from_smiles(vec!["", "  "], 100).unwrap_err();
        assert!(matches!(err, CholinEaseError::InvalidInput(m) if m == NO_COMPOUNDS_MESSAGE));
    }

    #[test]
    fn test_smi_rendering_and_lookup() {
        let batch = SmilesBatch::from_smiles(vec!["CCO", "CCN"], 100).unwrap();
        assert_eq!(batch.to_smi(), "CCO\tmol_1\nCCN\tmol_2");
        assert_eq!(batch.position("mol_2"), Some(1));
        assert_eq!(batch.position("mol_9"), None);
    }
}
