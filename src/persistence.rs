use crate::contract::Contract;
use crate::error::PersistenceError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Where verified contracts end up.
///
/// [`PactFileWriter`] is used unless another writer is provided, e.g. to keep contracts in
/// memory in tests.
pub trait ContractWriter {
    fn write_contract(&self, contract: &Contract) -> Result<(), PersistenceError>;
}

/// Writes each contract as `<consumer>-<provider>.json` in a directory, creating it if needed.
///
/// An existing file for the same pair of participants is overwritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PactFileWriter {
    pact_dir: PathBuf,
}

impl PactFileWriter {
    pub fn new(pact_dir: impl Into<PathBuf>) -> Self {
        Self {
            pact_dir: pact_dir.into(),
        }
    }

    pub fn pact_dir(&self) -> &Path {
        &self.pact_dir
    }

    /// The file `contract` is written to.
    pub fn file_path(&self, contract: &Contract) -> PathBuf {
        self.pact_dir
            .join(format!("{}-{}.json", contract.consumer(), contract.provider()))
    }
}

impl ContractWriter for PactFileWriter {
    fn write_contract(&self, contract: &Contract) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.pact_dir)?;
        let path = self.file_path(contract);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &contract.to_pact_json())?;
        writer.flush()?;
        log::debug!("Pact written to {}", path.display());
        Ok(())
    }
}
