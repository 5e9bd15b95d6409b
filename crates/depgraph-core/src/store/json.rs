//! JSON graph documents.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::{GraphDocument, Result};

pub fn save(path: &Path, document: &GraphDocument) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn load(path: &Path) -> Result<GraphDocument> {
    let reader = BufReader::new(File::open(path)?);
    let document: GraphDocument = serde_json::from_reader(reader)?;
    GraphDocument::check_version(&document.schema_version)?;
    debug!(
        "Loaded {} components from {}",
        document.components.len(),
        path.display()
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::sample_document;
    use crate::store::StoreError;

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(sample_document()).unwrap();
        assert_eq!(value["schema_version"], "1.0");
        assert_eq!(value["commit_hash"], "abc123");
        assert!(value["external_symbols"]["print"].is_string());
        assert_eq!(value["components"][1]["kind"], "method");
    }

    #[test]
    fn test_rejects_other_schema_version() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("graph.json");
        let mut document = sample_document();
        document.schema_version = "0.1".into();
        save(&path, &document).unwrap();

        assert!(matches!(
            load(&path),
            Err(StoreError::SchemaVersionMismatch { .. })
        ));
    }
}
