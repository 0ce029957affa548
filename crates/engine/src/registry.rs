//! Reader/Writer registry
//!
//! Maps a [`Selection`] to the backend that serves it. Archive and JSON are
//! provided by `bucket-durability`; SQL databases are owned by an external
//! collaborator and report `UnsupportedBackend`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use bucket_core::{Definition, Error, MemoryReadout, Reader, Readout, Record, Result, Writer};
use bucket_durability::{ArchiveConfig, ArchiveReader, ArchiveWriter, JsonReader, JsonWriter};

use crate::selection::{Backend, Selection};

fn unsupported(selection: &Selection) -> Error {
    Error::UnsupportedBackend(format!(
        "{} backend is not available for '{}'",
        selection.backend, selection.uri
    ))
}

/// Open a reader for the selected source
pub fn open_reader(selection: &Selection, config: &ArchiveConfig) -> Result<Box<dyn Reader>> {
    let path = Path::new(&selection.uri);
    match selection.backend {
        Backend::Archive => Ok(Box::new(ArchiveReader::open(path, config)?)),
        Backend::Json => Ok(Box::new(JsonReader::open(path)?)),
        Backend::Sql => Err(unsupported(selection)),
    }
}

/// Open a writer for the selected destination
///
/// Writers always append, so a record selector is rejected.
pub fn open_writer(selection: &Selection, config: &ArchiveConfig) -> Result<Box<dyn Writer>> {
    if let Some(record) = selection.record {
        return Err(Error::InvalidSelection(format!(
            "record {} selected for writing to '{}'",
            record, selection.uri
        )));
    }
    match selection.backend {
        Backend::Archive => {
            config.validate()?;
            Ok(Box::new(ArchiveWriter::new(&selection.uri, config.clone())))
        }
        Backend::Json => Ok(Box::new(JsonWriter::new(&selection.uri))),
        Backend::Sql => Err(unsupported(selection)),
    }
}

/// Read the selected record (or every record) into memory
///
/// Readouts outlive the reader, which is closed before returning. Records
/// sharing a `def_sha` share one definition.
pub fn read_selection(
    selection: &Selection,
    config: &ArchiveConfig,
) -> Result<Vec<MemoryReadout>> {
    let mut reader = open_reader(selection, config)?;
    let records = match selection.record {
        Some(record) => vec![record],
        None => (0..reader.record_count()?).collect(),
    };

    let mut definitions: HashMap<String, Arc<Definition>> = HashMap::new();
    let mut readouts = Vec::with_capacity(records.len());
    for record in records {
        let readout = reader.read(record)?;
        let definition = match definitions.get(readout.def_sha()) {
            Some(definition) => Arc::clone(definition),
            None => {
                let definition = Arc::new(Definition::from_readout(readout.as_ref())?);
                definitions.insert(definition.def_sha.clone(), Arc::clone(&definition));
                definition
            }
        };
        readouts.push(MemoryReadout::new(
            definition,
            Record::from_readout(readout.as_ref())?,
        )?);
    }
    reader.close();

    debug!(
        selection = %selection,
        records = readouts.len(),
        definitions = definitions.len(),
        "Read selection"
    );
    Ok(readouts)
}

/// Write readouts to the selected destination, returning their record ids
pub fn write_selection(
    selection: &Selection,
    config: &ArchiveConfig,
    readouts: &[&dyn Readout],
) -> Result<Vec<usize>> {
    open_writer(selection, config)?.write_all(readouts)
}
