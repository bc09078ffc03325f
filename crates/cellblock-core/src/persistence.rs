//! Save/Load of rap sheets
//!
//! Uses bincode for a compact binary file. Only records persist: the block
//! layout is regenerated from config and actors are respawned by the caller.

use std::io::{Read, Write};

use cellblock_logic::rap_sheet::RapSheet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::RapSheetStore;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the record store
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulation time in seconds when saved
    pub sim_time: f64,
    pub records: Vec<RapSheet>,
}

/// Result of loading a save
#[derive(Debug)]
pub struct LoadedRecords {
    pub sim_time: f64,
    pub store: RapSheetStore,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Write every record to `writer`
pub fn save_records<W: Write>(writer: W, store: &RapSheetStore, sim_time: f64) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time,
        records: store.iter().cloned().collect(),
    };
    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Read records back, rejecting other format versions
pub fn load_records<R: Read>(reader: R) -> Result<LoadedRecords, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    Ok(LoadedRecords {
        sim_time: save_data.sim_time,
        store: RapSheetStore::from_records(save_data.records),
    })
}
