//! In-memory rap-sheet store

use std::collections::BTreeMap;

use cellblock_logic::error::StoreError;
use cellblock_logic::ports::RecordStore;
use cellblock_logic::rap_sheet::RapSheet;
use cellblock_logic::ActorId;
use serde::{Deserialize, Serialize};

/// Every inmate's rap sheet, keyed by actor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RapSheetStore {
    records: BTreeMap<ActorId, RapSheet>,
}

impl RapSheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = RapSheet>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.actor, r)).collect(),
        }
    }

    pub fn get(&self, actor: ActorId) -> Option<&RapSheet> {
        self.records.get(&actor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RapSheet> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for RapSheetStore {
    fn get_record(&self, actor: ActorId) -> Option<RapSheet> {
        self.records.get(&actor).cloned()
    }

    fn save_record(&mut self, record: RapSheet) -> Result<(), StoreError> {
        self.records.insert(record.actor, record);
        Ok(())
    }
}
