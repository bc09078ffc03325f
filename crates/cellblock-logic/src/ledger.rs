//! Door security ledger.
//!
//! Tracks which doors were opened by whom and which ones owe a re-secure.
//! The periodic breach check is the only automatic recovery for a door that
//! was abandoned mid-operation (aborted or stopped transitions).
//!
//! # Securing rules
//!
//! | Class | Needs securing after open | Locked when secured |
//! |-------|---------------------------|---------------------|
//! | Cell, HoldingCell | always | yes |
//! | Entry | only during an escort | yes |
//! | Guard | only during an escort | no |
//! | Other | never | no |

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::events::FacilityEvent;
use crate::ports::DoorPort;
use crate::registry::DoorClass;
use crate::{ActorId, SimTime};

/// Per-door bookkeeping, created on first interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoorLedgerEntry {
    pub was_opened_by_actor: Option<ActorId>,
    pub opened_at: Option<SimTime>,
    pub needs_securing: bool,
    pub access_count: u32,
    /// A breach was already reported for the current open episode.
    pub breach_reported: bool,
}

#[derive(Debug, Clone)]
pub struct DoorSecurityLedger {
    classes: BTreeMap<String, DoorClass>,
    entries: BTreeMap<String, DoorLedgerEntry>,
    escort_contexts: u32,
    config: LedgerConfig,
}

impl DoorSecurityLedger {
    pub fn new(classes: BTreeMap<String, DoorClass>, config: LedgerConfig) -> Self {
        Self {
            classes,
            entries: BTreeMap::new(),
            escort_contexts: 0,
            config,
        }
    }

    pub fn class_of(&self, door: &str) -> DoorClass {
        self.classes.get(door).copied().unwrap_or(DoorClass::Other)
    }

    pub fn entry(&self, door: &str) -> Option<&DoorLedgerEntry> {
        self.entries.get(door)
    }

    pub fn escort_active(&self) -> bool {
        self.escort_contexts > 0
    }

    pub fn begin_escort_context(&mut self) {
        self.escort_contexts += 1;
    }

    /// Closing the last escort context resets the ledger. Doors that still
    /// owe a re-secure keep their entry so the breach check can find them.
    pub fn end_escort_context(&mut self) {
        self.escort_contexts = self.escort_contexts.saturating_sub(1);
        if self.escort_contexts == 0 {
            self.entries.retain(|_, entry| entry.needs_securing);
            for entry in self.entries.values_mut() {
                entry.access_count = 0;
            }
        }
    }

    pub fn register_interaction(&mut self, door: &str, actor: ActorId, will_open: bool, now: SimTime) {
        let needs = self.class_of(door).needs_securing(self.escort_active());
        let entry = self.entries.entry(door.to_string()).or_default();
        entry.access_count += 1;
        if will_open {
            entry.was_opened_by_actor = Some(actor);
            entry.opened_at = Some(now);
            entry.breach_reported = false;
        }
        // Sticky until `secure`.
        entry.needs_securing |= needs;
        debug!(
            "ledger: {door} touched by {actor} (open={will_open}, needs_securing={})",
            entry.needs_securing
        );
    }

    pub fn register_passage(&mut self, door: &str, actor: ActorId) {
        let entry = self.entries.entry(door.to_string()).or_default();
        entry.access_count += 1;
        debug!("ledger: {actor} passed {door}");
    }

    /// Close, then lock if the class is lockable. Safe to repeat.
    ///
    /// Returns whether the door ended up closed. A door that refuses to close
    /// keeps its obligation.
    pub fn secure<W: DoorPort + ?Sized>(&mut self, door: &str, world: &mut W) -> bool {
        if !world.is_closed(door) {
            world.close(door);
        }
        let closed = world.is_closed(door);
        if closed && self.class_of(door).is_lockable() && !world.is_locked(door) {
            world.lock(door);
        }

        if closed {
            if let Some(entry) = self.entries.get_mut(door) {
                entry.needs_securing = false;
                entry.was_opened_by_actor = None;
                entry.opened_at = None;
                entry.breach_reported = false;
            }
        } else {
            warn!("ledger: {door} did not close when secured");
        }
        closed
    }

    /// Secure every always-secure door and every door with an outstanding
    /// obligation. Returns how many doors ended up closed.
    pub fn secure_all<W: DoorPort + ?Sized>(&mut self, world: &mut W) -> usize {
        let doors: BTreeSet<String> = self
            .classes
            .iter()
            .filter(|(_, class)| class.is_always_secure())
            .map(|(door, _)| door.clone())
            .chain(
                self.entries
                    .iter()
                    .filter(|(_, entry)| entry.needs_securing)
                    .map(|(door, _)| door.clone()),
            )
            .collect();

        let mut closed = 0;
        for door in &doors {
            if self.secure(door, world) {
                closed += 1;
            }
        }
        closed
    }

    /// Force-secure doors left open past the threshold.
    ///
    /// Emits exactly one breach per open episode, even when the door refuses
    /// to close and keeps failing later checks. Doors for which `is_held`
    /// answers true belong to a crossing still in flight and are left alone.
    pub fn check_breaches<W: DoorPort + ?Sized>(
        &mut self,
        now: SimTime,
        world: &mut W,
        is_held: impl Fn(&str) -> bool,
    ) -> Vec<FacilityEvent> {
        let max_open = self.config.max_open_seconds;
        let breached: Vec<(String, ActorId, f64)> = self
            .entries
            .iter()
            .filter(|(door, entry)| {
                entry.needs_securing && !entry.breach_reported && !is_held(door.as_str())
            })
            .filter_map(|(door, entry)| {
                let opened_by = entry.was_opened_by_actor?;
                let open_for = now - entry.opened_at?;
                (open_for > max_open && !world.is_closed(door))
                    .then(|| (door.clone(), opened_by, open_for))
            })
            .collect();

        let mut events = Vec::with_capacity(breached.len());
        for (door, opened_by, open_for) in breached {
            warn!("ledger: breach on {door} (opened by {opened_by}, open {open_for:.1}s), forcing closed");
            if let Some(entry) = self.entries.get_mut(&door) {
                entry.breach_reported = true;
            }
            self.secure(&door, world);
            events.push(FacilityEvent::SecurityBreach {
                door,
                opened_by,
                open_for,
            });
        }
        events
    }
}
