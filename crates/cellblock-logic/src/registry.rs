//! Door registry: symbolic transition ids → concrete crossings.
//!
//! A transition is one directed crossing of a door, from a named entry anchor
//! to a named exit anchor. The registry is built once from the static naming
//! table below plus a [`SceneCatalog`] of what the world actually contains.
//! Anything that fails to resolve is logged once and permanently marked
//! unusable; it is never retried.
//!
//! # Naming table
//!
//! | Trigger | Entry → Exit | Door | Class |
//! |---------|--------------|------|-------|
//! | `CellDoor_{i}` | `Cell_{i}_Outside` → `Cell_{i}_Inside` | `Cell_{i}_Door` | Cell |
//! | `CellDoorExit_{i}` | `Cell_{i}_Inside` → `Cell_{i}_Outside` | `Cell_{i}_Door` | Cell |
//! | `HoldingCellEnter` / `HoldingCellExit` | `Holding_*` | `HoldingCellDoor` | HoldingCell |
//! | `BookingEnter` / `BookingExit` | `Booking_*` | `BookingDoor` | Entry |
//! | `GuardRoomEnter` / `GuardRoomExit` | `GuardRoom_*` | `GuardRoomDoor` | Guard |

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::geometry::Vec3;

/// Security classification of a physical door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorClass {
    Cell,
    HoldingCell,
    /// Booking / facility entry door.
    Entry,
    /// Staff-only door; closes but has no lock.
    Guard,
    Other,
}

impl DoorClass {
    /// Closed *and* locked whenever secured.
    pub fn is_lockable(&self) -> bool {
        matches!(self, DoorClass::Cell | DoorClass::HoldingCell | DoorClass::Entry)
    }

    /// Secured unconditionally by `secure_all`.
    pub fn is_always_secure(&self) -> bool {
        self.is_lockable()
    }

    /// Whether opening this door creates a securing obligation.
    pub fn needs_securing(&self, escort_active: bool) -> bool {
        match self {
            DoorClass::Cell | DoorClass::HoldingCell => true,
            DoorClass::Entry | DoorClass::Guard => escort_active,
            DoorClass::Other => false,
        }
    }
}

/// Unresolved row of the naming table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub id: String,
    pub entry_point: String,
    pub exit_point: String,
    pub door: String,
    pub class: DoorClass,
    /// Overrides the configured security pause for this crossing.
    pub security_delay: Option<f64>,
}

/// A resolved, immutable crossing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorTransition {
    pub id: String,
    pub entry_point: Vec3,
    pub exit_point: Vec3,
    pub door: String,
    pub class: DoorClass,
    pub security_delay: f64,
    /// Unit vector from entry to exit.
    pub exit_forward: Vec3,
}

const FIXED_TRANSITIONS: &[(&str, &str, &str, &str, DoorClass)] = &[
    ("HoldingCellEnter", "Holding_Outside", "Holding_Inside", "HoldingCellDoor", DoorClass::HoldingCell),
    ("HoldingCellExit", "Holding_Inside", "Holding_Outside", "HoldingCellDoor", DoorClass::HoldingCell),
    ("BookingEnter", "Booking_Outside", "Booking_Inside", "BookingDoor", DoorClass::Entry),
    ("BookingExit", "Booking_Inside", "Booking_Outside", "BookingDoor", DoorClass::Entry),
    ("GuardRoomEnter", "GuardRoom_Outside", "GuardRoom_Inside", "GuardRoomDoor", DoorClass::Guard),
    ("GuardRoomExit", "GuardRoom_Inside", "GuardRoom_Outside", "GuardRoomDoor", DoorClass::Guard),
];

/// Anchor point names of cell `index`: (outside, inside).
pub fn cell_points(index: u32) -> (String, String) {
    (format!("Cell_{index}_Outside"), format!("Cell_{index}_Inside"))
}

/// Door name of cell `index`.
pub fn cell_door(index: u32) -> String {
    format!("Cell_{index}_Door")
}

/// Build the full naming table for a block with `cell_count` cells.
pub fn naming_table(cell_count: u32) -> Vec<TransitionSpec> {
    let mut table = Vec::with_capacity(FIXED_TRANSITIONS.len() + 2 * cell_count as usize);

    for index in 0..cell_count {
        let (outside, inside) = cell_points(index);
        let door = cell_door(index);
        table.push(TransitionSpec {
            id: format!("CellDoor_{index}"),
            entry_point: outside.clone(),
            exit_point: inside.clone(),
            door: door.clone(),
            class: DoorClass::Cell,
            security_delay: None,
        });
        table.push(TransitionSpec {
            id: format!("CellDoorExit_{index}"),
            entry_point: inside,
            exit_point: outside,
            door,
            class: DoorClass::Cell,
            security_delay: None,
        });
    }

    for &(id, entry, exit, door, class) in FIXED_TRANSITIONS {
        table.push(TransitionSpec {
            id: id.to_string(),
            entry_point: entry.to_string(),
            exit_point: exit.to_string(),
            door: door.to_string(),
            class,
            security_delay: None,
        });
    }

    table
}

/// What the world contains: named anchor points and door names.
#[derive(Debug, Clone, Default)]
pub struct SceneCatalog {
    points: HashMap<String, Vec3>,
    doors: HashSet<String>,
}

impl SceneCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, name: impl Into<String>, position: Vec3) {
        self.points.insert(name.into(), position);
    }

    pub fn add_door(&mut self, name: impl Into<String>) {
        self.doors.insert(name.into());
    }

    pub fn point(&self, name: &str) -> Option<Vec3> {
        self.points.get(name).copied()
    }

    pub fn has_door(&self, name: &str) -> bool {
        self.doors.contains(name)
    }
}

/// Resolved transition table. Read-only after [`DoorRegistry::build`].
#[derive(Debug, Clone, Default)]
pub struct DoorRegistry {
    resolved: HashMap<String, DoorTransition>,
    unusable: BTreeMap<String, RegistryError>,
    door_classes: BTreeMap<String, DoorClass>,
}

impl DoorRegistry {
    /// Resolve every row of `table` against `scene`.
    pub fn build(table: &[TransitionSpec], scene: &SceneCatalog, default_delay: f64) -> Self {
        let mut registry = Self::default();

        for spec in table {
            match resolve_spec(spec, scene, default_delay) {
                Ok(transition) => {
                    debug!("registry: resolved {} via {}", spec.id, spec.door);
                    registry.door_classes.insert(spec.door.clone(), spec.class);
                    registry.resolved.insert(spec.id.clone(), transition);
                }
                Err(err) => {
                    error!("registry: {err}; transition disabled");
                    registry.unusable.insert(spec.id.clone(), err);
                }
            }
        }

        registry
    }

    pub fn resolve(&self, transition_id: &str) -> Result<&DoorTransition, RegistryError> {
        if let Some(transition) = self.resolved.get(transition_id) {
            return Ok(transition);
        }
        if self.unusable.contains_key(transition_id) {
            return Err(RegistryError::Unusable(transition_id.to_string()));
        }
        Err(RegistryError::NotFound(transition_id.to_string()))
    }

    /// Classification of every door referenced by a usable transition.
    pub fn door_classes(&self) -> &BTreeMap<String, DoorClass> {
        &self.door_classes
    }

    pub fn door_class(&self, door: &str) -> Option<DoorClass> {
        self.door_classes.get(door).copied()
    }

    /// Transitions disabled at load, with the original failure.
    pub fn unusable(&self) -> impl Iterator<Item = (&str, &RegistryError)> {
        self.unusable.iter().map(|(id, err)| (id.as_str(), err))
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

fn resolve_spec(
    spec: &TransitionSpec,
    scene: &SceneCatalog,
    default_delay: f64,
) -> Result<DoorTransition, RegistryError> {
    let missing_point = |point: &str| RegistryError::MissingPoint {
        id: spec.id.clone(),
        point: point.to_string(),
    };
    let entry_point = scene
        .point(&spec.entry_point)
        .ok_or_else(|| missing_point(&spec.entry_point))?;
    let exit_point = scene
        .point(&spec.exit_point)
        .ok_or_else(|| missing_point(&spec.exit_point))?;
    if !scene.has_door(&spec.door) {
        return Err(RegistryError::MissingDoor {
            id: spec.id.clone(),
            door: spec.door.clone(),
        });
    }

    Ok(DoorTransition {
        id: spec.id.clone(),
        entry_point,
        exit_point,
        door: spec.door.clone(),
        class: spec.class,
        security_delay: spec.security_delay.unwrap_or(default_delay),
        exit_forward: (exit_point - entry_point).normalize(),
    })
}
