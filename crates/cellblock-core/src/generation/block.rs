//! Cell block layout generation
//!
//! One corridor runs east along `y = 0`. Cells open off its north side, the
//! booking room and guard room off its south side.
//!
//! ```text
//!   y=4   [C0] [C1] ... [Cn-1] [Holding]
//!   y=0  ============ corridor =============
//!   y=-4 [Booking]      dayroom       [Guard room]
//! ```
//!
//! | Anchor | Position |
//! |--------|----------|
//! | `Cell_{i}_Outside` / `_Inside` | (2 + 4i, 1) / (2 + 4i, 4) |
//! | `Holding_Outside` / `_Inside` | (2 + 4n, 1) / (2 + 4n, 4) |
//! | `Booking_Outside` / `_Inside` | (2, -1) / (2, -4) |
//! | `GuardRoom_Outside` / `_Inside` | (6 + 4n, -1) / (6 + 4n, -4) |

use std::collections::BTreeMap;

use cellblock_logic::escort::{booking_stations, Station};
use cellblock_logic::guard::PatrolPoint;
use cellblock_logic::registry::{cell_door, cell_points, DoorClass, SceneCatalog};
use hecs::World;

use crate::components::{BoundingBox, Door, NamedPoint, Position, Vec3};

const CELL_SPACING: f32 = 4.0;
const FIRST_CELL_X: f32 = 2.0;
const DOOR_NEAR_Y: f32 = 1.0;
const DOOR_FAR_Y: f32 = 4.0;

/// Transition the booking route starts with
pub const BOOKING_ENTRY: &str = "BookingEnter";

/// Generated block geometry
#[derive(Debug, Clone)]
pub struct BlockLayout {
    pub cell_count: u32,
    /// Everything walkable
    pub bounds: BoundingBox,
    /// Where inmates spend the day
    pub dayroom: BoundingBox,
    /// Where guards come on shift
    pub guard_post: Vec3,
    /// Mugshot, fingerprint and storage anchors inside booking
    pub station_anchors: [Vec3; 3],
    points: BTreeMap<String, Vec3>,
    doors: BTreeMap<String, DoorClass>,
    /// Door entities by name
    pub door_entities: BTreeMap<String, hecs::Entity>,
}

impl BlockLayout {
    pub fn point(&self, name: &str) -> Option<Vec3> {
        self.points.get(name).copied()
    }

    pub fn points(&self) -> impl Iterator<Item = (&str, Vec3)> {
        self.points.iter().map(|(name, p)| (name.as_str(), *p))
    }

    pub fn doors(&self) -> impl Iterator<Item = (&str, DoorClass)> {
        self.doors.iter().map(|(name, class)| (name.as_str(), *class))
    }

    /// What the door registry gets to resolve against
    pub fn scene_catalog(&self) -> SceneCatalog {
        let mut scene = SceneCatalog::new();
        for (name, position) in &self.points {
            scene.add_point(name.clone(), *position);
        }
        for name in self.doors.keys() {
            scene.add_door(name.clone());
        }
        scene
    }

    /// Booking route: through the booking door, then the three stations
    pub fn booking_route(&self) -> Vec<Station> {
        let [mugshot, fingerprint, storage] = self.station_anchors;
        let mut stations = booking_stations(mugshot, fingerprint, storage);
        if let Some(first) = stations.first_mut() {
            first.transition = Some(BOOKING_ENTRY.to_string());
        }
        stations
    }

    /// Corridor west end, guard room, corridor east end
    pub fn patrol_route(&self) -> Vec<PatrolPoint> {
        let east_x = self.guard_room_x();
        vec![
            PatrolPoint::new("CorridorWest", Vec3::new(1.0, 0.0, 0.0)),
            PatrolPoint::new("GuardRoom", Vec3::new(east_x, -5.0, 0.0)).through("GuardRoomEnter"),
            PatrolPoint::new("CorridorEast", Vec3::new(east_x, 0.0, 0.0)).through("GuardRoomExit"),
        ]
    }

    fn guard_room_x(&self) -> f32 {
        holding_x(self.cell_count) + CELL_SPACING
    }
}

fn cell_x(index: u32) -> f32 {
    FIRST_CELL_X + CELL_SPACING * index as f32
}

fn holding_x(cell_count: u32) -> f32 {
    cell_x(cell_count)
}

/// Spawn doors and anchor points for a block with `cell_count` cells
pub fn generate_block(world: &mut World, cell_count: u32) -> BlockLayout {
    let hx = holding_x(cell_count);
    let gx = hx + CELL_SPACING;

    let mut layout = BlockLayout {
        cell_count,
        bounds: BoundingBox::new(Vec3::new(0.0, -8.0, 0.0), Vec3::new(gx + 2.0, 6.0, 0.0)),
        dayroom: BoundingBox::new(
            Vec3::new(FIRST_CELL_X + CELL_SPACING, -6.0, 0.0),
            Vec3::new((gx - 3.0).max(FIRST_CELL_X + CELL_SPACING), -2.0, 0.0),
        ),
        guard_post: Vec3::new(gx - 2.0, 0.0, 0.0),
        station_anchors: [
            Vec3::new(1.0, -6.0, 0.0),
            Vec3::new(2.5, -7.0, 0.0),
            Vec3::new(4.0, -6.0, 0.0),
        ],
        points: BTreeMap::new(),
        doors: BTreeMap::new(),
        door_entities: BTreeMap::new(),
    };

    for index in 0..cell_count {
        let (outside, inside) = cell_points(index);
        let x = cell_x(index);
        add_doorway(world, &mut layout, &cell_door(index), DoorClass::Cell, true, [
            (outside, Vec3::new(x, DOOR_NEAR_Y, 0.0)),
            (inside, Vec3::new(x, DOOR_FAR_Y, 0.0)),
        ]);
    }

    add_doorway(world, &mut layout, "HoldingCellDoor", DoorClass::HoldingCell, true, [
        ("Holding_Outside".to_string(), Vec3::new(hx, DOOR_NEAR_Y, 0.0)),
        ("Holding_Inside".to_string(), Vec3::new(hx, DOOR_FAR_Y, 0.0)),
    ]);
    add_doorway(world, &mut layout, "BookingDoor", DoorClass::Entry, true, [
        ("Booking_Outside".to_string(), Vec3::new(FIRST_CELL_X, -DOOR_NEAR_Y, 0.0)),
        ("Booking_Inside".to_string(), Vec3::new(FIRST_CELL_X, -DOOR_FAR_Y, 0.0)),
    ]);
    add_doorway(world, &mut layout, "GuardRoomDoor", DoorClass::Guard, false, [
        ("GuardRoom_Outside".to_string(), Vec3::new(gx, -DOOR_NEAR_Y, 0.0)),
        ("GuardRoom_Inside".to_string(), Vec3::new(gx, -DOOR_FAR_Y, 0.0)),
    ]);

    log::info!(
        "generation: block with {cell_count} cells, {} doors, {} anchors",
        layout.doors.len(),
        layout.points.len()
    );
    layout
}

/// Spawn a door halfway between its two anchors, and the anchors themselves
fn add_doorway(
    world: &mut World,
    layout: &mut BlockLayout,
    door: &str,
    class: DoorClass,
    locked: bool,
    anchors: [(String, Vec3); 2],
) {
    let [(near_name, near), (far_name, far)] = anchors;
    let entity = world.spawn((Door::new(door, class, locked), Position::at((near + far) * 0.5)));
    layout.door_entities.insert(door.to_string(), entity);
    layout.doors.insert(door.to_string(), class);

    for (name, position) in [(near_name, near), (far_name, far)] {
        world.spawn((NamedPoint { name: name.clone() }, Position::at(position)));
        layout.points.insert(name, position);
    }
}
