//! Gameplay systems that produce events.
//!
//! The movement system owns the demo world: a bounded grid with tagged
//! tiles, a handful of wandering walkers and some stationary NPCs. Every
//! tick each walker tries one step, announcing it on the bus and honouring
//! any veto that scripts raise.

use crate::config::SimulationSettings;
use std::collections::HashMap;
use tile_event_system::{
    Cancellable, CollisionCheckEvent, Direction, EntityId, EventBus, MovementBlockedEvent,
    MovementCompletedEvent, MovementStartedEvent, NpcInteractionEvent, TilePosition,
    TileSteppedOffEvent, TileSteppedOnEvent, TileSteppingOnEvent,
};
use tracing::debug;

pub const DEFAULT_TILE: &str = "grass";
pub const LAVA_TILE: &str = "lava";

/// Entity ids at or above this value are NPCs.
pub const NPC_ID_BASE: u64 = 1000;

/// What happened to every walker during one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub moved: usize,
    pub blocked: usize,
    pub interactions: usize,
}

#[derive(Debug, Clone, Copy)]
struct Walker {
    entity: EntityId,
    position: TilePosition,
}

/// Drives walkers across the grid through the event bus.
#[derive(Debug)]
pub struct MovementSystem {
    width: i32,
    height: i32,
    tiles: HashMap<TilePosition, String>,
    walkers: Vec<Walker>,
    npcs: HashMap<TilePosition, EntityId>,
}

impl MovementSystem {
    pub fn new(settings: &SimulationSettings) -> Self {
        let tiles = settings
            .lava_tiles
            .iter()
            .map(|[x, y]| (TilePosition::new(*x, *y), LAVA_TILE.to_string()))
            .collect();
        let npcs = settings
            .npcs
            .iter()
            .enumerate()
            .map(|(i, [x, y])| (TilePosition::new(*x, *y), EntityId(NPC_ID_BASE + i as u64)))
            .collect::<HashMap<_, _>>();

        // Walkers start along the top row, skipping NPC tiles.
        let walkers = (0..settings.grid_width)
            .map(|x| TilePosition::new(x, 0))
            .filter(|pos| !npcs.contains_key(pos))
            .take(settings.walkers)
            .enumerate()
            .map(|(i, position)| Walker {
                entity: EntityId(i as u64 + 1),
                position,
            })
            .collect();

        Self {
            width: settings.grid_width,
            height: settings.grid_height,
            tiles,
            walkers,
            npcs,
        }
    }

    pub fn npc_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.npcs.values().copied().collect();
        ids.sort();
        ids
    }

    pub fn walker_ids(&self) -> Vec<EntityId> {
        self.walkers.iter().map(|w| w.entity).collect()
    }

    pub fn position_of(&self, entity: EntityId) -> Option<TilePosition> {
        self.walkers.iter().find(|w| w.entity == entity).map(|w| w.position)
    }

    pub fn tile_type(&self, position: TilePosition) -> &str {
        self.tiles.get(&position).map(String::as_str).unwrap_or(DEFAULT_TILE)
    }

    fn in_bounds(&self, position: TilePosition) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    fn occupied_by_walker(&self, position: TilePosition) -> bool {
        self.walkers.iter().any(|w| w.position == position)
    }

    /// The direction walker `index` tries on `frame`. Deterministic so runs
    /// are reproducible.
    fn direction_for(frame: u64, index: usize) -> Direction {
        let turn = (frame / 3 + index as u64) % Direction::ALL.len() as u64;
        Direction::ALL[turn as usize]
    }

    /// Moves every walker one step, if the world and the scripts allow it.
    pub fn step(&mut self, bus: &EventBus, frame: u64) -> StepReport {
        let mut report = StepReport::default();
        for index in 0..self.walkers.len() {
            let direction = Self::direction_for(frame, index);
            self.try_move(bus, index, direction, &mut report);
        }
        report
    }

    /// Attempts one move for walker `index`.
    ///
    /// Each stage publishes its event and checks for a veto once dispatch
    /// returns: `MovementStarted`, then the bounds check, `CollisionCheck`
    /// (bumping into an NPC raises `NpcInteraction`), then `TileSteppingOn`.
    /// A veto at any stage publishes `MovementBlocked` instead of moving.
    pub fn try_move(&mut self, bus: &EventBus, index: usize, direction: Direction, report: &mut StepReport) -> bool {
        let Some(walker) = self.walkers.get(index).copied() else {
            return false;
        };
        let from = walker.position;
        let to = from.step(direction);

        let mut started = MovementStartedEvent::new(walker.entity, from, direction);
        bus.publish(&mut started);
        if started.is_cancelled() {
            return self.block(bus, walker, direction, started.cancel_reason(), report);
        }

        if !self.in_bounds(to) {
            return self.block(bus, walker, direction, Some("edge of the map"), report);
        }

        let mut collision = CollisionCheckEvent::new(walker.entity, to, direction);
        if let Some(npc) = self.npcs.get(&to).copied() {
            collision.request_cancel(Some("npc"));
            let mut interaction = NpcInteractionEvent::new(npc, walker.entity, to);
            bus.publish(&mut interaction);
            if !interaction.is_cancelled() {
                report.interactions += 1;
            }
        } else if self.occupied_by_walker(to) {
            collision.request_cancel(Some("occupied"));
        }
        bus.publish(&mut collision);
        if collision.is_cancelled() {
            return self.block(bus, walker, direction, collision.cancel_reason(), report);
        }

        let tile_type = self.tile_type(to).to_string();
        let mut stepping = TileSteppingOnEvent::new(walker.entity, to, tile_type.clone(), direction);
        bus.publish(&mut stepping);
        if stepping.is_cancelled() {
            return self.block(bus, walker, direction, stepping.cancel_reason(), report);
        }

        self.walkers[index].position = to;
        report.moved += 1;

        let left_type = self.tile_type(from).to_string();
        bus.publish(&mut TileSteppedOffEvent::new(walker.entity, from, left_type));
        bus.publish(&mut MovementCompletedEvent::new(walker.entity, from, to, direction));
        bus.publish(&mut TileSteppedOnEvent::new(walker.entity, to, tile_type));
        true
    }

    fn block(
        &self,
        bus: &EventBus,
        walker: Walker,
        direction: Direction,
        reason: Option<&str>,
        report: &mut StepReport,
    ) -> bool {
        let reason = reason.unwrap_or(tile_event_system::DEFAULT_CANCEL_REASON);
        debug!("⛔ {} blocked moving {:?} from {}: {}", walker.entity, direction, walker.position, reason);
        report.blocked += 1;
        bus.publish(&mut MovementBlockedEvent::new(walker.entity, walker.position, direction, reason));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tile_event_system::{create_event_bus, priority};

    fn settings() -> SimulationSettings {
        SimulationSettings {
            grid_width: 4,
            grid_height: 4,
            walkers: 2,
            lava_tiles: vec![[1, 1]],
            npcs: vec![[2, 1]],
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn test_world_setup() {
        let world = MovementSystem::new(&settings());
        assert_eq!(world.walker_ids(), vec![EntityId(1), EntityId(2)]);
        assert_eq!(world.npc_ids(), vec![EntityId(NPC_ID_BASE)]);
        assert_eq!(world.position_of(EntityId(2)), Some(TilePosition::new(1, 0)));
        assert_eq!(world.tile_type(TilePosition::new(1, 1)), LAVA_TILE);
        assert_eq!(world.tile_type(TilePosition::new(0, 1)), DEFAULT_TILE);
    }

    #[test_log::test]
    fn test_unobserved_move_succeeds_and_announces() {
        let bus = create_event_bus();
        let scope = bus.create_scope("observer");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for key in ["off", "completed", "on"] {
            let seen = seen.clone();
            match key {
                "off" => bus.subscribe(&scope, priority::NORMAL, move |_: &mut TileSteppedOffEvent| {
                    seen.lock().unwrap().push("off");
                    Ok(())
                }),
                "completed" => bus.subscribe(&scope, priority::NORMAL, move |_: &mut MovementCompletedEvent| {
                    seen.lock().unwrap().push("completed");
                    Ok(())
                }),
                _ => bus.subscribe(&scope, priority::NORMAL, move |_: &mut TileSteppedOnEvent| {
                    seen.lock().unwrap().push("on");
                    Ok(())
                }),
            }
            .unwrap();
        }

        let mut world = MovementSystem::new(&settings());
        let mut report = StepReport::default();
        assert!(world.try_move(&bus, 0, Direction::South, &mut report));
        assert_eq!(world.position_of(EntityId(1)), Some(TilePosition::new(0, 1)));
        assert_eq!(*seen.lock().unwrap(), vec!["off", "completed", "on"]);
        assert_eq!(report.moved, 1);
    }

    #[test_log::test]
    fn test_veto_blocks_move_and_skips_stepped_on() {
        let bus = create_event_bus();
        let scope = bus.create_scope("lava_guard");
        bus.subscribe(&scope, priority::VALIDATION, |event: &mut TileSteppingOnEvent| {
            if event.tile_type == LAVA_TILE {
                event.request_cancel(Some("lava"));
            }
            Ok(())
        })
        .unwrap();

        let reasons = Arc::new(Mutex::new(Vec::new()));
        let reasons_clone = reasons.clone();
        bus.subscribe(&scope, priority::ANALYTICS, move |event: &mut MovementBlockedEvent| {
            reasons_clone.lock().unwrap().push(event.reason.clone());
            Ok(())
        })
        .unwrap();
        let stepped_on = Arc::new(Mutex::new(0));
        let stepped_clone = stepped_on.clone();
        bus.subscribe(&scope, priority::ANALYTICS, move |_: &mut TileSteppedOnEvent| {
            *stepped_clone.lock().unwrap() += 1;
            Ok(())
        })
        .unwrap();

        let mut world = MovementSystem::new(&settings());
        let mut report = StepReport::default();
        // Walker 2 at (1, 0) steps south onto lava.
        assert!(!world.try_move(&bus, 1, Direction::South, &mut report));
        assert_eq!(world.position_of(EntityId(2)), Some(TilePosition::new(1, 0)));
        // Walker 1 at (0, 0) walks off the map.
        assert!(!world.try_move(&bus, 0, Direction::North, &mut report));

        assert_eq!(*reasons.lock().unwrap(), vec!["lava".to_string(), "edge of the map".to_string()]);
        assert_eq!(*stepped_on.lock().unwrap(), 0);
        assert_eq!(report.blocked, 2);
    }

    #[test_log::test]
    fn test_bumping_into_npc_interacts_and_blocks() {
        let bus = create_event_bus();
        let scope = bus.create_scope("npc");
        let greeted = Arc::new(Mutex::new(Vec::new()));
        let greeted_clone = greeted.clone();
        bus.subscribe_entity(&scope, EntityId(NPC_ID_BASE), priority::NORMAL, move |event: &mut NpcInteractionEvent| {
            greeted_clone.lock().unwrap().push(event.player);
            Ok(())
        })
        .unwrap();

        let mut world = MovementSystem::new(&settings());
        let mut report = StepReport::default();
        assert!(world.try_move(&bus, 1, Direction::East, &mut report));
        // (2, 1) holds the NPC.
        assert!(!world.try_move(&bus, 1, Direction::South, &mut report));
        assert_eq!(report.interactions, 1);
        assert_eq!(report.blocked, 1);
        assert_eq!(*greeted.lock().unwrap(), vec![EntityId(2)]);
        assert_eq!(world.position_of(EntityId(2)), Some(TilePosition::new(2, 0)));
    }
}
