//! End-to-end dispatch behaviour: ordering, cancellation, filtering, scope
//! lifetime, reentrancy and fault isolation working together.

use crate::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Trace = Arc<Mutex<Vec<String>>>;

fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(trace: &Trace, entry: impl Into<String>) {
    trace.lock().unwrap().push(entry.into());
}

fn entries(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().clone()
}

fn moved(entity: u64) -> MovementCompletedEvent {
    MovementCompletedEvent::new(
        EntityId(entity),
        TilePosition::new(0, 0),
        TilePosition::new(0, 1),
        Direction::South,
    )
}

#[test_log::test]
fn test_priority_ordering_with_registration_tiebreak() {
    let bus = create_event_bus();
    let scope = bus.create_scope("ordering");
    let order = trace();
    let mut rng = fastrand::Rng::with_seed(7);

    let mut registered = Vec::new();
    for index in 0..40 {
        let priority = [priority::VALIDATION, priority::NORMAL, priority::COSMETIC, priority::ANALYTICS]
            [rng.usize(0..4)]
            + rng.i32(-2..=2);
        registered.push((priority, index));
        let order = order.clone();
        bus.subscribe(&scope, priority, move |_: &mut TickEvent| {
            push(&order, index.to_string());
            Ok(())
        })
        .unwrap();
    }

    bus.publish(&mut TickEvent::new(0.016, 1));

    registered.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    let expected: Vec<String> = registered.iter().map(|(_, index)| index.to_string()).collect();
    assert_eq!(entries(&order), expected);
}

#[test_log::test]
fn test_first_cancel_reason_wins_and_dispatch_continues() {
    let bus = create_event_bus();
    let scope = bus.create_scope("veto");
    let reached = Arc::new(AtomicUsize::new(0));

    bus.subscribe(&scope, priority::VALIDATION, |event: &mut CollisionCheckEvent| {
        event.request_cancel(Some("x"));
        Ok(())
    })
    .unwrap();
    bus.subscribe(&scope, priority::NORMAL, |event: &mut CollisionCheckEvent| {
        assert!(event.is_cancelled());
        event.request_cancel(Some("y"));
        Ok(())
    })
    .unwrap();
    for band in [priority::COSMETIC, priority::ANALYTICS] {
        let reached = reached.clone();
        bus.subscribe(&scope, band, move |_: &mut CollisionCheckEvent| {
            reached.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }

    let mut event = CollisionCheckEvent::new(EntityId(1), TilePosition::new(4, 4), Direction::West);
    let outcome = bus.publish(&mut event);

    assert!(event.is_cancelled());
    assert_eq!(event.cancel_reason(), Some("x"));
    assert_eq!(outcome.handlers_invoked, 4);
    assert_eq!(reached.load(Ordering::SeqCst), 2);
}

#[test_log::test]
fn test_entity_filter_exactness() {
    let bus = create_event_bus();
    let scope = bus.create_scope("watcher");
    let hits = Arc::new(Mutex::new(Vec::new()));
    let hits_clone = hits.clone();

    bus.subscribe_entity(&scope, EntityId(5), priority::NORMAL, move |event: &mut MovementCompletedEvent| {
        hits_clone.lock().unwrap().push(event.entity);
        Ok(())
    })
    .unwrap();

    let mut rng = fastrand::Rng::with_seed(42);
    let mut expected = 0;
    for _ in 0..500 {
        let entity = rng.u64(0..10);
        if entity == 5 {
            expected += 1;
        }
        bus.publish(&mut moved(entity));
    }

    let hits = hits.lock().unwrap();
    assert_eq!(hits.len(), expected);
    assert!(hits.iter().all(|id| *id == EntityId(5)));
}

#[test_log::test]
fn test_tile_filter_only_fires_on_that_tile() {
    let bus = create_event_bus();
    let scope = bus.create_scope("pressure_plate");
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();

    bus.subscribe_tile(&scope, TilePosition::new(0, 1), priority::NORMAL, move |_: &mut TileSteppedOnEvent| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    bus.publish(&mut TileSteppedOnEvent::new(EntityId(1), TilePosition::new(0, 1), "plate"));
    bus.publish(&mut TileSteppedOnEvent::new(EntityId(1), TilePosition::new(1, 0), "grass"));
    bus.publish(&mut TileSteppedOnEvent::new(EntityId(2), TilePosition::new(0, 1), "plate"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test_log::test]
fn test_scope_isolation() {
    let bus = create_event_bus();
    let s1 = bus.create_scope("s1");
    let s2 = bus.create_scope("s2");
    let calls = trace();

    for i in 0..3 {
        let calls = calls.clone();
        bus.subscribe(&s1, priority::NORMAL, move |_: &mut TickEvent| {
            push(&calls, format!("s1-{i}"));
            Ok(())
        })
        .unwrap();
    }
    for i in 0..2 {
        let calls = calls.clone();
        bus.subscribe(&s2, priority::NORMAL, move |_: &mut TickEvent| {
            push(&calls, format!("s2-{i}"));
            Ok(())
        })
        .unwrap();
    }

    assert_eq!(s1.dispose(), 3);
    assert_eq!(s1.dispose(), 0);

    let outcome = bus.publish(&mut TickEvent::new(0.016, 1));
    assert_eq!(outcome.handlers_invoked, 2);
    assert_eq!(entries(&calls), vec!["s2-0", "s2-1"]);
    assert_eq!(s2.subscription_count(), 2);
}

#[test_log::test]
fn test_nested_publish_is_depth_first() {
    let bus = create_event_bus();
    let scope = bus.create_scope("nesting");
    let order = trace();
    let handle = Arc::downgrade(&bus);

    let outer_trace = order.clone();
    bus.subscribe(&scope, priority::VALIDATION, move |event: &mut TickEvent| {
        push(&outer_trace, "outer-first:start");
        if let Some(bus) = handle.upgrade() {
            let mut nested = CollisionCheckEvent::new(EntityId(1), TilePosition::new(event.frame as i32, 0), Direction::East);
            bus.publish(&mut nested);
        }
        push(&outer_trace, "outer-first:end");
        Ok(())
    })
    .unwrap();
    let outer_trace = order.clone();
    bus.subscribe(&scope, priority::COSMETIC, move |_: &mut TickEvent| {
        push(&outer_trace, "outer-second");
        Ok(())
    })
    .unwrap();
    for name in ["nested-a", "nested-b"] {
        let nested_trace = order.clone();
        bus.subscribe(&scope, priority::NORMAL, move |_: &mut CollisionCheckEvent| {
            push(&nested_trace, name);
            Ok(())
        })
        .unwrap();
    }

    bus.publish(&mut TickEvent::new(0.016, 3));
    assert_eq!(
        entries(&order),
        vec!["outer-first:start", "nested-a", "nested-b", "outer-first:end", "outer-second"]
    );
}

#[test_log::test]
fn test_scenario_lava_veto_seen_by_later_handler() {
    let bus = create_event_bus();
    let scope = bus.create_scope("lava");
    let observed = trace();

    let h1 = observed.clone();
    bus.subscribe(&scope, priority::VALIDATION, move |event: &mut TileSteppingOnEvent| {
        if event.tile_type == "lava" {
            event.request_cancel(Some("blocked"));
        }
        push(&h1, "h1");
        Ok(())
    })
    .unwrap();
    let h2 = observed.clone();
    bus.subscribe(&scope, priority::NORMAL, move |event: &mut TileSteppingOnEvent| {
        push(&h2, format!("h2 cancelled={}", event.is_cancelled()));
        Ok(())
    })
    .unwrap();

    let mut event = TileSteppingOnEvent::new(EntityId(1), TilePosition::new(2, 2), "lava", Direction::North);
    bus.publish(&mut event);

    assert_eq!(entries(&observed), vec!["h1", "h2 cancelled=true"]);
    assert!(event.is_cancelled());
    assert_eq!(event.cancel_reason(), Some("blocked"));

    let mut event = TileSteppingOnEvent::new(EntityId(1), TilePosition::new(2, 3), "grass", Direction::South);
    bus.publish(&mut event);
    assert!(!event.is_cancelled());
    assert_eq!(entries(&observed).last().map(String::as_str), Some("h2 cancelled=false"));
}

#[test_log::test]
fn test_scenario_global_and_entity_subscribers() {
    let bus = create_event_bus();
    let scope = bus.create_scope("mixed");
    let calls = trace();

    let global = calls.clone();
    bus.subscribe(&scope, priority::NORMAL, move |_: &mut NpcInteractionEvent| {
        push(&global, "G");
        Ok(())
    })
    .unwrap();
    let entity = calls.clone();
    bus.subscribe_entity(&scope, EntityId(7), priority::NORMAL, move |_: &mut NpcInteractionEvent| {
        push(&entity, "E");
        Ok(())
    })
    .unwrap();

    bus.publish(&mut NpcInteractionEvent::new(EntityId(7), EntityId(1), TilePosition::new(5, 5)));
    assert_eq!(entries(&calls), vec!["G", "E"]);

    calls.lock().unwrap().clear();
    bus.publish(&mut NpcInteractionEvent::new(EntityId(9), EntityId(1), TilePosition::new(6, 5)));
    assert_eq!(entries(&calls), vec!["G"]);
}

/// Handler that counts every invocation and then faults per a shared seeded
/// plan. Returns a counter of how often it ran.
fn chaotic_handler<E: Event>(
    bus: &EventBus,
    scope: &SubscriptionScope,
    priority: i32,
    rng: &Arc<Mutex<fastrand::Rng>>,
    faults: &Arc<AtomicUsize>,
) -> Arc<AtomicUsize> {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_clone = runs.clone();
    let rng = rng.clone();
    let faults = faults.clone();
    bus.subscribe(scope, priority, move |_: &mut E| {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let roll = rng.lock().unwrap().u8(0..10);
        match roll {
            0 => {
                faults.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::failed("random failure"))
            }
            1 => {
                faults.fetch_add(1, Ordering::SeqCst);
                panic!("random panic")
            }
            _ => Ok(()),
        }
    })
    .unwrap();
    runs
}

#[test_log::test]
fn test_scenario_random_faults_never_reach_producer() {
    let bus = create_event_bus();
    let scope = bus.create_scope("chaos");
    let rng = Arc::new(Mutex::new(fastrand::Rng::with_seed(0x5eed)));
    let faults = Arc::new(AtomicUsize::new(0));

    let mut tick_runs = Vec::new();
    let mut collision_runs = Vec::new();
    let mut moved_runs = Vec::new();
    for i in 0..50 {
        let priority = (i as i32 % 7) * 100;
        match i % 3 {
            0 => tick_runs.push(chaotic_handler::<TickEvent>(&bus, &scope, priority, &rng, &faults)),
            1 => collision_runs.push(chaotic_handler::<CollisionCheckEvent>(&bus, &scope, priority, &rng, &faults)),
            _ => moved_runs.push(chaotic_handler::<MovementCompletedEvent>(&bus, &scope, priority, &rng, &faults)),
        }
    }

    let mut publisher = fastrand::Rng::with_seed(1000);
    let mut published: HashMap<&'static str, usize> = HashMap::new();
    let mut reported_faults = 0;
    for frame in 0..1000u64 {
        let outcome = match publisher.u8(0..3) {
            0 => bus.publish(&mut TickEvent::new(0.016, frame)),
            1 => bus.publish(&mut CollisionCheckEvent::new(EntityId(frame), TilePosition::new(1, 1), Direction::North)),
            _ => bus.publish(&mut moved(frame)),
        };
        assert!(!outcome.was_aborted());
        reported_faults += outcome.faults.len();
        *published.entry(outcome.event_type).or_default() += 1;
    }

    let expect_runs = |runs: &[Arc<AtomicUsize>], key: &str| {
        let count = published.get(key).copied().unwrap_or(0);
        for counter in runs {
            assert_eq!(counter.load(Ordering::SeqCst), count, "handler for {key} ran a different number of times");
        }
    };
    expect_runs(&tick_runs, "core:tick");
    expect_runs(&collision_runs, "collision:check");
    expect_runs(&moved_runs, "movement:completed");

    assert!(reported_faults > 0);
    assert_eq!(reported_faults, faults.load(Ordering::SeqCst));
    assert_eq!(bus.stats().handler_faults as usize, reported_faults);
    assert_eq!(bus.stats().events_published, 1000);
}

#[test_log::test]
fn test_dispose_mid_dispatch_skips_revoked_handler() {
    let bus = create_event_bus();
    let victim = Arc::new(bus.create_scope("victim"));
    let killer = bus.create_scope("killer");
    let calls = trace();

    let target = victim.clone();
    let killer_calls = calls.clone();
    bus.subscribe(&killer, priority::VALIDATION, move |_: &mut TickEvent| {
        push(&killer_calls, "killer");
        target.dispose();
        Ok(())
    })
    .unwrap();
    let victim_calls = calls.clone();
    bus.subscribe(&victim, priority::NORMAL, move |_: &mut TickEvent| {
        push(&victim_calls, "victim");
        Ok(())
    })
    .unwrap();
    let tail_calls = calls.clone();
    bus.subscribe(&killer, priority::ANALYTICS, move |_: &mut TickEvent| {
        push(&tail_calls, "tail");
        Ok(())
    })
    .unwrap();

    let outcome = bus.publish(&mut TickEvent::new(0.016, 1));
    assert_eq!(entries(&calls), vec!["killer", "tail"]);
    assert_eq!(outcome.handlers_invoked, 2);
    assert_eq!(outcome.handlers_skipped, 1);
    assert!(victim.is_disposed());
}

#[test_log::test]
fn test_handler_can_dispose_its_own_scope() {
    let bus = create_event_bus();
    let scope = Arc::new(bus.create_scope("one_shot"));
    let runs = Arc::new(AtomicUsize::new(0));

    let own = scope.clone();
    let runs_clone = runs.clone();
    bus.subscribe(&scope, priority::NORMAL, move |_: &mut TickEvent| {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        own.dispose();
        Ok(())
    })
    .unwrap();

    bus.publish(&mut TickEvent::new(0.016, 1));
    bus.publish(&mut TickEvent::new(0.016, 2));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscription_count(), 0);
}

#[test_log::test]
fn test_subscribe_mid_dispatch_affects_later_publishes_only() {
    let bus = create_event_bus();
    let scope = Arc::new(bus.create_scope("spawner"));
    let late_runs = Arc::new(AtomicUsize::new(0));
    let handle = Arc::downgrade(&bus);

    let own = scope.clone();
    let late = late_runs.clone();
    bus.subscribe(&scope, priority::VALIDATION, move |event: &mut TickEvent| {
        if event.frame != 1 {
            return Ok(());
        }
        let bus = handle.upgrade().ok_or_else(|| HandlerError::failed("bus dropped"))?;
        let late = late.clone();
        bus.subscribe(&own, priority::ANALYTICS, move |_: &mut TickEvent| {
            late.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .map_err(|e| HandlerError::failed(e.to_string()))?;
        Ok(())
    })
    .unwrap();

    let outcome = bus.publish(&mut TickEvent::new(0.016, 1));
    assert!(outcome.is_clean());
    assert_eq!(outcome.handlers_invoked, 1);
    assert_eq!(late_runs.load(Ordering::SeqCst), 0);

    bus.publish(&mut TickEvent::new(0.016, 2));
    assert_eq!(late_runs.load(Ordering::SeqCst), 1);

    scope.dispose();
}

#[test_log::test]
fn test_cyclic_publish_aborts_chain_and_recovers() {
    let bus = create_event_bus();
    let storm = bus.create_scope("storm");
    let bystander = bus.create_scope("bystander");
    let recursions = Arc::new(AtomicUsize::new(0));
    let bystander_runs = Arc::new(AtomicUsize::new(0));
    let handle = Arc::downgrade(&bus);

    let recursions_clone = recursions.clone();
    bus.subscribe(&storm, priority::VALIDATION, move |event: &mut TickEvent| {
        recursions_clone.fetch_add(1, Ordering::SeqCst);
        if let Some(bus) = handle.upgrade() {
            bus.publish(&mut TickEvent::new(event.delta_seconds, event.frame + 1));
        }
        Ok(())
    })
    .unwrap();
    let bystander_clone = bystander_runs.clone();
    bus.subscribe(&bystander, priority::NORMAL, move |_: &mut TickEvent| {
        bystander_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let outcome = bus.publish(&mut TickEvent::new(0.016, 0));
    assert_eq!(
        outcome.aborted,
        Some(BusError::CyclicPublish {
            event_type: "core:tick",
            max_depth: config::DEFAULT_MAX_PUBLISH_DEPTH,
        })
    );
    assert!(outcome.faults.is_empty());
    assert_eq!(recursions.load(Ordering::SeqCst), config::DEFAULT_MAX_PUBLISH_DEPTH);
    assert_eq!(bystander_runs.load(Ordering::SeqCst), 0);
    assert_eq!(bus.stats().cyclic_publish_aborts, 1);
    assert_eq!(bus.publish_depth::<TickEvent>(), 0);

    storm.dispose();
    let outcome = bus.publish(&mut TickEvent::new(0.016, 1));
    assert!(outcome.is_clean());
    assert_eq!(bystander_runs.load(Ordering::SeqCst), 1);
}

#[test_log::test]
fn test_custom_depth_limit() {
    let bus = Arc::new(
        EventBus::with_config(BusConfig {
            max_publish_depth: 3,
            ..BusConfig::default()
        })
        .unwrap(),
    );
    let scope = bus.create_scope("shallow");
    let depths = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::downgrade(&bus);

    let depths_clone = depths.clone();
    bus.subscribe(&scope, priority::NORMAL, move |_: &mut NpcInteractionEvent| {
        if let Some(bus) = handle.upgrade() {
            let outcome = bus.publish(&mut NpcInteractionEvent::new(EntityId(2), EntityId(1), TilePosition::new(0, 0)));
            depths_clone.lock().unwrap().push((outcome.depth, outcome.was_aborted()));
        }
        Ok(())
    })
    .unwrap();

    let outcome = bus.publish(&mut NpcInteractionEvent::new(EntityId(2), EntityId(1), TilePosition::new(0, 0)));
    assert!(outcome.was_aborted());
    // Innermost refusal first, then each enclosing frame as it unwinds.
    assert_eq!(*depths.lock().unwrap(), vec![(4, true), (3, true), (2, true)]);
}

#[test_log::test]
fn test_compaction_preserves_order() {
    let bus = Arc::new(
        EventBus::with_config(BusConfig {
            compaction_threshold: 1,
            ..BusConfig::default()
        })
        .unwrap(),
    );
    let stable = bus.create_scope("stable");
    let transient = bus.create_scope("transient");
    let order = trace();

    let subscribe = |scope: &SubscriptionScope, priority: i32, name: &'static str| {
        let order = order.clone();
        bus.subscribe(scope, priority, move |_: &mut TickEvent| {
            push(&order, name);
            Ok(())
        })
        .unwrap();
    };
    subscribe(&stable, priority::COSMETIC, "a");
    subscribe(&transient, priority::COSMETIC, "b");
    subscribe(&stable, priority::COSMETIC, "c");
    subscribe(&transient, priority::VALIDATION, "d");
    subscribe(&stable, priority::VALIDATION, "e");

    transient.dispose();
    bus.publish(&mut TickEvent::new(0.016, 1));

    assert_eq!(entries(&order), vec!["e", "a", "c"]);
    assert_eq!(bus.stats().compacted_subscriptions, 2);
}

#[test_log::test]
fn test_scripts_unload_independently() {
    struct Greeter {
        npc: EntityId,
        greetings: Arc<AtomicUsize>,
    }

    impl ScriptModule for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
            let greetings = self.greetings.clone();
            context.subscribe_entity(self.npc, priority::NORMAL, move |_: &mut NpcInteractionEvent| {
                greetings.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
            Ok(())
        }
    }

    struct Guard;

    impl ScriptModule for Guard {
        fn name(&self) -> &str {
            "guard"
        }

        fn register(&mut self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
            context.subscribe(priority::VALIDATION, |event: &mut NpcInteractionEvent| {
                if event.player == EntityId(13) {
                    event.request_cancel(Some("banned"));
                }
                Ok(())
            })?;
            Ok(())
        }
    }

    let bus = create_event_bus();
    let host = ScriptHost::new(bus.clone());
    let greetings = Arc::new(AtomicUsize::new(0));
    host.load(Box::new(Greeter {
        npc: EntityId(100),
        greetings: greetings.clone(),
    }))
    .unwrap();
    host.load(Box::new(Guard)).unwrap();

    let mut event = NpcInteractionEvent::new(EntityId(100), EntityId(13), TilePosition::new(1, 1));
    bus.publish(&mut event);
    assert!(event.is_cancelled());
    assert_eq!(greetings.load(Ordering::SeqCst), 1);

    host.unload("guard").unwrap();
    let mut event = NpcInteractionEvent::new(EntityId(100), EntityId(13), TilePosition::new(1, 1));
    bus.publish(&mut event);
    assert!(!event.is_cancelled());
    assert_eq!(greetings.load(Ordering::SeqCst), 2);
}
