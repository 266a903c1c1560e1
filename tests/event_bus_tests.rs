use std::cell::RefCell;
use std::rc::Rc;

use deepforge::actions::{AttackAction, WaitAction};
use deepforge::entity::{Entity, attr_map};
use deepforge::event_bus::{EventHandler, Priority};
use deepforge::{Action, AttrValue, Event, EventBus, EventKind, Session};
use dungeon::pathfinding::{Connectivity, neighbor_offsets};
use pretty_assertions::assert_eq;

struct Recorder {
    name: &'static str,
    priority: Priority,
    seen: Rc<RefCell<Vec<&'static str>>>,
}

impl EventHandler for Recorder {
    fn handle(&mut self, _event: &Event) -> anyhow::Result<()> {
        self.seen.borrow_mut().push(self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

/// 在玩家身边放一个不会行动的木桩
fn session_with_dummy(seed: u64) -> (Session, deepforge::EntityId) {
    let mut session = Session::with_defaults(seed).unwrap();
    let pos = session.world.player.position.unwrap();
    let cell = neighbor_offsets(Connectivity::Eight)
        .into_iter()
        .map(|(dx, dy)| (pos.0 + dx, pos.1 + dy))
        .find(|&p| session.world.is_free(p))
        .unwrap();
    let dummy = session.world.spawn(Entity::monster("dummy", 500, 0, 0).at(cell));
    (session, dummy)
}

#[test]
fn handlers_run_in_priority_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut bus = EventBus::new();
    for (name, priority) in [("low", Priority::Low), ("highest", Priority::Highest), ("normal", Priority::Normal)] {
        bus.subscribe(
            EventKind::LevelUp,
            Box::new(Recorder {
                name,
                priority,
                seen: seen.clone(),
            }),
        );
    }
    bus.publish(Event::new(EventKind::LevelUp, attr_map([("level", 2.into())]), 0));
    assert_eq!(*seen.borrow(), vec!["highest", "normal", "low"]);
}

#[test]
fn panicking_handlers_are_isolated() {
    let seen = Rc::new(RefCell::new(0));
    let mut bus = EventBus::new();
    bus.subscribe_fn(EventKind::GameOver, "boom", |_| panic!("handler exploded"));
    let counter = seen.clone();
    bus.subscribe_fn(EventKind::GameOver, "counter", move |_| {
        *counter.borrow_mut() += 1;
        Ok(())
    });

    bus.publish(Event::new(EventKind::GameOver, attr_map([]), 3));
    bus.publish(Event::new(EventKind::GameOver, attr_map([]), 4));
    assert_eq!(*seen.borrow(), 2);
    assert_eq!(bus.failure_count(), 2);
    assert_eq!(bus.full_history().len(), 2);
}

#[test]
fn session_publishes_action_events_to_subscribers() {
    let (mut session, dummy) = session_with_dummy(12);
    let hits = Rc::new(RefCell::new(Vec::new()));
    let sink = hits.clone();
    session.bus.subscribe_fn(EventKind::DamageDealt, "hits", move |event| {
        if event.data.get("target").and_then(|v| v.as_i64()) == Some(dummy.0 as i64) {
            sink.borrow_mut().push(event.data.get("damage").and_then(|v| v.as_i64()));
        }
        Ok(())
    });
    session.bus.subscribe_fn(EventKind::DamageDealt, "broken", |_| Err(anyhow::anyhow!("no thanks")));

    let me = session.world.player_id();
    let step = session.submit(Action::Attack(AttackAction::new(me, dummy)));
    assert!(step.outcome.is_success());
    assert_eq!(*hits.borrow(), vec![Some(5)]);
    assert!(session.bus.failure_count() >= 1);
    assert_eq!(session.world.get(dummy).unwrap().hp(), 495);
}

#[test]
fn events_carry_the_turn_they_happened_on() {
    let (mut session, dummy) = session_with_dummy(12);
    let me = session.world.player_id();
    session.submit(Action::Wait(WaitAction { actor: me }));
    session.submit(Action::Attack(AttackAction::new(me, dummy)));

    let history = session.bus.full_history();
    let damage = history
        .iter()
        .find(|e| e.kind == EventKind::DamageDealt && e.data.get("target") == Some(&AttrValue::from(dummy)))
        .unwrap();
    assert_eq!(damage.turn, 1);
    let last = history.last().unwrap();
    assert_eq!(last.kind, EventKind::TurnAdvanced);
    assert_eq!(last.turn, 2);
}

#[test]
fn rejected_actions_publish_a_rejection_event() {
    let (mut session, _) = session_with_dummy(12);
    let me = session.world.player_id();
    let step = session.submit(Action::Attack(AttackAction::new(me, me)));
    assert!(!step.outcome.is_success());
    assert!(
        session
            .bus
            .full_history()
            .iter()
            .any(|e| e.kind == EventKind::ActionRejected)
    );
}
