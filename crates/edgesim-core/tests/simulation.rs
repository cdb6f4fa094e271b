use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use sugars::{rc, refcell};
use thiserror::Error;

use edgesim_core::{cast, Event, EventHandler, HandlerResult, Simulation, SimulationContext, SimulationError};

#[derive(Clone, Serialize)]
struct Mark {
    label: u32,
}

#[derive(Clone, Serialize)]
struct Rearm {
    remaining: u32,
}

#[derive(Clone, Serialize)]
struct Explode {}

#[derive(Debug, Error)]
#[error("boom at {0}")]
struct Boom(f64);

struct Recorder {
    ctx: SimulationContext,
    seen: Vec<(f64, u32)>,
    pending: u32,
}

impl Recorder {
    fn new(ctx: SimulationContext) -> Self {
        Self {
            ctx,
            seen: Vec::new(),
            pending: 0,
        }
    }
}

impl EventHandler for Recorder {
    fn on(&mut self, event: Event) -> HandlerResult {
        cast!(match event.data {
            Mark { label } => {
                self.seen.push((self.ctx.time(), label));
            }
            Rearm { remaining } => {
                self.pending = remaining;
                if remaining > 0 {
                    self.ctx.emit_self(Rearm { remaining: remaining - 1 }, 0.5)?;
                }
            }
            Explode {} => {
                return Err(Boom(self.ctx.time()).into());
            }
        });
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.pending == 0
    }
}

fn recorder(sim: &mut Simulation, name: &str) -> Rc<RefCell<Recorder>> {
    let recorder = rc!(refcell!(Recorder::new(sim.create_context(name))));
    sim.add_handler(name, recorder.clone());
    recorder
}

#[test]
fn test_events_with_equal_time_are_delivered_in_emission_order() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let client = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    client.emit(Mark { label: 1 }, rec_id, 2.).unwrap();
    client.emit(Mark { label: 2 }, rec_id, 1.).unwrap();
    client.emit(Mark { label: 3 }, rec_id, 2.).unwrap();
    client.emit(Mark { label: 4 }, rec_id, 1.).unwrap();
    client.emit_now(Mark { label: 5 }, rec_id).unwrap();
    sim.run().unwrap();
    assert_eq!(rec.borrow().seen, vec![(0., 5), (1., 2), (1., 4), (2., 1), (2., 3)]);
    assert_eq!(sim.time(), 2.);
}

#[test]
fn test_event_in_the_past_is_rejected() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let client = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    client.emit(Mark { label: 1 }, rec_id, 5.).unwrap();
    sim.step().unwrap();

    let res = client.emit_at(Mark { label: 2 }, rec_id, 4.);
    assert!(matches!(res, Err(SimulationError::InvalidTime { time, current }) if time == 4. && current == 5.));
    assert!(client.emit(Mark { label: 3 }, rec_id, -0.1).is_err());
    assert!(client.emit_at(Mark { label: 4 }, rec_id, f64::NAN).is_err());
    // rejected events do not consume ids
    assert_eq!(sim.event_count(), 1);
    assert!(client.emit_at(Mark { label: 5 }, rec_id, 5.).is_ok());
}

#[test]
fn test_cancelled_events_are_skipped() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let client = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    client.emit(Mark { label: 1 }, rec_id, 1.).unwrap();
    let cancelled = client.emit(Mark { label: 2 }, rec_id, 2.).unwrap();
    client.emit(Mark { label: 3 }, rec_id, 3.).unwrap();
    client.cancel_event(cancelled);
    sim.run().unwrap();
    assert_eq!(rec.borrow().seen, vec![(1., 1), (3., 3)]);
}

#[test]
fn test_rearming_component_runs_to_quiescence() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    rec.borrow().ctx.emit_self_now(Rearm { remaining: 4 }).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.time(), 2.);
    assert!(rec.borrow().is_idle());
}

#[test]
fn test_drained_queue_with_pending_work_is_stalled() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    rec.borrow_mut().pending = 1;
    let res = sim.run();
    assert!(matches!(res, Err(SimulationError::Stalled { component }) if component == "rec"));
}

#[test]
fn test_handler_error_aborts_run() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let client = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    client.emit(Explode {}, rec_id, 1.).unwrap();
    client.emit(Mark { label: 1 }, rec_id, 2.).unwrap();
    match sim.run() {
        Err(SimulationError::Handler { component, source }) => {
            assert_eq!(component, "rec");
            assert_eq!(source.downcast_ref::<Boom>().map(|b| b.0), Some(1.));
        }
        _ => panic!("handler error expected"),
    }
    assert_eq!(sim.time(), 1.);
    assert!(rec.borrow().seen.is_empty());
}

#[test]
fn test_events_without_handler_are_discarded() {
    let mut sim = Simulation::new(123);
    let client = sim.create_context("client");
    let ghost = sim.create_context("ghost");
    client.emit(Mark { label: 1 }, ghost.id(), 1.).unwrap();
    assert!(sim.step().unwrap());
    assert!(!sim.step().unwrap());
    assert_eq!(sim.time(), 1.);
}

#[test]
fn test_wall_clock_limit_interrupts_run() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    rec.borrow().ctx.emit_self_now(Rearm { remaining: 10 }).unwrap();
    assert!(!sim.run_with_wall_clock_limit(Duration::ZERO).unwrap());
    assert_eq!(sim.time(), 0.);
    assert!(sim.run_with_wall_clock_limit(Duration::from_secs(60)).unwrap());
    assert_eq!(sim.time(), 5.);
}

#[test]
fn test_same_seed_gives_same_random_sequence() {
    let mut sim1 = Simulation::new(42);
    let mut sim2 = Simulation::new(42);
    let seq1: Vec<u32> = (0..10).map(|_| sim1.gen_range(0..1000)).collect();
    let seq2: Vec<u32> = (0..10).map(|_| sim2.gen_range(0..1000)).collect();
    assert_eq!(seq1, seq2);
}
