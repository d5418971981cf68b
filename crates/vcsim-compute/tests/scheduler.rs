use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use vcsim_core::{cast, Event, EventHandler, Simulation, EPSILON};

use vcsim_compute::container::Container;
use vcsim_compute::cpu::Cpu;
use vcsim_compute::events::ProcessCompleted;
use vcsim_compute::process::{Process, ProcessId, ProcessState};

struct CompletionSink {
    completed: Rc<RefCell<Vec<(ProcessId, f64)>>>,
}

impl EventHandler for CompletionSink {
    fn on(&mut self, event: Event) {
        let time = event.time;
        cast!(match event.data {
            ProcessCompleted { id } => {
                self.completed.borrow_mut().push((id, time));
            }
        })
    }
}

#[derive(Clone, Serialize)]
struct EvictRequest {}

struct Evictor {
    cpu: Rc<RefCell<Cpu>>,
    target: ProcessId,
}

impl EventHandler for Evictor {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            EvictRequest {} => {
                self.cpu.borrow_mut().remove(self.target);
            }
        })
    }
}

struct Harness {
    sim: Simulation,
    cpu: Rc<RefCell<Cpu>>,
    sink_id: u32,
    completed: Rc<RefCell<Vec<(ProcessId, f64)>>>,
}

fn harness(core_capacities: &[f64]) -> Harness {
    let mut sim = Simulation::new(123);
    let completed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::new(RefCell::new(CompletionSink {
        completed: completed.clone(),
    }));
    let sink_id = sim.add_handler("sink", sink);
    let ctx = sim.create_context("cpu");
    let cpu = Rc::new(RefCell::new(Cpu::new(core_capacities, ctx)));
    sim.add_handler("cpu", cpu.clone());
    Harness {
        sim,
        cpu,
        sink_id,
        completed,
    }
}

fn unbounded(name: &str) -> Rc<RefCell<Container>> {
    Rc::new(RefCell::new(Container::new(name, None)))
}

fn assert_core_invariant(cpu: &Rc<RefCell<Cpu>>) {
    for core in cpu.borrow().cores() {
        assert!(
            core.committed() <= core.capacity() + EPSILON,
            "core committed {} exceeds capacity {}",
            core.committed(),
            core.capacity()
        );
    }
}

#[test]
fn high_priority_process_spans_cores_and_lower_gets_leftovers() {
    let mut h = harness(&[10., 10.]);
    let container = unbounded("c0");
    let p1 = Rc::new(RefCell::new(Process::new(5, 12., container.clone(), h.sink_id)));
    let p2 = Rc::new(RefCell::new(Process::new(3, 10., container.clone(), h.sink_id)));
    h.cpu.borrow_mut().admit(p1.clone());
    h.cpu.borrow_mut().admit(p2.clone());

    // single coalesced recompute for both admissions
    assert_eq!(h.sim.event_count(), 1);
    h.sim.step();

    assert_eq!(p1.borrow().assignments(), &[(0, 10.), (1, 2.)]);
    assert_eq!(p2.borrow().assignments(), &[(1, 8.)]);
    assert_eq!(p1.borrow().state(), ProcessState::Running);
    assert_eq!(p2.borrow().state(), ProcessState::Running);
    assert_core_invariant(&h.cpu);

    h.sim.step_until_no_events();
    let completed = h.completed.borrow();
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0], (p1.borrow().id(), 1.0));
    assert_eq!(completed[1], (p2.borrow().id(), 2.0));
}

#[test]
fn higher_priority_is_saturated_before_lower_gets_anything() {
    let mut h = harness(&[10.]);
    let container = unbounded("c0");
    let p1 = Rc::new(RefCell::new(Process::new(5, 100., container.clone(), h.sink_id)));
    let p2 = Rc::new(RefCell::new(Process::new(1, 100., container.clone(), h.sink_id)));
    h.cpu.borrow_mut().admit(p1.clone());
    h.cpu.borrow_mut().admit(p2.clone());
    h.sim.step();

    assert_eq!(p1.borrow().total_rate(), 10.);
    assert_eq!(p2.borrow().total_rate(), 0.);
    assert_eq!(p2.borrow().state(), ProcessState::Pending);
    assert_core_invariant(&h.cpu);
}

#[test]
fn equal_priority_ties_break_by_admission_order() {
    let mut h = harness(&[10.]);
    let container = unbounded("c0");
    let p1 = Rc::new(RefCell::new(Process::new(2, 100., container.clone(), h.sink_id)));
    let p2 = Rc::new(RefCell::new(Process::new(2, 100., container.clone(), h.sink_id)));
    h.cpu.borrow_mut().admit(p1.clone());
    h.cpu.borrow_mut().admit(p2.clone());
    h.sim.step();

    assert_eq!(p1.borrow().total_rate(), 10.);
    assert_eq!(p2.borrow().total_rate(), 0.);
}

#[test]
fn container_quota_binds_and_throttles() {
    let mut h = harness(&[10.]);
    let container = Rc::new(RefCell::new(Container::new("limited", Some(5.))));
    let p3 = Rc::new(RefCell::new(Process::new(1, 100., container.clone(), h.sink_id)));
    h.cpu.borrow_mut().admit(p3.clone());
    h.sim.step_until_no_events();

    // consumption stops at exactly the quota, allocation drops to zero
    assert_eq!(h.sim.time(), 5.0);
    assert_eq!(container.borrow().consumed(), 5.0);
    assert!(container.borrow().is_exhausted());
    assert_eq!(p3.borrow().state(), ProcessState::Throttled);
    assert_eq!(p3.borrow().total_rate(), 0.);
    assert!((p3.borrow().done_work() - 50.).abs() < 1e-9);
    assert!(h.completed.borrow().is_empty());

    // quota window reset resumes execution until the quota binds again
    container.borrow_mut().reset_quota();
    h.cpu.borrow_mut().on_quota_change(&container);
    h.sim.step_until_no_events();
    assert_eq!(h.sim.time(), 10.0);
    assert_eq!(h.completed.borrow().len(), 1);
    assert_eq!(container.borrow().consumed(), 5.0);
}

#[test]
fn quota_is_apportioned_across_container_processes() {
    let mut h = harness(&[10., 10.]);
    let container = Rc::new(RefCell::new(Container::new("limited", Some(4.))));
    let p1 = Rc::new(RefCell::new(Process::new(1, 1000., container.clone(), h.sink_id)));
    let p2 = Rc::new(RefCell::new(Process::new(1, 1000., container.clone(), h.sink_id)));
    h.cpu.borrow_mut().admit(p1.clone());
    h.cpu.borrow_mut().admit(p2.clone());
    h.sim.step_until_no_events();

    // both processes run until the shared quota is exhausted
    assert!(container.borrow().is_exhausted());
    assert!(container.borrow().consumed() <= 4.0 + EPSILON);
    assert_eq!(p1.borrow().state(), ProcessState::Throttled);
    assert_eq!(p2.borrow().state(), ProcessState::Throttled);
}

#[test]
fn removing_unknown_process_is_a_recorded_anomaly() {
    let mut h = harness(&[10.]);
    let before = h.cpu.borrow().snapshot();
    h.cpu.borrow_mut().remove(424242);
    let after = h.cpu.borrow().snapshot();
    assert_eq!(after.anomalies, before.anomalies + 1);
    assert_eq!(after.pool_size, before.pool_size);
    // no events were produced
    assert_eq!(h.sim.event_count(), 0);
}

#[test]
fn duplicate_admission_is_a_recorded_anomaly() {
    let mut h = harness(&[10.]);
    let container = unbounded("c0");
    let p = Rc::new(RefCell::new(Process::new(1, 10., container.clone(), h.sink_id)));
    let first = h.cpu.borrow_mut().admit(p.clone());
    let second = h.cpu.borrow_mut().admit(p.clone());
    assert_eq!(first, second);
    let snapshot = h.cpu.borrow().snapshot();
    assert_eq!(snapshot.anomalies, 1);
    assert_eq!(snapshot.pool_size, 1);
    assert_eq!(container.borrow().live_processes(), 1);
}

#[test]
fn removed_process_releases_capacity_to_the_rest() {
    let mut h = harness(&[10.]);
    let container = unbounded("c0");
    let p1 = Rc::new(RefCell::new(Process::new(5, 100., container.clone(), h.sink_id)));
    let p2 = Rc::new(RefCell::new(Process::new(1, 10., container.clone(), h.sink_id)));
    let p1_id = h.cpu.borrow_mut().admit(p1);
    h.cpu.borrow_mut().admit(p2.clone());
    h.sim.step();
    assert_eq!(p2.borrow().total_rate(), 0.);

    h.cpu.borrow_mut().remove(p1_id);
    h.sim.step();
    assert_eq!(p2.borrow().total_rate(), 10.);
    assert_eq!(container.borrow().live_processes(), 1);
    assert_core_invariant(&h.cpu);

    h.sim.step_until_no_events();
    assert_eq!(h.completed.borrow().len(), 1);
}

#[test]
fn span_limit_caps_the_number_of_cores_used() {
    let mut h = harness(&[10., 10., 10.]);
    let container = unbounded("c0");
    let p = Rc::new(RefCell::new(Process::with_span_limit(
        1,
        1000.,
        2,
        container.clone(),
        h.sink_id,
    )));
    h.cpu.borrow_mut().admit(p.clone());
    h.sim.step();
    assert_eq!(p.borrow().assignments().len(), 2);
    assert_eq!(p.borrow().total_rate(), 20.);
}

#[test]
fn core_capacity_is_never_exceeded_under_churn() {
    let mut h = harness(&[10., 7., 5.]);
    let container = unbounded("c0");
    for i in 0..8 {
        let p = Rc::new(RefCell::new(Process::new(
            (i % 3) as i64,
            5. + i as f64 * 3.,
            container.clone(),
            h.sink_id,
        )));
        h.cpu.borrow_mut().admit(p);
    }
    while h.sim.step() {
        assert_core_invariant(&h.cpu);
    }
    assert_eq!(h.completed.borrow().len(), 8);
}

#[test]
fn removal_at_a_completion_instant_hits_the_right_process() {
    let mut h = harness(&[10.]);
    let container = unbounded("c0");
    let p1 = Rc::new(RefCell::new(Process::new(5, 10., container.clone(), h.sink_id)));
    let p2 = Rc::new(RefCell::new(Process::new(1, 50., container.clone(), h.sink_id)));
    let p1_id = h.cpu.borrow_mut().admit(p1);
    let p2_id = h.cpu.borrow_mut().admit(p2.clone());

    // the eviction fires at t=1, the same instant p1 runs out of work,
    // and is delivered before the scheduler's own boundary event
    let evictor = Rc::new(RefCell::new(Evictor {
        cpu: h.cpu.clone(),
        target: p2_id,
    }));
    let evictor_id = h.sim.add_handler("evictor", evictor);
    let mut driver = h.sim.create_context("driver");
    driver.emit(EvictRequest {}, evictor_id, 1.0);

    h.sim.step_until_no_events();

    assert_eq!(*h.completed.borrow(), vec![(p1_id, 1.0)]);
    let snapshot = h.cpu.borrow().snapshot();
    assert_eq!(snapshot.pool_size, 0);
    assert_eq!(snapshot.anomalies, 0);
    assert_eq!(p2.borrow().state(), ProcessState::Pending);
    assert_eq!(container.borrow().live_processes(), 0);
}

#[test]
fn identical_inputs_give_identical_schedules() {
    fn run() -> Vec<(ProcessId, f64)> {
        let mut h = harness(&[10., 10.]);
        let container = unbounded("c0");
        for i in 0..6 {
            let p = Rc::new(RefCell::new(Process::new(
                (i % 2) as i64,
                10. + i as f64,
                container.clone(),
                h.sink_id,
            )));
            h.cpu.borrow_mut().admit(p);
        }
        h.sim.step_until_no_events();
        let completed = h.completed.borrow().clone();
        completed
    }
    let first = run();
    assert_eq!(first.len(), 6);
    assert_eq!(first, run());
}

#[test]
#[should_panic(expected = "Configuration error")]
fn cpu_without_cores_is_rejected() {
    let mut sim = Simulation::new(123);
    let ctx = sim.create_context("cpu");
    let _cpu = Cpu::new(&[], ctx);
}

#[test]
#[should_panic(expected = "Configuration error")]
fn negative_container_quota_is_rejected() {
    let _container = Container::new("bad", Some(-1.));
}
