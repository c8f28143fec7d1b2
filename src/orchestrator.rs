//! The fixed-step co-simulation scheduler (spec.md §4.2-§4.6): sub-step
//! loop, sequential driver, parallel (rendezvous) driver, and the
//! initialization-override pass.
use crate::buffer::SharedBuffers;
use crate::error::Status;
use crate::slave::{Slave, StepParams};

/// Scheduler parameters the container tracks across `DoStep` calls (spec.md
/// §3, "scheduler parameters").
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    /// Internal step size `h`.
    pub h: f64,
    /// Alignment tolerance `τ`.
    pub tolerance: f64,
    /// Container-tracked time `t`.
    pub time: f64,
    pub mt: bool,
    pub profiling: bool,
}

impl Scheduler {
    pub fn new(h: f64, mt: bool, profiling: bool) -> Self {
        Scheduler {
            h,
            tolerance: 0.0,
            time: 0.0,
            mt,
            profiling,
        }
    }
}

/// `DoStep(t0, H, noRollback)` (spec.md §4.2).
pub fn do_step(
    slaves: &[Slave],
    buffers: &SharedBuffers,
    sched: &mut Scheduler,
    t0: f64,
    communication_step: f64,
    no_rollback: bool,
) -> Status {
    let h = sched.h;
    let tau = sched.tolerance;

    // Early-return guard: the host is requesting a horizon already covered.
    if t0 + communication_step + tau < sched.time + h {
        return Status::Ok;
    }

    let mut current = sched.time;
    while current + h < t0 + communication_step + tau {
        let status = internal_step(slaves, current, h, no_rollback, sched.mt);
        if status != Status::Ok {
            return status;
        }
        if sched.profiling {
            record_profile_slots(slaves, buffers);
        }
        current += h;
    }
    sched.time = current;

    if (t0 + communication_step - current).abs() > tau {
        log::warn!("communication step H is not an integer multiple of the internal step h");
        Status::Warning
    } else {
        Status::Ok
    }
}

fn internal_step(slaves: &[Slave], current: f64, h: f64, no_rollback: bool, mt: bool) -> Status {
    if mt {
        internal_step_parallel(slaves, current, h, no_rollback)
    } else {
        internal_step_sequential(slaves, current, h, no_rollback)
    }
}

/// Sequential driver (spec.md §4.3): container-side Set-inputs, DoStep,
/// Get-outputs, one slave at a time in declaration order.
fn internal_step_sequential(slaves: &[Slave], current: f64, h: f64, no_rollback: bool) -> Status {
    for slave in slaves {
        slave.apply_inputs_sync();
        let status = slave.do_step_sync(current, h, no_rollback);
        if status.is_error() {
            return status;
        }
        slave.collect_outputs();
    }
    Status::Ok
}

/// Parallel (mt) driver (spec.md §4.6): publish the step to every slave's
/// worker, release them all, then collect. Set-inputs happens on the
/// worker side, not here — that's what makes this variant the one that
/// actually parallelizes work within a sub-step.
fn internal_step_parallel(slaves: &[Slave], current: f64, h: f64, no_rollback: bool) -> Status {
    let params = StepParams {
        current,
        step: h,
        no_rollback,
    };
    for slave in slaves {
        slave.publish_and_go(params);
    }
    for slave in slaves {
        let status = slave.join_step();
        if status != Status::Ok {
            return status;
        }
    }
    for slave in slaves {
        slave.collect_outputs();
    }
    Status::Ok
}

/// Slave k's last-step wall-clock time is written into container real
/// buffer slot k (spec.md §4.7, §9 "Profiling output slot" — this
/// deliberately collides with any container-local real actually mapped at
/// index k; preserved as-is).
fn record_profile_slots(slaves: &[Slave], buffers: &SharedBuffers) {
    let buf = unsafe { buffers.get() };
    for (k, slave) in slaves.iter().enumerate() {
        if let (Some(elapsed), Some(slot)) = (slave.profile_last_step_secs(), buf.real.get_mut(k)) {
            *slot = elapsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffers, PerKind};
    use crate::config::{FmuIo, TypeWiring, WireEntry};
    use crate::slave::StubBackend;
    use std::sync::Arc;

    fn make_slaves(offsets: &[f64]) -> (Vec<Slave>, Arc<SharedBuffers>) {
        let buffers = Arc::new(SharedBuffers::new(Buffers::new(PerKind {
            real: 1,
            integer: 0,
            boolean: 0,
            string: 0,
        })));
        let mut slaves = Vec::new();
        for (i, &offset) in offsets.iter().enumerate() {
            let io = if i == 0 {
                FmuIo {
                    real: TypeWiring {
                        input: vec![],
                        start: vec![],
                        output: vec![WireEntry {
                            container_vr: 0,
                            slave_vr: 0,
                        }],
                    },
                    ..Default::default()
                }
            } else {
                FmuIo {
                    real: TypeWiring {
                        input: vec![WireEntry {
                            container_vr: 0,
                            slave_vr: 0,
                        }],
                        start: vec![],
                        output: vec![],
                    },
                    ..Default::default()
                }
            };
            slaves.push(Slave::from_backend(
                format!("s{i}"),
                format!("g{i}"),
                "/tmp".into(),
                io,
                Box::new(StubBackend::new(offset)),
                buffers.clone(),
                false,
            ));
        }
        (slaves, buffers)
    }

    /// Scenario 1 (spec.md §8): S1(+1) -> S2(+10), Jacobi one-step delay.
    fn run_scenario_1(mt: bool) -> Vec<f64> {
        let (slaves, buffers) = make_slaves(&[1.0, 10.0]);
        let mut sched = Scheduler::new(0.1, mt, false);
        sched.tolerance = 1e-8;
        let mut readings = Vec::new();
        unsafe { buffers.get() }.real[0] = 0.0;
        for _ in 0..10 {
            let status = do_step(&slaves, &buffers, &mut sched, sched.time, 0.1, false);
            assert_eq!(status, Status::Ok);
            readings.push(unsafe { buffers.get() }.real[0]);
        }
        readings
    }

    #[test_log::test]
    fn jacobi_delay_sequence_matches_sequential() {
        assert_eq!(run_scenario_1(false), vec![0.0, 1.0, 11.0, 12.0, 22.0, 23.0, 33.0, 34.0, 44.0, 45.0]);
    }

    #[test_log::test]
    fn mono_multi_equivalence() {
        assert_eq!(run_scenario_1(false), run_scenario_1(true));
    }

    /// Scenario 2 (spec.md §8): H=0.35, h=0.1 -> 3 sub-steps, Warning.
    #[test_log::test]
    fn alignment_warning_reports_warning_status() {
        let (slaves, buffers) = make_slaves(&[0.0]);
        let mut sched = Scheduler::new(0.1, false, false);
        sched.tolerance = 1e-8;
        let status = do_step(&slaves, &buffers, &mut sched, 0.0, 0.35, false);
        assert_eq!(status, Status::Warning);
        assert_eq!(slaves[0].last_status(), Status::Ok);
    }

    /// Scenario 3 (spec.md §8): H=0.05, h=0.1 -> zero sub-steps, time unchanged.
    #[test_log::test]
    fn short_communication_step_runs_no_substeps() {
        let (slaves, buffers) = make_slaves(&[0.0]);
        let mut sched = Scheduler::new(0.1, false, false);
        sched.tolerance = 1e-8;
        let status = do_step(&slaves, &buffers, &mut sched, 0.0, 0.05, false);
        assert_eq!(status, Status::Ok);
        assert_eq!(sched.time, 0.0);
    }

    /// Slave-error propagation (spec.md §8 scenario 5): a failing slave
    /// short-circuits the remaining slaves in that sub-step.
    #[test_log::test]
    fn slave_error_short_circuits_remaining_slaves() {
        let buffers = Arc::new(SharedBuffers::new(Buffers::new(PerKind {
            real: 0,
            integer: 0,
            boolean: 0,
            string: 0,
        })));
        let failing = Slave::from_backend(
            "failing".into(),
            "g".into(),
            "/tmp".into(),
            FmuIo::default(),
            Box::new(StubBackend::failing_at_step(0.0, 1)),
            buffers.clone(),
            false,
        );
        let untouched = Slave::from_backend(
            "untouched".into(),
            "g".into(),
            "/tmp".into(),
            FmuIo::default(),
            Box::new(StubBackend::new(0.0)),
            buffers.clone(),
            false,
        );
        let slaves = vec![failing, untouched];
        let mut sched = Scheduler::new(0.1, false, false);
        sched.tolerance = 1e-8;
        let status = do_step(&slaves, &buffers, &mut sched, 0.0, 0.1, false);
        assert_eq!(status, Status::Error);
    }
}
