//! A deterministic in-process stand-in for a loaded shared object, used by
//! tests (spec.md §8's "stub slave that implements the ABI and copies
//! inputs to outputs with a fixed offset"). Exists because no real `.so` can
//! be built in this exercise; mirrors why the teacher carries `test-data`.
#![cfg(test)]
use super::backend::Backend;
use crate::error::Status;
use std::collections::HashMap;

pub struct StubBackend {
    offset: f64,
    reals: HashMap<u32, f64>,
    call_count: u64,
    fail_at_step: Option<u64>,
    terminated: bool,
    last_successful_time: f64,
}

impl StubBackend {
    pub fn new(offset: f64) -> Self {
        StubBackend {
            offset,
            reals: HashMap::new(),
            call_count: 0,
            fail_at_step: None,
            terminated: false,
            last_successful_time: 0.0,
        }
    }

    pub fn failing_at_step(offset: f64, step: u64) -> Self {
        let mut s = Self::new(offset);
        s.fail_at_step = Some(step);
        s
    }

    pub fn terminating(offset: f64) -> Self {
        let mut s = Self::new(offset);
        s.terminated = true;
        s
    }

    pub fn call_count(&self) -> u64 {
        self.call_count
    }
}

impl Backend for StubBackend {
    fn setup_experiment(&mut self, _tolerance: Option<f64>, _start_time: f64, _stop_time_defined: bool, _stop_time: f64) -> Status {
        Status::Ok
    }

    fn enter_initialization_mode(&mut self) -> Status {
        Status::Ok
    }

    fn exit_initialization_mode(&mut self) -> Status {
        Status::Ok
    }

    fn terminate(&mut self) -> Status {
        Status::Ok
    }

    fn reset(&mut self) -> Status {
        self.reals.clear();
        self.call_count = 0;
        Status::Ok
    }

    fn do_step(&mut self, current_communication_point: f64, communication_step_size: f64, _no_rollback: bool) -> Status {
        self.call_count += 1;
        if Some(self.call_count) == self.fail_at_step {
            return Status::Error;
        }
        self.last_successful_time = current_communication_point + communication_step_size;
        Status::Ok
    }

    fn get_real(&mut self, vrs: &[u32], out: &mut [f64]) -> Status {
        for (vr, o) in vrs.iter().zip(out.iter_mut()) {
            *o = self.reals.get(vr).copied().unwrap_or(0.0) + self.offset;
        }
        Status::Ok
    }

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status {
        for (vr, v) in vrs.iter().zip(values.iter()) {
            self.reals.insert(*vr, *v);
        }
        Status::Ok
    }

    fn get_integer(&mut self, _vrs: &[u32], _out: &mut [i32]) -> Status {
        Status::Ok
    }

    fn set_integer(&mut self, _vrs: &[u32], _values: &[i32]) -> Status {
        Status::Ok
    }

    fn get_boolean(&mut self, _vrs: &[u32], out: &mut [bool]) -> Status {
        for o in out.iter_mut() {
            *o = self.terminated;
        }
        Status::Ok
    }

    fn set_boolean(&mut self, _vrs: &[u32], _values: &[bool]) -> Status {
        Status::Ok
    }

    fn last_successful_time(&mut self) -> f64 {
        self.last_successful_time
    }

    fn terminated(&mut self) -> bool {
        self.terminated
    }
}
