//! The container's own co-simulation v2 ABI surface (spec.md §4.1), mirroring
//! the teacher's `fmi2::instance::traits::{Common, CoSimulation}` split so
//! that a `Container` reads like any other slave to its own host.
use crate::error::{Error, Status};
use crate::Container;

/// Operations common to every FMI2 instance kind. [`Container`] only ever
/// plays Co-Simulation, but the split is kept because that's how the
/// corpus's own ABI layer is organized (spec.md §4.1, §6).
pub trait Common {
    fn set_debug_logging(&self, logging_on: bool, categories: &[&str]) -> Status;

    fn setup_experiment(&self, tolerance: Option<f64>, start_time: f64, stop_time: Option<f64>) -> Status;
    fn enter_initialization_mode(&self) -> Status;
    fn exit_initialization_mode(&self) -> Status;
    fn terminate(&self) -> Status;
    fn reset(&self) -> Status;

    fn get_real(&self, vrs: &[u32], values: &mut [f64]) -> Status;
    fn get_integer(&self, vrs: &[u32], values: &mut [i32]) -> Status;
    fn get_boolean(&self, vrs: &[u32], values: &mut [bool]) -> Status;
    fn get_string(&self, vrs: &[u32], values: &mut [Option<String>]) -> Result<Status, Error>;

    fn set_real(&self, vrs: &[u32], values: &[f64]) -> Status;
    fn set_integer(&self, vrs: &[u32], values: &[i32]) -> Status;
    fn set_boolean(&self, vrs: &[u32], values: &[bool]) -> Status;
    fn set_string(&self, vrs: &[u32], values: &[String]) -> Result<Status, Error>;

    fn get_fmu_state(&self) -> Result<Status, Error>;
    fn set_fmu_state(&self) -> Result<Status, Error>;

    fn get_directional_derivative(
        &self,
        unknown_vrs: &[u32],
        known_vrs: &[u32],
        dv_known_values: &[f64],
        dv_unknown_values: &mut [f64],
    ) -> Result<Status, Error>;
}

/// Co-Simulation-specific operations (spec.md §4.1, §4.2).
pub trait CoSimulation: Common {
    fn do_step(&self, current_communication_point: f64, communication_step_size: f64, no_rollback: bool) -> Status;

    fn cancel_step(&self) -> Result<Status, Error>;

    /// `GetRealStatus(fmi2LastSuccessfulTime)`.
    fn last_successful_time(&self) -> f64;

    /// `GetBooleanStatus(fmi2Terminated)`.
    fn terminated(&self) -> bool;
}

impl Common for Container {
    fn set_debug_logging(&self, logging_on: bool, _categories: &[&str]) -> Status {
        self.set_debug_logging(logging_on);
        Status::Ok
    }

    fn setup_experiment(&self, tolerance: Option<f64>, start_time: f64, stop_time: Option<f64>) -> Status {
        Container::setup_experiment(self, tolerance, start_time, stop_time)
    }
    fn enter_initialization_mode(&self) -> Status {
        Container::enter_initialization_mode(self)
    }
    fn exit_initialization_mode(&self) -> Status {
        Container::exit_initialization_mode(self)
    }
    fn terminate(&self) -> Status {
        Container::terminate(self)
    }
    fn reset(&self) -> Status {
        Container::reset(self)
    }

    fn get_real(&self, vrs: &[u32], values: &mut [f64]) -> Status {
        Container::get_real(self, vrs, values)
    }
    fn get_integer(&self, vrs: &[u32], values: &mut [i32]) -> Status {
        Container::get_integer(self, vrs, values)
    }
    fn get_boolean(&self, vrs: &[u32], values: &mut [bool]) -> Status {
        Container::get_boolean(self, vrs, values)
    }
    fn get_string(&self, _vrs: &[u32], _values: &mut [Option<String>]) -> Result<Status, Error> {
        Err(Error::Unsupported("string variables are parsed but never wired through"))
    }

    fn set_real(&self, vrs: &[u32], values: &[f64]) -> Status {
        Container::set_real(self, vrs, values)
    }
    fn set_integer(&self, vrs: &[u32], values: &[i32]) -> Status {
        Container::set_integer(self, vrs, values)
    }
    fn set_boolean(&self, vrs: &[u32], values: &[bool]) -> Status {
        Container::set_boolean(self, vrs, values)
    }
    fn set_string(&self, _vrs: &[u32], _values: &[String]) -> Result<Status, Error> {
        Err(Error::Unsupported("string variables are parsed but never wired through"))
    }

    fn get_fmu_state(&self) -> Result<Status, Error> {
        Err(Error::Unsupported("FMU state serialization"))
    }
    fn set_fmu_state(&self) -> Result<Status, Error> {
        Err(Error::Unsupported("FMU state serialization"))
    }

    fn get_directional_derivative(
        &self,
        _unknown_vrs: &[u32],
        _known_vrs: &[u32],
        _dv_known_values: &[f64],
        _dv_unknown_values: &mut [f64],
    ) -> Result<Status, Error> {
        Err(Error::Unsupported("directional derivatives"))
    }
}

impl CoSimulation for Container {
    fn do_step(&self, current_communication_point: f64, communication_step_size: f64, no_rollback: bool) -> Status {
        Container::do_step(self, current_communication_point, communication_step_size, no_rollback)
    }

    fn cancel_step(&self) -> Result<Status, Error> {
        Err(Error::Unsupported("cancel_step: the container never starts an asynchronous step"))
    }

    fn last_successful_time(&self) -> f64 {
        Container::last_successful_time(self)
    }

    fn terminated(&self) -> bool {
        Container::terminated(self)
    }
}
