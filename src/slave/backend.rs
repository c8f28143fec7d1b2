//! The per-slave ABI surface the orchestrator needs, and the real
//! dynamic-library-backed implementation of it (spec.md §4.7).
use crate::error::Status;
use fmi_container_sys::{fmi2Boolean, fmi2Component, Binding};

/// Narrow slice of the co-simulation v2 ABI that the orchestrator actually
/// drives. Grounded in the teacher's `Common`/`CoSimulation` traits
/// (`fmi::fmi2::instance::traits`), trimmed to what spec.md §4 calls for —
/// `CancelStep`, FMU-state, directional derivatives, and string I/O are
/// deliberately absent (spec.md §1 Non-goals, §9).
pub trait Backend: Send {
    fn setup_experiment(&mut self, tolerance: Option<f64>, start_time: f64, stop_time_defined: bool, stop_time: f64) -> Status;
    fn enter_initialization_mode(&mut self) -> Status;
    fn exit_initialization_mode(&mut self) -> Status;
    fn terminate(&mut self) -> Status;
    fn reset(&mut self) -> Status;
    fn do_step(&mut self, current_communication_point: f64, communication_step_size: f64, no_rollback: bool) -> Status;

    fn get_real(&mut self, vrs: &[u32], out: &mut [f64]) -> Status;
    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status;
    fn get_integer(&mut self, vrs: &[u32], out: &mut [i32]) -> Status;
    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status;
    fn get_boolean(&mut self, vrs: &[u32], out: &mut [bool]) -> Status;
    fn set_boolean(&mut self, vrs: &[u32], values: &[bool]) -> Status;

    fn last_successful_time(&mut self) -> f64;
    fn terminated(&mut self) -> bool;
}

/// Real [`Backend`] over a loaded shared object. Owns the component handle
/// and frees it on drop, exactly like `Instance::drop` in the teacher.
pub struct DylibBackend {
    binding: Binding,
    component: fmi2Component,
}

// Safety: the container never calls into `component` from two threads at
// once — the go/done rendezvous (spec.md §4.6) and the sequential driver's
// single-thread loop both establish a happens-before relationship around
// every call. `fmi2Component` is an opaque pointer the slave itself
// synchronizes internally against, per the ABI contract.
unsafe impl Send for DylibBackend {}

impl DylibBackend {
    /// # Safety
    /// `binding` must have been loaded from a shared object that correctly
    /// implements the co-simulation v2 ABI.
    pub unsafe fn instantiate(
        binding: Binding,
        instance_name: &str,
        guid: &str,
        resource_location: &str,
        callbacks: &fmi_container_sys::fmi2CallbackFunctions,
        visible: bool,
        logging_on: bool,
    ) -> Result<Self, crate::error::Error> {
        let instance_name = std::ffi::CString::new(instance_name).expect("interior NUL");
        let guid = std::ffi::CString::new(guid).expect("interior NUL");
        let resource_location = std::ffi::CString::new(resource_location).expect("interior NUL");

        let component = (binding.instantiate)(
            instance_name.as_ptr(),
            fmi_container_sys::fmi2Type_fmi2CoSimulation,
            guid.as_ptr(),
            resource_location.as_ptr(),
            callbacks as *const _,
            visible as fmi2Boolean,
            logging_on as fmi2Boolean,
        );
        if component.is_null() {
            return Err(crate::error::Error::Instantiation);
        }
        Ok(DylibBackend { binding, component })
    }
}

impl Drop for DylibBackend {
    fn drop(&mut self) {
        log::trace!("Freeing component {:?}", self.component);
        unsafe { (self.binding.free_instance)(self.component) }
    }
}

impl Backend for DylibBackend {
    fn setup_experiment(&mut self, tolerance: Option<f64>, start_time: f64, stop_time_defined: bool, stop_time: f64) -> Status {
        unsafe {
            (self.binding.setup_experiment)(
                self.component,
                tolerance.is_some() as fmi2Boolean,
                tolerance.unwrap_or(0.0),
                start_time,
                stop_time_defined as fmi2Boolean,
                stop_time,
            )
        }
        .into()
    }

    fn enter_initialization_mode(&mut self) -> Status {
        unsafe { (self.binding.enter_initialization_mode)(self.component) }.into()
    }

    fn exit_initialization_mode(&mut self) -> Status {
        unsafe { (self.binding.exit_initialization_mode)(self.component) }.into()
    }

    fn terminate(&mut self) -> Status {
        unsafe { (self.binding.terminate)(self.component) }.into()
    }

    fn reset(&mut self) -> Status {
        unsafe { (self.binding.reset)(self.component) }.into()
    }

    fn do_step(&mut self, current_communication_point: f64, communication_step_size: f64, no_rollback: bool) -> Status {
        unsafe {
            (self.binding.do_step)(
                self.component,
                current_communication_point,
                communication_step_size,
                no_rollback as fmi2Boolean,
            )
        }
        .into()
    }

    fn get_real(&mut self, vrs: &[u32], out: &mut [f64]) -> Status {
        debug_assert_eq!(vrs.len(), out.len());
        unsafe { (self.binding.get_real)(self.component, vrs.as_ptr(), vrs.len(), out.as_mut_ptr()) }.into()
    }

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status {
        debug_assert_eq!(vrs.len(), values.len());
        unsafe { (self.binding.set_real)(self.component, vrs.as_ptr(), vrs.len(), values.as_ptr()) }.into()
    }

    fn get_integer(&mut self, vrs: &[u32], out: &mut [i32]) -> Status {
        debug_assert_eq!(vrs.len(), out.len());
        unsafe { (self.binding.get_integer)(self.component, vrs.as_ptr(), vrs.len(), out.as_mut_ptr()) }.into()
    }

    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status {
        debug_assert_eq!(vrs.len(), values.len());
        unsafe { (self.binding.set_integer)(self.component, vrs.as_ptr(), vrs.len(), values.as_ptr()) }.into()
    }

    fn get_boolean(&mut self, vrs: &[u32], out: &mut [bool]) -> Status {
        debug_assert_eq!(vrs.len(), out.len());
        let mut raw = vec![0 as fmi2Boolean; vrs.len()];
        let status = unsafe { (self.binding.get_boolean)(self.component, vrs.as_ptr(), vrs.len(), raw.as_mut_ptr()) };
        for (o, r) in out.iter_mut().zip(raw) {
            *o = r != 0;
        }
        status.into()
    }

    fn set_boolean(&mut self, vrs: &[u32], values: &[bool]) -> Status {
        debug_assert_eq!(vrs.len(), values.len());
        let raw: Vec<fmi2Boolean> = values.iter().map(|&v| v as fmi2Boolean).collect();
        unsafe { (self.binding.set_boolean)(self.component, vrs.as_ptr(), vrs.len(), raw.as_ptr()) }.into()
    }

    fn last_successful_time(&mut self) -> f64 {
        let mut value = 0.0;
        unsafe {
            (self.binding.get_real_status)(
                self.component,
                fmi_container_sys::fmi2StatusKind_fmi2LastSuccessfulTime,
                &mut value,
            )
        };
        value
    }

    fn terminated(&mut self) -> bool {
        let mut value: fmi2Boolean = 0;
        unsafe {
            (self.binding.get_boolean_status)(
                self.component,
                fmi_container_sys::fmi2StatusKind_fmi2Terminated,
                &mut value,
            )
        };
        value != 0
    }
}
