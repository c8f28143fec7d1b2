//! The composite's own exported co-simulation v2 ABI (spec.md §6): the
//! `extern "C"` symbols a host's own dynamic-library loader resolves when it
//! treats this crate's `cdylib` artifact as just another slave.
//!
//! Grounded in the teacher's `fmi-export::fmi3::macros::export_fmu!`, which
//! generates this exact shape of trampoline (checked-deref, call into the
//! Rust type, map the result back to a status code) for the fmi3 export
//! side; here it's hand-written against fmi2 rather than macro-generated,
//! since this crate only ever exports one concrete type (`Container`), not a
//! family of user model types the way `fmi-export` does.
#![allow(non_snake_case)]
use crate::error::Status;
use crate::Container;
use fmi_container_sys::{
    fmi2Boolean, fmi2CallbackFunctions, fmi2Component, fmi2Integer, fmi2Real, fmi2Status, fmi2String, fmi2Type,
    fmi2ValueReference, fmi2StatusKind_fmi2LastSuccessfulTime, fmi2StatusKind_fmi2Terminated, fmi2Status_fmi2Error,
    FMI2_TYPES_PLATFORM, FMI2_VERSION,
};
use std::ffi::CStr;

/// # Safety
/// `ptr` must either be null or a live `*mut Container` produced by this
/// module's `fmi2Instantiate` and not yet freed by `fmi2FreeInstance`.
unsafe fn deref<'a>(ptr: fmi2Component) -> Option<&'a Container> {
    (!ptr.is_null()).then(|| unsafe { &*(ptr as *const Container) })
}

unsafe fn c_str_or_empty<'a>(s: fmi2String) -> &'a str {
    if s.is_null() {
        ""
    } else {
        CStr::from_ptr(s).to_str().unwrap_or("")
    }
}

macro_rules! checked {
    ($ptr:expr) => {
        match deref($ptr) {
            Some(c) => c,
            None => return fmi2Status_fmi2Error,
        }
    };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetVersion() -> fmi2String {
    FMI2_VERSION.as_ptr() as fmi2String
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetTypesPlatform() -> fmi2String {
    FMI2_TYPES_PLATFORM.as_ptr() as fmi2String
}

#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "C" fn fmi2Instantiate(
    instance_name: fmi2String,
    fmu_type: fmi2Type,
    guid: fmi2String,
    fmu_resource_location: fmi2String,
    functions: *const fmi2CallbackFunctions,
    visible: fmi2Boolean,
    logging_on: fmi2Boolean,
) -> fmi2Component {
    if functions.is_null() {
        return std::ptr::null_mut();
    }
    let instance_name = c_str_or_empty(instance_name);
    let guid = c_str_or_empty(guid);
    let resource_location = c_str_or_empty(fmu_resource_location);
    // §1/§4.1: the container only ever plays Co-Simulation; any other
    // requested type is still attempted (a host that asks for Model
    // Exchange against a co-simulation-only slave gets whatever failure the
    // config/slave loading itself produces), matching the teacher's own
    // practice of not pre-validating `fmuType` beyond passing it through.
    let _ = fmu_type;

    match Container::instantiate(
        instance_name,
        guid,
        resource_location,
        *functions,
        visible != 0,
        logging_on != 0,
    ) {
        Ok(container) => Box::into_raw(Box::new(container)) as fmi2Component,
        Err(err) => {
            log::error!("fmi2Instantiate failed: {err}");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2FreeInstance(c: fmi2Component) {
    if c.is_null() {
        return;
    }
    drop(Box::from_raw(c as *mut Container));
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetDebugLogging(
    c: fmi2Component,
    logging_on: fmi2Boolean,
    _n_categories: usize,
    _categories: *const fmi2String,
) -> fmi2Status {
    let container = checked!(c);
    container.set_debug_logging(logging_on != 0);
    Status::Ok.into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetupExperiment(
    c: fmi2Component,
    tolerance_defined: fmi2Boolean,
    tolerance: fmi2Real,
    start_time: fmi2Real,
    stop_time_defined: fmi2Boolean,
    stop_time: fmi2Real,
) -> fmi2Status {
    let container = checked!(c);
    let tolerance = (tolerance_defined != 0).then_some(tolerance);
    let stop_time = (stop_time_defined != 0).then_some(stop_time);
    container.setup_experiment(tolerance, start_time, stop_time).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2EnterInitializationMode(c: fmi2Component) -> fmi2Status {
    checked!(c).enter_initialization_mode().into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2ExitInitializationMode(c: fmi2Component) -> fmi2Status {
    checked!(c).exit_initialization_mode().into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Terminate(c: fmi2Component) -> fmi2Status {
    checked!(c).terminate().into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2Reset(c: fmi2Component) -> fmi2Status {
    checked!(c).reset().into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2DoStep(
    c: fmi2Component,
    current_communication_point: fmi2Real,
    communication_step_size: fmi2Real,
    no_set_fmu_state_prior_to_current_point: fmi2Boolean,
) -> fmi2Status {
    checked!(c)
        .do_step(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point != 0,
        )
        .into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2CancelStep(c: fmi2Component) -> fmi2Status {
    let container = checked!(c);
    container.log(Status::Error, "error", "fmi2CancelStep is not supported by this container");
    Status::Error.into()
}

// Real/Integer share the direct Rust<->C representation; Boolean needs a
// narrowing pass because fmi2Boolean is a 4-byte int, not a Rust `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetReal(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Real,
) -> fmi2Status {
    let container = checked!(c);
    let vrs = std::slice::from_raw_parts(vr, nvr);
    let out = std::slice::from_raw_parts_mut(value, nvr);
    container.get_real(vrs, out).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetReal(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Real,
) -> fmi2Status {
    let container = checked!(c);
    let vrs = std::slice::from_raw_parts(vr, nvr);
    let values = std::slice::from_raw_parts(value, nvr);
    container.set_real(vrs, values).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetInteger(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Integer,
) -> fmi2Status {
    let container = checked!(c);
    let vrs = std::slice::from_raw_parts(vr, nvr);
    let out = std::slice::from_raw_parts_mut(value, nvr);
    container.get_integer(vrs, out).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetInteger(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Integer,
) -> fmi2Status {
    let container = checked!(c);
    let vrs = std::slice::from_raw_parts(vr, nvr);
    let values = std::slice::from_raw_parts(value, nvr);
    container.set_integer(vrs, values).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetBoolean(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Boolean,
) -> fmi2Status {
    let container = checked!(c);
    let vrs = std::slice::from_raw_parts(vr, nvr);
    let mut out = vec![false; nvr];
    let status = container.get_boolean(vrs, &mut out);
    let raw = std::slice::from_raw_parts_mut(value, nvr);
    for (r, b) in raw.iter_mut().zip(out) {
        *r = b as fmi2Boolean;
    }
    status.into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetBoolean(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Boolean,
) -> fmi2Status {
    let container = checked!(c);
    let vrs = std::slice::from_raw_parts(vr, nvr);
    let raw = std::slice::from_raw_parts(value, nvr);
    let values: Vec<bool> = raw.iter().map(|&v| v != 0).collect();
    container.set_boolean(vrs, &values).into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetString(
    c: fmi2Component,
    _vr: *const fmi2ValueReference,
    _nvr: usize,
    _value: *mut fmi2String,
) -> fmi2Status {
    unsupported(c, "fmi2GetString")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetString(
    c: fmi2Component,
    _vr: *const fmi2ValueReference,
    _nvr: usize,
    _value: *const fmi2String,
) -> fmi2Status {
    unsupported(c, "fmi2SetString")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetFMUstate(c: fmi2Component, _state: *mut fmi2Component) -> fmi2Status {
    unsupported(c, "fmi2GetFMUstate")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2SetFMUstate(c: fmi2Component, _state: fmi2Component) -> fmi2Status {
    unsupported(c, "fmi2SetFMUstate")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2FreeFMUstate(c: fmi2Component, _state: *mut fmi2Component) -> fmi2Status {
    unsupported(c, "fmi2FreeFMUstate")
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetDirectionalDerivative(
    c: fmi2Component,
    _unknown: *const fmi2ValueReference,
    _n_unknown: usize,
    _known: *const fmi2ValueReference,
    _n_known: usize,
    _dv_known: *const fmi2Real,
    _dv_unknown: *mut fmi2Real,
) -> fmi2Status {
    unsupported(c, "fmi2GetDirectionalDerivative")
}

unsafe fn unsupported(c: fmi2Component, what: &'static str) -> fmi2Status {
    if let Some(container) = deref(c) {
        container.log(Status::Error, "error", &format!("{what} is not supported by this container"));
    }
    Status::Error.into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetRealStatus(c: fmi2Component, kind: fmi2Integer, value: *mut fmi2Real) -> fmi2Status {
    let container = checked!(c);
    if kind == fmi2StatusKind_fmi2LastSuccessfulTime {
        *value = container.last_successful_time();
        Status::Ok.into()
    } else {
        unsupported(c, "fmi2GetRealStatus(kind != fmi2LastSuccessfulTime)")
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetBooleanStatus(c: fmi2Component, kind: fmi2Integer, value: *mut fmi2Boolean) -> fmi2Status {
    let container = checked!(c);
    if kind == fmi2StatusKind_fmi2Terminated {
        *value = container.terminated() as fmi2Boolean;
        Status::Ok.into()
    } else {
        unsupported(c, "fmi2GetBooleanStatus(kind != fmi2Terminated)")
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetIntegerStatus(_c: fmi2Component, _kind: fmi2Integer, _value: *mut fmi2Integer) -> fmi2Status {
    Status::Error.into()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmi2GetStringStatus(c: fmi2Component, _kind: fmi2Integer, _value: *mut fmi2String) -> fmi2Status {
    unsupported(c, "fmi2GetStringStatus")
}
