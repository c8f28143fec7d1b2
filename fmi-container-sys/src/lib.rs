//! Raw types and dynamic-library binding for the co-simulation v2 ABI.
//!
//! This crate plays the same role the teacher's `fmi-sys` crate plays for
//! `fmi`: it owns the `#[repr(C)]` surface and the `libloading` plumbing, and
//! exposes nothing but typed function pointers. No orchestration logic lives
//! here.
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use std::ffi::c_void;
use std::os::raw::c_char;
use std::path::Path;

pub type fmi2Component = *mut c_void;
pub type fmi2ComponentEnvironment = *mut c_void;
pub type fmi2FMUstate = *mut c_void;
pub type fmi2Status = i32;
pub type fmi2Type = i32;
pub type fmi2Boolean = i32;
pub type fmi2Real = f64;
pub type fmi2Integer = i32;
pub type fmi2Char = c_char;
pub type fmi2String = *const fmi2Char;
pub type fmi2ValueReference = u32;
pub type fmi2Byte = u8;

pub const fmi2Status_fmi2OK: fmi2Status = 0;
pub const fmi2Status_fmi2Warning: fmi2Status = 1;
pub const fmi2Status_fmi2Discard: fmi2Status = 2;
pub const fmi2Status_fmi2Error: fmi2Status = 3;
pub const fmi2Status_fmi2Fatal: fmi2Status = 4;
pub const fmi2Status_fmi2Pending: fmi2Status = 5;

pub const fmi2Type_fmi2ModelExchange: fmi2Type = 0;
pub const fmi2Type_fmi2CoSimulation: fmi2Type = 1;

pub const fmi2StatusKind_fmi2DoStepStatus: i32 = 0;
pub const fmi2StatusKind_fmi2PendingStatus: i32 = 1;
pub const fmi2StatusKind_fmi2LastSuccessfulTime: i32 = 2;
pub const fmi2StatusKind_fmi2Terminated: i32 = 3;

pub const fmi2True: fmi2Boolean = 1;
pub const fmi2False: fmi2Boolean = 0;

/// `fmi2GetVersion`/`fmi2GetTypesPlatform` return these verbatim when the
/// container itself is the one being queried (`src/abi.rs`), not just
/// resolved off a loaded slave.
pub const FMI2_VERSION: &[u8] = b"2.0\0";
pub const FMI2_TYPES_PLATFORM: &[u8] = b"default\0";

pub type fmi2CallbackLogger = Option<
    unsafe extern "C" fn(
        component_environment: fmi2ComponentEnvironment,
        instance_name: fmi2String,
        status: fmi2Status,
        category: fmi2String,
        message: fmi2String,
    ),
>;
pub type fmi2CallbackAllocateMemory =
    Option<unsafe extern "C" fn(n_obj: usize, size: usize) -> *mut c_void>;
pub type fmi2CallbackFreeMemory = Option<unsafe extern "C" fn(obj: *mut c_void)>;
pub type fmi2StepFinished =
    Option<unsafe extern "C" fn(component_environment: fmi2ComponentEnvironment, status: fmi2Status)>;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct fmi2CallbackFunctions {
    pub logger: fmi2CallbackLogger,
    pub allocateMemory: fmi2CallbackAllocateMemory,
    pub freeMemory: fmi2CallbackFreeMemory,
    pub stepFinished: fmi2StepFinished,
    pub componentEnvironment: fmi2ComponentEnvironment,
}

type FInstantiate = unsafe extern "C" fn(
    instance_name: fmi2String,
    fmu_type: fmi2Type,
    guid: fmi2String,
    resource_location: fmi2String,
    functions: *const fmi2CallbackFunctions,
    visible: fmi2Boolean,
    logging_on: fmi2Boolean,
) -> fmi2Component;
type FFreeInstance = unsafe extern "C" fn(c: fmi2Component);
type FSetupExperiment = unsafe extern "C" fn(
    c: fmi2Component,
    tolerance_defined: fmi2Boolean,
    tolerance: fmi2Real,
    start_time: fmi2Real,
    stop_time_defined: fmi2Boolean,
    stop_time: fmi2Real,
) -> fmi2Status;
type FEnterInitializationMode = unsafe extern "C" fn(c: fmi2Component) -> fmi2Status;
type FExitInitializationMode = unsafe extern "C" fn(c: fmi2Component) -> fmi2Status;
type FTerminate = unsafe extern "C" fn(c: fmi2Component) -> fmi2Status;
type FReset = unsafe extern "C" fn(c: fmi2Component) -> fmi2Status;
type FDoStep = unsafe extern "C" fn(
    c: fmi2Component,
    current_communication_point: fmi2Real,
    communication_step_size: fmi2Real,
    no_set_fmu_state_prior: fmi2Boolean,
) -> fmi2Status;
type FCancelStep = unsafe extern "C" fn(c: fmi2Component) -> fmi2Status;

type FGetReal = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Real,
) -> fmi2Status;
type FGetInteger = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Integer,
) -> fmi2Status;
type FGetBoolean = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2Boolean,
) -> fmi2Status;
type FGetString = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *mut fmi2String,
) -> fmi2Status;
type FSetReal = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Real,
) -> fmi2Status;
type FSetInteger = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Integer,
) -> fmi2Status;
type FSetBoolean = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2Boolean,
) -> fmi2Status;
type FSetString = unsafe extern "C" fn(
    c: fmi2Component,
    vr: *const fmi2ValueReference,
    nvr: usize,
    value: *const fmi2String,
) -> fmi2Status;

type FGetRealStatus = unsafe extern "C" fn(
    c: fmi2Component,
    kind: i32,
    value: *mut fmi2Real,
) -> fmi2Status;
type FGetBooleanStatus = unsafe extern "C" fn(
    c: fmi2Component,
    kind: i32,
    value: *mut fmi2Boolean,
) -> fmi2Status;
type FGetStringStatus = unsafe extern "C" fn(
    c: fmi2Component,
    kind: i32,
    value: *mut fmi2String,
) -> fmi2Status;

type FGetVersion = unsafe extern "C" fn() -> fmi2String;
type FGetTypesPlatform = unsafe extern "C" fn() -> fmi2String;
type FSetDebugLogging = unsafe extern "C" fn(
    c: fmi2Component,
    logging_on: fmi2Boolean,
    n_categories: usize,
    categories: *const fmi2String,
) -> fmi2Status;

type FGetFMUstate = unsafe extern "C" fn(c: fmi2Component, state: *mut fmi2FMUstate) -> fmi2Status;
type FSetFMUstate = unsafe extern "C" fn(c: fmi2Component, state: fmi2FMUstate) -> fmi2Status;
type FFreeFMUstate = unsafe extern "C" fn(c: fmi2Component, state: *mut fmi2FMUstate) -> fmi2Status;
type FGetDirectionalDerivative = unsafe extern "C" fn(
    c: fmi2Component,
    unknown: *const fmi2ValueReference,
    n_unknown: usize,
    known: *const fmi2ValueReference,
    n_known: usize,
    dv_known: *const fmi2Real,
    dv_unknown: *mut fmi2Real,
) -> fmi2Status;

/// The resolved function-pointer table for a single loaded slave.
///
/// Fields named `required_*` must resolve at load time or the load fails
/// (spec.md §4.7); the rest are best-effort and left `None` when the shared
/// object doesn't export them. Callers must not invoke a `None` optional.
pub struct Binding {
    // kept alive so the resolved function pointers below remain valid
    _library: libloading::Library,

    pub instantiate: FInstantiate,
    pub free_instance: FFreeInstance,
    pub setup_experiment: FSetupExperiment,
    pub enter_initialization_mode: FEnterInitializationMode,
    pub exit_initialization_mode: FExitInitializationMode,
    pub terminate: FTerminate,
    pub reset: FReset,
    pub do_step: FDoStep,
    pub get_real: FGetReal,
    pub get_integer: FGetInteger,
    pub get_boolean: FGetBoolean,
    pub set_real: FSetReal,
    pub set_integer: FSetInteger,
    pub set_boolean: FSetBoolean,
    pub get_real_status: FGetRealStatus,
    pub get_boolean_status: FGetBooleanStatus,

    // optional: never called by this container, but resolved if present so a
    // future caller doesn't have to touch the loader again.
    pub get_version: Option<FGetVersion>,
    pub get_types_platform: Option<FGetTypesPlatform>,
    pub set_debug_logging: Option<FSetDebugLogging>,
    pub get_string: Option<FGetString>,
    pub set_string: Option<FSetString>,
    pub cancel_step: Option<FCancelStep>,
    pub get_string_status: Option<FGetStringStatus>,
    pub get_fmu_state: Option<FGetFMUstate>,
    pub set_fmu_state: Option<FSetFMUstate>,
    pub free_fmu_state: Option<FFreeFMUstate>,
    pub get_directional_derivative: Option<FGetDirectionalDerivative>,
}

impl Binding {
    /// Load the shared object at `path` and resolve the required ABI
    /// symbols, per spec.md §4.7 step 2.
    ///
    /// # Safety
    /// The caller must ensure `path` names a shared object implementing the
    /// co-simulation v2 ABI; loading and calling into an unrelated library is
    /// undefined behavior.
    pub unsafe fn load(path: &Path) -> Result<Self, libloading::Error> {
        let library = libloading::Library::new(path)?;

        macro_rules! required {
            ($name:literal) => {
                *library.get::<_>(concat!($name, "\0").as_bytes())?
            };
        }
        macro_rules! optional {
            ($name:literal) => {
                library
                    .get::<_>(concat!($name, "\0").as_bytes())
                    .ok()
                    .map(|s| *s)
            };
        }

        let binding = Binding {
            instantiate: required!("fmi2Instantiate"),
            free_instance: required!("fmi2FreeInstance"),
            setup_experiment: required!("fmi2SetupExperiment"),
            enter_initialization_mode: required!("fmi2EnterInitializationMode"),
            exit_initialization_mode: required!("fmi2ExitInitializationMode"),
            terminate: required!("fmi2Terminate"),
            reset: required!("fmi2Reset"),
            do_step: required!("fmi2DoStep"),
            get_real: required!("fmi2GetReal"),
            get_integer: required!("fmi2GetInteger"),
            get_boolean: required!("fmi2GetBoolean"),
            set_real: required!("fmi2SetReal"),
            set_integer: required!("fmi2SetInteger"),
            set_boolean: required!("fmi2SetBoolean"),
            get_real_status: required!("fmi2GetRealStatus"),
            get_boolean_status: required!("fmi2GetBooleanStatus"),

            get_version: optional!("fmi2GetVersion"),
            get_types_platform: optional!("fmi2GetTypesPlatform"),
            set_debug_logging: optional!("fmi2SetDebugLogging"),
            get_string: optional!("fmi2GetString"),
            set_string: optional!("fmi2SetString"),
            cancel_step: optional!("fmi2CancelStep"),
            get_string_status: optional!("fmi2GetStringStatus"),
            get_fmu_state: optional!("fmi2GetFMUstate"),
            set_fmu_state: optional!("fmi2SetFMUstate"),
            free_fmu_state: optional!("fmi2FreeFMUstate"),
            get_directional_derivative: optional!("fmi2GetDirectionalDerivative"),

            _library: library,
        };
        log::trace!("Resolved co-simulation ABI in {path:?}");
        Ok(binding)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding").finish_non_exhaustive()
    }
}
