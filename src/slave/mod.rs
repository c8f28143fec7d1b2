//! Per-slave state: vtable, callbacks, wiring, worker, profile (spec.md
//! §3 "Slave", §4.6, §4.7).
mod backend;
#[cfg(test)]
mod stub;

pub use backend::{Backend, DylibBackend};
#[cfg(test)]
pub use stub::StubBackend;

use crate::buffer::SharedBuffers;
use crate::config::{FmuIo, SlaveSpec};
use crate::error::{Error, Status};
use crate::logging::{HostLogger, SlaveLoggerOwner};
use crate::profiler::Profile;
use crate::rendezvous::Rendezvous;
use fmi_container_sys::Binding;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// The `(current_communication_point, step_size, no_rollback)` snapshot
/// published to a worker for one sub-step (spec.md §3 "a snapshot...
/// published to workers for each sub-step").
#[derive(Debug, Clone, Copy)]
pub struct StepParams {
    pub current: f64,
    pub step: f64,
    pub no_rollback: bool,
}

/// Per-slave state (spec.md §3). Built once at load time; the worker thread
/// and the container's drivers share it for the slave's entire lifetime.
pub struct Slave {
    pub name: String,
    pub guid: String,
    pub resource_dir: PathBuf,
    pub io: FmuIo,

    backend: Arc<Mutex<Box<dyn Backend>>>,
    buffers: Arc<SharedBuffers>,

    go: Arc<Rendezvous>,
    done: Arc<Rendezvous>,
    cancel: Arc<AtomicBool>,
    /// Suppresses the very first input-apply so a slave's initial outputs
    /// aren't clobbered by still-zero mailbox slots (spec.md §5, §9). Set on
    /// the first step and never cleared for the slave's lifetime.
    set_input: Arc<AtomicBool>,
    /// `None` while a sub-step is in flight on the worker (between
    /// `publish_and_go` and the matching `done`); `Some` once it lands.
    status: Arc<Mutex<Option<Status>>>,
    published: Arc<Mutex<Option<StepParams>>>,
    profile: Option<Arc<Mutex<Profile>>>,

    worker: Option<JoinHandle<()>>,
    /// Dropped last among the FFI-adjacent fields: see
    /// [`SlaveLoggerOwner`]'s doc comment for why it must outlive `backend`.
    _logger: Option<SlaveLoggerOwner>,
}

fn shared_lib_path(dir: &Path, identifier: &str) -> PathBuf {
    let platform_folder = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("windows", "x86_64") => "win64",
        ("windows", "x86") => "win32",
        ("linux", "x86_64") => "linux64",
        ("linux", "x86") => "linux32",
        ("macos", "x86_64") => "darwin64",
        ("macos", "x86") => "darwin32",
        _ => "unknown",
    };
    let fname = format!("{identifier}{}", std::env::consts::DLL_SUFFIX);
    dir.join("binaries").join(platform_folder).join(fname)
}

impl Slave {
    /// Load a slave from disk and instantiate it (spec.md §4.7 steps 1-5).
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        base_dir: &Path,
        spec: &SlaveSpec,
        io: FmuIo,
        buffers: Arc<SharedBuffers>,
        host_logger: Arc<HostLogger>,
        visible: bool,
        logging_on: bool,
        profiling: bool,
    ) -> Result<Self, Error> {
        let dir = base_dir.join(&spec.directory);
        let lib_path = shared_lib_path(&dir, &spec.identifier);
        log::trace!("Loading shared library {lib_path:?}");
        let binding: Binding = unsafe { Binding::load(&lib_path)? };

        let resource_dir = dir.join("resources");
        let resource_url = format!(
            "file:///{}",
            std::path::absolute(&resource_dir)
                .unwrap_or_else(|_| resource_dir.clone())
                .display()
        );

        let logger = SlaveLoggerOwner::new(host_logger, spec.identifier.clone());
        let callbacks = logger.callbacks();

        let backend = unsafe {
            DylibBackend::instantiate(
                binding,
                &spec.identifier,
                &spec.guid,
                &resource_url,
                &callbacks,
                visible,
                logging_on,
            )?
        };

        let mut slave = Self::from_backend(
            spec.identifier.clone(),
            spec.guid.clone(),
            resource_dir,
            io,
            Box::new(backend),
            buffers,
            profiling,
        );
        slave._logger = Some(logger);
        Ok(slave)
    }

    /// Build a `Slave` around an already-constructed [`Backend`]. The
    /// production path goes through [`Slave::load`]; tests use this
    /// directly with a [`StubBackend`] to exercise routing and scheduling
    /// without a real shared object.
    pub fn from_backend(
        name: String,
        guid: String,
        resource_dir: PathBuf,
        io: FmuIo,
        backend: Box<dyn Backend>,
        buffers: Arc<SharedBuffers>,
        profiling: bool,
    ) -> Self {
        let go = Arc::new(Rendezvous::new());
        let done = Arc::new(Rendezvous::new());
        let cancel = Arc::new(AtomicBool::new(false));
        let set_input = Arc::new(AtomicBool::new(false));
        let status = Arc::new(Mutex::new(Some(Status::Ok)));
        let published: Arc<Mutex<Option<StepParams>>> = Arc::new(Mutex::new(None));
        let backend = Arc::new(Mutex::new(backend));
        let profile = profiling.then(|| Arc::new(Mutex::new(Profile::new())));

        let worker = spawn_worker(WorkerShared {
            backend: backend.clone(),
            buffers: buffers.clone(),
            io: io.clone(),
            go: go.clone(),
            done: done.clone(),
            cancel: cancel.clone(),
            set_input: set_input.clone(),
            status: status.clone(),
            published: published.clone(),
            profile: profile.clone(),
        });

        Slave {
            name,
            guid,
            resource_dir,
            io,
            backend,
            buffers,
            go,
            done,
            cancel,
            set_input,
            status,
            published,
            profile,
            worker: Some(worker),
            _logger: None,
        }
    }

    /// The most recently landed `DoStep` status. Reads as `Status::Ok`
    /// before any step has run, and blocks briefly only on the internal
    /// mutex, never on the worker itself — callers wanting to wait for an
    /// in-flight sub-step must go through [`Slave::join_step`].
    pub fn last_status(&self) -> Status {
        self.status.lock().unwrap().unwrap_or(Status::Ok)
    }

    /// Apply the slave's start-list once, after `EnterInitializationMode`
    /// succeeds (spec.md §4.4).
    pub fn apply_start_overrides(&self) -> Status {
        let mut backend = self.backend.lock().unwrap();
        apply_start_list(&mut **backend, &self.io)
    }

    /// Broadcast one lifecycle call.
    pub fn setup_experiment(&self, tolerance: Option<f64>, start_time: f64, stop_time: Option<f64>) -> Status {
        self.backend.lock().unwrap().setup_experiment(
            tolerance,
            start_time,
            stop_time.is_some(),
            stop_time.unwrap_or(0.0),
        )
    }
    pub fn enter_initialization_mode(&self) -> Status {
        self.backend.lock().unwrap().enter_initialization_mode()
    }
    pub fn exit_initialization_mode(&self) -> Status {
        self.backend.lock().unwrap().exit_initialization_mode()
    }
    pub fn terminate(&self) -> Status {
        self.backend.lock().unwrap().terminate()
    }
    pub fn reset(&self) -> Status {
        self.backend.lock().unwrap().reset()
    }

    pub fn get_real(&self, vr: u32, out: &mut f64) -> Status {
        self.backend.lock().unwrap().get_real(&[vr], std::slice::from_mut(out))
    }
    pub fn set_real(&self, vr: u32, value: f64) -> Status {
        self.backend.lock().unwrap().set_real(&[vr], &[value])
    }
    pub fn get_integer(&self, vr: u32, out: &mut i32) -> Status {
        self.backend.lock().unwrap().get_integer(&[vr], std::slice::from_mut(out))
    }
    pub fn set_integer(&self, vr: u32, value: i32) -> Status {
        self.backend.lock().unwrap().set_integer(&[vr], &[value])
    }
    pub fn get_boolean(&self, vr: u32, out: &mut bool) -> Status {
        self.backend.lock().unwrap().get_boolean(&[vr], std::slice::from_mut(out))
    }
    pub fn set_boolean(&self, vr: u32, value: bool) -> Status {
        self.backend.lock().unwrap().set_boolean(&[vr], &[value])
    }

    pub fn last_successful_time(&self) -> f64 {
        self.backend.lock().unwrap().last_successful_time()
    }
    pub fn terminated(&self) -> bool {
        self.backend.lock().unwrap().terminated()
    }

    /// Sequential driver's direct Set-inputs: container thread reads
    /// `buffers` and writes the slave's inputs (spec.md §4.3, the
    /// container-side variant kept for the sequential path).
    pub fn apply_inputs_sync(&self) {
        if !self.set_input.swap(true, Ordering::SeqCst) {
            return; // first sub-step: suppressed (spec.md §5, §9)
        }
        let buffers = unsafe { self.buffers.get() };
        let mut backend = self.backend.lock().unwrap();
        apply_input_wiring(&mut **backend, &self.io, buffers);
    }

    /// Pulls this slave's outputs into the container buffers (spec.md
    /// §4.5). Called by the container thread after the slave's step
    /// completes, for both drivers.
    pub fn collect_outputs(&self) {
        let buffers = unsafe { self.buffers.get() };
        let mut backend = self.backend.lock().unwrap();
        apply_output_wiring(&mut **backend, &self.io, buffers);
    }

    /// Sequential driver's direct DoStep, optionally profiled (spec.md
    /// §4.3, §4.7).
    pub fn do_step_sync(&self, current: f64, step: f64, no_rollback: bool) -> Status {
        let mut backend = self.backend.lock().unwrap();
        if let Some(profile) = &self.profile {
            let mut profile = profile.lock().unwrap();
            profile.tic_toc(|| backend.do_step(current, step, no_rollback))
        } else {
            backend.do_step(current, step, no_rollback)
        }
    }

    /// Publish this sub-step's parameters and release the worker (spec.md
    /// §4.6 driver step 1-2).
    pub fn publish_and_go(&self, params: StepParams) {
        *self.published.lock().unwrap() = Some(params);
        // Clear to Error before releasing the worker (spec.md §4.6 step 2):
        // a worker that never returns must read back as failed, not as the
        // stale success from the previous sub-step.
        *self.status.lock().unwrap() = Some(Status::Error);
        self.go.signal();
    }

    /// Wait for the worker to finish this sub-step (spec.md §4.6 step 3).
    pub fn join_step(&self) -> Status {
        self.done.wait();
        self.last_status()
    }

    pub fn profile_last_step_secs(&self) -> Option<f64> {
        self.profile.as_ref().map(|p| p.lock().unwrap().last_step_secs())
    }

    /// Flip cancel, release the worker, wait for it to exit, join the
    /// thread (spec.md §4.6 "Cancellation").
    fn unload_worker(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.go.signal();
        self.done.wait();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Slave {
    fn drop(&mut self) {
        self.unload_worker();
    }
}

fn apply_input_wiring(backend: &mut dyn Backend, io: &FmuIo, buffers: &crate::buffer::Buffers) {
    for entry in &io.real.input {
        backend.set_real(&[entry.slave_vr], &[buffers.real[entry.container_vr as usize]]);
    }
    for entry in &io.integer.input {
        backend.set_integer(&[entry.slave_vr], &[buffers.integer[entry.container_vr as usize]]);
    }
    for entry in &io.boolean.input {
        backend.set_boolean(&[entry.slave_vr], &[buffers.boolean[entry.container_vr as usize]]);
    }
    // String I/O is parsed but never wired through (spec.md §9).
}

fn apply_output_wiring(backend: &mut dyn Backend, io: &FmuIo, buffers: &mut crate::buffer::Buffers) {
    for entry in &io.real.output {
        let mut value = 0.0;
        backend.get_real(&[entry.slave_vr], std::slice::from_mut(&mut value));
        buffers.real[entry.container_vr as usize] = value;
    }
    for entry in &io.integer.output {
        let mut value = 0;
        backend.get_integer(&[entry.slave_vr], std::slice::from_mut(&mut value));
        buffers.integer[entry.container_vr as usize] = value;
    }
    for entry in &io.boolean.output {
        let mut value = false;
        backend.get_boolean(&[entry.slave_vr], std::slice::from_mut(&mut value));
        buffers.boolean[entry.container_vr as usize] = value;
    }
}

fn apply_start_list(backend: &mut dyn Backend, io: &FmuIo) -> Status {
    let mut status = Status::Ok;
    for (vr, value) in &io.real.start {
        status = std::cmp::max(status, backend.set_real(&[*vr], &[*value]));
    }
    for (vr, value) in &io.integer.start {
        status = std::cmp::max(status, backend.set_integer(&[*vr], &[*value]));
    }
    for (vr, value) in &io.boolean.start {
        status = std::cmp::max(status, backend.set_boolean(&[*vr], &[*value]));
    }
    status
}

struct WorkerShared {
    backend: Arc<Mutex<Box<dyn Backend>>>,
    buffers: Arc<SharedBuffers>,
    io: FmuIo,
    go: Arc<Rendezvous>,
    done: Arc<Rendezvous>,
    cancel: Arc<AtomicBool>,
    set_input: Arc<AtomicBool>,
    status: Arc<Mutex<Option<Status>>>,
    published: Arc<Mutex<Option<StepParams>>>,
    profile: Option<Arc<Mutex<Profile>>>,
}

/// The worker loop: one per slave, spawned at load time (spec.md §4.6,
/// §4.7). It performs the worker-side variant — Set-inputs itself, then
/// DoStep — which is the path actually reachable with `mt = true` (spec.md
/// §9, "Dual parallel drivers").
fn spawn_worker(shared: WorkerShared) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        shared.go.wait();
        if shared.cancel.load(Ordering::SeqCst) {
            shared.done.signal();
            return;
        }
        let params = shared
            .published
            .lock()
            .unwrap()
            .take()
            .expect("go signaled without a published step");

        if shared.set_input.swap(true, Ordering::SeqCst) {
            // not the first step: apply the in-list from the mailbox buffer
            let buffers = unsafe { shared.buffers.get() };
            let mut backend = shared.backend.lock().unwrap();
            apply_input_wiring(&mut **backend, &shared.io, buffers);
        }

        let status = {
            let mut backend = shared.backend.lock().unwrap();
            if let Some(profile) = &shared.profile {
                let mut profile = profile.lock().unwrap();
                profile.tic_toc(|| backend.do_step(params.current, params.step, params.no_rollback))
            } else {
                backend.do_step(params.current, params.step, params.no_rollback)
            }
        };
        *shared.status.lock().unwrap() = Some(status);
        shared.done.signal();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Buffers, PerKind, SharedBuffers};
    use crate::config::{TypeWiring, WireEntry};

    fn buffers_with_one_real() -> Arc<SharedBuffers> {
        Arc::new(SharedBuffers::new(Buffers::new(PerKind {
            real: 1,
            integer: 0,
            boolean: 0,
            string: 0,
        })))
    }

    #[test_log::test]
    fn first_input_apply_is_suppressed() {
        let buffers = buffers_with_one_real();
        let io = FmuIo {
            real: TypeWiring {
                input: vec![WireEntry {
                    container_vr: 0,
                    slave_vr: 0,
                }],
                start: vec![],
                output: vec![],
            },
            ..Default::default()
        };
        let slave = Slave::from_backend(
            "s".into(),
            "g".into(),
            "/tmp".into(),
            io,
            Box::new(StubBackend::new(1.0)),
            buffers.clone(),
            false,
        );
        unsafe { buffers.get() }.real[0] = 41.0;
        slave.apply_inputs_sync(); // suppressed: backend input stays unset
        let mut out = 0.0;
        slave.get_real(0, &mut out);
        assert_eq!(out, 1.0); // 0 (unset) + offset 1.0, not 41 + 1.0
        slave.apply_inputs_sync(); // now applied
        slave.get_real(0, &mut out);
        assert_eq!(out, 42.0);
    }
}
