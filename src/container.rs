//! The composite co-simulation component: owns the slaves, buffers,
//! translation tables and scheduler, and is itself driven like a single
//! slave (spec.md §3, §4.1).
use crate::buffer::{Buffers, SharedBuffers};
use crate::config::ContainerConfig;
use crate::error::{Error, Status};
use crate::logging::HostLogger;
use crate::orchestrator::{self, Scheduler};
use crate::router::PortTables;
use crate::slave::Slave;
use crate::VarKind;
use fmi_container_sys::fmi2CallbackFunctions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use url::Url;

/// Bridges a primitive type to its buffer slot and slave accessor, so
/// `Get`/`Set` need one generic body instead of three near-identical copies
/// (spec.md §9, "typed variant... per primitive kind").
trait Primitive: Copy {
    const KIND: VarKind;
    fn read_local(buffers: &Buffers, vr: usize) -> Self;
    fn write_local(buffers: &mut Buffers, vr: usize, value: Self);
    fn read_slave(slave: &Slave, vr: u32, out: &mut Self) -> Status;
    fn write_slave(slave: &Slave, vr: u32, value: Self) -> Status;
}

impl Primitive for f64 {
    const KIND: VarKind = VarKind::Real;
    fn read_local(buffers: &Buffers, vr: usize) -> Self {
        buffers.real[vr]
    }
    fn write_local(buffers: &mut Buffers, vr: usize, value: Self) {
        buffers.real[vr] = value;
    }
    fn read_slave(slave: &Slave, vr: u32, out: &mut Self) -> Status {
        slave.get_real(vr, out)
    }
    fn write_slave(slave: &Slave, vr: u32, value: Self) -> Status {
        slave.set_real(vr, value)
    }
}

impl Primitive for i32 {
    const KIND: VarKind = VarKind::Integer;
    fn read_local(buffers: &Buffers, vr: usize) -> Self {
        buffers.integer[vr]
    }
    fn write_local(buffers: &mut Buffers, vr: usize, value: Self) {
        buffers.integer[vr] = value;
    }
    fn read_slave(slave: &Slave, vr: u32, out: &mut Self) -> Status {
        slave.get_integer(vr, out)
    }
    fn write_slave(slave: &Slave, vr: u32, value: Self) -> Status {
        slave.set_integer(vr, value)
    }
}

impl Primitive for bool {
    const KIND: VarKind = VarKind::Boolean;
    fn read_local(buffers: &Buffers, vr: usize) -> Self {
        buffers.boolean[vr]
    }
    fn write_local(buffers: &mut Buffers, vr: usize, value: Self) {
        buffers.boolean[vr] = value;
    }
    fn read_slave(slave: &Slave, vr: u32, out: &mut Self) -> Status {
        slave.get_boolean(vr, out)
    }
    fn write_slave(slave: &Slave, vr: u32, value: Self) -> Status {
        slave.set_boolean(vr, value)
    }
}

pub struct Container {
    name: String,
    #[allow(dead_code)]
    guid: String,
    resource_dir: PathBuf,
    slaves: Vec<Slave>,
    buffers: Arc<SharedBuffers>,
    port_tables: PortTables,
    scheduler: Mutex<Scheduler>,
    logger: Arc<HostLogger>,
}

impl Container {
    /// `Instantiate` (spec.md §4.1): parse `container.txt` at the resource
    /// directory denoted by `resource_url`, load and instantiate every
    /// declared slave.
    pub fn instantiate(
        instance_name: &str,
        guid: &str,
        resource_url: &str,
        callbacks: fmi2CallbackFunctions,
        visible: bool,
        logging_on: bool,
    ) -> Result<Self, Error> {
        let resource_dir = Url::parse(resource_url)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| Error::Config {
                line: 0,
                message: format!("resource location {resource_url:?} is not a file:// path"),
            })?;

        let config: ContainerConfig = crate::config::parse_file(&resource_dir.join("container.txt"))?;

        let buffers = Arc::new(SharedBuffers::new(Buffers::new(config.n_local)));
        let host_logger = Arc::new(HostLogger::new(callbacks, instance_name, logging_on));

        let mut slaves = Vec::with_capacity(config.slaves.len());
        for (spec, io) in config.slaves.iter().zip(config.wiring.into_iter()) {
            let slave = Slave::load(
                &resource_dir,
                spec,
                io,
                buffers.clone(),
                host_logger.clone(),
                visible,
                logging_on,
                config.profiling,
            )?;
            slaves.push(slave);
        }

        Ok(Container {
            name: instance_name.to_owned(),
            guid: guid.to_owned(),
            resource_dir,
            slaves,
            buffers,
            port_tables: config.port_tables,
            scheduler: Mutex::new(Scheduler::new(config.time_step, config.mt, config.profiling)),
            logger: host_logger,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_dir(&self) -> &std::path::Path {
        &self.resource_dir
    }

    /// `SetupExperiment` (spec.md §4.1): `stop_time_defined` is forced
    /// false when forwarded to slaves, but `tolerance` is captured for the
    /// orchestrator's own alignment check.
    pub fn setup_experiment(&self, tolerance: Option<f64>, start_time: f64, _stop_time: Option<f64>) -> Status {
        self.scheduler.lock().unwrap().tolerance = tolerance.unwrap_or(1e-9);
        for slave in &self.slaves {
            let status = slave.setup_experiment(tolerance, start_time, None);
            if status.is_error() {
                return status;
            }
        }
        Status::Ok
    }

    /// `EnterInitializationMode` (spec.md §4.1, §4.4): broadcast in
    /// declaration order; a slave's start-list overrides are applied right
    /// after that slave's own call succeeds.
    pub fn enter_initialization_mode(&self) -> Status {
        for slave in &self.slaves {
            let status = slave.enter_initialization_mode();
            if status.is_error() {
                return status;
            }
            let override_status = slave.apply_start_overrides();
            if override_status.is_error() {
                return override_status;
            }
        }
        Status::Ok
    }

    pub fn exit_initialization_mode(&self) -> Status {
        self.broadcast(Slave::exit_initialization_mode)
    }

    pub fn terminate(&self) -> Status {
        self.broadcast(Slave::terminate)
    }

    pub fn reset(&self) -> Status {
        self.broadcast(Slave::reset)
    }

    fn broadcast(&self, f: impl Fn(&Slave) -> Status) -> Status {
        for slave in &self.slaves {
            let status = f(slave);
            if status.is_error() {
                return status;
            }
        }
        Status::Ok
    }

    /// `DoStep` (spec.md §4.2).
    pub fn do_step(&self, current_communication_point: f64, communication_step_size: f64, no_rollback: bool) -> Status {
        let mut scheduler = self.scheduler.lock().unwrap();
        orchestrator::do_step(
            &self.slaves,
            &self.buffers,
            &mut scheduler,
            current_communication_point,
            communication_step_size,
            no_rollback,
        )
    }

    pub fn get_real(&self, vrs: &[u32], out: &mut [f64]) -> Status {
        self.get_typed(vrs, out)
    }
    pub fn set_real(&self, vrs: &[u32], values: &[f64]) -> Status {
        self.set_typed(vrs, values)
    }
    pub fn get_integer(&self, vrs: &[u32], out: &mut [i32]) -> Status {
        self.get_typed(vrs, out)
    }
    pub fn set_integer(&self, vrs: &[u32], values: &[i32]) -> Status {
        self.set_typed(vrs, values)
    }
    pub fn get_boolean(&self, vrs: &[u32], out: &mut [bool]) -> Status {
        self.get_typed(vrs, out)
    }
    pub fn set_boolean(&self, vrs: &[u32], values: &[bool]) -> Status {
        self.set_typed(vrs, values)
    }

    fn get_typed<T: Primitive>(&self, vrs: &[u32], out: &mut [T]) -> Status {
        for (&vr, slot) in vrs.iter().zip(out.iter_mut()) {
            let entry = match self.port_tables.entry(T::KIND, vr) {
                Ok(entry) => *entry,
                Err(_) => return Status::Error,
            };
            if entry.is_local() {
                let buffers = unsafe { self.buffers.get() };
                *slot = T::read_local(buffers, vr as usize);
            } else {
                let slave = &self.slaves[entry.slave_index as usize];
                let status = T::read_slave(slave, entry.slave_vr, slot);
                if status.is_error() {
                    return status;
                }
            }
        }
        Status::Ok
    }

    fn set_typed<T: Primitive>(&self, vrs: &[u32], values: &[T]) -> Status {
        for (&vr, &value) in vrs.iter().zip(values.iter()) {
            let entry = match self.port_tables.entry(T::KIND, vr) {
                Ok(entry) => *entry,
                Err(_) => return Status::Error,
            };
            if entry.is_local() {
                let buffers = unsafe { self.buffers.get() };
                T::write_local(buffers, vr as usize, value);
            } else {
                let slave = &self.slaves[entry.slave_index as usize];
                let status = T::write_slave(slave, entry.slave_vr, value);
                if status.is_error() {
                    return status;
                }
            }
        }
        Status::Ok
    }

    /// `GetRealStatus(fmi2LastSuccessfulTime)` (spec.md §4.1): the minimum
    /// across slaves, since the composite hasn't logically progressed past
    /// the slowest one.
    pub fn last_successful_time(&self) -> f64 {
        self.slaves
            .iter()
            .map(|s| s.last_successful_time())
            .fold(f64::INFINITY, f64::min)
    }

    /// `GetBooleanStatus(fmi2Terminated)` (spec.md §4.1): OR across slaves.
    pub fn terminated(&self) -> bool {
        self.slaves.iter().any(|s| s.terminated())
    }

    pub fn log(&self, status: Status, category: &str, message: &str) {
        self.logger.log(status, category, message);
    }

    pub fn set_debug_logging(&self, debug: bool) {
        self.logger.set_debug(debug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PerKind;
    use crate::config::FmuIo;
    use crate::router::{PortEntry, PortTables};
    use crate::slave::StubBackend;

    fn test_container(offsets: &[f64]) -> Container {
        let buffers = Arc::new(SharedBuffers::new(Buffers::new(PerKind {
            real: offsets.len(),
            integer: 0,
            boolean: 0,
            string: 0,
        })));
        let mut slaves = Vec::new();
        let mut real_table = Vec::new();
        for (i, &offset) in offsets.iter().enumerate() {
            slaves.push(Slave::from_backend(
                format!("s{i}"),
                format!("g{i}"),
                "/tmp".into(),
                FmuIo::default(),
                Box::new(StubBackend::new(offset)),
                buffers.clone(),
                false,
            ));
            real_table.push(PortEntry {
                slave_index: i as isize,
                slave_vr: 0,
            });
        }
        Container {
            name: "test".into(),
            guid: "g".into(),
            resource_dir: "/tmp".into(),
            slaves,
            buffers,
            port_tables: PortTables {
                tables: PerKind {
                    real: real_table,
                    integer: vec![],
                    boolean: vec![],
                    string: vec![],
                },
            },
            scheduler: Mutex::new(Scheduler::new(0.1, false, false)),
            logger: Arc::new(HostLogger::new(
                fmi2CallbackFunctions {
                    logger: None,
                    allocateMemory: None,
                    freeMemory: None,
                    stepFinished: None,
                    componentEnvironment: std::ptr::null_mut(),
                },
                "test",
                false,
            )),
        }
    }

    /// Terminated-OR (spec.md §8): (false, true) -> true.
    #[test_log::test]
    fn terminated_is_or_across_slaves() {
        let mut container = test_container(&[0.0, 0.0]);
        container.slaves[1] = Slave::from_backend(
            "terminating".into(),
            "g".into(),
            "/tmp".into(),
            FmuIo::default(),
            Box::new(StubBackend::terminating(0.0)),
            container.buffers.clone(),
            false,
        );
        assert!(container.terminated());
    }

    #[test_log::test]
    fn last_successful_time_is_minimum_across_slaves() {
        let container = test_container(&[0.0, 0.0]);
        container.setup_experiment(None, 0.0, None);
        container.do_step(0.0, 0.1, false);
        assert_eq!(container.last_successful_time(), 0.1);
    }

    /// Router isomorphism for a slave-backed port (spec.md §8): Set then
    /// Get returns whatever the slave now stores.
    #[test_log::test]
    fn slave_port_set_then_get_roundtrips() {
        let container = test_container(&[0.0]);
        let mut out = [0.0];
        assert_eq!(container.set_real(&[0], &[7.0]), Status::Ok);
        assert_eq!(container.get_real(&[0], &mut out), Status::Ok);
        assert_eq!(out[0], 7.0);
    }

    /// Start-list override (spec.md §4.4, §8 scenario 4): applied right
    /// after `EnterInitializationMode` succeeds, visible on the next read.
    #[test_log::test]
    fn start_list_override_is_visible_after_exit_initialization() {
        let buffers = Arc::new(SharedBuffers::new(Buffers::new(PerKind {
            real: 0,
            integer: 0,
            boolean: 0,
            string: 0,
        })));
        let io = FmuIo {
            real: crate::config::TypeWiring {
                input: vec![],
                start: vec![(0, 3.0)],
                output: vec![],
            },
            ..Default::default()
        };
        let slave = Slave::from_backend(
            "s0".into(),
            "g0".into(),
            "/tmp".into(),
            io,
            Box::new(StubBackend::new(0.0)),
            buffers.clone(),
            false,
        );
        let container = Container {
            name: "test".into(),
            guid: "g".into(),
            resource_dir: "/tmp".into(),
            slaves: vec![slave],
            buffers,
            port_tables: PortTables {
                tables: PerKind {
                    real: vec![PortEntry {
                        slave_index: 0,
                        slave_vr: 0,
                    }],
                    integer: vec![],
                    boolean: vec![],
                    string: vec![],
                },
            },
            scheduler: Mutex::new(Scheduler::new(0.1, false, false)),
            logger: Arc::new(HostLogger::new(
                fmi2CallbackFunctions {
                    logger: None,
                    allocateMemory: None,
                    freeMemory: None,
                    stepFinished: None,
                    componentEnvironment: std::ptr::null_mut(),
                },
                "test",
                false,
            )),
        };

        assert_eq!(container.setup_experiment(None, 0.0, None), Status::Ok);
        assert_eq!(container.enter_initialization_mode(), Status::Ok);
        assert_eq!(container.exit_initialization_mode(), Status::Ok);

        let mut out = [0.0];
        assert_eq!(container.get_real(&[0], &mut out), Status::Ok);
        assert_eq!(out[0], 3.0);
    }
}
