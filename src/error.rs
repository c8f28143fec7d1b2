use fmi_container_sys::fmi2Status;

/// Errors that can arise while assembling or driving a [`crate::Container`].
///
/// Mirrors the teacher's `fmi::Error`: one variant per failure class named in
/// spec.md §7, plus the usual `#[from]` conversions for I/O and dynamic
/// loading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error at line {line}: {message}")]
    Config { line: usize, message: String },

    #[error("instantiation failed")]
    Instantiation,

    #[error("operation not supported by the container: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Library(#[from] libloading::Error),
}

/// The four-level status the ABI boundary ultimately reports (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Warning,
    Discard,
    Error,
    Fatal,
}

impl Status {
    pub fn is_error(self) -> bool {
        matches!(self, Status::Discard | Status::Error | Status::Fatal)
    }
}

impl From<fmi2Status> for Status {
    fn from(raw: fmi2Status) -> Self {
        use fmi_container_sys::*;
        match raw {
            fmi2Status_fmi2OK => Status::Ok,
            fmi2Status_fmi2Warning => Status::Warning,
            fmi2Status_fmi2Discard => Status::Discard,
            fmi2Status_fmi2Error => Status::Error,
            _ => Status::Fatal,
        }
    }
}

impl From<Status> for fmi2Status {
    fn from(status: Status) -> Self {
        use fmi_container_sys::*;
        match status {
            Status::Ok => fmi2Status_fmi2OK,
            Status::Warning => fmi2Status_fmi2Warning,
            Status::Discard => fmi2Status_fmi2Discard,
            Status::Error => fmi2Status_fmi2Error,
            Status::Fatal => fmi2Status_fmi2Fatal,
        }
    }
}
