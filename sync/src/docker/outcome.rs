//! Classification of engine failures
//!
//! Every engine call funnels its error through [`classify`], which maps the
//! response status to one of three outcomes depending on the operation.

use bollard::errors::Error as EngineError;
use http::StatusCode;

use crate::errors::SyncError;

/// Engine operations issued by [`crate::docker::client::EngineClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    ImageExists,
    ContainerRunning,
    InspectImage,
    InspectContainer,
    BuildImage,
    CreateContainer,
    StartContainer,
    StopContainer,
    RemoveContainer,
    RemoveImage,
    AttachContainer,
    EngineInfo,
    EngineVersion,
}

impl EngineOp {
    /// Verb phrase used in error messages
    pub fn describe(&self) -> &'static str {
        match self {
            EngineOp::ImageExists | EngineOp::InspectImage => "inspecting image",
            EngineOp::ContainerRunning | EngineOp::InspectContainer => "inspecting container",
            EngineOp::BuildImage => "building image",
            EngineOp::CreateContainer => "creating container",
            EngineOp::StartContainer => "starting container",
            EngineOp::StopContainer => "stopping container",
            EngineOp::RemoveContainer => "removing container",
            EngineOp::RemoveImage => "removing image",
            EngineOp::AttachContainer => "attaching to container",
            EngineOp::EngineInfo => "querying info of engine",
            EngineOp::EngineVersion => "querying version of engine",
        }
    }

    // Start and stop signal "already in that state" with different codes
    fn absorbed(&self) -> &'static [StatusCode] {
        match self {
            EngineOp::StartContainer => &[StatusCode::NOT_MODIFIED],
            EngineOp::StopContainer => &[StatusCode::NOT_FOUND, StatusCode::NOT_MODIFIED],
            EngineOp::RemoveContainer | EngineOp::RemoveImage => &[StatusCode::NOT_FOUND],
            _ => &[],
        }
    }

    fn benign(&self) -> &'static [StatusCode] {
        match self {
            EngineOp::ImageExists | EngineOp::ContainerRunning => &[StatusCode::NOT_FOUND],
            _ => &[],
        }
    }
}

/// What an engine error means for the operation that raised it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The target is already in the desired state
    Absorbed,

    /// The answer is a plain "no"
    Benign,

    Fatal,
}

/// Classify an engine error for the given operation
pub fn classify(op: EngineOp, err: &EngineError) -> Disposition {
    let Some(status) = status_code(err) else {
        return Disposition::Fatal;
    };

    if op.absorbed().contains(&status) {
        Disposition::Absorbed
    } else if op.benign().contains(&status) {
        Disposition::Benign
    } else {
        Disposition::Fatal
    }
}

/// HTTP status carried by an engine error, if any
pub fn status_code(err: &EngineError) -> Option<StatusCode> {
    match err {
        EngineError::DockerResponseServerError { status_code, .. } => {
            StatusCode::from_u16(*status_code).ok()
        }
        _ => None,
    }
}

/// Wrap an engine error with the operation and target it failed on
pub fn engine_error(op: EngineOp, target: &str, source: EngineError) -> SyncError {
    SyncError::Engine {
        op: op.describe(),
        target: target.to_string(),
        source,
    }
}

/// Resolve an engine result: `Some` on success, `None` when the error is
/// absorbed or benign for `op`, error otherwise
pub fn settle<T>(op: EngineOp, target: &str, result: Result<T, EngineError>) -> Result<Option<T>, SyncError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => match classify(op, &err) {
            Disposition::Absorbed | Disposition::Benign => Ok(None),
            Disposition::Fatal => Err(engine_error(op, target, err)),
        },
    }
}
