// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Write conflict on {0}")]
    Conflict(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Sidecar name taken: {0}")]
    SidecarNameTaken(String),

    #[error("Object is missing {0}")]
    MissingObjectKey(&'static str),

    #[error("Failed to serialize object: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid module spec: {0}")]
    InvalidSpec(String),
}

impl OperatorError {
    /// Whether this error is an optimistic-concurrency conflict worth retrying
    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
