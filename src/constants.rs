// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys written by the operator
pub mod annotations {
    /// Name of the module owning every Pod in the namespace
    pub const MODULE: &str = "a4c/module";
}

/// Name given to the Pod created for each Module
pub const SIDECAR_POD_NAME: &str = "sidecar";

/// Module CRD coordinates and polling configuration
pub mod crd {
    pub const GROUP: &str = "sample.alien4cloud";
    pub const VERSION: &str = "v1";
    pub const KIND: &str = "Module";
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Conflict retry defaults, matching the client-go default retry
pub mod retry {
    pub const STEPS: u32 = 5;
    pub const INTERVAL_MILLIS: u64 = 10;
    pub const FACTOR: f64 = 1.0;
}

/// Requeue delay in seconds after a failed reconciliation
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 60;
