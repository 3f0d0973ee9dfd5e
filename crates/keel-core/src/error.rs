// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy shared across `keel-lock`, `keel-scheduler`, and
//! `keel-store`. Individual crates wrap this in their own `thiserror` enums
//! rather than returning it directly, but every backend-specific error
//! variant maps onto one of these cases.

use thiserror::Error;

/// The cross-cutting error taxonomy described in spec.md §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeelError {
    #[error("key not found: {0}")]
    KeyMissing(String),

    #[error("already shut down")]
    AlreadyShutDown,

    #[error("invalid store: {0}")]
    InvalidStore(String),

    #[error("not connected")]
    NotConnected,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not the owner of this resource")]
    NotOwner,

    #[error("timed out")]
    TimedOut,

    #[error("not started")]
    NotStarted,

    #[error("backend failure: {0}")]
    BackendFailure(String),
}

pub type Result<T> = std::result::Result<T, KeelError>;
