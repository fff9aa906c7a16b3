// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the console engine
//!
//! Every operation boundary maps transport, backend, and local failures to
//! these unified variants so callers always receive typed state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all console operations
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ConsoleError {
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Column annotation for {table}.{column} is not valid structured text")]
    AnnotationUnreadable { table: String, column: String },

    #[error("Column {table}.{column} is not present in the loaded table detail")]
    EditTargetMissing { table: String, column: String },

    #[error("Table {table} has no loaded detail; only loaded tables can be edited")]
    TableNotLoaded { table: String },

    #[error("Affected-bot lookup failed: {message}")]
    Resolver { message: String },

    #[error("Batch table update failed: {message}")]
    Submission { message: String },

    #[error("Tables saved, but vector-store sync failed: {message}")]
    VectorStoreSync { message: String },

    #[error("A submission is already in progress")]
    SubmissionInProgress,

    #[error("SQL execution failed: {message}")]
    SqlExecution { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ConsoleError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport { message: msg.into() }
    }

    pub fn backend(status: u16, msg: impl Into<String>) -> Self {
        Self::Backend { status, message: msg.into() }
    }

    pub fn annotation_unreadable(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::AnnotationUnreadable { table: table.into(), column: column.into() }
    }

    pub fn edit_target_missing(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::EditTargetMissing { table: table.into(), column: column.into() }
    }

    pub fn table_not_loaded(table: impl Into<String>) -> Self {
        Self::TableNotLoaded { table: table.into() }
    }

    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver { message: msg.into() }
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission { message: msg.into() }
    }

    pub fn vector_store_sync(msg: impl Into<String>) -> Self {
        Self::VectorStoreSync { message: msg.into() }
    }

    pub fn sql_execution(msg: impl Into<String>) -> Self {
        Self::SqlExecution { message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }
}

/// Result type alias for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;
