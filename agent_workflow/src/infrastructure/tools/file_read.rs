// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Read Tool
//!
//! Sandboxed UTF-8 file reading for agents. Every candidate path passes
//! through the [`PathSecurityValidator`] before any file system access;
//! a rejection surfaces as a failing `ExecutionResult` carrying the
//! validator's reason, never as an error.
//!
//! ## Size Handling
//!
//! Reads are capped by `max_file_size`. Files of at least 1 MiB are read
//! through a buffered reader whose capacity escalates with file size
//! (1 KiB, 4 KiB, 8 KiB, 16 KiB); smaller files are read in one shot.
//! Content must be valid UTF-8.

use async_trait::async_trait;
use byte_unit::{Byte, UnitType};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

use agent_workflow_domain::{ExecutionInput, ExecutionResult, Tool, WorkflowError};

use crate::infrastructure::security::{PathSecurityValidator, PathValidation};

/// Threshold above which reads go through an escalating buffered reader.
const BUFFERED_READ_THRESHOLD: u64 = 1024 * 1024;

/// Default per-read size ceiling (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration for [`FileReadTool`].
#[derive(Debug, Clone)]
pub struct FileReadToolConfig {
    /// Per-read size ceiling in bytes
    pub max_file_size: u64,
}

impl Default for FileReadToolConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Tool that reads UTF-8 text files relative to the sandbox base
/// directory.
pub struct FileReadTool {
    validator: Arc<PathSecurityValidator>,
    max_file_size: u64,
}

impl FileReadTool {
    /// Creates a file-read tool over an existing validator.
    pub fn new(validator: Arc<PathSecurityValidator>, config: FileReadToolConfig) -> Self {
        Self {
            validator,
            max_file_size: config.max_file_size,
        }
    }

    /// Buffer capacity for a buffered read, chosen from file size.
    fn buffer_capacity(file_size: u64) -> usize {
        const MIB: u64 = 1024 * 1024;
        match file_size {
            size if size < 4 * MIB => 1024,
            size if size < 16 * MIB => 4 * 1024,
            size if size < 64 * MIB => 8 * 1024,
            _ => 16 * 1024,
        }
    }

    async fn read_file(&self, path: &Path) -> Result<String, WorkflowError> {
        let metadata = tokio::fs::metadata(path).await?;
        let size = metadata.len();

        if size > self.max_file_size {
            return Err(WorkflowError::resource_exhausted(format!(
                "file size {} exceeds the {} limit",
                Byte::from_u64(size).get_appropriate_unit(UnitType::Binary),
                Byte::from_u64(self.max_file_size).get_appropriate_unit(UnitType::Binary),
            )));
        }

        let content = if size >= BUFFERED_READ_THRESHOLD {
            let capacity = Self::buffer_capacity(size);
            debug!(
                path = %path.display(),
                size,
                capacity,
                "reading large file through buffered reader"
            );
            let file = tokio::fs::File::open(path).await?;
            let mut reader = tokio::io::BufReader::with_capacity(capacity, file);
            let mut content = String::with_capacity(size as usize);
            reader
                .read_to_string(&mut content)
                .await
                .map_err(|e| WorkflowError::io_error(format!("file is not valid UTF-8 or unreadable: {}", e)))?;
            content
        } else {
            let bytes = tokio::fs::read(path).await?;
            String::from_utf8(bytes)
                .map_err(|e| WorkflowError::io_error(format!("file is not valid UTF-8: {}", e)))?
        };

        Ok(content)
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn tool_name(&self) -> &str {
        "file_read"
    }

    fn tool_description(&self) -> &str {
        "Reads a UTF-8 text file from a relative path inside the sandbox directory"
    }

    async fn run_tool(&self, input: ExecutionInput) -> ExecutionResult {
        let candidate = input.content.trim();

        let resolved = match self.validator.validate(candidate) {
            PathValidation::Valid(path) => path,
            PathValidation::Invalid { reason } => {
                return ExecutionResult::failure(format!("file read denied: {}", reason));
            }
        };

        match self.read_file(&resolved).await {
            Ok(content) => ExecutionResult::success(content),
            Err(err) => ExecutionResult::failure(format!("file read failed: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::security::PathSecurityConfig;
    use std::fs;

    fn tool_in(dir: &Path, max_file_size: u64) -> FileReadTool {
        let validator = PathSecurityValidator::new(PathSecurityConfig::new(dir)).unwrap();
        FileReadTool::new(Arc::new(validator), FileReadToolConfig { max_file_size })
    }

    #[tokio::test]
    async fn test_reads_small_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello world").unwrap();

        let tool = tool_in(dir.path(), DEFAULT_MAX_FILE_SIZE);
        let result = tool.run_tool(ExecutionInput::new("notes.txt")).await;

        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn test_denies_traversal_without_touching_fs() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path(), DEFAULT_MAX_FILE_SIZE);

        let result = tool.run_tool(ExecutionInput::new("../etc/passwd")).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn test_size_boundary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("exact.txt"), vec![b'x'; 64]).unwrap();
        fs::write(dir.path().join("over.txt"), vec![b'x'; 65]).unwrap();

        let tool = tool_in(dir.path(), 64);

        let exact = tool.run_tool(ExecutionInput::new("exact.txt")).await;
        assert!(exact.success);
        assert_eq!(exact.output.len(), 64);

        let over = tool.run_tool(ExecutionInput::new("over.txt")).await;
        assert!(!over.success);
        assert!(over.error.unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_rejects_non_utf8_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("binary.dat"), [0xFF, 0xFE, 0x80]).unwrap();

        let tool = tool_in(dir.path(), DEFAULT_MAX_FILE_SIZE);
        let result = tool.run_tool(ExecutionInput::new("binary.dat")).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("UTF-8"));
    }

    #[tokio::test]
    async fn test_buffered_read_for_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let large = "x".repeat((BUFFERED_READ_THRESHOLD + 16) as usize);
        fs::write(dir.path().join("large.txt"), &large).unwrap();

        let tool = tool_in(dir.path(), 4 * 1024 * 1024);
        let result = tool.run_tool(ExecutionInput::new("large.txt")).await;

        assert!(result.success);
        assert_eq!(result.output.len(), large.len());
    }

    #[test]
    fn test_buffer_capacity_escalation() {
        const MIB: u64 = 1024 * 1024;
        assert_eq!(FileReadTool::buffer_capacity(MIB), 1024);
        assert_eq!(FileReadTool::buffer_capacity(4 * MIB), 4 * 1024);
        assert_eq!(FileReadTool::buffer_capacity(16 * MIB), 8 * 1024);
        assert_eq!(FileReadTool::buffer_capacity(64 * MIB), 16 * 1024);
        assert_eq!(FileReadTool::buffer_capacity(512 * MIB), 16 * 1024);
    }

    #[tokio::test]
    async fn test_missing_file_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path(), DEFAULT_MAX_FILE_SIZE);

        let result = tool.run_tool(ExecutionInput::new("absent.txt")).await;
        assert!(!result.success);
    }
}
