use std::error::Error;
use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;
use tickwork_api::errors::{CallbackError, TaskError, WaitError};
use tickwork_api::types::{TaskId, TaskState};

#[derive(Error, Debug)]
#[error("disk quota exceeded")]
struct QuotaError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_error_keeps_context_chain() {
        let error = TaskError::failed(anyhow!("read failed").context("loading mesh"));

        assert_eq!(error.to_string(), "Task failed: loading mesh: read failed");
        assert!(!error.is_cancelled());
    }

    #[test]
    fn test_failed_error_downcasts_to_source() {
        let error = TaskError::failed(QuotaError);

        assert!(error.downcast_ref::<QuotaError>().is_some());
        assert!(TaskError::Cancelled.downcast_ref::<QuotaError>().is_none());
    }

    #[test]
    fn test_panicked_and_cancelled_display() {
        assert_eq!(
            TaskError::Panicked("index out of bounds".to_string()).to_string(),
            "Task panicked: index out of bounds"
        );
        assert_eq!(TaskError::Cancelled.to_string(), "Task was cancelled before it started");
        assert!(TaskError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_wait_error_wraps_task_error_transparently() {
        let error: WaitError = TaskError::Cancelled.into();
        assert_eq!(error.to_string(), "Task was cancelled before it started");

        let timeout = WaitError::Timeout(Duration::from_millis(250));
        assert_eq!(timeout.to_string(), "Timed out after 250ms waiting for task");
        assert!(timeout.source().is_none());
    }

    #[test]
    fn test_callback_error_names_task() {
        let task_id = TaskId::new();
        let error = CallbackError { task_id, message: "boom".to_string() };

        assert_eq!(
            error.to_string(),
            format!("Completion callback for task {task_id} panicked: boom")
        );
    }

    #[test]
    fn test_task_errors_are_shareable() {
        let original = TaskError::failed(anyhow!("bad input"));
        let copy = original.clone();

        assert_eq!(original.to_string(), copy.to_string());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert_eq!(TaskState::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_task_ids_are_unique() {
        let first = TaskId::new();
        let second = TaskId::new();

        assert_ne!(first, second);
        assert_eq!(first.to_string(), first.as_uuid().to_string());
    }
}
