use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("request queue is full")]
    QueueFull,
    #[error("low-priority queue is full")]
    LowPriorityQueueFull,
    #[error("request timed out waiting for a response")]
    Timeout,
    #[error("controller is not ready")]
    NotReady,
    #[error("serial I/O error: {0}")]
    Io(String),
    #[error("discovery failed: {0}")]
    Discovery(String),
    #[error("controller is shutting down")]
    Stopped,
}
