use thiserror::Error;

/// Why a plan was not stored.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AdmissionError {
    #[error("plan cache disabled")]
    Disabled,
    #[error("plan has no actions")]
    Empty,
    #[error("plan ends the task with terminate")]
    Terminates,
    #[error("success rate {rate:.2} not above admission threshold {threshold:.2}")]
    LowSuccessRate { rate: f64, threshold: f64 },
}
