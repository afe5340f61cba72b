use crate::port::PortError;
use thiserror::Error;

/// Error taxonomy for the exchange state mirror.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("mutating operation rejected: lockdown is active")]
    Lockdown,

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("open-order count mismatch during reconciliation for market {market}: local {local}, remote {remote}")]
    ReconciliationMismatch {
        market: String,
        local: usize,
        remote: usize,
    },

    #[error("attempted to spend below the configured reserve for {0}")]
    ReservationViolation(String),

    #[error("exchange port: {0}")]
    Port(#[from] PortError),
}
