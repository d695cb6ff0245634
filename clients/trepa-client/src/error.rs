//! Error taxonomy for pool transaction assembly and account reads

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_sdk::{
    instruction::InstructionError,
    program_error::ProgramError,
    pubkey::Pubkey,
    transaction::TransactionError,
};
use std::fmt;
use thiserror::Error;

/// Account record kinds owned by the pool program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Config,
    Pool,
    Prediction,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Config => write!(f, "config"),
            RecordKind::Pool => write!(f, "pool"),
            RecordKind::Prediction => write!(f, "prediction"),
        }
    }
}

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    // Input errors, caller must fix the input
    #[error("Malformed identifier '{input}': {reason}")]
    MalformedIdentifier { input: String, reason: String },

    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("Prediction value {0} out of range, expected 0..=100")]
    InvalidPredictionValue(u8),

    #[error("Prediction identifier required by the configured protocol version")]
    MissingPredictionId,

    // Fast-fail mirrors of program rules
    #[error("Invalid pool end time {end_time}: must be after {now}")]
    InvalidEndTime { end_time: i64, now: i64 },

    #[error("Stake {stake} outside configured bounds [{min}, {max}]")]
    MismatchedStakeBounds { stake: u64, min: u64, max: u64 },

    #[error("Prize count {prizes} does not match participant count {participants}")]
    PrizeCountMismatch { participants: usize, prizes: usize },

    #[error("Transfer to {recipients} recipients given {amounts} amounts")]
    RecipientCountMismatch { recipients: usize, amounts: usize },

    #[error("No treasury configured for resolution")]
    MissingTreasury,

    // Ledger reads
    #[error("Transient read error for {address}: {message}")]
    TransientReadError { address: Pubkey, message: String },

    #[error("Corrupt {kind} account data: {reason}")]
    CorruptAccountData { kind: RecordKind, reason: String },

    #[error("Instruction encoding failed: {0}")]
    Encoding(String),
}

impl ClientError {
    /// Only ledger reads may be retried, with identical inputs
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::TransientReadError { .. })
    }

    /// Stable error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::MalformedIdentifier { .. } => "MALFORMED_IDENTIFIER",
            ClientError::InvalidAmount { .. } => "INVALID_AMOUNT",
            ClientError::InvalidPredictionValue(_) => "INVALID_PREDICTION_VALUE",
            ClientError::MissingPredictionId => "MISSING_PREDICTION_ID",
            ClientError::InvalidEndTime { .. } => "INVALID_END_TIME",
            ClientError::MismatchedStakeBounds { .. } => "MISMATCHED_STAKE_BOUNDS",
            ClientError::PrizeCountMismatch { .. } => "PRIZE_COUNT_MISMATCH",
            ClientError::RecipientCountMismatch { .. } => "RECIPIENT_COUNT_MISMATCH",
            ClientError::MissingTreasury => "MISSING_TREASURY",
            ClientError::TransientReadError { .. } => "TRANSIENT_READ_ERROR",
            ClientError::CorruptAccountData { .. } => "CORRUPT_ACCOUNT_DATA",
            ClientError::Encoding(_) => "ENCODING_ERROR",
        }
    }

    pub(crate) fn corrupt(kind: RecordKind, reason: impl Into<String>) -> Self {
        ClientError::CorruptAccountData {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Encoding(err.to_string())
    }
}

impl From<ProgramError> for ClientError {
    fn from(err: ProgramError) -> Self {
        ClientError::Encoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Custom error codes start here for Anchor programs
pub const PROGRAM_ERROR_OFFSET: u32 = 6000;

/// Rejections returned by the pool program on submission.
///
/// The client never acts on these; they are decoded so callers can report a
/// failed submission precisely.
#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum ProgramErrorCode {
    #[error("Unauthorized admin action")]
    Unauthorized = 0,

    #[error("Pool already finalized")]
    PoolAlreadyFinalized = 1,

    #[error("Invalid pool passed")]
    InvalidPool = 2,

    #[error("Invalid pool end time")]
    InvalidEndTime = 3,

    #[error("Rewards already claimed")]
    RewardsAlreadyClaimed = 4,

    #[error("Unauthorized claim")]
    UnauthorizedClaim = 5,

    #[error("Invalid mint account")]
    InvalidMint = 6,

    #[error("Invalid pool token account owner")]
    InvalidTokenAccountOwner = 7,

    #[error("Pool not finalized")]
    PoolNotFinalized = 8,

    #[error("Pool not resolved")]
    PoolNotResolved = 9,
}

impl ProgramErrorCode {
    pub fn from_custom(code: u32) -> Option<Self> {
        code.checked_sub(PROGRAM_ERROR_OFFSET)
            .and_then(Self::from_u32)
    }

    pub fn code(self) -> u32 {
        PROGRAM_ERROR_OFFSET + self as u32
    }

    /// Extract the failing instruction index and program error from a
    /// submission result
    pub fn from_transaction_error(err: &TransactionError) -> Option<(u8, Self)> {
        match err {
            TransactionError::InstructionError(index, InstructionError::Custom(code)) => {
                Self::from_custom(*code).map(|e| (*index, e))
            }
            _ => None,
        }
    }
}
