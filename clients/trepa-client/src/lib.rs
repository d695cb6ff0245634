//! Client-side address derivation and transaction assembly for the trepa
//! staking pool program.
//!
//! Intents (create a pool, place a prediction, resolve, claim) become single
//! unsigned transactions whose instructions succeed or fail together.
//! Signing and submission are left to the caller.

pub mod amount;
pub mod assembler;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod identifier;
pub mod instruction;
pub mod logging;
pub mod pda;
pub mod prizes;
pub mod prober;
pub mod reader;
pub mod state;

pub use assembler::{
    AssembledTransaction, AssemblyStage, ClaimRequest, DerivedAccounts, Intent, PredictionRequest,
    TransactionAssembler,
};
pub use client::PoolClient;
pub use config::{ClientConfig, ConfigError, ProgramSettings};
pub use error::{ClientError, ProgramErrorCode, Result};
pub use identifier::Identifier;
pub use pda::{AddressDeriver, DerivedAddress, PredictionKey, ProtocolVersion};
pub use prizes::{PrizeCalculator, PrizeSchedule, StakeEntry};
pub use prober::{AccountProber, InMemoryLedger, RpcAccountProber};
pub use reader::AccountReader;
pub use state::{AccountRecord, ConfigRecord, PoolRecord, PoolState, PredictionRecord};
