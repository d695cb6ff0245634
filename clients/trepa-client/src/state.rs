//! Pool program account records and their fixed-layout decoders

use arrayref::array_ref;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::{
    error::{ClientError, RecordKind, Result},
    identifier::Identifier,
    instruction::{account_discriminator, ConfigParams, DISCRIMINATOR_LEN},
    prizes::MAX_PREDICTION_VALUE,
};

/// Platform-wide parameters
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRecord {
    pub admin: Pubkey,
    pub min_stake: u64,
    pub max_stake: u64,
    pub max_roi: u64,      // basis points
    pub platform_fee: u64, // basis points
    pub treasury: Pubkey,
    pub bump: u8,
}

impl ConfigRecord {
    /// Fast-fail mirror of the program's stake bounds check
    pub fn check_stake(&self, stake: u64) -> Result<()> {
        if stake < self.min_stake || stake > self.max_stake {
            return Err(ClientError::MismatchedStakeBounds {
                stake,
                min: self.min_stake,
                max: self.max_stake,
            });
        }
        Ok(())
    }

    pub fn params(&self) -> ConfigParams {
        ConfigParams {
            min_stake: self.min_stake,
            max_stake: self.max_stake,
            max_roi: self.max_roi,
            platform_fee: self.platform_fee,
            treasury: self.treasury,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolState {
    Open,
    BeingResolved,
    Finalized,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRecord {
    pub question_id: Identifier,
    pub prediction_end_time: i64,
    pub total_stake: u64,
    pub is_resolved: bool,
    pub is_finalized: bool,
    pub root: [u8; 32],
    pub bump: u8,
}

impl PoolRecord {
    pub fn state(&self) -> PoolState {
        if self.is_finalized {
            PoolState::Finalized
        } else if self.is_resolved {
            PoolState::BeingResolved
        } else {
            PoolState::Open
        }
    }

    /// Commitment root, present once resolution has begun
    pub fn commitment(&self) -> Option<&[u8; 32]> {
        match self.state() {
            PoolState::Open => None,
            _ => Some(&self.root),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionRecord {
    pub prediction_id: Identifier,
    pub predictor: Pubkey,
    pub pool: Pubkey,
    pub prediction_value: u8, // 0..=100
    pub stake: u64,
    pub prize: u64,
    pub is_claimed: bool,
    pub bump: u8,
}

/// Records stored behind an 8-byte type discriminator
pub trait AccountRecord: BorshSerialize + BorshDeserialize + Sized {
    const KIND: RecordKind;
    const TYPE_NAME: &'static str;
    const LEN: usize;

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(ClientError::corrupt(
                Self::KIND,
                format!("expected {} bytes, got {}", Self::LEN, data.len()),
            ));
        }

        let tag = array_ref![data, 0, DISCRIMINATOR_LEN];
        if *tag != account_discriminator(Self::TYPE_NAME) {
            return Err(ClientError::corrupt(
                Self::KIND,
                format!("discriminator mismatch for {}", Self::TYPE_NAME),
            ));
        }

        let record = Self::try_from_slice(&data[DISCRIMINATOR_LEN..])
            .map_err(|e| ClientError::corrupt(Self::KIND, e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Field-range checks run after a successful decode
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Discriminator plus packed fields, as the program stores them
    fn to_account_data(&self) -> Result<Vec<u8>> {
        let mut data = account_discriminator(Self::TYPE_NAME).to_vec();
        self.serialize(&mut data)?;
        Ok(data)
    }
}

impl AccountRecord for ConfigRecord {
    const KIND: RecordKind = RecordKind::Config;
    const TYPE_NAME: &'static str = "ConfigAccount";
    const LEN: usize = DISCRIMINATOR_LEN + 32 + 8 + 8 + 8 + 8 + 32 + 1;
}

impl AccountRecord for PoolRecord {
    const KIND: RecordKind = RecordKind::Pool;
    const TYPE_NAME: &'static str = "PoolAccount";
    const LEN: usize = DISCRIMINATOR_LEN + 16 + 8 + 8 + 1 + 1 + 32 + 1;
}

impl AccountRecord for PredictionRecord {
    const KIND: RecordKind = RecordKind::Prediction;
    const TYPE_NAME: &'static str = "PredictionAccount";
    const LEN: usize = DISCRIMINATOR_LEN + 16 + 32 + 32 + 1 + 8 + 8 + 1 + 1;

    fn validate(&self) -> Result<()> {
        if self.prediction_value > MAX_PREDICTION_VALUE {
            return Err(ClientError::corrupt(
                Self::KIND,
                format!(
                    "prediction value {} above {}",
                    self.prediction_value, MAX_PREDICTION_VALUE
                ),
            ));
        }
        Ok(())
    }
}

pub fn decode_config(data: &[u8]) -> Result<ConfigRecord> {
    ConfigRecord::decode(data)
}

pub fn decode_pool(data: &[u8]) -> Result<PoolRecord> {
    PoolRecord::decode(data)
}

pub fn decode_prediction(data: &[u8]) -> Result<PredictionRecord> {
    PredictionRecord::decode(data)
}
