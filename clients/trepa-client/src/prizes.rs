//! Off-ledger prize computation for pool resolution
//!
//! The schedule produced here is committed to a Merkle root by the resolution
//! service and its parallel vectors are handed to `resolve_pool`.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{
    error::{ClientError, Result},
    identifier::Identifier,
    pda::PredictionKey,
    state::{ConfigRecord, PredictionRecord},
};

pub const BPS_DENOMINATOR: u128 = 10_000;
pub const MAX_PREDICTION_VALUE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    #[serde(with = "crate::config::pubkey_string")]
    pub participant: Pubkey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_id: Option<Identifier>,
    pub prediction: u8,
    pub stake: u64,
}

impl StakeEntry {
    pub fn new(participant: Pubkey, prediction: u8, stake: u64) -> Self {
        Self {
            participant,
            prediction_id: None,
            prediction,
            stake,
        }
    }

    pub fn key(&self) -> PredictionKey {
        PredictionKey {
            participant: self.participant,
            prediction_id: self.prediction_id,
        }
    }
}

impl From<&PredictionRecord> for StakeEntry {
    fn from(record: &PredictionRecord) -> Self {
        Self {
            participant: record.predictor,
            prediction_id: Some(record.prediction_id),
            prediction: record.prediction_value,
            stake: record.stake,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeEntry {
    #[serde(flatten)]
    pub entry: StakeEntry,
    pub prize: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeSchedule {
    pub outcome: u8,
    pub total_stake: u64,
    pub platform_fee: u64,
    pub distributable: u64,
    pub entries: Vec<PrizeEntry>,
}

impl PrizeSchedule {
    pub fn participants(&self) -> Vec<PredictionKey> {
        self.entries.iter().map(|e| e.entry.key()).collect()
    }

    pub fn prizes(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.prize).collect()
    }

    pub fn total_prizes(&self) -> u64 {
        self.entries.iter().map(|e| e.prize).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ClientError::Encoding(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrizeCalculator {
    pub platform_fee_bps: u64,
    /// Return cap in basis points over stake, uncapped when `None`
    pub max_roi_bps: Option<u64>,
}

impl PrizeCalculator {
    pub fn new(platform_fee_bps: u64, max_roi_bps: Option<u64>) -> Self {
        Self {
            platform_fee_bps,
            max_roi_bps,
        }
    }

    pub fn from_config(config: &ConfigRecord) -> Self {
        Self::new(config.platform_fee, Some(config.max_roi))
    }

    /// Prize for each entry, in input order. Weights fall off linearly with
    /// distance from the outcome; nobody receives more than the cap and the
    /// sum never exceeds the pool minus the platform fee.
    pub fn compute_prizes(&self, stakes: &[StakeEntry], outcome: u8) -> Result<PrizeSchedule> {
        if outcome > MAX_PREDICTION_VALUE {
            return Err(ClientError::InvalidPredictionValue(outcome));
        }
        if let Some(entry) = stakes.iter().find(|e| e.prediction > MAX_PREDICTION_VALUE) {
            return Err(ClientError::InvalidPredictionValue(entry.prediction));
        }
        if self.platform_fee_bps as u128 > BPS_DENOMINATOR {
            return Err(overflow("platform fee above 100%"));
        }

        let total: u128 = stakes.iter().map(|e| e.stake as u128).sum();
        let fee = total
            .checked_mul(self.platform_fee_bps as u128)
            .ok_or_else(|| overflow("fee"))?
            / BPS_DENOMINATOR;
        let distributable = total - fee;

        let weights: Vec<u128> = stakes
            .iter()
            .map(|e| {
                let distance = e.prediction.abs_diff(outcome) as u128;
                e.stake as u128 * (MAX_PREDICTION_VALUE as u128 - distance)
            })
            .collect();
        let total_weight: u128 = weights.iter().sum();

        let mut entries = Vec::with_capacity(stakes.len());
        for (entry, weight) in stakes.iter().zip(weights) {
            let mut prize = if total_weight == 0 {
                0
            } else {
                distributable
                    .checked_mul(weight)
                    .ok_or_else(|| overflow("prize share"))?
                    / total_weight
            };

            if let Some(max_roi) = self.max_roi_bps {
                let cap = (entry.stake as u128)
                    .checked_mul(BPS_DENOMINATOR + max_roi as u128)
                    .ok_or_else(|| overflow("prize cap"))?
                    / BPS_DENOMINATOR;
                prize = prize.min(cap);
            }

            entries.push(PrizeEntry {
                entry: *entry,
                prize: to_u64(prize)?,
            });
        }

        Ok(PrizeSchedule {
            outcome,
            total_stake: to_u64(total)?,
            platform_fee: to_u64(fee)?,
            distributable: to_u64(distributable)?,
            entries,
        })
    }
}

fn overflow(what: &str) -> ClientError {
    ClientError::InvalidAmount {
        input: what.to_string(),
        reason: "arithmetic overflow".to_string(),
    }
}

fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| overflow("u64 amount"))
}
