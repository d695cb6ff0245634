//! Program Derived Address (PDA) utilities
//!
//! Centralized module for deriving every address the pool program expects.
//! Derivation is pure: the same seeds and program id always give the same
//! address and bump, so results can be recomputed freely on retry.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

use crate::{
    error::{ClientError, Result},
    identifier::Identifier,
};

/// PDA seeds for the pool program's records
pub mod seeds {
    pub const POOL: &[u8] = b"pool";
    pub const PREDICTION: &[u8] = b"prediction";
    pub const CONFIG: &[u8] = b"config";
}

/// Selects how prediction addresses are seeded.
///
/// Deployments of the pool program disagree on this, so a client is bound to
/// exactly one scheme through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    /// `["prediction", pool, participant]`
    #[default]
    PoolParticipant,
    /// `["prediction", prediction_id]`
    PredictionId,
}

impl std::str::FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool_participant" | "v1" => Ok(ProtocolVersion::PoolParticipant),
            "prediction_id" | "v2" => Ok(ProtocolVersion::PredictionId),
            other => Err(format!("unknown protocol version '{}'", other)),
        }
    }
}

/// Output of a derivation: the off-curve address and the bump that found it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Derive an address from a seed tag plus further seed parts
pub fn derive(seed_tag: &[u8], parts: &[&[u8]], program_id: &Pubkey) -> DerivedAddress {
    let mut seeds: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
    seeds.push(seed_tag);
    seeds.extend_from_slice(parts);

    let (address, bump) = Pubkey::find_program_address(&seeds, program_id);
    DerivedAddress { address, bump }
}

/// Names one participant's prediction inside a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PredictionKey {
    pub participant: Pubkey,
    pub prediction_id: Option<Identifier>,
}

impl PredictionKey {
    pub fn new(participant: Pubkey) -> Self {
        Self {
            participant,
            prediction_id: None,
        }
    }

    pub fn with_id(participant: Pubkey, prediction_id: Identifier) -> Self {
        Self {
            participant,
            prediction_id: Some(prediction_id),
        }
    }
}

impl From<Pubkey> for PredictionKey {
    fn from(participant: Pubkey) -> Self {
        Self::new(participant)
    }
}

/// PDA generator for all pool program records
#[derive(Debug, Clone)]
pub struct AddressDeriver {
    program_id: Pubkey,
    version: ProtocolVersion,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey, version: ProtocolVersion) -> Self {
        Self {
            program_id,
            version,
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Get the pool PDA for a pool identifier
    pub fn pool(&self, pool_id: &Identifier) -> DerivedAddress {
        derive(seeds::POOL, &[pool_id.as_ref()], &self.program_id)
    }

    /// Get the singleton config PDA
    pub fn config(&self) -> DerivedAddress {
        derive(seeds::CONFIG, &[], &self.program_id)
    }

    /// Get the prediction PDA using the configured protocol version
    pub fn prediction(&self, pool: &Pubkey, key: &PredictionKey) -> Result<DerivedAddress> {
        match self.version {
            ProtocolVersion::PoolParticipant => {
                Ok(self.prediction_by_participant(pool, &key.participant))
            }
            ProtocolVersion::PredictionId => key
                .prediction_id
                .as_ref()
                .map(|id| self.prediction_by_id(id))
                .ok_or(ClientError::MissingPredictionId),
        }
    }

    pub fn prediction_by_participant(&self, pool: &Pubkey, participant: &Pubkey) -> DerivedAddress {
        derive(
            seeds::PREDICTION,
            &[pool.as_ref(), participant.as_ref()],
            &self.program_id,
        )
    }

    pub fn prediction_by_id(&self, prediction_id: &Identifier) -> DerivedAddress {
        derive(seeds::PREDICTION, &[prediction_id.as_ref()], &self.program_id)
    }
}

/// Wrapped-value (associated token) account for an owner. Owners may be
/// PDAs, such as a pool.
pub fn value_account_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, token_program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_id() -> Identifier {
        Identifier::encode("b9cdc74e-c59a-4dbc-8006-c3e326040815").unwrap()
    }

    #[test]
    fn test_pool_pda_generation() {
        let program_id = Pubkey::new_unique();
        let deriver = AddressDeriver::new(program_id, ProtocolVersion::default());

        let first = deriver.pool(&pool_id());
        let second = deriver.pool(&pool_id());
        assert_eq!(first, second);

        let other = deriver.pool(&Identifier::from_bytes([7u8; 16]));
        assert_ne!(first.address, other.address);
    }

    #[test]
    fn test_pool_pda_matches_raw_seeds() {
        let program_id = Pubkey::new_unique();
        let deriver = AddressDeriver::new(program_id, ProtocolVersion::default());
        let id = pool_id();

        let (expected, bump) =
            Pubkey::find_program_address(&[b"pool", id.as_bytes()], &program_id);
        let derived = deriver.pool(&id);
        assert_eq!(derived.address, expected);
        assert_eq!(derived.bump, bump);
        assert!(!derived.address.is_on_curve());
    }

    #[test]
    fn test_config_pda_is_singleton() {
        let program_id = Pubkey::new_unique();
        let deriver = AddressDeriver::new(program_id, ProtocolVersion::PredictionId);
        let (expected, _) = Pubkey::find_program_address(&[b"config"], &program_id);
        assert_eq!(deriver.config().address, expected);
    }

    #[test]
    fn test_prediction_by_participant() {
        let program_id = Pubkey::new_unique();
        let deriver = AddressDeriver::new(program_id, ProtocolVersion::PoolParticipant);
        let pool = deriver.pool(&pool_id()).address;
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();

        let a = deriver.prediction(&pool, &PredictionKey::new(alice)).unwrap();
        let b = deriver.prediction(&pool, &PredictionKey::new(bob)).unwrap();
        assert_ne!(a.address, b.address);

        // identifier is ignored under this version
        let with_id = deriver
            .prediction(&pool, &PredictionKey::with_id(alice, Identifier::generate()))
            .unwrap();
        assert_eq!(a, with_id);
    }

    #[test]
    fn test_prediction_by_id_requires_identifier() {
        let program_id = Pubkey::new_unique();
        let deriver = AddressDeriver::new(program_id, ProtocolVersion::PredictionId);
        let pool = deriver.pool(&pool_id()).address;
        let participant = Pubkey::new_unique();

        let err = deriver
            .prediction(&pool, &PredictionKey::new(participant))
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingPredictionId));

        let id = Identifier::from_bytes([3u8; 16]);
        let derived = deriver
            .prediction(&pool, &PredictionKey::with_id(participant, id))
            .unwrap();
        let (expected, _) = Pubkey::find_program_address(&[b"prediction", &[3u8; 16]], &program_id);
        assert_eq!(derived.address, expected);
    }

    #[test]
    fn test_value_account_for_pda_owner() {
        let program_id = Pubkey::new_unique();
        let deriver = AddressDeriver::new(program_id, ProtocolVersion::default());
        let pool = deriver.pool(&pool_id()).address;
        let mint = spl_token::native_mint::id();

        let pool_value = value_account_address(&pool, &mint, &spl_token::id());
        assert_eq!(
            pool_value,
            spl_associated_token_account::get_associated_token_address(&pool, &mint)
        );
    }

    #[test]
    fn test_protocol_version_parsing() {
        assert_eq!("v2".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::PredictionId);
        assert_eq!(
            "pool_participant".parse::<ProtocolVersion>().unwrap(),
            ProtocolVersion::PoolParticipant
        );
        assert!("v3".parse::<ProtocolVersion>().is_err());
    }
}
