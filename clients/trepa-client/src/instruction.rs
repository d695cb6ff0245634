//! Instruction encodings for the pool program
//!
//! Every instruction's data is an 8-byte method discriminator followed by its
//! Borsh-encoded arguments. Account lists follow the program's declared order.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::error::{ClientError, Result};

pub const DISCRIMINATOR_LEN: usize = 8;

/// Discriminator namespace for instruction handlers
const GLOBAL_NAMESPACE: &str = "global";
/// Discriminator namespace for account records
const ACCOUNT_NAMESPACE: &str = "account";

fn sighash(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// Discriminator for an instruction handler, e.g. `"create_pool"`
pub fn instruction_discriminator(method: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash(GLOBAL_NAMESPACE, method)
}

/// Discriminator for an account record type, e.g. `"PoolAccount"`
pub fn account_discriminator(type_name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash(ACCOUNT_NAMESPACE, type_name)
}

/// Platform parameters carried by `initialize` and `update_config`
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigParams {
    pub min_stake: u64,
    pub max_stake: u64,
    /// Basis points, 10_000 = 100%
    pub max_roi: u64,
    /// Basis points
    pub platform_fee: u64,
    pub treasury: Pubkey,
}

/// Pool program instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolInstruction {
    /// Create the platform config
    /// Accounts:
    /// 0. `[writable, signer]` Admin
    /// 1. `[writable]` Config PDA
    /// 2. `[]` System program
    InitializeConfig(ConfigParams),

    /// Replace the platform parameters
    /// Accounts:
    /// 0. `[writable, signer]` Admin
    /// 1. `[writable]` Config PDA
    UpdateConfig(ConfigParams),

    /// Accounts:
    /// 0. `[writable, signer]` Admin
    /// 1. `[writable]` Pool PDA
    /// 2. `[]` System program
    /// 3. `[]` Clock sysvar
    CreatePool {
        question_id: [u8; 16],
        prediction_end_time: i64,
    },

    /// Accounts:
    /// 0. `[writable, signer]` Predictor
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` Prediction PDA
    /// 3. `[writable]` Predictor value account
    /// 4. `[writable]` Pool value account
    /// 5. `[]` Wrapped-native mint
    /// 6. `[]` System program
    /// 7. `[]` Token program
    Predict {
        prediction_id: [u8; 16],
        pred: u8,
        stake: u64,
    },

    /// Accounts:
    /// 0. `[writable, signer]` Admin
    /// 1. `[writable]` Pool PDA
    /// 2. `[writable]` Pool value account
    /// 3. `[writable]` Treasury value account
    /// 4. `[]` Config PDA
    /// 5. `[]` Wrapped-native mint
    /// 6. `[]` Token program
    /// 7.. `[writable]` Prediction PDAs, one per prize entry
    ResolvePool {
        prize_amounts: Vec<u64>,
        merkle_root: [u8; 32],
    },

    /// Accounts: as `ResolvePool` without trailing predictions, with the
    /// resolution authority as signer
    ProveResolution { root: [u8; 32] },

    /// Accounts:
    /// 0. `[writable, signer]` Predictor
    /// 1. `[writable]` Prediction PDA
    /// 2. `[writable]` Pool PDA
    /// 3. `[writable]` Predictor value account
    /// 4. `[writable]` Pool value account
    /// 5. `[]` Wrapped-native mint
    /// 6. `[]` Token program
    ClaimRewards { amount: u64, proof: Vec<[u8; 32]> },
}

impl PoolInstruction {
    /// Handler name used to compute the discriminator
    pub fn method_name(&self) -> &'static str {
        match self {
            PoolInstruction::InitializeConfig(_) => "initialize",
            PoolInstruction::UpdateConfig(_) => "update_config",
            PoolInstruction::CreatePool { .. } => "create_pool",
            PoolInstruction::Predict { .. } => "predict",
            PoolInstruction::ResolvePool { .. } => "resolve_pool",
            PoolInstruction::ProveResolution { .. } => "prove_resolution",
            PoolInstruction::ClaimRewards { .. } => "claim_rewards",
        }
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut data = instruction_discriminator(self.method_name()).to_vec();
        match self {
            PoolInstruction::InitializeConfig(params) | PoolInstruction::UpdateConfig(params) => {
                params.serialize(&mut data)?
            }
            PoolInstruction::CreatePool {
                question_id,
                prediction_end_time,
            } => {
                question_id.serialize(&mut data)?;
                prediction_end_time.serialize(&mut data)?;
            }
            PoolInstruction::Predict {
                prediction_id,
                pred,
                stake,
            } => {
                prediction_id.serialize(&mut data)?;
                pred.serialize(&mut data)?;
                stake.serialize(&mut data)?;
            }
            PoolInstruction::ResolvePool {
                prize_amounts,
                merkle_root,
            } => {
                prize_amounts.serialize(&mut data)?;
                merkle_root.serialize(&mut data)?;
            }
            PoolInstruction::ProveResolution { root } => root.serialize(&mut data)?,
            PoolInstruction::ClaimRewards { amount, proof } => {
                amount.serialize(&mut data)?;
                proof.serialize(&mut data)?;
            }
        }
        Ok(data)
    }

    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(ClientError::Encoding(format!(
                "instruction data too short: {} bytes",
                data.len()
            )));
        }
        let (tag, mut args) = data.split_at(DISCRIMINATOR_LEN);

        let matches = |method: &str| tag == &instruction_discriminator(method)[..];

        let instruction = if matches("initialize") {
            PoolInstruction::InitializeConfig(ConfigParams::deserialize(&mut args)?)
        } else if matches("update_config") {
            PoolInstruction::UpdateConfig(ConfigParams::deserialize(&mut args)?)
        } else if matches("create_pool") {
            PoolInstruction::CreatePool {
                question_id: <[u8; 16]>::deserialize(&mut args)?,
                prediction_end_time: i64::deserialize(&mut args)?,
            }
        } else if matches("predict") {
            PoolInstruction::Predict {
                prediction_id: <[u8; 16]>::deserialize(&mut args)?,
                pred: u8::deserialize(&mut args)?,
                stake: u64::deserialize(&mut args)?,
            }
        } else if matches("resolve_pool") {
            PoolInstruction::ResolvePool {
                prize_amounts: Vec::<u64>::deserialize(&mut args)?,
                merkle_root: <[u8; 32]>::deserialize(&mut args)?,
            }
        } else if matches("prove_resolution") {
            PoolInstruction::ProveResolution {
                root: <[u8; 32]>::deserialize(&mut args)?,
            }
        } else if matches("claim_rewards") {
            PoolInstruction::ClaimRewards {
                amount: u64::deserialize(&mut args)?,
                proof: Vec::<[u8; 32]>::deserialize(&mut args)?,
            }
        } else {
            return Err(ClientError::Encoding(format!(
                "unknown instruction discriminator {:?}",
                tag
            )));
        };

        if !args.is_empty() {
            return Err(ClientError::Encoding(format!(
                "{} trailing bytes after {}",
                args.len(),
                instruction.method_name()
            )));
        }
        Ok(instruction)
    }
}

/// Accounts shared by the predict and claim handlers
#[derive(Debug, Clone, Copy)]
pub struct StakeAccounts {
    pub predictor: Pubkey,
    pub pool: Pubkey,
    pub prediction: Pubkey,
    pub predictor_value_account: Pubkey,
    pub pool_value_account: Pubkey,
    pub wsol_mint: Pubkey,
    pub token_program: Pubkey,
}

/// Accounts shared by the resolve and prove handlers
#[derive(Debug, Clone, Copy)]
pub struct ResolutionAccounts {
    pub authority: Pubkey,
    pub pool: Pubkey,
    pub pool_value_account: Pubkey,
    pub treasury_value_account: Pubkey,
    pub config: Pubkey,
    pub wsol_mint: Pubkey,
    pub token_program: Pubkey,
}

impl ResolutionAccounts {
    fn to_account_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.authority, true),
            AccountMeta::new(self.pool, false),
            AccountMeta::new(self.pool_value_account, false),
            AccountMeta::new(self.treasury_value_account, false),
            AccountMeta::new_readonly(self.config, false),
            AccountMeta::new_readonly(self.wsol_mint, false),
            AccountMeta::new_readonly(self.token_program, false),
        ]
    }
}

pub fn initialize_config(
    program_id: &Pubkey,
    admin: &Pubkey,
    config_pda: &Pubkey,
    params: ConfigParams,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(*config_pda, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: PoolInstruction::InitializeConfig(params).pack()?,
    })
}

pub fn update_config(
    program_id: &Pubkey,
    admin: &Pubkey,
    config_pda: &Pubkey,
    params: ConfigParams,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(*config_pda, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: PoolInstruction::UpdateConfig(params).pack()?,
    })
}

pub fn create_pool(
    program_id: &Pubkey,
    admin: &Pubkey,
    pool_pda: &Pubkey,
    question_id: [u8; 16],
    prediction_end_time: i64,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(*pool_pda, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: PoolInstruction::CreatePool {
            question_id,
            prediction_end_time,
        }
        .pack()?,
    })
}

pub fn predict(
    program_id: &Pubkey,
    accounts: &StakeAccounts,
    prediction_id: [u8; 16],
    pred: u8,
    stake: u64,
) -> Result<Instruction> {
    let metas = vec![
        AccountMeta::new(accounts.predictor, true),
        AccountMeta::new(accounts.pool, false),
        AccountMeta::new(accounts.prediction, false),
        AccountMeta::new(accounts.predictor_value_account, false),
        AccountMeta::new(accounts.pool_value_account, false),
        AccountMeta::new_readonly(accounts.wsol_mint, false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(accounts.token_program, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts: metas,
        data: PoolInstruction::Predict {
            prediction_id,
            pred,
            stake,
        }
        .pack()?,
    })
}

/// Resolve instruction with one trailing writable prediction account per
/// prize, in prize order
pub fn resolve_pool(
    program_id: &Pubkey,
    accounts: &ResolutionAccounts,
    prize_amounts: Vec<u64>,
    merkle_root: [u8; 32],
    predictions: &[Pubkey],
) -> Result<Instruction> {
    if predictions.len() != prize_amounts.len() {
        return Err(ClientError::PrizeCountMismatch {
            participants: predictions.len(),
            prizes: prize_amounts.len(),
        });
    }

    let mut metas = accounts.to_account_metas();
    metas.extend(
        predictions
            .iter()
            .map(|prediction| AccountMeta::new(*prediction, false)),
    );

    Ok(Instruction {
        program_id: *program_id,
        accounts: metas,
        data: PoolInstruction::ResolvePool {
            prize_amounts,
            merkle_root,
        }
        .pack()?,
    })
}

pub fn prove_resolution(
    program_id: &Pubkey,
    accounts: &ResolutionAccounts,
    root: [u8; 32],
) -> Result<Instruction> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: accounts.to_account_metas(),
        data: PoolInstruction::ProveResolution { root }.pack()?,
    })
}

pub fn claim_rewards(
    program_id: &Pubkey,
    accounts: &StakeAccounts,
    amount: u64,
    proof: Vec<[u8; 32]>,
) -> Result<Instruction> {
    let metas = vec![
        AccountMeta::new(accounts.predictor, true),
        AccountMeta::new(accounts.prediction, false),
        AccountMeta::new(accounts.pool, false),
        AccountMeta::new(accounts.predictor_value_account, false),
        AccountMeta::new(accounts.pool_value_account, false),
        AccountMeta::new_readonly(accounts.wsol_mint, false),
        AccountMeta::new_readonly(accounts.token_program, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts: metas,
        data: PoolInstruction::ClaimRewards { amount, proof }.pack()?,
    })
}
