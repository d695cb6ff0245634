//! Atomic transaction assembly for pool intents
//!
//! Each intent runs a fresh pipeline `Start -> AccountsResolved ->
//! InstructionsComposed -> Finalized`. Conditional steps are small functions
//! returning zero or one instruction, appended in a fixed order. Nothing here
//! signs or submits.

use solana_sdk::{
    instruction::Instruction, message::Message, pubkey::Pubkey, system_instruction,
    transaction::Transaction,
};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    clock::Clock,
    config::ProgramSettings,
    error::{ClientError, Result},
    identifier::Identifier,
    instruction::{self, ConfigParams, PoolInstruction, ResolutionAccounts, StakeAccounts},
    pda::{value_account_address, AddressDeriver, DerivedAddress, PredictionKey},
    prizes::{PrizeSchedule, MAX_PREDICTION_VALUE},
    prober::AccountProber,
    state::ConfigRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    InitializeConfig,
    UpdateConfig,
    CreatePool,
    PlacePrediction,
    ResolvePool,
    ProveResolution,
    ClaimReward,
    BatchTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssemblyStage {
    Start,
    AccountsResolved,
    InstructionsComposed,
    Finalized,
}

/// Addresses derived while assembling, kept for post-submission checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedAccounts {
    pub config: Option<DerivedAddress>,
    pub pool: Option<DerivedAddress>,
    pub prediction: Option<DerivedAddress>,
    /// Trailing prediction accounts of a resolve, in prize order
    pub predictions: Vec<Pubkey>,
    pub participant_value_account: Option<Pubkey>,
    pub pool_value_account: Option<Pubkey>,
    pub treasury_value_account: Option<Pubkey>,
}

/// A fully ordered, unsigned transaction for one intent
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub intent: Intent,
    pub payer: Pubkey,
    pub instructions: Vec<Instruction>,
    pub accounts: DerivedAccounts,
}

impl AssembledTransaction {
    pub fn message(&self) -> Message {
        Message::new(&self.instructions, Some(&self.payer))
    }

    /// Unsigned transaction; the caller sets a blockhash and signs
    pub fn to_transaction(&self) -> Transaction {
        Transaction::new_unsigned(self.message())
    }
}

/// Per-intent pipeline state
struct Assembly {
    intent: Intent,
    payer: Pubkey,
    stage: AssemblyStage,
    accounts: DerivedAccounts,
    instructions: Vec<Instruction>,
}

impl Assembly {
    fn start(intent: Intent, payer: Pubkey) -> Self {
        debug!(?intent, %payer, "Assembly started");
        Self {
            intent,
            payer,
            stage: AssemblyStage::Start,
            accounts: DerivedAccounts::default(),
            instructions: Vec::new(),
        }
    }

    fn advance(&mut self, next: AssemblyStage) {
        debug_assert!(next > self.stage);
        debug!(intent = ?self.intent, from = ?self.stage, to = ?next, "Assembly stage");
        self.stage = next;
    }

    fn resolved(mut self, accounts: DerivedAccounts) -> Self {
        self.accounts = accounts;
        self.advance(AssemblyStage::AccountsResolved);
        self
    }

    fn push(&mut self, step: Option<Instruction>) {
        if let Some(ix) = step {
            self.instructions.push(ix);
        }
    }

    fn composed(mut self) -> Self {
        self.advance(AssemblyStage::InstructionsComposed);
        self
    }

    fn finish(mut self) -> AssembledTransaction {
        self.advance(AssemblyStage::Finalized);
        info!(
            intent = ?self.intent,
            payer = %self.payer,
            instructions = self.instructions.len(),
            "Transaction assembled"
        );
        AssembledTransaction {
            intent: self.intent,
            payer: self.payer,
            instructions: self.instructions,
            accounts: self.accounts,
        }
    }
}

/// Create `owner`'s value account unless it already exists. The idempotent
/// form still succeeds if a concurrent transaction created it first.
pub fn ensure_value_account(
    exists: bool,
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Option<Instruction> {
    if exists {
        None
    } else {
        Some(create_associated_token_account_idempotent(
            payer,
            owner,
            mint,
            token_program,
        ))
    }
}

/// Move native balance into a value account
pub fn fund_value_account(from: &Pubkey, value_account: &Pubkey, lamports: u64) -> Instruction {
    system_instruction::transfer(from, value_account, lamports)
}

/// Stake carried by the first predict instruction for `program_id` in a
/// submitted transaction, `None` if it holds no prediction
pub fn staked_amount(transaction: &Transaction, program_id: &Pubkey) -> Result<Option<u64>> {
    let keys = &transaction.message.account_keys;
    for compiled in &transaction.message.instructions {
        if keys.get(compiled.program_id_index as usize) != Some(program_id) {
            continue;
        }
        if let PoolInstruction::Predict { stake, .. } = PoolInstruction::unpack(&compiled.data)? {
            return Ok(Some(stake));
        }
    }
    Ok(None)
}

/// Bring the wrapped balance in line with the account's lamports
pub fn sync_value_account(token_program: &Pubkey, value_account: &Pubkey) -> Result<Instruction> {
    Ok(spl_token::instruction::sync_native(
        token_program,
        value_account,
    )?)
}

/// Close a value account, returning its balance to the owner as native value
pub fn unwrap_value_account(
    token_program: &Pubkey,
    value_account: &Pubkey,
    owner: &Pubkey,
) -> Result<Instruction> {
    Ok(spl_token::instruction::close_account(
        token_program,
        value_account,
        owner,
        owner,
        &[],
    )?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionRequest {
    pub participant: Pubkey,
    pub pool_id: Identifier,
    pub prediction_id: Identifier,
    /// 0..=100
    pub value: u8,
    /// Base units
    pub stake: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub key: PredictionKey,
    pub pool_id: Identifier,
    pub amount: u64,
    pub proof: Vec<[u8; 32]>,
}

/// Builds one atomic transaction per intent
pub struct TransactionAssembler {
    deriver: AddressDeriver,
    settings: ProgramSettings,
    prober: Arc<dyn AccountProber>,
    clock: Arc<dyn Clock>,
    config: Option<ConfigRecord>,
}

impl TransactionAssembler {
    pub fn new(
        settings: ProgramSettings,
        prober: Arc<dyn AccountProber>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            deriver: AddressDeriver::new(settings.program_id, settings.protocol_version),
            settings,
            prober,
            clock,
            config: None,
        }
    }

    /// Use a fetched config record for stake bounds and the treasury
    pub fn with_config_record(mut self, config: ConfigRecord) -> Self {
        self.config = Some(config);
        self
    }

    pub fn set_config_record(&mut self, config: Option<ConfigRecord>) {
        self.config = config;
    }

    pub fn config_record(&self) -> Option<&ConfigRecord> {
        self.config.as_ref()
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    pub fn settings(&self) -> &ProgramSettings {
        &self.settings
    }

    fn program_id(&self) -> &Pubkey {
        &self.settings.program_id
    }

    fn value_account(&self, owner: &Pubkey) -> Pubkey {
        value_account_address(owner, &self.settings.wsol_mint, &self.settings.token_program)
    }

    fn treasury(&self) -> Result<Pubkey> {
        self.config
            .as_ref()
            .map(|config| config.treasury)
            .or(self.settings.treasury)
            .ok_or(ClientError::MissingTreasury)
    }

    pub fn initialize_config(
        &self,
        admin: &Pubkey,
        params: ConfigParams,
    ) -> Result<AssembledTransaction> {
        self.config_instruction(Intent::InitializeConfig, admin, params)
    }

    pub fn update_config(
        &self,
        admin: &Pubkey,
        params: ConfigParams,
    ) -> Result<AssembledTransaction> {
        self.config_instruction(Intent::UpdateConfig, admin, params)
    }

    fn config_instruction(
        &self,
        intent: Intent,
        admin: &Pubkey,
        params: ConfigParams,
    ) -> Result<AssembledTransaction> {
        if params.min_stake > params.max_stake {
            return Err(ClientError::InvalidAmount {
                input: format!("{}..{}", params.min_stake, params.max_stake),
                reason: "min_stake above max_stake".to_string(),
            });
        }

        let config = self.deriver.config();
        let mut assembly = Assembly::start(intent, *admin).resolved(DerivedAccounts {
            config: Some(config),
            ..Default::default()
        });

        let ix = match intent {
            Intent::InitializeConfig => {
                instruction::initialize_config(self.program_id(), admin, &config.address, params)?
            }
            _ => instruction::update_config(self.program_id(), admin, &config.address, params)?,
        };
        assembly.push(Some(ix));

        Ok(assembly.composed().finish())
    }

    /// Create a pool that accepts predictions until `end_time`
    pub fn create_pool(
        &self,
        admin: &Pubkey,
        pool_id: &Identifier,
        end_time: i64,
    ) -> Result<AssembledTransaction> {
        let now = self.clock.unix_timestamp();
        if end_time <= now {
            return Err(ClientError::InvalidEndTime { end_time, now });
        }

        let pool = self.deriver.pool(pool_id);
        let mut assembly = Assembly::start(Intent::CreatePool, *admin).resolved(DerivedAccounts {
            pool: Some(pool),
            ..Default::default()
        });

        assembly.push(Some(instruction::create_pool(
            self.program_id(),
            admin,
            &pool.address,
            pool_id.to_bytes(),
            end_time,
        )?));

        debug!(pool_id = %pool_id, pool = %pool.address, end_time, "Pool creation composed");
        Ok(assembly.composed().finish())
    }

    /// Stake on a prediction: create missing value accounts, fund, sync,
    /// then predict
    pub async fn place_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<AssembledTransaction> {
        if request.value > MAX_PREDICTION_VALUE {
            return Err(ClientError::InvalidPredictionValue(request.value));
        }
        if let Some(config) = &self.config {
            config.check_stake(request.stake)?;
        }

        let participant = request.participant;
        let pool = self.deriver.pool(&request.pool_id);
        let prediction = self.deriver.prediction(
            &pool.address,
            &PredictionKey::with_id(participant, request.prediction_id),
        )?;
        let participant_value = self.value_account(&participant);
        let pool_value = self.value_account(&pool.address);

        let (participant_value_exists, pool_value_exists) = tokio::try_join!(
            self.prober.exists(&participant_value),
            self.prober.exists(&pool_value)
        )?;
        debug!(
            %participant_value,
            participant_value_exists,
            %pool_value,
            pool_value_exists,
            "Probed value accounts"
        );

        let mut assembly =
            Assembly::start(Intent::PlacePrediction, participant).resolved(DerivedAccounts {
                pool: Some(pool),
                prediction: Some(prediction),
                participant_value_account: Some(participant_value),
                pool_value_account: Some(pool_value),
                ..Default::default()
            });

        let mint = &self.settings.wsol_mint;
        let token_program = &self.settings.token_program;

        assembly.push(ensure_value_account(
            participant_value_exists,
            &participant,
            &participant,
            mint,
            token_program,
        ));
        assembly.push(ensure_value_account(
            pool_value_exists,
            &participant,
            &pool.address,
            mint,
            token_program,
        ));
        assembly.push(Some(fund_value_account(
            &participant,
            &participant_value,
            request.stake,
        )));
        assembly.push(Some(sync_value_account(token_program, &participant_value)?));
        assembly.push(Some(instruction::predict(
            self.program_id(),
            &StakeAccounts {
                predictor: participant,
                pool: pool.address,
                prediction: prediction.address,
                predictor_value_account: participant_value,
                pool_value_account: pool_value,
                wsol_mint: *mint,
                token_program: *token_program,
            },
            request.prediction_id.to_bytes(),
            request.value,
            request.stake,
        )?));

        Ok(assembly.composed().finish())
    }

    fn resolution_accounts(
        &self,
        authority: &Pubkey,
        pool: &DerivedAddress,
    ) -> Result<(ResolutionAccounts, DerivedAccounts)> {
        let treasury = self.treasury()?;
        let config = self.deriver.config();
        let pool_value = self.value_account(&pool.address);
        let treasury_value = self.value_account(&treasury);

        let accounts = ResolutionAccounts {
            authority: *authority,
            pool: pool.address,
            pool_value_account: pool_value,
            treasury_value_account: treasury_value,
            config: config.address,
            wsol_mint: self.settings.wsol_mint,
            token_program: self.settings.token_program,
        };
        let derived = DerivedAccounts {
            config: Some(config),
            pool: Some(*pool),
            pool_value_account: Some(pool_value),
            treasury_value_account: Some(treasury_value),
            ..Default::default()
        };
        Ok((accounts, derived))
    }

    /// Write per-participant prizes and commit the Merkle root
    pub fn resolve_pool(
        &self,
        admin: &Pubkey,
        pool_id: &Identifier,
        participants: &[PredictionKey],
        prizes: &[u64],
        merkle_root: [u8; 32],
    ) -> Result<AssembledTransaction> {
        if participants.len() != prizes.len() {
            return Err(ClientError::PrizeCountMismatch {
                participants: participants.len(),
                prizes: prizes.len(),
            });
        }

        let pool = self.deriver.pool(pool_id);
        let predictions = participants
            .iter()
            .map(|key| {
                self.deriver
                    .prediction(&pool.address, key)
                    .map(|derived| derived.address)
            })
            .collect::<Result<Vec<_>>>()?;

        let (accounts, mut derived) = self.resolution_accounts(admin, &pool)?;
        derived.predictions = predictions.clone();

        let mut assembly = Assembly::start(Intent::ResolvePool, *admin).resolved(derived);
        assembly.push(Some(instruction::resolve_pool(
            self.program_id(),
            &accounts,
            prizes.to_vec(),
            merkle_root,
            &predictions,
        )?));

        debug!(pool = %pool.address, participants = predictions.len(), "Resolution composed");
        Ok(assembly.composed().finish())
    }

    pub fn resolve_with_schedule(
        &self,
        admin: &Pubkey,
        pool_id: &Identifier,
        schedule: &PrizeSchedule,
        merkle_root: [u8; 32],
    ) -> Result<AssembledTransaction> {
        self.resolve_pool(
            admin,
            pool_id,
            &schedule.participants(),
            &schedule.prizes(),
            merkle_root,
        )
    }

    /// Finalize a pool that is being resolved
    pub fn prove_resolution(
        &self,
        authority: &Pubkey,
        pool_id: &Identifier,
        root: [u8; 32],
    ) -> Result<AssembledTransaction> {
        let pool = self.deriver.pool(pool_id);
        let (accounts, derived) = self.resolution_accounts(authority, &pool)?;

        let mut assembly = Assembly::start(Intent::ProveResolution, *authority).resolved(derived);
        assembly.push(Some(instruction::prove_resolution(
            self.program_id(),
            &accounts,
            root,
        )?));

        Ok(assembly.composed().finish())
    }

    /// Claim a prize and unwrap it to native balance. A repeated claim is
    /// still assembled; the program rejects it on submission.
    pub async fn claim_reward(&self, request: &ClaimRequest) -> Result<AssembledTransaction> {
        let participant = request.key.participant;
        let pool = self.deriver.pool(&request.pool_id);
        let prediction = self.deriver.prediction(&pool.address, &request.key)?;
        let participant_value = self.value_account(&participant);
        let pool_value = self.value_account(&pool.address);

        let participant_value_exists = self.prober.exists(&participant_value).await?;
        debug!(%participant_value, participant_value_exists, "Probed value account");

        let mut assembly =
            Assembly::start(Intent::ClaimReward, participant).resolved(DerivedAccounts {
                pool: Some(pool),
                prediction: Some(prediction),
                participant_value_account: Some(participant_value),
                pool_value_account: Some(pool_value),
                ..Default::default()
            });

        let mint = &self.settings.wsol_mint;
        let token_program = &self.settings.token_program;

        assembly.push(ensure_value_account(
            participant_value_exists,
            &participant,
            &participant,
            mint,
            token_program,
        ));
        assembly.push(Some(instruction::claim_rewards(
            self.program_id(),
            &StakeAccounts {
                predictor: participant,
                pool: pool.address,
                prediction: prediction.address,
                predictor_value_account: participant_value,
                pool_value_account: pool_value,
                wsol_mint: *mint,
                token_program: *token_program,
            },
            request.amount,
            request.proof.clone(),
        )?));
        assembly.push(Some(unwrap_value_account(
            token_program,
            &participant_value,
            &participant,
        )?));

        Ok(assembly.composed().finish())
    }

    /// Pay native value from `from` to each recipient in one transaction
    pub fn batch_transfer(
        &self,
        from: &Pubkey,
        recipients: &[Pubkey],
        amounts: &[u64],
    ) -> Result<AssembledTransaction> {
        if recipients.len() != amounts.len() {
            return Err(ClientError::RecipientCountMismatch {
                recipients: recipients.len(),
                amounts: amounts.len(),
            });
        }

        let mut assembly =
            Assembly::start(Intent::BatchTransfer, *from).resolved(DerivedAccounts::default());
        for (recipient, lamports) in recipients.iter().zip(amounts) {
            assembly.push(Some(system_instruction::transfer(from, recipient, *lamports)));
        }

        debug!(%from, recipients = recipients.len(), "Batch transfer composed");
        Ok(assembly.composed().finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::FixedClock, prober::InMemoryLedger};

    const NOW: i64 = 1_700_000_000;

    fn assembler() -> TransactionAssembler {
        TransactionAssembler::new(
            ProgramSettings::default(),
            Arc::new(InMemoryLedger::new()),
            Arc::new(FixedClock(NOW)),
        )
    }

    #[test]
    fn test_conditional_creation_step() {
        let payer = Pubkey::new_unique();
        let mint = spl_token::native_mint::id();
        assert!(ensure_value_account(true, &payer, &payer, &mint, &spl_token::id()).is_none());

        let ix = ensure_value_account(false, &payer, &payer, &mint, &spl_token::id()).unwrap();
        assert_eq!(ix.program_id, spl_associated_token_account::id());
        // CreateIdempotent
        assert_eq!(ix.data, vec![1]);
    }

    #[test]
    fn test_unwrap_and_sync_target_token_program() {
        let owner = Pubkey::new_unique();
        let account = Pubkey::new_unique();
        let sync = sync_value_account(&spl_token::id(), &account).unwrap();
        assert_eq!(sync.program_id, spl_token::id());

        let close = unwrap_value_account(&spl_token::id(), &account, &owner).unwrap();
        assert_eq!(close.accounts[0].pubkey, account);
        assert_eq!(close.accounts[1].pubkey, owner);

        // any other program id is refused
        assert!(sync_value_account(&Pubkey::new_unique(), &account).is_err());
    }

    #[test]
    fn test_create_pool_end_time() {
        let admin = Pubkey::new_unique();
        let pool_id = Identifier::generate();

        for end_time in [NOW - 1, NOW] {
            let err = assembler().create_pool(&admin, &pool_id, end_time).unwrap_err();
            assert!(matches!(err, ClientError::InvalidEndTime { now: NOW, .. }));
        }

        let tx = assembler().create_pool(&admin, &pool_id, NOW + 1).unwrap();
        assert_eq!(tx.intent, Intent::CreatePool);
        assert_eq!(tx.instructions.len(), 1);
        assert_eq!(tx.payer, admin);
    }

    #[test]
    fn test_config_intents() {
        let admin = Pubkey::new_unique();
        let params = ConfigParams {
            min_stake: 1_000_000,
            max_stake: 100_000_000_000,
            max_roi: 50_000,
            platform_fee: 500,
            treasury: Pubkey::new_unique(),
        };

        let init = assembler().initialize_config(&admin, params).unwrap();
        let update = assembler().update_config(&admin, params).unwrap();
        assert_eq!(init.accounts.config, update.accounts.config);
        assert_eq!(init.instructions[0].accounts.len(), 3);
        assert_eq!(update.instructions[0].accounts.len(), 2);

        let inverted = ConfigParams {
            min_stake: 10,
            max_stake: 1,
            ..params
        };
        assert!(assembler().update_config(&admin, inverted).is_err());
    }

    #[test]
    fn test_treasury_falls_back_to_settings() {
        let admin = Pubkey::new_unique();
        let pool_id = Identifier::generate();
        let err = assembler()
            .prove_resolution(&admin, &pool_id, [1u8; 32])
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingTreasury));

        let treasury = Pubkey::new_unique();
        let settings = ProgramSettings {
            treasury: Some(treasury),
            ..ProgramSettings::default()
        };
        let assembler = TransactionAssembler::new(
            settings,
            Arc::new(InMemoryLedger::new()),
            Arc::new(FixedClock(NOW)),
        );
        let tx = assembler.prove_resolution(&admin, &pool_id, [1u8; 32]).unwrap();
        assert_eq!(
            tx.accounts.treasury_value_account,
            Some(value_account_address(
                &treasury,
                &spl_token::native_mint::id(),
                &spl_token::id()
            ))
        );
    }

    #[test]
    fn test_transaction_is_unsigned() {
        let admin = Pubkey::new_unique();
        let tx = assembler()
            .create_pool(&admin, &Identifier::generate(), NOW + 60)
            .unwrap()
            .to_transaction();
        assert_eq!(tx.message.account_keys[0], admin);
        assert_eq!(tx.signatures.len(), 1);
        assert!(!tx.is_signed());
    }

    #[test]
    fn test_batch_transfer() {
        let from = Pubkey::new_unique();
        let recipients = [Pubkey::new_unique(), Pubkey::new_unique()];
        let tx = assembler()
            .batch_transfer(&from, &recipients, &[5_000, 7_000])
            .unwrap();

        assert_eq!(tx.intent, Intent::BatchTransfer);
        assert_eq!(tx.payer, from);
        assert_eq!(
            tx.instructions,
            vec![
                system_instruction::transfer(&from, &recipients[0], 5_000),
                system_instruction::transfer(&from, &recipients[1], 7_000),
            ]
        );

        let err = assembler()
            .batch_transfer(&from, &recipients, &[5_000])
            .unwrap_err();
        assert_eq!(err.error_code(), "RECIPIENT_COUNT_MISMATCH");
        assert!(!err.is_retryable());
    }
}
