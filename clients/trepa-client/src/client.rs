//! Entry point wiring configuration, ledger access and assembly together

use std::sync::Arc;
use tracing::info;

use crate::{
    assembler::TransactionAssembler,
    clock::{Clock, SystemClock},
    config::{ClientConfig, ConfigError},
    error::Result,
    pda::AddressDeriver,
    prober::{AccountProber, RpcAccountProber},
    prizes::PrizeCalculator,
    reader::AccountReader,
    state::ConfigRecord,
};

pub struct PoolClient {
    config: ClientConfig,
    assembler: TransactionAssembler,
    reader: AccountReader,
}

impl PoolClient {
    /// Client talking to the configured RPC node
    pub fn from_config(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let prober = Arc::new(RpcAccountProber::new(
            config.rpc.url.clone(),
            config.commitment_config()?,
            config.request_timeout(),
        ));
        Ok(Self::with_prober(config, prober, Arc::new(SystemClock)))
    }

    pub fn with_prober(
        config: ClientConfig,
        prober: Arc<dyn AccountProber>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let program = &config.program;
        let deriver = AddressDeriver::new(program.program_id, program.protocol_version);
        let reader = AccountReader::new(deriver, prober.clone());
        let assembler = TransactionAssembler::new(program.clone(), prober, clock);

        info!(
            program_id = %program.program_id,
            protocol_version = ?program.protocol_version,
            "Pool client ready"
        );

        Self {
            config,
            assembler,
            reader,
        }
    }

    /// Fetch the platform config so assembly can check stake bounds and use
    /// the on-ledger treasury
    pub async fn load_config_record(&mut self) -> Result<Option<ConfigRecord>> {
        let record = self.reader.fetch_config().await?;
        self.assembler.set_config_record(record);
        Ok(record)
    }

    /// Prize calculator using the loaded config record's fee and cap
    pub fn prize_calculator(&self) -> Option<PrizeCalculator> {
        self.assembler
            .config_record()
            .map(PrizeCalculator::from_config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn assembler(&self) -> &TransactionAssembler {
        &self.assembler
    }

    pub fn reader(&self) -> &AccountReader {
        &self.reader
    }
}
