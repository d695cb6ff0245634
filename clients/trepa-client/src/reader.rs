//! Fetch and decode pool program records

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::Result,
    identifier::Identifier,
    pda::{AddressDeriver, PredictionKey},
    prober::AccountProber,
    state::{AccountRecord, ConfigRecord, PoolRecord, PredictionRecord},
};

pub struct AccountReader {
    deriver: AddressDeriver,
    prober: Arc<dyn AccountProber>,
}

impl AccountReader {
    pub fn new(deriver: AddressDeriver, prober: Arc<dyn AccountProber>) -> Self {
        Self { deriver, prober }
    }

    /// Fetch and decode a record at a known address
    pub async fn fetch<T: AccountRecord>(&self, address: &Pubkey) -> Result<Option<T>> {
        let Some(data) = self.prober.get_account_data(address).await? else {
            debug!(%address, kind = %T::KIND, "Record not found");
            return Ok(None);
        };
        T::decode(&data).map(Some)
    }

    pub async fn fetch_config(&self) -> Result<Option<ConfigRecord>> {
        self.fetch(&self.deriver.config().address).await
    }

    pub async fn fetch_pool(&self, pool_id: &Identifier) -> Result<Option<PoolRecord>> {
        self.fetch(&self.deriver.pool(pool_id).address).await
    }

    pub async fn fetch_prediction(
        &self,
        pool: &Pubkey,
        key: &PredictionKey,
    ) -> Result<Option<PredictionRecord>> {
        let address = self.deriver.prediction(pool, key)?.address;
        self.fetch(&address).await
    }
}
