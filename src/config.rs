use crate::error::{EngineError, EngineResult};
use crate::model::AddressFormat;

#[derive(Debug, Clone)]
pub struct CurrencyInfo {
    pub gap_limit: u32,
    pub network: String,
    pub currency_code: String,
}

// purpose types and extended keys proper belong to the keymanager
#[derive(Debug, Clone)]
pub struct WalletInfo {
    pub formats: Vec<AddressFormat>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub currency_info: CurrencyInfo,
    pub wallet_info: WalletInfo,
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.currency_info.gap_limit == 0 {
            return Err(EngineError::ConfigError(
                "gapLimit must be greater than zero".to_string(),
            ));
        }
        if self.wallet_info.formats.is_empty() {
            return Err(EngineError::ConfigError(
                "walletInfo must declare at least one address format".to_string(),
            ));
        }
        Ok(())
    }
}
