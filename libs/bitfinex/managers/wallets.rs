use super::{f64_at, opt_f64_at, records, str_at, PayloadError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Wallet balance: `[WALLET_TYPE, CURRENCY, BALANCE, UNSETTLED_INTEREST, BALANCE_AVAILABLE]`
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub wallet_type: String,
    pub currency: String,
    pub balance: f64,
    pub unsettled_interest: f64,
    pub available: Option<f64>,
}

impl Wallet {
    fn from_fields(fields: &[Value]) -> Result<Self, PayloadError> {
        Ok(Self {
            wallet_type: str_at(fields, 0, "wallet_type")?.to_string(),
            currency: str_at(fields, 1, "currency")?.to_string(),
            balance: f64_at(fields, 2, "balance")?,
            unsettled_interest: opt_f64_at(fields, 3).unwrap_or(0.0),
            available: opt_f64_at(fields, 4),
        })
    }

    pub fn from_payload(payload: &Value) -> Result<Vec<Self>, PayloadError> {
        records(payload)?.into_iter().map(Self::from_fields).collect()
    }
}

/// Balances keyed by (currency, wallet type)
#[derive(Default)]
pub struct WalletManager {
    wallets: RwLock<BTreeMap<(String, String), Wallet>>,
}

impl WalletManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ws`: replace the table
    pub fn handle_snapshot(&self, payload: &Value) -> Result<(), PayloadError> {
        let wallets = Wallet::from_payload(payload)?;
        let mut table = self.wallets.write();
        table.clear();
        for wallet in wallets {
            table.insert((wallet.currency.clone(), wallet.wallet_type.clone()), wallet);
        }
        Ok(())
    }

    /// `wu`: upsert one wallet
    pub fn handle_update(&self, payload: &Value) -> Result<(), PayloadError> {
        let wallets = Wallet::from_payload(payload)?;
        let mut table = self.wallets.write();
        for wallet in wallets {
            table.insert((wallet.currency.clone(), wallet.wallet_type.clone()), wallet);
        }
        Ok(())
    }

    pub fn wallet(&self, currency: &str, wallet_type: &str) -> Option<Wallet> {
        self.wallets
            .read()
            .get(&(currency.to_string(), wallet_type.to_string()))
            .cloned()
    }

    /// All wallets ordered by currency, then type
    pub fn wallets(&self) -> Vec<Wallet> {
        self.wallets.read().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.wallets.write().clear();
    }
}
