//! # Node Configuration
//!
//! The TOML file a node starts from: vault parameters, who holds which
//! capability, the initial signer committee, and the balances the asset
//! ledger is seeded with on first start. Once a state snapshot exists the
//! vault and ledger sections are ignored; roles are always taken from here.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use meridian_protocol::config::{VaultConfig, ONE_ASSET};
use meridian_protocol::ledger::InMemoryLedger;
use meridian_protocol::permissions::{Capability, RoleTable};
use meridian_protocol::types::{amount_serde, Address, Amount};

/// Capability holders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    /// Holders of `Admin`.
    pub admins: Vec<Address>,
    /// Holders of `RateUpdater`.
    pub rate_updaters: Vec<Address>,
}

/// One seeded ledger balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: Address,
    pub holder: Address,
    #[serde(with = "amount_serde")]
    pub amount: Amount,
}

/// Top-level node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Initial signer committee.
    pub signers: Vec<Address>,
    pub vault: VaultConfig,
    pub roles: RolesConfig,
    /// Genesis ledger balances.
    pub balances: Vec<BalanceEntry>,
}

impl Default for NodeConfig {
    /// A devnet setup: three signers, one admin who is also the rate
    /// updater, and a funded depositor.
    fn default() -> Self {
        let vault = VaultConfig::default();
        let admin = Address::from_low_u8(0xad);
        Self {
            signers: vec![
                Address::from_low_u8(0x51),
                Address::from_low_u8(0x52),
                Address::from_low_u8(0x53),
            ],
            roles: RolesConfig {
                admins: vec![admin],
                rate_updaters: vec![admin],
            },
            balances: vec![BalanceEntry {
                asset: vault.asset,
                holder: Address::from_low_u8(0x01),
                amount: 1_000_000 * ONE_ASSET,
            }],
            vault,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Checks what the vault itself cannot: the file must name at least one
    /// admin and no zero addresses in the role lists.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.vault.validate()?;
        if self.roles.admins.is_empty() {
            anyhow::bail!("at least one admin must be configured");
        }
        if let Some(zero) = self
            .roles
            .admins
            .iter()
            .chain(&self.roles.rate_updaters)
            .find(|a| a.is_zero())
        {
            anyhow::bail!("role holder {} is the zero address", zero);
        }
        Ok(())
    }

    /// Builds the capability table from the `roles` section.
    pub fn role_table(&self) -> RoleTable {
        let table = RoleTable::new();
        for admin in &self.roles.admins {
            table.grant(Capability::Admin, *admin);
        }
        for updater in &self.roles.rate_updaters {
            table.grant(Capability::RateUpdater, *updater);
        }
        table
    }

    /// Builds the genesis ledger from the `balances` section.
    pub fn genesis_ledger(&self) -> anyhow::Result<InMemoryLedger> {
        let mut ledger = InMemoryLedger::new();
        for entry in &self.balances {
            ledger
                .credit(entry.asset, entry.holder, entry.amount)
                .with_context(|| format!("failed to seed balance for {}", entry.holder))?;
        }
        Ok(ledger)
    }
}
