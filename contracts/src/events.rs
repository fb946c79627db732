//! # Vault Events
//!
//! Every committed state transition produces one or more [`VaultEvent`]s.
//! Events carry enough fields to reconstruct before/after values, so a
//! subscriber can audit the vault without reading its state.

use meridian_protocol::types::{amount_serde, Address, Amount, RequestId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::governance::SignerAction;

/// A notification emitted by a committed vault operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultEvent {
    /// The exchange rate was replaced.
    ExchangeRateUpdated {
        /// Who pushed the rate.
        updater: Address,
        /// Rate before the update.
        #[serde(with = "amount_serde")]
        previous: u128,
        /// Rate after the update.
        #[serde(with = "amount_serde")]
        current: u128,
        /// New `update_time`.
        updated_at: Timestamp,
    },

    /// The redemption period changed.
    RedemptionPeriodUpdated {
        /// Seconds before.
        previous: u64,
        /// Seconds after.
        current: u64,
    },

    /// The rate expire interval changed.
    ExpireIntervalUpdated {
        /// Seconds before.
        previous: u64,
        /// Seconds after.
        current: u64,
    },

    /// The minimum deposit changed.
    MinDepositUpdated {
        /// Asset units before.
        #[serde(with = "amount_serde")]
        previous: Amount,
        /// Asset units after.
        #[serde(with = "amount_serde")]
        current: Amount,
    },

    /// The minimum withdrawal changed.
    MinWithdrawalUpdated {
        /// Shares before.
        #[serde(with = "amount_serde")]
        previous: Amount,
        /// Shares after.
        #[serde(with = "amount_serde")]
        current: Amount,
    },

    /// The fee treasury changed.
    TreasuryUpdated {
        /// Treasury before.
        previous: Address,
        /// Treasury after.
        current: Address,
    },

    /// The performance fee changed.
    FeeBpsUpdated {
        /// Basis points before.
        previous: u16,
        /// Basis points after.
        current: u16,
    },

    /// Assets came in and shares went out.
    Deposited {
        /// Who paid the assets.
        caller: Address,
        /// Who received the shares.
        receiver: Address,
        /// Assets paid, also the principal credited.
        #[serde(with = "amount_serde")]
        assets: Amount,
        /// Shares minted.
        #[serde(with = "amount_serde")]
        shares: Amount,
    },

    /// Shares were burned and a request enqueued.
    WithdrawalRequested {
        /// Request id.
        id: RequestId,
        /// Holder whose shares were burned.
        owner: Address,
        /// Payout target.
        receiver: Address,
        /// Shares burned.
        #[serde(with = "amount_serde")]
        shares_burned: Amount,
        /// Floor value of the burned shares.
        #[serde(with = "amount_serde")]
        assets_gross: Amount,
        /// Principal retired.
        #[serde(with = "amount_serde")]
        cost_basis: Amount,
        /// Fee reserved for the treasury.
        #[serde(with = "amount_serde")]
        fee_amount: Amount,
        /// Assets reserved for the receiver.
        #[serde(with = "amount_serde")]
        assets_net: Amount,
        /// Request time.
        requested_at: Timestamp,
    },

    /// A request was paid out.
    WithdrawalClaimed {
        /// Request id.
        id: RequestId,
        /// Request owner (the caller).
        owner: Address,
        /// Who got `assets_net`.
        receiver: Address,
        /// Assets paid to the receiver.
        #[serde(with = "amount_serde")]
        assets_net: Amount,
        /// Assets paid to the treasury.
        #[serde(with = "amount_serde")]
        fee_amount: Amount,
        /// Treasury at claim time.
        treasury: Address,
    },

    /// Shares and their principal moved between holders.
    SharesTransferred {
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Shares moved.
        #[serde(with = "amount_serde")]
        shares: Amount,
        /// Principal that followed the shares.
        #[serde(with = "amount_serde")]
        principal_moved: Amount,
    },

    /// A whitelist proposal received an approval without executing.
    WhitelistApproval {
        /// Proposal id.
        id: u64,
        /// Approving signer.
        signer: Address,
        /// Proposed destination.
        target: Address,
        /// Proposed membership.
        allow: bool,
        /// Approvals recorded.
        approvals: usize,
        /// Threshold at evaluation time.
        required: usize,
    },

    /// A whitelist proposal executed.
    WhitelistUpdated {
        /// Proposal id.
        id: u64,
        /// Destination.
        target: Address,
        /// Membership before.
        previous: bool,
        /// Membership after.
        current: bool,
    },

    /// A signer-change proposal received an approval without executing.
    SignerChangeApproval {
        /// Approving signer.
        signer: Address,
        /// Proposed direction.
        action: SignerAction,
        /// Proposed signer.
        target: Address,
        /// Approvals recorded.
        approvals: usize,
        /// Threshold at evaluation time.
        required: usize,
    },

    /// A signer-change proposal executed.
    SignerSetUpdated {
        /// Direction.
        action: SignerAction,
        /// Signer added or removed.
        target: Address,
        /// Threshold before.
        previous_required: usize,
        /// Threshold after.
        required: usize,
        /// Set size after.
        signer_count: usize,
    },

    /// A cap-change proposal received an approval without executing.
    CapChangeApproval {
        /// Approving signer.
        signer: Address,
        /// Proposed cap.
        #[serde(with = "amount_serde")]
        target: Amount,
        /// Approvals recorded.
        approvals: usize,
        /// Threshold at evaluation time.
        required: usize,
    },

    /// A cap-change proposal executed.
    AssetsCapUpdated {
        /// Cap before.
        #[serde(with = "amount_serde")]
        previous: Amount,
        /// Cap after.
        #[serde(with = "amount_serde")]
        current: Amount,
    },

    /// A signer moved held assets to a whitelisted destination.
    ProtocolWithdrawal {
        /// Signer that initiated it.
        signer: Address,
        /// Asset moved.
        asset: Address,
        /// Amount moved.
        #[serde(with = "amount_serde")]
        amount: Amount,
        /// Whitelisted recipient.
        destination: Address,
    },
}

impl VaultEvent {
    /// Stable snake_case name, matching the serialised `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::ExchangeRateUpdated { .. } => "exchange_rate_updated",
            VaultEvent::RedemptionPeriodUpdated { .. } => "redemption_period_updated",
            VaultEvent::ExpireIntervalUpdated { .. } => "expire_interval_updated",
            VaultEvent::MinDepositUpdated { .. } => "min_deposit_updated",
            VaultEvent::MinWithdrawalUpdated { .. } => "min_withdrawal_updated",
            VaultEvent::TreasuryUpdated { .. } => "treasury_updated",
            VaultEvent::FeeBpsUpdated { .. } => "fee_bps_updated",
            VaultEvent::Deposited { .. } => "deposited",
            VaultEvent::WithdrawalRequested { .. } => "withdrawal_requested",
            VaultEvent::WithdrawalClaimed { .. } => "withdrawal_claimed",
            VaultEvent::SharesTransferred { .. } => "shares_transferred",
            VaultEvent::WhitelistApproval { .. } => "whitelist_approval",
            VaultEvent::WhitelistUpdated { .. } => "whitelist_updated",
            VaultEvent::SignerChangeApproval { .. } => "signer_change_approval",
            VaultEvent::SignerSetUpdated { .. } => "signer_set_updated",
            VaultEvent::CapChangeApproval { .. } => "cap_change_approval",
            VaultEvent::AssetsCapUpdated { .. } => "assets_cap_updated",
            VaultEvent::ProtocolWithdrawal { .. } => "protocol_withdrawal",
        }
    }
}
