//! # Vault Facade
//!
//! The entry points depositors, rate updaters, admins, and signers call.
//! Each method checks its preconditions in full, then applies its effects,
//! then (for claims and protocol withdrawals) moves assets through the
//! [`AssetLedger`]. A failed precondition leaves the vault untouched.
//!
//! ## State
//!
//! All mutable data lives in one [`VaultState`] aggregate. The vault pairs
//! it with its collaborators:
//!
//! - an [`AssetLedger`] holding the real token balances,
//! - a [`PermissionEngine`] answering admin / rate-updater checks,
//! - a [`Clock`] read lazily for staleness and redemption gating.
//!
//! ## Rounding
//!
//! Every conversion rounds against the caller. Deposits floor the shares
//! minted, mints ceil the assets charged, withdrawal requests floor the
//! assets owed.

use std::sync::Arc;

use meridian_protocol::clock::Clock;
use meridian_protocol::config::{VaultConfig, MAX_FEE_BPS};
use meridian_protocol::ledger::AssetLedger;
use meridian_protocol::math::{MathError, Rounding};
use meridian_protocol::permissions::{Capability, PermissionEngine};
use meridian_protocol::types::{amount_serde, Address, Amount, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conversion::ExchangeRateState;
use crate::cost_basis::CostBasisLedger;
use crate::errors::VaultError;
use crate::events::VaultEvent;
use crate::fees::{self, FeeQuote};
use crate::governance::{
    Governance, GovernanceSnapshot, SignerAction, SignerChange, WhitelistChange,
};
use crate::quorum::{ApprovalOutcome, SignerSet};
use crate::shares::ShareLedger;
use crate::withdrawal_queue::{
    NewWithdrawal, RequestFilter, RequestStatus, WithdrawalAggregate, WithdrawalQueue,
    WithdrawalRequest,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything a vault owns, in one serialisable aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    vault_address: Address,
    asset: Address,
    treasury: Address,
    rate: ExchangeRateState,
    redemption_period: u64,
    fee_bps: u16,
    #[serde(with = "amount_serde")]
    min_deposit: Amount,
    #[serde(with = "amount_serde")]
    min_withdrawal_shares: Amount,
    shares: ShareLedger,
    cost_basis: CostBasisLedger,
    queue: WithdrawalQueue,
    governance: Governance,
}

impl VaultState {
    /// Builds the genesis state from configuration and the initial signers.
    /// The rate is stamped at `now`.
    pub fn genesis(config: &VaultConfig, signers: Vec<Address>, now: Timestamp) -> Result<Self, VaultError> {
        config.validate()?;
        let signers = SignerSet::new(signers, config.signer_floor)?;
        let rate = ExchangeRateState::new(
            config.initial_rate,
            config.min_rate,
            config.rate_expire_secs,
            now,
        )?;

        Ok(Self {
            vault_address: config.vault_address,
            asset: config.asset,
            treasury: config.treasury,
            rate,
            redemption_period: config.redemption_period_secs,
            fee_bps: config.fee_bps,
            min_deposit: config.min_deposit,
            min_withdrawal_shares: config.min_withdrawal_shares,
            shares: ShareLedger::new(),
            cost_basis: CostBasisLedger::new(),
            queue: WithdrawalQueue::new(),
            governance: Governance::new(signers, config.assets_cap),
        })
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Vault-wide figures at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStatus {
    /// The vault's own ledger account.
    pub vault_address: Address,
    /// Underlying asset.
    pub asset: Address,
    /// Fee recipient.
    pub treasury: Address,
    /// Current rate, scaled by 1e18.
    #[serde(with = "amount_serde")]
    pub exchange_rate: u128,
    /// Rate floor.
    #[serde(with = "amount_serde")]
    pub min_rate: u128,
    /// Time of the last rate update.
    pub rate_updated_at: Timestamp,
    /// Allowed rate age in seconds.
    pub rate_expire_interval: u64,
    /// Whether rate-dependent calls are currently refused.
    pub rate_stale: bool,
    /// Outstanding shares.
    #[serde(with = "amount_serde")]
    pub total_supply: Amount,
    /// Floor value of the supply.
    #[serde(with = "amount_serde")]
    pub total_assets: Amount,
    /// Deposit cap.
    #[serde(with = "amount_serde")]
    pub assets_cap: Amount,
    /// Underlying balance of the vault account.
    #[serde(with = "amount_serde")]
    pub asset_balance: Amount,
    /// Net assets owed to pending requests.
    #[serde(with = "amount_serde")]
    pub total_withdrawing_assets: Amount,
    /// Shares burned by pending requests.
    #[serde(with = "amount_serde")]
    pub total_withdrawing_shares: Amount,
    /// Fees owed by pending requests.
    #[serde(with = "amount_serde")]
    pub total_pending_fees: Amount,
    /// Seconds between request and claim.
    pub redemption_period: u64,
    /// Performance fee.
    pub fee_bps: u16,
    /// Minimum deposit in asset units.
    #[serde(with = "amount_serde")]
    pub min_deposit: Amount,
    /// Minimum withdrawal in shares.
    #[serde(with = "amount_serde")]
    pub min_withdrawal_shares: Amount,
    /// Requests ever made.
    pub request_count: u64,
    /// Clock reading the figures were taken at.
    pub now: Timestamp,
}

/// One holder's position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    /// Holder.
    pub address: Address,
    /// Share balance.
    #[serde(with = "amount_serde")]
    pub shares: Amount,
    /// Principal in asset units.
    #[serde(with = "amount_serde")]
    pub principal: Amount,
    /// Floor asset value of the shares.
    #[serde(with = "amount_serde")]
    pub assets_value: Amount,
    /// Underlying asset held outside the vault.
    #[serde(with = "amount_serde")]
    pub asset_balance: Amount,
    /// Unclaimed requests owned by the holder.
    pub pending_requests: usize,
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The vault: state plus collaborators plus the events of the operation in
/// progress.
#[derive(Debug, Clone)]
pub struct Vault<L> {
    state: VaultState,
    ledger: L,
    permissions: Arc<dyn PermissionEngine>,
    clock: Arc<dyn Clock>,
    events: Vec<VaultEvent>,
}

impl<L: AssetLedger> Vault<L> {
    /// Creates a vault at genesis.
    pub fn new(
        config: &VaultConfig,
        signers: Vec<Address>,
        ledger: L,
        permissions: Arc<dyn PermissionEngine>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VaultError> {
        let state = VaultState::genesis(config, signers, clock.now())?;
        info!(
            vault = %state.vault_address,
            asset = %state.asset,
            signers = state.governance.signers().len(),
            "vault created"
        );
        Ok(Self::from_state(state, ledger, permissions, clock))
    }

    /// Rebuilds a vault around previously exported state.
    pub fn from_state(
        state: VaultState,
        ledger: L,
        permissions: Arc<dyn PermissionEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            ledger,
            permissions,
            clock,
            events: Vec::new(),
        }
    }

    /// A copy of the full state, for persistence.
    pub fn export_state(&self) -> VaultState {
        self.state.clone()
    }

    /// The state aggregate.
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// The asset ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Events emitted since the last drain.
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Takes the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current clock reading.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn emit(&mut self, event: VaultEvent) {
        self.events.push(event);
    }

    fn require_admin(&self, caller: &Address) -> Result<(), VaultError> {
        if !self.permissions.has_capability(caller, Capability::Admin) {
            return Err(VaultError::Unauthorized {
                caller: *caller,
                capability: Capability::Admin,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rate and configuration
    // -----------------------------------------------------------------------

    /// Replaces the exchange rate. Requires `RateUpdater` or `Admin`.
    /// Returns the previous rate.
    pub fn set_exchange_rate(&mut self, caller: Address, rate: u128) -> Result<u128, VaultError> {
        if !self
            .permissions
            .has_any(&caller, &[Capability::RateUpdater, Capability::Admin])
        {
            return Err(VaultError::Unauthorized {
                caller,
                capability: Capability::RateUpdater,
            });
        }

        let now = self.now();
        let previous = self.state.rate.set_rate(rate, now)?;
        info!(%caller, previous, current = rate, "exchange rate updated");
        self.emit(VaultEvent::ExchangeRateUpdated {
            updater: caller,
            previous,
            current: rate,
            updated_at: now,
        });
        Ok(previous)
    }

    /// Sets the redemption period. Admin only. Returns the previous value.
    pub fn set_redemption_period(&mut self, caller: Address, secs: u64) -> Result<u64, VaultError> {
        self.require_admin(&caller)?;
        let previous = std::mem::replace(&mut self.state.redemption_period, secs);
        info!(previous, current = secs, "redemption period updated");
        self.emit(VaultEvent::RedemptionPeriodUpdated {
            previous,
            current: secs,
        });
        Ok(previous)
    }

    /// Sets the rate expire interval. Admin only.
    pub fn set_expire_interval(&mut self, caller: Address, secs: u64) -> Result<u64, VaultError> {
        self.require_admin(&caller)?;
        let previous = self.state.rate.set_expire_interval(secs);
        info!(previous, current = secs, "expire interval updated");
        self.emit(VaultEvent::ExpireIntervalUpdated {
            previous,
            current: secs,
        });
        Ok(previous)
    }

    /// Sets the minimum deposit in asset units. Admin only.
    pub fn set_min_deposit(&mut self, caller: Address, assets: Amount) -> Result<Amount, VaultError> {
        self.require_admin(&caller)?;
        let previous = std::mem::replace(&mut self.state.min_deposit, assets);
        info!(previous, current = assets, "min deposit updated");
        self.emit(VaultEvent::MinDepositUpdated {
            previous,
            current: assets,
        });
        Ok(previous)
    }

    /// Sets the minimum withdrawal in shares; zero disables it. Admin only.
    pub fn set_min_withdrawal(&mut self, caller: Address, shares: Amount) -> Result<Amount, VaultError> {
        self.require_admin(&caller)?;
        let previous = std::mem::replace(&mut self.state.min_withdrawal_shares, shares);
        info!(previous, current = shares, "min withdrawal updated");
        self.emit(VaultEvent::MinWithdrawalUpdated {
            previous,
            current: shares,
        });
        Ok(previous)
    }

    /// Sets the fee treasury. Admin only; the zero address is rejected.
    pub fn set_treasury(&mut self, caller: Address, treasury: Address) -> Result<Address, VaultError> {
        self.require_admin(&caller)?;
        if treasury.is_zero() {
            return Err(VaultError::ZeroAddress("treasury"));
        }
        let previous = std::mem::replace(&mut self.state.treasury, treasury);
        info!(%previous, current = %treasury, "treasury updated");
        self.emit(VaultEvent::TreasuryUpdated {
            previous,
            current: treasury,
        });
        Ok(previous)
    }

    /// Sets the performance fee. Admin only; at most 10 000 bps.
    pub fn set_fee_bps(&mut self, caller: Address, bps: u16) -> Result<u16, VaultError> {
        self.require_admin(&caller)?;
        if bps > MAX_FEE_BPS {
            return Err(VaultError::FeeTooHigh(bps));
        }
        let previous = std::mem::replace(&mut self.state.fee_bps, bps);
        info!(previous, current = bps, "fee bps updated");
        self.emit(VaultEvent::FeeBpsUpdated {
            previous,
            current: bps,
        });
        Ok(previous)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The vault's own ledger account.
    pub fn vault_address(&self) -> Address {
        self.state.vault_address
    }

    /// Underlying asset.
    pub fn asset(&self) -> Address {
        self.state.asset
    }

    /// Fee recipient.
    pub fn treasury(&self) -> Address {
        self.state.treasury
    }

    /// Rate state.
    pub fn rate_state(&self) -> &ExchangeRateState {
        &self.state.rate
    }

    /// Current rate, scaled by 1e18.
    pub fn exchange_rate(&self) -> u128 {
        self.state.rate.rate()
    }

    /// `true` if rate-dependent calls are refused right now.
    pub fn is_rate_stale(&self) -> bool {
        self.state.rate.is_stale(self.now())
    }

    /// Seconds between request and claim.
    pub fn redemption_period(&self) -> u64 {
        self.state.redemption_period
    }

    /// Performance fee in basis points.
    pub fn fee_bps(&self) -> u16 {
        self.state.fee_bps
    }

    /// Minimum deposit in asset units.
    pub fn min_deposit(&self) -> Amount {
        self.state.min_deposit
    }

    /// Minimum withdrawal in shares.
    pub fn min_withdrawal_shares(&self) -> Amount {
        self.state.min_withdrawal_shares
    }

    /// Deposit cap.
    pub fn assets_cap(&self) -> Amount {
        self.state.governance.assets_cap()
    }

    /// Outstanding shares.
    pub fn total_supply(&self) -> Amount {
        self.state.shares.total_supply()
    }

    /// Shares held by `holder`.
    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.state.shares.balance_of(holder)
    }

    /// Principal attributed to `holder`.
    pub fn principal_of(&self, holder: &Address) -> Amount {
        self.state.cost_basis.principal_of(holder)
    }

    /// Net assets owed to pending requests.
    pub fn total_withdrawing_assets(&self) -> Amount {
        self.state.queue.total_withdrawing_assets()
    }

    /// Shares burned by pending requests.
    pub fn total_withdrawing_shares(&self) -> Amount {
        self.state.queue.total_withdrawing_shares()
    }

    /// Fees owed by pending requests.
    pub fn total_pending_fees(&self) -> Amount {
        self.state.queue.total_pending_fees()
    }

    /// Number of unclaimed requests.
    pub fn pending_withdrawal_count(&self) -> usize {
        self.state.queue.pending_count()
    }

    /// Underlying balance of the vault account.
    pub fn asset_balance(&self) -> Amount {
        self.ledger
            .balance_of(&self.state.asset, &self.state.vault_address)
    }

    /// Governance state.
    pub fn governance(&self) -> &Governance {
        &self.state.governance
    }

    /// Read-only projection of governance.
    pub fn governance_snapshot(&self) -> GovernanceSnapshot {
        self.state.governance.snapshot()
    }

    // -----------------------------------------------------------------------
    // Conversion, previews, limits
    // -----------------------------------------------------------------------

    /// Floor asset value of the whole supply.
    pub fn total_assets(&self) -> Result<Amount, VaultError> {
        self.convert_to_assets(self.total_supply())
    }

    /// Shares to assets, floor.
    pub fn convert_to_assets(&self, shares: Amount) -> Result<Amount, VaultError> {
        Ok(self.state.rate.to_assets(shares, Rounding::Floor)?)
    }

    /// Assets to shares, floor.
    pub fn convert_to_shares(&self, assets: Amount) -> Result<Amount, VaultError> {
        Ok(self.state.rate.to_shares(assets, Rounding::Floor)?)
    }

    /// Shares a deposit of `assets` would mint.
    pub fn preview_deposit(&self, assets: Amount) -> Result<Amount, VaultError> {
        self.convert_to_shares(assets)
    }

    /// Assets a mint of `shares` would charge.
    pub fn preview_mint(&self, shares: Amount) -> Result<Amount, VaultError> {
        Ok(self.state.rate.to_assets(shares, Rounding::Ceil)?)
    }

    /// Gross assets a withdrawal of `shares` would be worth, before fees.
    pub fn preview_redeem(&self, shares: Amount) -> Result<Amount, VaultError> {
        self.convert_to_assets(shares)
    }

    /// Full fee breakdown of `owner` withdrawing `shares`, without mutating.
    pub fn preview_withdrawal(&self, owner: &Address, shares: Amount) -> Result<FeeQuote, VaultError> {
        let max = self.max_redeemable(owner);
        if shares > max {
            return Err(VaultError::ExceedsRedeemable {
                requested: shares,
                max,
            });
        }
        let gross = self.convert_to_assets(shares)?;
        let basis = self.state.cost_basis.quote_removal(owner, shares, max)?;
        Ok(fees::quote(gross, basis, self.state.fee_bps)?)
    }

    /// Assets that can still be deposited before the cap.
    pub fn max_deposit(&self) -> Result<Amount, VaultError> {
        Ok(self.assets_cap().saturating_sub(self.total_assets()?))
    }

    /// Shares that can still be minted before the cap.
    pub fn max_mint(&self) -> Result<Amount, VaultError> {
        self.convert_to_shares(self.max_deposit()?)
    }

    /// Shares `owner` may put into a withdrawal request.
    pub fn max_redeemable(&self, owner: &Address) -> Amount {
        self.balance_of(owner)
    }

    // -----------------------------------------------------------------------
    // Deposits
    // -----------------------------------------------------------------------

    /// Deposits `assets` from `caller` and mints floor-rounded shares to
    /// `receiver`. Returns the shares minted.
    pub fn deposit(&mut self, caller: Address, assets: Amount, receiver: Address) -> Result<Amount, VaultError> {
        self.state.rate.ensure_fresh(self.now())?;
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        if assets == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.check_min_deposit(assets)?;

        let shares = self.convert_to_shares(assets)?;
        if shares == 0 {
            return Err(VaultError::ZeroShares);
        }
        self.check_cap(assets)?;

        self.settle_deposit(caller, receiver, assets, shares)?;
        Ok(shares)
    }

    /// Mints exactly `shares` to `receiver`, charging `caller` the
    /// ceil-rounded asset cost. Returns the assets charged.
    pub fn mint(&mut self, caller: Address, shares: Amount, receiver: Address) -> Result<Amount, VaultError> {
        self.state.rate.ensure_fresh(self.now())?;
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }

        let assets = self.preview_mint(shares)?;
        self.check_min_deposit(assets)?;
        self.check_cap(assets)?;

        self.settle_deposit(caller, receiver, assets, shares)?;
        Ok(assets)
    }

    fn check_min_deposit(&self, assets: Amount) -> Result<(), VaultError> {
        if assets < self.state.min_deposit {
            return Err(VaultError::BelowMinDeposit {
                assets,
                min: self.state.min_deposit,
            });
        }
        Ok(())
    }

    fn check_cap(&self, assets: Amount) -> Result<(), VaultError> {
        let total_after = self
            .total_assets()?
            .checked_add(assets)
            .ok_or(MathError::Overflow)?;
        let cap = self.assets_cap();
        if total_after > cap {
            return Err(VaultError::CapExceeded { total_after, cap });
        }
        Ok(())
    }

    fn settle_deposit(
        &mut self,
        caller: Address,
        receiver: Address,
        assets: Amount,
        shares: Amount,
    ) -> Result<(), VaultError> {
        self.total_supply()
            .checked_add(shares)
            .ok_or(MathError::Overflow)?;
        self.principal_of(&receiver)
            .checked_add(assets)
            .ok_or(MathError::Overflow)?;

        let (asset, vault) = (self.state.asset, self.state.vault_address);
        self.ledger.transfer(&asset, &caller, &vault, assets)?;
        self.state.shares.mint(receiver, shares)?;
        self.state.cost_basis.on_deposit(receiver, assets)?;

        info!(%caller, %receiver, assets, shares, "deposit");
        self.emit(VaultEvent::Deposited {
            caller,
            receiver,
            assets,
            shares,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Withdrawals
    // -----------------------------------------------------------------------

    /// Burns `shares` from `caller` and enqueues a request paying
    /// `receiver` after the redemption period. Returns the request id.
    pub fn request_withdrawal(
        &mut self,
        caller: Address,
        shares: Amount,
        receiver: Address,
    ) -> Result<RequestId, VaultError> {
        let now = self.now();
        self.state.rate.ensure_fresh(now)?;
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let min = self.state.min_withdrawal_shares;
        if min > 0 && shares < min {
            return Err(VaultError::BelowMinWithdrawal { shares, min });
        }
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        let shares_before = self.max_redeemable(&caller);
        if shares > shares_before {
            return Err(VaultError::ExceedsRedeemable {
                requested: shares,
                max: shares_before,
            });
        }

        let assets_gross = self.convert_to_assets(shares)?;
        if assets_gross == 0 {
            return Err(VaultError::ZeroAssets);
        }
        let cost_basis = self
            .state
            .cost_basis
            .quote_removal(&caller, shares, shares_before)?;
        let quote = fees::quote(assets_gross, cost_basis, self.state.fee_bps)?;

        // Every pending claim, this one included, must stay payable.
        let required = self
            .state
            .queue
            .reserved_assets()
            .checked_add(quote.assets_net)
            .and_then(|r| r.checked_add(quote.fee))
            .ok_or(MathError::Overflow)?;
        self.ensure_vault_covers(required)?;

        let id = self.state.queue.enqueue(
            NewWithdrawal {
                owner: caller,
                receiver,
                shares_burned: shares,
                assets_net: quote.assets_net,
                fee_amount: quote.fee,
            },
            now,
        )?;
        self.state.shares.burn(caller, shares)?;
        self.state
            .cost_basis
            .on_withdraw_request(caller, shares, shares_before)?;

        info!(
            id,
            owner = %caller,
            %receiver,
            shares,
            assets_gross,
            cost_basis,
            fee = quote.fee,
            assets_net = quote.assets_net,
            "withdrawal requested"
        );
        self.emit(VaultEvent::WithdrawalRequested {
            id,
            owner: caller,
            receiver,
            shares_burned: shares,
            assets_gross,
            cost_basis,
            fee_amount: quote.fee,
            assets_net: quote.assets_net,
            requested_at: now,
        });
        Ok(id)
    }

    /// Pays out request `id` to its receiver and the fee to the treasury.
    /// Only the request owner may claim.
    pub fn claim_withdrawal(&mut self, caller: Address, id: RequestId) -> Result<WithdrawalRequest, VaultError> {
        let now = self.now();
        let request = self
            .state
            .queue
            .check_claim(id, &caller, now, self.state.redemption_period)?;
        let required = request
            .assets_net
            .checked_add(request.fee_amount)
            .ok_or(MathError::Overflow)?;
        self.ensure_vault_covers(required)?;

        self.pay_out(id)
    }

    /// Claims every id in order. Either all succeed or none do; a repeated
    /// id fails as already claimed.
    pub fn batch_claim_withdrawal(
        &mut self,
        caller: Address,
        ids: &[RequestId],
    ) -> Result<Vec<WithdrawalRequest>, VaultError> {
        let now = self.now();
        let batch = self
            .state
            .queue
            .check_batch(ids, &caller, now, self.state.redemption_period)?;

        let mut required: Amount = 0;
        for request in &batch {
            required = required
                .checked_add(request.assets_net)
                .and_then(|r| r.checked_add(request.fee_amount))
                .ok_or(MathError::Overflow)?;
        }
        self.ensure_vault_covers(required)?;

        ids.iter().map(|id| self.pay_out(*id)).collect()
    }

    fn ensure_vault_covers(&self, required: Amount) -> Result<(), VaultError> {
        let available = self.asset_balance();
        if available < required {
            return Err(VaultError::InsufficientVaultBalance {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Marks the request claimed and releases its totals, then transfers.
    fn pay_out(&mut self, id: RequestId) -> Result<WithdrawalRequest, VaultError> {
        let request = self.state.queue.mark_claimed(id)?;

        let (asset, vault, treasury) = (
            self.state.asset,
            self.state.vault_address,
            self.state.treasury,
        );
        self.ledger
            .transfer(&asset, &vault, &request.receiver, request.assets_net)?;
        if request.fee_amount > 0 {
            self.ledger
                .transfer(&asset, &vault, &treasury, request.fee_amount)?;
        }

        info!(
            id,
            owner = %request.owner,
            receiver = %request.receiver,
            assets_net = request.assets_net,
            fee = request.fee_amount,
            "withdrawal claimed"
        );
        self.emit(VaultEvent::WithdrawalClaimed {
            id,
            owner: request.owner,
            receiver: request.receiver,
            assets_net: request.assets_net,
            fee_amount: request.fee_amount,
            treasury,
        });
        Ok(request)
    }

    // -----------------------------------------------------------------------
    // Share transfers
    // -----------------------------------------------------------------------

    /// Moves `shares` from `caller` to `to`, carrying the proportional
    /// principal along. Returns the principal moved.
    pub fn transfer_shares(&mut self, caller: Address, to: Address, shares: Amount) -> Result<Amount, VaultError> {
        if to.is_zero() {
            return Err(VaultError::ZeroAddress("recipient"));
        }
        if caller == to || shares == 0 {
            return Ok(0);
        }

        let balance = self.balance_of(&caller);
        let principal_moved = self
            .state
            .cost_basis
            .on_transfer(caller, to, shares, balance)?;
        self.state.shares.transfer(caller, to, shares)?;

        info!(from = %caller, %to, shares, principal_moved, "shares transferred");
        self.emit(VaultEvent::SharesTransferred {
            from: caller,
            to,
            shares,
            principal_moved,
        });
        Ok(principal_moved)
    }

    // -----------------------------------------------------------------------
    // Protocol withdrawal
    // -----------------------------------------------------------------------

    /// Moves `amount` of any held `asset` to a whitelisted `destination`.
    /// Signer only. For the underlying asset, everything owed to pending
    /// requests (net and fees) stays reserved.
    pub fn protocol_withdraw(
        &mut self,
        caller: Address,
        asset: Address,
        amount: Amount,
        destination: Address,
    ) -> Result<(), VaultError> {
        if !self.state.governance.is_signer(&caller) {
            return Err(VaultError::NotSigner(caller));
        }
        if !self.state.governance.is_whitelisted(&destination) {
            return Err(VaultError::NotWhitelisted(destination));
        }
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        let vault = self.state.vault_address;
        let balance = self.ledger.balance_of(&asset, &vault);
        let reserved = if asset == self.state.asset {
            self.state.queue.reserved_assets()
        } else {
            0
        };
        let available = balance.saturating_sub(reserved);
        if amount > available {
            return Err(VaultError::InsufficientAvailable {
                asset,
                requested: amount,
                available,
            });
        }

        self.ledger.transfer(&asset, &vault, &destination, amount)?;
        info!(signer = %caller, %asset, amount, %destination, "protocol withdrawal");
        self.emit(VaultEvent::ProtocolWithdrawal {
            signer: caller,
            asset,
            amount,
            destination,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------------

    /// Approves whitelist proposal `id` setting `target` to `allow`.
    pub fn whitelist_change(
        &mut self,
        caller: Address,
        target: Address,
        allow: bool,
        id: u64,
    ) -> Result<ApprovalOutcome<WhitelistChange>, VaultError> {
        let previous = self.state.governance.is_whitelisted(&target);
        let outcome = self
            .state
            .governance
            .approve_whitelist(caller, id, WhitelistChange { target, allow })?;

        let event = match &outcome {
            ApprovalOutcome::Pending {
                approvals,
                required,
            } => VaultEvent::WhitelistApproval {
                id,
                signer: caller,
                target,
                allow,
                approvals: *approvals,
                required: *required,
            },
            ApprovalOutcome::Executed(change) => VaultEvent::WhitelistUpdated {
                id,
                target: change.target,
                previous,
                current: change.allow,
            },
        };
        self.emit(event);
        Ok(outcome)
    }

    /// Approves adding or removing `target` as a signer.
    pub fn signer_change(
        &mut self,
        caller: Address,
        action: SignerAction,
        target: Address,
    ) -> Result<ApprovalOutcome<SignerChange>, VaultError> {
        let previous_required = self.state.governance.required_approvals();
        let outcome = self
            .state
            .governance
            .approve_signer_change(caller, SignerChange { action, target })?;

        let event = match &outcome {
            ApprovalOutcome::Pending {
                approvals,
                required,
            } => VaultEvent::SignerChangeApproval {
                signer: caller,
                action,
                target,
                approvals: *approvals,
                required: *required,
            },
            ApprovalOutcome::Executed(change) => VaultEvent::SignerSetUpdated {
                action: change.action,
                target: change.target,
                previous_required,
                required: self.state.governance.required_approvals(),
                signer_count: self.state.governance.signers().len(),
            },
        };
        self.emit(event);
        Ok(outcome)
    }

    /// Approves setting the deposit cap to `cap`.
    pub fn assets_cap_change(&mut self, caller: Address, cap: Amount) -> Result<ApprovalOutcome<Amount>, VaultError> {
        let previous = self.state.governance.assets_cap();
        let outcome = self.state.governance.approve_cap_change(caller, cap)?;

        let event = match &outcome {
            ApprovalOutcome::Pending {
                approvals,
                required,
            } => VaultEvent::CapChangeApproval {
                signer: caller,
                target: cap,
                approvals: *approvals,
                required: *required,
            },
            ApprovalOutcome::Executed(current) => VaultEvent::AssetsCapUpdated {
                previous,
                current: *current,
            },
        };
        self.emit(event);
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Looks up a request.
    pub fn get_withdrawal_request(&self, id: RequestId) -> Option<&WithdrawalRequest> {
        self.state.queue.get(id)
    }

    /// Lifecycle state of a request right now.
    pub fn withdrawal_status(&self, id: RequestId) -> Option<RequestStatus> {
        self.state
            .queue
            .status(id, self.now(), self.state.redemption_period)
    }

    /// `true` if the owner could claim `id` right now.
    pub fn is_claimable(&self, id: RequestId) -> bool {
        self.state
            .queue
            .is_claimable(id, self.now(), self.state.redemption_period)
    }

    /// Seconds until `id` is claimable; `None` if unknown or claimed.
    pub fn time_until_claimable(&self, id: RequestId) -> Option<u64> {
        self.state
            .queue
            .time_until_claimable(id, self.now(), self.state.redemption_period)
    }

    /// Requests matching `filter`, in id order.
    pub fn filter_withdrawal_requests(&self, filter: &RequestFilter) -> Vec<WithdrawalRequest> {
        self.state.queue.filter(filter)
    }

    /// Sums over request ids `from..=to`.
    pub fn aggregate_withdrawals(&self, from: RequestId, to: RequestId) -> Result<WithdrawalAggregate, VaultError> {
        Ok(self.state.queue.aggregate(from, to)?)
    }

    /// Vault-wide figures.
    pub fn status(&self) -> Result<VaultStatus, VaultError> {
        let now = self.now();
        let rate = &self.state.rate;
        Ok(VaultStatus {
            vault_address: self.state.vault_address,
            asset: self.state.asset,
            treasury: self.state.treasury,
            exchange_rate: rate.rate(),
            min_rate: rate.min_rate(),
            rate_updated_at: rate.update_time(),
            rate_expire_interval: rate.expire_interval(),
            rate_stale: rate.is_stale(now),
            total_supply: self.total_supply(),
            total_assets: self.total_assets()?,
            assets_cap: self.assets_cap(),
            asset_balance: self.asset_balance(),
            total_withdrawing_assets: self.total_withdrawing_assets(),
            total_withdrawing_shares: self.total_withdrawing_shares(),
            total_pending_fees: self.total_pending_fees(),
            redemption_period: self.state.redemption_period,
            fee_bps: self.state.fee_bps,
            min_deposit: self.state.min_deposit,
            min_withdrawal_shares: self.state.min_withdrawal_shares,
            request_count: self.state.queue.len() as u64,
            now,
        })
    }

    /// One holder's position.
    pub fn account(&self, holder: &Address) -> Result<AccountView, VaultError> {
        let shares = self.balance_of(holder);
        let pending_requests = self
            .state
            .queue
            .iter()
            .filter(|r| r.owner == *holder && !r.claimed)
            .count();
        Ok(AccountView {
            address: *holder,
            shares,
            principal: self.principal_of(holder),
            assets_value: self.convert_to_assets(shares)?,
            asset_balance: self.ledger.balance_of(&self.state.asset, holder),
            pending_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::quorum::QuorumError;
    use crate::withdrawal_queue::QueueError;
    use meridian_protocol::clock::ManualClock;
    use meridian_protocol::config::{ONE_ASSET, ONE_SHARE, RATE_SCALE};
    use meridian_protocol::ledger::InMemoryLedger;
    use meridian_protocol::permissions::RoleTable;

    const START: Timestamp = 1_700_000_000;

    struct Fixture {
        vault: Vault<InMemoryLedger>,
        clock: Arc<ManualClock>,
        config: VaultConfig,
    }

    fn addr(n: u8) -> Address {
        Address::from_low_u8(n)
    }

    fn admin() -> Address {
        addr(0xad)
    }

    fn alice() -> Address {
        addr(0x01)
    }

    fn bob() -> Address {
        addr(0x02)
    }

    fn signer(n: u8) -> Address {
        addr(0x50 + n)
    }

    fn fixture() -> Fixture {
        let config = VaultConfig {
            redemption_period_secs: 1_000,
            rate_expire_secs: 3_600,
            ..VaultConfig::default()
        };
        let clock = Arc::new(ManualClock::new(START));
        let roles = RoleTable::new();
        roles.grant(Capability::Admin, admin());

        let mut ledger = InMemoryLedger::new();
        ledger.credit(config.asset, alice(), 1_000 * ONE_ASSET).unwrap();
        ledger.credit(config.asset, bob(), 1_000 * ONE_ASSET).unwrap();

        let vault = Vault::new(
            &config,
            vec![signer(1), signer(2), signer(3)],
            ledger,
            Arc::new(roles),
            clock.clone(),
        )
        .unwrap();
        Fixture {
            vault,
            clock,
            config,
        }
    }

    #[test]
    fn deposit_mints_floor_shares_and_credits_principal() {
        let mut f = fixture();
        let shares = f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();

        assert_eq!(shares, 100 * ONE_SHARE);
        assert_eq!(f.vault.balance_of(&alice()), 100 * ONE_SHARE);
        assert_eq!(f.vault.principal_of(&alice()), 100 * ONE_ASSET);
        assert_eq!(f.vault.asset_balance(), 100 * ONE_ASSET);
        assert_eq!(f.vault.total_assets().unwrap(), 100 * ONE_ASSET);
        assert_eq!(f.vault.drain_events().len(), 1);
    }

    #[test]
    fn mint_charges_ceil_assets() {
        let mut f = fixture();
        // 3 assets per share: one share unit costs a fraction of an asset
        // unit, rounded up.
        f.vault.set_exchange_rate(admin(), 3 * RATE_SCALE).unwrap();
        let assets = f.vault.mint(alice(), ONE_SHARE + 1, alice()).unwrap();
        assert_eq!(assets, 3 * ONE_ASSET + 1);
        assert_eq!(f.vault.preview_mint(ONE_SHARE + 1).unwrap(), assets);
    }

    #[test]
    fn deposit_refused_while_rate_stale() {
        let mut f = fixture();
        f.clock.advance(3_601);
        let err = f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap_err();
        assert!(matches!(err, VaultError::Conversion(_)));
        assert!(f.vault.is_rate_stale());

        f.vault.set_exchange_rate(admin(), RATE_SCALE).unwrap();
        assert!(f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).is_ok());
    }

    #[test]
    fn deposit_validation() {
        let mut f = fixture();
        assert_eq!(
            f.vault.deposit(alice(), 0, alice()).unwrap_err(),
            VaultError::ZeroAmount
        );
        assert_eq!(
            f.vault.deposit(alice(), ONE_ASSET, Address::ZERO).unwrap_err(),
            VaultError::ZeroAddress("receiver")
        );
        assert!(matches!(
            f.vault.deposit(alice(), ONE_ASSET - 1, alice()),
            Err(VaultError::BelowMinDeposit { .. })
        ));
        assert!(f.vault.events().is_empty());
    }

    #[test]
    fn deposit_over_cap_rejected() {
        let mut f = fixture();
        for s in 1..=2 {
            f.vault.assets_cap_change(signer(s), 150 * ONE_ASSET).unwrap();
        }
        assert_eq!(f.vault.max_deposit().unwrap(), 150 * ONE_ASSET);

        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        let err = f.vault.deposit(bob(), 51 * ONE_ASSET, bob()).unwrap_err();
        assert_eq!(
            err,
            VaultError::CapExceeded {
                total_after: 151 * ONE_ASSET,
                cap: 150 * ONE_ASSET
            }
        );
        assert_eq!(f.vault.max_mint().unwrap(), 50 * ONE_SHARE);
    }

    #[test]
    fn failed_deposit_leaves_no_trace() {
        let mut f = fixture();
        let broke = addr(0x99);
        let err = f.vault.deposit(broke, 10 * ONE_ASSET, broke).unwrap_err();
        assert!(matches!(err, VaultError::Ledger(_)));
        assert_eq!(f.vault.total_supply(), 0);
        assert_eq!(f.vault.principal_of(&broke), 0);
    }

    #[test]
    fn setters_require_admin_and_emit_previous() {
        let mut f = fixture();
        assert!(matches!(
            f.vault.set_fee_bps(alice(), 100),
            Err(VaultError::Unauthorized { capability: Capability::Admin, .. })
        ));
        assert_eq!(f.vault.set_fee_bps(admin(), 100).unwrap(), 2_000);
        assert_eq!(f.vault.set_fee_bps(admin(), 10_001).unwrap_err(), VaultError::FeeTooHigh(10_001));
        assert_eq!(
            f.vault.set_treasury(admin(), Address::ZERO).unwrap_err(),
            VaultError::ZeroAddress("treasury")
        );
        assert_eq!(f.vault.set_redemption_period(admin(), 5).unwrap(), 1_000);
        assert_eq!(f.vault.set_expire_interval(admin(), 10).unwrap(), 3_600);
        assert_eq!(f.vault.set_min_deposit(admin(), 0).unwrap(), ONE_ASSET);
        assert_eq!(f.vault.set_min_withdrawal(admin(), 7).unwrap(), 0);

        let events = f.vault.drain_events();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            VaultEvent::FeeBpsUpdated {
                previous: 2_000,
                current: 100
            }
        );
    }

    #[test]
    fn rate_updater_capability() {
        let mut f = fixture();
        assert!(matches!(
            f.vault.set_exchange_rate(alice(), RATE_SCALE),
            Err(VaultError::Unauthorized { capability: Capability::RateUpdater, .. })
        ));
        let err = f.vault.set_exchange_rate(admin(), f.config.min_rate - 1).unwrap_err();
        assert!(matches!(err, VaultError::Conversion(_)));
    }

    #[test]
    fn request_rejections() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();

        assert_eq!(
            f.vault.request_withdrawal(alice(), 0, alice()).unwrap_err(),
            VaultError::ZeroAmount
        );
        assert_eq!(
            f.vault.request_withdrawal(alice(), 1, Address::ZERO).unwrap_err(),
            VaultError::ZeroAddress("receiver")
        );
        assert!(matches!(
            f.vault.request_withdrawal(alice(), 101 * ONE_SHARE, alice()),
            Err(VaultError::ExceedsRedeemable { .. })
        ));
        // One share unit is worth less than one asset unit.
        assert_eq!(
            f.vault.request_withdrawal(alice(), 1, alice()).unwrap_err(),
            VaultError::ZeroAssets
        );

        f.vault.set_min_withdrawal(admin(), ONE_SHARE).unwrap();
        assert!(matches!(
            f.vault.request_withdrawal(alice(), ONE_SHARE - 1, alice()),
            Err(VaultError::BelowMinWithdrawal { .. })
        ));
        assert_eq!(f.vault.balance_of(&alice()), 100 * ONE_SHARE);
    }

    #[test]
    fn preview_withdrawal_matches_request() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        f.vault
            .set_exchange_rate(admin(), RATE_SCALE + RATE_SCALE / 10)
            .unwrap();

        let quote = f.vault.preview_withdrawal(&alice(), 50 * ONE_SHARE).unwrap();
        let id = f.vault.request_withdrawal(alice(), 50 * ONE_SHARE, bob()).unwrap();
        let request = f.vault.get_withdrawal_request(id).unwrap();
        assert_eq!(request.assets_net, quote.assets_net);
        assert_eq!(request.fee_amount, quote.fee);
        assert_eq!(quote.fee, ONE_ASSET);
        assert_eq!(f.vault.principal_of(&alice()), 50 * ONE_ASSET);
    }

    #[test]
    fn only_owner_claims_and_receiver_is_paid() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        let id = f.vault.request_withdrawal(alice(), 100 * ONE_SHARE, bob()).unwrap();
        f.clock.advance(1_000);

        assert!(matches!(
            f.vault.claim_withdrawal(bob(), id),
            Err(VaultError::Queue(QueueError::NotOwner { .. }))
        ));
        f.vault.claim_withdrawal(alice(), id).unwrap();
        assert_eq!(
            f.vault.ledger().balance_of(&f.config.asset, &bob()),
            1_100 * ONE_ASSET
        );
        assert_eq!(f.vault.time_until_claimable(id), None);
    }

    #[test]
    fn batch_claim_is_all_or_nothing() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        let first = f.vault.request_withdrawal(alice(), 10 * ONE_SHARE, alice()).unwrap();
        f.clock.advance(1_000);
        let second = f.vault.request_withdrawal(alice(), 10 * ONE_SHARE, alice()).unwrap();

        // The second request is not yet claimable, so nothing is paid.
        assert!(matches!(
            f.vault.batch_claim_withdrawal(alice(), &[first, second]),
            Err(VaultError::Queue(QueueError::RedemptionPending { .. }))
        ));
        assert!(!f.vault.get_withdrawal_request(first).unwrap().claimed);

        f.clock.advance(1_000);
        assert_eq!(
            f.vault
                .batch_claim_withdrawal(alice(), &[first, first])
                .unwrap_err(),
            VaultError::Queue(QueueError::AlreadyClaimed(first))
        );
        let paid = f.vault.batch_claim_withdrawal(alice(), &[second, first]).unwrap();
        assert_eq!(paid.len(), 2);
        assert_eq!(f.vault.total_withdrawing_assets(), 0);
    }

    #[test]
    fn request_refused_when_reserve_would_exceed_balance() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        // Rate doubles but no assets arrive to back it.
        f.vault.set_exchange_rate(admin(), 2 * RATE_SCALE).unwrap();
        f.vault.drain_events();

        assert!(matches!(
            f.vault.request_withdrawal(alice(), 100 * ONE_SHARE, alice()),
            Err(VaultError::InsufficientVaultBalance { .. })
        ));
        assert_eq!(f.vault.balance_of(&alice()), 100 * ONE_SHARE);
        assert_eq!(f.vault.principal_of(&alice()), 100 * ONE_ASSET);
        assert_eq!(f.vault.total_withdrawing_assets(), 0);
        assert_eq!(f.vault.total_pending_fees(), 0);
        assert!(f.vault.events().is_empty());
        assert_eq!(
            VaultError::InsufficientVaultBalance {
                required: 1,
                available: 0
            }
            .kind(),
            ErrorKind::State
        );

        // Half the position is still covered: 50 shares are worth 100 assets.
        let id = f.vault.request_withdrawal(alice(), 50 * ONE_SHARE, alice()).unwrap();
        assert!(f.vault.asset_balance() >= f.vault.total_withdrawing_assets() + f.vault.total_pending_fees());
        assert!(matches!(
            f.vault.request_withdrawal(alice(), ONE_SHARE, alice()),
            Err(VaultError::InsufficientVaultBalance { .. })
        ));

        f.clock.advance(1_000);
        f.vault.claim_withdrawal(alice(), id).unwrap();
        assert_eq!(f.vault.asset_balance(), 0);
    }

    #[test]
    fn transfer_moves_principal() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();

        let moved = f.vault.transfer_shares(alice(), bob(), 25 * ONE_SHARE).unwrap();
        assert_eq!(moved, 25 * ONE_ASSET);
        assert_eq!(f.vault.principal_of(&bob()), 25 * ONE_ASSET);
        assert_eq!(f.vault.balance_of(&bob()), 25 * ONE_SHARE);

        assert!(matches!(
            f.vault.transfer_shares(bob(), alice(), 26 * ONE_SHARE),
            Err(VaultError::CostBasis(_))
        ));
        assert_eq!(f.vault.transfer_shares(bob(), bob(), ONE_SHARE).unwrap(), 0);
    }

    #[test]
    fn protocol_withdraw_respects_reserve_and_whitelist() {
        let mut f = fixture();
        let dest = addr(0x77);
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        f.vault.request_withdrawal(alice(), 40 * ONE_SHARE, alice()).unwrap();

        assert_eq!(
            f.vault
                .protocol_withdraw(signer(1), f.config.asset, ONE_ASSET, dest)
                .unwrap_err(),
            VaultError::NotWhitelisted(dest)
        );
        f.vault.whitelist_change(signer(1), dest, true, 1).unwrap();
        f.vault.whitelist_change(signer(2), dest, true, 1).unwrap();

        assert_eq!(
            f.vault
                .protocol_withdraw(alice(), f.config.asset, ONE_ASSET, dest)
                .unwrap_err(),
            VaultError::NotSigner(alice())
        );
        assert!(matches!(
            f.vault
                .protocol_withdraw(signer(1), f.config.asset, 61 * ONE_ASSET, dest),
            Err(VaultError::InsufficientAvailable { .. })
        ));
        f.vault
            .protocol_withdraw(signer(1), f.config.asset, 60 * ONE_ASSET, dest)
            .unwrap();
        assert_eq!(f.vault.asset_balance(), 40 * ONE_ASSET);
    }

    #[test]
    fn governance_errors_surface() {
        let mut f = fixture();
        assert!(matches!(
            f.vault.assets_cap_change(alice(), 1),
            Err(VaultError::Governance(_))
        ));
        f.vault.whitelist_change(signer(1), addr(9), true, 4).unwrap();
        let err = f.vault.whitelist_change(signer(2), addr(9), false, 4).unwrap_err();
        assert_eq!(err, VaultError::from(QuorumError::ConflictingPayload(4)));
    }

    #[test]
    fn export_and_restore_round_trip() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        f.vault.request_withdrawal(alice(), ONE_SHARE, bob()).unwrap();

        let json = serde_json::to_string(&f.vault.export_state()).unwrap();
        let state: VaultState = serde_json::from_str(&json).unwrap();
        let restored = Vault::from_state(
            state,
            f.vault.ledger().clone(),
            Arc::new(RoleTable::new()),
            f.clock.clone(),
        );
        assert_eq!(restored.state(), f.vault.state());
        assert_eq!(restored.total_withdrawing_shares(), ONE_SHARE);
    }

    #[test]
    fn status_and_account_views() {
        let mut f = fixture();
        f.vault.deposit(alice(), 100 * ONE_ASSET, alice()).unwrap();
        f.vault.request_withdrawal(alice(), ONE_SHARE, alice()).unwrap();

        let status = f.vault.status().unwrap();
        assert_eq!(status.total_supply, 99 * ONE_SHARE);
        assert_eq!(status.request_count, 1);
        assert!(!status.rate_stale);

        let account = f.vault.account(&alice()).unwrap();
        assert_eq!(account.assets_value, 99 * ONE_ASSET);
        assert_eq!(account.pending_requests, 1);
        assert_eq!(account.asset_balance, 900 * ONE_ASSET);
    }
}
