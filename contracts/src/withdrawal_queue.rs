//! # Withdrawal Queue
//!
//! An append-only log of withdrawal requests and the running totals the
//! vault reserves for them. The lifecycle of a request is:
//!
//! 1. **Requested**: created together with the share burn. Assets stay in
//!    the vault's general balance; the queue is a liability ledger, not an
//!    escrow.
//! 2. **Claimable**: not stored. A request is claimable once
//!    `now >= requested_at + redemption_period`, recomputed on every call.
//! 3. **Claimed**: terminal. The `claimed` flag flips exactly once.
//!
//! There is no cancellation. Ids are 1-based and strictly increasing; id 0
//! never exists.
//!
//! Claim guards are evaluated in a fixed order and the first failure wins:
//! the request must exist, the caller must be the owner (not the receiver),
//! the request must be unclaimed, and the redemption period must be over.

use std::collections::HashSet;

use im::Vector;
use meridian_protocol::math::MathError;
use meridian_protocol::types::{amount_serde, Address, Amount, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No request with this id exists.
    #[error("withdrawal request {0} not found")]
    RequestNotFound(RequestId),

    /// The caller does not own the request.
    #[error("{caller} is not the owner of withdrawal request {id}")]
    NotOwner {
        /// Request being claimed.
        id: RequestId,
        /// Address that attempted the claim.
        caller: Address,
    },

    /// The request was already claimed.
    #[error("withdrawal request {0} already claimed")]
    AlreadyClaimed(RequestId),

    /// The redemption period has not elapsed.
    #[error("withdrawal request {id} is claimable at {claimable_at}, now {now}")]
    RedemptionPending {
        /// Request being claimed.
        id: RequestId,
        /// First second at which the claim succeeds.
        claimable_at: Timestamp,
        /// Time of the attempt.
        now: Timestamp,
    },

    /// A batch claim with no ids.
    #[error("batch claim requires at least one request id")]
    EmptyBatch,

    /// An aggregate range with `from > to` or `from == 0`.
    #[error("invalid request id range {from}..={to}")]
    InvalidRange {
        /// Range start.
        from: RequestId,
        /// Range end.
        to: RequestId,
    },

    /// A running total overflowed or underflowed.
    #[error(transparent)]
    Math(#[from] MathError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Derived lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Waiting for the redemption period.
    Requested,
    /// Redemption period over; the owner can claim.
    Claimable,
    /// Paid out.
    Claimed,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Requested => write!(f, "Requested"),
            RequestStatus::Claimable => write!(f, "Claimable"),
            RequestStatus::Claimed => write!(f, "Claimed"),
        }
    }
}

/// A single withdrawal request. Immutable except for `claimed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// 1-based id.
    pub id: RequestId,
    /// Holder whose shares were burned. Only the owner may claim.
    pub owner: Address,
    /// Payout target.
    pub receiver: Address,
    /// Shares burned at request time.
    #[serde(with = "amount_serde")]
    pub shares_burned: Amount,
    /// Assets owed to the receiver.
    #[serde(with = "amount_serde")]
    pub assets_net: Amount,
    /// Assets owed to the treasury.
    #[serde(with = "amount_serde")]
    pub fee_amount: Amount,
    /// Request time.
    pub requested_at: Timestamp,
    /// Set once, at claim.
    pub claimed: bool,
}

impl WithdrawalRequest {
    /// First second at which the request may be claimed.
    pub fn claimable_at(&self, redemption_period: u64) -> Timestamp {
        self.requested_at.saturating_add(redemption_period)
    }

    /// Lifecycle state at `now`.
    pub fn status(&self, now: Timestamp, redemption_period: u64) -> RequestStatus {
        if self.claimed {
            RequestStatus::Claimed
        } else if now >= self.claimable_at(redemption_period) {
            RequestStatus::Claimable
        } else {
            RequestStatus::Requested
        }
    }
}

/// Everything needed to enqueue a request; the queue assigns id and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWithdrawal {
    /// Holder whose shares were burned.
    pub owner: Address,
    /// Payout target.
    pub receiver: Address,
    /// Shares burned.
    #[serde(with = "amount_serde")]
    pub shares_burned: Amount,
    /// Assets owed to the receiver.
    #[serde(with = "amount_serde")]
    pub assets_net: Amount,
    /// Assets owed to the treasury.
    #[serde(with = "amount_serde")]
    pub fee_amount: Amount,
}

/// Optional predicates for [`WithdrawalQueue::filter`]. Unset fields match
/// everything; set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFilter {
    /// Only requests owned by this address.
    pub owner: Option<Address>,
    /// Only requests paying this address.
    pub receiver: Option<Address>,
    /// Only claimed (`true`) or unclaimed (`false`) requests.
    pub claimed: Option<bool>,
    /// Only requests made at or after this time.
    pub requested_from: Option<Timestamp>,
    /// Only requests made at or before this time.
    pub requested_to: Option<Timestamp>,
}

impl RequestFilter {
    /// Matches requests owned by `owner`.
    pub fn by_owner(owner: Address) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Restricts to unclaimed requests.
    pub fn pending(mut self) -> Self {
        self.claimed = Some(false);
        self
    }

    /// `true` if `request` satisfies every set predicate.
    pub fn matches(&self, request: &WithdrawalRequest) -> bool {
        self.owner.map_or(true, |o| o == request.owner)
            && self.receiver.map_or(true, |r| r == request.receiver)
            && self.claimed.map_or(true, |c| c == request.claimed)
            && self.requested_from.map_or(true, |t| request.requested_at >= t)
            && self.requested_to.map_or(true, |t| request.requested_at <= t)
    }
}

/// Sums over an inclusive id range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalAggregate {
    /// Range start.
    pub from_id: RequestId,
    /// Range end, clamped to the last existing id.
    pub to_id: RequestId,
    /// Requests in range.
    pub count: u64,
    /// Claimed requests in range.
    pub claimed_count: u64,
    /// Shares burned across the range.
    #[serde(with = "amount_serde")]
    pub total_shares: Amount,
    /// Net assets across the range.
    #[serde(with = "amount_serde")]
    pub total_assets_net: Amount,
    /// Fees across the range.
    #[serde(with = "amount_serde")]
    pub total_fees: Amount,
    /// Shares of unclaimed requests.
    #[serde(with = "amount_serde")]
    pub pending_shares: Amount,
    /// Net assets of unclaimed requests.
    #[serde(with = "amount_serde")]
    pub pending_assets_net: Amount,
    /// Fees of unclaimed requests.
    #[serde(with = "amount_serde")]
    pub pending_fees: Amount,
}

// ---------------------------------------------------------------------------
// WithdrawalQueue
// ---------------------------------------------------------------------------

/// The request log and its running totals.
///
/// The log is a persistent vector: cloning the queue shares every request
/// already written instead of copying it.
///
/// Invariants:
/// - `total_withdrawing_assets == sum(unclaimed.assets_net)`
/// - `total_withdrawing_shares == sum(unclaimed.shares_burned)`
/// - `total_pending_fees == sum(unclaimed.fee_amount)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    requests: Vector<WithdrawalRequest>,
    /// Number of unclaimed requests.
    pending_count: usize,
    #[serde(with = "amount_serde")]
    total_withdrawing_assets: Amount,
    #[serde(with = "amount_serde")]
    total_withdrawing_shares: Amount,
    #[serde(with = "amount_serde")]
    total_pending_fees: Amount,
}

impl WithdrawalQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Net assets owed to all unclaimed requests.
    pub fn total_withdrawing_assets(&self) -> Amount {
        self.total_withdrawing_assets
    }

    /// Shares burned by all unclaimed requests.
    pub fn total_withdrawing_shares(&self) -> Amount {
        self.total_withdrawing_shares
    }

    /// Fees owed to the treasury by all unclaimed requests.
    pub fn total_pending_fees(&self) -> Amount {
        self.total_pending_fees
    }

    /// Underlying assets the vault must keep to honour every pending claim.
    pub fn reserved_assets(&self) -> Amount {
        self.total_withdrawing_assets
            .saturating_add(self.total_pending_fees)
    }

    /// Number of unclaimed requests.
    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    /// Number of requests ever made.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// `true` if no request was ever made.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Id the next request will receive.
    pub fn next_id(&self) -> RequestId {
        self.requests.len() as RequestId + 1
    }

    /// All requests in id order.
    pub fn iter(&self) -> impl Iterator<Item = &WithdrawalRequest> {
        self.requests.iter()
    }

    /// Appends a request and bumps the running totals. Returns its id.
    pub fn enqueue(&mut self, new: NewWithdrawal, now: Timestamp) -> Result<RequestId, QueueError> {
        let assets = self
            .total_withdrawing_assets
            .checked_add(new.assets_net)
            .ok_or(MathError::Overflow)?;
        let shares = self
            .total_withdrawing_shares
            .checked_add(new.shares_burned)
            .ok_or(MathError::Overflow)?;
        let fees = self
            .total_pending_fees
            .checked_add(new.fee_amount)
            .ok_or(MathError::Overflow)?;

        let id = self.next_id();
        self.requests.push_back(WithdrawalRequest {
            id,
            owner: new.owner,
            receiver: new.receiver,
            shares_burned: new.shares_burned,
            assets_net: new.assets_net,
            fee_amount: new.fee_amount,
            requested_at: now,
            claimed: false,
        });
        self.total_withdrawing_assets = assets;
        self.total_withdrawing_shares = shares;
        self.total_pending_fees = fees;
        self.pending_count += 1;

        Ok(id)
    }

    /// Looks up a request.
    pub fn get(&self, id: RequestId) -> Option<&WithdrawalRequest> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.requests.get(index)
    }

    /// Lifecycle state of `id` at `now`, or `None` if unknown.
    pub fn status(&self, id: RequestId, now: Timestamp, redemption_period: u64) -> Option<RequestStatus> {
        self.get(id).map(|r| r.status(now, redemption_period))
    }

    /// `true` if `id` exists, is unclaimed, and its period has elapsed.
    pub fn is_claimable(&self, id: RequestId, now: Timestamp, redemption_period: u64) -> bool {
        self.status(id, now, redemption_period) == Some(RequestStatus::Claimable)
    }

    /// Seconds until `id` becomes claimable: `Some(0)` when it already is,
    /// `None` when it does not exist or was claimed.
    pub fn time_until_claimable(
        &self,
        id: RequestId,
        now: Timestamp,
        redemption_period: u64,
    ) -> Option<u64> {
        let request = self.get(id).filter(|r| !r.claimed)?;
        Some(request.claimable_at(redemption_period).saturating_sub(now))
    }

    /// Runs the claim guards for a single request without mutating.
    pub fn check_claim(
        &self,
        id: RequestId,
        caller: &Address,
        now: Timestamp,
        redemption_period: u64,
    ) -> Result<&WithdrawalRequest, QueueError> {
        let request = self.get(id).ok_or(QueueError::RequestNotFound(id))?;
        if request.owner != *caller {
            return Err(QueueError::NotOwner { id, caller: *caller });
        }
        if request.claimed {
            return Err(QueueError::AlreadyClaimed(id));
        }
        let claimable_at = request.claimable_at(redemption_period);
        if now < claimable_at {
            return Err(QueueError::RedemptionPending {
                id,
                claimable_at,
                now,
            });
        }
        Ok(request)
    }

    /// Runs the claim guards for every id of a batch, in order, as if each
    /// earlier id had already been claimed. A repeated id therefore fails
    /// as [`QueueError::AlreadyClaimed`]. Returns the requests to pay.
    pub fn check_batch(
        &self,
        ids: &[RequestId],
        caller: &Address,
        now: Timestamp,
        redemption_period: u64,
    ) -> Result<Vec<WithdrawalRequest>, QueueError> {
        if ids.is_empty() {
            return Err(QueueError::EmptyBatch);
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let mut batch = Vec::with_capacity(ids.len());
        for &id in ids {
            let request = self.check_claim(id, caller, now, redemption_period)?;
            if !seen.insert(id) {
                return Err(QueueError::AlreadyClaimed(id));
            }
            batch.push(request.clone());
        }
        Ok(batch)
    }

    /// Flips `claimed` and releases the request's share of the running
    /// totals. Guards are the caller's job; this only refuses a second
    /// flip.
    pub fn mark_claimed(&mut self, id: RequestId) -> Result<WithdrawalRequest, QueueError> {
        let mut request = self.get(id).cloned().ok_or(QueueError::RequestNotFound(id))?;
        if request.claimed {
            return Err(QueueError::AlreadyClaimed(id));
        }

        let assets = self
            .total_withdrawing_assets
            .checked_sub(request.assets_net)
            .ok_or(MathError::Overflow)?;
        let shares = self
            .total_withdrawing_shares
            .checked_sub(request.shares_burned)
            .ok_or(MathError::Overflow)?;
        let fees = self
            .total_pending_fees
            .checked_sub(request.fee_amount)
            .ok_or(MathError::Overflow)?;

        self.total_withdrawing_assets = assets;
        self.total_withdrawing_shares = shares;
        self.total_pending_fees = fees;

        self.pending_count -= 1;

        request.claimed = true;
        self.requests.set((id - 1) as usize, request.clone());
        Ok(request)
    }

    /// Requests matching `filter`, in id order.
    pub fn filter(&self, filter: &RequestFilter) -> Vec<WithdrawalRequest> {
        self.requests
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Sums over ids `from..=to`. `to` past the end is clamped.
    pub fn aggregate(&self, from: RequestId, to: RequestId) -> Result<WithdrawalAggregate, QueueError> {
        if from == 0 || from > to {
            return Err(QueueError::InvalidRange { from, to });
        }

        let last = (self.requests.len() as RequestId).min(to);
        let mut agg = WithdrawalAggregate {
            from_id: from,
            to_id: last,
            ..WithdrawalAggregate::default()
        };

        for request in (from..=last).filter_map(|id| self.get(id)) {
            agg.count += 1;
            agg.total_shares = add(agg.total_shares, request.shares_burned)?;
            agg.total_assets_net = add(agg.total_assets_net, request.assets_net)?;
            agg.total_fees = add(agg.total_fees, request.fee_amount)?;
            if request.claimed {
                agg.claimed_count += 1;
            } else {
                agg.pending_shares = add(agg.pending_shares, request.shares_burned)?;
                agg.pending_assets_net = add(agg.pending_assets_net, request.assets_net)?;
                agg.pending_fees = add(agg.pending_fees, request.fee_amount)?;
            }
        }

        Ok(agg)
    }
}

fn add(a: Amount, b: Amount) -> Result<Amount, QueueError> {
    Ok(a.checked_add(b).ok_or(MathError::Overflow)?)
}
