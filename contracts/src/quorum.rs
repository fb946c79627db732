//! # Quorum Engine
//!
//! A generic N-of-M approval tracker. One algorithm, two slot shapes:
//!
//! - [`KeyedQuorum`]: proposals addressed by a caller-supplied id. The
//!   first approver fixes the payload, later approvals must match it, and
//!   an executed id can never be reused.
//! - [`SingletonQuorum`]: exactly one live slot. A different payload
//!   resets the slot (payload replaced, approvals dropped) before the new
//!   approval is recorded. After execution the approvals are cleared but
//!   the payload stays, so re-approving the same payload starts a fresh
//!   count.
//!
//! The threshold is never captured. Every approval reads
//! [`SignerSet::required_approvals`] at the moment it is evaluated, so a
//! signer-set change between two approvals is honoured by the next one.
//! If a proposal already meets the current threshold, the incoming
//! approval executes it without being recorded, keeping
//! `approval_count <= required_approvals`.
//!
//! Execution side effects live with the caller. An approval that crosses
//! the threshold returns [`ApprovalOutcome::Executed`] with the payload and
//! the caller applies it within the same operation.

use std::collections::{BTreeMap, BTreeSet};

use meridian_protocol::config::MIN_SIGNER_FLOOR;
use meridian_protocol::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from casting an approval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuorumError {
    /// The caller is not in the signer set.
    #[error("{0} is not a signer")]
    NotSigner(Address),

    /// The signer already approved the live payload.
    #[error("{0} already approved this proposal")]
    AlreadyApproved(Address),

    /// The keyed proposal was already executed.
    #[error("proposal {0} already executed")]
    AlreadyExecuted(u64),

    /// The proposal id is not usable.
    #[error("invalid proposal id {0}")]
    InvalidProposal(u64),

    /// The approval's payload differs from the one fixed by the first
    /// approver.
    #[error("approval payload conflicts with proposal {0}")]
    ConflictingPayload(u64),
}

/// Errors from building or mutating a signer set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerSetError {
    /// The zero address cannot sign.
    #[error("zero address cannot be a signer")]
    ZeroAddress,

    /// The address is already a signer.
    #[error("{0} is already a signer")]
    AlreadySigner(Address),

    /// The address is not a signer.
    #[error("{0} is not a signer")]
    UnknownSigner(Address),

    /// The set would drop below its floor.
    #[error("signer set of {size} would fall below the floor of {floor}")]
    BelowFloor {
        /// Size the set would have.
        size: usize,
        /// Configured minimum size.
        floor: usize,
    },

    /// The configured floor is below the absolute minimum of two.
    #[error("signer floor {0} is below 2")]
    FloorTooLow(usize),
}

// ---------------------------------------------------------------------------
// SignerSet
// ---------------------------------------------------------------------------

/// Approvals needed for a set of `size` signers: two for sets of two or
/// fewer, otherwise a strict majority, `ceil((size + 1) / 2)`.
pub fn required_approvals_for(size: usize) -> usize {
    if size <= 2 {
        2
    } else {
        (size + 2) / 2
    }
}

/// Ordered set of unique, non-zero signer addresses.
///
/// Invariants: `len() >= floor >= 2` and
/// `required_approvals() <= len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSet {
    signers: Vec<Address>,
    floor: usize,
    required: usize,
}

impl SignerSet {
    /// Builds a signer set.
    ///
    /// # Errors
    ///
    /// Fails on a floor below two, a zero address, a duplicate, or fewer
    /// signers than the floor.
    pub fn new(signers: Vec<Address>, floor: usize) -> Result<Self, SignerSetError> {
        if floor < MIN_SIGNER_FLOOR {
            return Err(SignerSetError::FloorTooLow(floor));
        }
        let mut seen = BTreeSet::new();
        for signer in &signers {
            if signer.is_zero() {
                return Err(SignerSetError::ZeroAddress);
            }
            if !seen.insert(*signer) {
                return Err(SignerSetError::AlreadySigner(*signer));
            }
        }
        if signers.len() < floor {
            return Err(SignerSetError::BelowFloor {
                size: signers.len(),
                floor,
            });
        }

        let required = required_approvals_for(signers.len());
        Ok(Self {
            signers,
            floor,
            required,
        })
    }

    /// Signers in insertion order.
    pub fn signers(&self) -> &[Address] {
        &self.signers
    }

    /// `true` if `address` is a signer.
    pub fn contains(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Number of signers.
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    /// Always `false`; a set holds at least `floor` signers.
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Minimum set size.
    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Current approval threshold.
    pub fn required_approvals(&self) -> usize {
        self.required
    }

    /// Checks that `target` could be added.
    pub fn check_add(&self, target: &Address) -> Result<(), SignerSetError> {
        if target.is_zero() {
            return Err(SignerSetError::ZeroAddress);
        }
        if self.contains(target) {
            return Err(SignerSetError::AlreadySigner(*target));
        }
        Ok(())
    }

    /// Checks that `target` could be removed.
    pub fn check_remove(&self, target: &Address) -> Result<(), SignerSetError> {
        if target.is_zero() {
            return Err(SignerSetError::ZeroAddress);
        }
        if !self.contains(target) {
            return Err(SignerSetError::UnknownSigner(*target));
        }
        if self.signers.len() - 1 < self.floor {
            return Err(SignerSetError::BelowFloor {
                size: self.signers.len() - 1,
                floor: self.floor,
            });
        }
        Ok(())
    }

    /// Adds a signer and recomputes the threshold.
    pub fn add(&mut self, target: Address) -> Result<(), SignerSetError> {
        self.check_add(&target)?;
        self.signers.push(target);
        self.required = required_approvals_for(self.signers.len());
        Ok(())
    }

    /// Removes a signer and recomputes the threshold.
    pub fn remove(&mut self, target: &Address) -> Result<(), SignerSetError> {
        self.check_remove(target)?;
        self.signers.retain(|s| s != target);
        self.required = required_approvals_for(self.signers.len());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

/// A proposal and the signers that approved its current payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal<T> {
    payload: T,
    approvals: BTreeSet<Address>,
    executed: bool,
}

impl<T: Clone> Proposal<T> {
    fn new(payload: T) -> Self {
        Self {
            payload,
            approvals: BTreeSet::new(),
            executed: false,
        }
    }

    /// The payload being voted on.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Number of recorded approvals.
    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    /// `true` once the payload was applied.
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// `true` if `signer` approved the live payload.
    pub fn has_approved(&self, signer: &Address) -> bool {
        self.approvals.contains(signer)
    }

    /// Value snapshot without the approval set.
    pub fn view(&self) -> ProposalView<T> {
        ProposalView {
            payload: self.payload.clone(),
            approval_count: self.approvals.len(),
            executed: self.executed,
        }
    }

    /// Records `signer` and executes if the threshold is met. The caller
    /// has already ruled out duplicates and conflicts.
    fn approve(&mut self, signer: Address, required: usize) -> ApprovalOutcome<T> {
        if self.approvals.len() < required {
            self.approvals.insert(signer);
        }
        if self.approvals.len() >= required {
            self.approvals.clear();
            self.executed = true;
            ApprovalOutcome::Executed(self.payload.clone())
        } else {
            ApprovalOutcome::Pending {
                approvals: self.approvals.len(),
                required,
            }
        }
    }
}

/// Read-only snapshot of a proposal. The approval set itself is never
/// exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView<T> {
    /// The payload being voted on.
    pub payload: T,
    /// Approvals recorded for the live payload.
    pub approval_count: usize,
    /// Whether the payload was applied.
    pub executed: bool,
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalOutcome<T> {
    /// Recorded; more approvals needed.
    Pending {
        /// Approvals after this one.
        approvals: usize,
        /// Threshold at evaluation time.
        required: usize,
    },
    /// Threshold met; the caller must apply the payload now.
    Executed(T),
}

impl<T> ApprovalOutcome<T> {
    /// `true` for [`ApprovalOutcome::Executed`].
    pub fn is_executed(&self) -> bool {
        matches!(self, ApprovalOutcome::Executed(_))
    }
}

// ---------------------------------------------------------------------------
// KeyedQuorum
// ---------------------------------------------------------------------------

/// Proposals addressed by a caller-supplied, non-zero id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedQuorum<T> {
    proposals: BTreeMap<u64, Proposal<T>>,
}

impl<T> Default for KeyedQuorum<T> {
    fn default() -> Self {
        Self {
            proposals: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> KeyedQuorum<T> {
    /// Creates an empty quorum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Casts `signer`'s approval for proposal `id` with `payload`.
    ///
    /// # Errors
    ///
    /// In order: [`QuorumError::NotSigner`], [`QuorumError::InvalidProposal`]
    /// for id 0, [`QuorumError::AlreadyExecuted`],
    /// [`QuorumError::ConflictingPayload`], [`QuorumError::AlreadyApproved`].
    pub fn approve(
        &mut self,
        signers: &SignerSet,
        signer: Address,
        id: u64,
        payload: T,
    ) -> Result<ApprovalOutcome<T>, QuorumError> {
        if !signers.contains(&signer) {
            return Err(QuorumError::NotSigner(signer));
        }
        if id == 0 {
            return Err(QuorumError::InvalidProposal(id));
        }
        if let Some(existing) = self.proposals.get(&id) {
            if existing.executed {
                return Err(QuorumError::AlreadyExecuted(id));
            }
            if existing.payload != payload {
                return Err(QuorumError::ConflictingPayload(id));
            }
            if existing.has_approved(&signer) {
                return Err(QuorumError::AlreadyApproved(signer));
            }
        }

        let proposal = self
            .proposals
            .entry(id)
            .or_insert_with(|| Proposal::new(payload));
        Ok(proposal.approve(signer, signers.required_approvals()))
    }

    /// Looks up a proposal.
    pub fn get(&self, id: u64) -> Option<&Proposal<T>> {
        self.proposals.get(&id)
    }

    /// Snapshot of proposal `id`.
    pub fn view(&self, id: u64) -> Option<ProposalView<T>> {
        self.get(id).map(Proposal::view)
    }

    /// Snapshots of every proposal, by id.
    pub fn views(&self) -> Vec<(u64, ProposalView<T>)> {
        self.proposals.iter().map(|(id, p)| (*id, p.view())).collect()
    }

    /// Drops `signer`'s approvals from every pending proposal.
    pub fn prune_signer(&mut self, signer: &Address) {
        for proposal in self.proposals.values_mut().filter(|p| !p.executed) {
            proposal.approvals.remove(signer);
        }
    }
}

// ---------------------------------------------------------------------------
// SingletonQuorum
// ---------------------------------------------------------------------------

/// A single proposal slot that resets when the payload changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingletonQuorum<T> {
    slot: Option<Proposal<T>>,
}

impl<T> Default for SingletonQuorum<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T: Clone + PartialEq> SingletonQuorum<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Casts `signer`'s approval for `payload`.
    ///
    /// A payload different from the slot's replaces it and clears every
    /// approval. The same payload after execution starts a fresh count.
    ///
    /// # Errors
    ///
    /// [`QuorumError::NotSigner`], or [`QuorumError::AlreadyApproved`] if
    /// `signer` already approved the live payload.
    pub fn approve(
        &mut self,
        signers: &SignerSet,
        signer: Address,
        payload: T,
    ) -> Result<ApprovalOutcome<T>, QuorumError> {
        if !signers.contains(&signer) {
            return Err(QuorumError::NotSigner(signer));
        }

        let proposal = match &mut self.slot {
            Some(p) if p.payload == payload && !p.executed => {
                if p.has_approved(&signer) {
                    return Err(QuorumError::AlreadyApproved(signer));
                }
                p
            }
            Some(p) if p.payload == payload => {
                p.executed = false;
                p.approvals.clear();
                p
            }
            slot => slot.insert(Proposal::new(payload)),
        };
        Ok(proposal.approve(signer, signers.required_approvals()))
    }

    /// The slot's proposal, if one was ever made.
    pub fn current(&self) -> Option<&Proposal<T>> {
        self.slot.as_ref()
    }

    /// Snapshot of the slot.
    pub fn view(&self) -> Option<ProposalView<T>> {
        self.slot.as_ref().map(Proposal::view)
    }

    /// `true` if `signer` approved the live payload.
    pub fn has_approved(&self, signer: &Address) -> bool {
        self.slot.as_ref().map_or(false, |p| p.has_approved(signer))
    }

    /// Drops `signer`'s approval from the slot.
    pub fn prune_signer(&mut self, signer: &Address) {
        if let Some(p) = &mut self.slot {
            p.approvals.remove(signer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_low_u8(n)
    }

    fn signers(n: u8) -> SignerSet {
        SignerSet::new((1..=n).map(addr).collect(), 2).unwrap()
    }

    #[test]
    fn threshold_formula() {
        assert_eq!(required_approvals_for(2), 2);
        assert_eq!(required_approvals_for(3), 2);
        assert_eq!(required_approvals_for(4), 3);
        assert_eq!(required_approvals_for(5), 3);
        assert_eq!(required_approvals_for(6), 4);
        for size in 2..50 {
            assert!(required_approvals_for(size) <= size);
        }
    }

    #[test]
    fn signer_set_validation() {
        assert_eq!(
            SignerSet::new(vec![addr(1)], 2).unwrap_err(),
            SignerSetError::BelowFloor { size: 1, floor: 2 }
        );
        assert_eq!(
            SignerSet::new(vec![addr(1), addr(1)], 2).unwrap_err(),
            SignerSetError::AlreadySigner(addr(1))
        );
        assert_eq!(
            SignerSet::new(vec![addr(1), Address::ZERO], 2).unwrap_err(),
            SignerSetError::ZeroAddress
        );
        assert_eq!(
            SignerSet::new(vec![addr(1), addr(2)], 1).unwrap_err(),
            SignerSetError::FloorTooLow(1)
        );
    }

    #[test]
    fn add_and_remove_recompute_threshold() {
        let mut set = signers(3);
        assert_eq!(set.required_approvals(), 2);
        set.add(addr(4)).unwrap();
        assert_eq!(set.required_approvals(), 3);
        set.remove(&addr(4)).unwrap();
        set.remove(&addr(3)).unwrap();
        assert_eq!(set.required_approvals(), 2);
        assert!(matches!(
            set.remove(&addr(2)),
            Err(SignerSetError::BelowFloor { size: 1, floor: 2 })
        ));
    }

    #[test]
    fn keyed_executes_at_threshold() {
        let set = signers(3);
        let mut q = KeyedQuorum::new();

        let out = q.approve(&set, addr(1), 7, "allow").unwrap();
        assert_eq!(out, ApprovalOutcome::Pending { approvals: 1, required: 2 });
        let out = q.approve(&set, addr(2), 7, "allow").unwrap();
        assert_eq!(out, ApprovalOutcome::Executed("allow"));

        let view = q.view(7).unwrap();
        assert!(view.executed);
        assert_eq!(view.approval_count, 0);
        assert_eq!(
            q.approve(&set, addr(3), 7, "allow").unwrap_err(),
            QuorumError::AlreadyExecuted(7)
        );
    }

    #[test]
    fn keyed_rejects_conflicts_duplicates_and_zero_id() {
        let set = signers(5);
        let mut q = KeyedQuorum::new();
        q.approve(&set, addr(1), 1, 10u32).unwrap();

        assert_eq!(
            q.approve(&set, addr(2), 1, 11).unwrap_err(),
            QuorumError::ConflictingPayload(1)
        );
        assert_eq!(
            q.approve(&set, addr(1), 1, 10).unwrap_err(),
            QuorumError::AlreadyApproved(addr(1))
        );
        assert_eq!(
            q.approve(&set, addr(1), 0, 10).unwrap_err(),
            QuorumError::InvalidProposal(0)
        );
        assert_eq!(
            q.approve(&set, addr(9), 1, 10).unwrap_err(),
            QuorumError::NotSigner(addr(9))
        );
        assert_eq!(q.view(1).unwrap().approval_count, 1);
    }

    #[test]
    fn singleton_resets_on_new_payload() {
        let set = signers(3);
        let mut q = SingletonQuorum::new();

        q.approve(&set, addr(1), 500u128).unwrap();
        q.approve(&set, addr(2), 600).unwrap();
        assert!(!q.has_approved(&addr(1)));
        assert_eq!(q.view().unwrap().approval_count, 1);

        // Signer 1 must re-approve the new payload.
        let out = q.approve(&set, addr(1), 600).unwrap();
        assert_eq!(out, ApprovalOutcome::Executed(600));
    }

    #[test]
    fn singleton_same_payload_after_execution_starts_fresh() {
        let set = signers(3);
        let mut q = SingletonQuorum::new();
        q.approve(&set, addr(1), 500u128).unwrap();
        assert!(q.approve(&set, addr(2), 500).unwrap().is_executed());

        for s in 1..=3 {
            assert!(!q.has_approved(&addr(s)));
        }

        let out = q.approve(&set, addr(3), 500).unwrap();
        assert_eq!(out, ApprovalOutcome::Pending { approvals: 1, required: 2 });
        assert!(!q.view().unwrap().executed);
        assert!(q.approve(&set, addr(1), 500).unwrap().is_executed());
    }

    #[test]
    fn threshold_is_read_at_evaluation_time() {
        let mut set = signers(4);
        let mut q = SingletonQuorum::new();
        q.approve(&set, addr(1), 1u8).unwrap();
        q.approve(&set, addr(2), 1).unwrap();
        assert!(!q.view().unwrap().executed);

        // Shrinking to three signers lowers the threshold to two; the
        // pending count now meets it and the next approval executes
        // without being recorded.
        set.remove(&addr(4)).unwrap();
        let out = q.approve(&set, addr(3), 1).unwrap();
        assert_eq!(out, ApprovalOutcome::Executed(1));
    }

    #[test]
    fn prune_drops_removed_signer_approvals() {
        let set = signers(4);
        let mut keyed = KeyedQuorum::new();
        let mut single = SingletonQuorum::new();
        keyed.approve(&set, addr(4), 1, true).unwrap();
        single.approve(&set, addr(4), 9u8).unwrap();

        keyed.prune_signer(&addr(4));
        single.prune_signer(&addr(4));
        assert_eq!(keyed.view(1).unwrap().approval_count, 0);
        assert_eq!(single.view().unwrap().approval_count, 0);
    }
}
