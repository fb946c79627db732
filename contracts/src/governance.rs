//! # Governance
//!
//! The signer committee and the three actions it controls:
//!
//! | Action | Quorum | Side effect |
//! |---|---|---|
//! | whitelist change | keyed by caller id | flips membership of a destination |
//! | signer change | singleton, resets on new payload | adds or removes a signer, recomputes the threshold |
//! | assets cap change | singleton, resets on new payload | overwrites the deposit cap |
//!
//! Side effects are applied inside the approval that crosses the threshold.
//! There is no separate execute step.

use std::collections::BTreeSet;

use meridian_protocol::types::{amount_serde, Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::quorum::{
    ApprovalOutcome, KeyedQuorum, ProposalView, QuorumError, SignerSet, SignerSetError,
    SingletonQuorum,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from governance calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    /// A proposal targets the zero address.
    #[error("proposal target cannot be the zero address")]
    ZeroTarget,

    /// Approval bookkeeping rejected the call.
    #[error(transparent)]
    Quorum(#[from] QuorumError),

    /// The signer change is not applicable to the current set.
    #[error(transparent)]
    SignerSet(#[from] SignerSetError),
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of a whitelist proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistChange {
    /// Destination being allowed or revoked.
    pub target: Address,
    /// `true` to allow, `false` to revoke.
    pub allow: bool,
}

/// Direction of a signer change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerAction {
    /// Add a signer.
    Add,
    /// Remove a signer.
    Remove,
}

impl std::fmt::Display for SignerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerAction::Add => write!(f, "add"),
            SignerAction::Remove => write!(f, "remove"),
        }
    }
}

/// Payload of a signer-change proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerChange {
    /// Add or remove.
    pub action: SignerAction,
    /// Signer being added or removed.
    pub target: Address,
}

/// Read-only projection of the committee and its proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceSnapshot {
    /// Signers in insertion order.
    pub signers: Vec<Address>,
    /// Current threshold.
    pub required_approvals: usize,
    /// Minimum signer count.
    pub signer_floor: usize,
    /// Whitelisted destinations.
    pub whitelist: Vec<Address>,
    /// Current deposit cap.
    #[serde(with = "amount_serde")]
    pub assets_cap: Amount,
    /// Keyed whitelist proposals by id.
    pub whitelist_proposals: Vec<(u64, ProposalView<WhitelistChange>)>,
    /// The signer-change slot.
    pub signer_change: Option<ProposalView<SignerChange>>,
    /// The cap-change slot.
    pub cap_change: Option<CapProposalView>,
}

/// [`ProposalView`] of the cap slot with the target as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapProposalView {
    /// Proposed cap.
    #[serde(with = "amount_serde")]
    pub target: Amount,
    /// Approvals recorded for the live target.
    pub approval_count: usize,
    /// Whether the target was applied.
    pub executed: bool,
}

impl From<ProposalView<Amount>> for CapProposalView {
    fn from(view: ProposalView<Amount>) -> Self {
        Self {
            target: view.payload,
            approval_count: view.approval_count,
            executed: view.executed,
        }
    }
}

// ---------------------------------------------------------------------------
// Governance
// ---------------------------------------------------------------------------

/// Signers, whitelist, cap, and the three quorums that mutate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governance {
    signers: SignerSet,
    whitelist: BTreeSet<Address>,
    assets_cap: Amount,
    whitelist_quorum: KeyedQuorum<WhitelistChange>,
    signer_quorum: SingletonQuorum<SignerChange>,
    cap_quorum: SingletonQuorum<Amount>,
}

impl Governance {
    /// Creates governance with an empty whitelist.
    pub fn new(signers: SignerSet, assets_cap: Amount) -> Self {
        Self {
            signers,
            whitelist: BTreeSet::new(),
            assets_cap,
            whitelist_quorum: KeyedQuorum::new(),
            signer_quorum: SingletonQuorum::new(),
            cap_quorum: SingletonQuorum::new(),
        }
    }

    /// The signer set.
    pub fn signers(&self) -> &SignerSet {
        &self.signers
    }

    /// `true` if `address` is a signer.
    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Current threshold.
    pub fn required_approvals(&self) -> usize {
        self.signers.required_approvals()
    }

    /// `true` if `address` may receive protocol withdrawals.
    pub fn is_whitelisted(&self, address: &Address) -> bool {
        self.whitelist.contains(address)
    }

    /// Current deposit cap in asset units.
    pub fn assets_cap(&self) -> Amount {
        self.assets_cap
    }

    /// Approves a whitelist change under proposal `id`.
    pub fn approve_whitelist(
        &mut self,
        caller: Address,
        id: u64,
        change: WhitelistChange,
    ) -> Result<ApprovalOutcome<WhitelistChange>, GovernanceError> {
        if self.is_signer(&caller) && change.target.is_zero() {
            return Err(GovernanceError::ZeroTarget);
        }
        let outcome = self
            .whitelist_quorum
            .approve(&self.signers, caller, id, change)?;

        if let ApprovalOutcome::Executed(change) = &outcome {
            if change.allow {
                self.whitelist.insert(change.target);
            } else {
                self.whitelist.remove(&change.target);
            }
            info!(id, target = %change.target, allow = change.allow, "whitelist change executed");
        }
        Ok(outcome)
    }

    /// Approves a signer change. The change is checked against the current
    /// set both here and when it executes.
    pub fn approve_signer_change(
        &mut self,
        caller: Address,
        change: SignerChange,
    ) -> Result<ApprovalOutcome<SignerChange>, GovernanceError> {
        if !self.is_signer(&caller) {
            return Err(QuorumError::NotSigner(caller).into());
        }
        self.check_signer_change(&change)?;

        let outcome = self.signer_quorum.approve(&self.signers, caller, change)?;
        if let ApprovalOutcome::Executed(change) = &outcome {
            self.apply_signer_change(change)?;
        }
        Ok(outcome)
    }

    /// Approves setting the deposit cap to `cap`.
    pub fn approve_cap_change(
        &mut self,
        caller: Address,
        cap: Amount,
    ) -> Result<ApprovalOutcome<Amount>, GovernanceError> {
        let outcome = self.cap_quorum.approve(&self.signers, caller, cap)?;
        if let ApprovalOutcome::Executed(cap) = &outcome {
            let previous = std::mem::replace(&mut self.assets_cap, *cap);
            info!(previous, current = *cap, "assets cap change executed");
        }
        Ok(outcome)
    }

    fn check_signer_change(&self, change: &SignerChange) -> Result<(), GovernanceError> {
        if change.target.is_zero() {
            return Err(GovernanceError::ZeroTarget);
        }
        match change.action {
            SignerAction::Add => self.signers.check_add(&change.target)?,
            SignerAction::Remove => self.signers.check_remove(&change.target)?,
        }
        Ok(())
    }

    fn apply_signer_change(&mut self, change: &SignerChange) -> Result<(), GovernanceError> {
        self.check_signer_change(change)?;
        match change.action {
            SignerAction::Add => self.signers.add(change.target)?,
            SignerAction::Remove => {
                self.signers.remove(&change.target)?;
                self.whitelist_quorum.prune_signer(&change.target);
                self.signer_quorum.prune_signer(&change.target);
                self.cap_quorum.prune_signer(&change.target);
            }
        }
        info!(
            action = %change.action,
            target = %change.target,
            signers = self.signers.len(),
            required = self.signers.required_approvals(),
            "signer change executed"
        );
        Ok(())
    }

    /// Snapshot of whitelist proposal `id`.
    pub fn whitelist_proposal(&self, id: u64) -> Option<ProposalView<WhitelistChange>> {
        self.whitelist_quorum.view(id)
    }

    /// Snapshot of the signer-change slot.
    pub fn signer_change_proposal(&self) -> Option<ProposalView<SignerChange>> {
        self.signer_quorum.view()
    }

    /// Snapshot of the cap-change slot.
    pub fn cap_change_proposal(&self) -> Option<ProposalView<Amount>> {
        self.cap_quorum.view()
    }

    /// `true` if `signer` approved whitelist proposal `id`.
    pub fn has_approved_whitelist(&self, id: u64, signer: &Address) -> bool {
        self.whitelist_quorum
            .get(id)
            .map_or(false, |p| p.has_approved(signer))
    }

    /// `true` if `signer` approved the live signer-change payload.
    pub fn has_approved_signer_change(&self, signer: &Address) -> bool {
        self.signer_quorum.has_approved(signer)
    }

    /// `true` if `signer` approved the live cap-change payload.
    pub fn has_approved_cap_change(&self, signer: &Address) -> bool {
        self.cap_quorum.has_approved(signer)
    }

    /// Full read-only projection.
    pub fn snapshot(&self) -> GovernanceSnapshot {
        GovernanceSnapshot {
            signers: self.signers.signers().to_vec(),
            required_approvals: self.signers.required_approvals(),
            signer_floor: self.signers.floor(),
            whitelist: self.whitelist.iter().copied().collect(),
            assets_cap: self.assets_cap,
            whitelist_proposals: self.whitelist_quorum.views(),
            signer_change: self.signer_quorum.view(),
            cap_change: self.cap_quorum.view().map(CapProposalView::from),
        }
    }
}
