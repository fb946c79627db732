//! Property tests over random operation sequences.
//!
//! Whatever mix of deposits, withdrawal requests, claims, transfers, rate
//! moves, and clock jumps is thrown at the vault, the running totals must
//! match the request log, supply must match balances, principal must stay
//! backed by the shares it was paid for, pending claims must stay payable,
//! and no request is ever paid twice.

use std::collections::HashMap;
use std::sync::Arc;

use meridian_contracts::events::VaultEvent;
use meridian_contracts::quorum::{ApprovalOutcome, SignerSet, SingletonQuorum};
use meridian_contracts::withdrawal_queue::RequestFilter;
use meridian_contracts::Vault;
use meridian_protocol::clock::ManualClock;
use meridian_protocol::config::{VaultConfig, CONVERSION_SCALE, ONE_ASSET, RATE_SCALE};
use meridian_protocol::ledger::InMemoryLedger;
use meridian_protocol::math::{mul_div, Rounding};
use meridian_protocol::permissions::{Capability, RoleTable};
use meridian_protocol::types::Address;
use proptest::prelude::*;

const HOLDERS: u8 = 3;

#[derive(Debug, Clone)]
enum Op {
    Deposit { who: u8, assets: u128 },
    Request { who: u8, percent: u128 },
    Claim { who: u8, id: u64 },
    BatchClaim { who: u8, ids: Vec<u64> },
    Transfer { from: u8, to: u8, percent: u128 },
    SetRate { rate_pct: u128 },
    Advance { secs: u64 },
}

fn holder(n: u8) -> Address {
    Address::from_low_u8(n + 1)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..HOLDERS, 1u128..500).prop_map(|(who, assets)| Op::Deposit { who, assets }),
        (0..HOLDERS, 1u128..=100).prop_map(|(who, percent)| Op::Request { who, percent }),
        (0..HOLDERS, 0u64..12).prop_map(|(who, id)| Op::Claim { who, id }),
        (0..HOLDERS, prop::collection::vec(1u64..12, 1..4))
            .prop_map(|(who, ids)| Op::BatchClaim { who, ids }),
        (0..HOLDERS, 0..HOLDERS, 1u128..=100)
            .prop_map(|(from, to, percent)| Op::Transfer { from, to, percent }),
        (60u128..200).prop_map(|rate_pct| Op::SetRate { rate_pct }),
        (0u64..200_000).prop_map(|secs| Op::Advance { secs }),
    ]
}

fn setup() -> (Vault<InMemoryLedger>, Arc<ManualClock>) {
    let config = VaultConfig {
        redemption_period_secs: 100_000,
        rate_expire_secs: 365 * 24 * 60 * 60,
        min_deposit: 1,
        ..VaultConfig::default()
    };
    let updater = Address::from_low_u8(0xcc);
    let roles = RoleTable::new();
    roles.grant(Capability::RateUpdater, updater);

    let mut ledger = InMemoryLedger::new();
    for n in 0..HOLDERS {
        ledger
            .credit(config.asset, holder(n), 1_000_000 * ONE_ASSET)
            .unwrap();
    }
    // Yield reserve so appreciated claims can be paid.
    ledger
        .credit(config.asset, config.vault_address, 1_000_000 * ONE_ASSET)
        .unwrap();

    let clock = Arc::new(ManualClock::new(1_000));
    let vault = Vault::new(
        &config,
        vec![Address::from_low_u8(0x51), Address::from_low_u8(0x52)],
        ledger,
        Arc::new(roles),
        clock.clone(),
    )
    .unwrap();
    (vault, clock)
}

fn apply(vault: &mut Vault<InMemoryLedger>, clock: &ManualClock, op: &Op) {
    let updater = Address::from_low_u8(0xcc);
    // Rejections are expected; the invariants must hold either way.
    let _ = match op {
        Op::Deposit { who, assets } => vault
            .deposit(holder(*who), assets * ONE_ASSET, holder(*who))
            .map(|_| ()),
        Op::Request { who, percent } => {
            let balance = vault.balance_of(&holder(*who));
            vault
                .request_withdrawal(holder(*who), balance * percent / 100, holder(*who))
                .map(|_| ())
        }
        Op::Claim { who, id } => vault.claim_withdrawal(holder(*who), *id).map(|_| ()),
        Op::BatchClaim { who, ids } => vault
            .batch_claim_withdrawal(holder(*who), ids)
            .map(|_| ()),
        Op::Transfer { from, to, percent } => {
            let balance = vault.balance_of(&holder(*from));
            vault
                .transfer_shares(holder(*from), holder(*to), balance * percent / 100)
                .map(|_| ())
        }
        Op::SetRate { rate_pct } => vault
            .set_exchange_rate(updater, RATE_SCALE * rate_pct / 100)
            .map(|_| ()),
        Op::Advance { secs } => {
            clock.advance(*secs);
            Ok(())
        }
    };
}

/// Principal per holder rebuilt from the event stream, plus the highest
/// rate any share was ever bought at.
#[derive(Default)]
struct PrincipalModel {
    principal: HashMap<Address, u128>,
    max_rate: u128,
    steps: u128,
}

impl PrincipalModel {
    fn observe(&mut self, vault: &mut Vault<InMemoryLedger>) {
        self.steps += 1;
        self.max_rate = self.max_rate.max(vault.exchange_rate());
        for event in vault.drain_events() {
            match event {
                VaultEvent::Deposited { receiver, assets, .. } => {
                    *self.principal.entry(receiver).or_default() += assets;
                }
                VaultEvent::WithdrawalRequested { owner, cost_basis, .. } => {
                    *self.principal.entry(owner).or_default() -= cost_basis;
                }
                VaultEvent::SharesTransferred {
                    from,
                    to,
                    principal_moved,
                    ..
                } => {
                    *self.principal.entry(from).or_default() -= principal_moved;
                    *self.principal.entry(to).or_default() += principal_moved;
                }
                _ => {}
            }
        }
    }
}

fn check_invariants(
    vault: &Vault<InMemoryLedger>,
    model: &PrincipalModel,
) -> Result<(), TestCaseError> {
    let pending = vault.filter_withdrawal_requests(&RequestFilter {
        claimed: Some(false),
        ..RequestFilter::default()
    });
    let net: u128 = pending.iter().map(|r| r.assets_net).sum();
    let shares: u128 = pending.iter().map(|r| r.shares_burned).sum();
    let fees: u128 = pending.iter().map(|r| r.fee_amount).sum();
    prop_assert_eq!(net, vault.total_withdrawing_assets());
    prop_assert_eq!(shares, vault.total_withdrawing_shares());
    prop_assert_eq!(fees, vault.total_pending_fees());

    // Pending claims, fees included, are always covered.
    prop_assert!(
        vault.asset_balance() >= vault.total_withdrawing_assets() + vault.total_pending_fees()
    );

    let supply: u128 = (0..HOLDERS).map(|n| vault.balance_of(&holder(n))).sum();
    prop_assert_eq!(supply, vault.total_supply());

    for n in 0..HOLDERS {
        let who = holder(n);
        let principal = vault.principal_of(&who);
        let balance = vault.balance_of(&who);
        prop_assert_eq!(principal, model.principal.get(&who).copied().unwrap_or(0));
        if balance == 0 {
            prop_assert_eq!(principal, 0);
        }
        // Principal never exceeds what the held shares cost at the dearest
        // rate seen. Each floor-rounded step may leave one asset unit over.
        let at_cost = mul_div(balance, model.max_rate, CONVERSION_SCALE, Rounding::Ceil).unwrap();
        prop_assert!(
            principal <= at_cost + model.steps,
            "holder {} principal {} above cost {}",
            n,
            principal,
            at_cost
        );
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn totals_match_request_log(ops in prop::collection::vec(op(), 1..60)) {
        let (mut vault, clock) = setup();
        let mut model = PrincipalModel::default();
        model.observe(&mut vault);
        for op in &ops {
            apply(&mut vault, &clock, op);
            model.observe(&mut vault);
            check_invariants(&vault, &model)?;
        }
    }

    #[test]
    fn no_request_is_paid_twice(ops in prop::collection::vec(op(), 1..60)) {
        let (mut vault, clock) = setup();
        let mut paid: HashMap<u64, usize> = HashMap::new();
        for op in &ops {
            apply(&mut vault, &clock, op);
            for event in vault.drain_events() {
                if let VaultEvent::WithdrawalClaimed { id, .. } = event {
                    *paid.entry(id).or_default() += 1;
                }
            }
        }
        prop_assert!(paid.values().all(|count| *count == 1));
        for (id, _) in paid {
            prop_assert!(vault.get_withdrawal_request(id).unwrap().claimed);
        }
    }

    #[test]
    fn fee_never_exceeds_gross(
        deposit in 1u128..10_000,
        rate_pct in 50u128..400,
        percent in 1u128..=100,
    ) {
        let (mut vault, _clock) = setup();
        let who = holder(0);
        vault.deposit(who, deposit * ONE_ASSET, who).unwrap();
        vault
            .set_exchange_rate(Address::from_low_u8(0xcc), RATE_SCALE * rate_pct / 100)
            .unwrap();

        let shares = vault.balance_of(&who) * percent / 100;
        prop_assume!(shares > 0);
        let quote = vault.preview_withdrawal(&who, shares).unwrap();
        prop_assert!(quote.fee <= quote.assets_gross);
        if quote.assets_gross <= quote.cost_basis {
            prop_assert_eq!(quote.fee, 0);
        }
        prop_assert!(quote.assets_net + quote.fee == quote.assets_gross);
    }

    #[test]
    fn quorum_never_executes_below_threshold(
        size in 2usize..9,
        voters in prop::collection::vec(0usize..9, 1..20),
    ) {
        let signers: Vec<Address> = (0..size).map(|n| Address::from_low_u8(n as u8 + 1)).collect();
        let set = SignerSet::new(signers.clone(), 2).unwrap();
        let mut slot = SingletonQuorum::new();
        let mut distinct = std::collections::BTreeSet::new();

        for v in voters {
            let Some(signer) = signers.get(v) else { continue };
            match slot.approve(&set, *signer, 42u32) {
                Ok(ApprovalOutcome::Executed(_)) => {
                    distinct.insert(*signer);
                    prop_assert!(distinct.len() >= set.required_approvals());
                    distinct.clear();
                }
                Ok(ApprovalOutcome::Pending { approvals, required }) => {
                    distinct.insert(*signer);
                    prop_assert!(approvals < required);
                    prop_assert_eq!(approvals, distinct.len());
                }
                Err(_) => prop_assert!(distinct.contains(signer)),
            }
        }
    }
}
