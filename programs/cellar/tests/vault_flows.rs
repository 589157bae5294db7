mod common;

use anchor_lang::prelude::*;
use ::cellar::{constants::MIN_SHARE_SUPPLY, errors::CellarError, state::*};
use common::*;

#[test]
fn test_first_deposit_mints_one_to_one() {
    let mut h = Harness::new();
    let alice = h.user(1_000);

    let shares = h.deposit(&alice, 1_000 * USDC).unwrap();

    assert_eq!(shares, 1_000 * USDC);
    assert_eq!(h.shares_of(&alice), shares);
    assert_eq!(h.cellar.total_shares, shares);
    assert_eq!(h.chain.supply(&h.share_mint()), shares);
    assert_eq!(h.usdc_of(&h.vault()), 1_000 * USDC);
    assert_eq!(h.total_assets(), 1_000 * USDC);
    assert!(!h.cellar.locked);
}

#[test]
fn test_share_price_never_decreases_across_flows() {
    let mut h = Harness::new();
    let alice = h.user(5_000);
    let bob = h.user(5_000);

    h.deposit(&alice, 1_000 * USDC).unwrap();
    let vault = h.vault();
    let usdc = h.usdc;
    // Yield accrues to the vault
    h.chain.credit(&vault, &usdc, 100 * USDC);

    let mut price = h.share_price();
    let mut check = |h: &Harness| {
        let next = h.share_price();
        assert!(next >= price, "share price fell from {} to {}", price, next);
        price = next;
    };

    h.deposit(&bob, 333 * USDC).unwrap();
    check(&h);
    h.withdraw(&alice, 77 * USDC + 1).unwrap();
    check(&h);
    h.mint(&bob, 12_345_678).unwrap();
    check(&h);
    let half = h.shares_of(&alice) / 2;
    h.redeem(&alice, half).unwrap();
    check(&h);
    h.deposit(&alice, 3).unwrap();
    check(&h);
}

#[test]
fn test_deposit_redeem_round_trip_never_profits() {
    let mut h = Harness::new();
    let alice = h.user(1_000);
    let bob = h.user(1_000);

    h.deposit(&alice, 1_000 * USDC).unwrap();
    let vault = h.vault();
    let usdc = h.usdc;
    h.chain.credit(&vault, &usdc, 100 * USDC);

    let shares = h.deposit(&bob, 333 * USDC).unwrap();
    assert_eq!(shares, 302_727_272);
    let assets = h.redeem(&bob, shares).unwrap();
    assert_eq!(assets, 332_999_999);
    assert_eq!(h.usdc_of(&bob), 1_000 * USDC - 1);
    assert_eq!(h.shares_of(&bob), 0);
}

#[test]
fn test_mint_and_withdraw_round_up_against_caller() {
    let mut h = Harness::new();
    let alice = h.user(2_000);

    h.deposit(&alice, 1_000 * USDC).unwrap();
    let vault = h.vault();
    let usdc = h.usdc;
    h.chain.credit(&vault, &usdc, 100 * USDC);

    let quoted = h
        .view(|cellar, env, chain| cellar.preview_mint(env, chain, 100 * USDC))
        .unwrap();
    let paid = h.mint(&alice, 100 * USDC).unwrap();
    assert_eq!(paid, 110 * USDC);
    assert_eq!(paid, quoted);

    // 1 unit of assets at a share price of 1.1 costs one whole share unit
    let shares_before = h.shares_of(&alice);
    let burned = h.withdraw(&alice, 1).unwrap();
    assert_eq!(burned, 1);
    assert_eq!(h.shares_of(&alice), shares_before - 1);
}

#[test]
fn test_slippage_bounds_on_user_flows() {
    let mut h = Harness::new();
    let alice = h.user(1_000);
    h.deposit(&alice, 500 * USDC).unwrap();

    let err = h
        .transact(|cellar, env, chain| {
            cellar.deposit(env, chain, &alice, &alice, 100 * USDC, 100 * USDC + 1)
        })
        .unwrap_err();
    assert_eq!(err, CellarError::MinimumOutputNotMet.into());

    let err = h
        .transact(|cellar, env, chain| cellar.mint(env, chain, &alice, &alice, 100 * USDC, 99 * USDC))
        .unwrap_err();
    assert_eq!(err, CellarError::SlippageExceeded.into());

    let err = h
        .transact(|cellar, env, chain| {
            cellar.redeem(env, chain, &alice, &alice, 100 * USDC, 100 * USDC + 1)
        })
        .unwrap_err();
    assert_eq!(err, CellarError::MinimumOutputNotMet.into());
    assert_eq!(h.usdc_of(&alice), 500 * USDC);
}

#[test]
fn test_first_deposit_below_minimum_rejected() {
    let mut h = Harness::with_settings(CellarSettings {
        min_initial_deposit: 100 * USDC,
        ..CellarSettings::default()
    });
    let alice = h.user(1_000);

    let err = h.deposit(&alice, 50 * USDC).unwrap_err();
    assert_eq!(err, CellarError::DepositBelowMinimum.into());
    assert_eq!(h.usdc_of(&alice), 1_000 * USDC);
    assert_eq!(h.cellar.total_shares, 0);

    h.deposit(&alice, 100 * USDC).unwrap();
    // Once shares exist any size is fine
    h.deposit(&alice, 1).unwrap();
}

#[test]
fn test_donation_cannot_steal_from_next_depositor() {
    let mut h = Harness::new();
    let attacker = h.user(1);
    let victim = h.user(1_000);

    // A dust first deposit cannot seed the share supply
    let err = h.deposit(&attacker, 1).unwrap_err();
    assert_eq!(err, CellarError::DepositBelowMinimum.into());

    // Cheapest seed the floor allows, then a donation 500x its size
    h.deposit(&attacker, USDC).unwrap();
    assert_eq!(h.shares_of(&attacker), MIN_SHARE_SUPPLY);
    let vault = h.vault();
    let usdc = h.usdc;
    h.chain.credit(&vault, &usdc, 500 * USDC);

    let shares = h.deposit(&victim, 1_000 * USDC).unwrap();
    assert_eq!(shares, 1_996_007);
    let value = h
        .view(|cellar, env, chain| cellar.convert_to_assets(env, chain, shares))
        .unwrap();
    // The victim keeps all but a fraction of one share
    assert_eq!(value, 999_999_835);
    let one_share = h
        .view(|cellar, env, chain| cellar.convert_to_assets(env, chain, 1))
        .unwrap();
    assert!(1_000 * USDC - value < one_share);
}

#[test]
fn test_exit_cannot_leave_dust_supply() {
    let mut h = Harness::new();
    let alice = h.user(10);
    h.deposit(&alice, 10 * USDC).unwrap();

    let err = h.redeem(&alice, 10 * USDC - 1).unwrap_err();
    assert_eq!(err, CellarError::DustShareSupply.into());
    let err = h.withdraw(&alice, 10 * USDC - MIN_SHARE_SUPPLY + 1).unwrap_err();
    assert_eq!(err, CellarError::DustShareSupply.into());
    assert_eq!(h.shares_of(&alice), 10 * USDC);

    // Leaving exactly the floor, or nothing, is fine
    h.redeem(&alice, 9 * USDC).unwrap();
    assert_eq!(h.cellar.total_shares, MIN_SHARE_SUPPLY);
    h.redeem(&alice, MIN_SHARE_SUPPLY).unwrap();
    assert_eq!(h.cellar.total_shares, 0);
    assert_eq!(h.usdc_of(&alice), 10 * USDC);
}

#[test]
fn test_zero_amounts_rejected() {
    let mut h = Harness::new();
    let alice = h.user(10);
    assert_eq!(h.deposit(&alice, 0).unwrap_err(), CellarError::ZeroAmount.into());
    assert_eq!(h.mint(&alice, 0).unwrap_err(), CellarError::ZeroShares.into());
    h.deposit(&alice, 10 * USDC).unwrap();
    assert_eq!(h.withdraw(&alice, 0).unwrap_err(), CellarError::ZeroAmount.into());
    assert_eq!(h.redeem(&alice, 0).unwrap_err(), CellarError::ZeroShares.into());
}

#[test]
fn test_share_supply_cap() {
    let mut h = Harness::with_settings(CellarSettings {
        share_supply_cap: 500 * USDC,
        ..CellarSettings::default()
    });
    let alice = h.user(1_000);
    h.deposit(&alice, 400 * USDC).unwrap();
    let err = h.deposit(&alice, 101 * USDC).unwrap_err();
    assert_eq!(err, CellarError::ShareSupplyCapExceeded.into());
    h.deposit(&alice, 100 * USDC).unwrap();
}

#[test]
fn test_shutdown_blocks_deposits_but_not_withdrawals() {
    let mut h = Harness::new();
    let alice = h.user(1_000);
    h.deposit(&alice, 500 * USDC).unwrap();

    let owner = h.owner;
    h.cellar.set_shutdown(&owner, true).unwrap();

    assert_eq!(h.deposit(&alice, USDC).unwrap_err(), CellarError::Shutdown.into());
    assert_eq!(h.mint(&alice, USDC).unwrap_err(), CellarError::Shutdown.into());
    h.withdraw(&alice, 200 * USDC).unwrap();
    assert_eq!(h.usdc_of(&alice), 700 * USDC);

    h.cellar.set_shutdown(&owner, false).unwrap();
    h.deposit(&alice, USDC).unwrap();
}

#[test]
fn test_registry_pause_blocks_user_flows() {
    let mut h = Harness::new();
    let alice = h.user(1_000);
    h.deposit(&alice, 500 * USDC).unwrap();

    let (governance, address) = (h.governance, h.cellar.address);
    h.registry.set_paused(&governance, address, true).unwrap();

    assert_eq!(h.deposit(&alice, USDC).unwrap_err(), CellarError::Paused.into());
    assert_eq!(h.withdraw(&alice, USDC).unwrap_err(), CellarError::Paused.into());
    assert_eq!(h.redeem(&alice, USDC).unwrap_err(), CellarError::Paused.into());
    let err = h.rebalance(Vec::new(), None).unwrap_err();
    assert_eq!(err, CellarError::Paused.into());
    let max = h
        .view(|cellar, env, chain| cellar.max_withdraw(env, chain, &alice))
        .unwrap();
    assert_eq!(max, 0);

    h.registry.set_paused(&governance, address, false).unwrap();
    h.withdraw(&alice, USDC).unwrap();
}

#[test]
fn test_convert_and_preview_views() {
    let mut h = Harness::new();
    let alice = h.user(1_000);

    // Empty cellar converts 1:1
    let shares = h
        .view(|cellar, env, chain| cellar.convert_to_shares(env, chain, 42))
        .unwrap();
    assert_eq!(shares, 42);

    h.deposit(&alice, 1_000 * USDC).unwrap();
    let vault = h.vault();
    let usdc = h.usdc;
    h.chain.credit(&vault, &usdc, 500 * USDC);

    let (deposit, withdraw, redeem) = h
        .view(|cellar, env, chain| {
            Ok((
                cellar.preview_deposit(env, chain, 150 * USDC)?,
                cellar.preview_withdraw(env, chain, 150 * USDC)?,
                cellar.preview_redeem(env, chain, 100 * USDC)?,
            ))
        })
        .unwrap();
    assert_eq!(deposit, 100 * USDC);
    assert_eq!(withdraw, 100 * USDC);
    assert_eq!(redeem, 150 * USDC);
    assert_eq!(h.share_price(), 1_500_000);

    let max = h
        .view(|cellar, env, chain| cellar.max_withdraw(env, chain, &alice))
        .unwrap();
    assert_eq!(max, 1_500 * USDC);
}

#[test]
fn test_cannot_redeem_more_than_owned() {
    let mut h = Harness::new();
    let alice = h.user(100);
    let bob = h.user(100);
    h.deposit(&alice, 100 * USDC).unwrap();
    h.deposit(&bob, 100 * USDC).unwrap();

    let err = h.redeem(&alice, 100 * USDC + 1).unwrap_err();
    assert_eq!(err, ProgramError::InsufficientFunds.into());
    assert_eq!(h.shares_of(&alice), 100 * USDC);
    assert_eq!(h.cellar.total_shares, 200 * USDC);
}
