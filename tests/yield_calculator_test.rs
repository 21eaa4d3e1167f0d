use std::sync::Arc;
use std::time::Duration;
use yieldtick::engine::{total_usd, CachedCostBasisResolver, YieldCalculator, YieldRequest};
use yieldtick::{
    Decimal, DepositEvent, MockDataSource, OwnerId, Timestamp, VaultId, YieldMode,
    SECONDS_PER_YEAR,
};

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn calculator(mock: MockDataSource) -> YieldCalculator {
    let resolver = CachedCostBasisResolver::new(Arc::new(mock), Duration::ZERO);
    YieldCalculator::new(Arc::new(resolver))
}

fn request(mode: YieldMode, balance: &str, rate: &str, apy: &str, from: i64, to: i64) -> YieldRequest {
    YieldRequest {
        balance: Some(d(balance)),
        apy_percent: Some(d(apy)),
        from_ts: Some(Timestamp::new(from)),
        to_ts: Some(Timestamp::new(to)),
        mode,
        deposit_history: None,
        owner_id: OwnerId::new("0xowner"),
        exchange_rate: Some(d(rate)),
        vault_token_id: VaultId::new("0xvault"),
        asset_decimals: 6,
    }
}

fn assert_close(actual: Decimal, expected: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff < d("0.000000001"),
        "expected {} got {} (diff {})",
        expected,
        actual,
        diff
    );
}

#[tokio::test]
async fn test_non_positive_balance_is_zero_in_every_mode() {
    let calc = calculator(MockDataSource::new());
    for mode in [YieldMode::TotalUsd, YieldMode::CurrentPrincipalGrowth] {
        for balance in ["0", "-10"] {
            let req = request(mode, balance, "1.2", "50", 0, SECONDS_PER_YEAR * 3);
            assert_eq!(calc.calculate(&req).await, Decimal::zero());
        }
        let mut missing = request(mode, "1", "1.2", "50", 0, 100);
        missing.balance = None;
        assert_eq!(calc.calculate(&missing).await, Decimal::zero());
    }
}

#[tokio::test]
async fn test_total_usd_matches_closed_form() {
    let calc = calculator(MockDataSource::new());
    let cases = [
        ("1000", "1.05", "10", 1_000, 1_000 + 86_400),
        ("12.5", "0.998", "4.2", 0, SECONDS_PER_YEAR / 2),
        ("3", "2", "0", 50, 5_000),
        ("250000", "1.0001", "7.77", 1_700_000_000, 1_700_000_001),
    ];
    for (balance, rate, apy, t0, t1) in cases {
        let value = calc
            .calculate(&request(YieldMode::TotalUsd, balance, rate, apy, t0, t1))
            .await;

        let principal = d(balance) * d(rate);
        let expected = principal
            + d(apy) / Decimal::hundred() * Decimal::from(t1 - t0)
                / Decimal::from(SECONDS_PER_YEAR)
                * principal;
        assert_close(value, expected);
    }
}

#[tokio::test]
async fn test_total_usd_end_to_end_figure() {
    let calc = calculator(MockDataSource::new());
    let now = 1_700_000_000;
    let value = calc
        .calculate(&request(YieldMode::TotalUsd, "1000", "1.05", "10", now - 86_400, now))
        .await;
    assert_eq!(value.round_dp(4), d("1050.2877"));
    assert_eq!(value.round_dp(2), d("1050.29"));
}

#[tokio::test]
async fn test_identical_inputs_identical_output() {
    let calc = calculator(MockDataSource::new());
    let req = request(YieldMode::TotalUsd, "42.42", "1.013", "6.5", 10, 9_999_999);
    let first = calc.calculate(&req).await;
    let second = calc.calculate(&req).await;
    assert_eq!(first, second);

    let pure = total_usd(
        req.balance,
        req.exchange_rate,
        req.apy_percent,
        req.from_ts,
        req.to_ts,
    );
    assert_eq!(first, pure);
}

#[tokio::test]
async fn test_total_usd_ignores_deposit_history() {
    let calc = calculator(MockDataSource::new());
    let base = request(YieldMode::TotalUsd, "100", "1", "10", 0, 86_400);
    let mut with_history = base.clone();
    with_history.deposit_history = Some(vec![DepositEvent::deposit(
        VaultId::new("0xvault"),
        Timestamp::new(80_000),
        d("100000000"),
    )]);
    assert_eq!(
        calc.calculate(&base).await,
        calc.calculate(&with_history).await
    );
}

#[tokio::test]
async fn test_principal_growth_from_supplied_history() {
    let calc = calculator(MockDataSource::new());
    let vault = VaultId::new("0xvault");
    let mut req = request(
        YieldMode::CurrentPrincipalGrowth,
        "100",
        "1",
        "10",
        5_000,
        SECONDS_PER_YEAR,
    );
    req.deposit_history = Some(vec![
        DepositEvent::deposit(vault.clone(), Timestamp::new(0), d("150000000")),
        DepositEvent::withdrawal(vault, Timestamp::new(5_000), d("50000000")),
    ]);

    // 100 of principal open since t=0, 10% for one year.
    assert_eq!(calc.calculate(&req).await, d("10"));
}

#[tokio::test]
async fn test_principal_growth_fetches_history_when_not_supplied() {
    let owner = OwnerId::new("0xowner");
    let vault = VaultId::new("0xvault");
    let mock = MockDataSource::new().with_history(
        &owner,
        &vault,
        vec![DepositEvent::deposit(
            vault.clone(),
            Timestamp::new(0),
            d("200000000"),
        )],
    );
    let calc = calculator(mock);
    let req = request(
        YieldMode::CurrentPrincipalGrowth,
        "200",
        "1",
        "5",
        0,
        SECONDS_PER_YEAR,
    );
    assert_eq!(calc.calculate(&req).await, d("10"));
}

#[tokio::test]
async fn test_principal_growth_untracked_balance_uses_last_activity() {
    let calc = calculator(MockDataSource::new());
    let vault = VaultId::new("0xvault");
    let mut req = request(
        YieldMode::CurrentPrincipalGrowth,
        "30",
        "1",
        "10",
        SECONDS_PER_YEAR,
        SECONDS_PER_YEAR * 2,
    );
    req.deposit_history = Some(vec![
        DepositEvent::deposit(vault.clone(), Timestamp::new(0), d("50000000")),
        DepositEvent::withdrawal(vault, Timestamp::new(100), d("50000000")),
    ]);

    // Fallback: principal 30 from last activity, one year at 10%.
    assert_eq!(calc.calculate(&req).await, d("3"));
}
