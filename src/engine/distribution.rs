//! Amount distribution across a sub-wallet window
//!
//! Pure arithmetic; the random source is passed in so tests can seed it.

use rand::Rng;

use crate::constants::LAMPORTS_PER_SOL;

/// Lamports kept back on the main wallet on top of one principal
pub fn reserve_margin(principal_lamports: u64, reserve_margin_ratio: f64) -> u64 {
    (principal_lamports as f64 * reserve_margin_ratio).floor() as u64
}

/// Balance left to spread across the window
///
/// Saturates at zero when the balance barely covers principal and margin.
pub fn distributable_amount(
    main_balance: u64,
    principal_lamports: u64,
    reserve_margin_ratio: f64,
) -> u64 {
    main_balance
        .saturating_sub(principal_lamports)
        .saturating_sub(reserve_margin(principal_lamports, reserve_margin_ratio))
}

/// Even share of the distributable amount per wallet
pub fn per_wallet_base(distributable: u64, window_size: usize) -> u64 {
    if window_size == 0 {
        return 0;
    }
    distributable / window_size as u64
}

/// One randomized amount per wallet: `floor(base * factor)`, factor drawn
/// uniformly from `[factor_min, factor_max]`
pub fn draw_amounts<R: Rng + ?Sized>(
    base: u64,
    count: usize,
    factor_min: f64,
    factor_max: f64,
    rng: &mut R,
) -> Vec<u64> {
    (0..count)
        .map(|_| {
            let factor = if factor_max > factor_min {
                rng.gen_range(factor_min..=factor_max)
            } else {
                factor_min
            };
            (base as f64 * factor).floor() as u64
        })
        .collect()
}

/// SOL traded by a set of amounts; each wallet buys and sells once
pub fn raw_volume(amounts: &[u64]) -> f64 {
    let total: u64 = amounts.iter().sum();
    total as f64 / LAMPORTS_PER_SOL as f64 * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_distributable_subtracts_principal_and_margin() {
        // 5% of 1_000_000 is 50_000
        assert_eq!(distributable_amount(5_000_000, 1_000_000, 0.05), 3_950_000);
    }

    #[test]
    fn test_exact_cover_distributes_nothing() {
        let principal = 1_000_000;
        let balance = principal + reserve_margin(principal, 0.05);
        let distributable = distributable_amount(balance, principal, 0.05);
        assert_eq!(distributable, 0);

        let base = per_wallet_base(distributable, 4);
        let mut rng = StdRng::seed_from_u64(7);
        assert!(draw_amounts(base, 4, 0.8, 0.9, &mut rng)
            .iter()
            .all(|a| *a == 0));
    }

    #[test]
    fn test_balance_below_principal_saturates() {
        assert_eq!(distributable_amount(10, 1_000, 0.05), 0);
    }

    #[test]
    fn test_per_wallet_base() {
        assert_eq!(per_wallet_base(4_003, 4), 1_000);
        assert_eq!(per_wallet_base(4_003, 0), 0);
    }

    #[test]
    fn test_amounts_stay_in_factor_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let amounts = draw_amounts(1_000, 4, 0.8, 0.9, &mut rng);
            assert_eq!(amounts.len(), 4);
            assert!(amounts.iter().all(|a| (800..=900).contains(a)));
        }
    }

    #[test]
    fn test_window_volume_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let unit = LAMPORTS_PER_SOL as f64;
        let lower = 4.0 * 1_000.0 * 0.8 * 2.0 / unit;
        let upper = 4.0 * 1_000.0 * 0.9 * 2.0 / unit;

        for _ in 0..50 {
            let volume = raw_volume(&draw_amounts(1_000, 4, 0.8, 0.9, &mut rng));
            assert!(volume >= lower && volume <= upper, "volume {} out of range", volume);
        }
    }

    #[test]
    fn test_degenerate_factor_range() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw_amounts(1_000, 2, 0.85, 0.85, &mut rng), vec![850, 850]);
    }

    #[test]
    fn test_raw_volume_counts_both_legs() {
        assert_eq!(raw_volume(&[LAMPORTS_PER_SOL / 2, LAMPORTS_PER_SOL / 2]), 2.0);
        assert_eq!(raw_volume(&[]), 0.0);
    }
}
