#[cfg(test)]
mod tests {
    use super::super::indicators::*;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
        assert!((result[1] - 3.0).abs() < 0.001); // (2+3+4)/3 = 3
        assert!((result[2] - 4.0).abs() < 0.001); // (3+4+5)/3 = 4
    }

    #[test]
    fn test_sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert_eq!(result.len(), 0);
    }

    #[test]
    fn test_rolling_sma_alignment() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_sma(&data, 3);

        assert_eq!(result.len(), data.len());
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert!((result[2].unwrap() - 2.0).abs() < 1e-12);
        assert!((result[4].unwrap() - 4.0).abs() < 1e-12);

        assert!(rolling_sma(&data, 10).iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_pct_change() {
        let result = pct_change(&[100.0, 110.0, 99.0]);

        assert_eq!(result[0], None);
        assert!((result[1].unwrap() - 0.10).abs() < 1e-12);
        assert!((result[2].unwrap() + 0.10).abs() < 1e-12);
        assert!(pct_change(&[]).is_empty());
        assert_eq!(pct_change(&[0.0, 1.0])[1], None);
    }

    #[test]
    fn test_rsi_bounded() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert_eq!(result.len(), prices.len());
        assert!(result[..14].iter().all(|v| v.is_none()));
        let warm: Vec<f64> = result.iter().flatten().copied().collect();
        assert_eq!(warm.len(), prices.len() - 14);
        for value in warm {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_matches_mean_gain_loss() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let gain: f64 = changes[..14].iter().filter(|c| **c > 0.0).sum::<f64>() / 14.0;
        let loss: f64 = changes[..14].iter().filter(|c| **c < 0.0).map(|c| -c).sum::<f64>() / 14.0;
        let expected = 100.0 - 100.0 / (1.0 + gain / loss);

        assert!((result[14].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        let result = rsi(&data, 14);

        assert!(result.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_rsi_saturates_without_losses() {
        let uptrend: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&uptrend, 14);
        assert_eq!(result.last().copied().flatten(), Some(RSI_SATURATED));

        let flat = vec![50.0; 20];
        let result = rsi(&flat, 14);
        assert_eq!(result.last().copied().flatten(), Some(RSI_SATURATED));
    }

    #[test]
    fn test_rsi_zero_without_gains() {
        let downtrend: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let result = rsi(&downtrend, 14);
        assert!(result.last().copied().flatten().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_rolling_std_sample_deviation() {
        let values: Vec<Option<f64>> = vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let result = rolling_std(&values, 3);

        assert_eq!(result[2], None); // window includes the None
        assert!((result[3].unwrap() - 1.0).abs() < 1e-12);
        assert!((result[4].unwrap() - 1.0).abs() < 1e-12);
    }
}
