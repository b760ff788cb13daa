//! Simple Moving Average (SMA).

/// Calculate Simple Moving Average.
///
/// # Arguments
///
/// * `data` - Price series
/// * `period` - Lookback period
///
/// # Returns
///
/// One entry per input value. The first `period - 1` entries are `None`,
/// as is every entry when `period` is zero or longer than the series.
///
/// # Example
///
/// ```rust
/// use folio_core::indicators::sma;
///
/// let prices = vec![10.0, 11.0, 12.0, 11.0, 10.0];
/// let sma_values = sma(&prices, 3);
///
/// assert!(sma_values[1].is_none());
/// // SMA at index 2 = (10 + 11 + 12) / 3 = 11.0
/// assert!((sma_values[2].unwrap() - 11.0).abs() < 0.001);
/// ```
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = data.len();
    let mut result = vec![None; n];

    if period == 0 || period > n {
        return result;
    }

    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);

    // Rolling window
    for i in period..n {
        sum = sum - data[i - period] + data[i];
        result[i] = Some(sum / period as f64);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 2.0);
        assert_relative_eq!(result[3].unwrap(), 3.0);
        assert_relative_eq!(result[4].unwrap(), 4.0);
    }

    #[test]
    fn test_sma_period_1() {
        let data = vec![1.0, 2.0, 3.0];
        let result = sma(&data, 1);
        assert_eq!(result, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_sma_degenerate_periods() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(sma(&data, 10).iter().all(Option::is_none));
        assert!(sma(&data, 0).iter().all(Option::is_none));
        assert!(sma(&[], 3).is_empty());
    }
}
