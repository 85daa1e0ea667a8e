//! Descriptive statistics over day counts

/// Arithmetic mean; 0.0 for an empty population
pub fn average(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Mean rounded to whole days
pub fn rounded_average(values: &[i64]) -> i64 {
    average(values).round() as i64
}

pub fn median(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}

/// Population standard deviation
pub fn standard_deviation(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mean = average(values);
    let variance = values
        .iter()
        .map(|v| {
            let diff = *v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;

    Some(variance.sqrt())
}

/// Median of absolute deviations from the median
pub fn median_absolute_deviation(values: &[i64]) -> Option<f64> {
    let center = median(values)?;
    let mut deviations: Vec<f64> = values.iter().map(|v| (*v as f64 - center).abs()).collect();
    deviations.sort_by(|a, b| a.total_cmp(b));

    let mid = deviations.len() / 2;
    if deviations.len() % 2 == 0 {
        Some((deviations[mid - 1] + deviations[mid]) / 2.0)
    } else {
        Some(deviations[mid])
    }
}

/// Share of `part` in `whole`, 0.0 when `whole` is zero
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[2, 4, 9]), 5.0);
        assert_eq!(rounded_average(&[1, 2]), 2);
        assert_eq!(rounded_average(&[]), 0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[5, 1, 3]), Some(3.0));
        assert_eq!(median(&[4, 1, 3, 2]), Some(2.5));
    }

    #[test]
    fn test_standard_deviation_is_population() {
        let sd = standard_deviation(&[2, 4, 4, 4, 5, 5, 7, 9]).unwrap();
        assert!((sd - 2.0).abs() < f64::EPSILON);
        assert_eq!(standard_deviation(&[]), None);
        assert_eq!(standard_deviation(&[7]), Some(0.0));
    }

    #[test]
    fn test_median_absolute_deviation() {
        // median 2, deviations 1,1,0,0,2,4,7 -> median 1
        assert_eq!(median_absolute_deviation(&[1, 1, 2, 2, 4, 6, 9]), Some(1.0));
        assert_eq!(median_absolute_deviation(&[]), None);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 4), 0.25);
        assert_eq!(percent(3, 0), 0.0);
    }
}
