/// `q`-th percentile (0..=100) with linear interpolation between the
/// closest ranks. Non-finite values are ignored; `None` if nothing is
/// left.
pub fn percentile(values: &[f32], q: f32) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (q.clamp(0., 100.) / 100.) * (sorted.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Median of the finite values
pub fn median(values: &[f32]) -> Option<f32> {
    percentile(values, 50.)
}
