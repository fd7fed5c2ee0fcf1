use crate::manager::defaults::MAX_TRACKED_START_TIMES;

/// Estimates how stably an agent has been running from its launch history.
///
/// `times` is an increasing list of start timestamps, the last one belonging
/// to the present run. Returns the culled history together with a stability
/// factor in `(0, 1]`, or `None` when there is no data. An agent launched
/// exactly once within `window` seconds settles to 1.0; one that keeps
/// getting relaunched scores 0.5 or less.
pub fn stability_factor(times: &[f64], now: f64, window: f64) -> (Vec<f64>, Option<f64>) {
    let Some(&current) = times.last() else {
        return (Vec::new(), None);
    };

    // Keep at most the 200 most recent entries; everything but the current
    // run must also fall inside the window.
    let start = times.len().saturating_sub(MAX_TRACKED_START_TIMES);
    let mut culled: Vec<f64> = times[start..times.len() - 1]
        .iter()
        .copied()
        .filter(|t| *t >= now - window)
        .collect();
    culled.push(current);

    let factor = 1.0 / culled.len() as f64;
    (culled, Some(factor))
}
