//! Column naming convention for horizon-keyed feature and response columns.
//!
//! A moving column is named `{base}_{backward}_{forward}`: the number of
//! seconds the value looks back and the number it looks ahead. Features look
//! back (`order_imbalance_ratio_60_0`), responses look ahead (`tick_move_0_60`).

/// Name of the column for `base` looking back `backward` and ahead `forward` seconds.
pub fn moving_column_name(base: &str, backward: u32, forward: u32) -> String {
    format!("{base}_{backward}_{forward}")
}

/// Strip the two trailing horizon segments from a moving column name.
///
/// Returns the input unchanged if it does not end in two numeric segments.
pub fn raw_column_name(column: &str) -> &str {
    match parse_moving_column(column) {
        Some((base, _, _)) => base,
        None => column,
    }
}

/// Split a moving column name into `(base, backward, forward)`.
pub fn parse_moving_column(column: &str) -> Option<(&str, u32, u32)> {
    let (rest, forward) = column.rsplit_once('_')?;
    let (base, backward) = rest.rsplit_once('_')?;
    if base.is_empty() {
        return None;
    }
    let forward = forward.parse().ok()?;
    let backward = backward.parse().ok()?;
    Some((base, backward, forward))
}

/// Lookback variants of `feature`, one per horizon.
pub fn feature_variants(feature: &str, freqs: &[u32]) -> Vec<String> {
    freqs
        .iter()
        .map(|&h| moving_column_name(feature, h, 0))
        .collect()
}

/// The forward response column used as fit and evaluation target.
pub fn target_column(response: &str, holding_period: u32) -> String {
    moving_column_name(response, 0, holding_period)
}

/// Forward response columns correlated against feature variants.
///
/// One per horizon in `freqs` plus the holding period, ascending and deduplicated.
pub fn response_variants(response: &str, freqs: &[u32], holding_period: u32) -> Vec<String> {
    let mut horizons: Vec<u32> = freqs.to_vec();
    horizons.push(holding_period);
    horizons.sort_unstable();
    horizons.dedup();
    horizons
        .into_iter()
        .map(|h| moving_column_name(response, 0, h))
        .collect()
}
