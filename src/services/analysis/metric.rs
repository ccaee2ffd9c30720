pub const PREFERRED_METRICS: [&str; 8] = [
    "revenue_usd",
    "revenue",
    "sales",
    "amount",
    "total",
    "orders",
    "units_sold",
    "profit",
];

/// Picks the column that drives metric charts. Names are matched
/// case-insensitively and returned with their original casing. When several
/// columns fold to the same name, the last one wins.
pub fn pick_primary_metric<'a>(numeric_columns: &[&'a str]) -> Option<&'a str> {
    PREFERRED_METRICS
        .iter()
        .find_map(|preferred| {
            numeric_columns
                .iter()
                .rev()
                .find(|name| name.to_lowercase() == *preferred)
                .copied()
        })
        .or_else(|| numeric_columns.first().copied())
}
