//! Performance ranking for the periodic summary.

use crate::TrackedToken;
use compact_str::CompactString;

/// One line of the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub id: CompactString,
    pub display_name: CompactString,
    pub symbol: CompactString,
    /// Peak value divided by baseline.
    pub peak_multiple: f64,
}

/// Select tokens whose peak reached `min_multiple`, best first.
///
/// Tokens with an unusable baseline are skipped. Ties keep the order of
/// `tokens`.
pub fn rank(tokens: &[TrackedToken], min_multiple: f64) -> Vec<SummaryEntry> {
    let mut entries: Vec<SummaryEntry> = tokens
        .iter()
        .filter_map(|t| {
            let multiple = t.peak_multiple()?;
            (multiple >= min_multiple).then(|| SummaryEntry {
                id: t.id.clone(),
                display_name: t.display_name.clone(),
                symbol: t.symbol.clone(),
                peak_multiple: multiple,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.peak_multiple.total_cmp(&a.peak_multiple));
    entries
}
