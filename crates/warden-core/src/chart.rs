//! Plain-text bar chart of a [`LevelTally`].

use std::fmt::Write as _;

use crate::tally::LevelTally;

/// Title line of every chart.
pub const CHART_TITLE: &str = "Log Level Analysis";

/// Default bar width in characters.
pub const DEFAULT_CHART_WIDTH: usize = 40;

/// Renders a horizontal bar chart, one bar per level in report order.
///
/// Bars are scaled so the largest count spans `width` characters. Any
/// non-zero count gets at least one character unless `width` is zero.
#[must_use]
pub fn render_bar_chart(tally: &LevelTally, width: usize) -> String {
    let max = tally.iter().map(|(_, count)| count).max().unwrap_or(0);
    let label_width = tally
        .iter()
        .map(|(level, _)| level.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::from(CHART_TITLE);
    for (level, count) in tally.iter() {
        let len = bar_len(count, max, width);
        let _ = write!(
            out,
            "\n{:<label_width$} | {} {count}",
            level.as_str(),
            "#".repeat(len)
        );
    }
    out
}

fn bar_len(count: u64, max: u64, width: usize) -> usize {
    if count == 0 || max == 0 || width == 0 {
        return 0;
    }
    let scaled = (count as f64 / max as f64 * width as f64).round() as usize;
    scaled.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::SeverityLevel;
    use crate::tally::tally;

    #[test]
    fn chart_has_title_and_one_row_per_level() {
        let chart = render_bar_chart(&LevelTally::new(), DEFAULT_CHART_WIDTH);
        let rows: Vec<_> = chart.lines().collect();
        assert_eq!(rows[0], CHART_TITLE);
        assert_eq!(rows.len(), 6);
        assert!(rows[1].starts_with("INFO "));
        assert!(rows[5].starts_with("CRITICAL "));
    }

    #[test]
    fn largest_count_spans_full_width() {
        let t = tally(["a - ERROR - x", "a - ERROR - y", "a - INFO - z"]);
        let chart = render_bar_chart(&t, 10);

        let error_row = chart.lines().find(|l| l.starts_with("ERROR")).unwrap();
        assert!(error_row.ends_with(&format!("{} 2", "#".repeat(10))));

        let info_row = chart.lines().find(|l| l.starts_with("INFO")).unwrap();
        assert!(info_row.ends_with(&format!("{} 1", "#".repeat(5))));
    }

    #[test]
    fn zero_counts_have_empty_bars() {
        let t = tally(["a - CRITICAL - x"]);
        let chart = render_bar_chart(&t, 10);
        let debug_row = chart.lines().find(|l| l.starts_with("DEBUG")).unwrap();
        assert!(debug_row.ends_with("|  0"));
    }

    #[test]
    fn zero_width_draws_no_bars() {
        let t = tally(["a - ERROR - x", "a - INFO - y"]);
        let chart = render_bar_chart(&t, 0);

        assert!(!chart.contains('#'));
        let error_row = chart.lines().find(|l| l.starts_with("ERROR")).unwrap();
        assert!(error_row.ends_with("|  1"));
    }

    #[test]
    fn tiny_share_still_visible() {
        let mut t = LevelTally::new();
        for _ in 0..1000 {
            t.record(SeverityLevel::Info);
        }
        t.record(SeverityLevel::Critical);

        let chart = render_bar_chart(&t, 20);
        let row = chart.lines().find(|l| l.starts_with("CRITICAL")).unwrap();
        assert!(row.ends_with("| # 1"));
    }
}
