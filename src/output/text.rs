//! Human-readable text output

use super::{coldest, hottest, wettest, RunInfo};
use crate::collector::EntityResult;
use crate::stats::aggregator::compute_totals;
use std::fmt;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Text report over an ordered result collection
pub struct TextReport<'a> {
    results: &'a [EntityResult],
    top_n: usize,
    run: RunInfo,
}

impl<'a> TextReport<'a> {
    pub fn new(results: &'a [EntityResult], top_n: usize, run: RunInfo) -> Self {
        Self { results, top_n, run }
    }
}

/// Print the report to stdout
///
/// Displays:
/// - Top-N hottest and coldest entities by mean temperature
/// - Top-N wettest entities by total precipitation
/// - Overall statistics
/// - Performance
pub fn print_report(results: &[EntityResult], top_n: usize, run: RunInfo) {
    print!("{}", TextReport::new(results, top_n, run));
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "                 WEATHER STATISTICS REPORT")?;
        writeln!(f, "{RULE}")?;
        writeln!(f)?;

        writeln!(f, "Top {} Hottest (mean temperature):", self.top_n)?;
        write_ranking(f, &hottest(self.results, self.top_n), "°C")?;
        writeln!(f)?;

        writeln!(f, "Top {} Coldest (mean temperature):", self.top_n)?;
        write_ranking(f, &coldest(self.results, self.top_n), "°C")?;
        writeln!(f)?;

        writeln!(f, "Top {} Wettest (total precipitation):", self.top_n)?;
        write_ranking(f, &wettest(self.results, self.top_n), "mm")?;
        writeln!(f)?;

        let totals = compute_totals(self.results);
        writeln!(f, "Overall:")?;
        writeln!(f, "  Entities:      {}", format_number(totals.entities as u64))?;
        writeln!(f, "  Records:       {}", format_number(totals.total_records))?;
        writeln!(f, "  Observations:  {}", format_number(totals.total_primary_count))?;
        match totals.global_mean() {
            Some(mean) => writeln!(f, "  Global mean:   {:.2} °C", mean)?,
            None => writeln!(f, "  Global mean:   n/a")?,
        }
        writeln!(f, "  Precipitation: {:.1} mm", totals.total_secondary_sum)?;
        writeln!(f)?;

        writeln!(f, "Performance:")?;
        writeln!(f, "  Backend:       {}", self.run.backend)?;
        writeln!(f, "  Parallelism:   {}", self.run.parallelism)?;
        writeln!(f, "  Elapsed:       {:.3}s", self.run.elapsed.as_secs_f64())?;
        writeln!(f, "  Throughput:    {:.1} entities/s", self.run.entities_per_sec(totals.entities))?;

        writeln!(f, "{RULE}")
    }
}

fn write_ranking(f: &mut fmt::Formatter<'_>, ranked: &[(&EntityResult, f64)], unit: &str) -> fmt::Result {
    if ranked.is_empty() {
        return writeln!(f, "  (no data)");
    }
    for (pos, (result, value)) in ranked.iter().enumerate() {
        writeln!(
            f,
            "  {:>3}. {:<28} {:>9.2} {}  ({} records)",
            pos + 1,
            result.entity,
            value,
            unit,
            format_number(result.stats.total_records)
        )?;
    }
    Ok(())
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
