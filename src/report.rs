//! Console report of an analysis run

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::models::{AnalysisResult, MailCategory, MessageSummary};

static UNSUBSCRIBE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(https?://[^>]+)>").expect("valid unsubscribe pattern"));

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable byte count: `0B`, `512.0 B`, `1.46 KB`, `2.0 GB`
///
/// The value is rounded to two decimals, ties to even, and printed in its
/// shortest form with at least one decimal. GB is the largest unit.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = round_half_even(value * 100.0) / 100.0;
    format!("{:?} {}", rounded, SIZE_UNITS[unit])
}

fn round_half_even(value: f64) -> f64 {
    let floor = value.floor();
    let fraction = value - floor;
    if fraction > 0.5 || (fraction == 0.5 && floor % 2.0 != 0.0) {
        floor + 1.0
    } else {
        floor
    }
}

/// First http(s) URL enclosed in angle brackets; mailto targets are skipped
pub fn extract_unsubscribe_link(header: &str) -> Option<&str> {
    UNSUBSCRIBE_URL
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: MailCategory,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SenderCount {
    pub sender: String,
    pub count: usize,
    pub percentage: f64,
}

/// Report figures derived from one `AnalysisResult`
#[derive(Debug, Clone)]
pub struct Report<'a> {
    pub candidates: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub total_size: u64,
    pub samples: Vec<&'a MessageSummary>,
    pub categories: Vec<CategoryCount>,
    /// Every sender group, most frequent first
    pub senders: Vec<SenderCount>,
    pub top_senders: usize,
}

impl<'a> Report<'a> {
    pub fn from_analysis(analysis: &'a AnalysisResult, sample_count: usize, top_senders: usize) -> Self {
        Self {
            candidates: analysis.candidates,
            analyzed: analysis.analyzed(),
            failed: analysis.failed_ids.len(),
            total_size: analysis.total_size,
            samples: newest_first(&analysis.samples, sample_count),
            categories: category_breakdown(&analysis.samples),
            senders: sender_breakdown(&analysis.samples),
            top_senders,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Candidates found: {}", self.candidates);
        let _ = write!(out, "Analyzed: {}", self.analyzed);
        if self.failed > 0 {
            let _ = write!(out, " ({} could not be fetched)", self.failed);
        }
        out.push('\n');
        let _ = writeln!(out, "\nPotential Space Reclaimed: {}", format_size(self.total_size));
        if self.analyzed < self.candidates {
            let _ = writeln!(
                out,
                "Note: figures cover the {} analyzed messages; all {} candidates will be trashed",
                self.analyzed, self.candidates
            );
        }

        let _ = writeln!(out, "\nTop {} Samples:", self.samples.len());
        for sample in &self.samples {
            let _ = writeln!(
                out,
                "- {}: {} | Subject: {}",
                sample.date.as_deref().unwrap_or("Unknown date"),
                sample.from.as_deref().unwrap_or("Unknown"),
                sample.subject.as_deref().unwrap_or("No Subject")
            );
            if let Some(url) = sample.unsubscribe.as_deref().and_then(extract_unsubscribe_link) {
                let _ = writeln!(out, "  [Unsubscribe: {}]", url);
            }
        }

        let _ = writeln!(out, "\nCategory Breakdown (from candidates):");
        for entry in &self.categories {
            let _ = writeln!(
                out,
                "- {}: {} emails ({:.1}%)",
                entry.category, entry.count, entry.percentage
            );
        }

        let _ = writeln!(out, "\nTop Senders (from samples):");
        for entry in self.senders.iter().take(self.top_senders) {
            let _ = writeln!(
                out,
                "- {}: {} emails ({:.1}%)",
                entry.sender, entry.count, entry.percentage
            );
        }

        out
    }
}

/// Sort by the raw Date header, descending; messages without one go last
fn newest_first(samples: &[MessageSummary], limit: usize) -> Vec<&MessageSummary> {
    let mut sorted: Vec<&MessageSummary> = samples.iter().collect();
    // Stable sort keeps fetch order among equal dates
    sorted.sort_by(|a, b| match (&a.date, &b.date) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted.truncate(limit);
    sorted
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

pub fn category_breakdown(samples: &[MessageSummary]) -> Vec<CategoryCount> {
    let mut counts: HashMap<MailCategory, usize> = HashMap::new();
    for sample in samples {
        *counts.entry(sample.category).or_insert(0) += 1;
    }

    let mut breakdown: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category,
            count,
            percentage: percentage(count, samples.len()),
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    breakdown
}

pub fn sender_breakdown(samples: &[MessageSummary]) -> Vec<SenderCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sample in samples {
        *counts.entry(sample.from.as_deref().unwrap_or("Unknown")).or_insert(0) += 1;
    }

    let mut breakdown: Vec<SenderCount> = counts
        .into_iter()
        .map(|(sender, count)| SenderCount {
            sender: sender.to_string(),
            count,
            percentage: percentage(count, samples.len()),
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sender.cmp(&b.sender)));
    breakdown
}
