use std::collections::HashSet;

use crate::models::{
    pair_entries, AssessmentSnapshot, KpiEntry, KpiProgress, ProgressUpdate, ReconcileContext,
    Trend,
};
use crate::normalize::{normalize, normalize_positive};

/// Derives per-KPI before/after records from a baseline and its weekly history.
///
/// `history` may be in any order; it is read chronologically by week number,
/// then by `updated_at`. Nothing in it is modified. Every KPI in the baseline
/// gets exactly one record, in baseline order.
pub fn reconcile_progress(
    baseline: &AssessmentSnapshot,
    history: &[ProgressUpdate],
    context: ReconcileContext,
) -> Vec<KpiProgress> {
    let ordered = chronological(history);
    let (latest, earlier) = match ordered.split_last() {
        Some((latest, rest)) => (Some(*latest), rest),
        None => (None, &[][..]),
    };
    let earlier = match context {
        ReconcileContext::Immediate => &[][..],
        ReconcileContext::Lookup => earlier,
    };

    let mut records = compare(
        &baseline.selected_kpis,
        earlier.iter().map(|u| u.kpi_updates.as_slice()),
        latest.map(|u| u.kpi_updates.as_slice()),
    );
    records.extend(compare(
        &baseline.selected_non_financial_kpis,
        earlier.iter().map(|u| u.non_financial_kpi_updates.as_slice()),
        latest.map(|u| u.non_financial_kpi_updates.as_slice()),
    ));
    records
}

/// All improvements reported so far, oldest first, without repeats.
pub fn cumulative_improvements(history: &[ProgressUpdate]) -> Vec<String> {
    let ordered = chronological(history);
    dedup_stable(ordered.iter().flat_map(|u| u.new_improvements.iter()))
}

/// All achievements reported so far, oldest first, without repeats.
pub fn cumulative_achievements(history: &[ProgressUpdate]) -> Vec<String> {
    let ordered = chronological(history);
    dedup_stable(ordered.iter().flat_map(|u| u.new_achievements.iter()))
}

/// Keeps the first occurrence of each entry and drops blank ones.
pub fn dedup_stable<'a>(items: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_string()))
        .map(str::to_string)
        .collect()
}

/// Percentage change from `before` to `after`, rounded half up
/// (`-2.5` becomes `-2`, `2.5` becomes `3`).
///
/// Zero when `before` has no usable value, so a zero baseline never produces
/// an infinite or NaN change.
pub fn percentage_change(before: &str, after: &str) -> i64 {
    let (Some(before), Some(after)) = (normalize_positive(before), normalize(after)) else {
        return 0;
    };
    let change = ((after - before) / before) * 100.0;
    if change.is_finite() {
        (change + 0.5).floor() as i64
    } else {
        0
    }
}

pub fn trend_for(change: i64) -> Trend {
    match change {
        c if c > 0 => Trend::Up,
        c if c < 0 => Trend::Down,
        _ => Trend::Stable,
    }
}

fn chronological(history: &[ProgressUpdate]) -> Vec<&ProgressUpdate> {
    let mut ordered: Vec<&ProgressUpdate> = history.iter().collect();
    ordered.sort_by(|a, b| {
        a.week_number
            .cmp(&b.week_number)
            .then(a.updated_at.cmp(&b.updated_at))
    });
    ordered
}

/// `earlier` holds the KPI lists of the check-ins before the latest, oldest
/// first. Each KPI's `before` is its value in the most recent of those that
/// reported it, or the baseline value when none did.
fn compare<'a>(
    baseline: &'a [KpiEntry],
    earlier: impl Iterator<Item = &'a [KpiEntry]>,
    latest: Option<&'a [KpiEntry]>,
) -> Vec<KpiProgress> {
    let earlier: Vec<Vec<Option<&KpiEntry>>> = earlier
        .map(|updates| {
            pair_entries(baseline, updates)
                .into_iter()
                .map(|(_, matched)| matched)
                .collect()
        })
        .collect();

    pair_entries(baseline, latest.unwrap_or(&[]))
        .into_iter()
        .enumerate()
        .map(|(index, (entry, current))| {
            let before_value = earlier
                .iter()
                .rev()
                .find_map(|week| week[index])
                .unwrap_or(entry)
                .current_value
                .clone();
            let after_value = current
                .map(|update| update.current_value.clone())
                .unwrap_or_else(|| before_value.clone());
            let percentage_change = percentage_change(&before_value, &after_value);

            KpiProgress {
                kpi_key: entry.kpi_key,
                label: entry.display_label().to_string(),
                before_value,
                after_value,
                percentage_change,
                trend: trend_for(percentage_change),
                is_positive: percentage_change > 0,
            }
        })
        .collect()
}
