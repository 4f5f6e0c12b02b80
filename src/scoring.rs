use std::collections::HashSet;

use crate::category::{ordinal_average, ForecastConfidence, JobClarity};
use crate::models::{pair_entries, KpiEntry};
use crate::normalize::normalize_positive;

pub const CONFIDENCE_WEIGHT: f64 = 0.4;
pub const KPI_WEIGHT: f64 = 0.4;
pub const ORDINAL_WEIGHT: f64 = 0.2;

/// Points per step of sales-confidence change since the baseline.
pub const CONFIDENCE_DELTA_POINTS: f64 = 5.0;
pub const IMPROVEMENT_POINTS: f64 = 2.0;
pub const ACHIEVEMENT_POINTS: f64 = 3.0;
/// Ceiling on what free-text improvements and achievements can add together.
pub const NARRATIVE_BONUS_CAP: f64 = 15.0;

/// Everything the comprehensive score looks at for one check-in.
#[derive(Debug, Clone, Copy)]
pub struct ComprehensiveInput<'a> {
    pub confidence_before: i32,
    pub confidence_after: i32,
    pub baseline_financial: &'a [KpiEntry],
    pub current_financial: &'a [KpiEntry],
    pub baseline_non_financial: &'a [KpiEntry],
    pub current_non_financial: &'a [KpiEntry],
    pub revenue_forecast_confidence: Option<ForecastConfidence>,
    pub job_descriptions_clarity: Option<JobClarity>,
    pub cumulative_improvements: &'a [String],
    pub cumulative_achievements: &'a [String],
}

/// Initial composite score from a single assessment with no history.
pub fn score_baseline(
    confidence: i32,
    financial: &[KpiEntry],
    non_financial: &[KpiEntry],
    revenue_forecast_confidence: Option<ForecastConfidence>,
    job_descriptions_clarity: Option<JobClarity>,
) -> u8 {
    let readiness = mean(
        financial
            .iter()
            .chain(non_financial.iter())
            .filter_map(readiness_ratio),
    );

    let raw = composite(
        confidence_subscore(confidence),
        readiness,
        ordinal_average(revenue_forecast_confidence, job_descriptions_clarity),
    );
    to_score(raw)
}

/// Updated composite score for a check-in measured against its baseline.
pub fn score_comprehensive(input: &ComprehensiveInput<'_>) -> u8 {
    let ratios = pair_entries(input.baseline_financial, input.current_financial)
        .into_iter()
        .chain(pair_entries(
            input.baseline_non_financial,
            input.current_non_financial,
        ))
        .filter_map(|(baseline, current)| match current {
            Some(current) => progress_ratio(baseline, current),
            None => readiness_ratio(baseline),
        });

    let base = composite(
        confidence_subscore(input.confidence_after),
        mean(ratios),
        ordinal_average(
            input.revenue_forecast_confidence,
            input.job_descriptions_clarity,
        ),
    );

    let confidence_delta = f64::from(
        input.confidence_after.clamp(1, 5) - input.confidence_before.clamp(1, 5),
    ) * CONFIDENCE_DELTA_POINTS;

    let narrative = narrative_bonus(
        input.cumulative_improvements,
        input.cumulative_achievements,
    );

    to_score(base + confidence_delta + narrative)
}

/// Maps a 1-5 rating onto 20..=100. Out-of-range ratings are clamped first.
pub fn confidence_subscore(confidence: i32) -> f64 {
    let level = f64::from(confidence.clamp(1, 5));
    20.0 + (level - 1.0) * 20.0
}

/// `current / goal`, capped at full credit. `None` when either side has no data.
pub fn readiness_ratio(entry: &KpiEntry) -> Option<f64> {
    let current = normalize_positive(&entry.current_value)?;
    let goal = normalize_positive(&entry.goal_value)?;
    Some((current / goal).clamp(0.0, 1.0))
}

/// Readiness after a check-in.
///
/// The baseline's readiness is kept as a floor and the share of the remaining
/// gap closed since then, `(current - baseline) / (goal - baseline)` clamped to
/// [0, 1], is added on top of it. A KPI with no usable baseline value falls
/// back to plain readiness.
pub fn progress_ratio(baseline: &KpiEntry, current: &KpiEntry) -> Option<f64> {
    let now = normalize_positive(&current.current_value)?;
    let goal = normalize_positive(&current.goal_value)
        .or_else(|| normalize_positive(&baseline.goal_value))?;

    let Some(start) = normalize_positive(&baseline.current_value) else {
        return Some((now / goal).clamp(0.0, 1.0));
    };

    let start_readiness = (start / goal).clamp(0.0, 1.0);
    let gap = goal - start;
    let closed = if gap <= 0.0 {
        1.0
    } else {
        ((now - start) / gap).clamp(0.0, 1.0)
    };

    Some(start_readiness + closed * (1.0 - start_readiness))
}

/// Bonus for distinct non-empty improvements and achievements, capped.
pub fn narrative_bonus(improvements: &[String], achievements: &[String]) -> f64 {
    let bonus = distinct_count(improvements) as f64 * IMPROVEMENT_POINTS
        + distinct_count(achievements) as f64 * ACHIEVEMENT_POINTS;
    bonus.min(NARRATIVE_BONUS_CAP)
}

fn distinct_count(items: &[String]) -> usize {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Weighted sum of the three components on a 0-100 scale. When there is no
/// KPI data the remaining weights are rescaled to sum to one.
fn composite(confidence: f64, readiness: Option<f64>, ordinal: f64) -> f64 {
    match readiness {
        Some(ratio) => {
            confidence * CONFIDENCE_WEIGHT + ratio * 100.0 * KPI_WEIGHT + ordinal * ORDINAL_WEIGHT
        }
        None => {
            (confidence * CONFIDENCE_WEIGHT + ordinal * ORDINAL_WEIGHT)
                / (CONFIDENCE_WEIGHT + ORDINAL_WEIGHT)
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| {
        (sum + value, count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn to_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinancialKpi, KpiKey, NonFinancialKpi};

    fn revenue(current: &str, goal: &str) -> KpiEntry {
        KpiEntry::new(KpiKey::Financial(FinancialKpi::MonthlyRevenue), current, goal)
    }

    fn satisfaction(current: &str, goal: &str) -> KpiEntry {
        KpiEntry::new(
            KpiKey::NonFinancial(NonFinancialKpi::PatientSatisfaction),
            current,
            goal,
        )
    }

    fn no_op_input<'a>(
        confidence: i32,
        financial: &'a [KpiEntry],
        non_financial: &'a [KpiEntry],
        forecast: Option<ForecastConfidence>,
        clarity: Option<JobClarity>,
    ) -> ComprehensiveInput<'a> {
        ComprehensiveInput {
            confidence_before: confidence,
            confidence_after: confidence,
            baseline_financial: financial,
            current_financial: financial,
            baseline_non_financial: non_financial,
            current_non_financial: non_financial,
            revenue_forecast_confidence: forecast,
            job_descriptions_clarity: clarity,
            cumulative_improvements: &[],
            cumulative_achievements: &[],
        }
    }

    #[test]
    fn baseline_is_bounded_and_monotonic_in_confidence() {
        let mut previous = 0;
        for confidence in 1..=5 {
            let score = score_baseline(confidence, &[], &[], None, None);
            assert!(score <= 100);
            assert!(score >= previous, "confidence {confidence} scored {score}");
            previous = score;
        }
    }

    #[test]
    fn reference_assessment_scores_deterministically() {
        let kpis = vec![revenue("100", "200")];
        let first = score_baseline(
            2,
            &kpis,
            &[],
            Some(ForecastConfidence::Uncertain),
            Some(JobClarity::Partially),
        );
        for _ in 0..10 {
            let again = score_baseline(
                2,
                &kpis,
                &[],
                Some(ForecastConfidence::Uncertain),
                Some(JobClarity::Partially),
            );
            assert_eq!(first, again);
        }
        // 0.4 * 40 + 0.4 * 50 + 0.2 * 50
        assert_eq!(first, 46);
    }

    #[test]
    fn missing_kpis_are_renormalized_not_zeroed() {
        let score = score_baseline(
            5,
            &[],
            &[],
            Some(ForecastConfidence::VeryConfident),
            Some(JobClarity::VeryClear),
        );
        assert_eq!(score, 100);

        // 0.4 * 40 + 0.2 * 50 over 0.6
        let score = score_baseline(2, &[], &[], None, None);
        assert_eq!(score, 43);
    }

    #[test]
    fn malformed_kpis_are_excluded_from_readiness() {
        let clean = score_baseline(3, &[revenue("50", "100")], &[], None, None);
        let noisy = score_baseline(
            3,
            &[revenue("50", "100"), revenue("abc", "100"), revenue("", "")],
            &[satisfaction("$-", "90%"), satisfaction("0", "10")],
            None,
            None,
        );
        assert_eq!(clean, noisy);

        let only_garbage = score_baseline(3, &[revenue("abc", "$-")], &[], None, None);
        assert_eq!(only_garbage, score_baseline(3, &[], &[], None, None));
    }

    #[test]
    fn exceeding_the_goal_is_full_credit_only() {
        let met = score_baseline(3, &[revenue("200", "200")], &[], None, None);
        let beyond = score_baseline(3, &[revenue("$5,000", "200")], &[], None, None);
        assert_eq!(met, beyond);
    }

    #[test]
    fn readiness_averages_financial_and_non_financial() {
        let entries = vec![revenue("50", "100"), satisfaction("9", "10")];
        let ratio = mean(entries.iter().filter_map(readiness_ratio)).unwrap();
        assert!((ratio - 0.7).abs() < 1e-9);
    }

    #[test]
    fn progress_ratio_closes_the_gap_from_baseline() {
        let start = revenue("100", "200");
        assert_eq!(progress_ratio(&start, &revenue("100", "200")), Some(0.5));
        assert_eq!(progress_ratio(&start, &revenue("150", "200")), Some(0.75));
        assert_eq!(progress_ratio(&start, &revenue("250", "200")), Some(1.0));
        // falling back below the baseline keeps the baseline floor
        assert_eq!(progress_ratio(&start, &revenue("80", "200")), Some(0.5));
        assert_eq!(progress_ratio(&revenue("", "200"), &revenue("50", "200")), Some(0.25));
        assert_eq!(progress_ratio(&start, &revenue("n/a", "200")), None);
        // goal carried from the baseline when the update omits it
        assert_eq!(progress_ratio(&start, &revenue("150", "")), Some(0.75));
    }

    #[test]
    fn no_op_update_never_scores_below_baseline() {
        let financial = vec![revenue("100", "200"), revenue("300", "250")];
        let non_financial = vec![satisfaction("7", "10"), satisfaction("", "")];
        for confidence in 1..=5 {
            for forecast in [None, Some(ForecastConfidence::Concerned)] {
                let baseline = score_baseline(
                    confidence,
                    &financial,
                    &non_financial,
                    forecast,
                    Some(JobClarity::Unclear),
                );
                let updated = score_comprehensive(&no_op_input(
                    confidence,
                    &financial,
                    &non_financial,
                    forecast,
                    Some(JobClarity::Unclear),
                ));
                assert!(updated >= baseline, "{updated} < {baseline}");
                assert!(updated <= 100);
            }
        }
    }

    #[test]
    fn confidence_delta_moves_the_score_both_ways() {
        let kpis = vec![revenue("100", "200")];
        let mut input = no_op_input(3, &kpis, &[], None, None);
        let steady = score_comprehensive(&input);

        input.confidence_after = 4;
        let up = score_comprehensive(&input);
        assert!(up > steady);

        input.confidence_after = 1;
        let down = score_comprehensive(&input);
        assert!(down < steady);
    }

    #[test]
    fn score_stays_within_bounds_at_the_extremes() {
        let kpis = vec![revenue("1000", "100")];
        let wins: Vec<String> = (0..50).map(|i| format!("win {i}")).collect();
        let mut input = no_op_input(
            5,
            &kpis,
            &[],
            Some(ForecastConfidence::VeryConfident),
            Some(JobClarity::VeryClear),
        );
        input.confidence_before = 1;
        input.cumulative_achievements = &wins;
        input.cumulative_improvements = &wins;
        assert_eq!(score_comprehensive(&input), 100);

        let mut input = no_op_input(
            1,
            &[],
            &[],
            Some(ForecastConfidence::VeryConcerned),
            Some(JobClarity::NonExistent),
        );
        input.confidence_before = 5;
        assert_eq!(score_comprehensive(&input), 0);
    }

    #[test]
    fn narrative_bonus_counts_distinct_entries_and_is_capped() {
        let improvements = vec!["Scripted consults".to_string(), "Scripted consults".to_string()];
        let achievements = vec!["First $10k week".to_string(), "  ".to_string()];
        assert_eq!(narrative_bonus(&improvements, &achievements), 5.0);

        let many: Vec<String> = (0..40).map(|i| format!("item {i}")).collect();
        assert_eq!(narrative_bonus(&many, &many), NARRATIVE_BONUS_CAP);
    }

    #[test]
    fn narrative_alone_cannot_reach_full_marks() {
        let many: Vec<String> = (0..40).map(|i| format!("item {i}")).collect();
        let mut input = no_op_input(1, &[], &[], None, None);
        input.cumulative_improvements = &many;
        input.cumulative_achievements = &many;
        assert!(score_comprehensive(&input) < 100);
    }
}
