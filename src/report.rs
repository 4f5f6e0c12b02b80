use std::fmt::Write;

use crate::models::{ReconcileContext, FINAL_REVIEW_WEEK};
use crate::tracker::Scorecard;

const BAR_WIDTH: usize = 20;

/// Fixed-width text bar for a 0-100 score.
pub fn score_bar(score: u8) -> String {
    let filled = (usize::from(score.min(100)) * BAR_WIDTH + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn build_scorecard(card: &Scorecard) -> String {
    let assessment = &card.assessment;
    let mut output = String::new();

    let _ = writeln!(output, "# Practice Growth Scorecard");
    let _ = writeln!(
        output,
        "{} ({}, {})",
        assessment.participant_name, assessment.practice_name, assessment.email
    );
    let _ = writeln!(output);

    let current = card.current_score();
    let week_label = match card.latest() {
        Some(update) if update.is_final_review() => "Final review".to_string(),
        Some(update) => format!("Week {} of {}", update.week_number, FINAL_REVIEW_WEEK),
        None => "Baseline".to_string(),
    };

    let _ = writeln!(output, "## Overall Score");
    let _ = writeln!(output, "{week_label}");
    let _ = writeln!(output, "`{}` {current}/100", score_bar(current));
    let _ = writeln!(output, "- Baseline score: {}", assessment.baseline_score);
    if card.latest().is_some() {
        let _ = writeln!(output, "- Change since baseline: {:+}", card.score_change());
    }
    if !assessment.success_definition.trim().is_empty() {
        let _ = writeln!(
            output,
            "- Success looks like: {}",
            assessment.success_definition.trim()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## KPI Progress ({})",
        match card.context {
            ReconcileContext::Immediate => "since baseline",
            ReconcileContext::Lookup => "week over week",
        }
    );

    if card.progress.is_empty() {
        let _ = writeln!(output, "No KPIs selected.");
    } else {
        let _ = writeln!(output, "| KPI | Before | After | Change |");
        let _ = writeln!(output, "| --- | --- | --- | --- |");
        for record in card.progress.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} {:+}% |",
                record.label,
                display_value(&record.before_value),
                display_value(&record.after_value),
                record.trend.arrow(),
                record.percentage_change
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Scores");
    if card.history.is_empty() {
        let _ = writeln!(output, "No weekly updates submitted yet.");
    } else {
        for update in card.history.iter() {
            let _ = writeln!(
                output,
                "- Week {}: {} (confidence {}/5)",
                update.week_number, update.current_score, update.sales_confidence_after
            );
        }
    }

    write_list(&mut output, "Improvements", &card.improvements);
    write_list(&mut output, "Achievements", &card.achievements);

    if let Some(notes) = card
        .latest()
        .map(|u| u.notes.trim())
        .filter(|n| !n.is_empty())
    {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Latest Notes");
        let _ = writeln!(output, "{notes}");
    }

    output
}

fn write_list(output: &mut String, heading: &str, items: &[String]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");
    if items.is_empty() {
        let _ = writeln!(output, "None reported yet.");
    } else {
        for item in items {
            let _ = writeln!(output, "- {item}");
        }
    }
}

fn display_value(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "n/a"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{AssessmentSnapshot, FinancialKpi, KpiEntry, KpiKey, ProgressUpdate};

    fn snapshot() -> AssessmentSnapshot {
        AssessmentSnapshot {
            id: Uuid::new_v4(),
            participant_name: "Sam Ortiz".to_string(),
            practice_name: "Luxe Skin".to_string(),
            email: "sam@luxe.example".to_string(),
            sales_confidence: 3,
            selected_kpis: vec![KpiEntry::new(
                KpiKey::Financial(FinancialKpi::RebookingRate),
                "40%",
                "60%",
            )],
            selected_non_financial_kpis: Vec::new(),
            revenue_forecast_confidence: None,
            job_descriptions_clarity: None,
            success_definition: "Half of patients rebook at checkout".to_string(),
            baseline_score: 52,
            created_at: Utc::now(),
        }
    }

    fn update(assessment: &AssessmentSnapshot, week_number: i32, rebook: &str) -> ProgressUpdate {
        ProgressUpdate {
            id: Uuid::new_v4(),
            assessment_id: assessment.id,
            week_number,
            sales_confidence_after: 4,
            kpi_updates: vec![KpiEntry::new(
                KpiKey::Financial(FinancialKpi::RebookingRate),
                rebook,
                "60%",
            )],
            non_financial_kpi_updates: Vec::new(),
            revenue_forecast_confidence: None,
            job_descriptions_clarity: None,
            new_improvements: vec!["Checkout rebooking script".to_string()],
            new_achievements: Vec::new(),
            notes: "Front desk owns rebooking now.".to_string(),
            current_score: 61,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bar_scales_with_score() {
        assert_eq!(score_bar(0), "░".repeat(20));
        assert_eq!(score_bar(100), "█".repeat(20));
        assert_eq!(score_bar(50).chars().filter(|c| *c == '█').count(), 10);
    }

    #[test]
    fn baseline_only_card() {
        let card = Scorecard::build(snapshot(), Vec::new(), ReconcileContext::Lookup);
        let report = build_scorecard(&card);

        assert!(report.contains("Sam Ortiz (Luxe Skin, sam@luxe.example)"));
        assert!(report.contains("Baseline\n"));
        assert!(report.contains("52/100"));
        assert!(report.contains("No weekly updates submitted yet."));
        assert!(!report.contains("Change since baseline"));
        assert!(report.contains("| Rebooking rate | 40% | 40% | ■ +0% |"));
    }

    #[test]
    fn card_after_a_submission() {
        let assessment = snapshot();
        let history = vec![update(&assessment, 1, "50%")];
        let card = Scorecard::build(assessment, history, ReconcileContext::Immediate);
        let report = build_scorecard(&card);

        assert!(report.contains("Week 1 of 7"));
        assert!(report.contains("- Change since baseline: +9"));
        assert!(report.contains("## KPI Progress (since baseline)"));
        assert!(report.contains("| Rebooking rate | 40% | 50% | ▲ +25% |"));
        assert!(report.contains("- Checkout rebooking script"));
        assert!(report.contains("## Latest Notes\nFront desk owns rebooking now."));
    }

    #[test]
    fn history_is_read_in_week_order() {
        let assessment = snapshot();
        let mut second = update(&assessment, 2, "55%");
        second.current_score = 70;
        second.notes = "Rebooking at 55%.".to_string();
        let first = update(&assessment, 1, "50%");
        let card = Scorecard::build(assessment, vec![second, first], ReconcileContext::Lookup);

        assert_eq!(card.latest().map(|u| u.week_number), Some(2));
        assert_eq!(card.current_score(), 70);
        assert_eq!(card.progress[0].before_value, "50%");
        assert_eq!(card.progress[0].after_value, "55%");

        let report = build_scorecard(&card);
        assert!(report.contains("Week 2 of 7"));
        assert!(report.contains("- Week 1: 61 (confidence 4/5)\n- Week 2: 70"));
        assert!(report.contains("## Latest Notes\nRebooking at 55%."));
    }

    #[test]
    fn final_week_is_labelled() {
        let assessment = snapshot();
        let history = vec![update(&assessment, FINAL_REVIEW_WEEK, "55%")];
        let card = Scorecard::build(assessment, history, ReconcileContext::Lookup);
        assert!(build_scorecard(&card).contains("Final review"));
    }
}
