use crate::output::print_json;
use chrono::NaiveDate;
use pma_core::impact::{apply_impact, parse_impact, Baseline};
use std::path::Path;

pub fn run(
    root: &Path,
    impact: &str,
    budget: Option<i64>,
    end_date: Option<NaiveDate>,
    json: bool,
) -> anyhow::Result<()> {
    let baseline = match (budget, end_date) {
        (Some(budget), Some(end_date)) => Baseline { end_date, budget },
        _ => {
            let project = super::load_project(root)?;
            let base = project.baseline();
            Baseline {
                end_date: end_date.unwrap_or(base.end_date),
                budget: budget.unwrap_or(base.budget),
            }
        }
    };
    let parsed = parse_impact(impact);
    if parsed.days == 0 && parsed.cost == 0 {
        tracing::warn!(input = %impact, "impact string has no day or cost component");
    }
    let projected = apply_impact(baseline, parsed)?;

    if json {
        print_json(&serde_json::json!({
            "impact": parsed,
            "baseline": baseline,
            "projected": projected,
        }))?;
    } else {
        println!("Impact:   {parsed}");
        println!("End date: {} -> {}", baseline.end_date, projected.end_date);
        println!("Budget:   {} -> {}", baseline.budget, projected.budget);
    }
    Ok(())
}
