use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use crate::simulation::BatchResult;

#[allow(clippy::cast_precision_loss)]
fn pass_rate(results: &[BatchResult]) -> f64 {
    let passed = results.iter().filter(|r| r.passed).count();
    (passed as f64 / results.len().max(1) as f64) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[BatchResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Dungeon Simulation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=============================".cyan())?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "Total batches: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (total - passed).to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", pass_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {}, level {}, {:?})",
            status,
            result.dungeon_id.bold(),
            result.seed,
            result.character_level,
            result.policy
        )?;
        writeln!(
            out,
            "   Runs: {} | clear rate {:.1}%",
            result.runs.len(),
            result.clear_rate * 100.0
        )?;
        writeln!(
            out,
            "   Average gold: {:.1} | average exp: {:.1} | level-ups: {}",
            result.average_gold, result.average_exp, result.level_ups
        )?;
        writeln!(
            out,
            "   Distinct runs: {} | time {:?}",
            result.distinct_fingerprints, result.duration
        )?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    if let (Some(richest), Some(hardest)) = (
        results
            .iter()
            .max_by(|a, b| a.average_gold.total_cmp(&b.average_gold)),
        results
            .iter()
            .min_by(|a, b| a.clear_rate.total_cmp(&b.clear_rate)),
    ) {
        writeln!(out, "{}", "💰 Economy Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "==================".yellow())?;
        writeln!(
            out,
            "Richest: {} ({:.1} gold per run)",
            richest.dungeon_id.green(),
            richest.average_gold
        )?;
        writeln!(
            out,
            "Hardest: {} ({:.1}% cleared)",
            hardest.dungeon_id.yellow(),
            hardest.clear_rate * 100.0
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[BatchResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[BatchResult]) -> Result<()> {
    writeln!(out, "# Dungeon Simulation Results\n")?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total batches**: {total}")?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {}", total - passed)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", pass_rate(results))?;

    writeln!(out, "## Batches\n")?;
    writeln!(
        out,
        "| Dungeon | Seed | Level | Runs | Clear rate | Avg gold | Avg exp | Level-ups |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|---|")?;
    for result in results {
        writeln!(
            out,
            "| {} | {} | {} | {} | {:.1}% | {:.1} | {:.1} | {} |",
            result.dungeon_id,
            result.seed,
            result.character_level,
            result.runs.len(),
            result.clear_rate * 100.0,
            result.average_gold,
            result.average_exp,
            result.level_ups
        )?;
    }

    let failing: Vec<_> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failing {
            writeln!(out, "### ❌ {} (seed {})\n", result.dungeon_id, result.seed)?;
            for failure in &result.failures {
                writeln!(out, "- {failure}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}
