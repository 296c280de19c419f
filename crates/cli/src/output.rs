use crate::error::CliError;
use engine_runtime::execution::progress::RunProgress;
use model::execution::result::{JobResult, StepResult};

pub fn print_job(result: &JobResult, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("Run {} finished: {}", result.run_id, result.status);
    print_steps(&result.steps);
    Ok(())
}

pub fn print_progress(progress: &RunProgress, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(progress)?);
        return Ok(());
    }

    let status = progress
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "RUNNING or INTERRUPTED".to_string());
    println!("Run {} ({} attempt(s)): {}", progress.run_id, progress.attempts, status);
    println!("Chunks committed: {}", progress.chunks_committed);
    println!();

    println!("{:<12} {:<20} {:<9} {:>10}", "Step", "Cursor", "Finished", "Committed");
    println!("{}", "-".repeat(54));
    for cp in &progress.checkpoints {
        println!(
            "{:<12} {:<20} {:<9} {:>10}",
            cp.step,
            cp.cursor.to_string(),
            cp.finished,
            cp.items_committed
        );
    }

    if !progress.steps.is_empty() {
        println!();
        print_steps(&progress.steps);
    }
    Ok(())
}

fn print_steps(steps: &[StepResult]) {
    println!(
        "{:<12} {:>8} {:>9} {:>8} {:>8} {:>7}  {}",
        "Step", "Read", "Filtered", "Written", "Skipped", "Chunks", "Status"
    );
    println!("{}", "-".repeat(72));
    for s in steps {
        println!(
            "{:<12} {:>8} {:>9} {:>8} {:>8} {:>7}  {}",
            s.step,
            s.items_read,
            s.items_filtered,
            s.items_written,
            s.items_skipped,
            s.chunks_committed,
            s.status
        );
        if let Some(reason) = &s.failure {
            println!("{:<12} reason: {reason}", "");
        }
    }
}
