use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar over the indices of a run, hidden in quiet mode
pub fn index_progress(total: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.yellow/red}] Indices: {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message("Waiting for first index...");
    pb
}

/// Spinner message while an index moves through the pipeline
pub fn stage_message(index: &str, stage: &str) -> String {
    format!("{} ({})", index, stage)
}
