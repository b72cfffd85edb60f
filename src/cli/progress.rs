use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub fn create_progress_bar(multi: &MultiProgress, message: &'static str) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
    )?);

    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}
