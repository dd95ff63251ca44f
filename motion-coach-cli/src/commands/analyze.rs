use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use motion_coach::models::{AnthropometricModel, IssueSeverity, SessionStatistics};
use motion_coach::{AnalysisEngine, AnalysisResult, ConfigUpdate};

use crate::config::Config;
use crate::recording::read_recording;

#[derive(Args)]
pub struct AnalyzeCommand {
    /// JSON-lines recording, one frame per line
    recording: PathBuf,

    /// Print one JSON object per frame and a final summary object
    #[arg(long)]
    json: bool,

    /// Only print the session summary
    #[arg(long)]
    summary_only: bool,

    /// Athlete height in metres (overrides the config file)
    #[arg(long)]
    height: Option<f64>,

    /// Athlete mass in kilograms (overrides the config file)
    #[arg(long)]
    mass: Option<f64>,

    /// Disable keypoint smoothing
    #[arg(long)]
    no_filter: bool,
}

impl AnalyzeCommand {
    pub fn execute(self, config: &Config) -> Result<()> {
        let frames = read_recording(&self.recording)?;

        let body = AnthropometricModel::new(
            self.height.unwrap_or(config.body.height_m),
            self.mass.unwrap_or(config.body.mass_kg),
        )
        .context("Invalid body parameters")?;
        let mut engine = AnalysisEngine::with_body(config.engine.clone(), body).context("Invalid [engine] section")?;
        if self.no_filter {
            engine.update_config(&ConfigUpdate {
                enable_filtering: Some(false),
                ..Default::default()
            })?;
        }

        // Progress only when nothing else is printed per frame
        let progress = if self.summary_only && !self.json {
            progress_bar(frames.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        for frame in &frames {
            let result = engine.process_frame(
                &frame.keypoints,
                frame.timestamp_ms,
                frame.delta_time.unwrap_or(0.0),
            );
            progress.inc(1);

            if self.summary_only {
                continue;
            }
            if self.json {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                println!("{}", format_result(&result));
            }
        }
        progress.finish_and_clear();

        let stats = engine.statistics();
        if self.json {
            println!("{}", serde_json::json!({ "summary": stats }));
        } else {
            print_summary(&stats);
        }

        Ok(())
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} frames") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// One line per frame: time, exercise, confidence, reps and score
pub fn format_result(result: &AnalysisResult) -> String {
    let exercise = format!("{:<12}", result.exercise_type.name());
    let exercise = if result.is_idle() {
        exercise.dimmed()
    } else {
        exercise.bold().green()
    };

    let mut line = format!(
        "{:>9.0} ms  {}  conf {:.2}",
        result.timestamp_ms, exercise, result.confidence
    );
    if let Some(reps) = result.rep_count {
        line.push_str(&format!("  reps {}", reps.to_string().cyan()));
    }
    if let Some(phase) = result.phase {
        line.push_str(&format!("  {:?}", phase).to_lowercase());
    }
    if let Some(score) = result.overall_score {
        line.push_str(&format!("  score {:.0}", score));
    }
    if let Some(error) = &result.error {
        line.push_str(&format!("  {}", error.red()));
    }
    for issue in &result.issues {
        let label = match issue.severity {
            IssueSeverity::Critical => issue.issue_type.red(),
            IssueSeverity::Warning => issue.issue_type.yellow(),
            IssueSeverity::Minor => issue.issue_type.normal(),
        };
        line.push_str(&format!("  [{}]", label));
    }
    line
}

fn print_summary(stats: &SessionStatistics) {
    println!();
    println!("{}", "Session Summary".bold().green());
    println!("────────────────────────────────");
    println!("  Frames processed: {}", stats.frames_processed.to_string().cyan());
    println!("  Active frames:    {}", stats.active_frames.to_string().cyan());
    println!("  Current exercise: {}", stats.current_exercise);

    if let Some(confidence) = stats.average_confidence {
        println!("  Avg confidence:   {:.2}", confidence);
    }
    if let Some(score) = stats.average_score {
        println!("  Avg score:        {:.1}", score);
    }

    if !stats.exercise_frames.is_empty() {
        println!();
        println!("{}", "Exercises".bold());
        for (exercise, frames) in &stats.exercise_frames {
            let reps = stats.reps.get(exercise).copied().unwrap_or(0);
            println!("  {:<12} {:>5} frames  {:>3} reps", exercise.name(), frames, reps);
        }
    }

    println!();
    println!("{}", "Energy".bold());
    println!("  Mechanical work:  {:.1} J", stats.energy.mechanical_work_j);
    println!("  Calories:         {:.2} kcal", stats.energy.calories_kcal);
    if stats.power.samples > 0 {
        println!(
            "  Power:            mean {:.1} W, peak {:.1} W",
            stats.power.mean, stats.power.peak
        );
    }
}
