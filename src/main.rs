use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

mod analytics;
mod error;
mod filter;
mod logging;
mod models;
mod report;
mod source;

use analytics::ScoreDivisor;
use error::AnalyticsError;
use filter::FilterCriteria;
use models::StudentRecord;
use report::GradeOptions;
use source::RandomStudents;

#[derive(Parser)]
#[command(name = "scholarsense")]
#[command(about = "Student performance reports from imported or synthetic records", long_about = None)]
struct Cli {
    /// Import students from a CSV file instead of generating them
    #[arg(long, global = true, env = "SCHOLARSENSE_CSV")]
    csv: Option<PathBuf>,
    /// Number of synthetic students when no CSV is given
    #[arg(long, global = true, default_value_t = 20)]
    students: usize,
    /// Seed for the random generator, for reproducible runs
    #[arg(long, global = true, env = "SCHOLARSENSE_SEED")]
    seed: Option<u64>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,
    #[arg(long, global = true, env = "SCHOLARSENSE_LOG", default_value = "warn")]
    log_level: String,
    #[command(flatten)]
    filters: FilterArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long, global = true)]
    min_age: Option<u32>,
    #[arg(long, global = true)]
    max_age: Option<u32>,
    #[arg(long, global = true)]
    min_grade: Option<u32>,
    #[arg(long, global = true)]
    max_grade: Option<u32>,
    /// Exact school name, or "All"
    #[arg(long, global = true)]
    school: Option<String>,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            min_age: self.min_age,
            max_age: self.max_age,
            min_grade: self.min_grade,
            max_grade: self.max_grade,
            school: self.school.clone(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one student's details and subject radar
    Profile {
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
    /// Average, minimum and maximum score per subject
    Subjects {
        /// Include score distributions
        #[arg(long)]
        details: bool,
    },
    /// Group students by the pathways they qualify for
    Pathways {
        /// List each qualifying student's required-subject scores
        #[arg(long)]
        details: bool,
    },
    /// Compare overall performance across grades
    Grades {
        #[arg(long)]
        details: bool,
        #[arg(long)]
        at_risk: bool,
        #[arg(long)]
        excelling: bool,
        #[arg(long, value_enum, default_value_t)]
        divisor: ScoreDivisor,
    },
    /// Placeholder performance prediction
    Predict,
    /// Write every report into one file
    Report {
        /// Output file; defaults to report.md, or report.json with --format json
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        divisor: ScoreDivisor,
    },
    /// Write synthetic students to a CSV file
    Generate {
        #[arg(long, default_value = "students.csv")]
        out: PathBuf,
    },
    /// List the schools available for filtering
    Schools,
}

struct RunContext<'a> {
    format: OutputFormat,
    criteria: &'a FilterCriteria,
    generated_on: NaiveDate,
    students: usize,
}

impl RunContext<'_> {
    fn render<T: Serialize>(
        &self,
        report_name: &str,
        data: impl FnOnce() -> anyhow::Result<Option<T>>,
        markdown: impl FnOnce(&mut String),
    ) -> anyhow::Result<String> {
        match self.format {
            OutputFormat::Markdown => {
                let mut output = String::new();
                markdown(&mut output);
                Ok(output)
            }
            OutputFormat::Json => Ok(report::to_json(
                report_name,
                self.criteria,
                self.generated_on,
                self.students,
                data()?,
            )?),
        }
    }
}

/// Turns an empty-aggregate failure into "no data"; anything else is fatal.
fn non_empty<T>(result: Result<T, AnalyticsError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AnalyticsError::EmptyAggregate(what)) => {
            info!("no data for {what}");
            Ok(None)
        }
        Err(other) => Err(other.into()),
    }
}

fn default_report_path(format: OutputFormat) -> PathBuf {
    match format {
        OutputFormat::Markdown => PathBuf::from("report.md"),
        OutputFormat::Json => PathBuf::from("report.json"),
    }
}

fn load_students(
    csv: Option<&Path>,
    count: usize,
    rng: &mut StdRng,
) -> anyhow::Result<Vec<StudentRecord>> {
    match csv {
        Some(path) => {
            let outcome = source::load_csv(path)
                .with_context(|| format!("failed to import students from {}", path.display()))?;
            for rejected in outcome.rejected.iter() {
                warn!(line = rejected.line, "skipped row in {}: {}", path.display(), rejected.error);
            }
            Ok(outcome.records)
        }
        None => {
            anyhow::ensure!(count > 0, "--students must be at least 1");
            Ok(source::synthesize(&mut RandomStudents::new(rng), count))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(&cli.log_level)?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if let Commands::Generate { out } = &cli.command {
        anyhow::ensure!(cli.students > 0, "--students must be at least 1");
        let students = source::synthesize(&mut RandomStudents::new(&mut rng), cli.students);
        source::save_csv(out, &students)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Wrote {} students to {}.", students.len(), out.display());
        return Ok(());
    }

    let all_students = load_students(cli.csv.as_deref(), cli.students, &mut rng)?;
    let criteria = cli.filters.criteria();
    let students = filter::filter_students(&all_students, &criteria);
    info!(
        loaded = all_students.len(),
        matched = students.len(),
        "applied filters: {}",
        report::describe_filters(&criteria)
    );

    let context = RunContext {
        format: cli.format,
        criteria: &criteria,
        generated_on: Utc::now().date_naive(),
        students: students.len(),
    };

    let output = match cli.command {
        Commands::Profile { index } => {
            if students.is_empty() {
                context.render::<()>("profile", || Ok(None), |out| {
                    out.push_str(report::NO_MATCHES);
                    out.push('\n');
                })?
            } else {
                let student = students.get(index).with_context(|| {
                    format!(
                        "student index {index} is out of range (0..{})",
                        students.len()
                    )
                })?;
                context.render(
                    "profile",
                    || {
                        Ok(Some(json!({
                            "student": student,
                            "radar": analytics::radar_profile(student),
                        })))
                    },
                    |out| report::write_profile(out, student),
                )?
            }
        }
        Commands::Subjects { details } => context.render(
            "subjects",
            || non_empty(analytics::subject_analysis(&students)),
            |out| report::write_subjects(out, &students, details),
        )?,
        Commands::Pathways { details } => context.render(
            "pathways",
            || Ok((!students.is_empty()).then(|| analytics::pathway_analysis(&students))),
            |out| report::write_pathways(out, &students, details),
        )?,
        Commands::Grades {
            details,
            at_risk,
            excelling,
            divisor,
        } => {
            let options = GradeOptions {
                details,
                at_risk,
                excelling,
                divisor,
            };
            context.render(
                "grades",
                || {
                    let grades = analytics::grade_comparison(&students, divisor)?;
                    Ok((!grades.is_empty()).then_some(grades))
                },
                |out| report::write_grades(out, &students, &options),
            )?
        }
        Commands::Predict => {
            let predictions = analytics::predict_placeholder(&students, &mut rng);
            context.render(
                "predict",
                || Ok((!predictions.is_empty()).then_some(&predictions)),
                |out| report::write_predictions(out, &predictions),
            )?
        }
        Commands::Report { out, divisor } => {
            let out = out.unwrap_or_else(|| default_report_path(context.format));
            let document = context.render(
                "report",
                || {
                    let subjects = non_empty(analytics::subject_analysis(&students))?;
                    let grades = analytics::grade_comparison(&students, divisor)?;
                    Ok(Some(json!({
                        "subjects": subjects,
                        "pathways": analytics::pathway_analysis(&students),
                        "grades": grades,
                    })))
                },
                |output| {
                    output.push_str(&report::build_report(
                        &students,
                        &criteria,
                        context.generated_on,
                        divisor,
                    ))
                },
            )?;
            std::fs::write(&out, document)
                .with_context(|| format!("failed to write {}", out.display()))?;
            format!("Report written to {}.\n", out.display())
        }
        Commands::Schools => {
            let schools = filter::schools(&all_students);
            context.render(
                "schools",
                || Ok(Some(&schools)),
                |out| {
                    for school in schools.iter() {
                        out.push_str(&format!("- {school}\n"));
                    }
                },
            )?
        }
        Commands::Generate { .. } => unreachable!("handled before loading students"),
    };

    print!("{output}");
    if cli.format == OutputFormat::Json && !output.ends_with('\n') {
        println!();
    }

    Ok(())
}
