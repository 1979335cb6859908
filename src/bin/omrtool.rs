use clap::{Parser, Subcommand};
use rust_omr::export::{
    render_debug_overlay, write_student_json, write_summary_csv, write_summary_json,
};
use rust_omr::pipeline::load_answer_key;
use rust_omr::tools::{binary_stats, load_rgb};
use rust_omr::utils::binarization::sheet_binarize;
use rust_omr::{AlignMode, Grader, GradingSession, OmrConfig, OmrError, SheetMeta, SummaryRow};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "omrtool", version, about = "RustOMR answer sheet grading tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Grade a directory of student sheets against a key sheet
    Grade {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        students: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// aruco, auto or auto_fallback
        #[arg(long, default_value = "auto_fallback")]
        method: AlignMode,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON answer key overriding the answers read from the key sheet
        #[arg(long)]
        answer_key: Option<PathBuf>,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        class: String,
        #[arg(long, default_value = "")]
        school: String,
        #[arg(long, default_value = "")]
        date: String,
        /// Write an annotated image per graded sheet
        #[arg(long)]
        debug: bool,
    },
    /// Print the layout learned from a key sheet as JSON
    Layout {
        #[arg(long)]
        key: PathBuf,
        #[arg(long, default_value = "auto_fallback")]
        method: AlignMode,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Align one sheet and write the result
    Align {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "auto_fallback")]
        method: AlignMode,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Grade {
            key,
            students,
            out,
            method,
            config,
            answer_key,
            name,
            subject,
            class,
            school,
            date,
            debug,
        } => {
            let meta = SheetMeta {
                name,
                subject,
                class,
                school,
                date,
            };
            grade_cmd(GradeArgs {
                key: &key,
                students: &students,
                out: &out,
                method,
                config: config.as_deref(),
                answer_key: answer_key.as_deref(),
                meta: &meta,
                debug,
            })
        }
        Command::Layout {
            key,
            method,
            config,
        } => layout_cmd(&key, method, config.as_deref()),
        Command::Align {
            image,
            out,
            method,
            config,
        } => align_cmd(&image, &out, method, config.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "omrtool failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<OmrConfig, OmrError> {
    match path {
        Some(path) => OmrConfig::from_json_file(path),
        None => Ok(OmrConfig::from_env()),
    }
}

fn save_image(image: &image::RgbImage, path: &Path) -> Result<(), OmrError> {
    image
        .save(path)
        .map_err(|err| OmrError::Io(std::io::Error::other(format!("{}: {err}", path.display()))))
}

struct GradeArgs<'a> {
    key: &'a Path,
    students: &'a Path,
    out: &'a Path,
    method: AlignMode,
    config: Option<&'a Path>,
    answer_key: Option<&'a Path>,
    meta: &'a SheetMeta,
    debug: bool,
}

fn grade_cmd(args: GradeArgs<'_>) -> Result<(), OmrError> {
    let config = load_config(args.config)?;
    let start = Instant::now();

    let key_image = load_rgb(args.key)?;
    let mut session = GradingSession::from_key(&key_image, &config, args.method)?;
    if let Some(path) = args.answer_key {
        session = session.with_answer_key(load_answer_key(path)?);
    }
    println!(
        "Key: {} ({} questions, aligned with {})",
        args.key.display(),
        session.layout().len(),
        session.key_strategy()
    );

    let graded = session.grade_dir(args.students)?;
    if graded.is_empty() {
        warn!(dir = %args.students.display(), "no student sheets found");
    }

    fs::create_dir_all(args.out)?;
    let students_dir = args.out.join("students");
    let debug_dir = args.out.join("debug");

    let mut rows: Vec<SummaryRow> = Vec::new();
    let mut skipped = 0usize;
    for (path, outcome) in &graded {
        let Some(result) = outcome.graded() else {
            skipped += 1;
            continue;
        };
        let report = students_dir.join(format!("{}.json", result.name));
        if let Err(err) = write_student_json(&report, result, args.meta) {
            warn!(sheet = %result.name, error = %err, "could not write student report");
        }
        if args.debug {
            let image = debug_dir.join(format!("{}.png", result.name));
            if let Err(err) = write_debug_image(&session, path, &image) {
                warn!(sheet = %result.name, error = %err, "could not write debug image");
            }
        }
        rows.push(SummaryRow::from(result));
    }

    write_summary_csv(args.out.join("summary.csv"), &rows)?;
    write_summary_json(args.out.join("summary.json"), &rows)?;

    for row in &rows {
        println!(
            "  {:<24} {:>5.1}%  ({}/{} correct, {} wrong, {} blank, {} multi)",
            row.student, row.score, row.correct, row.total, row.wrong, row.blank, row.multi
        );
    }
    for (_, outcome) in &graded {
        if let rust_omr::SheetOutcome::Skipped { name, reason } = outcome {
            println!("  {name:<24} skipped: {reason}");
        }
    }
    info!(
        graded = rows.len(),
        skipped,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "batch finished"
    );
    println!(
        "Graded {} sheets ({} skipped); results in {}",
        rows.len(),
        skipped,
        args.out.display()
    );
    Ok(())
}

fn write_debug_image(session: &GradingSession, source: &Path, out: &Path) -> Result<(), OmrError> {
    let image = load_rgb(source)?;
    let aligned = session.align(&image);
    let binary = sheet_binarize(&aligned.image, &session.config().layout.binarize);
    let extraction = rust_omr::extract(
        &aligned.image,
        session.layout(),
        Some(&binary),
        &session.config().extract,
    );
    let overlay = render_debug_overlay(&aligned.image, session.layout(), &extraction.metrics);
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    save_image(&overlay, out)
}

fn layout_cmd(key: &Path, method: AlignMode, config: Option<&Path>) -> Result<(), OmrError> {
    let grader = Grader::new()
        .with_config(load_config(config)?)
        .with_mode(method);
    let layout = grader.learn_layout(&load_rgb(key)?)?;
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}

fn align_cmd(
    image: &Path,
    out: &Path,
    method: AlignMode,
    config: Option<&Path>,
) -> Result<(), OmrError> {
    let grader = Grader::new()
        .with_config(load_config(config)?)
        .with_mode(method);
    let input = load_rgb(image)?;
    let aligned = grader.align(&input);
    let binary = sheet_binarize(&aligned.image, &grader.config().layout.binarize);
    let stats = binary_stats(&binary);

    save_image(&aligned.image, out)?;
    println!(
        "Image: {} ({}x{}) -> {} ({}x{})",
        image.display(),
        input.width(),
        input.height(),
        out.display(),
        aligned.image.width(),
        aligned.image.height()
    );
    println!(
        "Strategy: {} ({})",
        aligned.strategy_used,
        if aligned.success { "aligned" } else { "all strategies failed" }
    );
    println!(
        "Ink: {} of {} pixels ({:.2}%)",
        stats.ink_pixels,
        stats.total_pixels,
        stats.ink_ratio * 100.0
    );
    Ok(())
}
