use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use studytrack::core::service::{self, ProgressService};
use studytrack::domain::model::ModuleStatus;
use studytrack::utils::validation::{self, Validate};
use studytrack::utils::logger;
use studytrack::{bootstrap, CliConfig, TableStore};

#[derive(Parser)]
#[command(name = "studytrack")]
#[command(about = "Curriculum progress dashboard over flat-file storage")]
struct Cli {
    #[command(flatten)]
    config: CliConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the dashboard summary
    Dashboard,
    /// Add a new module (always placed in the first semester)
    AddModule {
        module_id: String,
        title: String,
        #[arg(long, default_value_t = 5)]
        credits: u32,
    },
    /// Change a module's status (offen, aktiv, abgeschlossen)
    SetStatus { module_id: String, status: String },
    /// Record an exam result for a module
    RecordResult {
        result_id: String,
        module_id: String,
        #[arg(long)]
        grade: Option<f64>,
        #[arg(long, default_value_t = 1)]
        attempt: u32,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Log study hours for a calendar week ("KW <n>")
    LogTime { week: String, hours: u32 },
    /// Recompute and print the study goals
    Goals {
        #[arg(long)]
        semester: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.config.verbose);

    cli.config.validate()?;

    let store = TableStore::new(&cli.config.data_dir)?;
    if bootstrap::ensure_seeded(&store)? {
        println!("Seeded initial study data in '{}'", cli.config.data_dir);
    }
    let mut service = ProgressService::load(store)?;

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Dashboard => print_dashboard(&mut service),
        Command::AddModule {
            module_id,
            title,
            credits,
        } => {
            validation::validate_positive_number("credits", credits, 1)?;
            let view = service.add_module(&module_id, &title, credits)?;
            println!("Added module '{}' ({} modules total)", module_id, view.len());
        }
        Command::SetStatus { module_id, status } => {
            let status: ModuleStatus = status.parse()?;
            service.change_module_status(&module_id, status)?;
            println!("Module '{}' is now '{}'", module_id, status);
        }
        Command::RecordResult {
            result_id,
            module_id,
            grade,
            attempt,
            date,
        } => {
            service.record_exam_result(&result_id, grade, date, attempt, &module_id)?;
            println!("Recorded result '{}' for module '{}'", result_id, module_id);
        }
        Command::LogTime { week, hours } => {
            validation::validate_week_label("week", &week)?;
            validation::validate_positive_number("hours", hours, 1)?;
            service.log_study_time(&week, hours)?;
            println!(
                "Logged {} hour(s) for {} (week total: {})",
                hours,
                week,
                service.study_time_for_week(&week)
            );
        }
        Command::Goals { semester } => {
            for goal in service.refresh_goals(semester.as_deref()) {
                println!(
                    "{:<20} {:<35} {:>6.2} / {:<6.2} {}",
                    goal.goal_id,
                    goal.kind,
                    goal.current,
                    goal.target,
                    if goal.achieved { "erreicht" } else { "offen" }
                );
            }
        }
    }

    Ok(())
}

fn print_dashboard(service: &mut ProgressService) {
    let student = service.student();
    println!("Student: {} <{}>", student.name, student.email);
    if let Some(program) = &student.program {
        println!(
            "Studiengang: {} ({} Semester, {} ECTS)",
            program.title, program.duration, program.total_credits
        );
    }
    println!();
    println!("ECTS gesamt:       {}", service.total_credits(None));
    println!("Durchschnittsnote: {:.2}", service.average_grade());
    println!(
        "Lernstunden {}: {}",
        service::current_week_label(),
        service.weekly_study_time()
    );
    println!();
    println!("Module:");
    for module in service.modules() {
        println!(
            "  {:<10} {:<35} {:>2} ECTS  {}",
            module.module_id, module.title, module.credits, module.status
        );
    }
    println!();
    println!("Ziele:");
    for goal in service.refresh_goals(None) {
        println!(
            "  {:<20} {:>6.2} / {:<6.2} {}",
            goal.goal_id,
            goal.current,
            goal.target,
            if goal.achieved { "erreicht" } else { "offen" }
        );
    }
}
