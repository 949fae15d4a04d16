use clap::{Parser, Subcommand};
use kcal_core::profile::write_profile_fields;
use kcal_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "kcal")]
#[command(about = "Personal calorie ledger with daily goal tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results and failures as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the log, profile and summary collections
    Init,

    /// Update profile fields and recompute every day against the new goal
    Profile {
        /// male / female (m / f)
        #[arg(long)]
        sex: Option<String>,

        /// Body weight in kg
        #[arg(long)]
        weight: Option<String>,

        /// Height in cm
        #[arg(long)]
        height: Option<String>,

        /// Age in years
        #[arg(long)]
        age: Option<String>,

        /// Activity factor, e.g. "1.55" or "1.55 - Moderately active"
        #[arg(long)]
        activity: Option<String>,

        /// Goal offset, e.g. "-500", "0" or "+500"
        #[arg(long, allow_hyphen_values = true)]
        goal: Option<String>,
    },

    /// Log a food entry and recompute totals
    Add {
        /// Calories of the entry
        #[arg(long)]
        calories: f64,

        /// Date (YYYY-MM-DD or RFC 3339); defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Clock time (HH:MM)
        #[arg(long)]
        time: Option<String>,

        /// breakfast, lunch, dinner, snack or drink
        #[arg(long)]
        meal: Option<String>,

        /// What was eaten
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Recompute the goal and every daily summary
    Recompute,

    /// Show today's summary
    Today,

    /// List every daily summary
    Summary,

    /// Report an edit made outside kcal and run the matching recomputation
    Hook {
        /// Collection that was edited
        #[arg(long)]
        collection: String,

        /// Fields or columns that changed
        #[arg(long = "field")]
        fields: Vec<String>,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    kcal_core::logging::init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let failure = Failure::from(&err);
            if json {
                match serde_json::to_string(&failure) {
                    Ok(line) => eprintln!("{}", line),
                    Err(_) => eprintln!("{}", failure),
                }
            } else {
                eprintln!("{}", failure);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    let store = CsvStore::new(&data_dir);
    let json = cli.json;

    match cli.command {
        Commands::Init => cmd_init(store, &config),
        Commands::Profile {
            sex,
            weight,
            height,
            age,
            activity,
            goal,
        } => {
            let updates: Vec<(ProfileField, String)> = [
                (ProfileField::Sex, sex),
                (ProfileField::WeightKg, weight),
                (ProfileField::HeightCm, height),
                (ProfileField::AgeYears, age),
                (ProfileField::ActivityFactor, activity),
                (ProfileField::GoalOffset, goal),
            ]
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .collect();
            cmd_profile(store, &config, updates, json)
        }
        Commands::Add {
            calories,
            date,
            time,
            meal,
            description,
        } => cmd_add(store, &config, calories, date, time, meal, description, json),
        Commands::Recompute => {
            let mut sync = SyncOrchestrator::new(store, &config)?;
            let report = sync.recompute_all()?;
            print_report(&report, json)
        }
        Commands::Today => {
            let mut sync = SyncOrchestrator::new(store, &config)?;
            let record = sync.today_summary()?;
            if json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                display_record(&record);
            }
            Ok(())
        }
        Commands::Summary => cmd_summary(store, &config, json),
        Commands::Hook { collection, fields } => {
            let mut sync = SyncOrchestrator::new(store, &config)?;
            let report = sync.on_edit(&EditEvent { collection, fields })?;
            print_report(&report, json)
        }
    }
}

fn cmd_init(mut store: CsvStore, config: &Config) -> Result<()> {
    let existed = store.has_collection(&config.collections.summary);
    initialize_store(&mut store, &config.collections)?;

    if existed {
        println!("Store already initialized at {}", store.dir().display());
    } else {
        println!("✓ Initialized store at {}", store.dir().display());
    }
    Ok(())
}

fn cmd_profile(
    mut store: CsvStore,
    config: &Config,
    updates: Vec<(ProfileField, String)>,
    json: bool,
) -> Result<()> {
    if updates.is_empty() {
        let raw = kcal_core::profile::read_raw_profile(&store, &config.collections.profile)?;
        println!("{:#?}", raw);
        return Ok(());
    }

    write_profile_fields(&mut store, &config.collections.profile, &updates)?;
    store.commit()?;

    let fields = updates
        .iter()
        .map(|(field, _)| field.as_str().to_string())
        .collect();
    let mut sync = SyncOrchestrator::new(store, config)?;
    let report = sync.on_edit(&EditEvent {
        collection: config.collections.profile.clone(),
        fields,
    })?;
    print_report(&report, json)
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    mut store: CsvStore,
    config: &Config,
    calories: f64,
    date: Option<String>,
    time: Option<String>,
    meal: Option<String>,
    description: String,
    json: bool,
) -> Result<()> {
    if !calories.is_finite() || calories < 0.0 {
        return Err(Error::Other(format!(
            "calories must be a non-negative number, got {}",
            calories
        )));
    }

    let keys = DateKeyFormatter::from_config(config)?;
    let date = match date {
        Some(raw) => keys
            .parse_moment(&raw)
            .ok_or_else(|| Error::Other(format!("Invalid date: {}", raw)))?,
        None => chrono::Utc::now().with_timezone(&keys.offset()),
    };

    let time = time.as_deref().and_then(|t| {
        let parsed = chrono::NaiveTime::parse_from_str(t, "%H:%M").ok();
        if parsed.is_none() {
            eprintln!("Unknown time: {}. Leaving it blank.", t);
        }
        parsed
    });

    let meal_type = meal.as_deref().and_then(|m| {
        let parsed = MealType::parse(m);
        if parsed.is_none() {
            eprintln!("Unknown meal type: {}. Leaving it blank.", m);
        }
        parsed
    });

    let entry = LogEntry {
        date: Some(date),
        time,
        meal_type,
        description,
        calories: Some(calories),
    };
    kcal_core::ledger::append_entry(&mut store, &config.collections.log, &entry, &keys)?;
    store.commit()?;

    let mut sync = SyncOrchestrator::new(store, config)?;
    let report = sync.on_edit(&EditEvent {
        collection: config.collections.log.clone(),
        fields: vec!["calories".into()],
    })?;

    if json {
        return print_report(&report, json);
    }
    println!("✓ Logged {} kcal for {}", format_calories(calories), keys.key_for(&date));
    if let Some(TodayView::Ready(record)) = sync.today_view() {
        display_record(record);
    }
    Ok(())
}

fn cmd_summary(store: CsvStore, config: &Config, json: bool) -> Result<()> {
    let sync = SyncOrchestrator::new(store, config)?;
    let records = sync.summary_records()?;

    if json {
        println!("{}", serde_json::to_string(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No daily summaries yet.");
    }
    for record in &records {
        println!("{}", record);
    }
    Ok(())
}

fn print_report(report: &RecomputeReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!(
            "✓ Recomputed {} days against a goal of {} kcal",
            report.updated_date_count,
            format_calories(report.goal_limit)
        );
        println!(
            "  created {}, updated {}, unchanged {}",
            report.created, report.rewritten, report.unchanged
        );
    }
    Ok(())
}

fn display_record(record: &DailySummaryRecord) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", record.date);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Eaten:     {} kcal", format_calories(record.total_calories));
    println!("  Goal:      {} kcal", format_calories(record.goal_limit));
    println!("  {}", record.display_text);
    println!();
}
