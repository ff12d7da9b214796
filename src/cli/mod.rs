pub mod commands;
pub mod config;
pub mod display;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use crate::model::HierarchyLevel;

#[derive(Parser)]
#[command(name = "ecourts", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration profile to use instead of the default
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Skip OCR even if it is enabled in the configuration
    #[arg(long, global = true)]
    pub no_ocr: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to a file (default location when no path is given)
    #[arg(long, global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Write the result envelope as JSON to this file
    #[arg(long, global = true)]
    pub output_json: Option<PathBuf>,

    /// Write the formatted result to this text file
    #[arg(long, global = true)]
    pub output_text: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LevelArg {
    State,
    District,
    Complex,
    Court,
}

impl Cli {
    /// Log file requested with `--log-file`, if any
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .map(|path| path.unwrap_or_else(crate::utils::default_log_file))
    }
}

impl From<LevelArg> for HierarchyLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::State => HierarchyLevel::State,
            LevelArg::District => HierarchyLevel::District,
            LevelArg::Complex => HierarchyLevel::CourtComplex,
            LevelArg::Court => HierarchyLevel::Court,
        }
    }
}

/// State, district and complex codes scoping a query
#[derive(Args, Clone)]
pub struct LocationArgs {
    /// State code
    #[arg(long)]
    pub state: String,

    /// District code
    #[arg(long)]
    pub district: String,

    /// Court complex code (plain id or `complex@establishments@flag`)
    #[arg(long)]
    pub complex: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List states, districts, court complexes or courts
    Hierarchy {
        /// Level to list
        #[arg(value_enum)]
        level: LevelArg,

        #[arg(long)]
        state: Option<String>,

        #[arg(long, requires = "state")]
        district: Option<String>,

        #[arg(long, requires = "district")]
        complex: Option<String>,
    },

    /// Pick a state, district, complex and court interactively
    Select,

    /// Look up a case by its CNR number
    Cnr {
        /// 16-character CNR number
        #[arg(required = true)]
        cnr: String,

        /// Captcha code, if already known
        #[arg(long)]
        captcha: Option<String>,
    },

    /// Look up a case by type, number and year
    Case {
        #[command(flatten)]
        location: LocationArgs,

        /// Establishment code
        #[arg(long)]
        est: String,

        /// Case type code
        #[arg(long)]
        case_type: String,

        /// Case number
        #[arg(long)]
        number: String,

        /// Registration year
        #[arg(long)]
        year: String,

        #[arg(long)]
        captcha: Option<String>,
    },

    /// Fetch a court's cause list for a day
    CauseList {
        #[command(flatten)]
        location: LocationArgs,

        /// Court code in `establishment^court` form
        #[arg(long, required_unless_present = "all_courts")]
        court: Option<String>,

        /// Date in DD-MM-YYYY
        #[arg(long, conflicts_with_all = ["today", "tomorrow"])]
        date: Option<String>,

        #[arg(long, conflicts_with = "tomorrow")]
        today: bool,

        #[arg(long)]
        tomorrow: bool,

        /// civ or cri
        #[arg(long, default_value = "civ")]
        kind: String,

        /// Court label as shown by the portal, e.g. "7-Smt. Sruthy M-Additional Sub judge"
        #[arg(long)]
        court_name: Option<String>,

        /// Print counts by purpose and court
        #[arg(long)]
        stats: bool,

        /// Render the returned list to PDF
        #[arg(long)]
        pdf: bool,

        /// Fetch the list of every court in the complex
        #[arg(long)]
        all_courts: bool,

        #[arg(long)]
        captcha: Option<String>,
    },

    /// Fetch a captcha image and save it
    Captcha,

    /// Manage configuration profiles
    Config {
        /// Profile name to show, or create if missing
        #[arg(required = false, value_name = "PROFILE")]
        name: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parent codes for `level`, taken by position from `--state`, `--district`, `--complex`
fn hierarchy_parents(level: HierarchyLevel, codes: [Option<String>; 3]) -> Result<Vec<String>> {
    const FLAGS: [&str; 3] = ["--state", "--district", "--complex"];

    codes
        .into_iter()
        .zip(FLAGS)
        .take(level.parent_count())
        .map(|(code, flag)| code.ok_or_else(|| anyhow::anyhow!("Listing {} entries requires {}", level, flag)))
        .collect()
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    let ctx = commands::Context {
        profile: cli.profile,
        use_ocr: !cli.no_ocr,
        output_json: cli.output_json,
        output_text: cli.output_text,
    };

    match cli.command {
        Commands::Hierarchy { level, state, district, complex } => {
            let level = HierarchyLevel::from(level);
            let parents = hierarchy_parents(level, [state, district, complex])?;
            info!("Listing {} entries", level);
            commands::hierarchy(&ctx, level, parents).await
        }
        Commands::Select => commands::select(&ctx).await,
        Commands::Cnr { cnr, captcha } => {
            info!("Searching CNR {}", cnr);
            commands::cnr(&ctx, cnr, captcha).await
        }
        Commands::Case { location, est, case_type, number, year, captcha } => {
            commands::case(&ctx, location, est, case_type, number, year, captcha).await
        }
        Commands::CauseList {
            location,
            court,
            date,
            today,
            tomorrow,
            kind,
            court_name,
            stats,
            pdf,
            all_courts,
            captcha,
        } => {
            let date = commands::resolve_date(date.as_deref(), today, tomorrow)?;
            let options = commands::CauseListOptions {
                location,
                court,
                date,
                kind,
                court_name,
                stats,
                pdf,
                captcha,
            };
            if all_courts {
                info!("Fetching cause lists for every court of complex {}", options.location.complex);
                commands::cause_list_all_courts(&ctx, options).await
            } else {
                commands::cause_list(&ctx, options).await
            }
        }
        Commands::Captcha => commands::captcha(&ctx).await,
        Commands::Config { name, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if let Some(profile_name) = name {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(profile_name)
            } else {
                info!("Showing current configuration");
                commands::show_config(ctx.profile.as_deref())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_cause_list_args() {
        let cli = Cli::try_parse_from([
            "ecourts", "cause-list", "--state", "16", "--district", "13", "--complex", "1360016",
            "--court", "346^11", "--tomorrow", "--kind", "cri", "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::CauseList { tomorrow: true, ref court, .. } if court.as_deref() == Some("346^11")
        ));
    }

    #[test]
    fn test_court_required_unless_all_courts() {
        let base = ["ecourts", "cause-list", "--state", "16", "--district", "13", "--complex", "1"];
        assert!(Cli::try_parse_from(base).is_err());

        let mut all = base.to_vec();
        all.push("--all-courts");
        assert!(Cli::try_parse_from(all).is_ok());
    }

    #[test]
    fn test_hierarchy_flags_need_their_parents() {
        let args = ["ecourts", "hierarchy", "complex", "--district", "13", "--complex", "5"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = ["ecourts", "hierarchy", "court", "--state", "16", "--district", "13", "--complex", "5"];
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn test_hierarchy_parents_by_position() {
        let code = |c: &str| Some(c.to_string());

        let parents = hierarchy_parents(HierarchyLevel::CourtComplex, [code("16"), code("13"), None]).unwrap();
        assert_eq!(parents, vec!["16", "13"]);

        let parents = hierarchy_parents(HierarchyLevel::District, [code("16"), code("13"), code("5")]).unwrap();
        assert_eq!(parents, vec!["16"]);

        let err = hierarchy_parents(HierarchyLevel::Court, [code("16"), code("13"), None]).unwrap_err();
        assert_eq!(err.to_string(), "Listing court entries requires --complex");
        assert!(hierarchy_parents(HierarchyLevel::State, [None, None, None]).unwrap().is_empty());
    }

    #[test]
    fn test_date_flags_conflict() {
        let args = [
            "ecourts", "cause-list", "--state", "16", "--district", "13", "--complex", "1",
            "--court", "1^2", "--today", "--date", "17-10-2025",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
