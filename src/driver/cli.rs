//! Command-line surface (§6 "CLI").

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "anoph-sim-core",
    author,
    version,
    about = "Individual-based malaria transmission core",
    long_about = None,
    disable_version_flag = true
)]
pub struct Cli {
    /// Print version and exit (§6 "--version (-v)").
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    /// Scenario input file.
    #[arg(short = 's', long = "scenario", value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Survey output file.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Continuous output file.
    #[arg(long = "ctsout", value_name = "FILE")]
    pub ctsout: Option<PathBuf>,

    /// Run name; expands to `<name>.xml`, `<name>.txt` and `<name>.ctsout`
    /// when the three file options above are not given explicitly.
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub name: Option<String>,

    /// Gzip the survey output to `<name>.gz`.
    #[arg(short = 'z', long = "compress-output")]
    pub compress_output: bool,

    /// Directory searched for scenario-relative resource files.
    #[arg(short = 'p', long = "resource-path", value_name = "DIR")]
    pub resource_path: Option<PathBuf>,

    /// Validate the scenario and exit without simulating.
    #[arg(long = "validate-only")]
    pub validate_only: bool,

    /// Enable periodic checkpointing.
    #[arg(short = 'c', long = "checkpoint")]
    pub checkpoint: bool,

    /// Checkpoint file base path (alternating files are derived from it).
    #[arg(long = "checkpoint-file", value_name = "FILE")]
    pub checkpoint_file: Option<PathBuf>,

    /// Exit immediately after writing a checkpoint, without simulating further.
    #[arg(long = "checkpoint-stop")]
    pub checkpoint_stop: bool,

    /// Print the parsed model and exit.
    #[arg(short = 'm', long = "print-model")]
    pub print_model: bool,

    /// Print the daily EIR series and exit.
    #[arg(long = "print-EIR")]
    pub print_eir: bool,

    /// Print the parsed intervention schedule and exit.
    #[arg(long = "print-interventions")]
    pub print_interventions: bool,

    /// Print the resolved survey times and exit.
    #[arg(long = "print-survey-times")]
    pub print_survey_times: bool,

    /// Print the genotype registry and exit.
    #[arg(long = "print-genotypes")]
    pub print_genotypes: bool,

    /// Print the Fourier-to-daily EIR interpolation samples.
    #[arg(long = "sample-interpolations")]
    pub sample_interpolations: bool,

    /// Emit warnings for deprecated scenario features.
    #[arg(long = "deprecation-warnings")]
    pub deprecation_warnings: bool,

    /// Emit `tracing::debug!` diagnostics from the vector fitter.
    #[arg(long = "debug-vector-fitting")]
    pub debug_vector_fitting: bool,
}

impl Cli {
    /// A `Cli` with every flag at its default, for driver tests that
    /// call `run` directly without going through `clap::Parser`.
    pub fn default_for_test() -> Self {
        Cli {
            version: None,
            scenario: None,
            output: None,
            ctsout: None,
            name: None,
            compress_output: false,
            resource_path: None,
            validate_only: false,
            checkpoint: false,
            checkpoint_file: None,
            checkpoint_stop: false,
            print_model: false,
            print_eir: false,
            print_interventions: false,
            print_survey_times: false,
            print_genotypes: false,
            sample_interpolations: false,
            deprecation_warnings: false,
            debug_vector_fitting: false,
        }
    }

    /// Resolve `--name` into the three file options when they were not
    /// given explicitly (§6 "`--name` ... expands to the three above").
    pub fn resolved_scenario_path(&self) -> Option<PathBuf> {
        self.scenario.clone().or_else(|| self.name.as_ref().map(|n| PathBuf::from(format!("{n}.xml"))))
    }

    pub fn resolved_output_path(&self) -> Option<PathBuf> {
        self.output.clone().or_else(|| self.name.as_ref().map(|n| PathBuf::from(format!("{n}.txt"))))
    }

    pub fn resolved_ctsout_path(&self) -> Option<PathBuf> {
        self.ctsout.clone().or_else(|| self.name.as_ref().map(|n| PathBuf::from(format!("{n}.ctsout"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_expands_to_the_three_file_options() {
        let cli = Cli::parse_from(["anoph-sim-core", "-n", "run1"]);
        assert_eq!(cli.resolved_scenario_path(), Some(PathBuf::from("run1.xml")));
        assert_eq!(cli.resolved_output_path(), Some(PathBuf::from("run1.txt")));
        assert_eq!(cli.resolved_ctsout_path(), Some(PathBuf::from("run1.ctsout")));
    }

    #[test]
    fn explicit_paths_take_priority_over_name() {
        let cli = Cli::parse_from(["anoph-sim-core", "-n", "run1", "-s", "explicit.xml"]);
        assert_eq!(cli.resolved_scenario_path(), Some(PathBuf::from("explicit.xml")));
        assert_eq!(cli.resolved_output_path(), Some(PathBuf::from("run1.txt")));
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::parse_from(["anoph-sim-core", "-s", "a.xml", "-o", "b.txt", "-z", "-c", "-m"]);
        assert!(cli.compress_output);
        assert!(cli.checkpoint);
        assert!(cli.print_model);
    }
}
