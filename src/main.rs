use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ixm::merge::{self, MergeOptions};
use ixm::remap::{PathPrefixMap, PathRemapper};
use ixm::utils::normalize_path;
use ixm::{dump, output, store, validate};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ixm")]
#[command(about = "Merge and relocate compiler index stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge one or more index stores into a relocated output store
    Merge {
        /// Input index stores, then the output index store
        #[arg(value_name = "STORES", required = true, num_args = 2..)]
        stores: Vec<PathBuf>,

        /// Path remapping substitution, first matching rule wins
        #[arg(short = 'r', long = "remap", value_name = "PATTERN=REPLACEMENT")]
        remap: Vec<String>,

        /// Literal prefix substitution applied when hashing output paths
        #[arg(long = "file-prefix-map", value_name = "PREFIX=VALUE")]
        file_prefix_map: Vec<String>,

        /// Import only the units for the given output files
        #[arg(long = "import-output-file", value_name = "PATH")]
        import_output_file: Vec<String>,

        /// Stride for parallel operations. 0 to disable parallel processing
        #[arg(long, value_name = "N", default_value_t = 32)]
        parallel_stride: usize,

        /// Skip units whose output is already newer than their input
        #[arg(long)]
        incremental: bool,

        /// Print a line for every unit written or skipped
        #[arg(short = 'V', long)]
        verbose: bool,
    },
    /// Print unit files as a YAML-shaped report
    Dump {
        /// Unit files to print
        #[arg(value_name = "UNIT_FILES", required = true)]
        units: Vec<PathBuf>,
    },
    /// Check that every path referenced by a store's units exists on disk
    Validate {
        /// Index store to check
        #[arg(value_name = "STORE")]
        store: PathBuf,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Merge {
            stores,
            remap,
            file_prefix_map,
            import_output_file,
            parallel_stride,
            incremental,
            verbose,
        } => {
            let opts = build_merge_options(
                &stores,
                &remap,
                &file_prefix_map,
                &import_output_file,
                incremental,
                verbose,
            )?;
            let inputs = &stores[..stores.len() - 1];
            Ok(merge::merge_stores(&opts, inputs, parallel_stride))
        }
        Commands::Dump { units } => {
            dump::dump_units(&units)?;
            Ok(true)
        }
        Commands::Validate { store } => validate::validate_store(&store),
    }
}

/// Parse all remap and prefix-map flags, reporting every bad one before
/// aborting, then initialize the output store.
fn build_merge_options(
    stores: &[PathBuf],
    remap: &[String],
    file_prefix_map: &[String],
    import_output_file: &[String],
    incremental: bool,
    verbose: bool,
) -> Result<MergeOptions> {
    let mut config_errors = Vec::new();

    let remapper = match PathRemapper::from_args(remap) {
        Ok(remapper) => remapper,
        Err(errors) => {
            config_errors.extend(errors);
            PathRemapper::empty()
        }
    };
    let prefix_map = match PathPrefixMap::from_args(file_prefix_map) {
        Ok(prefix_map) => prefix_map,
        Err(errors) => {
            config_errors.extend(errors);
            PathPrefixMap::empty()
        }
    };

    if !config_errors.is_empty() {
        for message in &config_errors {
            output::error(message);
        }
        bail!(
            "aborting due to {} error{}",
            config_errors.len(),
            if config_errors.len() > 1 { "s" } else { "" }
        );
    }

    // The last positional path is the output store
    let output_store = normalize_path(&stores[stores.len() - 1]);
    store::init_store(&output_store).context("failed to initialize index store")?;

    let import_filter = if import_output_file.is_empty() {
        None
    } else {
        Some(merge::unit_name_filter(
            import_output_file,
            &remapper,
            &prefix_map,
        )?)
    };

    Ok(MergeOptions {
        output_store,
        remapper,
        prefix_map,
        incremental,
        verbose,
        import_filter,
    })
}
