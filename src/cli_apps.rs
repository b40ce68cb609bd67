use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, error::ErrorKind};
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::AnnotatorConfig;
use crate::constants::catalog::DEFAULT_DATA_DIR;
use crate::constants::persistence::DEFAULT_STORE_ROOT;
use crate::data::{RepurposedFields, SampleRef};
use crate::errors::AnnotationError;
use crate::service::{AnnotationService, parse_sample_id};
use crate::types::{CategoryName, DatasetName, Position, Rank};

#[derive(Debug, Parser)]
#[command(
    name = "annotate",
    disable_help_subcommand = true,
    about = "Annotate VQA samples from the command line",
    long_about = "Flag errors, write repurposed question/answer items, select samples and attach captions against a directory of VQA dataset files.",
    after_help = "Samples are addressed by --dataset plus --sample, where --sample accepts either a bare position (3) or a prefixed id (sample_3)."
)]
/// CLI for `annotate`.
///
/// Common usage:
/// - Keep default locations: datasets under `data/`, annotations under `.`
/// - Point at another catalog: `--data-dir /srv/vqa/data`
/// - Keep annotations elsewhere: `--store-root /srv/vqa/annotations`
/// - Repeat `--category <NAME>` to replace the default error categories
struct AnnotateCli {
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        default_value = DEFAULT_DATA_DIR,
        help = "Directory holding one JSON array file per dataset"
    )]
    data_dir: PathBuf,
    #[arg(
        long = "store-root",
        value_name = "DIR",
        default_value = DEFAULT_STORE_ROOT,
        help = "Root directory for persisted annotation files"
    )]
    store_root: PathBuf,
    #[arg(
        long = "category",
        value_name = "NAME",
        help = "Optional error category override, repeat as needed in display order"
    )]
    categories: Vec<CategoryName>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct SampleArgs {
    #[arg(long, help = "Dataset name (file stem of the dataset file)")]
    dataset: DatasetName,
    #[arg(
        long,
        value_name = "ID",
        value_parser = parse_sample_arg,
        help = "Sample position or id of the form <prefix>_<n>"
    )]
    sample: Position,
}

impl SampleArgs {
    fn to_ref(&self) -> SampleRef {
        SampleRef::new(self.dataset.clone(), self.sample)
    }
}

#[derive(Debug, Clone, Args)]
struct FieldArgs {
    #[arg(long, help = "Rewritten question")]
    question: String,
    #[arg(long, help = "Rewritten answer options")]
    options: String,
    #[arg(long, help = "Rewritten reference answer")]
    answer: String,
}

impl From<FieldArgs> for RepurposedFields {
    fn from(args: FieldArgs) -> Self {
        RepurposedFields::new(args.question, args.options, args.answer)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the configured error categories.
    Categories,
    /// List dataset names.
    Datasets,
    /// Show the sample count and samples of one dataset.
    Info {
        #[arg(long)]
        dataset: DatasetName,
    },
    /// Show one sample.
    Sample(SampleArgs),
    /// Flag a sample under an error category.
    Flag {
        #[arg(long)]
        category: CategoryName,
        #[command(flatten)]
        target: SampleArgs,
    },
    /// Remove an error flag.
    Unflag {
        #[arg(long)]
        category: CategoryName,
        #[command(flatten)]
        target: SampleArgs,
    },
    /// List the error categories a sample is flagged under.
    Flags(SampleArgs),
    /// List flagged samples of a dataset under one category.
    ErrorSamples {
        #[arg(long)]
        dataset: DatasetName,
        #[arg(long)]
        category: CategoryName,
    },
    /// Manage repurposed question/answer items.
    #[command(subcommand)]
    Repurpose(RepurposeCommand),
    /// List samples of a dataset that have repurposed items.
    RepurposedSamples {
        #[arg(long)]
        dataset: DatasetName,
    },
    /// Select a sample.
    Select(SampleArgs),
    /// Unselect a sample.
    Unselect(SampleArgs),
    /// List selected samples of a dataset.
    Selected {
        #[arg(long)]
        dataset: DatasetName,
    },
    /// Manage captions.
    #[command(subcommand)]
    Caption(CaptionCommand),
    /// Show every annotation recorded against a sample.
    Overview(SampleArgs),
    /// Rebuild the repurposed index from the repurposed item list.
    RepairIndex,
}

#[derive(Debug, Subcommand)]
enum RepurposeCommand {
    /// Create a repurposed item.
    Add {
        #[command(flatten)]
        target: SampleArgs,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// List repurposed items of a sample.
    List(SampleArgs),
    /// Replace the item at a rank.
    Update {
        #[command(flatten)]
        target: SampleArgs,
        #[arg(long)]
        rank: Rank,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete the item at a rank.
    Delete {
        #[command(flatten)]
        target: SampleArgs,
        #[arg(long)]
        rank: Rank,
    },
}

#[derive(Debug, Subcommand)]
enum CaptionCommand {
    /// Attach a caption.
    Add {
        #[command(flatten)]
        target: SampleArgs,
        #[arg(long)]
        text: String,
    },
    /// List captions of a sample.
    List(SampleArgs),
    /// Replace the caption at a rank.
    Update {
        #[command(flatten)]
        target: SampleArgs,
        #[arg(long)]
        rank: Rank,
        #[arg(long)]
        text: String,
    },
    /// Delete the caption at a rank.
    Delete {
        #[command(flatten)]
        target: SampleArgs,
        #[arg(long)]
        rank: Rank,
    },
}

/// Parse `args_iter` (without the program name), run one annotation command
/// and print its result as pretty JSON on stdout.
pub fn run_annotate_cli<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<AnnotateCli, _>(std::iter::once("annotate".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = AnnotatorConfig::default()
        .with_data_dir(cli.data_dir)
        .with_store_root(cli.store_root);
    if !cli.categories.is_empty() {
        config = config.with_error_categories(cli.categories);
    }
    let service = config.open()?;

    match execute(&service, cli.command) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "error": err.kind().as_str(),
                    "message": err.to_string(),
                }))?
            );
            Err(err.into())
        }
    }
}

fn execute(service: &AnnotationService, command: Command) -> Result<Value, AnnotationError> {
    match command {
        Command::Categories => to_json(service.error_categories()),
        Command::Datasets => to_json(&service.datasets()),
        Command::Info { dataset } => to_json(&service.dataset_info(&dataset)?),
        Command::Sample(target) => to_json(&service.sample(&target.to_ref())?),
        Command::Flag { category, target } => {
            let changed = service.set_error_flag(&category, &target.to_ref(), true)?;
            Ok(json!({ "changed": changed }))
        }
        Command::Unflag { category, target } => {
            let changed = service.clear_error_flag(&category, &target.to_ref())?;
            Ok(json!({ "changed": changed }))
        }
        Command::Flags(target) => to_json(&service.error_categories_for(&target.to_ref())?),
        Command::ErrorSamples { dataset, category } => {
            to_json(&service.error_samples(&dataset, &category)?)
        }
        Command::Repurpose(command) => execute_repurpose(service, command),
        Command::RepurposedSamples { dataset } => to_json(&service.repurposed_samples(&dataset)?),
        Command::Select(target) => {
            let changed = service.set_selected(&target.to_ref(), true)?;
            Ok(json!({ "changed": changed }))
        }
        Command::Unselect(target) => {
            let changed = service.set_selected(&target.to_ref(), false)?;
            Ok(json!({ "changed": changed }))
        }
        Command::Selected { dataset } => to_json(&service.selected_samples(&dataset)?),
        Command::Caption(command) => execute_caption(service, command),
        Command::Overview(target) => to_json(&service.sample_annotations(&target.to_ref())?),
        Command::RepairIndex => to_json(&service.rebuild_repurposed_index()?),
    }
}

fn execute_repurpose(
    service: &AnnotationService,
    command: RepurposeCommand,
) -> Result<Value, AnnotationError> {
    match command {
        RepurposeCommand::Add { target, fields } => {
            let rank = service.add_repurposed(&target.to_ref(), fields.into())?;
            Ok(json!({ "rank": rank }))
        }
        RepurposeCommand::List(target) => to_json(&service.repurposed_for(&target.to_ref())?),
        RepurposeCommand::Update {
            target,
            rank,
            fields,
        } => {
            service.update_repurposed(&target.to_ref(), rank, fields.into())?;
            Ok(json!({ "rank": rank }))
        }
        RepurposeCommand::Delete { target, rank } => {
            to_json(&service.delete_repurposed(&target.to_ref(), rank)?)
        }
    }
}

fn execute_caption(
    service: &AnnotationService,
    command: CaptionCommand,
) -> Result<Value, AnnotationError> {
    match command {
        CaptionCommand::Add { target, text } => {
            let rank = service.add_caption(&target.to_ref(), &text)?;
            Ok(json!({ "rank": rank }))
        }
        CaptionCommand::List(target) => to_json(&service.captions_for(&target.to_ref())?),
        CaptionCommand::Update { target, rank, text } => {
            service.update_caption(&target.to_ref(), rank, &text)?;
            Ok(json!({ "rank": rank }))
        }
        CaptionCommand::Delete { target, rank } => {
            to_json(&service.delete_caption(&target.to_ref(), rank)?)
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, AnnotationError> {
    Ok(serde_json::to_value(value)?)
}

fn parse_sample_arg(raw: &str) -> Result<Position, String> {
    parse_sample_id(raw).map_err(|err| err.to_string())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> AnnotateCli {
        AnnotateCli::try_parse_from(std::iter::once("annotate").chain(args.iter().copied()))
            .unwrap()
    }

    fn service_in(root: &std::path::Path) -> AnnotationService {
        let data = root.join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(
            data.join("d1.json"),
            r#"[{"question":"q0","options":"A/B","answer":"A","video_url":" u0 "},
                {"question":"q1","options":"A/B","answer":"B","video_url":"u1"}]"#,
        )
        .unwrap();
        AnnotatorConfig::default()
            .with_data_dir(data)
            .with_store_root(root.join("store"))
            .open()
            .unwrap()
    }

    #[test]
    fn sample_accepts_prefixed_ids() {
        let cli = parse(&["sample", "--dataset", "d1", "--sample", "sample_1"]);
        match cli.command {
            Command::Sample(target) => assert_eq!(target.to_ref(), SampleRef::new("d1", 1)),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(
            AnnotateCli::try_parse_from(["annotate", "sample", "--dataset", "d1", "--sample", "x"])
                .is_err()
        );
    }

    #[test]
    fn help_is_not_an_error() {
        let parsed = parse_cli::<AnnotateCli, _>(["annotate", "--help"]).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn repeated_categories_are_collected_in_order() {
        let cli = parse(&["--category", "B", "--category", "A", "categories"]);
        assert_eq!(cli.categories, vec!["B", "A"]);
    }

    #[test]
    fn commands_round_trip_through_the_service() {
        let dir = tempdir().unwrap();
        let service = service_in(dir.path());

        let flagged = execute(
            &service,
            parse(&["flag", "--category", "Wrong", "--dataset", "d1", "--sample", "1"]).command,
        )
        .unwrap();
        assert_eq!(flagged, json!({ "changed": true }));

        let added = execute(
            &service,
            parse(&[
                "repurpose", "add", "--dataset", "d1", "--sample", "0", "--question", "Q?",
                "--options", "A/B", "--answer", "A",
            ])
            .command,
        )
        .unwrap();
        assert_eq!(added, json!({ "rank": 0 }));

        let overview = execute(
            &service,
            parse(&["overview", "--dataset", "d1", "--sample", "0"]).command,
        )
        .unwrap();
        assert_eq!(overview["has_repurposed"], true);
        assert_eq!(overview["repurposed"][0]["video_url"], "u0");

        let errors = execute(
            &service,
            parse(&["error-samples", "--dataset", "d1", "--category", "Wrong"]).command,
        )
        .unwrap();
        assert_eq!(errors[0]["position"], 1);
        assert_eq!(errors[0]["has_repurposed"], false);
    }

    #[test]
    fn failures_keep_their_error_kind() {
        let dir = tempdir().unwrap();
        let service = service_in(dir.path());
        let err = execute(
            &service,
            parse(&["caption", "delete", "--dataset", "d1", "--sample", "0", "--rank", "0"])
                .command,
        )
        .unwrap_err();
        assert_eq!(err.kind().as_str(), "index_out_of_range");
    }
}
