use anyhow::Result;
use clap::{Parser, Subcommand};
use sctl::areas::repository::Repository;
use sctl::commands::porcelain::diff::DiffOptions;
use sctl::commands::porcelain::log::LogOptions;
use sctl::commands::porcelain::merge::MergeOptions;
use sctl::commands::porcelain::reset::ResetMode;

#[derive(Parser)]
#[command(
    name = "sctl",
    version = "0.1.0",
    about = "A content-addressed source-control system",
    long_about = "A source-control system built on a content-addressed object \
    database, an on-disk staging index, and a commit DAG with three-way merging."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize a new repository")]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<String>,
    },
    #[command(about = "Add files or directories to the index")]
    Add {
        #[arg(index = 1, required = true, help = "Files or directories to stage")]
        paths: Vec<String>,
    },
    #[command(about = "Record the staged snapshot as a new commit")]
    Commit {
        #[arg(short, long, default_value = "", help = "The commit message")]
        message: String,
    },
    #[command(about = "Show the working tree status")]
    Status,
    #[command(about = "Show the commit history")]
    Log {
        #[arg(index = 1, help = "Starting revision (defaults to HEAD)")]
        revision: Option<String>,
        #[arg(short = 'n', long, help = "Limit the number of commits")]
        max_count: Option<usize>,
        #[arg(long, help = "Follow only the first parent of merges")]
        first_parent: bool,
        #[arg(long, help = "Only commits touching this path")]
        path: Option<String>,
    },
    #[command(about = "Show an object")]
    Show {
        #[arg(index = 1, default_value = "HEAD", help = "Revision or object digest")]
        revision: String,
    },
    #[command(about = "Show changes between snapshots")]
    Diff {
        #[arg(long, help = "Compare the index against HEAD")]
        cached: bool,
        #[arg(index = 1, num_args = 0..=2, help = "Revisions to compare")]
        revisions: Vec<String>,
        #[arg(short = 'U', long, default_value_t = 3, help = "Context lines")]
        unified: usize,
    },
    #[command(about = "Create, list, or delete branches")]
    Branch {
        #[arg(index = 1, help = "Branch name to create")]
        name: Option<String>,
        #[arg(index = 2, help = "Revision to branch from (defaults to HEAD)")]
        start: Option<String>,
        #[arg(short, long, help = "Delete the named branch")]
        delete: bool,
    },
    #[command(about = "Switch branches or restore a commit's snapshot")]
    Checkout {
        #[arg(index = 1, help = "Branch, tag, or revision to check out")]
        target: String,
    },
    #[command(about = "Merge another revision into HEAD")]
    Merge {
        #[arg(index = 1, help = "Revision to merge")]
        target: Option<String>,
        #[arg(short, long, help = "The merge commit message")]
        message: Option<String>,
        #[arg(long, help = "Stage the merge result without a merge commit")]
        squash: bool,
        #[arg(long, help = "Refuse anything but a fast-forward")]
        ff_only: bool,
        #[arg(long, default_value = "fail", help = "Conflict strategy: fail, ours, theirs, union")]
        strategy: String,
        #[arg(long, help = "Use diff3-style conflict markers")]
        diff3: bool,
        #[arg(long, help = "Abort the in-progress merge")]
        abort: bool,
    },
    #[command(about = "Move HEAD, and optionally the index and working tree")]
    Reset {
        #[arg(index = 1, help = "Target revision (defaults to HEAD)")]
        revision: Option<String>,
        #[arg(long, conflicts_with_all = ["mixed", "hard"], help = "Move the ref only")]
        soft: bool,
        #[arg(long, conflicts_with = "hard", help = "Also reset the index (default)")]
        mixed: bool,
        #[arg(long, help = "Also reset the working tree")]
        hard: bool,
    },
    #[command(about = "Create a commit undoing an earlier one")]
    Revert {
        #[arg(index = 1, help = "Revision to revert")]
        revision: String,
    },
    #[command(about = "Create, list, or delete tags")]
    Tag {
        #[arg(index = 1, help = "Tag name to create")]
        name: Option<String>,
        #[arg(index = 2, help = "Revision to tag (defaults to HEAD)")]
        revision: Option<String>,
        #[arg(short, long, help = "Create an annotated tag with this message")]
        message: Option<String>,
        #[arg(short, long, help = "Delete the named tag")]
        delete: bool,
    },
}

fn open_repository() -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Repository::discover(pwd, Box::new(std::io::stdout()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            let root = match path {
                Some(path) => std::path::PathBuf::from(path),
                None => std::env::current_dir()?,
            };
            let repository = Repository::new(root, Box::new(std::io::stdout()))?;
            repository.init().await?;
        }
        Commands::Add { paths } => {
            open_repository()?.add(&paths).await?;
        }
        Commands::Commit { message } => {
            open_repository()?.commit(&message).await?;
        }
        Commands::Status => {
            open_repository()?.status().await?;
        }
        Commands::Log {
            revision,
            max_count,
            first_parent,
            path,
        } => {
            open_repository()?
                .log(LogOptions {
                    revision,
                    limit: max_count,
                    first_parent,
                    path,
                })
                .await?;
        }
        Commands::Show { revision } => {
            open_repository()?.show(&revision)?;
        }
        Commands::Diff {
            cached,
            revisions,
            unified,
        } => {
            open_repository()?
                .diff(DiffOptions {
                    cached,
                    revisions,
                    context: unified,
                })
                .await?;
        }
        Commands::Branch {
            name,
            start,
            delete,
        } => {
            let repository = open_repository()?;
            match (name, delete) {
                (Some(name), true) => repository.branch_delete(&name)?,
                (Some(name), false) => repository.branch_create(&name, start.as_deref())?,
                (None, _) => {
                    repository.branch_list()?;
                }
            }
        }
        Commands::Checkout { target } => {
            open_repository()?.checkout(&target).await?;
        }
        Commands::Merge {
            target,
            message,
            squash,
            ff_only,
            strategy,
            diff3,
            abort,
        } => {
            let repository = open_repository()?;
            if abort {
                repository.merge_abort().await?;
            } else {
                let target =
                    target.ok_or_else(|| anyhow::anyhow!("merge requires a revision"))?;
                repository
                    .merge(
                        &target,
                        MergeOptions {
                            message,
                            squash,
                            ff_only,
                            strategy: strategy.parse()?,
                            diff3,
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }
        Commands::Reset {
            revision,
            soft,
            hard,
            ..
        } => {
            let mode = if soft {
                ResetMode::Soft
            } else if hard {
                ResetMode::Hard
            } else {
                ResetMode::Mixed
            };
            open_repository()?.reset(revision.as_deref(), mode).await?;
        }
        Commands::Revert { revision } => {
            open_repository()?.revert(&revision).await?;
        }
        Commands::Tag {
            name,
            revision,
            message,
            delete,
        } => {
            let repository = open_repository()?;
            match (name, delete) {
                (Some(name), true) => repository.tag_delete(&name)?,
                (Some(name), false) => {
                    repository.tag_create(&name, revision.as_deref(), message.as_deref())?
                }
                (None, _) => {
                    repository.tag_list()?;
                }
            }
        }
    }

    Ok(())
}
