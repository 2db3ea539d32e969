//! Command-line interface for codevec.

pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use codevec_config::{resolve_env_value, CodevecConfig};
use codevec_index::{
    HttpEmbeddings, HttpEmbeddingsConfig, JavaParser, ParserConfig, QdrantConfig, QdrantStore,
    SourceWalker,
};

use crate::tools::CodebaseTools;

#[derive(Parser, Debug)]
#[command(name = "codevec")]
#[command(about = "Index a Java codebase into a vector store and query it in natural language")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Index a project
    codevec update my-service ./my-service

    # Ask a question
    codevec query my-service "where are users persisted?" --limit 3

    # Count parseable files without touching any backend
    codevec files-count ./my-service
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (default: ~/.config/codevec/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-index a project from its source tree
    Update {
        /// Project name the vectors are stored under
        project: String,

        /// Root directory of the codebase
        path: String,
    },

    /// Query a project's code with a question
    Query {
        project: String,

        question: String,

        /// Maximum number of results (default from config)
        #[arg(short, long, value_parser = parse_limit)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count source files that parse successfully
    FilesCount {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Count the vectors an update would store
    Points {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Print the effective configuration
    Config,
}

fn parse_limit(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("limit must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(e) => Err(e.to_string()),
    }
}

/// Parse arguments, load configuration and run one command.
///
/// A failed command is returned as an error so the process exits non-zero.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = CodevecConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    debug!("Loaded config: {:?}", config.qdrant);

    let output = execute(cli.command, &config).await?;
    println!("{}", output);
    Ok(())
}

/// Run `command` and return its text output.
pub async fn execute(command: Commands, config: &CodevecConfig) -> Result<String> {
    let output = match command {
        Commands::Update { project, path } => {
            build_tools(config)?
                .try_update_codebase(&project, &path)
                .await?
        }
        Commands::Query {
            project,
            question,
            limit,
            json,
        } => {
            let tools = build_tools(config)?;
            if json {
                tools.read_codebase_json(&project, &question, limit).await?
            } else {
                tools.read_codebase(&project, &question, limit).await
            }
        }
        Commands::FilesCount { path } => {
            let (mut parser, walker) = build_parser(config)?;
            tools::files_count(&mut parser, &walker, &path)
        }
        Commands::Points { path } => {
            let (mut parser, walker) = build_parser(config)?;
            tools::get_points_for_vector(&mut parser, &walker, &path)
        }
        Commands::Config => config.to_redacted_toml()?,
    };

    Ok(output)
}

/// Logs go to stderr; `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_parser(config: &CodevecConfig) -> Result<(JavaParser, SourceWalker)> {
    let parser = JavaParser::new(ParserConfig {
        max_file_lines: config.parser.max_file_lines,
    })
    .context("Failed to initialize Java parser")?;
    let walker = SourceWalker::new(
        config.walker.extensions.clone(),
        config.walker.ignored_dirs.clone(),
    );
    Ok((parser, walker))
}

fn build_tools(config: &CodevecConfig) -> Result<CodebaseTools<HttpEmbeddings, QdrantStore>> {
    let api_key = config
        .embeddings
        .resolve_api_key()
        .context("Failed to resolve embedding API key")?;

    let embeddings = HttpEmbeddings::new(HttpEmbeddingsConfig {
        api_key,
        model: config.embeddings.model.clone(),
        dimensions: config.embeddings.dimensions,
        base_url: config.embeddings.base_url.clone(),
        timeout: Duration::from_secs(config.embeddings.timeout_secs),
        max_batch_size: config.embeddings.max_batch_size,
        max_retries: config.embeddings.max_retries,
    })
    .context("Failed to create embedding provider")?;

    let store = QdrantStore::from_config(&QdrantConfig {
        url: config.qdrant.url.clone(),
        api_key: resolve_env_value(&config.qdrant.api_key)
            .context("Failed to resolve Qdrant API key")?,
    })?;

    let (parser, walker) = build_parser(config)?;

    Ok(CodebaseTools::new(
        Arc::new(embeddings),
        Arc::new(store),
        parser,
        walker,
        &config.qdrant.collection_name,
        config.query.default_limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_with_global_flags() {
        let cli = Cli::try_parse_from([
            "codevec", "query", "svc", "where is auth?", "--limit", "3", "--verbose", "--config",
            "/tmp/c.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        match cli.command {
            Commands::Query {
                project,
                question,
                limit,
                json,
            } => {
                assert_eq!(project, "svc");
                assert_eq!(question, "where is auth?");
                assert_eq!(limit, Some(3));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_files_count_defaults_to_cwd() {
        let cli = Cli::try_parse_from(["codevec", "files-count"]).unwrap();
        assert!(matches!(cli.command, Commands::FilesCount { ref path } if path == "."));
    }

    #[test]
    fn test_query_limit_must_be_positive() {
        assert!(Cli::try_parse_from(["codevec", "query", "svc", "q", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["codevec", "query", "svc", "q", "-l", "abc"]).is_err());

        let cli = Cli::try_parse_from(["codevec", "query", "svc", "q", "-l", "1"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { limit: Some(1), .. }));
    }

    #[test]
    fn test_update_requires_path() {
        assert!(Cli::try_parse_from(["codevec", "update", "svc"]).is_err());
    }
}
