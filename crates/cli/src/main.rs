use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use forum_client::{ClientConfig, Forum, Preload, SessionPayload};
use forum_protocol::serialize_json;
use forum_stream::DiscussionPage;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

mod report;

#[derive(Parser)]
#[command(name = "forum")]
#[command(about = "Read discussions and sync read position from the terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Forum root URL (overrides FORUM_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API key sent as `Authorization: Token <key>` (overrides FORUM_API_TOKEN)
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Act as this user id (overrides FORUM_USER_ID)
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Posts per page (overrides FORUM_PAGE_SIZE)
    #[arg(long, global = true)]
    page_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a discussion and print the loaded posts
    Show(ShowArgs),

    /// Advance the read position of a discussion
    #[command(name = "mark-read")]
    MarkRead(MarkReadArgs),
}

#[derive(Args)]
struct ShowArgs {
    /// Discussion id or slug
    discussion: String,

    /// Post number to jump to
    #[arg(long)]
    near: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MarkReadArgs {
    /// Discussion id or slug
    discussion: String,

    /// Last post number that has been read
    #[arg(long)]
    up_to: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers.
    if matches!(&cli.command, Commands::Show(args) if args.json) {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(&cli)?;
    let user_id = cli
        .user_id
        .clone()
        .or_else(|| env::var("FORUM_USER_ID").ok())
        .filter(|id| !id.trim().is_empty());

    match cli.command {
        Commands::Show(args) => run_show(args, config, user_id).await?,
        Commands::MarkRead(args) => run_mark_read(args, config, user_id).await?,
    }

    Ok(())
}

/// Config file, then `FORUM_*` environment, then flags.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    let mut config = config
        .apply_env(|key| env::var(key).ok())
        .context("Invalid FORUM_* environment")?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(token) = &cli.api_token {
        config.api_token = Some(token.clone());
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn boot(config: ClientConfig, user_id: Option<String>) -> Result<Forum> {
    let preload = Preload {
        session: Some(SessionPayload {
            user_id,
            csrf_token: String::new(),
        }),
        documents: Vec::new(),
    };
    Forum::boot(config, preload).context("Failed to start forum client")
}

async fn open_page(forum: &Forum, discussion: &str, near: Option<u64>) -> Result<DiscussionPage> {
    DiscussionPage::open_with_page_size(
        Arc::new(forum.api().clone()),
        forum.session().clone(),
        discussion,
        near,
        forum.config().page_size,
    )
    .await
    .with_context(|| format!("Failed to open discussion {discussion}"))
}

async fn run_show(args: ShowArgs, config: ClientConfig, user_id: Option<String>) -> Result<()> {
    let forum = boot(config, user_id)?;
    let page = open_page(&forum, &args.discussion, args.near).await?;

    let stream = page.stream();
    let posts = stream.posts();
    let out = forum
        .store()
        .read(|registry| {
            report::build_show_output(
                registry,
                page.discussion(),
                &posts,
                page.near(),
                stream.visible_range(),
            )
        })
        .with_context(|| format!("Discussion {} vanished from the store", page.discussion()))?;

    if args.json {
        println!("{}", serialize_json(&out)?);
    } else {
        print!("{}", report::render_text(&out));
    }
    Ok(())
}

async fn run_mark_read(
    args: MarkReadArgs,
    config: ClientConfig,
    user_id: Option<String>,
) -> Result<()> {
    if user_id.is_none() {
        bail!("mark-read needs a user: pass --user-id or set FORUM_USER_ID");
    }
    let forum = boot(config, user_id)?;
    let page = open_page(&forum, &args.discussion, Some(args.up_to)).await?;

    let sent = page
        .on_position_change(args.up_to, args.up_to)
        .await
        .context("Failed to save read position")?;
    let last_read = forum
        .store()
        .get(page.discussion())
        .and_then(|r| r.attribute("lastReadPostNumber").cloned())
        .unwrap_or_default();

    if sent {
        println!("{}: read up to post {last_read}", page.discussion());
    } else {
        println!(
            "{}: already read up to post {last_read}, nothing to do",
            page.discussion()
        );
    }
    Ok(())
}
