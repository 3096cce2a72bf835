use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use static_site::{StackTarget, StaticSiteProps, StaticSiteStack, BUCKET_NAME_OUTPUT};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "static-site")]
#[command(about = "Builds and deploys the cloudformation stack behind a static website")]
struct Cli {
    /// Log more. Repeat for debug and trace output. RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Context value, eg: -c repo_name=blog
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE", global = true)]
    context: Vec<String>,

    /// JSON file with a "context" object. Defaults to ./cdk.json when present
    #[arg(long, global = true)]
    context_file: Option<PathBuf>,

    /// .env file to load before reading the environment. Defaults to ./.env when present
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Write the template without deploying it
    Synth {
        #[arg(short, long, default_value = "cdk.out")]
        out_dir: PathBuf,

        /// Print the template instead of writing it
        #[arg(long)]
        stdout: bool,
    },
    /// Create or update the stack and print its outputs
    Deploy,
    /// Delete the stack, including the bucket and its contents
    Destroy,
    /// Print the outputs of the deployed stack
    Outputs,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_outputs(outputs: &aws_cfn_stack::StackOutputs) {
    for (key, value) in outputs {
        println!("{key} = {value}");
    }
}

async fn previous_bucket_suffix(
    client: &aws_cfn_stack::Client,
    stack_name: &str,
    repo_name: &str,
) -> anyhow::Result<Option<String>> {
    if !aws_cfn_stack::does_stack_exist(client, stack_name).await? {
        return Ok(None);
    }
    let outputs = aws_cfn_stack::stack_outputs(client, stack_name).await?;
    Ok(outputs.get(BUCKET_NAME_OUTPUT)
        .and_then(|bucket| static_site::bucket_suffix(repo_name, bucket))
        .map(str::to_string))
}

async fn deploy(props: &StaticSiteProps) -> anyhow::Result<()> {
    let stack_name = static_site::checked_stack_name(&props.repo_name)?;
    let client = aws_cfn_stack::make_client(props.region.as_deref()).await;
    let site = match previous_bucket_suffix(&client, &stack_name, &props.repo_name).await? {
        Some(suffix) => {
            info!(stack = %stack_name, suffix = %suffix, "keeping existing bucket");
            StaticSiteStack::with_bucket_suffix(props, &suffix)?
        }
        None => StaticSiteStack::new(props)?,
    };
    let stack = site.synth()?;
    let outputs = aws_cfn_stack::deploy(&client, &stack).await
        .with_context(|| format!("Failed to deploy {stack_name}"))?;
    print_outputs(&outputs);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let context = static_site::load_context(cli.context_file.as_deref(), &cli.context)?;
    let env_file = cli.env_file.as_deref();
    match cli.command {
        Commands::Synth { out_dir, stdout } => {
            let props = StaticSiteProps::from_env(&context, env_file)?;
            let stack = StaticSiteStack::new(&props)?.synth()?;
            if stdout {
                println!("{}", stack.to_json_pretty()?);
            } else {
                let path = stack.write_to_dir(&out_dir)?;
                println!("Wrote {}", path.display());
            }
        }
        Commands::Deploy => deploy(&StaticSiteProps::from_env(&context, env_file)?).await?,
        Commands::Destroy => {
            let target = StackTarget::from_env(&context, env_file)?;
            let stack_name = static_site::checked_stack_name(&target.repo_name)?;
            let client = aws_cfn_stack::make_client(target.region.as_deref()).await;
            aws_cfn_stack::delete_stack(&client, &stack_name).await
                .with_context(|| format!("Failed to destroy {stack_name}"))?;
        }
        Commands::Outputs => {
            let target = StackTarget::from_env(&context, env_file)?;
            let stack_name = static_site::checked_stack_name(&target.repo_name)?;
            let client = aws_cfn_stack::make_client(target.region.as_deref()).await;
            let outputs = aws_cfn_stack::stack_outputs(&client, &stack_name).await?;
            print_outputs(&outputs);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
