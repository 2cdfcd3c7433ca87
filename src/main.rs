//! Freeman engine runner - executes one request descriptor from the command line
//!
//! Usage: `freeman-engine <request.json> [--env <environment.yaml>] [--curl]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use freeman_engine::logging::init_file_logging;
use freeman_engine::{Environment, Request, RequestExecutor, RuntimeConfig, VariableResolver};

struct Args {
    request: PathBuf,
    environment: Option<PathBuf>,
    curl: bool,
}

fn parse_args() -> Result<Args> {
    let mut request = None;
    let mut environment = None;
    let mut curl = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--env" => {
                let path = args.next().context("--env needs a file path")?;
                environment = Some(PathBuf::from(path));
            }
            "--curl" => curl = true,
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            path => request = Some(PathBuf::from(path)),
        }
    }

    match request {
        Some(request) => Ok(Args {
            request,
            environment,
            curl,
        }),
        None => bail!("usage: freeman-engine <request.json> [--env <environment.yaml>] [--curl]"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to file
    let _guard = init_file_logging(".", "freeman.log");

    let args = parse_args()?;

    let content = std::fs::read_to_string(&args.request)
        .with_context(|| format!("reading {}", args.request.display()))?;
    let request: Request = serde_json::from_str(&content)
        .with_context(|| format!("parsing request in {}", args.request.display()))?;

    let environment: Option<Environment> = match &args.environment {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Some(
                serde_yaml::from_str(&content)
                    .with_context(|| format!("parsing environment in {}", path.display()))?,
            )
        }
        None => None,
    };
    let resolver = environment.as_ref().map(|env| env as &dyn VariableResolver);

    let executor = RequestExecutor::new(RuntimeConfig::load_default()?);
    tracing::info!(
        transport = executor.transport_kind().as_str(),
        request = %args.request.display(),
        "Runner started"
    );

    if args.curl {
        println!("{}", executor.build_curl_command(&request, resolver)?);
        return Ok(());
    }

    let envelope = executor.execute_request(&request, resolver, false).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
