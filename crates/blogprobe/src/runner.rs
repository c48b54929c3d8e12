use crate::client::{BlogClient, XmlRpcClient};
use crate::logging::RunLog;
use crate::prelude::{println, *};
use crate::probes::suite::default_suite;
use crate::probes::{run_probe, BlogTarget, RunOptions};
use blogprobe_core::catalog::{Provider, ProviderCatalog};
use blogprobe_core::config::{BlogCredentials, RunConfig};
use blogprobe_core::results::ProbeResults;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the provider capability catalog
    #[arg(long, env = "BLOGPROBE_PROVIDERS")]
    pub providers: PathBuf,

    /// Path to the blog credentials config
    #[arg(long, env = "BLOGPROBE_CONFIG")]
    pub config: PathBuf,

    /// Where the enriched provider catalog is written
    #[arg(long, env = "BLOGPROBE_OUTPUT")]
    pub output: PathBuf,

    /// Tee error output into this file
    #[arg(long)]
    pub error_log: Option<PathBuf>,

    /// Wait for Enter before exiting
    #[arg(long)]
    pub pause: bool,

    /// Seconds to wait for probe evidence on the homepage
    #[arg(long, default_value = "120")]
    pub timeout_secs: u64,

    /// Seconds between homepage polls
    #[arg(long, default_value = "1")]
    pub poll_interval_secs: u64,

    /// Leave probe posts on the blog instead of deleting them
    #[arg(long)]
    pub keep_posts: bool,

    /// Restrict the run to these provider ids
    pub provider_ids: Vec<String>,
}

pub async fn run(args: RunArgs, global: crate::Global) -> Result<()> {
    let log = RunLog::new(args.error_log.as_deref())?;

    let catalog_xml = std::fs::read_to_string(&args.providers)
        .map_err(|e| eyre!("Failed to read {}: {}", args.providers.display(), e))?;
    let mut catalog = ProviderCatalog::parse(&catalog_xml)
        .map_err(|e| eyre!("Failed to parse {}: {}", args.providers.display(), e))?;

    let config_xml = std::fs::read_to_string(&args.config)
        .map_err(|e| eyre!("Failed to read {}: {}", args.config.display(), e))?;
    let config = RunConfig::parse(&config_xml)
        .map_err(|e| eyre!("Failed to parse {}: {}", args.config.display(), e))?;

    // A config entry pointing at a provider the catalog does not know is a
    // configuration failure and aborts the whole run.
    for blog in &config.blogs {
        if catalog.provider(&blog.provider_id).is_none() {
            return Err(eyre!(
                "config references unknown provider id '{}'",
                blog.provider_id
            ));
        }
    }

    let options = RunOptions {
        cleanup: !args.keep_posts,
        timeout: Duration::from_secs(args.timeout_secs),
        poll_interval: Duration::from_secs(args.poll_interval_secs),
    };

    for provider in catalog.providers() {
        if !args.provider_ids.is_empty() && !args.provider_ids.contains(&provider.id) {
            continue;
        }
        let Some(credentials) = config.blog_for(&provider.id) else {
            log.error(&f!("{}: no config entry, skipping", provider.id));
            continue;
        };

        let provider_log = log.section(&f!("{} ({})", provider.name, provider.client_type));
        match probe_provider(&provider, credentials, &options, &provider_log, global.verbose)
            .await
        {
            Ok(results) => {
                catalog
                    .apply_results(&provider.id, &results)
                    .map_err(|e| eyre!("Failed to record results for {}: {}", provider.id, e))?;
                if global.verbose {
                    print_summary(&provider, &results);
                }
            }
            Err(err) => {
                provider_log.error(&f!("{}: {err:#}", provider.name));
            }
        }
    }

    std::fs::write(&args.output, catalog.to_xml())
        .map_err(|e| eyre!("Failed to write {}: {}", args.output.display(), e))?;
    log.info(&f!("wrote {}", args.output.display()));

    if args.pause {
        log.info("press Enter to exit");
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
    }

    Ok(())
}

/// Run the whole suite for one provider. Individual probe failures are
/// logged and swallowed so the remaining probes still run; only failures
/// before any probe can run (client construction, blog id resolution) abort
/// the provider.
async fn probe_provider(
    provider: &Provider,
    credentials: &BlogCredentials,
    options: &RunOptions,
    log: &RunLog,
    verbose: bool,
) -> Result<ProbeResults> {
    let client = XmlRpcClient::new(
        &credentials.api_url,
        &credentials.username,
        &credentials.password,
    )?;
    let blog_id = match &credentials.blog_id {
        Some(id) => id.clone(),
        // Resolved lazily and kept in memory for this run only.
        None => resolve_blog_id(&client).await?,
    };
    let target = BlogTarget {
        blog_id,
        homepage_url: credentials.homepage_url.clone(),
    };
    let http = reqwest::Client::new();

    let mut results = ProbeResults::new();
    for probe in default_suite(&provider.excluded_probes) {
        if verbose {
            log.info(probe.name());
        }
        if let Err(err) = run_probe(&probe, &client, &http, &target, &mut results, options).await
        {
            log.error(&f!(
                "{}: probe {} failed: {err:#}",
                provider.name,
                probe.name()
            ));
        }
    }
    Ok(results)
}

async fn resolve_blog_id(client: &dyn BlogClient) -> Result<String> {
    let blogs = client.get_users_blogs().await?;
    blogs
        .into_iter()
        .next()
        .map(|blog| blog.id)
        .ok_or_else(|| eyre!("account has no blogs to resolve a blog id from"))
}

fn print_summary(provider: &Provider, results: &ProbeResults) {
    println!("{}", provider.name);
    let mut table = new_table();
    for (key, value) in results.iter() {
        table.add_row(prettytable::row![key, value]);
    }
    table.printstd();
    println!();
}
