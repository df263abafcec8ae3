mod args;

pub use args::Args;
use git_watcher::api::{ProviderState, Result};
use git_watcher::{Config, Watcher};
use github_client::{GithubClientBuilder, GithubProvider};
use log::info;
use std::future::Future;
use std::io::Write;

pub fn github_provider(config: &Config) -> Result<GithubProvider> {
    let state = ProviderState::new(config.destination.clone(), config.window, config.branch.clone());
    GithubClientBuilder::from_config(config).build(state)
}

/// Watches the repository given by `args`, drawing to `out` until `shutdown` resolves.
pub async fn watch<W, S>(args: Args, out: W, shutdown: S) -> Result<()>
where
    W: 'static + Write + Send,
    S: Future<Output = ()>,
{
    let config = args.config();
    info!(
        "Watching {}/{} on {}",
        config.destination.owner, config.destination.repo, config.branch
    );
    let provider = github_provider(&config)?;
    Watcher::new(provider, &config).run(out, shutdown).await
}
