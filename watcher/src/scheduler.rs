use crate::api::{Provider, RateLimitFlag, Result, Snapshot};
use crate::config::Config;
use crate::display::{draw, Frame, Throbber};
use log::{info, log, Level};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Published = Option<Arc<Snapshot>>;

/// Rendered frames are mirrored to the log at this level.
pub const FRAME_LOG_LEVEL: Level = Level::Info;

/// Keeps refreshing provider data and redrawing it, each on its own period.
pub struct Watcher<P: Provider> {
    provider: P,
    update_interval: Duration,
    render_interval: Duration,
    size_top_table: usize,
}

impl<P> Watcher<P>
where
    P: 'static + Provider,
{
    pub fn new(provider: P, config: &Config) -> Self {
        Watcher {
            provider,
            update_interval: config.update_interval,
            render_interval: config.render_interval,
            size_top_table: config.size_top_table,
        }
    }

    /// Runs until `shutdown` resolves or a refresh fails.
    ///
    /// A failed refresh ends both loops and is returned as is.
    pub async fn run<W, S>(self, out: W, shutdown: S) -> Result<()>
    where
        W: 'static + Write + Send,
        S: Future<Output = ()>,
    {
        let (sender, receiver) = watch::channel::<Published>(None);
        let rate_limit = self.provider.rate_limit();
        let mut refresh = tokio::spawn(Self::refresh(
            self.provider,
            sender,
            self.update_interval,
            self.size_top_table,
        ));
        let mut render = tokio::spawn(render(receiver, rate_limit, self.render_interval, out));

        let result = tokio::select! {
            result = &mut refresh => flatten(result),
            result = &mut render => flatten(result),
            _ = shutdown => {
                info!("Shutting down");
                Ok(())
            }
        };
        refresh.abort();
        render.abort();
        result
    }

    async fn refresh(
        mut provider: P,
        sender: watch::Sender<Published>,
        update_interval: Duration,
        size_top_table: usize,
    ) -> Result<()> {
        loop {
            provider.refresh_status().await?;
            provider.refresh_contributors().await?;
            let snapshot = provider.snapshot(size_top_table);
            info!(
                "Refreshed: {} contributors, {} open pull requests, {} open issues",
                snapshot.contributors.len(),
                snapshot.pulls.opened,
                snapshot.issues.opened
            );
            sender.send_replace(Some(Arc::new(snapshot)));
            tokio::time::sleep(update_interval).await;
        }
    }
}

async fn render<W: Write>(
    receiver: watch::Receiver<Published>,
    rate_limit: RateLimitFlag,
    render_interval: Duration,
    mut out: W,
) -> Result<()> {
    let mut throbber = Throbber::default();
    loop {
        tokio::time::sleep(render_interval).await;
        let snapshot = receiver.borrow().clone();
        let frame = Frame::new(snapshot, rate_limit.is_raised(), throbber.next().unwrap_or(' '));
        draw(&mut out, &frame)?;
        log!(FRAME_LOG_LEVEL, "\n{}", frame);
    }
}

fn flatten(result: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    result.map_err(anyhow::Error::from)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Contributor, StatusTally};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn frames(&self) -> Vec<String> {
            let out = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            out.split("\u{1b}[2J").filter(|frame| !frame.is_empty()).map(String::from).collect()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Takes 500ms to refresh, fails on `fail_on` cycle if set.
    struct SlowProvider {
        cycles: Arc<AtomicU32>,
        fail_on: Option<u32>,
        rate_limit: RateLimitFlag,
    }

    #[async_trait]
    impl Provider for SlowProvider {
        async fn refresh_status(&mut self) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }

        async fn refresh_contributors(&mut self) -> Result<()> {
            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(cycle) {
                return Err(crate::api::Error::RetriesExhausted {
                    attempts: 2,
                    url: "/repos/o/r/commits".to_string(),
                });
            }
            Ok(())
        }

        fn snapshot(&self, top: usize) -> Snapshot {
            let cycles = self.cycles.load(Ordering::SeqCst);
            let contributors = vec![Contributor::new(format!("cycle-{}", cycles), String::new(), cycles)];
            Snapshot::new(contributors.into_iter().take(top).collect(), StatusTally::new(cycles, 0, 0), StatusTally::default())
        }

        fn rate_limit(&self) -> RateLimitFlag {
            self.rate_limit.clone()
        }
    }

    fn config() -> Config {
        let mut config = Config::new("https://github.com/o/r".parse().unwrap());
        config.update_interval = Duration::from_secs(2);
        config.render_interval = Duration::from_millis(300);
        config
    }

    #[test]
    fn frames_logged_under_default_filter_test() {
        assert!(FRAME_LOG_LEVEL <= log::LevelFilter::Info);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_then_refreshed_frames_test() {
        let cycles = Arc::new(AtomicU32::new(0));
        let rate_limit = RateLimitFlag::default();
        rate_limit.raise();
        let provider = SlowProvider {
            cycles: cycles.clone(),
            fail_on: None,
            rate_limit,
        };
        let out = SharedOutput::default();
        let watcher = Watcher::new(provider, &config());

        watcher
            .run(out.clone(), tokio::time::sleep(Duration::from_millis(1000)))
            .await
            .unwrap();

        let frames = out.frames();
        assert_eq!(frames.len(), 3, "Frames at 300ms, 600ms and 900ms expected");
        assert!(frames[0].contains("Loading ..."));
        assert!(frames[0].contains("⠇"));
        assert!(frames[1].contains("cycle-1"));
        assert!(frames[1].contains("PR opened - 1"));
        assert!(!frames[1].contains("Loading"));
        assert!(frames[2].contains("Ø"));
        assert_eq!(cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_stops_watcher_test() {
        let cycles = Arc::new(AtomicU32::new(0));
        let provider = SlowProvider {
            cycles: cycles.clone(),
            fail_on: Some(2),
            rate_limit: RateLimitFlag::default(),
        };
        let watcher = Watcher::new(provider, &config());

        let result = watcher
            .run(SharedOutput::default(), tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert!(matches!(result, Err(crate::api::Error::RetriesExhausted { .. })));
        assert_eq!(cycles.load(Ordering::SeqCst), 2);
    }
}
