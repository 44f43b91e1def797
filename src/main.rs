use async_dispatcher::{job_fn, Config, DispatchError, Dispatcher};
use tokio::runtime::Builder;
use std::time::Instant;
use tracing_subscriber::EnvFilter;


fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let defaults = Config::default();
    let workers = args
        .next()
        .map(|s| s.parse::<usize>())
        .transpose()?
        .unwrap_or(defaults.max_workers);
    let jobs = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(1_000_000);

    let rt = Builder::new_multi_thread()
    .enable_all()
    .build()?;

    rt.block_on(async move {
        let now = Instant::now();
        let dispatcher = Dispatcher::with_config(Config {
            max_workers: workers,
            ..defaults
        })?;
        dispatcher.run()?;

        for i in 0..jobs {
            dispatcher
                .enqueue(job_fn(move || async move {
                    if i % 1000 == 0 {
                        return Err(format!("job {i} rejected"));
                    }
                    Ok(i)
                }))
                .await?;
        }

        let metrics = dispatcher.metrics();
        let (results, errors) = dispatcher.wait().await?;
        println!(
            "elapsed: {:?}, results: {}, errors: {}, submitted: {}",
            now.elapsed(),
            results.len(),
            errors.len(),
            metrics.submitted
        );
        Ok::<_, DispatchError>(())
    })?;

    Ok(())
}
