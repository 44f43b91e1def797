#[cfg(test)]
mod tests {
    use async_dispatcher::{
        blocking_job,
        job_fn,
        parallel,
        BoxError,
        Config,
        Dispatcher,
    };
    use std::{
        future::Future,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    async fn measure<F, Fut, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_1_small_fast_jobs() {
        println!("\n=== LOAD TEST 1: 10k быстрых задач ===");
        let d = Dispatcher::with_config(Config::io_bound()).unwrap();
        d.run().unwrap();

        let (results, errors) = measure("10k jobs", || async {
            for i in 0..10_000_usize {
                d.enqueue(job_fn(move || async move { Ok::<_, BoxError>(i * 2) }))
                    .await
                    .unwrap();
            }
            d.wait().await.unwrap()
        })
        .await;

        assert_eq!(results.len(), 10_000);
        assert!(errors.is_empty());

        let mut sorted = results;
        sorted.sort_unstable();
        assert!(sorted.iter().enumerate().all(|(i, v)| *v == i * 2), "Ни один результат не потерян и не задвоен");

        let metrics = d.metrics();
        println!("  Успешно: {}/{}", metrics.completed, metrics.submitted);
        assert_eq!(metrics.pending, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_2_bounded_concurrency() {
        println!("\n=== LOAD TEST 2: одновременно работают не больше max_workers задач ===");
        let workers = 4;
        let d = Arc::new(Dispatcher::new(workers, 8).unwrap());
        d.run().unwrap();

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        measure("200 jobs @ 2ms", || async {
            for _ in 0..200 {
                let running = running.clone();
                let peak = peak.clone();
                d.enqueue(job_fn(move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                }))
                .await
                .unwrap();
            }
        })
        .await;

        let (results, _) = d.wait().await.unwrap();
        assert_eq!(results.len(), 200);
        let peak = peak.load(Ordering::SeqCst);
        println!("  Пик одновременных задач: {}", peak);
        assert!(peak <= workers, "Не больше {} задач одновременно", workers);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_3_mixed_failures() {
        println!("\n=== LOAD TEST 3: 5k задач, каждая седьмая падает ===");
        let d = Arc::new(Dispatcher::new(16, 64).unwrap());
        d.run().unwrap();

        let producers: Vec<_> = (0..5_usize)
            .map(|p| {
                let d = d.clone();
                tokio::spawn(async move {
                    for i in 0..1_000_usize {
                        let n = p * 1_000 + i;
                        d.enqueue(job_fn(move || async move {
                            if n % 7 == 0 {
                                return Err(format!("job {n} failed"));
                            }
                            Ok(n)
                        }))
                        .await
                        .unwrap();
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.await.unwrap();
        }

        let (results, errors) = measure("5k mixed jobs", || d.wait()).await.unwrap();
        let expected_failures = (0..5_000).filter(|n| n % 7 == 0).count();

        assert_eq!(errors.len(), expected_failures);
        assert_eq!(results.len() + errors.len(), 5_000);

        let metrics = d.metrics();
        println!("  Success rate: {:.1}%", metrics.success_rate() * 100.0);
        assert_eq!(metrics.failed, expected_failures);
        assert_eq!(metrics.finished(), metrics.submitted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_4_blocking_jobs() {
        println!("\n=== LOAD TEST 4: 1k блокирующих задач ===");
        let d = Dispatcher::with_config(Config::cpu_bound()).unwrap();
        d.run().unwrap();

        let (results, errors) = measure("1k blocking jobs", || async {
            for i in 0..1_000_u64 {
                d.enqueue(blocking_job(move || {
                    std::thread::sleep(Duration::from_micros(100));
                    Ok::<_, BoxError>((0..=i).sum::<u64>())
                }))
                .await
                .unwrap();
            }
            d.wait().await.unwrap()
        })
        .await;

        assert_eq!(results.len(), 1_000);
        assert!(errors.is_empty());
        assert_eq!(results.iter().max(), Some(&(999 * 1000 / 2)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn load_test_5_parallel_fan_out() {
        println!("\n=== LOAD TEST 5: parallel на 1k функциях ===");
        let counter = Arc::new(AtomicUsize::new(0));

        let errors = measure("1k parallel fns", || {
            parallel((0..1_000_usize).map(|i| {
                let counter = counter.clone();
                move || async move {
                    tokio::time::sleep(Duration::from_micros(50)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    if i % 100 == 0 {
                        return Err(format!("fn {i} failed"));
                    }
                    Ok(())
                }
            }))
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1_000);
        assert_eq!(errors.len(), 10);
    }
}
