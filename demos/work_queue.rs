use lfring::LfQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    lfring::init_tracing();
    println!("Work Queue Example\n");

    const NUM_WORKERS: usize = 4;
    const NUM_JOBS: usize = 20;

    let jobs = Arc::new(LfQueue::<String>::with_capacity(4).unwrap());
    let results = Arc::new(LfQueue::<String>::with_capacity(4).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let jobs_tx = jobs.clone();
    let done_tx = done.clone();
    let producer = thread::spawn(move || {
        for i in 0..NUM_JOBS {
            let job = format!("Job-{:02}", i);
            println!("Enqueued: {}", job);
            jobs_tx.push(job).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        done_tx.store(true, Ordering::Release);
        println!("All jobs enqueued!");
    });

    let mut workers = vec![];
    for worker_id in 0..NUM_WORKERS {
        let jobs_rx = jobs.clone();
        let results_tx = results.clone();
        let done = done.clone();

        workers.push(thread::spawn(move || {
            let mut processed = 0;
            loop {
                match jobs_rx.pop() {
                    Some(job) => {
                        println!("Worker {} processing: {}", worker_id, job);
                        thread::sleep(Duration::from_millis(50));
                        results_tx
                            .push(format!("{} -> completed by worker {}", job, worker_id))
                            .unwrap();
                        processed += 1;
                    }
                    None => {
                        if done.load(Ordering::Acquire) && jobs_rx.is_empty() {
                            break;
                        }
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            }
            println!("Worker {} finished ({} jobs)", worker_id, processed);
        }));
    }

    let results_rx = results.clone();
    let collector = thread::spawn(move || {
        let mut collected = 0;
        while collected < NUM_JOBS {
            match results_rx.pop() {
                Some(result) => {
                    println!("Result: {}", result);
                    collected += 1;
                }
                None => std::hint::spin_loop(),
            }
        }
        println!("All results collected!");
    });

    producer.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    collector.join().unwrap();

    println!("\nWork queue example completed!");
}
