//! Simple usage example

use lfring::LfQueue;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    lfring::init_tracing();
    println!("lfring - Simple Example\n");

    // Start tiny so the producer forces a few doublings.
    let queue = Arc::new(LfQueue::<String>::with_pow2(1).unwrap());

    let producer_queue = queue.clone();
    let consumer_queue = queue.clone();

    let producer = thread::spawn(move || {
        for i in 0..10 {
            let message = format!("Message {}", i);
            println!("Pushing: {}", message);

            // Grows instead of failing when full.
            producer_queue.push(message).unwrap();

            // Small delay to make output readable
            thread::sleep(Duration::from_millis(20));
        }
        println!("Producer finished!");
    });

    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            loop {
                match consumer_queue.pop() {
                    Some(message) => {
                        println!("Popped: {}", message);
                        break;
                    }
                    None => std::hint::spin_loop(),
                }
            }
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();

    println!("\nFinal capacity: {}", queue.capacity());
    println!("Example completed successfully!");
}
