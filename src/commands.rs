use framestore::proto::Frame;
use framestore::queue::QueueStore;
use tracing::info;
use uuid::Uuid;

use crate::cli::{Commands, EnqueueArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn run(store: &QueueStore, command: Commands) -> Result<(), AnyError> {
    match command {
        Commands::Enqueue(args) => enqueue(store, args)?,
        Commands::Dequeue(args) => match store.dequeue(&args.destination)? {
            Some(frame) => {
                println!("{}", frame.message_id);
                for (name, value) in &frame.headers {
                    println!("{}: {}", name, value);
                }
                println!();
                println!("{}", String::from_utf8_lossy(&frame.body));
            }
            None => info!(destination = %args.destination, "No frames pending"),
        },
        Commands::Size(args) => println!("{}", store.size(&args.destination)?),
        Commands::Stats => {
            let stats = store.stats()?;
            for destination in &stats.destinations {
                println!(
                    "{}\tdepth={}\tenqueued={}\tdequeued={}",
                    destination.destination,
                    destination.depth,
                    destination.enqueued,
                    destination.dequeued
                );
            }
            println!(
                "archived_frames={} unflushed_operations={} since_last_checkpoint={:?}",
                stats.archived_frames, stats.unflushed_operations, stats.since_last_checkpoint
            );
        }
        Commands::Purge(args) => {
            let purged = store.purge(&args.destination)?;
            println!("{}", purged);
        }
        Commands::Checkpoint => store.checkpoint()?,
    }

    Ok(())
}

fn enqueue(store: &QueueStore, args: EnqueueArgs) -> Result<(), AnyError> {
    let message_id = args.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut frame = Frame::new(message_id.clone(), args.body);
    frame.headers.extend(args.headers);

    store.enqueue(&args.destination, frame)?;
    println!("{}", message_id);
    Ok(())
}
