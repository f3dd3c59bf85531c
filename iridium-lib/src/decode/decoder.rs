use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, unbounded, Receiver};
use tracing::debug;

use super::{decode_line, Record};
use crate::Result;

/// Decodes capture lines into [`Record`]s, in input order.
///
/// Lines are independent, so the actual decoding fans out over a worker
/// pool; results are delivered in the order the lines were read.
///
/// # Examples
/// ```no_run
/// use std::io::BufRead;
///
/// use iridium::Decoder;
///
/// let lines = std::io::BufReader::new(std::io::stdin())
///     .lines()
///     .map_while(Result::ok);
/// for zult in Decoder::new().decode(lines) {
///     match zult {
///         Ok(record) => println!("{record}"),
///         Err(err) => eprintln!("{err}"),
///     }
/// }
/// ```
#[derive(Default)]
pub struct Decoder {
    num_threads: Option<usize>,
}

impl Decoder {
    const DEFAULT_BUFFER_SIZE: usize = 1024;

    #[must_use]
    pub fn new() -> Self {
        Decoder { num_threads: None }
    }

    #[must_use]
    pub fn with_threads(mut self, num: usize) -> Self {
        self.num_threads = Some(num);
        self
    }

    /// Returns an iterator over decoded records in input order.
    ///
    /// Decoding runs in a background thread feeding a worker pool; each
    /// line's result is delivered through its own channel so order is
    /// preserved without blocking the pool.
    ///
    /// # Errors
    /// Iterator items are `Err` for lines that do not match the capture
    /// schema; decoding continues with the next line.
    pub fn decode<L>(self, lines: L) -> impl Iterator<Item = Result<Record>>
    where
        L: Iterator<Item = String> + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = bounded(Self::DEFAULT_BUFFER_SIZE);

        let handle = thread::Builder::new()
            .name("burst_decoder".into())
            .spawn(move || {
                let pool = {
                    let mut pool = rayon::ThreadPoolBuilder::new();
                    if let Some(num) = self.num_threads {
                        pool = pool.num_threads(num);
                    }
                    pool
                }
                .build()
                .expect("failed to construct decode threadpool with requested number of threads");

                for (idx, line) in lines.enumerate() {
                    let (future_tx, future_rx) = unbounded();

                    // spawn_fifo keeps completion order aligned with input
                    pool.spawn_fifo(move || {
                        if future_tx.send(decode_line(&line)).is_err() {
                            debug!(line_idx = idx, "failed to send decoded record");
                        }
                    });

                    if jobs_tx.send(future_rx).is_err() {
                        debug!("failed to send record future");
                        break;
                    }
                }
            })
            .unwrap();

        DecodedRecordIter {
            jobs: jobs_rx,
            handle: Some(handle),
        }
    }
}

/// Provides [`Record`]s in input order. Created by ``Decoder::decode``.
struct DecodedRecordIter {
    jobs: Receiver<Receiver<Result<Record>>>,
    handle: Option<JoinHandle<()>>,
}

impl Iterator for DecodedRecordIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.jobs.recv() {
            Err(_) => {
                if let Some(handle) = self.handle.take() {
                    handle.join().expect("burst decoder thread panicked");
                }
                None
            }
            Ok(rx) => Some(rx.recv().expect("failed to receive record future")),
        }
    }
}
