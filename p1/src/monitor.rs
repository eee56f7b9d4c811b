//! Monitor loop: acquire, parse and publish telegrams one after another

use p1_core::{P1Error, P1Result};
use p1_publish::Publisher;
use p1_telegram::{ChecksumStatus, FrameReader, Telegram, TelegramStatistics};
use p1_transport::LineSource;
use std::time::Duration;

/// Delay before the first retry after a failed read
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound of the doubling retry delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Consecutive failed reads after which [`Monitor::run`] gives up
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Sequential acquisition pipeline
///
/// Each iteration owns its frame and record exclusively: the frame reader
/// produces a frame, the parser turns it into a telegram, and the record is
/// lent to the publisher before the next frame is read.
#[derive(Debug)]
pub struct Monitor<S, P> {
    source: S,
    publisher: P,
    reader: FrameReader,
    statistics: TelegramStatistics,
    warned_unchecked: bool,
    retry_delay: Duration,
    max_consecutive_failures: u32,
}

impl<S: LineSource, P: Publisher> Monitor<S, P> {
    pub fn new(source: S, publisher: P) -> Self {
        Self {
            source,
            publisher,
            reader: FrameReader::new(),
            statistics: TelegramStatistics::new(),
            warned_unchecked: false,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Set the retry policy for failed reads
    ///
    /// # Arguments
    /// * `retry_delay` - Wait after the first failure; doubles per further
    ///   failure up to [`MAX_RETRY_DELAY`]
    /// * `max_consecutive_failures` - Failed reads in a row before `run` returns
    pub fn with_retry(mut self, retry_delay: Duration, max_consecutive_failures: u32) -> Self {
        self.retry_delay = retry_delay;
        self.max_consecutive_failures = max_consecutive_failures.max(1);
        self
    }

    pub fn with_frame_reader(mut self, reader: FrameReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn statistics(&self) -> &TelegramStatistics {
        &self.statistics
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_parts(self) -> (S, P) {
        (self.source, self.publisher)
    }

    /// Acquire, parse and publish exactly one telegram
    ///
    /// Every outcome is counted in the statistics. A publish failure is
    /// returned after the telegram itself has been counted as accepted.
    pub async fn run_once(&mut self) -> P1Result<Telegram> {
        let telegram = match self.acquire().await {
            Ok(telegram) => telegram,
            Err(e) => {
                self.statistics.record_error(&e);
                return Err(e);
            }
        };

        self.statistics.record_accepted(telegram.checksum());
        if telegram.checksum() == ChecksumStatus::Unchecked && !self.warned_unchecked {
            log::warn!("Meter sends telegrams without checksum; readings are not integrity checked");
            self.warned_unchecked = true;
        }

        if let Err(e) = self.publisher.publish(telegram.record()).await {
            self.statistics.record_error(&e);
            return Err(e);
        }

        Ok(telegram)
    }

    async fn acquire(&mut self) -> P1Result<Telegram> {
        let frame = self.reader.read_one_frame(&mut self.source).await?;
        Telegram::parse(&frame)
    }

    /// Run until the line source ends
    ///
    /// A failed frame is logged and skipped; one corrupt telegram does not
    /// stop monitoring. Read timeouts are retried at once, since the read
    /// itself already waited. Other I/O failures back off with a doubling
    /// delay, and after `max_consecutive_failures` of them in a row the last
    /// error is returned.
    pub async fn run(&mut self) -> P1Result<()> {
        let mut consecutive_failures = 0u32;

        loop {
            let result = self.run_once().await;
            let failed_read = matches!(&result, Err(P1Error::Acquisition(_)));

            match result {
                Ok(telegram) => {
                    log::debug!(
                        "Published telegram from {} ({})",
                        telegram.identification().unwrap_or("unknown meter"),
                        telegram.checksum()
                    );
                }
                Err(e) if e.is_end_of_stream() => {
                    log::info!("Line source closed: {}", e);
                    return Ok(());
                }
                Err(P1Error::Timeout) => {
                    log::warn!("No telegram line within the read timeout");
                }
                Err(e @ P1Error::Acquisition(_)) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.max_consecutive_failures {
                        log::error!(
                            "Giving up after {} failed reads in a row: {}",
                            consecutive_failures,
                            e
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(consecutive_failures);
                    log::warn!(
                        "Telegram acquisition failed ({}/{}), retrying in {:?}: {}",
                        consecutive_failures,
                        self.max_consecutive_failures,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e @ P1Error::Publish(_)) => {
                    log::warn!("Telegram accepted but not published: {}", e);
                }
                Err(e) => {
                    log::warn!("Telegram rejected ({}): {}", e.kind(), e);
                }
            }

            if !failed_read {
                consecutive_failures = 0;
            }
        }
    }

    fn backoff(&self, consecutive_failures: u32) -> Duration {
        let factor = 1u32 << (consecutive_failures.saturating_sub(1)).min(16);
        self.retry_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use p1_telegram::{FieldId, TelegramBuilder, TelegramRecord};
    use p1_transport::LineReader;

    #[derive(Default)]
    struct Collect {
        records: Vec<TelegramRecord>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for Collect {
        async fn publish(&mut self, record: &TelegramRecord) -> P1Result<()> {
            if self.fail {
                return Err(P1Error::Publish("sink down".to_string()));
            }
            self.records.push(*record);
            Ok(())
        }
    }

    fn stream(frames: &[Vec<u8>]) -> Vec<u8> {
        frames.concat()
    }

    #[tokio::test]
    async fn test_run_continues_after_bad_telegram() {
        let good = TelegramBuilder::new("ISK5").field(FieldId::ImportedT1, 1.0).build_bytes();
        let mut bad = good.clone();
        let len = bad.len();
        bad[len - 3] = if bad[len - 3] == b'0' { b'1' } else { b'0' };
        let unchecked = TelegramBuilder::new("ISK5").field(FieldId::ImportedT1, 2.0).unchecked().build_bytes();

        let data = stream(&[good, bad, unchecked]);
        let mut monitor = Monitor::new(LineReader::new(&data[..]), Collect::default());
        monitor.run().await.unwrap();

        let stats = monitor.statistics().clone();
        assert_eq!(stats.telegrams_verified, 1);
        assert_eq!(stats.telegrams_unchecked, 1);
        assert_eq!(stats.checksum_errors, 1);
        assert_eq!(stats.acquisition_errors, 1);

        let (_, publisher) = monitor.into_parts();
        let values: Vec<Option<f64>> = publisher.records.iter().map(|r| r.get(FieldId::ImportedT1)).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0)]);
    }

    #[tokio::test]
    async fn test_run_once_counts_publish_failure() {
        let data = TelegramBuilder::new("ISK5").build_bytes();
        let publisher = Collect { fail: true, ..Default::default() };
        let mut monitor = Monitor::new(LineReader::new(&data[..]), publisher);

        let err = monitor.run_once().await.unwrap_err();
        assert!(matches!(err, P1Error::Publish(_)));
        assert_eq!(monitor.statistics().telegrams_verified, 1);
        assert_eq!(monitor.statistics().publish_errors, 1);
    }

    #[tokio::test]
    async fn test_run_keeps_accepting_while_publishing_fails() {
        let frame = TelegramBuilder::new("ISK5").field(FieldId::ImportedT1, 1.0).build_bytes();
        let data = stream(&[frame.clone(), frame.clone(), frame]);
        let publisher = Collect { fail: true, ..Default::default() };
        let mut monitor = Monitor::new(LineReader::new(&data[..]), publisher).with_retry(Duration::ZERO, 1);

        monitor.run().await.unwrap();

        let stats = monitor.statistics();
        assert_eq!(stats.telegrams_verified, 3);
        assert_eq!(stats.publish_errors, 3);
        // only the end of stream
        assert_eq!(stats.acquisition_errors, 1);
    }

    /// Source whose every read fails with the given I/O error kind
    struct Failing {
        kind: std::io::ErrorKind,
        reads: usize,
    }

    #[async_trait]
    impl LineSource for Failing {
        async fn next_line(&mut self) -> P1Result<Vec<u8>> {
            self.reads += 1;
            Err(P1Error::Acquisition(std::io::Error::new(self.kind, "EIO")))
        }
    }

    #[tokio::test]
    async fn test_run_gives_up_on_persistent_read_failure() {
        let source = Failing { kind: std::io::ErrorKind::Other, reads: 0 };
        let mut monitor = Monitor::new(source, Collect::default()).with_retry(Duration::ZERO, 5);

        let err = tokio::time::timeout(Duration::from_secs(5), monitor.run())
            .await
            .expect("run must stop on its own")
            .unwrap_err();
        assert!(matches!(err, P1Error::Acquisition(_)));
        assert_eq!(monitor.statistics().acquisition_errors, 5);

        let (source, _) = monitor.into_parts();
        assert_eq!(source.reads, 5);
    }

    #[tokio::test]
    async fn test_failure_count_resets_after_a_good_telegram() {
        struct Flaky {
            script: Vec<Option<Vec<u8>>>,
        }

        #[async_trait]
        impl LineSource for Flaky {
            async fn next_line(&mut self) -> P1Result<Vec<u8>> {
                match self.script.pop() {
                    Some(Some(line)) => Ok(line),
                    Some(None) => Err(P1Error::Acquisition(std::io::Error::other("EIO"))),
                    None => Err(P1Error::Acquisition(std::io::ErrorKind::UnexpectedEof.into())),
                }
            }
        }

        let telegram = TelegramBuilder::new("ISK5").build_bytes();
        let lines: Vec<Vec<u8>> = telegram
            .split_inclusive(|&b| b == b'\n')
            .map(|l| l.to_vec())
            .collect();

        // two failures, a telegram, two failures: never three in a row
        let mut script: Vec<Option<Vec<u8>>> = vec![None, None];
        script.extend(lines.into_iter().map(Some));
        script.extend([None, None]);
        script.reverse();

        let mut monitor = Monitor::new(Flaky { script }, Collect::default()).with_retry(Duration::ZERO, 3);
        monitor.run().await.unwrap();
        assert_eq!(monitor.statistics().telegrams_verified, 1);
        assert_eq!(monitor.statistics().acquisition_errors, 5);
    }

    #[test]
    fn test_backoff_doubles_up_to_the_cap() {
        let monitor = Monitor::new(LineReader::new(&b""[..]), Collect::default());
        assert_eq!(monitor.backoff(1), Duration::from_secs(1));
        assert_eq!(monitor.backoff(2), Duration::from_secs(2));
        assert_eq!(monitor.backoff(4), Duration::from_secs(8));
        assert_eq!(monitor.backoff(9), MAX_RETRY_DELAY);
        assert_eq!(monitor.backoff(40), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_overflow_is_reported_and_skipped() {
        let mut data = b"/ISK5\r\n".to_vec();
        data.extend_from_slice(&b"\r\n".repeat(3));
        data.extend_from_slice(&TelegramBuilder::new("ISK5").build_bytes());

        let mut monitor = Monitor::new(LineReader::new(&data[..]), Collect::default())
            .with_frame_reader(FrameReader::with_max_lines(4));
        let err = monitor.run_once().await.unwrap_err();
        assert!(matches!(err, P1Error::FrameOverflow { lines: 4, limit: 4 }));

        // the remaining lines still hold a whole telegram
        let telegram = monitor.run_once().await.unwrap();
        assert!(telegram.checksum().is_verified());
        assert_eq!(monitor.statistics().frame_overflows, 1);
    }
}
