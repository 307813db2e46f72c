//! # Sample Collector
//!
//! Walks the skip/top cursor for one sample until a short page arrives.
//!
//! - `Ok(items)`: the page is kept and the offset advances by `items.len()`.
//!   A page shorter than the page size ends the sample.
//! - Transport failure: the same offset is retried.
//! - Server error: an empty page is recorded for the offset, so page indices
//!   stay contiguous, and the same offset is retried.
//!
//! Each failure class has its own `RetryPolicy`; running out of budget fails
//! the whole sample with `SampleError::PageFailed`.

use std::sync::Arc;

use crate::domain::{ListingQuery, Page, Sample};

use super::observer::{SamplingEvent, SamplingObserver};
use super::retry::RetryPolicies;
use super::{FailureKind, PageSource, SampleError};

pub struct SampleCollector {
    source: Arc<dyn PageSource>,
    query: ListingQuery,
    retry: RetryPolicies,
    observer: Arc<dyn SamplingObserver>,
}

impl SampleCollector {
    pub fn new(
        source: Arc<dyn PageSource>,
        query: ListingQuery,
        retry: RetryPolicies,
        observer: Arc<dyn SamplingObserver>,
    ) -> Self {
        Self {
            source,
            query,
            retry,
            observer,
        }
    }

    pub fn observer(&self) -> &dyn SamplingObserver {
        self.observer.as_ref()
    }

    pub async fn collect(&self, sample_id: &str) -> Result<Sample, SampleError> {
        self.observer.notify(&SamplingEvent::SampleStarted {
            sample_id: sample_id.to_owned(),
        });

        let page_size = self.query.page_size();
        let mut pages: Vec<Page> = Vec::new();
        let mut offset = 0;
        let mut transport_failures = 0;
        let mut server_failures = 0;

        loop {
            let request = self.query.page(offset);
            match self.source.fetch_page(&request).await {
                Ok(items) => {
                    transport_failures = 0;
                    server_failures = 0;

                    let fetched = items.len();
                    let page_index = pages.len();
                    self.observer.notify(&SamplingEvent::PageFetched {
                        sample_id: sample_id.to_owned(),
                        page_index,
                        offset,
                        items: fetched,
                    });
                    pages.push(Page::new(page_index, request, items));

                    offset += fetched;
                    if fetched < page_size {
                        break;
                    }
                }
                Err(error) => {
                    let kind = error.kind();
                    let (failures, policy, page_index) = match kind {
                        FailureKind::Transport => {
                            transport_failures += 1;
                            (transport_failures, &self.retry.transport, None)
                        }
                        FailureKind::ServerError => {
                            server_failures += 1;
                            let page_index = pages.len();
                            pages.push(Page::new(page_index, request, Vec::new()));
                            (server_failures, &self.retry.server_error, Some(page_index))
                        }
                    };

                    if policy.is_exhausted(failures) {
                        self.observer.notify(&SamplingEvent::PageFailed {
                            sample_id: sample_id.to_owned(),
                            page_index,
                            offset,
                            kind,
                            attempt: failures,
                            error: error.to_string(),
                            retry_in_ms: None,
                        });
                        return Err(SampleError::PageFailed {
                            offset,
                            attempts: failures,
                            last_error: error,
                        });
                    }

                    let delay = policy.delay_for(failures);
                    self.observer.notify(&SamplingEvent::PageFailed {
                        sample_id: sample_id.to_owned(),
                        page_index,
                        offset,
                        kind,
                        attempt: failures,
                        error: error.to_string(),
                        retry_in_ms: Some(delay.as_millis() as u64),
                    });
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let sample = Sample::new(pages);
        self.observer.notify(&SamplingEvent::SampleCompleted {
            sample_id: sample_id.to_owned(),
            pages: sample.pages().len(),
            items: sample.item_count(),
        });
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PageRequest, WorkItem};
    use crate::sampling::observer::ChannelObserver;
    use crate::sampling::retry::RetryPolicy;
    use crate::sampling::FetchError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted responses and records the offsets it was asked for
    struct Scripted {
        responses: Mutex<VecDeque<Result<Vec<WorkItem>, FetchError>>>,
        offsets: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<WorkItem>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                offsets: Mutex::new(Vec::new()),
            })
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for Scripted {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<WorkItem>, FetchError> {
            self.offsets.lock().unwrap().push(request.offset);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn items(prefix: &str, count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|n| WorkItem::new(format!("{prefix}{n}"), 0, 0, 15))
            .collect()
    }

    fn query(page_size: usize) -> ListingQuery {
        ListingQuery {
            resource_path: "/workItems".into(),
            top_param: "$top".into(),
            skip_param: "$skip".into(),
            fields: "id".into(),
            page_size,
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
        }
    }

    fn collector(source: Arc<Scripted>, page_size: usize, retry: RetryPolicies) -> SampleCollector {
        let (observer, _rx) = ChannelObserver::channel();
        SampleCollector::new(source, query(page_size), retry, Arc::new(observer))
    }

    fn immediate(max_attempts: u32) -> RetryPolicies {
        RetryPolicies {
            transport: RetryPolicy::immediate(max_attempts),
            server_error: RetryPolicy::immediate(max_attempts),
        }
    }

    #[tokio::test]
    async fn short_page_terminates_after_two_pages() {
        let source = Scripted::new(vec![Ok(items("a", 400)), Ok(items("b", 150))]);
        let sample = collector(source.clone(), 400, immediate(3))
            .collect("t1")
            .await
            .unwrap();

        assert_eq!(sample.pages().len(), 2);
        assert_eq!(sample.item_count(), 550);
        assert_eq!(source.offsets(), vec![0, 400]);
    }

    #[tokio::test]
    async fn full_last_page_needs_one_empty_page_to_finish() {
        let source = Scripted::new(vec![Ok(items("a", 2)), Ok(vec![])]);
        let sample = collector(source.clone(), 2, immediate(3))
            .collect("t1")
            .await
            .unwrap();
        assert_eq!(sample.pages().len(), 2);
        assert!(sample.pages()[1].items.is_empty());
        assert_eq!(source.offsets(), vec![0, 2]);
    }

    #[tokio::test]
    async fn transport_failure_retries_same_offset_without_recording_page() {
        let source = Scripted::new(vec![
            Ok(items("a", 2)),
            Err(FetchError::Transport("connection reset".into())),
            Err(FetchError::Transport("timed out".into())),
            Ok(items("b", 1)),
        ]);
        let sample = collector(source.clone(), 2, immediate(3))
            .collect("t1")
            .await
            .unwrap();

        assert_eq!(source.offsets(), vec![0, 2, 2, 2]);
        let indices: Vec<usize> = sample.pages().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(sample.item_count(), 3);
    }

    #[tokio::test]
    async fn server_error_records_empty_page_and_retries_same_offset() {
        let source = Scripted::new(vec![
            Ok(items("a", 2)),
            Err(FetchError::ServerError {
                status: 503,
                body: "busy".into(),
            }),
            Ok(items("b", 1)),
        ]);
        let sample = collector(source.clone(), 2, immediate(3))
            .collect("t1")
            .await
            .unwrap();

        assert_eq!(source.offsets(), vec![0, 2, 2]);
        let shape: Vec<(usize, usize, usize)> = sample
            .pages()
            .iter()
            .map(|p| (p.index, p.request.offset, p.items.len()))
            .collect();
        assert_eq!(shape, vec![(0, 0, 2), (1, 2, 0), (2, 2, 1)]);
    }

    #[tokio::test]
    async fn exhausted_budget_fails_the_sample() {
        let source = Scripted::new(vec![
            Ok(items("a", 2)),
            Err(FetchError::ServerError {
                status: 500,
                body: String::new(),
            }),
            Err(FetchError::ServerError {
                status: 500,
                body: String::new(),
            }),
        ]);
        let err = collector(source, 2, immediate(2))
            .collect("t1")
            .await
            .unwrap_err();

        match err {
            SampleError::PageFailed {
                offset,
                attempts,
                last_error,
            } => {
                assert_eq!(offset, 2);
                assert_eq!(attempts, 2);
                assert_eq!(last_error.kind(), FailureKind::ServerError);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn failure_budgets_are_independent_and_reset_after_success() {
        let retry = RetryPolicies {
            transport: RetryPolicy::immediate(2),
            server_error: RetryPolicy::immediate(2),
        };
        let source = Scripted::new(vec![
            Err(FetchError::Transport("reset".into())),
            Err(FetchError::ServerError {
                status: 502,
                body: String::new(),
            }),
            Ok(items("a", 2)),
            Err(FetchError::Transport("reset".into())),
            Err(FetchError::ServerError {
                status: 502,
                body: String::new(),
            }),
            Ok(items("b", 0)),
        ]);
        let sample = collector(source.clone(), 2, retry).collect("t1").await.unwrap();
        assert_eq!(source.offsets(), vec![0, 0, 0, 2, 2, 2]);
        assert_eq!(sample.item_count(), 2);
    }

    #[tokio::test]
    async fn emits_events_for_the_sample() {
        let source = Scripted::new(vec![
            Err(FetchError::Transport("reset".into())),
            Ok(items("a", 1)),
        ]);
        let (observer, mut rx) = ChannelObserver::channel();
        let collector = SampleCollector::new(source, query(2), immediate(3), Arc::new(observer));
        collector.collect("s-42").await.unwrap();
        drop(collector);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.iter().all(|e| e.sample_id() == "s-42"));
        assert!(matches!(events[0], SamplingEvent::SampleStarted { .. }));
        assert!(matches!(
            events[1],
            SamplingEvent::PageFailed {
                kind: FailureKind::Transport,
                retry_in_ms: Some(0),
                ..
            }
        ));
        assert!(matches!(events[2], SamplingEvent::PageFetched { items: 1, .. }));
        assert!(matches!(
            events[3],
            SamplingEvent::SampleCompleted { pages: 1, items: 1, .. }
        ));
    }
}
