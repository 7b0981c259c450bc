//! Cursor walking for paginated backends.
//!
//! Pages are fetched strictly in sequence since each request needs the
//! previous page's cursor.

use async_trait::async_trait;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use gleanwatch_domain::{BackendError, PageCursor};

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn with_next(items: Vec<T>, next: PageCursor) -> Self {
        Self {
            items,
            next: Some(next),
        }
    }
}

#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, cursor: Option<&PageCursor>)
    -> Result<Page<Self::Item>, BackendError>;
}

/// Everything accumulated by a walk, in page arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Walk<T> {
    pub items: Vec<T>,
    pub pages: usize,
    /// Error from the page that stopped the walk. Earlier pages are kept.
    pub error: Option<BackendError>,
    /// False when the walk stopped at the page cap with a cursor still pending.
    pub exhausted: bool,
}

impl<T> Walk<T> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Follow cursors until the backend stops returning one, a page fails, or
/// `max_pages` pages have been read.
pub async fn walk_pages<S>(source: &S, max_pages: usize) -> Walk<S::Item>
where
    S: PagedSource + ?Sized,
{
    walk_pages_until(source, max_pages, None).await
}

/// Like [`walk_pages`], but a page still pending at `deadline` ends the walk
/// with an `Unreachable` error while keeping every page already read.
pub async fn walk_pages_until<S>(
    source: &S,
    max_pages: usize,
    deadline: Option<Instant>,
) -> Walk<S::Item>
where
    S: PagedSource + ?Sized,
{
    let max_pages = max_pages.max(1);
    let mut items = Vec::new();
    let mut pages = 0;
    let mut cursor: Option<PageCursor> = None;

    loop {
        if pages >= max_pages {
            warn!(pages, "page cap reached with cursor still pending");
            return Walk {
                items,
                pages,
                error: None,
                exhausted: false,
            };
        }

        let fetched = match deadline {
            Some(deadline) => timeout_at(deadline, source.fetch_page(cursor.as_ref()))
                .await
                .unwrap_or_else(|_| {
                    Err(BackendError::unreachable(format!(
                        "timed out waiting for page {}",
                        pages + 1
                    )))
                }),
            None => source.fetch_page(cursor.as_ref()).await,
        };

        match fetched {
            Ok(page) => {
                pages += 1;
                debug!(page = pages, records = page.items.len(), "page received");
                items.extend(page.items);
                match page.next {
                    Some(next) if cursor.as_ref() == Some(&next) => {
                        warn!(cursor = %next, "backend repeated its cursor, stopping");
                        return Walk {
                            items,
                            pages,
                            error: None,
                            exhausted: false,
                        };
                    }
                    Some(next) => cursor = Some(next),
                    None => {
                        return Walk {
                            items,
                            pages,
                            error: None,
                            exhausted: true,
                        };
                    }
                }
            }
            Err(err) => {
                warn!(page = pages + 1, error = %err, "page fetch failed, keeping earlier pages");
                return Walk {
                    items,
                    pages,
                    error: Some(err),
                    exhausted: false,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedSource {
        pages: Vec<Result<Page<u32>, BackendError>>,
        seen: Mutex<Vec<Option<String>>>,
        stall_on: Option<usize>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<Page<u32>, BackendError>>) -> Self {
            Self {
                pages,
                seen: Mutex::new(Vec::new()),
                stall_on: None,
            }
        }

        fn stalling_on(mut self, index: usize) -> Self {
            self.stall_on = Some(index);
            self
        }

        fn seen(&self) -> Vec<Option<String>> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PagedSource for ScriptedSource {
        type Item = u32;

        async fn fetch_page(
            &self,
            cursor: Option<&PageCursor>,
        ) -> Result<Page<u32>, BackendError> {
            let index = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(cursor.map(|c| c.as_str().to_string()));
                seen.len() - 1
            };
            if self.stall_on == Some(index) {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
            self.pages
                .get(index)
                .cloned()
                .unwrap_or_else(|| Err(BackendError::query("script exhausted")))
        }
    }

    #[tokio::test]
    async fn test_walk_concatenates_pages_in_order() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1, 2], PageCursor::new("a"))),
            Ok(Page::with_next(vec![3], PageCursor::new("b"))),
            Ok(Page::last(vec![4, 5])),
        ]);
        let walk = walk_pages(&source, 10).await;
        assert_eq!(walk.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(walk.pages, 3);
        assert!(walk.exhausted);
        assert!(walk.is_complete());
        assert_eq!(
            source.seen(),
            vec![None, Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_single_page_without_cursor() {
        let source = ScriptedSource::new(vec![Ok(Page::last(vec![7]))]);
        let walk = walk_pages(&source, 10).await;
        assert_eq!(walk.items, vec![7]);
        assert_eq!(walk.pages, 1);
        assert!(walk.exhausted);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_pages() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1, 2], PageCursor::new("a"))),
            Ok(Page::with_next(vec![3, 4], PageCursor::new("b"))),
            Err(BackendError::unreachable("connection reset")),
        ]);
        let walk = walk_pages(&source, 10).await;
        assert_eq!(walk.items, vec![1, 2, 3, 4]);
        assert_eq!(walk.pages, 2);
        assert_eq!(
            walk.error,
            Some(BackendError::unreachable("connection reset"))
        );
        assert!(!walk.exhausted);
    }

    #[tokio::test]
    async fn test_page_cap_bounds_walk() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1], PageCursor::new("a"))),
            Ok(Page::with_next(vec![2], PageCursor::new("b"))),
            Ok(Page::with_next(vec![3], PageCursor::new("c"))),
        ]);
        let walk = walk_pages(&source, 2).await;
        assert_eq!(walk.items, vec![1, 2]);
        assert!(!walk.exhausted);
        assert!(walk.is_complete());
        assert_eq!(source.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1], PageCursor::new("same"))),
            Ok(Page::with_next(vec![2], PageCursor::new("same"))),
            Ok(Page::last(vec![3])),
        ]);
        let walk = walk_pages(&source, 10).await;
        assert_eq!(walk.items, vec![1, 2]);
        assert_eq!(walk.pages, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_pages_already_read() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1, 2], PageCursor::new("a"))),
            Ok(Page::with_next(vec![3, 4], PageCursor::new("b"))),
            Ok(Page::last(vec![5])),
        ])
        .stalling_on(2);
        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        let walk = walk_pages_until(&source, 10, Some(deadline)).await;
        assert_eq!(walk.items, vec![1, 2, 3, 4]);
        assert_eq!(walk.pages, 2);
        assert!(!walk.exhausted);
        let err = walk.error.unwrap();
        assert_eq!(err.kind, gleanwatch_domain::ErrorKind::Unreachable);
        assert!(err.detail.contains("page 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_not_reached_walk_completes() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1], PageCursor::new("a"))),
            Ok(Page::last(vec![2])),
        ]);
        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        let walk = walk_pages_until(&source, 10, Some(deadline)).await;
        assert_eq!(walk.items, vec![1, 2]);
        assert!(walk.is_complete());
        assert!(walk.exhausted);
    }
}
