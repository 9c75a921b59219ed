//! 단일 소비자 FIFO 큐 — single-flight 직렬화의 기반
//!
//! [`SingleFlightQueue`]는 순서 보존 FIFO이며, 비어 있던 큐에 항목이
//! 들어오는 순간(empty→non-empty 전이)에만 대기 중인 소비자를
//! 깨웁니다. 이미 항목이 있는 큐에 추가할 때는 깨우지 않으므로,
//! 큐 하나당 활성 drain 루프는 항상 최대 하나입니다.
//!
//! 소비자 계약: [`wait_nonempty`](SingleFlightQueue::wait_nonempty)로
//! 깨어난 뒤 `peek` → 처리 → `pop` 순서로 빌 때까지 소진합니다.
//! 처리 중에는 항목이 구조적으로 큐에 남아 있으므로
//! [`search`](SingleFlightQueue::search)를 쓰는 쪽(타임아웃 리퍼)에서
//! 진행 중인 작업도 "큐에 있음"으로 관찰됩니다.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// 단일 소비자 FIFO 큐
///
/// `Arc`로 감싸 생산자(submit 호출부)와 소비자(drain 워커),
/// 관찰자(리퍼)에게 명시적으로 주입합니다. 전역 싱글턴은 없습니다.
#[derive(Debug)]
pub struct SingleFlightQueue<T> {
    items: Mutex<VecDeque<T>>,
    wake: Notify,
}

impl<T> Default for SingleFlightQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlightQueue<T> {
    /// 빈 큐를 생성합니다.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 항목을 꼬리에 추가합니다. O(1).
    ///
    /// 추가 직전에 큐가 비어 있었다면 대기 중인 소비자를 정확히
    /// 한 번 깨웁니다. 이미 비어 있지 않았다면 실행 중인 drain
    /// 루프가 알아서 가져가므로 깨우지 않습니다.
    pub fn enqueue(&self, item: T) {
        let was_empty = {
            let mut items = self.lock();
            let was_empty = items.is_empty();
            items.push_back(item);
            was_empty
        };
        if was_empty {
            self.wake.notify_one();
        }
    }

    /// 머리 항목을 제거하고 반환합니다. 비어 있으면 `None`.
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// 머리 항목의 복제본을 반환합니다. 비어 있으면 `None`.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.lock().front().cloned()
    }

    /// 조건을 만족하는 항목이 있는지 선형 탐색합니다 (변경 없음).
    pub fn search(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.lock().iter().any(|item| predicate(item))
    }

    /// 현재 큐 길이를 반환합니다.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 큐가 비어 있는지 반환합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 큐가 비어 있지 않게 될 때까지 대기합니다.
    ///
    /// 이미 항목이 있으면 즉시 반환합니다. `enqueue`의
    /// empty→non-empty 알림과 짝을 이루며, 알림이 먼저 도착해도
    /// permit이 보존되므로 유실되지 않습니다.
    pub async fn wait_nonempty(&self) {
        loop {
            if !self.is_empty() {
                return;
            }
            self.wake.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fifo_order() {
        let queue = SingleFlightQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn peek_does_not_remove() {
        let queue = SingleFlightQueue::new();
        queue.enqueue("a".to_owned());

        assert_eq!(queue.peek(), Some("a".to_owned()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some("a".to_owned()));
        assert!(queue.is_empty());
        assert_eq!(queue.peek(), None);
    }

    #[test]
    fn search_finds_without_mutation() {
        let queue = SingleFlightQueue::new();
        queue.enqueue("sbom-a".to_owned());
        queue.enqueue("sbom-b".to_owned());

        assert!(queue.search(|id| id == "sbom-b"));
        assert!(!queue.search(|id| id == "sbom-c"));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_nonempty() {
        let queue = SingleFlightQueue::new();
        queue.enqueue(42);

        tokio::time::timeout(Duration::from_millis(50), queue.wait_nonempty())
            .await
            .expect("should not block on a non-empty queue");
    }

    #[tokio::test]
    async fn wait_wakes_on_empty_to_nonempty_transition() {
        let queue = Arc::new(SingleFlightQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.wait_nonempty().await;
                queue.pop()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(7);

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(popped, Some(7));
    }

    #[tokio::test]
    async fn notify_before_wait_is_not_lost() {
        let queue = Arc::new(SingleFlightQueue::new());
        // 소비자가 대기하기 전에 enqueue가 먼저 일어나는 경우
        queue.enqueue(1);

        tokio::time::timeout(Duration::from_millis(50), queue.wait_nonempty())
            .await
            .expect("stored permit should wake the late waiter");
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_all_observed_in_order() {
        let queue = Arc::new(SingleFlightQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for i in 0..100 {
                    queue.enqueue(i);
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 100 {
            queue.wait_nonempty().await;
            while let Some(head) = queue.peek() {
                seen.push(head);
                queue.pop();
            }
        }
        producer.await.unwrap();

        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
