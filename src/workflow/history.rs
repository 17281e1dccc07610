//! 検証履歴
//!
//! 履歴への追加はレスポンス返却後にタスクキューで行う。
//! キューは1本のtokioタスクが順番に処理するため、追加は
//! `validate_file` が成功した順に反映される。`flush` はそれまでに
//! 積まれた追加がすべて反映されるまで待つ。

use chrono::Utc;
use layout_validator_common::HistoryEntry;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub const HISTORY_LIMIT: usize = 10;

/// 新しい順・上限付きの履歴
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit + 1),
            limit,
        }
    }

    /// 先頭に追加し、上限を超えた古いものを捨てる
    pub fn push_front(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.limit);
    }

    pub fn find(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

enum HistoryCommand {
    Append(HistoryEntry),
    Barrier(oneshot::Sender<()>),
}

/// 履歴の追加キュー
#[derive(Debug)]
pub struct HistoryQueue {
    tx: mpsc::UnboundedSender<HistoryCommand>,
    history: Arc<Mutex<History>>,
}

impl std::fmt::Debug for HistoryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryCommand::Append(e) => write!(f, "Append({})", e.id),
            HistoryCommand::Barrier(_) => write!(f, "Barrier"),
        }
    }
}

impl HistoryQueue {
    /// ワーカーを起動する。tokioランタイム内で呼ぶこと
    pub fn spawn(limit: usize) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<HistoryCommand>();
        let history = Arc::new(Mutex::new(History::new(limit)));

        let worker_history = history.clone();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    HistoryCommand::Append(entry) => {
                        debug!("履歴に追加: {}", entry.id);
                        lock(&worker_history).push_front(entry);
                    }
                    HistoryCommand::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx, history }
    }

    pub fn enqueue(&self, entry: HistoryEntry) {
        // ワーカーが止まっている場合はその場で反映
        if let Err(mpsc::error::SendError(HistoryCommand::Append(entry))) =
            self.tx.send(HistoryCommand::Append(entry))
        {
            lock(&self.history).push_front(entry);
        }
    }

    /// ここまでに積んだ追加が反映されるまで待つ
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(HistoryCommand::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        lock(&self.history).entries().cloned().collect()
    }

    pub fn find(&self, id: u64) -> Option<HistoryEntry> {
        lock(&self.history).find(id).cloned()
    }
}

fn lock(history: &Mutex<History>) -> std::sync::MutexGuard<'_, History> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

/// ミリ秒ベースの単調増加ID
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn next_id(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(prev + 1)
    }
}
