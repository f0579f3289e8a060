//! Queue module: the bounded FIFO handoff between producers and workers.
//!
//! # 学習ポイント
//! - Mutex + Notify による async な blocking pop
//! - Semaphore で容量（backpressure）を表現する
//! - close() 後も残っているジョブは drain されるまで取り出せる

mod job_queue;

pub use job_queue::{JobQueue, Slot};
