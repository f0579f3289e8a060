//! spindle-core
//!
//! In-process concurrency building blocks.
//!
//! # モジュール構成
//! - **domain**: ids, job, outcome
//! - **queue**: bounded FIFO `JobQueue`（backpressure + drain on close）
//! - **ledger**: `ResultStore` + `PoolStats` behind one guard
//! - **runtime**: `JobHandler` trait and the execution wrapper
//! - **worker** / **pool**: `WorkerGroup` and `WorkerPool`
//! - **bus**: `EventBus` (fan-out pub/sub)
//! - **txn**: `TransactionManager` (ordered dual-resource locking)
//! - **counter** / **fanout**: small shared-state utilities
//! - **config** / **error**: configuration and error types

pub mod bus;
pub mod config;
pub mod counter;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod ledger;
pub mod pool;
pub mod queue;
pub mod runtime;
pub mod txn;
pub mod worker;

pub use bus::{BusStats, EventBus, PublishReport, Subscription};
pub use config::{BusConfig, PoolConfig, SubmitPolicy, TransferConfig};
pub use counter::Counter;
pub use domain::{Job, JobId, JobOutcome, JobResult, Priority, ResourceId, SubscriberId};
pub use error::{BusError, ConfigError, FanoutError, JobError, PoolError, TxError};
pub use fanout::parallel_map;
pub use ledger::{PoolStats, ResultStore};
pub use pool::WorkerPool;
pub use runtime::{EchoHandler, FnHandler, JobHandler, WorkerContext, handler_fn};
pub use txn::{Resource, TransactionManager};
