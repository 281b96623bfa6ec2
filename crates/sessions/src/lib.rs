//! Session Store (SS), Store Monitor/Replicator/Migrator (SM), and Context
//! Store (CS) — §4.1, §4.2, and the Context half of §3/§4.

pub mod backend;
pub mod context_store;
pub mod error;
pub mod factory;
pub mod kv;
pub mod memory;
pub mod migration;
pub mod model;
pub mod monitor;
pub mod replication;

pub use {
    backend::{SessionBackend, StoreCounts},
    context_store::{ContextPatch, ContextStore, NewContext},
    error::{Error, Result},
    factory::{StoreFactory, StoreFactoryConfig, StoreType},
    kv::RedisBackend,
    memory::InMemoryBackend,
    migration::{MigrationConfig, MigrationHooks, MigrationStats, Migrator, NoopMigrationHooks},
    model::{Context, ContextStatus, NewSession, Session, SessionPatch},
    monitor::{MonitorThresholds, RollingMetrics, StoreMonitor, StoreStatus},
    replication::{
        ConflictResolution, RecordedConflict, ReplicaLagSnapshot, ReplicationConfig,
        ReplicationOp, Replicator,
    },
};
