//! File configuration: schema, discovery/loading, env substitution.
//!
//! Config lives in `enxame.{toml,yaml,yml,json}`, found project-local or
//! under `~/.config/enxame/`. String values may embed `${ENV_VAR}`
//! placeholders, substituted before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{data_dir, discover_and_load, load_config},
    schema::{
        AutoReplyConfig, BackupConfig, BroadcastConfig, EnxameConfig, ReconnectConfig,
        ReplyRuleConfig, SessionsConfig,
    },
};
