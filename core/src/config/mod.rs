//! Wardline unified configuration layer.
//!
//! All environment-variable reads are centralized here; business code
//! accesses structured config instead of calling `std::env::var` directly.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool` and friends
//! - `schema`: `RateLimitConfig`, `OriginConfig`, `EncryptionConfig`,
//!   `ApprovalConfig`, `ObservabilityConfig`
//! - `env_keys`: key constants (with legacy aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv, remove_env_var, set_env_var};
pub use schema::{
    ApprovalConfig, EncryptionConfig, ObservabilityConfig, OriginConfig, RateLimitConfig,
    StateDirConfig,
};
