// benchling-webhook-config - Profiles and configuration sources
//
// Two merge paths with opposite precedence:
// - Layer precedence (ProfileStore): deploy > derived > user
// - Source precedence (CLI path): CLI > env > dotenv > defaults
//
// Nothing here talks to AWS; see benchling-webhook-aws for discovery and
// secret synchronization.

pub mod error;
pub mod merge;
pub mod secrets_input;
pub mod sources;
pub mod store;
pub mod transform;
pub mod types;
pub mod validation;
pub mod wizard;

pub use error::{ConfigError, Result};
pub use merge::{deep_merge, merge_layers, LayerSet};
pub use secrets_input::{process_benchling_secrets_input, BenchlingSecretsInput};
pub use sources::{
    default_config_root, load_config, load_dotenv, merge_inferred_config, DeployConfig,
    EnvSnapshot, EnvSource,
};
pub use store::{validate_profile_name, DocumentSlots, ProfileStore};
pub use transform::{profile_to_stack_config, TransformOutput};
pub use types::{
    normalize_catalog, BenchlingConfig, DeploymentConfig, DeploymentRecord, Deployments,
    InferenceResult, Layer, LoggingConfig, PackagesConfig, Profile, ProfileMetadata, QuiltConfig,
    SecurityConfig, StackBenchlingConfig, StackConfig, VpcConfig,
};
pub use validation::{validate_config, FieldError, ValidationResult};
pub use wizard::profile_from_answers;
