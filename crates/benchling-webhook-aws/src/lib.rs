// benchling-webhook-aws - Cloud-facing resolution and synchronization
//
// Every AWS call goes through the AwsProvider trait and every HTTP fetch
// through HttpClient, so the resolvers run unchanged against the SDK
// (feature "sdk") or the in-memory mocks.
//
// Calls within one resolution are sequential; errors surface in a fixed order.

pub mod error;
pub mod http;
pub mod mock;
pub mod provider;
pub mod quilt3;
pub mod resolver;
#[cfg(feature = "sdk")]
pub mod sdk;
pub mod secret;
pub mod stack;
pub mod sync;

pub use error::{ResolveError, Result};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use provider::{
    AwsError, AwsProvider, AwsResult, SecretMetadata, SecretValue, StackDescription,
    StackResource, StackSummary,
};
pub use quilt3::{infer_quilt_config, Quilt3Cli};
pub use resolver::{catalog_from_outputs, ConfigResolver, ResolvedConfig};
#[cfg(feature = "sdk")]
pub use sdk::SdkAwsProvider;
pub use secret::{parse_secret_payload, SecretResolver};
pub use stack::{parse_api_gateway_endpoint, StackInference, StackOutputResolver};
pub use sync::{SecretsSynchronizer, SyncAction, SyncFailure, SyncRecord, SyncReport};
