//! Authentication and identity resolution: local passwords, delegated
//! providers with account linking, and store-backed sessions.
//! Keep the public surface thin and split implementation across sub-modules.

mod model;
mod error;
mod credentials;
mod registry;
mod resolver;
mod principal;
mod session;
mod gate;
mod exchange;

pub use model::{DelegatedProfileAssertion, Identity, IdentityId, NewIdentity, PasswordCredential, Provider, ProviderLinks, PublicIdentity};
pub use error::{ConfigurationError, RegistrationError, ResolutionError, SessionError, StrategyError, Unauthorized, VerificationError};
pub use credentials::{hash_password, verify_password, CredentialVerifier};
pub use registry::{default_callback_url, ProviderClient, ProviderStrategy, StrategyRegistry, LOCAL_STRATEGY};
pub use resolver::{base_username, normalize_username, IdentityResolver};
pub use principal::{PrincipalSerializer, SessionReference};
pub use session::{Session, SessionStore, SessionToken};
pub use gate::{AuthGate, RequestAuth};
pub use exchange::{github_assertion, google_assertion, ExchangeError, GitHubEmail, GitHubUser, GoogleUserInfo, HttpProfileExchange, ProfileExchange};

pub(crate) use session::gen_token;
