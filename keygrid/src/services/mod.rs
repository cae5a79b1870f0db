pub mod credentials;
pub mod verification;

pub use credentials::{CreatedCredential, CredentialService};
pub use verification::VerificationService;
