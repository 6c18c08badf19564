/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength checks
/// - [`session`]: Session token generation and hashing
/// - [`identity`]: Resolving a request's token to an [`identity::Identity`]
/// - [`policy`]: Pure mutation policy for company resources
/// - [`authorization`]: Store-backed guards that feed the policy
///
/// # Example
///
/// ```
/// use companysync_shared::auth::password::{hash_password, verify_password};
/// use companysync_shared::auth::session::generate_session_token;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("ledger2024")?;
/// assert!(verify_password("ledger2024", &hash)?);
///
/// let (token, token_hash) = generate_session_token();
/// assert_eq!(token_hash.len(), 64);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod identity;
pub mod password;
pub mod policy;
pub mod session;
