mod password;
mod tokens;
mod validation;

pub use password::{hash_password, verify_password, PasswordError};
pub use tokens::new_reset_token;
pub use validation::{is_valid_email, normalize_email, MIN_PASSWORD_LENGTH};
