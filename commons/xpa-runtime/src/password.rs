use rand::Rng;

const PASSWORD_LENGTH: usize = 27;

/// A random alphanumeric password drawn from the thread-local CSPRNG.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
