use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const PASSWORD_LENGTH: usize = 8;

/// Numeric first-login passwords. Not secrets: users change them on first
/// sign-in, so any uniform source will do.
pub struct CredentialGenerator<R: Rng> {
    rng: R,
}

impl CredentialGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        CredentialGenerator::new(StdRng::from_entropy())
    }
}

impl<R: Rng> CredentialGenerator<R> {
    pub fn new(rng: R) -> Self {
        CredentialGenerator { rng }
    }

    /// Eight digits, the first one never `0`.
    pub fn generate(&mut self) -> String {
        let mut password = String::with_capacity(PASSWORD_LENGTH);
        password.push(digit(self.rng.gen_range(1..=9)));
        for _ in 1..PASSWORD_LENGTH {
            password.push(digit(self.rng.gen_range(0..=9)));
        }
        password
    }
}

fn digit(value: u32) -> char {
    char::from_digit(value, 10).unwrap_or('0')
}
