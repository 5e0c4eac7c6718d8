use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// where RND gets its bytes from
pub trait RandomSource {
    fn random_byte(&mut self) -> u8;
}

/// rand's standard generator; seeded runs are repeatable
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        StdRandom { rng }
    }
}

impl RandomSource for StdRandom {
    fn random_byte(&mut self) -> u8 {
        self.rng.gen()
    }
}

/// always the same byte
pub struct FixedRandom(pub u8);

impl RandomSource for FixedRandom {
    fn random_byte(&mut self) -> u8 {
        self.0
    }
}
