use rand::{Error as RandError, RngCore};
use tracing::debug;

const MINSTD_MODULUS: i64 = 2_147_483_647;
const MINSTD_MULTIPLIER: i64 = 16_807;

/// Park-Miller "minimal standard" generator. Small, fully reproducible, and identical to the
/// sequence level scripts are authored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinStdRng {
    state: i64,
}

impl MinStdRng {
    pub fn new(seed: i64) -> Self {
        let mut state = seed % MINSTD_MODULUS;
        if state <= 0 {
            state += MINSTD_MODULUS - 1;
        }
        Self { state }
    }

    /// Next value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.state = (self.state * MINSTD_MULTIPLIER) % MINSTD_MODULUS;
        (self.state - 1) as f64 / (MINSTD_MODULUS - 1) as f64
    }
}

impl RngCore for MinStdRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_unit() * 4_294_967_296.0) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next_u32());
        let low = u64::from(self.next_u32());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// The simulation's random source. Consumers draw from [`RandomSlot::source`]; a scripted run
/// temporarily overrides the ambient generator with a seeded one.
pub struct RandomSlot {
    ambient: Box<dyn RngCore>,
    scripted: Option<MinStdRng>,
}

impl RandomSlot {
    pub fn new(ambient: Box<dyn RngCore>) -> Self {
        Self {
            ambient,
            scripted: None,
        }
    }

    /// Replaces any existing override with a fresh generator seeded from `seed`.
    pub fn install(&mut self, seed: i64) {
        if self.scripted.is_some() {
            debug!(seed, "random_override_replaced");
        }
        self.scripted = Some(MinStdRng::new(seed));
    }

    /// Drops the override. Returns whether one was installed; the ambient generator is left
    /// exactly as it was before `install`.
    pub fn restore(&mut self) -> bool {
        self.scripted.take().is_some()
    }

    pub fn is_overridden(&self) -> bool {
        self.scripted.is_some()
    }

    pub fn source(&mut self) -> &mut dyn RngCore {
        match self.scripted.as_mut() {
            Some(scripted) => scripted as &mut dyn RngCore,
            None => self.ambient.as_mut(),
        }
    }

    /// Next value in `[0, 1)` from the active generator.
    pub fn next_unit(&mut self) -> f64 {
        match self.scripted.as_mut() {
            Some(scripted) => scripted.next_unit(),
            None => self.ambient.next_u32() as f64 / 4_294_967_296.0,
        }
    }
}

impl std::fmt::Debug for RandomSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSlot")
            .field("scripted", &self.scripted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn minstd_matches_reference_sequence() {
        let mut rng = MinStdRng::new(1);
        assert_eq!(rng.state, 1);
        rng.next_unit();
        assert_eq!(rng.state, 16_807);
        rng.next_unit();
        assert_eq!(rng.state, 282_475_249);
        rng.next_unit();
        assert_eq!(rng.state, 1_622_650_073);
    }

    #[test]
    fn non_positive_seeds_are_normalised_into_range() {
        assert_eq!(MinStdRng::new(0).state, MINSTD_MODULUS - 1);
        assert_eq!(MinStdRng::new(MINSTD_MODULUS).state, MINSTD_MODULUS - 1);
        assert_eq!(MinStdRng::new(-5).state, MINSTD_MODULUS - 6);
    }

    #[test]
    fn unit_values_stay_in_half_open_range() {
        let mut rng = MinStdRng::new(42);
        for _ in 0..1_000 {
            let value = rng.next_unit();
            assert!((0.0..1.0).contains(&value), "{value}");
        }
    }

    #[test]
    fn same_seed_replays_same_draws() {
        let mut first = MinStdRng::new(1337);
        let mut second = MinStdRng::new(1337);
        let a = (0..16).map(|_| first.next_u32()).collect::<Vec<_>>();
        let b = (0..16).map(|_| second.next_u32()).collect::<Vec<_>>();
        assert_eq!(a, b);
    }

    #[test]
    fn restore_returns_ambient_stream_untouched() {
        let mut slot = RandomSlot::new(Box::new(StdRng::seed_from_u64(9)));
        let mut reference = StdRng::seed_from_u64(9);

        slot.install(7);
        let scripted = slot.source().next_u32();
        assert_eq!(scripted, MinStdRng::new(7).next_u32());
        assert!(slot.restore());
        assert!(!slot.restore());

        assert_eq!(slot.source().next_u32(), reference.next_u32());
        assert_eq!(slot.source().next_u32(), reference.next_u32());
    }

    #[test]
    fn install_twice_restarts_the_sequence() {
        let mut slot = RandomSlot::new(Box::new(StdRng::seed_from_u64(1)));
        slot.install(3);
        let first = slot.next_unit();
        slot.next_unit();
        slot.install(3);
        assert_eq!(slot.next_unit(), first);
        assert!(slot.is_overridden());
    }
}
