//! Time-ordered push keys
//!
//! A push key is 20 characters: 8 encode the creation time in milliseconds,
//! 12 are random. The alphabet is in ASCII order, so keys sort by creation
//! time. Keys created in the same millisecond reuse the random part
//! incremented by one, which keeps them strictly increasing within a
//! process.

use parking_lot::Mutex;
use rand::Rng;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key alphabet, in ASCII order
pub const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of a push key
pub const PUSH_KEY_LEN: usize = 20;

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = PUSH_KEY_LEN - TIME_CHARS;

#[derive(Debug)]
struct KeyState {
    last_millis: u64,
    last_random: [u8; RANDOM_CHARS],
}

/// Generator of strictly increasing push keys
#[derive(Debug)]
pub struct PushKeyGenerator {
    state: Mutex<KeyState>,
}

impl Default for PushKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PushKeyGenerator {
    /// Fresh generator
    pub fn new() -> Self {
        PushKeyGenerator {
            state: Mutex::new(KeyState {
                last_millis: 0,
                last_random: [0; RANDOM_CHARS],
            }),
        }
    }

    /// Process-wide generator
    pub fn global() -> &'static PushKeyGenerator {
        static GLOBAL: OnceLock<PushKeyGenerator> = OnceLock::new();
        GLOBAL.get_or_init(PushKeyGenerator::new)
    }

    /// Key for the current time
    pub fn next_key(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.next_key_at(now)
    }

    /// Key for a given time; a clock that goes backwards is treated as not
    /// having moved
    pub fn next_key_at(&self, millis: u64) -> String {
        let mut state = self.state.lock();
        if millis > state.last_millis {
            state.last_millis = millis;
            let mut rng = rand::thread_rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.gen_range(0..64);
            }
        } else if !increment(&mut state.last_random) {
            state.last_millis += 1;
        }

        let mut key = String::with_capacity(PUSH_KEY_LEN);
        let mut time = [0u8; TIME_CHARS];
        let mut remaining = state.last_millis;
        for slot in time.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }
        key.extend(time.iter().map(|&b| b as char));
        key.extend(state.last_random.iter().map(|&r| PUSH_CHARS[r as usize] as char));
        key
    }
}

/// Add one to a base-64 digit string; false on wrap-around
fn increment(digits: &mut [u8]) -> bool {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return true;
        }
    }
    false
}

/// Create a time-ordered unique key with the process-wide generator
pub fn create_key() -> String {
    PushKeyGenerator::global().next_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsondb_core::key::validate_key;

    #[test]
    fn keys_have_fixed_length_and_are_valid() {
        let key = create_key();
        assert_eq!(key.len(), PUSH_KEY_LEN);
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn keys_increase_within_a_millisecond() {
        let gen = PushKeyGenerator::new();
        let keys: Vec<String> = (0..1000).map(|_| gen.next_key_at(1_700_000_000_000)).collect();
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn keys_increase_with_time_and_survive_clock_skew() {
        let gen = PushKeyGenerator::new();
        let a = gen.next_key_at(1_000);
        let b = gen.next_key_at(2_000);
        let c = gen.next_key_at(1_500);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn time_prefix_orders_keys() {
        let gen = PushKeyGenerator::new();
        let early = gen.next_key_at(64);
        let gen2 = PushKeyGenerator::new();
        let late = gen2.next_key_at(64 * 64);
        assert!(early[..TIME_CHARS] < late[..TIME_CHARS]);
    }

    #[test]
    fn increment_carries() {
        let mut digits = [0, 63, 63];
        assert!(increment(&mut digits));
        assert_eq!(digits, [1, 0, 0]);
        let mut max = [63, 63];
        assert!(!increment(&mut max));
        assert_eq!(max, [0, 0]);
    }
}
