// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use crate::runtime::Runtime;

use flate2::{
    write::{GzDecoder, GzEncoder},
    Compression,
};
use rand_core::{CryptoRng, RngCore};

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io::Write,
    time::{Duration, SystemTime},
};

thread_local! {
    /// Overridden wall clock, `None` falls back to the system clock.
    static TIME_SINCE_EPOCH: Cell<Option<Duration>> = const { Cell::new(None) };

    /// Scripted RNG output, consumed word by word before the fallback PRNG.
    static RNG_VALUES: RefCell<VecDeque<u32>> = const { RefCell::new(VecDeque::new()) };

    /// Fallback PRNG state.
    static RNG_STATE: Cell<u64> = const { Cell::new(0x2545f4914f6cdd1d) };
}

/// Deterministic test RNG.
///
/// Returns scripted words pushed with [`MockRuntime::set_rng_values()`]
/// first and falls back to a xorshift generator once they run out.
pub struct MockRng(());

impl RngCore for MockRng {
    fn next_u32(&mut self) -> u32 {
        if let Some(value) = RNG_VALUES.with(|values| values.borrow_mut().pop_front()) {
            return value;
        }

        RNG_STATE.with(|state| {
            let mut x = state.get();
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            state.set(x);

            (x >> 32) as u32
        })
    }

    fn next_u64(&mut self) -> u64 {
        ((self.next_u32() as u64) << 32) | self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_be_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl CryptoRng for MockRng {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRuntime {}

impl MockRuntime {
    /// Pin the wall clock of the current test thread to `time`.
    pub fn set_time_since_epoch(time: Duration) {
        TIME_SINCE_EPOCH.with(|value| value.set(Some(time)));
    }

    /// Script the next words returned by [`MockRng`].
    pub fn set_rng_values(values: impl IntoIterator<Item = u32>) {
        RNG_VALUES.with(|queue| queue.borrow_mut().extend(values));
    }

    /// Reseed the fallback PRNG of the current test thread.
    pub fn seed_rng(seed: u64) {
        RNG_STATE.with(|state| state.set(seed | 1));
    }
}

impl Runtime for MockRuntime {
    fn time_since_epoch() -> Duration {
        TIME_SINCE_EPOCH.with(|value| value.get()).unwrap_or_else(|| {
            SystemTime::now().duration_since(std::time::UNIX_EPOCH).expect("to succeed")
        })
    }

    fn rng() -> impl RngCore + CryptoRng {
        MockRng(())
    }

    fn gzip_compress(bytes: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        let mut e = GzEncoder::new(Vec::new(), Compression::default());
        e.write_all(bytes.as_ref()).ok()?;

        e.finish().ok()
    }

    fn gzip_decompress(bytes: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        let mut e = GzDecoder::new(Vec::new());
        e.write_all(bytes.as_ref()).ok()?;

        e.finish().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_rng_values_are_returned_first() {
        MockRuntime::set_rng_values([0xdeadbeef, 0xcafebabe]);

        let mut rng = MockRuntime::rng();
        assert_eq!(rng.next_u32(), 0xdeadbeef);
        assert_eq!(rng.next_u32(), 0xcafebabe);

        // fallback prng takes over
        let first = rng.next_u32();
        let second = rng.next_u32();
        assert_ne!(first, second);
    }

    #[test]
    fn pinned_clock() {
        MockRuntime::set_time_since_epoch(Duration::from_millis(1000));

        assert_eq!(
            MockRuntime::time_since_epoch(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn gzip_roundtrip() {
        let compressed = MockRuntime::gzip_compress(b"hello, world").unwrap();

        assert_eq!(
            MockRuntime::gzip_decompress(compressed).unwrap(),
            b"hello, world"
        );
    }
}
