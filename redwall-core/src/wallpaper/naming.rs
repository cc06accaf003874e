use std::sync::atomic::{AtomicU32, Ordering};

/// Issues `wallpaper_{8 hex}.jpg` names.
///
/// A randomly seeded counter is passed through a bijective 32-bit mix, so
/// names look random but never repeat within 2^32 draws.
#[derive(Debug)]
pub struct FileNamer {
    counter: AtomicU32,
}

impl FileNamer {
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    pub fn seeded(seed: u32) -> Self {
        Self {
            counter: AtomicU32::new(seed),
        }
    }

    pub fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("wallpaper_{:08x}.jpg", mix(n))
    }
}

impl Default for FileNamer {
    fn default() -> Self {
        Self::new()
    }
}

// Each step (xor-shift, odd multiply) is invertible.
fn mix(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}
