//! Fixed-depth history of per-pulse position and power readings.

/// Number of samples kept.
pub const HISTORY_LEN: usize = 16;

/// Comparisons made for each new sample (every other entry in the buffer).
pub const COMPARISONS: usize = HISTORY_LEN - 1;

const INDEX_MASK: usize = HISTORY_LEN - 1;

const _: () = assert!(HISTORY_LEN.is_power_of_two());

/// One pulse worth of tuning data. Zero fields mean "no data".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub position: u16,
    pub reverse_db: u16,
    pub forward_db: u16,
}

/// Circular buffer of the last `HISTORY_LEN` samples.
///
/// Starts zero-filled; the zero entries read as "no data" until overwritten.
#[derive(Debug, Clone, Default)]
pub struct SampleHistory {
    entries: [Sample; HISTORY_LEN],
    active_index: usize,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the most recently written entry.
    #[inline]
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// Most recently written entry (zero before the first push).
    #[inline]
    pub fn latest(&self) -> Sample {
        self.entries[self.active_index]
    }

    #[inline]
    pub fn get(&self, index: usize) -> Sample {
        self.entries[index & INDEX_MASK]
    }

    /// Write `sample` over the oldest entry and make it the active one.
    pub fn push(&mut self, sample: Sample) -> usize {
        self.active_index = (self.active_index + 1) & INDEX_MASK;
        self.entries[self.active_index] = sample;
        self.active_index
    }

    /// The `COMPARISONS` entries before the active one, newest first.
    pub fn previous(&self) -> impl Iterator<Item = Sample> + '_ {
        (1..=COMPARISONS).map(move |back| {
            self.entries[self.active_index.wrapping_sub(back) & INDEX_MASK]
        })
    }

    /// Forget all samples.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
