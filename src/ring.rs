use crate::error::RingError;

/*
Time-Indexed Ring Buffer
========================

Every sample that flows through the graph is addressed by an absolute
sample time `t` (a u64 counting up from 0 at the configured sample rate).
The ring stores the most recent `capacity` values of a stream and lets
readers ask for them *by time*, not by slot:

    times:   0  1  2  3  4  5  6  7  8  9 ...
    slots:  [8][9][2][3][4][5][6][7]        (capacity 8)
                   └─ live window [2, 10) ─┘

`lowest_t`/`highest_t` bound the half-open live window. Writing appends at
`highest_t`; once the window would exceed capacity, the oldest time is
silently evicted. A read inside the window is exact; a read outside it
reports *which side* it fell off, because the two sides mean different
things to a caller: "evicted" is a slow reader (recoverable, substitute
silence), "unwritten" is a request for the future (the producer must be
advanced first).

The slot for time t is simply `t % capacity`, so the window invariant
`highest_t - lowest_t <= capacity` guarantees live times never collide.
*/

pub struct TimeRing<T> {
    slots: Vec<T>,
    lowest_t: u64,
    highest_t: u64,
}

impl<T: Clone + Default> TimeRing<T> {
    /// Ring with a fixed capacity. Capacity never changes after construction.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            slots: vec![T::default(); capacity],
            lowest_t: 0,
            highest_t: 0,
        }
    }

    /// Append a value at `highest_t`, evicting the oldest value if the
    /// window is full. Returns the time the value was written at. O(1).
    pub fn write(&mut self, value: T) -> u64 {
        let t = self.highest_t;
        let cap = self.slots.len() as u64;
        self.slots[(t % cap) as usize] = value;
        self.highest_t += 1;
        if self.highest_t - self.lowest_t > cap {
            self.lowest_t = self.highest_t - cap;
        }
        t
    }

    /// Value at time `t`, if `t` is inside the live window.
    pub fn read(&self, t: u64) -> Result<T, RingError> {
        self.check(t)?;
        let cap = self.slots.len() as u64;
        Ok(self.slots[(t % cap) as usize].clone())
    }

    /// Copy the range `[t0, t0 + out.len())` into `out`.
    ///
    /// Atomic: the whole range is validated before anything is copied, so a
    /// failed call leaves `out` untouched.
    pub fn read_range(&self, t0: u64, out: &mut [T]) -> Result<(), RingError> {
        if out.is_empty() {
            return Ok(());
        }
        self.check(t0)?;
        self.check(t0 + out.len() as u64 - 1)?;
        let cap = self.slots.len() as u64;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.slots[((t0 + i as u64) % cap) as usize].clone();
        }
        Ok(())
    }

    /// Reset the live window to `[t, t)`, discarding all stored values.
    ///
    /// Used only when a channel is attached to an already-running timeline.
    pub fn rebase(&mut self, t: u64) {
        self.lowest_t = t;
        self.highest_t = t;
    }

    fn check(&self, t: u64) -> Result<(), RingError> {
        if t < self.lowest_t {
            return Err(RingError::Evicted {
                t,
                lowest_t: self.lowest_t,
            });
        }
        if t >= self.highest_t {
            return Err(RingError::Unwritten {
                t,
                highest_t: self.highest_t,
            });
        }
        Ok(())
    }

    pub fn lowest_t(&self) -> u64 {
        self.lowest_t
    }

    pub fn highest_t(&self) -> u64 {
        self.highest_t
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live samples, `highest_t - lowest_t`.
    pub fn len(&self) -> usize {
        (self.highest_t - self.lowest_t) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.highest_t == self.lowest_t
    }
}
