//! Phase generators: integer ALU, floating-point and memory bandwidth stress.
//!
//! Nothing produced here is ever consumed. Every mutable value is routed
//! through [`black_box`] so the optimizer cannot prove the work dead and
//! delete the loops; an elided loop produces zero load.

use std::collections::TryReserveError;
use std::hint::black_box;

// ---------------------------------------------------------------------------
// Integer phase
// ---------------------------------------------------------------------------

/// Per-worker integer scratch registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerRegisters {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub result: u32,
}

impl Default for IntegerRegisters {
    fn default() -> Self {
        Self {
            a: 1,
            b: 2,
            c: 3,
            d: 4,
            result: 0,
        }
    }
}

impl IntegerRegisters {
    /// Value `result` is reset to when it collapses to zero.
    pub fn reseed(&self) -> u32 {
        self.a
            .wrapping_add(self.b)
            .wrapping_add(self.c)
            .wrapping_add(self.d)
    }

    /// One integer iteration: multiply-accumulate, subtract, xor, rotate.
    ///
    /// Zero is absorbing under xor/rotate, so a zero result is reseeded from
    /// the four registers to keep the ALU busy.
    #[inline(always)]
    pub fn step(&self, result: u32) -> u32 {
        let a = black_box(self.a);
        let b = black_box(self.b);
        let c = black_box(self.c);
        let d = black_box(self.d);

        let mut r = result.wrapping_add(a.wrapping_mul(b));
        r = r.wrapping_sub(c);
        r ^= d;
        r = r.rotate_left(3);
        if r == 0 {
            r = self.reseed();
        }
        r
    }
}

/// Run `iterations` integer steps, leaving the final value in `regs.result`.
pub fn integer_phase(regs: &mut IntegerRegisters, iterations: u64) -> u32 {
    let mut result = regs.result;
    for _ in 0..iterations {
        result = black_box(regs.step(result));
    }
    regs.result = result;
    result
}

// ---------------------------------------------------------------------------
// Floating-point phase
// ---------------------------------------------------------------------------

/// Fixed operands and reset threshold of the floating-point phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatOperands {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub threshold: f32,
}

impl Default for FloatOperands {
    fn default() -> Self {
        Self {
            x: 1.23,
            y: 4.56,
            z: 7.89,
            threshold: 100.0,
        }
    }
}

impl FloatOperands {
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Value the accumulator is reset to once it crosses the threshold.
    pub fn reseed(&self) -> f32 {
        self.x + self.y + self.z
    }

    /// One float iteration: `(x * y + z) / y`, reset above the threshold.
    #[inline(always)]
    pub fn step(&self) -> f32 {
        let x = black_box(self.x);
        let y = black_box(self.y);
        let z = black_box(self.z);

        let mut acc = x * y;
        acc += z;
        acc /= y;
        if acc > self.threshold {
            acc = self.reseed();
        }
        acc
    }
}

/// Per-worker floating-point accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloatAccumulator {
    pub value: f32,
}

/// Run `iterations` float steps, leaving the final value in `acc`.
pub fn float_phase(acc: &mut FloatAccumulator, operands: &FloatOperands, iterations: u64) -> f32 {
    let mut value = acc.value;
    for _ in 0..iterations {
        value = black_box(operands.step());
    }
    acc.value = value;
    value
}

// ---------------------------------------------------------------------------
// Memory phases
// ---------------------------------------------------------------------------

/// Worker-owned array of `i32` used to generate memory traffic.
///
/// Released by `Drop` on every exit path of its owning worker.
#[derive(Debug)]
pub struct ScratchBuffer {
    data: Vec<i32>,
}

impl ScratchBuffer {
    /// Allocate `len` zeroed elements, reporting failure instead of aborting.
    pub fn allocate(len: usize) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Sequential write pass: `data[i] = i * 2`.
    pub fn write_pass(&mut self) {
        for (i, slot) in self.data.iter_mut().enumerate() {
            *slot = (i as i32).wrapping_mul(2);
        }
        black_box(self.data.as_mut_slice());
    }

    /// Read/modify/write pass: `data[i] += data[(i + 1) % len]`.
    ///
    /// Every element adds the value its neighbour held before this pass, so
    /// the wrap-around read of element 0 sees the pre-pass value too.
    pub fn add_pass(&mut self) {
        let len = self.data.len();
        if len == 0 {
            return;
        }
        let first = self.data[0];
        for i in 0..len {
            let next = (i + 1) % len;
            let neighbour = if next == 0 { first } else { self.data[next] };
            self.data[i] = self.data[i].wrapping_add(neighbour);
        }
        black_box(self.data.as_mut_slice());
    }

    #[cfg(test)]
    pub(crate) fn fill(&mut self, value: i32) {
        self.data.fill(value);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
