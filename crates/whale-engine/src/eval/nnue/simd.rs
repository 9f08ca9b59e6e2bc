//! Fixed-point NNUE kernels with runtime CPU feature dispatch.
//!
//! Every AVX2 kernel produces exactly the integers of its scalar
//! counterpart: accumulator arithmetic wraps, activations clamp to
//! `[0, 127]`, and dense layers shift the biased sum right.

/// Whether the host CPU supports the AVX2 kernels.
pub fn avx2_supported() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// Portable reference kernels.
pub mod scalar {
    #[inline]
    pub fn add_weights(acc: &mut [i16], weights: &[i16]) {
        for (a, &w) in acc.iter_mut().zip(weights) {
            *a = a.wrapping_add(w);
        }
    }

    #[inline]
    pub fn sub_weights(acc: &mut [i16], weights: &[i16]) {
        for (a, &w) in acc.iter_mut().zip(weights) {
            *a = a.wrapping_sub(w);
        }
    }

    /// Clipped ReLU from the 16-bit accumulator into 8-bit activations.
    #[inline]
    pub fn crelu16(input: &[i16], output: &mut [u8]) {
        for (o, &x) in output.iter_mut().zip(input) {
            *o = x.clamp(0, 127) as u8;
        }
    }

    /// Clipped ReLU from 32-bit layer outputs into 8-bit activations.
    #[inline]
    pub fn crelu32(input: &[i32], output: &mut [u8]) {
        for (o, &x) in output.iter_mut().zip(input) {
            *o = x.clamp(0, 127) as u8;
        }
    }

    /// `output[i] = (bias[i] + row_i · input) >> shift`, with `weights`
    /// stored row-major by output neuron.
    #[inline]
    pub fn dense(input: &[u8], weights: &[i8], bias: &[i32], output: &mut [i32], shift: u32) {
        let inputs = input.len();
        for (i, out) in output.iter_mut().enumerate() {
            let row = &weights[i * inputs..(i + 1) * inputs];
            *out = dot(input, row).wrapping_add(bias[i]) >> shift;
        }
    }

    /// Single output neuron without rescaling.
    #[inline]
    pub fn output_neuron(input: &[u8], weights: &[i8], bias: i32) -> i32 {
        dot(input, weights).wrapping_add(bias)
    }

    #[inline]
    fn dot(input: &[u8], row: &[i8]) -> i32 {
        input
            .iter()
            .zip(row)
            .fold(0i32, |sum, (&x, &w)| sum.wrapping_add(i32::from(x) * i32::from(w)))
    }
}

/// AVX2 kernels. Slice lengths must be multiples of the register width the
/// dispatcher checks for.
#[cfg(all(target_arch = "x86_64", feature = "simd"))]
pub mod avx2 {
    use std::arch::x86_64::*;

    /// # Safety
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub unsafe fn add_weights(acc: &mut [i16], weights: &[i16]) {
        for (a, w) in acc.chunks_exact_mut(16).zip(weights.chunks_exact(16)) {
            unsafe {
                let va = _mm256_loadu_si256(a.as_ptr().cast());
                let vw = _mm256_loadu_si256(w.as_ptr().cast());
                _mm256_storeu_si256(a.as_mut_ptr().cast(), _mm256_add_epi16(va, vw));
            }
        }
    }

    /// # Safety
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub unsafe fn sub_weights(acc: &mut [i16], weights: &[i16]) {
        for (a, w) in acc.chunks_exact_mut(16).zip(weights.chunks_exact(16)) {
            unsafe {
                let va = _mm256_loadu_si256(a.as_ptr().cast());
                let vw = _mm256_loadu_si256(w.as_ptr().cast());
                _mm256_storeu_si256(a.as_mut_ptr().cast(), _mm256_sub_epi16(va, vw));
            }
        }
    }

    /// # Safety
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub unsafe fn crelu16(input: &[i16], output: &mut [u8]) {
        for (inp, out) in input.chunks_exact(32).zip(output.chunks_exact_mut(32)) {
            unsafe {
                let zero = _mm256_setzero_si256();
                let a = _mm256_loadu_si256(inp.as_ptr().cast());
                let b = _mm256_loadu_si256(inp[16..].as_ptr().cast());
                let packed = _mm256_max_epi8(_mm256_packs_epi16(a, b), zero);
                let ordered = _mm256_permute4x64_epi64::<0b11_01_10_00>(packed);
                _mm256_storeu_si256(out.as_mut_ptr().cast(), ordered);
            }
        }
    }

    /// # Safety
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub unsafe fn crelu32(input: &[i32], output: &mut [u8]) {
        for (inp, out) in input.chunks_exact(32).zip(output.chunks_exact_mut(32)) {
            unsafe {
                let zero = _mm256_setzero_si256();
                let control = _mm256_setr_epi32(0, 4, 1, 5, 2, 6, 3, 7);
                let in0 = _mm256_packs_epi32(
                    _mm256_loadu_si256(inp.as_ptr().cast()),
                    _mm256_loadu_si256(inp[8..].as_ptr().cast()),
                );
                let in1 = _mm256_packs_epi32(
                    _mm256_loadu_si256(inp[16..].as_ptr().cast()),
                    _mm256_loadu_si256(inp[24..].as_ptr().cast()),
                );
                let packed = _mm256_max_epi8(_mm256_packs_epi16(in0, in1), zero);
                let ordered = _mm256_permutevar8x32_epi32(packed, control);
                _mm256_storeu_si256(out.as_mut_ptr().cast(), ordered);
            }
        }
    }

    /// # Safety
    /// The CPU must support AVX2 and `input.len()` must be a multiple of 32.
    #[target_feature(enable = "avx2")]
    pub unsafe fn dense(input: &[u8], weights: &[i8], bias: &[i32], output: &mut [i32], shift: u32) {
        let inputs = input.len();
        for (i, out) in output.iter_mut().enumerate() {
            let row = &weights[i * inputs..(i + 1) * inputs];
            let sum = unsafe { dot(input, row) };
            *out = sum.wrapping_add(bias[i]) >> shift;
        }
    }

    /// # Safety
    /// The CPU must support AVX2 and `input.len()` must be a multiple of 32.
    #[target_feature(enable = "avx2")]
    pub unsafe fn output_neuron(input: &[u8], weights: &[i8], bias: i32) -> i32 {
        unsafe { dot(input, weights) }.wrapping_add(bias)
    }

    #[target_feature(enable = "avx2")]
    unsafe fn dot(input: &[u8], row: &[i8]) -> i32 {
        unsafe {
            let ones = _mm256_set1_epi16(1);
            let mut sum = _mm256_setzero_si256();
            for (x, w) in input.chunks_exact(32).zip(row.chunks_exact(32)) {
                let vx = _mm256_loadu_si256(x.as_ptr().cast());
                let vw = _mm256_loadu_si256(w.as_ptr().cast());
                // u8 activations stay within [0, 127], so the pairwise
                // 16-bit sums cannot saturate.
                let pairs = _mm256_maddubs_epi16(vx, vw);
                sum = _mm256_add_epi32(sum, _mm256_madd_epi16(pairs, ones));
            }
            hsum_epi32(sum)
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn hsum_epi32(v: __m256i) -> i32 {
        unsafe {
            let lo = _mm256_castsi256_si128(v);
            let hi = _mm256_extracti128_si256::<1>(v);
            let s = _mm_add_epi32(lo, hi);
            let s = _mm_add_epi32(s, _mm_shuffle_epi32::<0b01_00_11_10>(s));
            let s = _mm_add_epi32(s, _mm_shuffle_epi32::<0b10_11_00_01>(s));
            _mm_cvtsi128_si32(s)
        }
    }
}

/// Picks the AVX2 kernel when the CPU has it and the shapes fit, and the
/// scalar kernel otherwise.
pub struct SimdDispatcher;

impl SimdDispatcher {
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    #[inline]
    fn use_avx2(lanes: usize, width: usize) -> bool {
        lanes % width == 0 && avx2_supported()
    }

    #[inline]
    pub fn add_weights(acc: &mut [i16], weights: &[i16]) {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if Self::use_avx2(acc.len(), 16) {
            // SAFETY: AVX2 support was detected at runtime.
            unsafe { avx2::add_weights(acc, weights) };
            return;
        }
        scalar::add_weights(acc, weights);
    }

    #[inline]
    pub fn sub_weights(acc: &mut [i16], weights: &[i16]) {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if Self::use_avx2(acc.len(), 16) {
            // SAFETY: AVX2 support was detected at runtime.
            unsafe { avx2::sub_weights(acc, weights) };
            return;
        }
        scalar::sub_weights(acc, weights);
    }

    #[inline]
    pub fn crelu16(input: &[i16], output: &mut [u8]) {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if Self::use_avx2(input.len(), 32) {
            // SAFETY: AVX2 support was detected at runtime.
            unsafe { avx2::crelu16(input, output) };
            return;
        }
        scalar::crelu16(input, output);
    }

    #[inline]
    pub fn crelu32(input: &[i32], output: &mut [u8]) {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if Self::use_avx2(input.len(), 32) {
            // SAFETY: AVX2 support was detected at runtime.
            unsafe { avx2::crelu32(input, output) };
            return;
        }
        scalar::crelu32(input, output);
    }

    #[inline]
    pub fn dense(input: &[u8], weights: &[i8], bias: &[i32], output: &mut [i32], shift: u32) {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if Self::use_avx2(input.len(), 32) {
            // SAFETY: AVX2 support was detected at runtime.
            unsafe { avx2::dense(input, weights, bias, output, shift) };
            return;
        }
        scalar::dense(input, weights, bias, output, shift);
    }

    #[inline]
    pub fn output_neuron(input: &[u8], weights: &[i8], bias: i32) -> i32 {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if Self::use_avx2(input.len(), 32) {
            // SAFETY: AVX2 support was detected at runtime.
            return unsafe { avx2::output_neuron(input, weights, bias) };
        }
        scalar::output_neuron(input, weights, bias)
    }
}
