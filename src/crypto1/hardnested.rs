//! Hardnested-attack precomputed state tables.
//!
//! Ground truth: `client/deps/hardnested/hardnested_tables.c` (Meijer &
//! Verdult's ciphertext-only attack on hardened MIFARE Classic cards). The
//! original is an offline, single-purpose generator expected to run for
//! hours to days over the full 2^24-state space; this port keeps its bitset
//! algorithms and data layout but takes `max_states` as a parameter instead
//! of a compile-time `TEST_RUN` `#define`, so the same code path is usable
//! both for a production-scale run and for a fast unit test over a
//! truncated space.

use crate::crypto1::filter;
use crate::util::parity::evenparity32;

pub const NUM_PART_SUMS: usize = 9;
pub const BITFLIP_2ND_BYTE: u16 = 0x0200;

const BITARRAY_BITS: u32 = 1 << 24;
const BITARRAY_WORDS: usize = 1 << 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddEven {
    Even = 0,
    Odd = 1,
}

/// A 2^24-bit packed bitset, MSB-first within each `u32` word (bit `index`
/// lives at `words[index >> 5]`, masked by `0x8000_0000 >> (index & 0x1f)`),
/// matching `set_bit24`/`test_bit24`.
#[derive(Clone)]
pub struct BitArray24 {
    words: Vec<u32>,
}

impl BitArray24 {
    pub fn new() -> Self {
        BitArray24 {
            words: vec![0u32; BITARRAY_WORDS],
        }
    }

    #[inline]
    pub fn test_bit(&self, index: u32) -> bool {
        self.words[(index >> 5) as usize] & (0x8000_0000u32 >> (index & 0x1f)) != 0
    }

    #[inline]
    pub fn set_bit(&mut self, index: u32) {
        self.words[(index >> 5) as usize] |= 0x8000_0000u32 >> (index & 0x1f);
    }

    pub fn or_with(&mut self, other: &BitArray24) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    pub fn count_states(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

impl Default for BitArray24 {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the next set bit strictly after `state` (pass `u32::MAX` to find
/// the first), or `1<<24` when none remain.
pub fn next_state(bitset: &[u32], state: u32) -> u32 {
    let mut state = state.wrapping_add(1);
    if state == BITARRAY_BITS {
        return BITARRAY_BITS;
    }
    let mut index = (state >> 5) as usize;
    let mut bit = state & 0x1f;
    let mut line = bitset[index] << bit;
    while bit <= 0x1f {
        if line & 0x8000_0000 != 0 {
            return state;
        }
        state += 1;
        bit += 1;
        line <<= 1;
    }
    index += 1;
    while index < bitset.len() && bitset[index] == 0 && state < BITARRAY_BITS {
        index += 1;
        state += 0x20;
    }
    if state >= BITARRAY_BITS || index >= bitset.len() {
        return BITARRAY_BITS;
    }
    state + bitset[index].leading_zeros()
}

/// Finds the next *unset* bit strictly after `state`, complement of
/// [`next_state`].
pub fn next_not_state(bitset: &[u32], state: u32) -> u32 {
    let mut state = state.wrapping_add(1);
    if state == BITARRAY_BITS {
        return BITARRAY_BITS;
    }
    let mut index = (state >> 5) as usize;
    let mut bit = state & 0x1f;
    let mut line = bitset[index] << bit;
    while bit <= 0x1f {
        if line & 0x8000_0000 == 0 {
            return state;
        }
        state += 1;
        bit += 1;
        line <<= 1;
    }
    index += 1;
    while index < bitset.len() && bitset[index] == 0xFFFF_FFFF && state < BITARRAY_BITS {
        index += 1;
        state += 0x20;
    }
    if state >= BITARRAY_BITS || index >= bitset.len() {
        return BITARRAY_BITS;
    }
    state + (!bitset[index]).leading_zeros()
}

/// Sum (over the 16 low-bit completions of `state`) of the filter-function
/// parity contributed by the high 20 bits, split by odd/even register.
pub fn partial_sum_property(state: u32, odd_even: OddEven) -> u16 {
    let mut sum: u16 = 0;
    for j in 0u16..16 {
        let mut st = state;
        let mut part_sum: u16 = 0;
        if odd_even == OddEven::Odd {
            part_sum ^= filter(st) as u16;
            for i in 0u16..4 {
                st = (st << 1) | (((j >> (3 - i)) & 1) as u32);
                part_sum ^= filter(st) as u16;
            }
            part_sum ^= 1;
        } else {
            for i in 0u16..4 {
                st = (st << 1) | (((j >> (3 - i)) & 1) as u32);
                part_sum ^= filter(st) as u16;
            }
        }
        sum += part_sum;
    }
    sum
}

pub struct PartSumBitarrays {
    pub even: [BitArray24; NUM_PART_SUMS],
    pub odd: [BitArray24; NUM_PART_SUMS],
}

/// Builds, for each odd/even register and each possible partial-sum value
/// 0..9, the set of 24-bit states whose top 20 bits have that partial sum
/// (the low 4 bits are free, hence the `state<<4|low_bits` expansion).
pub fn init_part_sum_bitarrays() -> PartSumBitarrays {
    let mut even: [BitArray24; NUM_PART_SUMS] = std::array::from_fn(|_| BitArray24::new());
    let mut odd: [BitArray24; NUM_PART_SUMS] = std::array::from_fn(|_| BitArray24::new());
    for odd_even in [OddEven::Even, OddEven::Odd] {
        let target = match odd_even {
            OddEven::Even => &mut even,
            OddEven::Odd => &mut odd,
        };
        for state in 0u32..(1 << 20) {
            let part_sum_a0 = (partial_sum_property(state, odd_even) / 2) as usize;
            for low_bits in 0u32..16 {
                target[part_sum_a0].set_bit((state << 4) | low_bits);
            }
        }
    }
    PartSumBitarrays { even, odd }
}

pub struct SumBitarrays {
    pub even: BitArray24,
    pub odd: BitArray24,
}

/// Combines the partial-sum tables for every `(p, q)` pair whose
/// `2p(16-2q)+(16-2p)2q` decomposition equals `sum_a0`, the total-sum
/// property a nested-auth nonce stream must satisfy.
pub fn init_sum_bitarray(parts: &PartSumBitarrays, sum_a0: i32) -> SumBitarrays {
    let mut even = BitArray24::new();
    let mut odd = BitArray24::new();
    for p in 0..NUM_PART_SUMS {
        for q in 0..NUM_PART_SUMS {
            let (pi, qi) = (p as i32, q as i32);
            if sum_a0 == 2 * pi * (16 - 2 * qi) + (16 - 2 * pi) * 2 * qi {
                even.or_with(&parts.even[q]);
                odd.or_with(&parts.odd[p]);
            }
        }
    }
    SumBitarrays { even, odd }
}

/// Runs the 9-bit delta-state keystream model used to decide whether a
/// given `(even_state, odd_state)` pair is consistent with `nt_pattern`'s
/// bitflip property, mirroring the inner loop of
/// `precalculate_bit0_bitflip_bitarrays`.
fn decrypt_9_bits(even_state: u32, odd_state: u32, nt_pattern: u16) -> u16 {
    let mut cs_odd = odd_state >> 4;
    let mut cs_even = even_state >> 4;
    let mut delta_odd: u8 = 0;
    let mut delta_even: u8 = 0;
    let mut keystream: u16 = 0;

    for i in 0u32..9 {
        let ks_bit = filter(cs_odd & 0x000F_FFFF) ^ filter((cs_odd & 0x000F_FFFF) ^ delta_odd as u32);
        keystream = (keystream << 1) | ks_bit as u16;
        let nt_bit = (((nt_pattern >> i) & 1) as u8) ^ ks_bit;
        let lfsr_feedback = ((delta_odd >> 2) & 1) ^ ((delta_even >> 2) & 1) ^ ((delta_odd >> 3) & 1);
        let new_delta_even = (delta_even << 1) | (lfsr_feedback ^ nt_bit);
        let tmp = delta_odd;
        delta_odd = new_delta_even;
        delta_even = tmp;

        cs_even = cs_odd;
        cs_odd = if i & 1 == 1 {
            odd_state >> ((7 - i) / 2)
        } else {
            even_state >> ((7 - i) / 2)
        };
    }
    let _ = cs_even;
    keystream
}

fn build_2nd_byte_bitarray(bits: &BitArray24) -> BitArray24 {
    let mut out = BitArray24::new();
    let mut state: u32 = 0;
    while state < BITARRAY_BITS {
        let line = bits.words()[(state >> 5) as usize];
        let half_line: u16 = if state & 0x10 != 0 {
            (line & 0x0000_FFFF) as u16
        } else {
            (line >> 16) as u16
        };
        if half_line != 0 {
            for low_bits in 0u32..16 {
                out.set_bit((low_bits << 20) | (state >> 4));
            }
        }
        state += 1 << 4;
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct BitflipEntry {
    pub odd_even: OddEven,
    pub bitflip: u16,
    pub sum_a0: i32,
    pub count: u32,
}

pub struct BitflipTableSet {
    pub tables: Vec<(BitflipEntry, BitArray24)>,
}

impl BitflipTableSet {
    fn push_if_eliminates_states(&mut self, odd_even: OddEven, bitflip: u16, sum_a0: i32, bits: BitArray24) {
        let count = bits.count_states();
        if count != BITARRAY_BITS {
            self.tables.push((
                BitflipEntry {
                    odd_even,
                    bitflip,
                    sum_a0,
                    count,
                },
                bits,
            ));
        }
    }
}

/// Computes the bitflip-property state tables for `bitflip` (and its
/// complement `bitflip|0x100`, and each one's "2nd byte" derivative), over
/// `sum_bitarrays`-restricted states. `max_states` truncates the outer
/// even-state sweep (the original hardcodes `1<<23`; pass `None` for that
/// production default, or a small value in tests).
pub fn precalculate_bit0_bitflip_bitarrays(
    bitflip: u16,
    sum_a0: i32,
    sum_bitarrays: &SumBitarrays,
    max_states: Option<u32>,
) -> BitflipTableSet {
    let num_test_states = max_states.unwrap_or(1 << 23);
    let mut test_bitarray = [BitArray24::new(), BitArray24::new()];
    let mut test_not_bitarray = [BitArray24::new(), BitArray24::new()];
    let mut all_odd_states_possible_for_notbitflip = false;

    let even_idx = OddEven::Even as usize;
    let odd_idx = OddEven::Odd as usize;

    let mut even_state = next_state(sum_bitarrays.even.words(), u32::MAX);
    while even_state < num_test_states {
        let mut even_state_is_possible = false;
        let mut odd_state = next_state(sum_bitarrays.odd.words(), u32::MAX);
        while odd_state < BITARRAY_BITS {
            if even_state_is_possible && test_bitarray[odd_idx].test_bit(odd_state) {
                odd_state = next_state(test_bitarray[odd_idx].words(), odd_state);
                continue;
            }
            let keystream = decrypt_9_bits(even_state, odd_state, bitflip);
            if evenparity32(keystream as u32) == evenparity32(bitflip as u32) {
                even_state_is_possible = true;
                test_bitarray[even_idx].set_bit(even_state);
                test_bitarray[even_idx].set_bit((1 << 23) | even_state);
                test_bitarray[odd_idx].set_bit(odd_state);
            } else {
                test_not_bitarray[even_idx].set_bit(even_state);
                test_not_bitarray[even_idx].set_bit((1 << 23) | even_state);
                test_not_bitarray[odd_idx].set_bit(odd_state);
            }
            odd_state = next_state(test_bitarray[odd_idx].words(), odd_state);
        }
        if !even_state_is_possible {
            all_odd_states_possible_for_notbitflip = true;
        }
        even_state = next_state(sum_bitarrays.even.words(), even_state);
    }
    let _ = all_odd_states_possible_for_notbitflip;

    let mut out = BitflipTableSet { tables: Vec::new() };
    for (odd_even, idx) in [(OddEven::Even, even_idx), (OddEven::Odd, odd_idx)] {
        let bits = test_bitarray[idx].clone();
        if bits.count_states() != BITARRAY_BITS {
            let second = build_2nd_byte_bitarray(&bits);
            out.push_if_eliminates_states(odd_even, bitflip | BITFLIP_2ND_BYTE, sum_a0, second);
        }
        out.push_if_eliminates_states(odd_even, bitflip, sum_a0, bits);
    }

    // Second pass: the "not bitflip" property (bitflip | 0x100).
    let not_bitflip = bitflip | 0x100;
    let mut even_state = next_state(sum_bitarrays.even.words(), u32::MAX);
    while even_state < num_test_states {
        let mut even_state_is_possible = test_not_bitarray[even_idx].test_bit(even_state);
        let mut odd_state = next_state(sum_bitarrays.odd.words(), u32::MAX);
        while odd_state < BITARRAY_BITS {
            if even_state_is_possible {
                if all_odd_states_possible_for_notbitflip {
                    break;
                }
                if test_not_bitarray[odd_idx].test_bit(odd_state) {
                    odd_state = next_state(sum_bitarrays.odd.words(), odd_state);
                    continue;
                }
            }
            let keystream = decrypt_9_bits(even_state, odd_state, not_bitflip);
            if evenparity32(keystream as u32) != evenparity32(bitflip as u32) {
                even_state_is_possible = true;
                test_not_bitarray[even_idx].set_bit(even_state);
                test_not_bitarray[even_idx].set_bit((1 << 23) | even_state);
                test_not_bitarray[odd_idx].set_bit(odd_state);
            }
            odd_state = next_state(sum_bitarrays.odd.words(), odd_state);
        }
        even_state = next_state(sum_bitarrays.even.words(), even_state);
    }

    for (odd_even, idx) in [(OddEven::Even, even_idx), (OddEven::Odd, odd_idx)] {
        let bits = test_not_bitarray[idx].clone();
        if bits.count_states() != BITARRAY_BITS {
            let second = build_2nd_byte_bitarray(&bits);
            out.push_if_eliminates_states(odd_even, not_bitflip | BITFLIP_2ND_BYTE, sum_a0, second);
        }
        out.push_if_eliminates_states(odd_even, not_bitflip, sum_a0, bits);
    }

    out
}

/// Filename convention for a precomputed table (`write_bitflips_file`).
pub fn bitflip_filename(entry: &BitflipEntry) -> String {
    format!(
        "bitflip_{}_{:03x}_sum{}_states.bin",
        entry.odd_even as u8, entry.bitflip, entry.sum_a0
    )
}

/// Serializes a table to the on-disk layout: a little-endian `u32` state
/// count followed by the raw bitset words.
pub fn serialize_bitflip_table(count: u32, bits: &BitArray24) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + bits.words().len() * 4);
    out.extend_from_slice(&count.to_le_bytes());
    for w in bits.words() {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}
