//! Property-based invariants of the stream engine and processors.

use oxibin_runtime::prelude::*;
use proptest::prelude::*;

fn mask_to(n: u32, val: u64) -> u64 {
    if n == 64 {
        val
    } else {
        val & ((1u64 << n) - 1)
    }
}

proptest! {
    #[test]
    fn bit_round_trip_be(n in 1u32..=64, val in any::<u64>()) {
        let val = mask_to(n, val);
        let mut s = Stream::with_size(8);
        s.write_bits_be(n, val).unwrap();
        s.write_align_to_byte().unwrap();
        s.seek(0).unwrap();
        prop_assert_eq!(s.read_bits_be(n).unwrap(), val);
    }

    #[test]
    fn bit_round_trip_le(n in 1u32..=64, val in any::<u64>()) {
        let val = mask_to(n, val);
        let mut s = Stream::with_size(8);
        s.write_bits_le(n, val).unwrap();
        s.write_align_to_byte().unwrap();
        s.seek(0).unwrap();
        prop_assert_eq!(s.read_bits_le(n).unwrap(), val);
    }

    #[test]
    fn bit_pair_round_trip_be(
        n1 in 1u32..=32,
        n2 in 1u32..=32,
        v1 in any::<u64>(),
        v2 in any::<u64>(),
    ) {
        let (v1, v2) = (mask_to(n1, v1), mask_to(n2, v2));
        let mut s = Stream::with_size(9);
        s.write_bits_be(n1, v1).unwrap();
        s.write_bits_be(n2, v2).unwrap();
        s.write_align_to_byte().unwrap();
        s.seek(0).unwrap();
        prop_assert_eq!(s.read_bits_be(n1).unwrap(), v1);
        prop_assert_eq!(s.read_bits_be(n2).unwrap(), v2);
    }

    #[test]
    fn bit_pair_round_trip_le(
        n1 in 1u32..=32,
        n2 in 1u32..=32,
        v1 in any::<u64>(),
        v2 in any::<u64>(),
    ) {
        let (v1, v2) = (mask_to(n1, v1), mask_to(n2, v2));
        let mut s = Stream::with_size(9);
        s.write_bits_le(n1, v1).unwrap();
        s.write_bits_le(n2, v2).unwrap();
        s.write_align_to_byte().unwrap();
        s.seek(0).unwrap();
        prop_assert_eq!(s.read_bits_le(n1).unwrap(), v1);
        prop_assert_eq!(s.read_bits_le(n2).unwrap(), v2);
    }

    #[test]
    fn primitive_round_trip_u4(val in any::<u32>()) {
        let mut s = Stream::with_size(8);
        s.write_u4be(val).unwrap();
        s.write_u4le(val).unwrap();
        s.seek(0).unwrap();
        prop_assert_eq!(s.read_u4be().unwrap(), val);
        prop_assert_eq!(s.read_u4le().unwrap(), val);
    }

    #[test]
    fn primitive_round_trip_s8(val in any::<i64>()) {
        let mut s = Stream::with_size(16);
        s.write_s8be(val).unwrap();
        s.write_s8le(val).unwrap();
        s.seek(0).unwrap();
        prop_assert_eq!(s.read_s8be().unwrap(), val);
        prop_assert_eq!(s.read_s8le().unwrap(), val);
    }

    #[test]
    fn zlib_round_trip(data in any::<Vec<u8>>()) {
        let framed = unprocess_zlib(&data).unwrap();
        prop_assert_eq!(process_zlib(&framed).unwrap(), data);
    }

    #[test]
    fn rotate_inverse(data in any::<Vec<u8>>(), amount in -7i32..=7) {
        let there = process_rotate_left(&data, amount, 1).unwrap();
        let back = process_rotate_left(&there, -amount, 1).unwrap();
        prop_assert_eq!(back, data);
    }

    #[test]
    fn xor_involution(data in any::<Vec<u8>>(), key in any::<u8>()) {
        let twice = process_xor_one(&process_xor_one(&data, key), key);
        prop_assert_eq!(twice, data);
    }

    #[test]
    fn modulo_in_range(a in any::<i64>(), b in 1i64..=1_000_000) {
        let m = modulo(a, b).unwrap();
        prop_assert!((0..b).contains(&m));
    }

    #[test]
    fn compare_is_antisymmetric(a in any::<Vec<u8>>(), b in any::<Vec<u8>>()) {
        prop_assert_eq!(byte_array_compare(&a, &b), byte_array_compare(&b, &a).reverse());
        prop_assert_eq!(byte_array_compare(&a, &b).is_eq(), a == b);
    }

    #[test]
    fn string_reverse_involution(s in "[a-zA-Z0-9 àéß日本語🦀]*") {
        prop_assert_eq!(string_reverse(&string_reverse(&s)), s);
    }
}
