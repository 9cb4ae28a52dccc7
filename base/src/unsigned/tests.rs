use super::{
    ConversionFailed, Unsigned14Bit, Unsigned15Bit, Unsigned18Bit, Unsigned24Bit, Unsigned36Bit,
    Unsigned3Bit, Unsigned72Bit,
};

macro_rules! assert_octal_eq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    panic!(
                        "Assertion failed: {:>#012o} != {:>#012o}",
                        left_val, right_val
                    );
                }
            }
        }
    }};
}

#[test]
fn test_max_values() {
    assert_eq!(Unsigned3Bit::MAX.bits, 0o7);
    assert_eq!(Unsigned14Bit::MAX.bits, 0o37_777);
    assert_eq!(Unsigned15Bit::MAX.bits, 0o77_777);
    assert_eq!(Unsigned18Bit::MAX.bits, 0o777_777);
    assert_eq!(Unsigned24Bit::MAX.bits, 0o77_777_777);
    assert_eq!(Unsigned36Bit::MAX.bits, 0o777_777_777_777);
    assert_eq!(Unsigned72Bit::MAX.bits, (1_u128 << 72) - 1);
}

#[test]
fn test_try_from_native() {
    assert_eq!(Unsigned3Bit::try_from(7_u8), Ok(Unsigned3Bit { bits: 7 }));
    assert_eq!(Unsigned3Bit::try_from(8_u8), Err(ConversionFailed::TooLarge));
    assert_eq!(Unsigned3Bit::try_from(-1_i32), Err(ConversionFailed::TooSmall));
    assert_eq!(
        Unsigned18Bit::try_from(0o1_000_000_u32),
        Err(ConversionFailed::TooLarge)
    );
    assert_eq!(
        Unsigned36Bit::try_from(1_u64 << 36),
        Err(ConversionFailed::TooLarge)
    );
    assert_eq!(
        Unsigned36Bit::try_from((1_u64 << 36) - 1),
        Ok(Unsigned36Bit::MAX)
    );
    assert_eq!(
        Unsigned72Bit::try_from(1_u128 << 72),
        Err(ConversionFailed::TooLarge)
    );
}

#[test]
fn test_try_from_self() {
    assert_eq!(u8::try_from(Unsigned14Bit::from(0o377_u8)), Ok(0o377_u8));
    assert_eq!(
        u8::try_from(Unsigned14Bit { bits: 0o400 }),
        Err(ConversionFailed::TooLarge)
    );
    assert_eq!(
        u32::try_from(Unsigned36Bit { bits: 1 << 33 }),
        Err(ConversionFailed::TooLarge)
    );
}

#[test]
fn test_const_constructor_macros() {
    assert_eq!(crate::u3!(5), Unsigned3Bit::try_from(5_u8).unwrap());
    assert_eq!(
        crate::u24!(0o100_000),
        Unsigned24Bit::try_from(0o100_000_u32).unwrap()
    );
    assert_eq!(
        crate::u36!(0o777_777_777_777),
        Unsigned36Bit::MAX
    );
}

#[test]
fn test_from_truncated() {
    assert_octal_eq!(Unsigned18Bit::from_truncated(0o1_234_567), Unsigned18Bit { bits: 0o234_567 });
    assert_eq!(Unsigned3Bit::from_truncated(0o17), Unsigned3Bit::MAX);
}

#[test]
fn test_wrapping_arithmetic() {
    assert_eq!(
        Unsigned18Bit::MAX.wrapping_add(Unsigned18Bit::ONE),
        Unsigned18Bit::ZERO
    );
    assert_eq!(
        Unsigned18Bit::ZERO.wrapping_sub(Unsigned18Bit::ONE),
        Unsigned18Bit::MAX
    );
    assert_eq!(
        Unsigned24Bit::MAX.wrapping_add(Unsigned24Bit::from(2_u8)),
        Unsigned24Bit::ONE
    );
    assert_eq!(Unsigned3Bit::MAX.checked_add(Unsigned3Bit::ONE), None);
    assert_eq!(
        Unsigned3Bit::ONE.checked_add(Unsigned3Bit::ONE),
        Some(Unsigned3Bit { bits: 2 })
    );
}

#[test]
fn test_widening() {
    let seg = Unsigned15Bit::MAX;
    assert_eq!(u32::from(Unsigned18Bit::from(seg)), 0o77_777);
    let half = Unsigned18Bit::MAX;
    assert_eq!(u64::from(Unsigned36Bit::from(half)), 0o777_777);
    let word = Unsigned36Bit::MAX;
    assert_eq!(u128::from(Unsigned72Bit::from(word)), 0o777_777_777_777);
}

#[test]
fn test_ring_ordering() {
    // Ring comparisons are plain unsigned comparisons.
    let rings: Vec<Unsigned3Bit> = (0..8_u8)
        .map(|r| Unsigned3Bit::try_from(r).unwrap())
        .collect();
    for pair in rings.windows(2) {
        assert!(pair[0] < pair[1]);
    }
    assert_eq!(rings.iter().max(), Some(&Unsigned3Bit::MAX));
}

#[test]
fn test_display_is_octal() {
    assert_eq!(Unsigned24Bit::from(0o100_000_u16).to_string(), "100000");
    assert_eq!(
        format!("{:?}", Unsigned18Bit::from(8_u8)),
        "Unsigned18Bit{bits: 0o10}"
    );
    assert_eq!(format!("{:>06o}", Unsigned18Bit::from(8_u8)), "000010");
}

#[test]
fn test_not() {
    assert_eq!(!Unsigned14Bit::ZERO, Unsigned14Bit::MAX);
    assert_eq!(!Unsigned36Bit::MAX, Unsigned36Bit::ZERO);
}
