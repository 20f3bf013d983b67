//! Property tests for OpenTherm word packing

use otlink_core::message::PARITY_BIT;
use otlink_core::{check_parity, with_parity, MessageType, OpenThermMessage};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_packed_word_has_even_parity(
        ty in 0u8..8,
        id in any::<u8>(),
        value in any::<u16>(),
    ) {
        let msg = OpenThermMessage::new(MessageType::from_bits(ty), id, value);
        let word = msg.to_word();

        prop_assert!(check_parity(word));
        prop_assert_eq!(word & 0x0F00_0000, 0);
        prop_assert_eq!(OpenThermMessage::from_word(word), msg);
    }

    #[test]
    fn prop_with_parity_only_touches_bit_31(word in any::<u32>()) {
        let fixed = with_parity(word);
        prop_assert!(check_parity(fixed));
        prop_assert_eq!(fixed & !PARITY_BIT, word & !PARITY_BIT);
    }

    #[test]
    fn prop_f88_roundtrip(raw in any::<i16>()) {
        let mut msg = OpenThermMessage::default();
        msg.set_s16(raw);
        let value = msg.f88();

        let mut again = OpenThermMessage::default();
        again.set_f88(value);
        prop_assert_eq!(again.s16(), raw);
    }
}
