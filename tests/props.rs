use proptest::prelude::*;
use rv5soc_core::{
    decode, decode_address, disasm, BusTarget, DataBus, Op, Soc, OUT_REG_ADDR, RAM_BASE, RAM_END,
    RAM_WORDS,
};

proptest! {
    #[test]
    fn decode_accepts_every_word(word in any::<u32>()) {
        let instr = decode(word);
        prop_assert_eq!(instr.word, word);
        prop_assert!(instr.rd < 32 && instr.rs1 < 32 && instr.rs2 < 32);
        if let Some(Op::Lui) = instr.op {
            prop_assert_eq!(instr.imm_u, word & 0xFFFF_F000);
        }
        // Rendering must be total as well.
        prop_assert!(!disasm(word).is_empty());
    }

    #[test]
    fn the_address_map_is_a_partition(addr in any::<u32>()) {
        let in_ram = (RAM_BASE..RAM_END).contains(&addr);
        match decode_address(addr) {
            BusTarget::Ram { word_index } => {
                prop_assert!(in_ram, "0x{:08X} routed to ram outside its range", addr);
                prop_assert_eq!(word_index, ((addr - RAM_BASE) >> 2) as usize);
                prop_assert!(word_index < RAM_WORDS);
            }
            BusTarget::OutputReg => prop_assert_eq!(addr, OUT_REG_ADDR),
            BusTarget::Unmapped => {
                prop_assert!(!in_ram && addr != OUT_REG_ADDR, "0x{:08X} must route somewhere", addr);
            }
        }
    }

    #[test]
    fn masked_stores_replace_exactly_the_selected_lanes(
        current in any::<u32>(),
        data in any::<u32>(),
        mask in 0u8..16,
    ) {
        let mut bus = DataBus::new();
        bus.issue_write(RAM_BASE, current, 0b1111);
        bus.tick();
        bus.issue_write(RAM_BASE, data, mask);
        bus.tick();

        let mut expected = current;
        for lane in 0..4 {
            if mask & (1 << lane) != 0 {
                let bits = 0xFFu32 << (lane * 8);
                expected = (expected & !bits) | (data & bits);
            }
        }
        prop_assert_eq!(bus.ram.word(0), expected);
    }

    #[test]
    fn unmapped_stores_leave_every_store_untouched(addr in any::<u32>(), data in any::<u32>()) {
        prop_assume!(matches!(decode_address(addr), BusTarget::Unmapped));

        let mut bus = DataBus::new();
        bus.issue_write(RAM_BASE + 8, 0x5A5A_5A5A, 0b1111);
        bus.tick();
        bus.issue_write(addr, data, 0b1111);
        bus.tick();

        prop_assert_eq!(bus.ram.word(2), 0x5A5A_5A5A);
        prop_assert_eq!(bus.out.value(), 0);
    }

    #[test]
    fn arbitrary_images_never_stop_the_clock(
        image in proptest::collection::vec(any::<u32>(), 1..64),
        ticks in 1u64..300,
    ) {
        let mut soc = Soc::new(&image).expect("image fits the instruction store");
        soc.tick(true);
        for _ in 0..ticks {
            soc.tick(false);
        }
        prop_assert_eq!(soc.cycle_count(), ticks);
        prop_assert_eq!(soc.cpu.reg(0), 0);
    }
}
