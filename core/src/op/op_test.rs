use super::*;

#[test]
fn bytes_round_trip_through_table() {
    for &op in Opcode::ALL {
        assert_eq!(Opcode::from_byte(op as u8), Some(op), "{op}");
    }
}

#[test]
fn unassigned_bytes_are_rejected() {
    assert_eq!(Opcode::from_byte(0x3f), None);
    assert_eq!(Opcode::from_byte(0x80), None);
    assert_eq!(Opcode::from_byte(0xff), None);
}

#[test]
fn has_arg_follows_threshold() {
    assert!(!Opcode::BinaryAdd.has_arg());
    assert!(!Opcode::Return.has_arg());
    assert!(Opcode::LoadConst.has_arg());
    assert!(Opcode::Checkstack.has_arg());
    // Operand-driven effects only make sense on opcodes that carry one.
    for &op in Opcode::ALL {
        if !op.has_arg() {
            assert!(matches!(op.stack_effect(), StackEffect::Fixed(_)), "{op}");
        }
    }
}

#[test]
fn mnemonics_are_unique_and_parse_back() {
    let mut seen = std::collections::HashSet::new();
    for &op in Opcode::ALL {
        assert!(seen.insert(op.mnemonic()), "duplicate mnemonic {}", op.mnemonic());
        assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
    }
    assert_eq!(Opcode::from_mnemonic("load_const"), Some(Opcode::LoadConst));
    assert_eq!(Opcode::from_mnemonic("NOT_AN_OP"), None);
}

#[test]
fn operand_driven_effects() {
    assert_eq!(StackEffect::Fixed(-1).apply(99), -1);
    assert_eq!(StackEffect::MinusArg.apply(3), -3);
    assert_eq!(StackEffect::MinusArgPlusOne.apply(3), -2);
    assert_eq!(StackEffect::MinusArgPlusOne.apply(0), 1);
    assert_eq!(StackEffect::MinusTwiceArgPlusOne.apply(2), -3);
    assert_eq!(StackEffect::MinusTwiceArgPlusOne.apply(0), 1);
}
