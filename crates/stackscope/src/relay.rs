//! The relay function table and the stack encoder.
//!
//! An identifier is spelled onto the call stack as a chain of calls through
//! 256 distinctly addressed relay functions, one per byte value, bracketed by
//! the `scope_start` and `scope_end` sentinels. While the continuation runs,
//! the stack holds (newest first) the `scope_end` frame, eight relay frames
//! (newest = most significant byte), and the `scope_start` frame: ten extra
//! frames regardless of the identifier's value. The decoder identifies each
//! frame by its function's entry address, so every function here must keep a
//! distinct body and a live frame for the whole call:
//!
//! - `#[inline(never)]` keeps each relay a real call.
//! - `black_box`ing the relay's own byte value gives each body distinct code,
//!   which keeps the linker's identical-code folding from merging them.
//! - `black_box(())` after the dispatch call keeps it out of tail position,
//!   so the frame stays on the stack until the continuation returns.

use std::hint::black_box;

pub(crate) type RelayFn = fn(&[u8], &mut dyn FnMut());

macro_rules! relay_table {
    ($($name:ident = $byte:literal),+ $(,)?) => {
        $(
            #[inline(never)]
            fn $name(rest: &[u8], k: &mut dyn FnMut()) {
                black_box($byte as u8);
                match rest.split_first() {
                    Some((&b, tail)) => RELAYS[b as usize](tail, k),
                    None => scope_end(k),
                }
                black_box(());
            }
        )+

        /// Dispatch table, indexed by the byte value each relay encodes.
        pub(crate) static RELAYS: [RelayFn; 256] = [$($name),+];
    };
}

relay_table! {
    relay_00 = 0x00,
    relay_01 = 0x01,
    relay_02 = 0x02,
    relay_03 = 0x03,
    relay_04 = 0x04,
    relay_05 = 0x05,
    relay_06 = 0x06,
    relay_07 = 0x07,
    relay_08 = 0x08,
    relay_09 = 0x09,
    relay_0a = 0x0a,
    relay_0b = 0x0b,
    relay_0c = 0x0c,
    relay_0d = 0x0d,
    relay_0e = 0x0e,
    relay_0f = 0x0f,
    relay_10 = 0x10,
    relay_11 = 0x11,
    relay_12 = 0x12,
    relay_13 = 0x13,
    relay_14 = 0x14,
    relay_15 = 0x15,
    relay_16 = 0x16,
    relay_17 = 0x17,
    relay_18 = 0x18,
    relay_19 = 0x19,
    relay_1a = 0x1a,
    relay_1b = 0x1b,
    relay_1c = 0x1c,
    relay_1d = 0x1d,
    relay_1e = 0x1e,
    relay_1f = 0x1f,
    relay_20 = 0x20,
    relay_21 = 0x21,
    relay_22 = 0x22,
    relay_23 = 0x23,
    relay_24 = 0x24,
    relay_25 = 0x25,
    relay_26 = 0x26,
    relay_27 = 0x27,
    relay_28 = 0x28,
    relay_29 = 0x29,
    relay_2a = 0x2a,
    relay_2b = 0x2b,
    relay_2c = 0x2c,
    relay_2d = 0x2d,
    relay_2e = 0x2e,
    relay_2f = 0x2f,
    relay_30 = 0x30,
    relay_31 = 0x31,
    relay_32 = 0x32,
    relay_33 = 0x33,
    relay_34 = 0x34,
    relay_35 = 0x35,
    relay_36 = 0x36,
    relay_37 = 0x37,
    relay_38 = 0x38,
    relay_39 = 0x39,
    relay_3a = 0x3a,
    relay_3b = 0x3b,
    relay_3c = 0x3c,
    relay_3d = 0x3d,
    relay_3e = 0x3e,
    relay_3f = 0x3f,
    relay_40 = 0x40,
    relay_41 = 0x41,
    relay_42 = 0x42,
    relay_43 = 0x43,
    relay_44 = 0x44,
    relay_45 = 0x45,
    relay_46 = 0x46,
    relay_47 = 0x47,
    relay_48 = 0x48,
    relay_49 = 0x49,
    relay_4a = 0x4a,
    relay_4b = 0x4b,
    relay_4c = 0x4c,
    relay_4d = 0x4d,
    relay_4e = 0x4e,
    relay_4f = 0x4f,
    relay_50 = 0x50,
    relay_51 = 0x51,
    relay_52 = 0x52,
    relay_53 = 0x53,
    relay_54 = 0x54,
    relay_55 = 0x55,
    relay_56 = 0x56,
    relay_57 = 0x57,
    relay_58 = 0x58,
    relay_59 = 0x59,
    relay_5a = 0x5a,
    relay_5b = 0x5b,
    relay_5c = 0x5c,
    relay_5d = 0x5d,
    relay_5e = 0x5e,
    relay_5f = 0x5f,
    relay_60 = 0x60,
    relay_61 = 0x61,
    relay_62 = 0x62,
    relay_63 = 0x63,
    relay_64 = 0x64,
    relay_65 = 0x65,
    relay_66 = 0x66,
    relay_67 = 0x67,
    relay_68 = 0x68,
    relay_69 = 0x69,
    relay_6a = 0x6a,
    relay_6b = 0x6b,
    relay_6c = 0x6c,
    relay_6d = 0x6d,
    relay_6e = 0x6e,
    relay_6f = 0x6f,
    relay_70 = 0x70,
    relay_71 = 0x71,
    relay_72 = 0x72,
    relay_73 = 0x73,
    relay_74 = 0x74,
    relay_75 = 0x75,
    relay_76 = 0x76,
    relay_77 = 0x77,
    relay_78 = 0x78,
    relay_79 = 0x79,
    relay_7a = 0x7a,
    relay_7b = 0x7b,
    relay_7c = 0x7c,
    relay_7d = 0x7d,
    relay_7e = 0x7e,
    relay_7f = 0x7f,
    relay_80 = 0x80,
    relay_81 = 0x81,
    relay_82 = 0x82,
    relay_83 = 0x83,
    relay_84 = 0x84,
    relay_85 = 0x85,
    relay_86 = 0x86,
    relay_87 = 0x87,
    relay_88 = 0x88,
    relay_89 = 0x89,
    relay_8a = 0x8a,
    relay_8b = 0x8b,
    relay_8c = 0x8c,
    relay_8d = 0x8d,
    relay_8e = 0x8e,
    relay_8f = 0x8f,
    relay_90 = 0x90,
    relay_91 = 0x91,
    relay_92 = 0x92,
    relay_93 = 0x93,
    relay_94 = 0x94,
    relay_95 = 0x95,
    relay_96 = 0x96,
    relay_97 = 0x97,
    relay_98 = 0x98,
    relay_99 = 0x99,
    relay_9a = 0x9a,
    relay_9b = 0x9b,
    relay_9c = 0x9c,
    relay_9d = 0x9d,
    relay_9e = 0x9e,
    relay_9f = 0x9f,
    relay_a0 = 0xa0,
    relay_a1 = 0xa1,
    relay_a2 = 0xa2,
    relay_a3 = 0xa3,
    relay_a4 = 0xa4,
    relay_a5 = 0xa5,
    relay_a6 = 0xa6,
    relay_a7 = 0xa7,
    relay_a8 = 0xa8,
    relay_a9 = 0xa9,
    relay_aa = 0xaa,
    relay_ab = 0xab,
    relay_ac = 0xac,
    relay_ad = 0xad,
    relay_ae = 0xae,
    relay_af = 0xaf,
    relay_b0 = 0xb0,
    relay_b1 = 0xb1,
    relay_b2 = 0xb2,
    relay_b3 = 0xb3,
    relay_b4 = 0xb4,
    relay_b5 = 0xb5,
    relay_b6 = 0xb6,
    relay_b7 = 0xb7,
    relay_b8 = 0xb8,
    relay_b9 = 0xb9,
    relay_ba = 0xba,
    relay_bb = 0xbb,
    relay_bc = 0xbc,
    relay_bd = 0xbd,
    relay_be = 0xbe,
    relay_bf = 0xbf,
    relay_c0 = 0xc0,
    relay_c1 = 0xc1,
    relay_c2 = 0xc2,
    relay_c3 = 0xc3,
    relay_c4 = 0xc4,
    relay_c5 = 0xc5,
    relay_c6 = 0xc6,
    relay_c7 = 0xc7,
    relay_c8 = 0xc8,
    relay_c9 = 0xc9,
    relay_ca = 0xca,
    relay_cb = 0xcb,
    relay_cc = 0xcc,
    relay_cd = 0xcd,
    relay_ce = 0xce,
    relay_cf = 0xcf,
    relay_d0 = 0xd0,
    relay_d1 = 0xd1,
    relay_d2 = 0xd2,
    relay_d3 = 0xd3,
    relay_d4 = 0xd4,
    relay_d5 = 0xd5,
    relay_d6 = 0xd6,
    relay_d7 = 0xd7,
    relay_d8 = 0xd8,
    relay_d9 = 0xd9,
    relay_da = 0xda,
    relay_db = 0xdb,
    relay_dc = 0xdc,
    relay_dd = 0xdd,
    relay_de = 0xde,
    relay_df = 0xdf,
    relay_e0 = 0xe0,
    relay_e1 = 0xe1,
    relay_e2 = 0xe2,
    relay_e3 = 0xe3,
    relay_e4 = 0xe4,
    relay_e5 = 0xe5,
    relay_e6 = 0xe6,
    relay_e7 = 0xe7,
    relay_e8 = 0xe8,
    relay_e9 = 0xe9,
    relay_ea = 0xea,
    relay_eb = 0xeb,
    relay_ec = 0xec,
    relay_ed = 0xed,
    relay_ee = 0xee,
    relay_ef = 0xef,
    relay_f0 = 0xf0,
    relay_f1 = 0xf1,
    relay_f2 = 0xf2,
    relay_f3 = 0xf3,
    relay_f4 = 0xf4,
    relay_f5 = 0xf5,
    relay_f6 = 0xf6,
    relay_f7 = 0xf7,
    relay_f8 = 0xf8,
    relay_f9 = 0xf9,
    relay_fa = 0xfa,
    relay_fb = 0xfb,
    relay_fc = 0xfc,
    relay_fd = 0xfd,
    relay_fe = 0xfe,
    relay_ff = 0xff,
}

/// Marks the oldest boundary of an encoded identifier and dispatches the
/// first byte.
#[inline(never)]
pub(crate) fn scope_start(bytes: &[u8], k: &mut dyn FnMut()) {
    black_box(0x100u16);
    match bytes.split_first() {
        Some((&b, tail)) => RELAYS[b as usize](tail, k),
        None => scope_end(k),
    }
    black_box(());
}

/// Marks the newest boundary of an encoded identifier and runs the
/// continuation underneath it.
#[inline(never)]
pub(crate) fn scope_end(k: &mut dyn FnMut()) {
    black_box(0x101u16);
    k();
    black_box(());
}

/// Runs `k` underneath a relay chain spelling out `id`.
///
/// Bytes are dispatched least-significant first, so the oldest relay frame
/// carries the low byte and the newest carries the high byte; the decoder
/// reassembles the value by shifting as it walks newest to oldest.
pub(crate) fn encode(id: u64, k: &mut dyn FnMut()) {
    scope_start(&id.to_le_bytes(), k);
}
