//! Stack decoder: recovers an encoded identifier from the live call stack.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use backtrace::Frame;
use once_cell::sync::OnceCell;

use crate::relay::{encode, scope_end, scope_start, RelayFn, RELAYS};

/// Upper bound on `scope_end`'s code size in bytes. An instruction pointer in
/// `[entry, entry + SCOPE_END_SPAN)` is a candidate scope boundary and gets
/// the expensive symbol-address confirmation; anything outside is skipped
/// without resolving. Generous on purpose: too wide costs a few wasted
/// confirmations, too narrow silently drops live bindings.
const SCOPE_END_SPAN: usize = 512;

/// Entry address -> byte value for every relay, plus the sentinel addresses.
/// Built once from the dispatch table; read-only afterward.
struct AddressIndex {
    start: usize,
    end: usize,
    bytes: HashMap<usize, u8>,
}

fn index() -> &'static AddressIndex {
    static INDEX: OnceCell<AddressIndex> = OnceCell::new();
    INDEX.get_or_init(|| {
        let mut bytes = HashMap::with_capacity(RELAYS.len());
        for (value, &relay) in RELAYS.iter().enumerate() {
            bytes.insert(relay as usize, value as u8);
        }
        AddressIndex {
            start: scope_start as RelayFn as usize,
            end: scope_end as fn(&mut dyn FnMut()) as usize,
            bytes,
        }
    })
}

fn capture() -> Vec<Frame> {
    let mut frames = Vec::with_capacity(64);
    backtrace::trace(|frame| {
        frames.push(frame.clone());
        true
    });
    frames
}

/// Recovers the innermost encoded identifier from the current thread's
/// stack, or `None` when no scope encloses the caller.
///
/// Frames arrive newest first. The first confirmed `scope_end` frame belongs
/// to the innermost active scope; the identifier is reassembled from the
/// relay frames between it and the matching `scope_start`.
pub(crate) fn decode() -> Option<u64> {
    let frames = capture();
    let idx = index();
    for (i, frame) in frames.iter().enumerate() {
        let ip = frame.ip() as usize;
        if ip < idx.end || ip >= idx.end + SCOPE_END_SPAN {
            continue;
        }
        if frame.symbol_address() as usize != idx.end {
            // A neighbor of scope_end in the image, not a scope boundary.
            continue;
        }
        return Some(walk(&frames[i + 1..]));
    }
    None
}

/// Reference decoder: confirms every frame through symbol resolution with no
/// address-range pre-filter. Slower than [`decode`] but independent of
/// `SCOPE_END_SPAN`; the two must always agree.
pub(crate) fn decode_unfiltered() -> Option<u64> {
    let frames = capture();
    let idx = index();
    for (i, frame) in frames.iter().enumerate() {
        if frame.symbol_address() as usize == idx.end {
            return Some(walk(&frames[i + 1..]));
        }
    }
    None
}

/// Walks the frames older than a confirmed `scope_end`, accumulating one
/// byte per relay frame until `scope_start`. Ordinary frames interposed by
/// helper calls are skipped. A boundary that cannot be completed means the
/// stack no longer matches any valid encoding; returning a guessed
/// identifier would silently resolve to the wrong binding, so this panics
/// instead.
fn walk(older: &[Frame]) -> u64 {
    let idx = index();
    let mut value = 0u64;
    let mut matched = 0u32;
    for frame in older {
        let entry = frame.symbol_address() as usize;
        if entry == idx.start {
            assert!(
                matched == 8,
                "scope boundary held {matched} relay frames, expected 8"
            );
            return value;
        }
        if let Some(&byte) = idx.bytes.get(&entry) {
            value = (value << 8) | u64::from(byte);
            matched += 1;
        }
    }
    panic!("scope-end frame with no scope-start below it");
}

/// Verifies the relay table survived codegen intact: 256 distinct entry
/// addresses, sentinels distinct from every relay, and probe identifiers
/// that round-trip through the live stack under both decoders.
///
/// Cheap enough to run at startup in binaries that cannot afford a wrong
/// binding; a failure means the build flags merged or inlined relay
/// functions and the crate must not be used.
pub fn table_self_check() -> Result<()> {
    let idx = index();
    if idx.bytes.len() != RELAYS.len() {
        bail!(
            "relay table resolved to {} distinct entry addresses, expected {}; \
             identical-code folding has merged relay functions",
            idx.bytes.len(),
            RELAYS.len()
        );
    }
    if idx.bytes.contains_key(&idx.start) || idx.bytes.contains_key(&idx.end) {
        bail!("a sentinel shares its entry address with a relay function");
    }
    for &probe in &[0u64, 1, 0x8000_0000_0000_0000, 0x0011_2233, u64::MAX] {
        roundtrip(probe).with_context(|| format!("probe id {probe:#018x}"))?;
    }
    Ok(())
}

fn roundtrip(probe: u64) -> Result<()> {
    let mut seen = (None, None);
    encode(probe, &mut || {
        seen = (decode(), decode_unfiltered());
    });
    match seen {
        (Some(fast), Some(slow)) if fast == probe && slow == probe => Ok(()),
        (fast, slow) => bail!("encoded {probe:#x}, decoded fast={fast:?} unfiltered={slow:?}"),
    }
}
