//! On-disk machine-state snapshot (§6). The format is host-endian and
//! sparse: only memory pages with at least one non-zero doubleword are
//! written.

use std::io::{self, Read, Write};

use crate::error::RuntimeError;
use crate::state::MachineState;

const MAGIC: u64 = 0xBEEF_CAFE_FACE_BABE;
const PAGE_SIZE: usize = 4096;
const PAGE_RECORD_SIZE: usize = 4 + PAGE_SIZE;

pub fn save<W: Write>(state: &MachineState, mut out: W) -> Result<(), RuntimeError> {
    out.write_all(&MAGIC.to_ne_bytes())?;
    out.write_all(&state.pc.to_ne_bytes())?;
    for r in 0..32 {
        out.write_all(&state.gpr(r).to_ne_bytes())?;
    }
    out.write_all(&state.lo().to_ne_bytes())?;
    out.write_all(&state.hi().to_ne_bytes())?;
    for r in 0..32 {
        out.write_all(&state.cp0(r).to_ne_bytes())?;
    }
    for r in 0..32 {
        out.write_all(&state.fpr_single(r).to_ne_bytes())?;
    }
    for r in 0..5 {
        out.write_all(&state.fcr(r).to_ne_bytes())?;
    }
    out.write_all(&state.icnt.to_ne_bytes())?;

    let pages = non_zero_pages(state);
    out.write_all(&(pages.len() as u32).to_ne_bytes())?;
    for (va, data) in &pages {
        out.write_all(&va.to_ne_bytes())?;
        out.write_all(data)?;
    }
    Ok(())
}

fn non_zero_pages(state: &MachineState) -> Vec<(u32, [u8; PAGE_SIZE])> {
    let mem_len = state.memory.len();
    let mut pages = Vec::new();
    let mut va = 0u32;
    while (va as usize) < mem_len {
        let mut page = [0u8; PAGE_SIZE];
        let mut any_non_zero = false;
        for i in 0..PAGE_SIZE {
            let byte = state.memory.read_u8(va + i as u32).unwrap_or(0);
            page[i] = byte;
            any_non_zero |= byte != 0;
        }
        if any_non_zero {
            pages.push((va, page));
        }
        va += PAGE_SIZE as u32;
    }
    pages
}

/// Restore a machine state from a checkpoint stream into an already
/// appropriately-sized `state` (memory is zeroed, then the saved pages
/// are overlaid).
pub fn load<R: Read>(state: &mut MachineState, mut input: R) -> Result<(), RuntimeError> {
    let magic = read_u64(&mut input)?;
    if magic != MAGIC {
        return Err(RuntimeError::BadCheckpointMagic { expected: MAGIC, found: magic });
    }
    state.pc = read_u32(&mut input)?;
    for r in 0..32 {
        let v = read_u32(&mut input)? as i32;
        state.set_gpr(r, v);
    }
    state.set_lo(read_u32(&mut input)?);
    state.set_hi(read_u32(&mut input)?);
    for r in 0..32 {
        let v = read_u32(&mut input)?;
        state.set_cp0(r, v);
    }
    for r in 0..32 {
        let v = read_u32(&mut input)?;
        state.set_fpr_single(r, v);
    }
    for r in 0..5 {
        let v = read_u32(&mut input)?;
        state.set_fcr(r, v);
    }
    state.icnt = read_u64(&mut input)?;

    let page_count = read_u32(&mut input)?;
    let mut record = [0u8; PAGE_RECORD_SIZE];
    for _ in 0..page_count {
        input.read_exact(&mut record).map_err(|_| RuntimeError::TruncatedCheckpoint)?;
        let va = u32::from_ne_bytes(record[0..4].try_into().unwrap());
        for (i, byte) in record[4..].iter().enumerate() {
            state.memory.write_u8(va + i as u32, *byte).ok();
        }
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_ne_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::Endian;
    use crate::memory::Memory;

    #[test]
    fn round_trips_registers_and_sparse_pages() {
        let mut state = MachineState::new(Memory::new(0x2000), Endian::Big);
        state.pc = 0x400;
        state.set_gpr(8, 42);
        state.memory.write_u32(0x1000, 0xdead_beef, Endian::Big).unwrap();

        let mut buf = Vec::new();
        save(&state, &mut buf).unwrap();

        let mut restored = MachineState::new(Memory::new(0x2000), Endian::Big);
        load(&mut restored, &buf[..]).unwrap();

        assert_eq!(restored.pc, 0x400);
        assert_eq!(restored.gpr(8), 42);
        assert_eq!(restored.memory.read_u32(0x1000, Endian::Big).unwrap(), 0xdead_beef);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut restored = MachineState::new(Memory::new(0x100), Endian::Big);
        let bad = [0u8; 8];
        assert!(matches!(
            load(&mut restored, &bad[..]),
            Err(RuntimeError::BadCheckpointMagic { .. })
        ));
    }
}
