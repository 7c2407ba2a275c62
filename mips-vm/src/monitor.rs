//! The monitor (host-service) trap: reserved funct 0x05, dispatched by
//! reason code out of the reserved-instruction argument field (§4.7, §6).
//!
//! Every call here ends the current basic block; the caller is
//! responsible for setting `term_addr` and resolving the successor at
//! `gpr[31]` before invoking [`dispatch`]. This module only performs the
//! host-facing side effect and writes the result back into the register
//! file / guest memory.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::InterpreterError;
use crate::state::MachineState;

/// Simulated `K1SIZE`: the amount of memory reported by the memory-size
/// query (service 55). An arbitrary but fixed choice, since the source
/// constant isn't part of this interface's contract.
pub const K1SIZE: u32 = 0x0040_0000;

/// Maximum argv entries `getargs` (service 35) will copy out.
pub const MARGS: usize = 32;

pub mod service {
    pub const OPEN: u32 = 6;
    pub const READ: u32 = 7;
    pub const WRITE: u32 = 8;
    pub const LSEEK: u32 = 9;
    pub const CLOSE: u32 = 10;
    pub const FSTAT: u32 = 13;
    pub const GETTIMEOFDAY: u32 = 33;
    pub const TIMES: u32 = 34;
    pub const GETARGS: u32 = 35;
    pub const GETCWD: u32 = 37;
    pub const CHDIR: u32 = 38;
    pub const DISASSEMBLE: u32 = 40;
    pub const CYCLE_COUNTER: u32 = 50;
    pub const FLUSH_ALL: u32 = 51;
    pub const FLUSH_ADDR: u32 = 52;
    pub const ICNT: u32 = 53;
    pub const MEMORY_SIZE: u32 = 55;
}

/// Host-side resources a monitor call may touch: open file descriptors
/// and the program's argv, plumbed in from the driver rather than read
/// from the process environment directly.
#[derive(Default)]
pub struct Monitor {
    files: HashMap<i32, File>,
    next_fd: i32,
    pub argv: Vec<String>,
    /// When true, `gettimeofday`/`times` use the host clock; otherwise a
    /// synthetic clock derived from `icnt` (§4.7).
    pub real_clock: bool,
    pub icount_mips: u64,
}

impl Monitor {
    pub fn new(argv: Vec<String>) -> Self {
        Self { files: HashMap::new(), next_fd: 3, argv, real_clock: false, icount_mips: 100 }
    }

    /// Dispatch a monitor call. `code` is the reason extracted from the
    /// trap word; registers and memory are read/written on `state`
    /// following the monitor ABI (a0..a3 = gpr 4..7, return in v0).
    pub fn dispatch(&mut self, code: u32, state: &mut MachineState) -> Result<(), InterpreterError> {
        let a0 = state.gpr(4) as u32;
        let a1 = state.gpr(5) as u32;
        let _a2 = state.gpr(6) as u32;

        match code {
            service::OPEN => {
                let path = read_cstr(state, a0)?;
                let v0 = self.host_open(&path, a1);
                state.set_gpr(2, v0);
            }
            service::READ => {
                let fd = a0 as i32;
                let buf = a1;
                let count = state.gpr(6) as u32;
                let v0 = self.host_read(state, fd, buf, count);
                state.set_gpr(2, v0);
            }
            service::WRITE => {
                let fd = a0 as i32;
                let buf = a1;
                let count = state.gpr(6) as u32;
                let v0 = self.host_write(state, fd, buf, count);
                state.set_gpr(2, v0);
            }
            service::LSEEK => {
                let fd = a0 as i32;
                let offset = state.gpr(5);
                let whence = state.gpr(6);
                state.set_gpr(2, self.host_lseek(fd, offset, whence));
            }
            service::CLOSE => {
                let fd = a0 as i32;
                state.set_gpr(2, self.host_close(fd));
            }
            service::FSTAT => {
                let fd = a0 as i32;
                let buf = a1;
                state.set_gpr(2, self.host_fstat(state, fd, buf));
            }
            service::GETTIMEOFDAY => {
                self.host_gettimeofday(state, a0);
            }
            service::TIMES => {
                self.host_times(state, a0);
            }
            service::GETARGS => {
                self.host_getargs(state, a0);
            }
            service::GETCWD => {
                let size = state.gpr(5) as u32;
                self.host_getcwd(state, a0, size);
            }
            service::CHDIR => {
                let path = read_cstr(state, a0)?;
                let v0 = if std::env::set_current_dir(&path).is_ok() { 0 } else { -1 };
                state.set_gpr(2, v0);
            }
            service::DISASSEMBLE => {
                tracing::debug!(addr = a0, count = a1, "monitor: disassemble request");
            }
            service::CYCLE_COUNTER => state.set_gpr(2, 0),
            service::FLUSH_ALL | service::FLUSH_ADDR => {}
            service::ICNT => state.set_gpr(2, state.icnt as i32),
            service::MEMORY_SIZE => {
                let endian = state.endian;
                state.memory.write_u32(a0, K1SIZE, endian)?;
                state.memory.write_u32(a0 + 4, 0, endian)?;
                state.memory.write_u32(a0 + 8, 0, endian)?;
            }
            other => return Err(InterpreterError::UnknownMonitorService { code: other, pc: state.pc }),
        }
        Ok(())
    }

    fn host_open(&mut self, path: &str, flags: u32) -> i32 {
        let mut opts = OpenOptions::new();
        match flags & 0x3 {
            1 => {
                opts.write(true);
            }
            2 => {
                opts.read(true).write(true);
            }
            _ => {
                opts.read(true);
            }
        }
        if flags & 0x200 != 0 {
            opts.create(true);
        }
        if flags & 0x400 != 0 {
            opts.truncate(true);
        }
        match opts.open(path) {
            Ok(file) => {
                let fd = self.next_fd;
                self.next_fd += 1;
                self.files.insert(fd, file);
                fd
            }
            Err(_) => -1,
        }
    }

    fn host_read(&mut self, state: &mut MachineState, fd: i32, buf: u32, count: u32) -> i32 {
        if fd <= 2 {
            return 0;
        }
        let Some(file) = self.files.get_mut(&fd) else { return -1 };
        let mut tmp = vec![0u8; count as usize];
        match file.read(&mut tmp) {
            Ok(n) => {
                for (i, b) in tmp[..n].iter().enumerate() {
                    if state.memory.write_u8(buf + i as u32, *b).is_err() {
                        return -1;
                    }
                }
                n as i32
            }
            Err(_) => -1,
        }
    }

    fn host_write(&mut self, state: &MachineState, fd: i32, buf: u32, count: u32) -> i32 {
        let mut tmp = vec![0u8; count as usize];
        for (i, b) in tmp.iter_mut().enumerate() {
            *b = state.memory.read_u8(buf + i as u32).unwrap_or(0);
        }
        match fd {
            1 => {
                std::io::stdout().write_all(&tmp).ok();
                count as i32
            }
            2 => {
                std::io::stderr().write_all(&tmp).ok();
                count as i32
            }
            _ => match self.files.get_mut(&fd) {
                Some(file) => file.write_all(&tmp).map(|_| count as i32).unwrap_or(-1),
                None => -1,
            },
        }
    }

    fn host_lseek(&mut self, fd: i32, offset: i32, whence: i32) -> i32 {
        let Some(file) = self.files.get_mut(&fd) else { return -1 };
        let pos = match whence {
            1 => SeekFrom::Current(offset as i64),
            2 => SeekFrom::End(offset as i64),
            _ => SeekFrom::Start(offset as u64),
        };
        file.seek(pos).map(|p| p as i32).unwrap_or(-1)
    }

    fn host_close(&mut self, fd: i32) -> i32 {
        if fd <= 2 {
            return 0;
        }
        if self.files.remove(&fd).is_some() {
            0
        } else {
            -1
        }
    }

    fn host_fstat(&mut self, state: &mut MachineState, fd: i32, buf: u32) -> i32 {
        let Some(file) = self.files.get(&fd) else { return -1 };
        let Ok(meta) = file.metadata() else { return -1 };
        let endian = state.endian;
        let size = meta.len() as u32;
        let write32 = |state: &mut MachineState, off: u32, v: u32| {
            state.memory.write_u32(buf + off, v, endian).ok();
        };
        write32(state, 8, 0o100644); // mode
        write32(state, 16, size);
        0
    }

    fn host_gettimeofday(&self, state: &mut MachineState, buf: u32) {
        let (sec, usec) = if self.real_clock {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            (now.as_secs() as u32, now.subsec_micros())
        } else {
            let micros = state.icnt / self.icount_mips.max(1);
            ((micros / 1_000_000) as u32, (micros % 1_000_000) as u32)
        };
        let endian = state.endian;
        state.memory.write_u32(buf, sec, endian).ok();
        state.memory.write_u32(buf + 4, usec, endian).ok();
    }

    fn host_times(&self, state: &mut MachineState, buf: u32) {
        let utime = if self.real_clock { 0 } else { state.icnt / self.icount_mips.max(1) } as u32;
        let endian = state.endian;
        state.memory.write_u32(buf, utime, endian).ok();
        state.memory.write_u32(buf + 4, 0, endian).ok();
        state.memory.write_u32(buf + 8, 0, endian).ok();
        state.memory.write_u32(buf + 12, 0, endian).ok();
    }

    /// Copy argv strings into the pointer array at `ptr_array`, up to
    /// `MARGS` entries (§4.7). The strings themselves are packed into the
    /// guest memory immediately following the pointer array.
    fn host_getargs(&self, state: &mut MachineState, ptr_array: u32) {
        let endian = state.endian;
        let mut cursor = ptr_array + (MARGS as u32) * 4;
        for (i, arg) in self.argv.iter().enumerate().take(MARGS) {
            state.memory.write_u32(ptr_array + (i as u32) * 4, cursor, endian).ok();
            for b in arg.bytes() {
                state.memory.write_u8(cursor, b).ok();
                cursor += 1;
            }
            state.memory.write_u8(cursor, 0).ok();
            cursor += 1;
        }
    }

    fn host_getcwd(&self, state: &mut MachineState, buf: u32, size: u32) {
        if let Ok(cwd) = std::env::current_dir() {
            let s = cwd.to_string_lossy();
            let bytes = s.as_bytes();
            let n = bytes.len().min(size.saturating_sub(1) as usize);
            for (i, b) in bytes[..n].iter().enumerate() {
                state.memory.write_u8(buf + i as u32, *b).ok();
            }
            state.memory.write_u8(buf + n as u32, 0).ok();
        }
    }
}

fn read_cstr(state: &MachineState, addr: u32) -> Result<String, InterpreterError> {
    let mut bytes = Vec::new();
    let mut a = addr;
    loop {
        let b = state.memory.read_u8(a)?;
        if b == 0 {
            break;
        }
        bytes.push(b);
        a += 1;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::Endian;
    use crate::memory::Memory;

    fn state() -> MachineState {
        MachineState::new(Memory::new(0x1000), Endian::Big)
    }

    #[test]
    fn icnt_service_returns_the_retired_instruction_count() {
        let mut s = state();
        s.icnt = 1234;
        let mut m = Monitor::new(vec![]);
        m.dispatch(service::ICNT, &mut s).unwrap();
        assert_eq!(s.gpr(2), 1234);
    }

    #[test]
    fn memory_size_query_writes_the_k1size_triple() {
        let mut s = state();
        s.set_gpr(4, 0x100);
        let mut m = Monitor::new(vec![]);
        m.dispatch(service::MEMORY_SIZE, &mut s).unwrap();
        assert_eq!(s.memory.read_u32(0x100, Endian::Big).unwrap(), K1SIZE);
    }

    #[test]
    fn unknown_service_is_fatal() {
        let mut s = state();
        let mut m = Monitor::new(vec![]);
        assert!(matches!(
            m.dispatch(9999, &mut s),
            Err(InterpreterError::UnknownMonitorService { .. })
        ));
    }
}
