// TEAM_473: Read discipline shared by the buffered input devices.
//
// The caller supplies `next`, which pops one byte inside the device's
// critical section, and `idle`, run between polls while waiting (the UART
// drains its FIFO there when polled or while the sender is throttled).

use pfs_hal::{Clock, Deadline};
use pfs_vfs::{ModeFlags, ReadMode};

/// Fill `buf` according to `mode`. Returns the number of bytes delivered.
///
/// - empty and `NBLOCK`: stop
/// - empty, `ANY` and something delivered: stop
/// - otherwise wait for a byte until `deadline`
/// - in `CHR` mode the terminator ends the read, delivered as `\n` under `TLF`
pub fn read_into(
    buf: &mut [u8],
    mode: ReadMode,
    deadline: Deadline,
    clock: &dyn Clock,
    mut next: impl FnMut() -> Option<u8>,
    mut idle: impl FnMut(),
) -> usize {
    let mut n = 0;
    while n < buf.len() {
        let byte = match next() {
            Some(b) => b,
            None => {
                if mode.contains(ModeFlags::NBLOCK)
                    || (mode.contains(ModeFlags::ANY) && n > 0)
                {
                    break;
                }
                match wait_for_byte(deadline, clock, &mut next, &mut idle) {
                    Some(b) => b,
                    None => break,
                }
            }
        };
        if mode.is_terminator(byte) {
            buf[n] = if mode.contains(ModeFlags::TLF) { b'\n' } else { byte };
            n += 1;
            break;
        }
        buf[n] = byte;
        n += 1;
    }
    n
}

fn wait_for_byte(
    deadline: Deadline,
    clock: &dyn Clock,
    next: &mut impl FnMut() -> Option<u8>,
    idle: &mut impl FnMut(),
) -> Option<u8> {
    loop {
        if deadline.reached(clock) {
            return next();
        }
        idle();
        if let Some(b) = next() {
            return Some(b);
        }
        core::hint::spin_loop();
    }
}
