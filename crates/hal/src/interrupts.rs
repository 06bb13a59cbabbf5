// TEAM_462: Interrupt masking for the critical sections around device state.
// Cortex-M uses PRIMASK. Host builds (tests, `std`) use a per-thread mock so
// lock behaviour can be asserted without real hardware.

/// [I1] Disables interrupts, [I2] returns previous state
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline(always)]
pub fn disable() -> u32 {
    let primask: u32;
    // SAFETY: reading PRIMASK and setting it with cpsid has no memory effects
    unsafe {
        core::arch::asm!("mrs {}, PRIMASK", out(reg) primask, options(nomem, nostack, preserves_flags));
        core::arch::asm!("cpsid i", options(nomem, nostack, preserves_flags));
    }
    primask
}

/// [I3] Restores previous interrupt state
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline(always)]
pub fn restore(state: u32) {
    // PRIMASK bit 0 set means interrupts were already masked
    if state & 1 == 0 {
        // SAFETY: only re-enables when the matching disable() saw them enabled
        unsafe { core::arch::asm!("cpsie i", options(nomem, nostack, preserves_flags)) };
    }
}

/// [I4] Returns true when enabled, [I5] returns false when disabled
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline(always)]
pub fn is_enabled() -> bool {
    let primask: u32;
    // SAFETY: plain register read
    unsafe {
        core::arch::asm!("mrs {}, PRIMASK", out(reg) primask, options(nomem, nostack, preserves_flags));
    }
    primask & 1 == 0
}

/// [I7] Unconditionally enables interrupts
///
/// # Safety
/// Re-enabling inside a critical section breaks the guarantees of every
/// `IrqSafeLock` currently held.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[inline(always)]
pub unsafe fn enable() {
    unsafe { core::arch::asm!("cpsie i", options(nomem, nostack, preserves_flags)) };
}

#[cfg(all(not(all(target_arch = "arm", target_os = "none")), any(test, feature = "std")))]
mod mock {
    use std::cell::Cell;
    thread_local! {
        pub static ENABLED: Cell<bool> = const { Cell::new(true) };
    }
}

/// [I1] Disables interrupts, [I2] returns previous state (mock impl)
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn disable() -> u32 {
    #[cfg(any(test, feature = "std"))]
    {
        let prev = is_enabled();
        mock::ENABLED.with(|e| e.set(false));
        // Same encoding as PRIMASK: 1 = masked
        u32::from(!prev)
    }
    #[cfg(not(any(test, feature = "std")))]
    0
}

/// [I3] Restores previous interrupt state (mock impl)
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn restore(state: u32) {
    #[cfg(any(test, feature = "std"))]
    mock::ENABLED.with(|e| e.set(state & 1 == 0));
    #[cfg(not(any(test, feature = "std")))]
    let _ = state;
}

/// [I4] Returns true when enabled, [I5] returns false when disabled (mock impl)
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn is_enabled() -> bool {
    #[cfg(any(test, feature = "std"))]
    return mock::ENABLED.with(Cell::get);
    #[cfg(not(any(test, feature = "std")))]
    true
}

/// [I7] Unconditionally enables interrupts (mock impl)
///
/// # Safety
/// Same contract as the hardware version.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn enable() {
    #[cfg(any(test, feature = "std"))]
    mock::ENABLED.with(|e| e.set(true));
}

#[cfg(all(not(all(target_arch = "arm", target_os = "none")), any(test, feature = "std")))]
use std::cell::Cell;
