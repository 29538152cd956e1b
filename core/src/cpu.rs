use crate::Bus;

/// A CPU that can execute instructions.
///
/// The type parameter `B` is the bus type this CPU operates on.
pub trait Cpu<B: Bus> {
    /// Advance by one event: a stall cycle, an interrupt service, or one
    /// instruction. Returns cycles consumed.
    fn step(&mut self, bus: &mut B) -> u32;

    /// Reset the CPU to its initial state.
    fn reset(&mut self, bus: &mut B);

    /// Latch a non-maskable interrupt (edge-triggered, consumed on service).
    fn set_nmi(&mut self);

    /// Drive the maskable interrupt line (level-sensitive, not consumed on
    /// service).
    fn set_irq(&mut self, asserted: bool);

    /// Get the current program counter.
    fn pc(&self) -> u16;
}
