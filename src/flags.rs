use bitflags::bitflags;

bitflags! {
    /// Which privilege domains a counter observes.
    ///
    /// A counter only accumulates events that occur while the CPU is running
    /// in one of the selected domains; the session derives the kernel's
    /// `exclude_user`, `exclude_kernel`, and `exclude_hv` attribute bits from
    /// the complement of this mask. Restricting a counter to [`Domain::USER`]
    /// also sidesteps the `perf_event_paranoid` permission checks that kernel
    /// profiling is subject to.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Domain: u8 {
        /// Count while executing user-space code.
        const USER = 0b001;

        /// Count while executing kernel code on behalf of the task.
        const KERNEL = 0b010;

        /// Count while the hypervisor is running, on CPUs that expose it.
        const HYPERVISOR = 0b100;

        /// Count everywhere.
        const ALL = Self::USER.bits() | Self::KERNEL.bits() | Self::HYPERVISOR.bits();
    }
}
