//! Test-only violation hooks.

/// Each test gets its own uninhabited hook type with its own counter, so
/// tests running in parallel threads cannot trip each other's wires.
macro_rules! trip_wire {
    ($name:ident) => {
        enum $name {}

        impl $name {
            fn counter() -> &'static ::std::sync::atomic::AtomicUsize {
                static TRIPS: ::std::sync::atomic::AtomicUsize =
                    ::std::sync::atomic::AtomicUsize::new(0);
                &TRIPS
            }

            /// Trips since the last call.
            fn take() -> usize {
                Self::counter()
                    .swap(0, ::std::sync::atomic::Ordering::SeqCst)
            }
        }

        impl $crate::alloc::ledger::ViolationHook for $name {
            fn on_violation() {
                $name::counter()
                    .fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
            }
        }
    };
}

pub(crate) use trip_wire;
