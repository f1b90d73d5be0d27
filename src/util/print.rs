use std::ffi::CStr;

/// Write a line to stderr... without touching the allocator. The violation
/// path runs in the middle of allocator bookkeeping, so it must not allocate.
pub fn eputstr(s: &CStr) {
    let bytes = s.to_bytes();
    // SAFETY: `write(2)` with a valid fd and in-bounds buffers
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
        libc::write(libc::STDERR_FILENO, b"\n".as_ptr() as *const libc::c_void, 1);
    }
}
