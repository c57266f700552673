//! Raw bindings to the C shim over the system MPI library.
//!
//! The shim keeps the in-flight request table on its side of the boundary
//! and hands integer request ids across; every function returns the raw
//! transport status code, zero on success. Negative source or tag arguments
//! select the transport's wildcards.

/// Completion metadata for a probed message.
#[repr(C)]
pub struct Status {
    pub source: i32,
    pub tag: i32,
    pub count: i32,
}

impl Status {
    pub fn empty() -> Self {
        Self {
            source: -1,
            tag: -1,
            count: 0,
        }
    }
}

extern "C" {
    pub fn xb_init(rank: *mut i32, size: *mut i32) -> i32;
    pub fn xb_finalize() -> i32;
    pub fn xb_barrier() -> i32;
    pub fn xb_isend(
        buf: *const u8,
        count: i32,
        dest: i32,
        tag: i32,
        synchronous: i32,
        request: *mut i32,
    ) -> i32;
    pub fn xb_test(request: i32, done: *mut i32) -> i32;
    pub fn xb_wait(request: i32) -> i32;
    pub fn xb_iprobe(source: i32, tag: i32, flag: *mut i32, status: *mut Status) -> i32;
    pub fn xb_probe(source: i32, tag: i32, status: *mut Status) -> i32;
    pub fn xb_recv(buf: *mut u8, count: i32, source: i32, tag: i32) -> i32;
}
