//! Native modules exposed to scripts
//!
//! Each module registers one hidden global object (`__crypto`,
//! `__encoding`, `__fs`). The preludes build `atob`/`btoa` and `require` on
//! top of them.

pub mod crypto;
pub mod encoding;
pub mod fs;
