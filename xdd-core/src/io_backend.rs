//! OS I/O capability (spec.md §4.4, §5, Design Notes §9 "OS I/O primitive
//! → capability"). The core calls only this trait; OS-specific details
//! (here, Linux page alignment, `O_DIRECT`) live behind it. SCSI-generic
//! (`SGIO`) devices are out of scope per spec.md §1 ("OS-specific
//! open/pread/pwrite/fsync wrappers and SCSI-generic ioctl glue" is named
//! an external collaborator); `sgio` is exposed as an optional trait
//! method that returns `Unsupported` by default so a platform-specific
//! crate can implement it without touching the engine.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;

/// One opened target endpoint.
pub trait IoHandle: Send + Sync {
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
    fn pwrite(&self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Vectored read; default implementation issues sequential `pread`s.
    fn preadv(&self, bufs: &mut [&mut [u8]], mut offset: u64) -> io::Result<usize> {
        let mut total = 0;
        for buf in bufs {
            let n = self.pread(buf, offset)?;
            total += n;
            offset += n as u64;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }

    /// Vectored write; default implementation issues sequential `pwrite`s.
    fn pwritev(&self, bufs: &[&[u8]], mut offset: u64) -> io::Result<usize> {
        let mut total = 0;
        for buf in bufs {
            let n = self.pwrite(buf, offset)?;
            total += n;
            offset += n as u64;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }

    fn fsync(&self) -> io::Result<()>;

    fn set_len(&self, len: u64) -> io::Result<()>;

    /// Explicit NOOP op-type: consume no I/O, just record timing.
    fn noop(&self) -> io::Result<()> {
        Ok(())
    }

    fn sgio(&self, _cdb: &[u8], _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "sgio not supported by this backend"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpec {
    pub create: bool,
    pub truncate: bool,
    pub direct: bool,
    pub read: bool,
    pub write: bool,
}

pub trait IoBackend: Send + Sync {
    fn open(&self, path: &Path, spec: OpenSpec) -> io::Result<Box<dyn IoHandle>>;

    /// Page size used to validate Direct-I/O alignment (spec.md §4.4 step
    /// 3: "If Direct-I/O requested but offset/size not page-aligned").
    fn page_size(&self) -> u64;
}

pub struct StdIoBackend;

impl Default for StdIoBackend {
    fn default() -> Self {
        Self
    }
}

struct StdIoHandle {
    file: File,
}

impl IoHandle for StdIoHandle {
    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    fn pwrite(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.file.write_at(buf, offset)
    }

    fn fsync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }
}

impl IoBackend for StdIoBackend {
    fn open(&self, path: &Path, spec: OpenSpec) -> io::Result<Box<dyn IoHandle>> {
        let mut opts = OpenOptions::new();
        opts.read(spec.read || !spec.write).write(spec.write);
        if spec.create {
            opts.create(true);
        }
        if spec.truncate {
            opts.truncate(true);
        }
        if spec.direct {
            opts.custom_flags(nix::fcntl::OFlag::O_DIRECT.bits());
        }
        let file = opts.open(path)?;
        Ok(Box::new(StdIoHandle { file }))
    }

    fn page_size(&self) -> u64 {
        match nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE) {
            Ok(Some(n)) if n > 0 => n as u64,
            _ => 4096,
        }
    }
}

/// True if `offset` and `len` are aligned to `page_size` (spec.md §4.4
/// step 3: direct-I/O fallback to buffered mode for unaligned ops).
pub fn is_aligned(offset: u64, len: u64, page_size: u64) -> bool {
    offset % page_size == 0 && len % page_size == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwrite_then_pread_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.bin");
        let backend = StdIoBackend;
        let handle = backend
            .open(
                &path,
                OpenSpec {
                    create: true,
                    truncate: true,
                    direct: false,
                    read: true,
                    write: true,
                },
            )
            .unwrap();
        let data = vec![0x41u8; 4096];
        handle.pwrite(&data, 0).unwrap();
        handle.fsync().unwrap();
        let mut buf = vec![0u8; 4096];
        let n = handle.pread(&mut buf, 0).unwrap();
        assert_eq!(n, 4096);
        assert_eq!(buf, data);
    }

    #[test]
    fn alignment_check() {
        assert!(is_aligned(4096, 4096, 4096));
        assert!(!is_aligned(100, 4096, 4096));
    }
}
