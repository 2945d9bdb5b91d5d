use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Default permission mode for created FIFOs.
pub const DEFAULT_FIFO_MODE: u32 = 0o600;

/// Create a FIFO node at `path` with the given permission mode.
pub fn create_fifo(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    let path = path.as_ref();
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        TransportError::CreateFifo {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path contains an interior NUL byte",
            ),
        }
    })?;

    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
    if rc != 0 {
        return Err(TransportError::CreateFifo {
            path: path.to_path_buf(),
            source: std::io::Error::last_os_error(),
        });
    }

    debug!(?path, mode = %format!("{mode:o}"), "created fifo");
    Ok(())
}

/// Returns true if `path` exists and is a FIFO (symlinks are not followed).
pub fn is_fifo(path: impl AsRef<Path>) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

/// A commands/results FIFO pair, removed again on drop.
///
/// This is the generator side of the bridge: it owns the pipe nodes and hands
/// their paths to the program under test.
#[derive(Debug)]
pub struct FifoPair {
    dir: PathBuf,
    commands: PathBuf,
    results: PathBuf,
    created_inodes: [(u64, u64); 2],
    remove_dir: bool,
}

impl FifoPair {
    /// File name of the command FIFO inside the pair's directory.
    pub const COMMANDS_NAME: &'static str = "hypbridge.commands";
    /// File name of the result FIFO inside the pair's directory.
    pub const RESULTS_NAME: &'static str = "hypbridge.results";

    /// Create both FIFOs inside an existing directory.
    ///
    /// A stale FIFO at either path is replaced; any other existing file is an
    /// error and is left untouched.
    pub fn create_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let commands = dir.join(Self::COMMANDS_NAME);
        let results = dir.join(Self::RESULTS_NAME);

        let commands_inode = create_replacing_stale(&commands)?;
        let results_inode = create_replacing_stale(&results)?;

        info!(?dir, "created fifo pair");

        Ok(Self {
            dir,
            commands,
            results,
            created_inodes: [commands_inode, results_inode],
            remove_dir: false,
        })
    }

    /// Create both FIFOs inside a fresh private directory under the system
    /// temp dir. The directory is removed on drop if it is empty by then.
    pub fn temp() -> Result<Self> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("hypbridge-{}-{nanos}", std::process::id()));

        std::fs::DirBuilder::new()
            .mode(0o700)
            .create(&dir)
            .map_err(|source| TransportError::CreateFifo {
                path: dir.clone(),
                source,
            })?;

        match Self::create_in(&dir) {
            Ok(mut pair) => {
                pair.remove_dir = true;
                Ok(pair)
            }
            Err(err) => {
                let _ = std::fs::remove_dir_all(&dir);
                Err(err)
            }
        }
    }

    /// Directory holding both FIFOs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the command FIFO (client writes, generator reads).
    pub fn commands_path(&self) -> &Path {
        &self.commands
    }

    /// Path of the result FIFO (generator writes, client reads).
    pub fn results_path(&self) -> &Path {
        &self.results
    }

    /// Unblock anyone stuck in a blocking `open` on either FIFO.
    ///
    /// Opens and immediately closes each missing end with `O_NONBLOCK`. A
    /// reader blocked in `open` then sees EOF; a writer blocked in `open`
    /// then gets `EPIPE` on its first write. Used when the program under test
    /// exits without ever opening its ends.
    pub fn release_waiters(&self) {
        for path in [&self.commands, &self.results] {
            // A write-side open fails with ENXIO when nobody is reading; ignore it.
            let _ = OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path);
            let _ = OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path);
        }
        debug!(dir = ?self.dir, "released fifo waiters");
    }
}

impl Drop for FifoPair {
    fn drop(&mut self) {
        for (path, (expected_dev, expected_ino)) in
            [&self.commands, &self.results].into_iter().zip(self.created_inodes)
        {
            match std::fs::symlink_metadata(path) {
                Ok(metadata)
                    if metadata.file_type().is_fifo()
                        && metadata.dev() == expected_dev
                        && metadata.ino() == expected_ino =>
                {
                    debug!(?path, "removing fifo");
                    let _ = std::fs::remove_file(path);
                }
                Ok(_) => debug!(?path, "fifo path identity changed; skipping cleanup"),
                Err(_) => {}
            }
        }
        if self.remove_dir {
            let _ = std::fs::remove_dir(&self.dir);
        }
    }
}

fn create_replacing_stale(path: &Path) -> Result<(u64, u64)> {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if !metadata.file_type().is_fifo() {
            return Err(TransportError::NotAFifo {
                path: path.to_path_buf(),
            });
        }
        debug!(?path, "removing stale fifo");
        std::fs::remove_file(path).map_err(|source| TransportError::CreateFifo {
            path: path.to_path_buf(),
            source,
        })?;
    }

    create_fifo(path, DEFAULT_FIFO_MODE)?;
    let metadata =
        std::fs::symlink_metadata(path).map_err(|source| TransportError::CreateFifo {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((metadata.dev(), metadata.ino()))
}
