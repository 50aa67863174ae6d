//! Mount operations module.
//!
//! [`MountGuard`] ties a device's mounted state to a scope: the device is
//! unmounted when the guard is released or dropped, on every exit path.
//! Each mount or unmount is exactly one external command.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::device::{Device, MountKind};
use crate::error::{Error, IoResultExt, Result};
use crate::executor::{CommandRunner, CommandSpec};

/// Scoped mount of a [`Device`].
///
/// Holding a guard means the mount command succeeded and
/// [`MountGuard::mountpoint`] is usable.
pub struct MountGuard<'a> {
    device: &'a mut Device,
    runner: &'a dyn CommandRunner,
    released: bool,
}

impl<'a> MountGuard<'a> {
    /// Mounts `device`, failing with [`Error::Device`] on a non-zero exit.
    pub fn acquire(device: &'a mut Device, runner: &'a dyn CommandRunner) -> Result<Self> {
        let mount_dir = device.mount_dir.clone();
        debug!("trying to mount {}...", mount_dir.display());

        let spec = match &device.kind {
            MountKind::Fstab => CommandSpec::new("mount")
                .arg(mount_dir.to_string_lossy())
                .privileged(),
            MountKind::Sshfs { source, port } => {
                if mount_dir.exists() {
                    return Err(Error::device(format!(
                        "mount directory {} already exists",
                        mount_dir.display()
                    )));
                }
                fs::create_dir_all(&mount_dir)
                    .io_context("failed to create mount directory", &mount_dir)?;
                CommandSpec::new("sshfs")
                    .args(["-o", "ro", "-p"])
                    .arg(port.to_string())
                    .arg(source.as_str())
                    .arg(mount_dir.to_string_lossy())
            }
        };

        let outcome = runner.run(&spec);
        let failure = match outcome {
            Ok(outcome) if outcome.success() => None,
            Ok(outcome) => Some(Error::device(mount_failure_message(
                &mount_dir,
                &outcome.stderr,
            ))),
            Err(e) => Some(e),
        };

        if let Some(err) = failure {
            if matches!(device.kind, MountKind::Sshfs { .. }) {
                let _ = fs::remove_dir(&mount_dir);
            }
            return Err(err);
        }

        device.mounted = true;
        device.mountpoint = Some(mount_dir);
        Ok(Self {
            device,
            runner,
            released: false,
        })
    }

    /// Live mountpoint of the device.
    pub fn mountpoint(&self) -> &Path {
        // Set on acquire, cleared only by release
        self.device
            .mountpoint
            .as_deref()
            .unwrap_or(&self.device.mount_dir)
    }

    pub fn device(&self) -> &Device {
        self.device
    }

    /// Unmounts the device.
    ///
    /// The device is marked unmounted even when the unmount command fails; the
    /// failure is still returned so the caller can report it.
    pub fn release(mut self) -> Result<()> {
        self.unmount()
    }

    fn unmount(&mut self) -> Result<()> {
        self.released = true;
        self.device.mounted = false;
        self.device.mountpoint = None;

        let mount_dir = &self.device.mount_dir;
        debug!("trying to unmount {}...", mount_dir.display());

        let spec = match &self.device.kind {
            MountKind::Fstab => CommandSpec::new("umount")
                .arg(mount_dir.to_string_lossy())
                .privileged(),
            MountKind::Sshfs { .. } => CommandSpec::new("fusermount")
                .arg("-u")
                .arg(mount_dir.to_string_lossy()),
        };

        let outcome = self.runner.run(&spec)?;
        if !outcome.success() {
            let mut message = format!("could not unmount directory {}", mount_dir.display());
            if !outcome.stderr.is_empty() {
                message = format!("{message}: {}", outcome.stderr);
            }
            return Err(Error::device(message));
        }

        if matches!(self.device.kind, MountKind::Sshfs { .. }) {
            fs::remove_dir(mount_dir).io_context("failed to remove mount directory", mount_dir)?;
        }
        Ok(())
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.unmount() {
            warn!("{e}");
        }
    }
}

fn mount_failure_message(mount_dir: &Path, stderr: &str) -> String {
    let mut message = format!(
        "could not mount directory {}: is the device plugged in?",
        mount_dir.display()
    );
    if !stderr.is_empty() {
        message.push_str(&format!(" ({stderr})"));
    }
    message
}

/// Mounts `device`, runs `op` with the mountpoint, then unmounts.
///
/// The device is unmounted on every path. If `op` fails, its error is returned
/// and an unmount failure is only logged; otherwise an unmount failure is the
/// result.
pub fn with_mounted<T>(
    device: &mut Device,
    runner: &dyn CommandRunner,
    op: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    let guard = MountGuard::acquire(device, runner)?;
    match op(guard.mountpoint()) {
        Ok(value) => {
            guard.release()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(release_err) = guard.release() {
                warn!("{release_err}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteArchive;
    use crate::test_utils::RecordingRunner;

    #[test]
    fn test_acquire_and_release() {
        let runner = RecordingRunner::new();
        let mut device = Device::new("media", "/mnt-set/mp3-sd");

        let guard = MountGuard::acquire(&mut device, &runner).unwrap();
        assert_eq!(guard.mountpoint(), Path::new("/mnt-set/mp3-sd"));
        assert!(guard.device().is_mounted());
        guard.release().unwrap();

        assert!(!device.is_mounted());
        assert!(device.mountpoint().is_none());
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].display(), "mount /mnt-set/mp3-sd");
        assert!(calls[0].privileged);
        assert_eq!(calls[1].display(), "umount /mnt-set/mp3-sd");
    }

    #[test]
    fn test_mount_failure_is_device_error() {
        let runner = RecordingRunner::new().exit_with("mount", 1);
        let mut device = Device::new("media", "/mnt-set/mp3-sd");

        let err = MountGuard::acquire(&mut device, &runner).err().unwrap();

        assert!(matches!(err, Error::Device { .. }));
        assert!(err.to_string().contains("/mnt-set/mp3-sd"));
        assert!(!device.is_mounted());
        // No unmount for a mount that never happened
        assert_eq!(runner.programs(), vec!["mount"]);
    }

    #[test]
    fn test_unmount_failure_still_marks_unmounted() {
        let runner = RecordingRunner::new().exit_with("umount", 32);
        let mut device = Device::new("sys", "/mnt-set/mp3-sys");

        let guard = MountGuard::acquire(&mut device, &runner).unwrap();
        let err = guard.release().unwrap_err();

        assert!(matches!(err, Error::Device { .. }));
        assert!(!device.is_mounted());
    }

    #[test]
    fn test_drop_unmounts() {
        let runner = RecordingRunner::new();
        let mut device = Device::new("media", "/mnt-set/mp3-sd");
        {
            let _guard = MountGuard::acquire(&mut device, &runner).unwrap();
        }
        assert_eq!(runner.programs(), vec!["mount", "umount"]);
        assert!(!device.is_mounted());
    }

    #[test]
    fn test_with_mounted_releases_on_error() {
        let runner = RecordingRunner::new().exit_with("umount", 1);
        let mut device = Device::new("media", "/mnt-set/mp3-sd");

        let err = with_mounted(&mut device, &runner, |_| -> Result<()> {
            Err(Error::Sync {
                destination: "/mnt-set/mp3-sd/music".into(),
                code: 23,
            })
        })
        .unwrap_err();

        // Original error wins over the unmount failure
        assert!(matches!(err, Error::Sync { .. }));
        assert_eq!(runner.programs(), vec!["mount", "umount"]);
    }

    #[test]
    fn test_with_mounted_reports_unmount_failure_on_success() {
        let runner = RecordingRunner::new().exit_with("umount", 1);
        let mut device = Device::new("media", "/mnt-set/mp3-sd");

        let err = with_mounted(&mut device, &runner, |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Device { .. }));
    }

    #[test]
    fn test_sshfs_creates_and_removes_mount_dir() {
        let base = tempfile::tempdir().unwrap();
        let mount_dir = base.path().join("archive");
        let remote = RemoteArchive {
            host: "example.net".to_string(),
            port: 6176,
            dir: "/srv/podcasts".to_string(),
        };
        let runner = RecordingRunner::new();
        let mut device = Device::remote("podcast-archive", &mount_dir, &remote);

        with_mounted(&mut device, &runner, |mountpoint| {
            assert!(mountpoint.is_dir());
            Ok(())
        })
        .unwrap();

        assert!(!mount_dir.exists());
        let calls = runner.calls();
        assert_eq!(calls[0].program, "sshfs");
        assert_eq!(
            calls[0].args[..5],
            ["-o", "ro", "-p", "6176", "example.net:/srv/podcasts"]
        );
        assert_eq!(calls[1].display(), format!("fusermount -u {}", mount_dir.display()));
    }

    #[test]
    fn test_sshfs_refuses_existing_dir() {
        let base = tempfile::tempdir().unwrap();
        let remote = RemoteArchive {
            host: "example.net".to_string(),
            port: 22,
            dir: "/srv".to_string(),
        };
        let runner = RecordingRunner::new();
        let mut device = Device::remote("podcast-archive", base.path(), &remote);

        let err = MountGuard::acquire(&mut device, &runner).err().unwrap();
        assert!(matches!(err, Error::Device { .. }));
        assert!(runner.calls().is_empty());
    }
}
