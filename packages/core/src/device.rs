//! Device model.
//!
//! A [`Device`] is built once from configuration and is only mutated by
//! [`crate::mount::MountGuard`]. It records whether this process believes the
//! device is mounted and where its files are reachable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{Config, RemoteArchive};
use crate::error::{Error, Result};

/// How a device gets attached to its mount directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountKind {
    /// Block device with an fstab entry: `mount <dir>` / `umount <dir>`.
    Fstab,
    /// Read-only network archive over sshfs: `fusermount -u <dir>` to detach.
    /// The mount directory is created on mount and removed on unmount.
    Sshfs { source: String, port: u16 },
}

#[derive(Debug, Clone)]
pub struct Device {
    /// Configured name (e.g. "media", "sys").
    pub name: String,
    /// Directory the device is attached to.
    pub mount_dir: PathBuf,
    pub kind: MountKind,
    pub(crate) mounted: bool,
    pub(crate) mountpoint: Option<PathBuf>,
}

impl Device {
    /// Creates an unmounted fstab-backed device.
    pub fn new(name: impl Into<String>, mount_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            mount_dir: mount_dir.into(),
            kind: MountKind::Fstab,
            mounted: false,
            mountpoint: None,
        }
    }

    /// Creates an unmounted sshfs device for a remote archive.
    pub fn remote(name: impl Into<String>, mount_dir: impl Into<PathBuf>, remote: &RemoteArchive) -> Self {
        Self {
            kind: MountKind::Sshfs {
                source: format!("{}:{}", remote.host, remote.dir),
                port: remote.port,
            },
            ..Self::new(name, mount_dir)
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Live mountpoint, `None` while unmounted.
    pub fn mountpoint(&self) -> Option<&Path> {
        self.mountpoint.as_deref()
    }
}

/// The configured devices, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct Devices {
    devices: BTreeMap<String, Device>,
}

impl Devices {
    pub fn from_config(config: &Config) -> Self {
        let devices = config
            .devices
            .iter()
            .map(|(name, dev)| (name.clone(), Device::new(name.clone(), dev.mount_dir.clone())))
            .collect();
        Self { devices }
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Device> {
        self.devices
            .get_mut(name)
            .ok_or_else(|| Error::config(format!("no such configured media device '{name}'")))
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }
}
