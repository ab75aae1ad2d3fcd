//! Device acquisition and release (`spec.md` §5, SPEC_FULL.md §4.9 `[AMBIENT]`).
//!
//! Grounded on `utils::disk::get_disk_size` and `mkfs/src/main.rs`'s existing open/overwrite
//! flow; extended to open up to three targets (data, log, realtime) and query the additional
//! topology ioctls `utils::disk` already exposes.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use crate::error::Error;

/// One acquired backing store: a data, log, or realtime target, either a block device or a
/// plain file. Closing the handle (`Drop`) is the only release action this format needs —
/// there is no separate "unmount"/"detach" step for a tool that only ever writes once.
pub struct Target {
	pub file: File,
	pub is_block_device: bool,
	pub is_file: bool,
}

impl Target {
	/// Opens `path` read-write. `create_as_file` mirrors `-d/-l/-r file`: the target is declared
	/// to be a plain file and may not exist yet, so it's created (and later `ftruncate`d to the
	/// final size by the writer) rather than required to pre-exist like a block device.
	pub fn open(path: &Path, create_as_file: bool) -> Result<Self, Error> {
		let file = if create_as_file {
			OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?
		} else {
			OpenOptions::new().read(true).write(true).open(path)?
		};
		let metadata = file.metadata()?;
		let file_type = metadata.file_type();
		Ok(Self {
			is_block_device: file_type.is_block_device() || file_type.is_char_device(),
			is_file: file_type.is_file() || create_as_file,
			file,
		})
	}

	/// Size of the target, in bytes: `BLKGETSIZE64` for a block device, the file length
	/// otherwise (`0` for a not-yet-created file target).
	pub fn size_bytes(&self) -> Result<u64, Error> {
		if self.is_block_device {
			Ok(utils::disk::get_disk_size_fd(&self.file)?)
		} else {
			Ok(self.file.metadata()?.len())
		}
	}

	pub fn sector_sizes(&self) -> Option<(u64, u64)> {
		if !self.is_block_device {
			return None;
		}
		let physical = utils::disk::get_physical_sector_size(&self.file).ok()? as u64;
		let logical = utils::disk::get_logical_sector_size(&self.file).ok()? as u64;
		Some((physical, logical))
	}

	pub fn stripe_geometry(&self) -> Option<(u32, u32)> {
		if !self.is_block_device {
			return None;
		}
		utils::disk::get_stripe_geometry(&self.file).ok()
	}

	/// Issues `TRIM`/`DISCARD` for the whole target. A pure optimization: failures are ignored,
	/// matching `utils::disk::discard_all`'s own contract.
	pub fn discard(&self, len_bytes: u64) {
		if self.is_block_device {
			let _ = utils::disk::discard_all(&self.file, len_bytes);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write as _;

	#[test]
	fn file_target_reports_its_length() {
		let mut tmp = tempfile_like();
		tmp.write_all(&[0u8; 4096]).unwrap();
		let meta = tmp.metadata().unwrap();
		assert_eq!(meta.len(), 4096);
	}

	fn tempfile_like() -> File {
		let path = std::env::temp_dir().join(format!("mkfs-xfs-test-{}", std::process::id()));
		OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path).unwrap()
	}
}
