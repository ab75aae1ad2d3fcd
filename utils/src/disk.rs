//! Implements disk-related utility functions.

use libc::ioctl;
use std::ffi::c_long;
use std::fs::File;
use std::fs;
use std::io::Error;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

/// ioctl macro: Command.
macro_rules! ioc {
	($a:expr, $b:expr, $c:expr, $d:expr) => {
		(($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
	};
}

/// ioctl macro: Read command.
#[macro_export]
macro_rules! ior {
	($a:expr, $b:expr, $c:ty) => {
		ioc!(2, $a, $b, std::mem::size_of::<$c>() as c_long)
	};
}

/// ioctl macro: Command with no transferred data (Linux `_IO`).
macro_rules! io {
	($a:expr, $b:expr) => {
		(($a) << 8) | ($b)
	};
}

/// ioctl command: Get size of disk in number of sectors.
const BLKGETSIZE64: c_long = ior!(0x12, 114, u64);
/// ioctl command: Get the logical sector size, in bytes.
const BLKSSZGET: c_long = io!(0x12, 104);
/// ioctl command: Get the physical sector size, in bytes.
const BLKPBSZGET: c_long = io!(0x12, 123);
/// ioctl command: Get the minimum I/O size (stripe unit), in bytes.
const BLKIOMIN: c_long = io!(0x12, 120);
/// ioctl command: Get the optimal I/O size (stripe width), in bytes.
const BLKIOOPT: c_long = io!(0x12, 121);
/// ioctl command: Discard a range of blocks.
const BLKDISCARD: c_long = io!(0x12, 119);

/// Returns the number of sectors on the given device.
pub fn get_disk_size(path: &Path) -> io::Result<u64> {
	let mut size = 0;

	let metadata = fs::metadata(path)?;
	let file_type = metadata.file_type();

	if file_type.is_block_device() || file_type.is_char_device() {
		let dev = File::open(path)?;

		let ret = unsafe {
			ioctl(dev.as_raw_fd(), BLKGETSIZE64 as _, &mut size)
		};
		if ret < 0 {
			return Err(Error::last_os_error());
		}

		Ok(size / 512)
	} else if file_type.is_file() {
		Ok(metadata.len() / 512)
	} else {
		Ok(0)
	}
}

/// Returns the number of bytes on the given already-open device handle.
pub fn get_disk_size_fd(dev: &File) -> io::Result<u64> {
	let mut size = 0u64;
	let ret = unsafe { ioctl(dev.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
	if ret < 0 {
		return Err(Error::last_os_error());
	}
	Ok(size)
}

/// Runs a `_IO`-style ioctl returning a single `u32` through a pointer argument.
fn ioctl_get_u32(dev: &File, cmd: c_long) -> io::Result<u32> {
	let mut val: u32 = 0;
	let ret = unsafe { ioctl(dev.as_raw_fd(), cmd as _, &mut val) };
	if ret < 0 {
		return Err(Error::last_os_error());
	}
	Ok(val)
}

/// Returns the device's logical sector size, in bytes.
pub fn get_logical_sector_size(dev: &File) -> io::Result<u32> {
	ioctl_get_u32(dev, BLKSSZGET)
}

/// Returns the device's physical sector size, in bytes.
pub fn get_physical_sector_size(dev: &File) -> io::Result<u32> {
	ioctl_get_u32(dev, BLKPBSZGET)
}

/// Returns the device's reported stripe geometry `(stripe_unit, stripe_width)`, in bytes.
///
/// Either value may be `0` when the device does not advertise a stripe (e.g. a plain disk
/// rather than a RAID volume), which callers take as "no alignment hint".
pub fn get_stripe_geometry(dev: &File) -> io::Result<(u32, u32)> {
	let sunit = ioctl_get_u32(dev, BLKIOMIN)?;
	let swidth = ioctl_get_u32(dev, BLKIOOPT)?;
	Ok((sunit, swidth))
}

/// Issues a `TRIM`/`DISCARD` for the whole device. Failures are the caller's to ignore: this is
/// a pure optimization, never required for correctness.
pub fn discard_all(dev: &File, len_bytes: u64) -> io::Result<()> {
	let range: [u64; 2] = [0, len_bytes];
	let ret = unsafe { ioctl(dev.as_raw_fd(), BLKDISCARD as _, range.as_ptr()) };
	if ret < 0 {
		return Err(Error::last_os_error());
	}
	Ok(())
}
