//! This module implements utility functions.

use std::ffi::CStr;
use std::fmt;
use std::mem::size_of;
use std::slice;
use std::thread;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current timestamp since the Unix epoch.
pub fn get_timestamp() -> Duration {
    SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock panic!")
}

/// Returns the hostname of the system.
pub fn get_hostname() -> String {
	let mut hostname: [i8; 4096] = [0; 4096];

	unsafe {
		libc::gethostname(hostname.as_mut_ptr() as _, hostname.len());
		CStr::from_ptr(hostname.as_ptr()).to_str().unwrap().to_owned()
	}
}

/// Executes the closure `f`.
/// If the closure returns Ok, the function returns directly. If it return an error, the function
/// ensures the execution takes at least the given duration `d`.
pub fn exec_wait<T, F: FnOnce() -> T>(d: Duration, f: F) -> T {
	let start = get_timestamp();

	let result = f();

	// Waiting until the given amount of time is spent
	while get_timestamp() < start + d {
		thread::sleep(Duration::from_millis(1));
	}

	result
}

/// Performs the log2 operatin on the given integer.
///
/// If the result is undefined, the function returns None.
pub fn log2(n: u64) -> Option<u64> {
	let num_bits = (size_of::<u64>() * 8) as u64;

	let n = num_bits - n.leading_zeros() as u64;
	if n > 0 {
		Some(n - 1)
	} else {
		None
	}
}

/// Returns `2^n`.
pub fn pow2(n: u32) -> u64 {
	1u64 << n
}

/// Tells whether `n` is a power of two (`0` is not).
pub fn is_pow2(n: u64) -> bool {
	n != 0 && (n & (n - 1)) == 0
}

/// Divides `n` by `d`, rounding up.
pub fn ceil_division(n: u64, d: u64) -> u64 {
	(n + d - 1) / d
}

/// Reinterprets `val` as a slice of bytes, for direct writing to a device.
///
/// The caller must ensure `T` has a stable, disk-intended layout (`repr(C)` or
/// `repr(C, packed)`).
pub fn reinterpret<T>(val: &T) -> &[u8] {
	unsafe { slice::from_raw_parts(val as *const T as *const u8, size_of::<T>()) }
}

/// Structure representing a number of bytes.
pub struct ByteSize(pub u64);

impl ByteSize {
	/// Creates a size from a given number of sectors.
	pub fn from_sectors_count(cnt: u64) -> Self {
		Self(cnt * 512)
	}
}

impl fmt::Display for ByteSize {
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut order = log2(self.0).unwrap_or(0) / log2(1024).unwrap();

		let suffix = match order {
			0 => "bytes",
			1 => "KiB",
			2 => "MiB",
			3 => "GiB",
			4 => "TiB",
			5 => "PiB",
			6 => "EiB",
			7 => "ZiB",
			8 => "YiB",

			_ => {
				order = 0;
				"bytes"
			}
		};

		let unit = 1024usize.pow(order as u32);
		let nbr = self.0 / unit as u64;

		write!(fmt, "{} {}", nbr, suffix)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn bytesize() {
		assert_eq!(format!("{}", ByteSize(0)).as_str(), "0 bytes");
		assert_eq!(format!("{}", ByteSize(1)).as_str(), "1 bytes");
		assert_eq!(format!("{}", ByteSize(1023)).as_str(), "1023 bytes");
		assert_eq!(format!("{}", ByteSize(1024)).as_str(), "1 KiB");
		assert_eq!(format!("{}", ByteSize(1025)).as_str(), "1 KiB");
		assert_eq!(format!("{}", ByteSize(2048)).as_str(), "2 KiB");
		assert_eq!(format!("{}", ByteSize(1024 * 1024)).as_str(), "1 MiB");
		assert_eq!(
			format!("{}", ByteSize(1024 * 1024 * 1024)).as_str(),
			"1 GiB"
		);
		assert_eq!(
			format!("{}", ByteSize(1024 * 1024 * 1024 * 1024)).as_str(),
			"1 TiB"
		);
	}

	#[test]
	fn pow2_roundtrip() {
		for log in 0..32 {
			assert!(is_pow2(pow2(log)));
			assert_eq!(log2(pow2(log)), Some(log as u64));
		}
	}

	#[test]
	fn is_pow2_rejects() {
		assert!(!is_pow2(0));
		assert!(!is_pow2(3));
		assert!(!is_pow2(1023));
		assert!(is_pow2(1024));
	}

	#[test]
	fn ceil_division_rounds_up() {
		assert_eq!(ceil_division(0, 4), 0);
		assert_eq!(ceil_division(1, 4), 1);
		assert_eq!(ceil_division(4, 4), 1);
		assert_eq!(ceil_division(5, 4), 2);
	}
}
