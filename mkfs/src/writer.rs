//! The on-disk writer (`spec.md` §4.7, §5): given a solved [`Geometry`], writes the primary and
//! secondary superblocks and every AG's headers and btree roots to the acquired device(s).
//!
//! Write order and device-edge hygiene follow `xfs_mkfs.c`'s `mkfs()` driver (zero the data
//! device's leading/trailing `WHACK_SIZE`, write every AG's headers, zero the log, stamp
//! `sb_inprogress = 0` last), translated into this crate's buffered-`File` idiom in place of the
//! original's raw buffer cache (`libxfs_buf_get`/`libxfs_buf_mark_dirty`) — this crate has no
//! transaction layer to batch writes through (`spec.md` §1 names it an external collaborator), so
//! every block is written synchronously as it's built.

use std::io::{Seek, SeekFrom, Write};

use crate::ag::{self, AgLayout, FreeExtent};
use crate::device::Target;
use crate::error::Error;
use crate::geometry::Geometry;
use crate::superblock::{self, SbInput};

/// Bytes zeroed at the very start and end of a block-device data target before writing begins,
/// clearing any stale partition table or prior filesystem signature a small superblock write
/// wouldn't otherwise reach.
const WHACK_SIZE: u64 = 128 * 1024;

/// Conventional root-inode number: AG 0, first inode of its first allocated chunk. Real inode
/// allocation (the prototype-file parser building the root directory's inode chunk) is out of
/// scope (`spec.md` §1); this is the placeholder `sb_rootino` holds until that runs.
const ROOT_INO_PLACEHOLDER: u64 = 128;

/// `NULLFSINO`-equivalent placeholder: the value secondary superblocks carry in `sb_rootino`
/// except for the two that get patched (`spec.md` §4.7).
const NO_ROOT_INO: u64 = 0;

/// The device handles the writer touches. `log`/`rt` are `None` when the log is internal or there
/// is no realtime subvolume, matching `device::Target::open`'s up-to-three-targets model.
pub struct Targets<'a> {
	pub data: &'a mut Target,
	pub log: Option<&'a mut Target>,
	pub rt: Option<&'a mut Target>,
}

/// Writes the complete metadata skeleton described by `geom` to `targets`. `discard` issues a
/// best-effort TRIM of every target first (`spec.md` §4.9).
pub fn write_filesystem(geom: &Geometry, targets: &mut Targets, discard: bool) -> Result<(), Error> {
	if discard {
		targets.data.discard(geom.data_blocks * geom.block_size as u64);
		if let Some(log) = targets.log.as_mut() {
			log.discard(geom.log_blocks as u64 * geom.block_size as u64);
		}
		if let Some(rt) = targets.rt.as_mut() {
			rt.discard(geom.rt_blocks * geom.block_size as u64);
		}
	}

	if targets.data.is_file {
		targets.data.file.set_len(geom.data_blocks * geom.block_size as u64)?;
	}
	if let Some(log) = targets.log.as_mut() {
		if log.is_file {
			log.file.set_len(geom.log_blocks as u64 * geom.block_size as u64)?;
		}
	}
	if let Some(rt) = targets.rt.as_mut() {
		if rt.is_file {
			rt.file.set_len(geom.rt_blocks * geom.block_size as u64)?;
		}
	}

	if targets.data.is_block_device {
		whack_edges(&mut targets.data.file, geom.data_blocks * geom.block_size as u64)?;
	}

	zero_log(geom, targets)?;

	// The primary superblock is written twice: first with `in-progress = 1`, before any AG
	// metadata exists, so a crash mid-build leaves an unmistakably unfinished filesystem.
	write_sb(&mut targets.data.file, 0, geom, ROOT_INO_PLACEHOLDER, true)?;

	let layout = ag::layout(&geom.features);
	for agno in 0..geom.ag_count {
		write_ag(&mut targets.data.file, geom, &layout, agno)?;
	}

	write_sb(&mut targets.data.file, 0, geom, ROOT_INO_PLACEHOLDER, false)?;
	targets.data.file.flush()?;
	Ok(())
}

/// The AG's true block count: every AG but the last is exactly `geom.ag_size` blocks; the last
/// AG absorbs whatever remains, which may be narrower (`data_blocks` isn't a clean multiple) or
/// wider (`geometry::solve`'s phase 4 stripe-alignment shrink reduced `ag_size` without
/// re-deriving an explicitly user-specified `ag_count`, leaving `ag_count * ag_size < data_blocks`)
/// than `geom.ag_size`. A plain `data_blocks % ag_size` only ever yields a value *below* `ag_size`
/// and silently drops the tail of the device in the widening case.
fn ag_size_of(geom: &Geometry, agno: u32) -> u32 {
	if agno + 1 == geom.ag_count {
		let covered_by_others = (geom.ag_count - 1) as u64 * geom.ag_size as u64;
		(geom.data_blocks - covered_by_others) as u32
	} else {
		geom.ag_size
	}
}

fn zero_log(geom: &Geometry, targets: &mut Targets) -> Result<(), Error> {
	let len = geom.log_blocks as u64 * geom.block_size as u64;
	if geom.log_internal {
		write_zeros(&mut targets.data.file, geom.log_start * geom.block_size as u64, len)?;
	} else if let Some(log) = targets.log.as_mut() {
		write_zeros(&mut log.file, 0, len)?;
	}
	Ok(())
}

fn write_ag(file: &mut std::fs::File, geom: &Geometry, layout: &AgLayout, agno: u32) -> Result<(), Error> {
	let ag_byte_base = agno as u64 * geom.ag_size as u64 * geom.block_size as u64;
	let ag_size = ag_size_of(geom, agno);

	if agno != 0 {
		let root_ino = if is_patched_secondary(geom.ag_count, agno) {
			ROOT_INO_PLACEHOLDER
		} else {
			NO_ROOT_INO
		};
		write_sb(file, ag_byte_base, geom, root_ino, false)?;
	}

	let free: Vec<FreeExtent> = ag::free_extents(geom, layout, agno, ag_size);

	write_block(file, ag_byte_base, 1, geom.block_size, reinterpret(&ag::build_agf(geom, layout, agno, ag_size, &free)))?;
	write_block(file, ag_byte_base, 2, geom.block_size, reinterpret(&ag::build_agi(geom, layout, agno, ag_size)))?;
	write_block(file, ag_byte_base, 3, geom.block_size, reinterpret(&ag::build_agfl(geom, agno)))?;

	write_block_bytes(file, ag_byte_base, layout.bno_block, ag::build_alloc_root(geom, layout, agno, layout.bno_block, &free, false))?;
	write_block_bytes(file, ag_byte_base, layout.cnt_block, ag::build_alloc_root(geom, layout, agno, layout.cnt_block, &free, true))?;
	write_block_bytes(file, ag_byte_base, layout.ino_block, ag::build_inobt_root(geom, agno, layout.ino_block, false))?;

	if let Some(fino_block) = layout.fino_block {
		write_block_bytes(file, ag_byte_base, fino_block, ag::build_inobt_root(geom, agno, fino_block, true))?;
	}
	if let Some(rmap_block) = layout.rmap_block {
		let records = ag::rmap_records(geom, layout, agno);
		write_block_bytes(file, ag_byte_base, rmap_block, ag::build_rmap_root(geom, agno, rmap_block, &records))?;
	}
	if let Some(refc_block) = layout.refc_block {
		write_block_bytes(file, ag_byte_base, refc_block, ag::build_refcount_root(geom, agno, refc_block))?;
	}
	Ok(())
}

/// Whether AG `agno`'s secondary superblock gets the root-inode patch: the last AG always (when
/// there's more than one), plus the middle AG when there are more than two — the same redundancy
/// the real tool keeps so `xfs_repair` can recover a root inode from more than one place
/// (`spec.md` §4.7).
fn is_patched_secondary(ag_count: u32, agno: u32) -> bool {
	if ag_count <= 1 {
		return false;
	}
	if agno == ag_count - 1 {
		return true;
	}
	ag_count > 2 && agno == ag_count / 2
}

fn write_sb(file: &mut std::fs::File, base: u64, geom: &Geometry, root_ino: u64, in_progress: bool) -> Result<(), Error> {
	let mut sb = superblock::build(&SbInput {
		geom,
		root_ino,
		in_progress,
	});
	superblock::finalize_crc(&mut sb, geom.features.crc);
	write_block(file, base, 0, geom.block_size, reinterpret(&sb))
}

fn write_block(file: &mut std::fs::File, ag_base: u64, block_index: u32, block_size: u32, bytes: &[u8]) -> Result<(), Error> {
	let mut padded = vec![0u8; block_size as usize];
	let n = bytes.len().min(padded.len());
	padded[..n].copy_from_slice(&bytes[..n]);
	write_block_bytes_raw(file, ag_base + block_index as u64 * block_size as u64, &padded)
}

fn write_block_bytes(file: &mut std::fs::File, ag_base: u64, block_index: u32, block: Vec<u8>) -> Result<(), Error> {
	let offset = ag_base + block_index as u64 * block.len() as u64;
	write_block_bytes_raw(file, offset, &block)
}

fn write_block_bytes_raw(file: &mut std::fs::File, offset: u64, bytes: &[u8]) -> Result<(), Error> {
	file.seek(SeekFrom::Start(offset))?;
	file.write_all(bytes)?;
	Ok(())
}

fn write_zeros(file: &mut std::fs::File, offset: u64, len: u64) -> Result<(), Error> {
	const CHUNK: usize = 1 << 20;
	let zeros = vec![0u8; CHUNK.min(len as usize).max(1)];
	file.seek(SeekFrom::Start(offset))?;
	let mut remaining = len;
	while remaining > 0 {
		let n = remaining.min(zeros.len() as u64) as usize;
		file.write_all(&zeros[..n])?;
		remaining -= n as u64;
	}
	Ok(())
}

fn whack_edges(file: &mut std::fs::File, total_len: u64) -> Result<(), Error> {
	write_zeros(file, 0, WHACK_SIZE.min(total_len))?;
	if total_len > WHACK_SIZE {
		write_zeros(file, total_len - WHACK_SIZE, WHACK_SIZE)?;
	}
	Ok(())
}

fn reinterpret<T>(val: &T) -> &[u8] {
	utils::util::reinterpret(val)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::context::Context;
	use crate::device::Target;
	use crate::schema::Opt;
	use crate::topology::Stripe;
	use std::fs::OpenOptions;

	fn geom(bytes: u64) -> Geometry {
		let ctx = Context::new();
		let inputs = crate::geometry::Inputs {
			data_device_bytes: bytes,
			data_is_file: true,
			stripe: Stripe::default(),
			log_device_blocks: None,
			rt_device_bytes: None,
			rt_stripe_bytes: None,
		};
		crate::geometry::solve(&ctx, [9u8; 16], &mut Vec::new(), &inputs).unwrap()
	}

	fn tmp_target(tag: &str) -> Target {
		let path = std::env::temp_dir().join(format!("mkfs-xfs-writer-test-{tag}-{}", std::process::id()));
		let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path).unwrap();
		Target {
			file,
			is_block_device: false,
			is_file: true,
		}
	}

	#[test]
	fn writes_primary_superblock_with_in_progress_cleared() {
		let geom = geom(256 * 1024 * 1024);
		let mut data = tmp_target("primary");
		{
			let mut targets = Targets {
				data: &mut data,
				log: None,
				rt: None,
			};
			write_filesystem(&geom, &mut targets, false).unwrap();
		}

		let mut expected = superblock::build(&SbInput {
			geom: &geom,
			root_ino: ROOT_INO_PLACEHOLDER,
			in_progress: false,
		});
		superblock::finalize_crc(&mut expected, geom.features.crc);
		let expected_bytes = utils::util::reinterpret(&expected);

		let mut actual = vec![0u8; expected_bytes.len()];
		use std::io::Read as _;
		data.file.seek(SeekFrom::Start(0)).unwrap();
		data.file.read_exact(&mut actual).unwrap();
		assert_eq!(actual, expected_bytes, "final write must carry in-progress=0 and a matching CRC");
	}

	#[test]
	fn ag_size_of_reports_shrunk_last_ag() {
		let geom = geom(3 * 1024 * 1024 * 1024);
		if geom.ag_count > 1 {
			let last = ag_size_of(&geom, geom.ag_count - 1);
			assert!(last <= geom.ag_size);
		}
	}

	#[test]
	fn ag_size_of_widens_last_ag_when_fixed_agcount_outgrows_shrunk_ag_size() {
		// -d su=64k,sw=4,agcount=4 -d size=4g: stripe alignment shrinks ag_size without
		// re-deriving the user-fixed agcount, so the last AG must absorb the extra tail instead
		// of the bogus few-block remainder a plain `data_blocks % ag_size` would report.
		let mut ctx = Context::new();
		ctx.set(Opt::d_agcount, crate::value::Value::Num(4)).unwrap();
		ctx.set(Opt::d_size, crate::value::Value::Num(4 * 1024 * 1024 * 1024)).unwrap();
		ctx.fill_defaults(None);
		let inputs = crate::geometry::Inputs {
			data_device_bytes: 4 * 1024 * 1024 * 1024,
			data_is_file: true,
			stripe: Stripe {
				sunit: 128,
				swidth: 512,
			},
			log_device_blocks: None,
			rt_device_bytes: None,
			rt_stripe_bytes: None,
		};
		let geom = crate::geometry::solve(&ctx, [1u8; 16], &mut Vec::new(), &inputs).unwrap();
		assert_eq!(geom.ag_count, 4);

		let last = ag_size_of(&geom, geom.ag_count - 1);
		let covered_by_first_three = 3 * geom.ag_size as u64;
		assert_eq!(covered_by_first_three + last as u64, geom.data_blocks, "every block must belong to exactly one AG");
	}

	#[test]
	fn patches_last_and_middle_ag_only() {
		assert!(!is_patched_secondary(1, 0));
		assert!(is_patched_secondary(2, 1));
		assert!(!is_patched_secondary(2, 0));
		assert!(is_patched_secondary(4, 3));
		assert!(is_patched_secondary(4, 2));
		assert!(!is_patched_secondary(4, 1));
	}
}
