//! The primary and secondary superblock layout (`spec.md` §4.7, §6.2).
//!
//! Field layout follows the real on-disk `struct xfs_sb`, cross-checked against
//! `examples/other_examples/45b696ad_..._xfs.rs.rs`'s `zerocopy`-typed rendition of the same
//! struct. This crate's dependency stack stays aligned with the teacher's instead of adding
//! `zerocopy`: every multi-byte field is a plain Rust integer, converted at the read/write
//! boundary with `.to_be()`/`u*::from_be_bytes()`, in the manner of `mkfs/src/ext2.rs`'s
//! `#[repr(C, packed)]` + `reinterpret` pattern.

use crate::features::Features;
use crate::geometry::Geometry;

/// Magic number `"XFSB"`.
pub const XFS_SB_MAGIC: u32 = 0x5846_5342;

pub const XFS_SB_VERSION_4: u16 = 4;
pub const XFS_SB_VERSION_5: u16 = 5;
pub const XFS_SB_VERSION_NUMBITS: u16 = 0x000f;
pub const XFS_SB_VERSION_ALIGNBIT: u16 = 0x0010;
pub const XFS_SB_VERSION_DALIGNBIT: u16 = 0x0020;
pub const XFS_SB_VERSION_SHAREDBIT: u16 = 0x0040;
pub const XFS_SB_VERSION_LOGV2BIT: u16 = 0x0080;
pub const XFS_SB_VERSION_SECTORBIT: u16 = 0x0100;
pub const XFS_SB_VERSION_EXTFLGBIT: u16 = 0x0200;
pub const XFS_SB_VERSION_DIRV2BIT: u16 = 0x0400;
pub const XFS_SB_VERSION_BORGBIT: u16 = 0x0800;
pub const XFS_SB_VERSION_ATTRBIT: u16 = 0x1000;
pub const XFS_SB_VERSION_NLINKBIT: u16 = 0x2000;
pub const XFS_SB_VERSION_QUOTABIT: u16 = 0x4000;
pub const XFS_SB_VERSION_MOREBITSBIT: u16 = 0x8000;

pub const XFS_SB_VERSION2_LAZYSBCOUNTBIT: u32 = 0x0000_0002;
pub const XFS_SB_VERSION2_PROJID32BIT: u32 = 0x0000_0008;
pub const XFS_SB_VERSION2_PARENTBIT: u32 = 0x0000_0010;
pub const XFS_SB_VERSION2_CRCBIT: u32 = 0x0000_0100;
pub const XFS_SB_VERSION2_ATTR2BIT: u32 = 0x0000_0200;
pub const XFS_SB_VERSION2_FTYPE: u32 = 0x0000_0400;

pub const XFS_SB_FEAT_INCOMPAT_FTYPE: u32 = 0x0000_0001;
pub const XFS_SB_FEAT_INCOMPAT_SPINODES: u32 = 0x0000_0002;

pub const XFS_SB_FEAT_RO_COMPAT_FINOBT: u32 = 0x0000_0001;
pub const XFS_SB_FEAT_RO_COMPAT_RMAPBT: u32 = 0x0000_0002;
pub const XFS_SB_FEAT_RO_COMPAT_REFLINK: u32 = 0x0000_0004;

/// Suboptions not seen in the smallest default-only filesystem leave the version bits the real
/// tool sets unconditionally at this point in the build (directory v2 format, extent flag bit,
/// 32-bit nlink, no shared-readonly support). Grounded on `XFS_DFL_SB_VERSION_BITS` in
/// `xfs_format.h` (not part of this retrieval pack; the bit values above are public format
/// documentation).
const XFS_DFL_SB_VERSION_BITS: u16 = XFS_SB_VERSION_NLINKBIT | XFS_SB_VERSION_DIRV2BIT | XFS_SB_VERSION_EXTFLGBIT;

pub const MAX_LABEL_LEN: usize = 12;

/// The on-disk primary/secondary superblock, big-endian, packed exactly as the wire format
/// requires. `#[repr(C, packed)]` matches `ext2.rs`'s disk-struct idiom; every multi-byte field
/// is stored pre-converted to big-endian so a direct byte copy is correct on any host.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Superblock {
	pub magicnum: u32,
	pub blocksize: u32,
	pub dblocks: u64,
	pub rblocks: u64,
	pub rextents: u64,
	pub uuid: [u8; 16],
	pub logstart: u64,
	pub rootino: u64,
	pub rbmino: u64,
	pub rsumino: u64,
	pub rextsize: u32,
	pub agblocks: u32,
	pub agcount: u32,
	pub rbmblocks: u32,
	pub logblocks: u32,
	pub versionnum: u16,
	pub sectsize: u16,
	pub inodesize: u16,
	pub inopblock: u16,
	pub fname: [u8; MAX_LABEL_LEN],
	pub blocklog: u8,
	pub sectlog: u8,
	pub inodelog: u8,
	pub inopblog: u8,
	pub agblklog: u8,
	pub rextslog: u8,
	pub inprogress: u8,
	pub imax_pct: u8,
	pub icount: u64,
	pub ifree: u64,
	pub fdblocks: u64,
	pub frextents: u64,
	pub uquotino: u64,
	pub gquotino: u64,
	pub qflags: u16,
	pub flags: u8,
	pub shared_vn: u8,
	pub inoalignmt: u32,
	pub unit: u32,
	pub width: u32,
	pub dirblklog: u8,
	pub logsectlog: u8,
	pub logsectsize: u16,
	pub logsunit: u32,
	pub features2: u32,
	pub bad_features2: u32,
	pub features_compat: u32,
	pub features_ro_compat: u32,
	pub features_incompat: u32,
	pub features_log_incompat: u32,
	pub crc: u32,
	pub spino_align: u32,
	pub pquotino: u64,
	pub lsn: i64,
	pub meta_uuid: [u8; 16],
}

/// Everything the root-inode patch (`spec.md` §4.7) and the AG writer need beyond the geometry
/// that's already in [`Geometry`].
pub struct SbInput<'a> {
	pub geom: &'a Geometry,
	pub root_ino: u64,
	pub in_progress: bool,
}

/// `sb_agblklog`: the number of bits needed to hold an AG-relative block number, i.e. the
/// smallest `n` with `2^n >= ag_size` — a rounded-UP log2, exact (no rounding) when `ag_size`
/// is itself a power of two, unlike `sb_rextslog`/`sb_inopblog` which want a plain floor log2.
fn log2_roundup(n: u64) -> u64 {
	let floor = utils::util::log2(n).unwrap_or(0);
	if utils::util::is_pow2(n) {
		floor
	} else {
		floor + 1
	}
}

/// Builds one AG's superblock image (identical content at every AG, save `inprogress` which is
/// only ever non-zero on the primary while the build is underway).
pub fn build(input: &SbInput) -> Superblock {
	let geom = input.geom;
	let f = &geom.features;

	let mut versionnum = XFS_DFL_SB_VERSION_BITS | if f.crc { XFS_SB_VERSION_5 } else { XFS_SB_VERSION_4 };
	if f.inode_align {
		versionnum |= XFS_SB_VERSION_ALIGNBIT;
	}
	if geom.d_sunit != 0 {
		versionnum |= XFS_SB_VERSION_DALIGNBIT;
	}
	if f.log_version == 2 {
		versionnum |= XFS_SB_VERSION_LOGV2BIT;
	}
	if f.attr_version == 1 {
		versionnum |= XFS_SB_VERSION_ATTRBIT;
	}
	if geom.sector_size as u64 > 512 || geom.log_sector_size as u64 > 512 {
		versionnum |= XFS_SB_VERSION_SECTORBIT;
	}
	if f.ascii_ci {
		versionnum |= XFS_SB_VERSION_BORGBIT;
	}

	let mut features2 = 0u32;
	if f.lazy_sb_counters {
		features2 |= XFS_SB_VERSION2_LAZYSBCOUNTBIT;
	}
	if f.projid32bit {
		features2 |= XFS_SB_VERSION2_PROJID32BIT;
	}
	if f.crc {
		features2 |= XFS_SB_VERSION2_CRCBIT;
	}
	if f.attr_version == 2 {
		features2 |= XFS_SB_VERSION2_ATTR2BIT;
	}
	if f.ftype && !f.crc {
		features2 |= XFS_SB_VERSION2_FTYPE;
	}
	if features2 != 0 {
		versionnum |= XFS_SB_VERSION_MOREBITSBIT;
	}

	let (features_incompat, features_ro_compat) = if f.crc {
		let mut incompat = XFS_SB_FEAT_INCOMPAT_FTYPE;
		let mut ro_compat = 0u32;
		if f.finobt {
			ro_compat |= XFS_SB_FEAT_RO_COMPAT_FINOBT;
		}
		if f.rmapbt {
			ro_compat |= XFS_SB_FEAT_RO_COMPAT_RMAPBT;
		}
		if f.reflink {
			ro_compat |= XFS_SB_FEAT_RO_COMPAT_REFLINK;
		}
		if f.sparse_inodes {
			incompat |= XFS_SB_FEAT_INCOMPAT_SPINODES;
		}
		(incompat, ro_compat)
	} else {
		(0, 0)
	};

	let mut fname = [0u8; MAX_LABEL_LEN];
	if let Some(label) = &geom.label {
		let bytes = label.as_bytes();
		let n = bytes.len().min(MAX_LABEL_LEN);
		fname[..n].copy_from_slice(&bytes[..n]);
	}

	let inopblock = (geom.block_size / geom.inode_size as u32) as u16;

	Superblock {
		magicnum: XFS_SB_MAGIC.to_be(),
		blocksize: geom.block_size.to_be(),
		dblocks: geom.data_blocks.to_be(),
		rblocks: geom.rt_blocks.to_be(),
		rextents: geom.rt_extents.to_be(),
		uuid: geom.uuid,
		logstart: (if geom.log_internal { geom.log_start } else { 0 }).to_be(),
		rootino: input.root_ino.to_be(),
		rbmino: 0u64.to_be(),
		rsumino: 0u64.to_be(),
		rextsize: geom.rt_ext_blocks.to_be(),
		agblocks: geom.ag_size.to_be(),
		agcount: geom.ag_count.to_be(),
		rbmblocks: geom.rt_bmblocks.to_be(),
		logblocks: geom.log_blocks.to_be(),
		versionnum: versionnum.to_be(),
		sectsize: geom.sector_size.to_be(),
		inodesize: geom.inode_size.to_be(),
		inopblock: inopblock.to_be(),
		fname,
		blocklog: geom.block_log,
		sectlog: geom.sector_log,
		inodelog: geom.inode_log,
		inopblog: utils::util::log2(inopblock as u64).unwrap_or(0) as u8,
		agblklog: log2_roundup(geom.ag_size as u64) as u8,
		rextslog: utils::util::log2(geom.rt_extents).unwrap_or(0) as u8,
		inprogress: input.in_progress as u8,
		imax_pct: geom.i_maxpct,
		icount: 0u64.to_be(),
		ifree: 0u64.to_be(),
		fdblocks: (geom.data_blocks - geom.log_blocks as u64).to_be(),
		frextents: geom.rt_extents.to_be(),
		uquotino: 0u64.to_be(),
		gquotino: 0u64.to_be(),
		qflags: 0u16.to_be(),
		flags: 0,
		shared_vn: 0,
		inoalignmt: geom.inode_alignment.to_be(),
		unit: geom.d_sunit.to_be(),
		width: geom.d_swidth.to_be(),
		dirblklog: geom.dir_block_log - geom.block_log,
		logsectlog: if f.log_version == 2 { geom.log_sector_log } else { 0 },
		logsectsize: if f.log_version == 2 { geom.log_sector_size.to_be() } else { 0 },
		logsunit: geom.l_sunit.to_be(),
		features2: features2.to_be(),
		bad_features2: features2.to_be(),
		features_compat: 0,
		features_ro_compat: features_ro_compat.to_be(),
		features_incompat: features_incompat.to_be(),
		features_log_incompat: 0,
		crc: 0,
		spino_align: geom.sparse_inode_alignment.to_be(),
		pquotino: 0u64.to_be(),
		lsn: 0i64.to_be(),
		meta_uuid: geom.uuid,
	}
}

/// Stamps `sb.crc` with the CRC-32C of the whole struct computed with the checksum field itself
/// zeroed, XFS's usual self-referential checksum convention. A no-op for v4 filesystems, which
/// carry no CRC field in the format the mount path checks.
pub fn finalize_crc(sb: &mut Superblock, crc_enabled: bool) {
	if !crc_enabled {
		return;
	}
	sb.crc = 0;
	let bytes = utils::util::reinterpret(sb);
	sb.crc = utils::crc32::crc32c(bytes).to_le();
}

/// Patches `sb_rootino` in an already-built secondary superblock image (`spec.md` §4.7's
/// secondary-superblock root-inode patch).
pub fn patch_root_ino(sb: &mut Superblock, root_ino: u64) {
	sb.rootino = root_ino.to_be();
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::topology::Stripe;

	fn geom() -> Geometry {
		let ctx = crate::context::Context::new();
		let inputs = crate::geometry::Inputs {
			data_device_bytes: 256 * 1024 * 1024,
			data_is_file: true,
			stripe: Stripe::default(),
			log_device_blocks: None,
			rt_device_bytes: None,
			rt_stripe_bytes: None,
		};
		crate::geometry::solve(&ctx, [7u8; 16], &mut Vec::new(), &inputs).unwrap()
	}

	#[test]
	fn magic_is_xfsb_big_endian() {
		let geom = geom();
		let sb = build(&SbInput {
			geom: &geom,
			root_ino: 128,
			in_progress: true,
		});
		assert_eq!(u32::from_be(sb.magicnum), XFS_SB_MAGIC);
		assert_eq!(sb.inprogress, 1);
	}

	#[test]
	fn agblklog_is_exact_for_power_of_two_ag_size() {
		assert_eq!(log2_roundup(16384), 14);
		assert_eq!(log2_roundup(16385), 15);
		assert_eq!(log2_roundup(1), 0);
	}

	#[test]
	fn crc_only_set_when_feature_enabled() {
		let geom = geom();
		let mut sb = build(&SbInput {
			geom: &geom,
			root_ino: 128,
			in_progress: false,
		});
		finalize_crc(&mut sb, false);
		assert_eq!(sb.crc, 0);
		finalize_crc(&mut sb, true);
		assert_ne!(sb.crc, 0);
	}

	#[test]
	fn root_ino_patch_overwrites_field() {
		let geom = geom();
		let mut sb = build(&SbInput {
			geom: &geom,
			root_ino: 128,
			in_progress: false,
		});
		patch_root_ino(&mut sb, 9999);
		assert_eq!(u64::from_be(sb.rootino), 9999);
	}

	#[test]
	fn ascii_ci_sets_borgbit() {
		let mut ctx = crate::context::Context::new();
		ctx.set(crate::schema::Opt::n_version, crate::value::Value::Str("ci".to_owned())).unwrap();
		ctx.fill_defaults(None);
		let inputs = crate::geometry::Inputs {
			data_device_bytes: 256 * 1024 * 1024,
			data_is_file: true,
			stripe: Stripe::default(),
			log_device_blocks: None,
			rt_device_bytes: None,
			rt_stripe_bytes: None,
		};
		let geom = crate::geometry::solve(&ctx, [7u8; 16], &mut Vec::new(), &inputs).unwrap();
		assert!(geom.features.ascii_ci);
		let sb = build(&SbInput {
			geom: &geom,
			root_ino: 128,
			in_progress: false,
		});
		assert_ne!(u16::from_be(sb.versionnum) & XFS_SB_VERSION_BORGBIT, 0);
	}
}
