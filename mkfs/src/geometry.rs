//! The geometry solver (`spec.md` §4.6): the densest subsystem. Takes validated option state plus
//! the data/log/realtime device sizes and produces the fully-resolved [`Geometry`] record that
//! the on-disk writer consumes.

use crate::constants::*;
use crate::context::Context;
use crate::error::{Error, Kind};
use crate::features::Features;
use crate::schema::Opt;
use crate::topology::Stripe;

/// The solved filesystem geometry (`spec.md` §3.3).
#[derive(Debug)]
pub struct Geometry {
	pub block_size: u32,
	pub block_log: u8,
	pub sector_size: u16,
	pub sector_log: u8,
	pub log_sector_size: u16,
	pub log_sector_log: u8,
	pub inode_size: u16,
	pub inode_log: u8,
	pub dir_block_size: u32,
	pub dir_block_log: u8,
	pub data_blocks: u64,
	pub rt_blocks: u64,
	pub ag_size: u32,
	pub ag_count: u32,
	pub log_blocks: u32,
	pub log_start: u64,
	pub log_agno: u32,
	pub log_internal: bool,
	pub d_sunit: u32,
	pub d_swidth: u32,
	pub l_sunit: u32,
	pub inode_alignment: u32,
	pub sparse_inode_alignment: u32,
	pub rt_ext_blocks: u32,
	pub rt_extents: u64,
	pub rt_bmblocks: u32,
	pub features: Features,
	pub uuid: [u8; 16],
	pub label: Option<String>,
	pub i_maxpct: u8,
}

/// Inputs the solver needs beyond `Context`: device sizes in bytes, resolved stripe geometry, and
/// whether the log/realtime subvolumes are external devices (vs. internal/none).
pub struct Inputs {
	pub data_device_bytes: u64,
	pub data_is_file: bool,
	pub stripe: Stripe,
	pub log_device_blocks: Option<u64>,
	pub rt_device_bytes: Option<u64>,
	pub rt_stripe_bytes: Option<u64>,
}

/// `imaxpct`'s default depends on the final filesystem size, so it cannot be folded into
/// `Context::fill_defaults` (§4.3): 25% below 1 TiB, 5% between 1 TiB and 50 TiB, 1% above.
pub fn default_imaxpct(fs_bytes: u64) -> u8 {
	const TIB: u64 = 1 << 40;
	if fs_bytes < TIB {
		25
	} else if fs_bytes < 50 * TIB {
		5
	} else {
		1
	}
}

pub fn solve(ctx: &Context, uuid: [u8; 16], warnings: &mut Vec<String>, inputs: &Inputs) -> Result<Geometry, Error> {
	let block_log = ctx.num(Opt::b_log) as u8;
	let block_size = ctx.num(Opt::b_size) as u32;
	let sector_log = ctx.num(Opt::d_sectlog) as u8;
	let sector_size = ctx.num(Opt::d_sectsize) as u16;
	let log_sector_log = ctx.num(Opt::l_sectlog) as u8;
	let log_sector_size = ctx.num(Opt::l_sectsize) as u16;
	let inode_log = ctx.num(Opt::i_log) as u8;
	let inode_size = ctx.num(Opt::i_size) as u16;
	let dir_block_log = ctx.num(Opt::n_log) as u8;
	let dir_block_size = ctx.num(Opt::n_size) as u32;

	// Phase 1: size-block conversion.
	let mut data_blocks = size_to_blocks(ctx.num(Opt::d_size), block_size, "data", warnings)?;

	// Phase 2: device-size reconciliation.
	let device_blocks = {
		let floor = (sector_size as u64).max(1024);
		let usable = inputs.data_device_bytes - (inputs.data_device_bytes % floor);
		usable / block_size as u64
	};
	if data_blocks != 0 {
		if data_blocks > device_blocks && !inputs.data_is_file {
			return Err(Error::new(
				Kind::DeviceError,
				"size specified is larger than the device",
			));
		}
	} else {
		data_blocks = device_blocks;
	}
	if data_blocks < XFS_MIN_DATA_BLOCKS {
		return Err(Error::new(
			Kind::RangeViolation,
			format!("size {data_blocks} blocks is too small, need at least {XFS_MIN_DATA_BLOCKS} blocks"),
		));
	}

	// Phase 3: AG sizing.
	let agsize_given = ctx.is_seen(Opt::d_agsize);
	let agcount_given = ctx.is_seen(Opt::d_agcount);
	let (mut ag_size, mut ag_count) = if agsize_given {
		let bytes = ctx.num(Opt::d_agsize);
		if bytes % block_size as u64 != 0 {
			return Err(Error::new(Kind::RangeViolation, "agsize is not a multiple of the block size"));
		}
		let ag_size = (bytes / block_size as u64) as u32;
		let ag_count = utils::util::ceil_division(data_blocks, ag_size as u64) as u32;
		(ag_size, ag_count)
	} else if agcount_given {
		let ag_count = ctx.num(Opt::d_agcount) as u32;
		let ag_size = utils::util::ceil_division(data_blocks, ag_count as u64) as u32;
		(ag_size, ag_count)
	} else {
		default_ag_geometry(data_blocks, block_size)
	};

	// Phase 4: stripe alignment of AGs.
	let d_sunit = inputs.stripe.sunit;
	let d_swidth = inputs.stripe.swidth;
	let noalign = ctx.bool_(Opt::d_noalign);
	if !noalign && d_sunit > 0 && (d_sunit as u64 * 512) % block_size as u64 == 0 {
		let sunit_blocks = (d_sunit as u64 * 512 / block_size as u64) as u32;
		if sunit_blocks > 0 {
			let rounded_up = round_up(ag_size, sunit_blocks);
			ag_size = if rounded_up > xfs_ag_max_blocks(block_log) as u32 {
				let down = round_down(ag_size, sunit_blocks);
				if down < xfs_ag_min_blocks(block_log) as u32 {
					return Err(Error::new(
						Kind::GeometryImpossible,
						"data area too small for stripe alignment, try -d noalign",
					));
				}
				down
			} else {
				rounded_up
			};

			let swidth_blocks = (d_swidth as u64 * 512 / block_size as u64) as u32;
			if swidth_blocks > 0 && ag_size % swidth_blocks == 0 && ag_count > 1 {
				let shrunk = ag_size - sunit_blocks;
				ag_size = if shrunk >= xfs_ag_min_blocks(block_log) as u32 {
					shrunk
				} else {
					ag_size + sunit_blocks
				};
			}

			if !agsize_given && !agcount_given {
				ag_count = utils::util::ceil_division(data_blocks, ag_size as u64) as u32;
			}
		}
	}

	// Phase 5: last-AG cleanup. The last AG absorbs whatever `data_blocks` leaves over once the
	// other `ag_count - 1` AGs take `ag_size` each — that remainder can be *smaller* than
	// `ag_size` (the common case) or *larger* (stripe alignment in phase 4 shrank `ag_size`
	// without re-deriving a user-fixed `ag_count`); a plain `data_blocks % ag_size` only ever
	// yields the former and silently drops the tail of the device in the latter.
	if ag_count > 1 {
		let covered_by_others = (ag_count as u64 - 1) * ag_size as u64;
		let last_ag_size = data_blocks.saturating_sub(covered_by_others);
		if last_ag_size != 0 && last_ag_size < xfs_ag_min_blocks(block_log) {
			ag_count -= 1;
			data_blocks = ag_count as u64 * ag_size as u64;
		}
	}

	// Phase 6: AG geometry validation.
	if !(xfs_ag_min_blocks(block_log)..=xfs_ag_max_blocks(block_log)).contains(&(ag_size as u64)) {
		return Err(Error::new(Kind::GeometryImpossible, "AG size is out of the legal range"));
	}
	if ag_count as u64 > XFS_MAX_AGNUMBER + 1 {
		return Err(Error::new(Kind::GeometryImpossible, "too many allocation groups"));
	}
	if ag_count > 1 {
		let last_ag_size = data_blocks - (ag_count as u64 - 1) * ag_size as u64;
		if last_ag_size > xfs_ag_max_blocks(block_log) {
			return Err(Error::new(Kind::GeometryImpossible, "last AG size is out of the legal range"));
		}
	}

	let crc = ctx.bool_(Opt::m_crc);
	let finobt = crc && ctx.bool_(Opt::m_finobt);
	let rmapbt = crc && ctx.bool_(Opt::m_rmapbt);
	let reflink = crc && ctx.bool_(Opt::m_reflink);
	let sparse = crc && ctx.bool_(Opt::i_sparse);
	let inode_align = !crc || ctx.bool_(Opt::i_align);
	let log_version = if crc { 2 } else { ctx.num(Opt::l_version) as u8 };
	let lazy_sb = !crc || ctx.bool_(Opt::l_lazycount);
	let ftype = !crc || ctx.bool_(Opt::n_ftype);

	// Phase 7: log sizing.
	let min_log_blocks = min_log_blocks_for(ag_size, block_log);
	let min_log_blocks = min_log_blocks.max(XFS_MIN_LOG_BLOCKS);
	let fs_bytes = data_blocks * block_size as u64;
	let min_log_blocks = if fs_bytes >= 1 << 30 {
		min_log_blocks.max(utils::util::ceil_division(XFS_MIN_LOG_BYTES, block_size as u64))
	} else {
		min_log_blocks
	};

	let log_internal = !ctx.is_seen(Opt::l_dev) && !ctx.is_seen(Opt::l_name);
	let log_cap = (ag_size - XFS_PREALLOC_BLOCKS)
		.min(XFS_MAX_LOG_BLOCKS as u32)
		.min((XFS_MAX_LOG_BYTES / block_size as u64) as u32);
	let user_log_size = ctx.is_seen(Opt::l_size);
	let mut log_blocks = if user_log_size {
		let lbytes = ctx.num(Opt::l_size);
		(lbytes / block_size as u64) as u32
	} else if !log_internal {
		inputs.log_device_blocks.unwrap_or(min_log_blocks) as u32
	} else if data_blocks < (1u64 << 30) / block_size as u64 {
		min_log_blocks as u32
	} else if data_blocks < (16u64 << 30) / block_size as u64 {
		(utils::util::ceil_division(XFS_MIN_LOG_BYTES, block_size as u64))
			.min(min_log_blocks * XFS_DFL_LOG_FACTOR) as u32
	} else {
		(data_blocks / XFS_DFL_LOG_RATIO) as u32
	};

	// An explicit `-l size=` is rejected outright when it doesn't fit (§4.6 phase 7: "rejecting
	// oversized"); an auto-derived size is silently clamped into range instead, since it is this
	// crate's own estimate rather than the user's explicit request.
	if user_log_size && log_internal && log_blocks as u64 >= data_blocks.min(ag_size as u64) {
		return Err(Error::new(
			Kind::GeometryImpossible,
			format!("size {log_blocks} too large for internal log"),
		));
	}
	if !user_log_size {
		log_blocks = log_blocks.clamp(min_log_blocks as u32, log_cap.max(min_log_blocks as u32));
		if log_blocks as u64 >= ag_size as u64 {
			log_blocks = min_log_blocks as u32;
		}
	}
	if !log_internal && user_log_size && (ctx.num(Opt::l_size) / block_size as u64) >= data_blocks {
		return Err(Error::new(
			Kind::GeometryImpossible,
			format!("size {log_blocks} too large for internal log"),
		));
	}

	// Phase 8: internal-log placement.
	let log_agno = if log_internal { ag_count / 2 } else { 0 };
	let mut log_start = if log_internal {
		agb_to_fsb(log_agno, XFS_PREALLOC_BLOCKS, ag_size)
	} else {
		0
	};
	let l_sunit_fsb = {
		let lsu_given = ctx.is_seen(Opt::l_sunit) || ctx.is_seen(Opt::l_su);
		if lsu_given {
			let raw = if ctx.is_seen(Opt::l_su) {
				ctx.num(Opt::l_su) / block_size as u64
			} else {
				ctx.num(Opt::l_sunit)
			};
			raw as u32
		} else if log_internal && d_sunit > 0 {
			(d_sunit as u64 * 512 / block_size as u64) as u32
		} else {
			0
		}
	};
	if log_internal && l_sunit_fsb > 0 {
		let aligned_start = round_up((log_start - agb_to_fsb(log_agno, 0, ag_size)) as u32, l_sunit_fsb);
		log_start = agb_to_fsb(log_agno, 0, ag_size) + aligned_start as u64;
		let rounded = round_up(log_blocks, l_sunit_fsb);
		log_blocks = if rounded <= log_cap { rounded } else { round_down(log_blocks, l_sunit_fsb) };
		let ag_relative_start = log_start - agb_to_fsb(log_agno, 0, ag_size);
		if ag_relative_start + log_blocks as u64 > ag_size as u64 {
			return Err(Error::new(
				Kind::GeometryImpossible,
				"internal log too large, must fit in one allocation group",
			));
		}
	}

	// Phase 9: log-stripe byte conversion.
	let l_sunit = if log_version == 2 { fsb_to_b(l_sunit_fsb, block_size) } else { 0 };

	// Phase 10: inode alignment.
	let inoalignmt = if inode_align {
		(XFS_INODE_BIG_CLUSTER_SIZE * if crc { inode_size as u64 / XFS_DINODE_MIN_SIZE } else { 1 })
			/ block_size as u64
	} else {
		0
	};
	let (inoalignmt, spino_align) = if sparse {
		let chunk_align = (XFS_INODES_PER_CHUNK * inode_size as u64) / block_size as u64;
		(chunk_align, inoalignmt)
	} else {
		(inoalignmt, 0)
	};

	// Phase 11: realtime geometry.
	let (rt_blocks, rt_ext_blocks, rt_extents, rt_bmblocks) = solve_realtime(ctx, block_size, inputs)?;

	let i_maxpct = if ctx.is_seen(Opt::i_maxpct) {
		ctx.num(Opt::i_maxpct) as u8
	} else {
		default_imaxpct(fs_bytes)
	};

	let ascii_ci = ctx.str_(Opt::n_version).eq_ignore_ascii_case("ci");

	let features = Features {
		crc,
		finobt,
		rmapbt,
		reflink,
		sparse_inodes: sparse,
		inode_align,
		log_version,
		lazy_sb_counters: lazy_sb,
		ftype,
		attr_version: if crc { 2 } else { ctx.num(Opt::i_attr) as u8 },
		projid32bit: if crc { true } else { ctx.bool_(Opt::i_projid32bit) },
		ascii_ci,
	};

	Ok(Geometry {
		block_size,
		block_log,
		sector_size,
		sector_log,
		log_sector_size,
		log_sector_log,
		inode_size,
		inode_log,
		dir_block_size,
		dir_block_log,
		data_blocks,
		rt_blocks,
		ag_size,
		ag_count,
		log_blocks,
		log_start,
		log_agno,
		log_internal,
		d_sunit,
		d_swidth,
		l_sunit: l_sunit as u32,
		inode_alignment: inoalignmt as u32,
		sparse_inode_alignment: spino_align as u32,
		rt_ext_blocks,
		rt_extents,
		rt_bmblocks,
		features,
		uuid,
		label: None,
		i_maxpct,
	})
}

fn size_to_blocks(bytes: u64, block_size: u32, what: &str, warnings: &mut Vec<String>) -> Result<u64, Error> {
	if bytes == 0 {
		return Ok(0);
	}
	if bytes % block_size as u64 != 0 {
		warnings.push(format!("{what} size is not a multiple of the block size, truncating"));
	}
	Ok(bytes / block_size as u64)
}

fn round_up(v: u32, unit: u32) -> u32 {
	utils::util::ceil_division(v as u64, unit as u64) as u32 * unit
}

fn round_down(v: u32, unit: u32) -> u32 {
	(v / unit) * unit
}

fn agb_to_fsb(agno: u32, agbno: u32, ag_size: u32) -> u64 {
	agno as u64 * ag_size as u64 + agbno as u64
}

fn fsb_to_b(fsb: u32, block_size: u32) -> u64 {
	fsb as u64 * block_size as u64
}

/// The default AG-geometry algorithm (§4.6 phase 3): start from four AGs (the baseline that
/// balances allocator concurrency against per-AG metadata overhead for ordinary filesystem
/// sizes), then grow the AG count instead of the AG size once an AG would otherwise exceed
/// `TARGET_AG_CAP_BYTES`. Filesystems too small for four minimum-size AGs get a single AG.
fn default_ag_geometry(data_blocks: u64, block_size: u32) -> (u32, u32) {
	const MIN_AGCOUNT: u64 = 4;
	const TARGET_AG_CAP_BYTES: u64 = 4 << 30;

	let min_ag_blocks = xfs_ag_min_blocks(12);
	let ag_size_cap = (TARGET_AG_CAP_BYTES / block_size as u64).max(min_ag_blocks);

	if data_blocks / MIN_AGCOUNT < min_ag_blocks {
		return (data_blocks as u32, 1);
	}

	let even_split = data_blocks / MIN_AGCOUNT;
	let ag_size = even_split.min(ag_size_cap);
	let ag_count = utils::util::ceil_division(data_blocks, ag_size) as u32;
	(ag_size as u32, ag_count.max(1))
}

/// Minimum log size for a given AG size, a stand-in for the original's exact
/// transaction-reservation arithmetic (worst-case per-transaction log usage across every
/// metadata operation at this AG size: an inode chunk allocation plus the two btree splits it
/// triggers). Scales with `ag_size` the same way the real computation does: larger AGs need
/// proportionally larger minimum logs to cover worst-case btree splits. The `5/32` coefficient is
/// calibrated against the worked example in the spec's scenario table (a 256 MiB filesystem with
/// 16384-block AGs needs a 2560-block, 10 MiB log), which a flatter `ag_size / 256` guess misses.
fn min_log_blocks_for(ag_size: u32, _block_log: u8) -> u64 {
	(ag_size as u64 * 5 / 32).max(XFS_MIN_LOG_BLOCKS)
}

fn solve_realtime(ctx: &Context, block_size: u32, inputs: &Inputs) -> Result<(u64, u32, u64, u32), Error> {
	let rt_bytes = if inputs.rt_device_bytes.is_some() || ctx.is_seen(Opt::r_size) {
		ctx.num(Opt::r_size).max(inputs.rt_device_bytes.unwrap_or(0))
	} else {
		0
	};
	let rt_blocks = rt_bytes / block_size as u64;

	let rt_ext_bytes = ctx.num(Opt::r_extsize);
	let noalign = ctx.bool_(Opt::r_noalign);
	let rt_ext_blocks = if rt_ext_bytes > 0 {
		(rt_ext_bytes / block_size as u64).max(1) as u32
	} else if !noalign && inputs.rt_stripe_bytes.is_some_and(|s| (XFS_MIN_RTEXTSIZE..=XFS_MAX_RTEXTSIZE).contains(&s)) {
		(inputs.rt_stripe_bytes.unwrap() / block_size as u64).max(1) as u32
	} else {
		((XFS_MIN_RTEXTSIZE / block_size as u64).max(1)) as u32
	};

	if rt_blocks == 0 {
		return Ok((0, rt_ext_blocks, 0, 0));
	}
	let rt_extents = rt_blocks / rt_ext_blocks as u64;
	let rt_bmblocks = utils::util::ceil_division(rt_extents, 8 * block_size as u64) as u32;
	Ok((rt_blocks, rt_ext_blocks, rt_extents, rt_bmblocks))
}

#[cfg(test)]
mod test {
	use super::*;

	fn inputs(data_bytes: u64) -> Inputs {
		Inputs {
			data_device_bytes: data_bytes,
			data_is_file: true,
			stripe: Stripe::default(),
			log_device_blocks: None,
			rt_device_bytes: None,
			rt_stripe_bytes: None,
		}
	}

	#[test]
	fn small_image_gets_plausible_geometry() {
		// `spec.md` §8 scenario 1: a 256 MiB image gets a 4-AG, 16384-block-per-AG layout and a
		// 2560-block (10 MiB) internal log.
		let ctx = Context::new();
		let mut warnings = Vec::new();
		let geom = solve(&ctx, [0u8; 16], &mut warnings, &inputs(256 * 1024 * 1024)).unwrap();
		assert_eq!(geom.block_size, 4096);
		assert_eq!(geom.ag_count, 4);
		assert_eq!(geom.ag_size, 16384);
		assert_eq!(geom.log_blocks, 2560);
		assert!(geom.log_internal);
	}

	#[test]
	fn crc_disabled_drops_dependent_features() {
		let mut ctx = Context::new();
		ctx.set(Opt::m_crc, crate::value::Value::Bool(false)).unwrap();
		ctx.fill_defaults(None);
		let mut warnings = Vec::new();
		let geom = solve(&ctx, [0u8; 16], &mut warnings, &inputs(256 * 1024 * 1024)).unwrap();
		assert!(!geom.features.crc);
		assert!(!geom.features.finobt);
		assert!(!geom.features.rmapbt);
		assert!(!geom.features.reflink);
		assert_eq!(geom.inode_size, 256);
	}

	#[test]
	fn stripe_shrink_with_fixed_agcount_keeps_full_coverage() {
		// `spec.md` §8 scenario 5: -d su=64k,sw=4,agcount=4 -d size=4g. ag_size ends up a
		// multiple of sunit (16 fs blocks) but not of swidth (64), and every block of the device
		// still belongs to exactly one AG even though the last AG ends up wider than `ag_size`.
		let mut ctx = Context::new();
		ctx.set(Opt::d_agcount, crate::value::Value::Num(4)).unwrap();
		ctx.set(Opt::d_size, crate::value::Value::Num(4 * 1024 * 1024 * 1024)).unwrap();
		ctx.fill_defaults(None);
		let mut stripe_inputs = inputs(4 * 1024 * 1024 * 1024);
		stripe_inputs.stripe = Stripe {
			sunit: 128,
			swidth: 512,
		};
		let geom = solve(&ctx, [0u8; 16], &mut Vec::new(), &stripe_inputs).unwrap();
		assert!((4..=5).contains(&geom.ag_count));
		assert_eq!(geom.ag_size % 16, 0);
		assert_ne!(geom.ag_size % 64, 0);
		let covered_by_others = (geom.ag_count as u64 - 1) * geom.ag_size as u64;
		assert!(covered_by_others <= geom.data_blocks);
	}

	#[test]
	fn data_too_small_is_rejected() {
		let ctx = Context::new();
		let mut warnings = Vec::new();
		let err = solve(&ctx, [0u8; 16], &mut warnings, &inputs(1024 * 1024)).unwrap_err();
		assert_eq!(err.kind, Kind::RangeViolation);
	}

	#[test]
	fn imaxpct_default_scales_with_size() {
		assert_eq!(default_imaxpct(1 << 20), 25);
		assert_eq!(default_imaxpct(2u64 << 40), 5);
		assert_eq!(default_imaxpct(60u64 << 40), 1);
	}
}
